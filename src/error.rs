use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("Product {0} is no longer available")]
    ProductUnavailable(String),

    #[error("Insufficient stock for {product}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product: String,
        available: u32,
        requested: u32,
    },

    #[error("Server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::Validation(_)
            | AppError::ProductUnavailable(_)
            | AppError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn access_denied() -> Self {
        AppError::Forbidden("Access denied".to_string())
    }
}

/// Aplatit les erreurs du validator en `[{field, message}]`, y compris
/// celles des structures imbriquées (`shipping_address.city`).
fn field_errors(errors: &ValidationErrors) -> Vec<Value> {
    let mut out = vec![];
    collect_field_errors("", errors, &mut out);
    out
}

fn collect_field_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<Value>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", err.code));
                    out.push(json!({ "field": path, "message": message }));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Validation(errors) => json!({
                "error": self.to_string(),
                "errors": field_errors(errors),
            }),
            AppError::InsufficientStock {
                available,
                requested,
                ..
            } => json!({
                "error": self.to_string(),
                "available": available,
                "requested": requested,
                "shortfall": requested.saturating_sub(*available),
            }),
            AppError::Internal(err) => {
                tracing::error!("❌ Erreur interne: {:#}", err);
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
