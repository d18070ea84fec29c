use std::env;
use std::net::IpAddr;

use anyhow::Context;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub seed_demo_data: bool,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET doit être défini dans .env")?;
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET ne peut pas être vide");
        }

        let log_format = match var_or("LOG_FORMAT", "pretty").as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => anyhow::bail!("LOG_FORMAT invalide: {other} (attendu: pretty | json)"),
        };

        Ok(Self {
            host: var_or("HOST", "127.0.0.1")
                .parse()
                .context("HOST doit être une adresse IP")?,
            port: var_or("PORT", "3000")
                .parse()
                .context("PORT doit être un numéro de port")?,
            jwt_secret,
            log_level: var_or("LOG_LEVEL", "info"),
            log_format,
            seed_demo_data: parse_bool(&var_or("SEED_DEMO_DATA", "true"))
                .context("SEED_DEMO_DATA doit valoir true ou false")?,
            cors_origins: var_or("CORS_ORIGINS", "")
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => anyhow::bail!("valeur booléenne invalide: {other}"),
    }
}
