use std::net::SocketAddr;

use ruststore::config::Config;
use ruststore::logging::init_logging;
use ruststore::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger la configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    init_logging(&config)?;

    tracing::info!("Démarrage du serveur RustStore...");

    // Créer l'état partagé de l'application
    let state = AppState::new(config.clone());
    let app = ruststore::build_router(state);

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!("Serveur démarré sur http://{}", addr);
    tracing::info!(" Documentation des endpoints:");
    tracing::info!("  - Catalogue: GET /api/products, GET /api/products/:id");
    tracing::info!("  - Panier: GET /api/cart, POST /api/cart/add, POST /api/cart/checkout");
    tracing::info!("  - Commandes: GET /api/orders/my, PUT /api/orders/:id/cancel");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Serveur arrêté");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Impossible d'écouter Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
