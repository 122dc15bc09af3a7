use std::sync::Arc;

use tower_http::cors::CorsLayer;

use runestone::api;
use runestone::config::Config;
use runestone::metrics;
use runestone::store::TeamStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    metrics::register_metrics();

    let config = Config::load();

    let store = TeamStore::open(&config.data_path)
        .await
        .expect("Failed to open team store");
    let store = Arc::new(store);

    let app = api::router(store, config.public_url.clone(), config.default_fragments)
        .layer(CorsLayer::permissive());

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {bind_addr}: {e}"));

    tracing::info!(
        "Runestone backend listening on {bind_addr} (public URL {}, store {})",
        config.public_url,
        config.data_path.display()
    );
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
