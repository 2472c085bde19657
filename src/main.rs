use std::error::Error;

use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use tokio::{fs, net, sync::broadcast::error::RecvError, task};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use council_desk::{
    http::{self, AppState},
    storage::FileStorage,
    Config, Store,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let storage = FileStorage::open(&config.storage.dir)?;
    let store = Store::open(storage, config.tickets)?
        .reject_stale_writes(config.storage.reject_stale_writes);
    tracing::info!(
        tickets = store.tickets().len(),
        dir = %config.storage.dir.display(),
        "store opened"
    );

    let mut changes = store.subscribe();
    task::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => tracing::debug!(?change, "store changed"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "change log lagging");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let state = AppState::new(store);
    task::spawn(http::watch_storage(
        state.clone(),
        config.storage.reload_interval,
    ));

    let origins = config
        .http
        .cors
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE]);

    let app = http::router(state).layer(cors);

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
