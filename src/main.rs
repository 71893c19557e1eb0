mod db;
mod frame;
mod routes;
mod services;
mod state;

use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let pool = db::init_pool(&database_url)
        .await
        .expect("database init failed");

    let ledger = Arc::new(services::ledger::PgLedger::new(pool.clone()));
    let registry = Arc::new(services::registry::RoomRegistry::from_env());
    let state = state::AppState::new(pool, registry, ledger);

    // Spawn background idle-room sweeper.
    let _sweeper = services::registry::spawn_sweep_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "reversi-arena listening");
    axum::serve(listener, app).await.expect("server failed");
}
