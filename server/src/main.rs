use std::sync::Arc;

use actix_web::{web, App, HttpServer};

use whiteboard_server::config::ServerConfig;
use whiteboard_server::connection::ws_index;
use whiteboard_server::coordinator::SessionCoordinator;
use whiteboard_server::legacy::LegacyServer;
use whiteboard_server::server::spawn_server;
use whiteboard_server::snapshot_file::SnapshotStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = ServerConfig::from_args();
    log::info!("Starting with {:?}", config);

    let coordinator = Arc::new(SessionCoordinator::new(config.admission_timeout));
    let snapshots = SnapshotStore::new(&config.snapshot_dir);
    let srv_tx = spawn_server(coordinator.clone(), snapshots.clone());

    if let Some(legacy_bind_addr) = &config.legacy_bind_addr {
        let listener = tokio::net::TcpListener::bind(legacy_bind_addr).await?;
        let legacy = LegacyServer::new(coordinator.clone(), snapshots);
        tokio::spawn(async move {
            if let Err(e) = legacy.run(listener).await {
                log::error!("Line protocol listener stopped: {}", e);
            }
        });
    }

    let bind_addr = config.bind_addr.clone();
    let srv_tx = web::Data::new(srv_tx);
    let result = HttpServer::new(move || {
        App::new()
            .app_data(srv_tx.clone())
            .route("/ws/", web::get().to(ws_index))
    })
    .bind(bind_addr)?
    .run()
    .await;

    coordinator.shutdown().await;
    result
}
