//! buildgrid Controller Server Entry Point

use buildgrid_common::config::ControllerConfig;
use buildgrid_controller::{
    acl, api, health, launcher, listeners, logging, registry, AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
    logging::init().expect("failed to initialize logging");

    let config = ControllerConfig::from_env();
    info!("buildgrid Controller v{}", env!("CARGO_PKG_VERSION"));

    // リスナーは起動時に明示的な順序で登録する
    let mut listener_set = listeners::ListenerSet::new();
    listener_set.register(Arc::new(listeners::ActivityListener));

    let registry = registry::AgentRegistry::new();
    let connection_launcher = Arc::new(launcher::ConnectionLauncher::new(
        Arc::new(listener_set),
        Duration::from_secs(config.launch_timeout_secs),
    ));
    let authorizer: Arc<dyn acl::Authorizer> = Arc::new(acl::Unsecured);

    health::HealthMonitor::new(
        registry.clone(),
        Arc::clone(&connection_launcher),
        config.health_check_interval_secs,
    )
    .start();

    let state = AppState {
        registry,
        launcher: connection_launcher,
        authorizer,
    };
    let router = api::create_router(state);

    let addr = config.bind_addr();
    info!("Controller listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind server address");
    axum::serve(listener, router).await.expect("server error");
}
