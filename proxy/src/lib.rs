//! Request-time side of the gateway: authentication, permission checks and
//! dispatch to the backend components.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod evaluator;
pub mod factory;
pub mod forward;
pub mod metrics_defs;
pub mod resolvers;
pub mod service;
pub mod tenants;
pub mod upstream;

#[cfg(test)]
mod testutils;

pub use errors::ProxyError;
pub use service::{Gateway, GatewayService};

use shared::admin_service::AdminService;
use shared::http::{run_http_service, serve};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;

/// Serves the gateway and the admin listener until either fails.
///
/// `/ready` reports ready once the gateway is built and its listener bound.
pub async fn run(config: config::Config) -> Result<(), ProxyError> {
    config.validate()?;
    shared::metrics_defs::describe_all(metrics_defs::ALL_METRICS);

    let ready = Arc::new(AtomicBool::new(false));
    let admin_service = AdminService::new({
        let ready = ready.clone();
        move || ready.load(Ordering::Relaxed)
    });
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    let gateway_task = async {
        let gateway = Arc::new(Gateway::from_config(&config)?);
        let listener =
            TcpListener::bind((config.listener.host.as_str(), config.listener.port)).await?;
        tracing::info!(
            host = %config.listener.host,
            port = config.listener.port,
            "gateway listening"
        );
        ready.store(true, Ordering::Relaxed);
        serve(listener, GatewayService::new(gateway)).await?;
        Ok::<_, ProxyError>(())
    };

    tokio::try_join!(gateway_task, async { admin_task.await.map_err(ProxyError::from) })?;
    Ok(())
}
