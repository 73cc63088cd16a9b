//! HTTP server facade with Axum, bearer auth, error handling, and OpenAPI support.

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use school_authz::TokenAuthority;
use school_kernel::{settings::Settings, ModuleRegistry};

pub mod auth;
pub mod error;
pub mod router;

use auth::AuthGate;
use router::RouterBuilder;

/// Start the HTTP server and serve until `shutdown` resolves.
pub async fn start_server(
    app: Router,
    settings: &Settings,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let address = format!("{}:{}", settings.server.host, settings.server.port);
    tracing::info!("starting HTTP server on {}", address);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;

    tracing::info!("HTTP server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(
    registry: &ModuleRegistry,
    settings: &Settings,
    authority: Arc<TokenAuthority>,
) -> Router {
    let mut router_builder = RouterBuilder::new()
        .with_bearer_auth(AuthGate::new(authority))
        .with_tracing()
        .with_cors()
        .with_request_id()
        .with_timeout(settings.server.request_timeout_ms)
        .route("/healthz", get(health_check));

    for module in registry.modules() {
        let module_name = module.name();
        tracing::info!(
            module = module_name,
            "mounting module routes under /api/{}",
            module_name
        );
        router_builder = router_builder
            .mount_module(module_name, module.routes())
            .merge_root(module.root_routes());
    }

    router_builder.with_openapi(registry).build()
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
