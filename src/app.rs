//! Application bootstrap: database, migrations, module lifecycle, HTTP.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use school_authz::TokenAuthority;
use school_kernel::{settings::Settings, InitCtx, ModuleRegistry};
use sqlx::SqlitePool;

use crate::modules;

/// A fully initialized application, ready to serve.
pub struct App {
    pub registry: ModuleRegistry,
    pub router: Router,
    pub pool: SqlitePool,
}

/// Register modules, apply migrations, run module init/start and build the
/// HTTP router on top of an existing pool.
pub async fn build_app(settings: &Settings, pool: SqlitePool) -> anyhow::Result<App> {
    let authority = TokenAuthority::new(settings.auth.jwt_secret.as_bytes())
        .context("auth.jwt_secret must be configured")?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &pool, settings)?;

    let applied = school_db::migrate(&pool, &registry.collect_migrations()).await?;
    tracing::info!(applied, "migrations complete");

    let ctx = InitCtx {
        settings,
        db: &pool,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let router = school_http::build_router(&registry, settings, Arc::new(authority));

    Ok(App {
        registry,
        router,
        pool,
    })
}

/// Apply pending migrations and exit.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let pool = school_db::connect(&settings.database).await?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &pool, settings)?;

    let applied = school_db::migrate(&pool, &registry.collect_migrations()).await?;
    pool.close().await;
    Ok(applied)
}

/// Run the service until Ctrl-C.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "school-app bootstrap starting"
    );

    let pool = school_db::connect(&settings.database).await?;
    let app = build_app(settings, pool).await?;

    tracing::info!("school-app bootstrap complete");

    school_http::start_server(app.router, settings, shutdown_signal()).await?;

    app.registry.stop_modules().await?;
    app.pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
