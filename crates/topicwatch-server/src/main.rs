mod api;
mod middleware;
mod scheduler;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use topicwatch_collect::{CollectorConfig, SharedTopicCollector};
use topicwatch_digest::{BrevoSender, EmailSender};
use topicwatch_sources::{default_fetchers, FetchConfig};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    scheduler::JobContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(topicwatch_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = topicwatch_db::PoolConfig::from_app_config(&config);
    let pool = topicwatch_db::connect_pool(&config.database_url, pool_config).await?;
    topicwatch_db::run_migrations(&pool).await?;

    let fetchers = default_fetchers(&FetchConfig::from_app_config(&config))?;
    let collector = Arc::new(SharedTopicCollector::new(
        pool.clone(),
        fetchers,
        CollectorConfig::from_app_config(&config),
    ));

    let sender: Option<Arc<dyn EmailSender>> = match &config.brevo {
        Some(brevo) => Some(Arc::new(BrevoSender::new(brevo)?)),
        None => {
            tracing::warn!("BREVO_API not set; scheduled digests are disabled");
            None
        }
    };

    let _scheduler = scheduler::start_scheduler(JobContext {
        pool: pool.clone(),
        collector: Arc::clone(&collector),
        sender,
        config: Arc::clone(&config),
    })
    .await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        topicwatch_core::Environment::Development
    ))?;
    let auth_enforced = auth.is_enforced();
    let app = build_app(AppState { pool, collector }, auth, default_rate_limit_state());

    tracing::info!(addr = %config.bind_addr, auth_enforced, "listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
