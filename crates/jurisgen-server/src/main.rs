#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use tracing::{info, warn};

use jurisgen_core::{ai_configured, ContractStore, RuleTable};
use jurisgen_generate::LlmGenerator;
use jurisgen_server::logging::init_tracing;
use jurisgen_server::{router, ContractService, DatabaseLocation, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let rules = match &config.rules_path {
        Some(path) => RuleTable::load(path)
            .with_context(|| format!("failed to load rules from {}", path.display()))?,
        None => RuleTable::builtin().context("built-in rule table is invalid")?,
    };

    let store = match &config.database {
        DatabaseLocation::InMemory => {
            warn!("using an in-memory database; records are lost on exit");
            ContractStore::open_in_memory()?
        }
        DatabaseLocation::File(path) => ContractStore::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?,
    };

    if !ai_configured(&config.ai) {
        warn!(
            provider = %config.ai.provider,
            "no AI API key configured; generation requests will fail"
        );
    }
    let generator = LlmGenerator::new(config.ai.clone(), config.generation_timeout);

    let cors_origin = match &config.frontend_url {
        Some(url) => Some(
            HeaderValue::from_str(url).with_context(|| format!("invalid FRONTEND_URL {url}"))?,
        ),
        None => None,
    };

    let service = Arc::new(ContractService::new(store, Arc::new(rules), Arc::new(generator)));
    let app = router(service, cors_origin);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(
        addr = %config.addr,
        provider = %config.ai.provider,
        model = %config.ai.model,
        timeout_secs = config.generation_timeout.as_secs(),
        "jurisgen server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
