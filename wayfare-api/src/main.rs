use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use wayfare_api::cli::{self, App, Cli};
use wayfare_api::{ApiClient, BackendIdentitySync};
use wayfare_session::{GoTrueProvider, SessionManager};
use wayfare_store::{Config, LocalStores};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wayfare=info,wayfare_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load config")?;
    tracing::info!(backend = %config.api.backend_url, storage = ?config.storage.backend, "Starting wayfare");

    let stores = LocalStores::from_config(&config).await.context("Failed to open local stores")?;
    let provider = Arc::new(GoTrueProvider::new(&config.auth)?);

    // Identity sync gets its own client so it never re-enters the session
    let identity = Arc::new(BackendIdentitySync::new(ApiClient::new(&config.api, None)?));
    let session = Arc::new(
        SessionManager::new(provider, stores.clone(), config.session.clone()).with_identity_sync(identity),
    );

    let redirect = cli.redirect_url.as_deref().map(Url::parse).transpose()?;
    let state = session.initialize(redirect.as_ref()).await?;
    tracing::debug!(authenticated = state.is_authenticated(), "Session initialised");
    let _refresh_timer = session.start_refresh_timer();

    let app = App {
        client: ApiClient::new(&config.api, Some(session.clone()))?,
        session,
        stores,
        stream: config.stream.clone(),
    };
    cli::run(cli.command, &app).await
}
