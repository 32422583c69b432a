mod automation;
mod chat;
mod cli;
mod config;
mod entity;
mod gym;
mod instagram;
mod llm;
mod ops;
mod store;
mod utils;
mod webhook;

use anyhow::{Context, Result};
use automation::AutomationEngine;
use chat::{EvolutionMessenger, Messenger, Pipeline, TwilioMessenger};
use clap::Parser;
use cli::{Cli, Command};
use config::Config;
use gym::{Outbox, OutboxKind};
use instagram::{GraphClient, MentionHandler, OAuthFlow, OAuthSettings, StoryLookup};
use std::sync::Arc;
use store::Store;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(command: Command) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries protocol frames in ops mode.
    if command == Command::Ops {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.command);

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let store = Store::open(&config.db_path()).await?;

    match cli.command {
        Command::Serve => serve(config, store).await,
        Command::Ops => ops(config, store).await,
        Command::Sync { discard } => sync(config, store, discard).await,
    }
}

async fn serve(config: Config, store: Arc<Store>) -> Result<()> {
    let responder = llm::create_responder(&config)?;
    let twilio = config
        .twilio
        .clone()
        .map(|c| Arc::new(TwilioMessenger::new(c)) as Arc<dyn Messenger>);
    let evolution = config
        .evolution
        .clone()
        .map(|c| Arc::new(EvolutionMessenger::new(c)) as Arc<dyn Messenger>);
    let pipeline = Pipeline::new(store.clone(), responder, twilio, evolution);

    let outbox = Arc::new(Outbox::open(config.outbox_path()).await?);
    if config.replay_outbox_on_start && outbox.len().await > 0 {
        let report = outbox.drain(store.as_ref()).await?;
        info!(failed = report.failed(), "Replayed queued gym writes");
    }

    let mut engine = None;
    let (mentions, oauth, verify_token) = match &config.instagram {
        Some(settings) => {
            let graph = Arc::new(GraphClient::new(settings));
            let oauth = OAuthSettings::from_config(settings)
                .map(|settings| OAuthFlow::new(store.clone(), graph.clone(), settings));
            if config.automation.enabled {
                let automation =
                    AutomationEngine::new(store.clone(), graph.clone(), config.automation.clone());
                automation.start().await?;
                engine = Some(automation);
            }
            (
                Some(MentionHandler::new(store.clone(), graph)),
                oauth,
                Some(settings.verify_token.clone()),
            )
        }
        None => {
            warn!("No [instagram] section, story verification routes are disabled");
            (None, None, None)
        }
    };

    let state = Arc::new(webhook::AppState {
        store,
        pipeline,
        mentions,
        oauth,
        verify_token,
        outbox,
    });

    webhook::serve(&config.bind, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    })
    .await?;

    if let Some(engine) = engine
        && let Err(e) = engine.stop().await
    {
        warn!("Failed to stop automation: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

async fn ops(config: Config, store: Arc<Store>) -> Result<()> {
    let settings = config
        .instagram
        .as_ref()
        .context("The ops server needs an [instagram] section")?;
    let graph = Arc::new(GraphClient::new(settings));
    if let Err(e) = graph.health_check().await {
        warn!("Instagram API health check failed: {:#}", e);
    }

    let engine = AutomationEngine::new(store, graph, config.automation.clone());
    let toolbox = ops::Toolbox::new(engine.clone());
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = ops::serve(&toolbox, stdin, tokio::io::stdout()) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    if engine.is_running().await {
        engine.stop().await?;
    }
    Ok(())
}

async fn sync(config: Config, store: Arc<Store>, discard: Option<OutboxKind>) -> Result<()> {
    let outbox = Outbox::open(config.outbox_path()).await?;
    if let Some(kind) = discard {
        let dropped = outbox.pending(kind).await.len();
        outbox.clear(kind).await?;
        warn!(?kind, dropped, "Discarded queued intents");
    }
    let queued = outbox.len().await;
    let report = outbox.drain(store.as_ref()).await?;
    info!(queued, "Sync finished");

    let summary = serde_json::json!({
        "report": report,
        "remaining": outbox.len().await,
        "lastSync": outbox.last_sync().await,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
