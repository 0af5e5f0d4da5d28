mod chat;
mod config;
mod history;
mod nodes;
mod scan;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use meshdesk_core::{
    JsonFileStore, MemoryStore, MeshtasticTransport, NotificationLoop, SessionManager, Store,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::output::OutputFormat;

pub(crate) type Session<S> = SessionManager<MeshtasticTransport, S>;

pub async fn handle_command(cli: Cli) -> Result<()> {
    if cli.no_store {
        debug!("Using in-memory store");
        run(cli, Arc::new(MemoryStore::new())).await
    } else {
        let path = match &cli.store {
            Some(path) => path.clone(),
            None => default_store_path()?,
        };
        debug!("Using store at {}", path.display());
        let store = JsonFileStore::open(path)?;
        run(cli, Arc::new(store)).await
    }
}

async fn run<S: Store>(cli: Cli, store: Arc<S>) -> Result<()> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let config = cli.session_config();
    let open_session = || -> (Session<S>, NotificationLoop) {
        SessionManager::new(MeshtasticTransport::new(), Arc::clone(&store), config)
    };

    match cli.command {
        Commands::Scan => {
            let (session, _) = open_session();
            scan::handle_scan(&session, format).await
        }
        Commands::Chat {
            address,
            channel,
            to,
        } => {
            let (session, notifications) = open_session();
            chat::handle_chat(
                &session,
                notifications,
                &address,
                channel,
                to.as_deref(),
                format,
            )
            .await
        }
        Commands::Nodes => nodes::handle_nodes(store.as_ref(), format),
        Commands::History { channel, limit } => {
            history::handle_history(store.as_ref(), channel, limit, format)
        }
        Commands::Config {
            address,
            region,
            preset,
        } => {
            let (session, _) = open_session();
            config::handle_config(&session, &address, region, preset, format).await
        }
    }
}

fn default_store_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "meshdesk", "meshdesk")
        .context("Could not determine a data directory; pass --store")?;
    Ok(dirs.data_dir().join("meshdesk.json"))
}
