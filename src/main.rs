use std::sync::Arc;

use colored::Colorize;
use config::Config;
use log::{error, info, warn};
use musicroom_collab::{Collab, Database, DatabaseError, MemoryDatabase, PgDatabase};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

use crate::logging::LogColor;

mod config;
mod logging;

pub struct Musicroom {
    config: Config,
    collab: Collab,
    runtime: Runtime,
}

#[derive(Debug, Error)]
pub enum MusicroomError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Musicroom {
    fn new() -> Result<Self, MusicroomError> {
        let config = Config::from_env()?;

        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("musicroom-async")
            .build()
            .map_err(|e| MusicroomError::Fatal(e.to_string()))?;

        let database: Arc<dyn Database> = match &config.database_url {
            Some(url) => {
                info!("Connecting to database...");
                let database = runtime.block_on(PgDatabase::new(url, config.max_connections))?;

                Arc::new(database)
            }
            None => {
                warn!("DATABASE_URL is not set, rooms are kept in memory and lost on exit");
                Arc::new(MemoryDatabase::new())
            }
        };

        let collab = Collab::new(database, config.collab());

        Ok(Self {
            config,
            collab,
            runtime,
        })
    }

    fn run(self) -> Result<(), MusicroomError> {
        let Self {
            config,
            collab,
            runtime,
        } = self;

        runtime
            .block_on(musicroom_server::run_server(collab, config.port))
            .map_err(|e| MusicroomError::Fatal(e.to_string()))
    }
}

impl MusicroomError {
    fn hint(&self) -> String {
        match self {
            MusicroomError::Config(_) => "Check the MUSICROOM_* and DATABASE_URL environment variables, then try again.".to_string(),
            MusicroomError::Database(_) => "This is a database error. Make sure the Postgres instance in DATABASE_URL is running and reachable, or unset DATABASE_URL to run in memory.".to_string(),
            MusicroomError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn report(error: MusicroomError) {
    error!(
        "{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it.",
        "Musicroom failed!".bold().color(LogColor::RED)
    );
    error!("{}", error);
    error!(
        "{}",
        format!("Hint: {}", error.hint())
            .color(LogColor::DIMMED)
            .italic()
    );
}

fn main() {
    if let Err(err) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", err);
    }

    match Musicroom::new() {
        Ok(musicroom) => {
            info!("Initialized successfully.");

            if let Err(error) = musicroom.run() {
                report(error);
            }
        }
        Err(error) => report(error),
    }
}
