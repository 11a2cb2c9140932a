use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use triage_core::JobId;
use triage_engine::ServiceSettings;

use crate::logging::LogDestination;

const WATCH_LOG_FILE: &str = "./triage.log";

#[derive(Parser, Debug)]
#[command(name = "triage")]
#[command(about = "Follow email analysis jobs as their verdicts stream in")]
#[command(version)]
pub struct Cli {
    /// Backend base URL
    #[arg(long, global = true, default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Write logs to this file (`watch` defaults to ./triage.log)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show every job and keep the view live until Ctrl-C
    Watch {
        /// Show the detail of this job
        #[arg(long)]
        job: Option<JobId>,

        /// Minimum time between two redraws, in milliseconds
        #[arg(long, default_value_t = 250)]
        tick_ms: u64,
    },

    /// Upload raw emails for analysis
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the raw email of a job
    Email { id: JobId },
}

impl Cli {
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            base_url: self.base_url.clone(),
            ..ServiceSettings::default()
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    /// `watch` owns the terminal, so it always logs to a file, `./triage.log` by default.
    pub fn log_destination(&self) -> LogDestination {
        match (&self.log_file, &self.command) {
            (Some(path), Command::Watch { .. }) => LogDestination::File(path.clone()),
            (None, Command::Watch { .. }) => LogDestination::File(PathBuf::from(WATCH_LOG_FILE)),
            (Some(path), _) => LogDestination::Both(path.clone()),
            (None, _) => LogDestination::Terminal,
        }
    }
}
