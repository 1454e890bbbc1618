//! Headless frontend for the Telecast backend.
//!
//! Runs the full startup sequence and waits for one of the two terminal
//! signals: exit code 0 on startup-success, 1 on startup-failure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{unbounded, Sender};

use telecast_runtime::config::{JsonFileBackend, PlatformBackend};
use telecast_runtime::system::signals::SystemSubscriber;
use telecast_runtime::Runtime;

use telecast_core::prefs;

/// Telecast backend runner
///
/// Starts the backend and reports whether it came up.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Support directory holding preferences and the database
    #[clap(long)]
    config_dir: Option<PathBuf>,

    /// Theme to start with
    #[clap(long)]
    theme: Option<String>,

    /// Movies directory override
    #[clap(long)]
    movies_dir: Option<PathBuf>,

    /// Feed URLs to subscribe to once startup completes
    args: Vec<String>,
}

enum Outcome {
    Success,
    Failure(String, String),
}

struct OutcomeSubscriber {
    tx: Sender<Outcome>,
}

impl SystemSubscriber for OutcomeSubscriber {
    fn on_startup_success(&self) {
        let _ = self.tx.send(Outcome::Success);
    }

    fn on_startup_failure(&self, summary: &str, description: &str) {
        let _ = self
            .tx
            .send(Outcome::Failure(summary.to_string(), description.to_string()));
    }
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("telecast: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let backend = match cli.config_dir {
        Some(dir) => JsonFileBackend::new(dir)?,
        None => JsonFileBackend::discover()?,
    };
    if let Some(movies_dir) = cli.movies_dir {
        backend.set(&prefs::MOVIES_DIRECTORY, movies_dir.into())?;
    }

    let runtime = Runtime::new(Arc::new(backend))?;

    let (tx, rx) = unbounded();
    runtime
        .signals
        .add_subscriber(Arc::new(OutcomeSubscriber { tx }));
    runtime.startup.queue_command_line_args(cli.args);

    runtime.initialize(cli.theme.as_deref())?;
    runtime.startup()?;

    let code = match rx.recv_timeout(Duration::from_secs(30)) {
        Ok(Outcome::Success) => {
            println!("startup complete");
            0
        }
        Ok(Outcome::Failure(summary, description)) => {
            eprintln!("{}: {}", summary, description);
            1
        }
        Err(_) => {
            eprintln!("startup reached no outcome within 30s");
            2
        }
    };

    runtime.store.save()?;
    runtime.shutdown();
    Ok(code)
}
