//! Tail Supervisor - supervised, fault-tolerant tailing of many files at once.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tail_supervisor::config::{ConfigError, ConfigLoader, WatchBackend};
use tail_supervisor::console::{validate_path, ConsoleCommand};
use tail_supervisor::display;
use tail_supervisor::reporter::Reporter;
use tail_supervisor::supervisor::{CoordinatorHandle, TailCoordinator};

#[derive(Parser)]
#[command(
    name = "tail-supervisor",
    about = "Supervised, fault-tolerant tailing of many files at once",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail files, streaming new lines as they are written.
    Tail {
        /// Files to tail.
        paths: Vec<PathBuf>,
        /// Use the polling watcher instead of native notifications.
        #[arg(long)]
        poll: bool,
        /// Config file to load instead of the default search paths.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Read further commands from stdin.
        #[arg(short, long)]
        interactive: bool,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Tail {
            paths,
            poll,
            config,
            interactive,
        } => {
            if let Err(e) = run_tail(paths, poll, config, interactive).await {
                display::print_error(&e.to_string());
                std::process::exit(1);
            }
        }
    }
}

async fn run_tail(
    paths: Vec<PathBuf>,
    poll: bool,
    config_path: Option<PathBuf>,
    interactive: bool,
) -> Result<(), ConfigError> {
    let loader = config_path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut config = loader.load()?;
    if poll {
        config.watcher.backend = WatchBackend::Poll;
    }
    tracing::info!(
        backend = ?config.watcher.backend,
        max_restarts = config.restart.max_restarts,
        window_secs = config.restart.window_secs,
        "Starting tail supervisor"
    );

    let (handle, coordinator) = TailCoordinator::spawn(config);
    let (reporter, mut reports) = Reporter::channel();

    let renderer = tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            display::print_report(&report);
        }
    });

    for path in &paths {
        start(&handle, &reporter, path).await;
    }

    if interactive || paths.is_empty() {
        console_loop(&handle, &reporter).await;
    } else if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
    }

    handle.shutdown();
    if let Err(e) = coordinator.await {
        tracing::warn!(error = %e, "Coordinator task failed");
    }
    drop(reporter);
    let _ = renderer.await;
    Ok(())
}

/// Read console commands until `exit`, end of input, or Ctrl-C.
async fn console_loop(handle: &CoordinatorHandle, reporter: &Reporter) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    display::print_instructions();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read console input");
                break;
            }
        };

        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Tail(path) => start(handle, reporter, &path).await,
            ConsoleCommand::Stop(path) => match handle.stop_tail(&path).await {
                Ok(true) => {}
                Ok(false) => display::print_error(&format!("Not tailing: {}", path.display())),
                Err(e) => display::print_error(&e.to_string()),
            },
            ConsoleCommand::List => match handle.active_tails().await {
                Ok(paths) => display::print_active(&paths),
                Err(e) => display::print_error(&e.to_string()),
            },
            ConsoleCommand::Help => display::print_instructions(),
            ConsoleCommand::Exit => break,
            ConsoleCommand::Empty => {}
        }
    }
}

/// Validate `path` and ask the coordinator to tail it.
async fn start(handle: &CoordinatorHandle, reporter: &Reporter, path: &Path) {
    if let Err(e) = validate_path(path) {
        display::print_error(&e.to_string());
        return;
    }

    match handle.start_tail(path, reporter.clone()).await {
        Ok(ticket) => {
            let path = ticket.path().to_path_buf();
            display::print_tail_started(&path);
            tokio::spawn(async move {
                let outcome = ticket.ended().await;
                display::print_tail_ended(&path, &outcome);
            });
        }
        Err(e) => display::print_error(&e.to_string()),
    }
}
