//! notype pill binary - composition root.
//!
//! 1. Parse the CLI and load the client configuration
//! 2. Initialize tracing
//! 3. Locate the bridge transport (session bus, or the simulated backend)
//! 4. Run the requested subcommand; `watch` drives a [`SessionClient`]
//!    until Ctrl-C

mod cli;
mod dbus;
mod hotkey;
mod offline;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use notype_core::config::ClientConfig;
use notype_session::transport::TransportProbe;
use notype_session::{Bridge, PointerTarget, SessionClient};

use cli::{CliArgs, Command};

async fn connect(args: &CliArgs, config: &ClientConfig) -> Bridge {
    if args.offline {
        tracing::info!("Offline mode: using the simulated backend");
        return Bridge::with_transport(offline::simulated_backend());
    }
    let probes: Vec<Box<dyn TransportProbe>> =
        vec![Box::new(dbus::DbusProbe::new(config.bus.clone()))];
    Bridge::probe(&probes).await
}

/// Run the pill session, printing every status change.
///
/// Lines on stdin drive the pill: `t` toggles, `s` opens settings, `d`
/// re-checks dependencies, `m` simulates a drag of the pill, `q` quits.
async fn watch(client: Arc<SessionClient>) {
    let mut views = client.watch();
    client.startup().await;
    println!("{}", client.view());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                println!("{view}");
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_input(&client, line.trim()).await {
                            break;
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        tracing::debug!(error = %e, "stdin closed");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    client.teardown();
}

/// Returns `false` when the user asked to quit.
async fn handle_input(client: &SessionClient, input: &str) -> bool {
    match input {
        "t" | "toggle" => {
            let action = client.toggle().await;
            tracing::debug!(?action, "Toggle handled");
        }
        "s" | "settings" => {
            // Failure is already shown in the hint.
            let _ = client.open_settings().await;
        }
        "d" | "deps" => {
            client.check_dependencies().await;
        }
        "m" | "move" => {
            client.position().pointer_down(PointerTarget::Surface).await;
            if let Some(position) = client.position().pointer_up().await {
                println!("pill position saved: {}, {}", position.x, position.y);
            }
        }
        "q" | "quit" => return false,
        "" => {}
        other => println!("unknown input {other:?} (t, s, d, m, q)"),
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_path = args.resolve_config_path();
    let config = ClientConfig::load_or_default(&config_path);

    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!(
        config = %config_path.display(),
        command = ?args.command(),
        "notype pill starting"
    );

    match args.command() {
        Command::Toggle => hotkey::toggle(&config.bus).await,
        Command::ShowSettings => hotkey::call_control(&config.bus, hotkey::SHOW_SETTINGS).await?,
        Command::Quit => hotkey::call_control(&config.bus, hotkey::QUIT).await?,
        Command::Watch => {
            let client = SessionClient::new(connect(&args, &config).await, &config);
            watch(client).await;
        }
        Command::Deps => {
            let client = SessionClient::new(connect(&args, &config).await, &config);
            for line in client.dependency_report().await? {
                println!("{line}");
            }
        }
        Command::EnsureAutoType => {
            let client = SessionClient::new(connect(&args, &config).await, &config);
            if client.ensure_auto_type().await? {
                println!("autoType was off; enabled");
            } else {
                println!("autoType already on");
            }
        }
    }

    Ok(())
}
