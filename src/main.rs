use clap::Parser;
use std::process::ExitCode;
use tokio::signal;
use toolsmith::cli::{execute, Cli};
use toolsmith::state::{process_runner, AppState};
use toolsmith::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries command output.
    let json_logs = std::env::var("TOOLSMITH_LOG_FORMAT").is_ok_and(|v| v == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolsmith=info".into()),
        )
        .with(json_logs.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(tools_dir) = cli.tools_dir {
        config.tools_dir = tools_dir;
    }
    if let Some(log_file) = cli.log_file {
        config.creation_log_path = log_file;
    }

    // Generated tests call back into this binary to invoke tool functions.
    let mut runner = process_runner(&config);
    if let Ok(exe) = std::env::current_exe() {
        runner = runner.with_env("TOOLSMITH_BIN", exe.display().to_string());
    }

    let mut state = AppState::with_runner(config, Box::new(runner))?;
    let ok = execute(cli.command, &mut state, shutdown_signal()).await?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping");
        }
    }
}
