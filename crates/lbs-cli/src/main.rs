//! LBS central client entry point

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use lbs_client::{
    BtleTransport, LogDelegate, PeripheralIdentity, Session, SessionConfig, SessionEnd,
    SessionError,
};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = SessionConfig::default()
        .with_target(PeripheralIdentity {
            address: cli.address,
            display_name: cli.name.clone(),
        })
        .with_scan_timeout(Duration::from_secs(cli.scan_timeout));

    info!("=== connecting to {} ===", cli.name);

    let transport = BtleTransport::new(config.scan_timeout);
    let delegate = Arc::new(LogDelegate::new());

    let mut session = match Session::establish(transport, config, delegate).await {
        Ok(session) => session,
        Err(e @ SessionError::ConnectFailed { .. }) => {
            error!("unable to connect: {}", e);
            std::process::exit(1);
        }
        // Post-connect setup failures have already released the connection;
        // only a connect failure exits non-zero.
        Err(e) => {
            error!("setup failed: {}", e);
            return;
        }
    };

    let end = tokio::select! {
        outcome = session.run() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("stopped by user");
            Ok(SessionEnd::Interrupted)
        }
    };

    // Finalization runs on every path; its own failures are discarded.
    session.shutdown().await;

    match end {
        Ok(SessionEnd::LinkLost) => info!("session ended: device disconnected"),
        Ok(SessionEnd::Interrupted) => info!("session ended: interrupted"),
        // Steady-state failures end the session but are not a process-level
        // error; only connection establishment exits non-zero.
        Err(e) => error!("session ended: {}", e),
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
