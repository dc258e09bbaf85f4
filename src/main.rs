use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use help_reasoner::config::AppConfig;
use help_reasoner::controller::{run_ingest_loop, Controller};
use help_reasoner::logging::init_tracing;
use help_reasoner::reasoner::Reasoner;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = AppConfig::from_env();
    let _log_guard = init_tracing(&config.log_level);

    let reasoner = match Reasoner::new(config.reasoner.clone()) {
        Ok(reasoner) => reasoner,
        Err(e) => {
            tracing::error!(error = %e, "reasoner not initialized");
            std::process::exit(2);
        }
    };
    let controller = match Controller::new(reasoner) {
        Ok(controller) => controller,
        Err(e) => {
            tracing::error!(error = %e, "controller not initialized");
            std::process::exit(2);
        }
    };
    tracing::info!(model = ?config.reasoner.model, "help-reasoner reading stdin");

    let (line_tx, line_rx) = mpsc::channel::<String>(256);
    let (action_tx, mut action_rx) = mpsc::channel(256);

    let ingest = tokio::spawn(run_ingest_loop(controller.clone(), line_rx, action_tx));

    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(action) = action_rx.recv().await {
            let line = format!("{action}\n");
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                tracing::warn!(error = %e, "stdout closed");
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let reader = async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => {},
        _ = shutdown_signal() => tracing::info!("Interrupted"),
    }
    drop(line_tx);

    let _ = ingest.await;
    let _ = printer.await;

    match serde_json::to_string(&controller.snapshot()) {
        Ok(status) => tracing::info!(%status, "Final reasoner status"),
        Err(e) => tracing::warn!(error = %e, "status not serializable"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
