use std::time::Duration;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use serial_adapter::{
    cli, config::Config, logging, transport::serial::SerialTransport, ConnectOptions,
    SerialAdapter,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::oneshot,
};
use tracing::{debug, error, info, warn, Level};

#[cfg(unix)]
async fn hangup() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::hangup())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn hangup() -> Result<()> {
    futures::future::pending().await
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();

    if let Some(command) = cli.command {
        cli::handle_command(command);

        return Ok(());
    }

    logging::init(Level::INFO, cli.log_dir.map(|dir| (Level::DEBUG, dir)));

    let config = if let Some(config_path) = cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)?
    } else {
        debug!("Default config");
        Config::default()
    };

    let port = cli
        .port
        .ok_or_else(|| eyre!("No port given, see --help"))?;

    let adapter = SerialAdapter::new(SerialTransport::new(&port), config)?;

    let (connected_tx, connected_rx) = oneshot::channel();
    adapter.connect(&port, ConnectOptions::with_bitrate(cli.bitrate), move |result| {
        let _ = connected_tx.send(result);
    });
    let connection = connected_rx.await??;
    info!(
        connection_id = %connection.connection_id,
        bitrate = connection.bitrate,
        "Connected to {port}"
    );

    adapter.on_receive().add_listener(|received| {
        print!("{}", String::from_utf8_lossy(&received.data));
    });
    adapter.on_receive_error().add_listener(|received| {
        error!(error = ?received.error, "Read error");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let hangup = hangup();
    tokio::pin!(hangup);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C, quitting");
                break;
            }
            _ = &mut hangup => {
                info!("Told to hang up, quitting");
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => adapter.send(format!("{line}\n").into_bytes(), |sent| {
                    debug!(bytes_sent = sent.bytes_sent, "Line written");
                }),
                None => {
                    info!("Stdin closed, quitting");
                    break;
                }
            }
        }
    }

    let (closed_tx, closed_rx) = oneshot::channel();
    adapter.disconnect(move |closed| {
        let _ = closed_tx.send(closed);
    });

    match tokio::time::timeout(Duration::from_secs(2), closed_rx).await {
        Ok(Ok(true)) => info!("Disconnected"),
        _ => warn!("Could not disconnect cleanly"),
    }

    Ok(())
}
