use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinError;

use deployd_pipeline::ServiceManager;

use crate::config::{bootstrap, DaemonConfig};
use crate::error::{io_err, DaemonError};
use crate::handler::dispatch;
use crate::protocol::{Request, Response};

/// Set to `json` for one JSON object per log line.
const LOG_FORMAT_ENV: &str = "DEPLOYD_LOG_FORMAT";

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(config: DaemonConfig) -> Result<(), DaemonError> {
    init_tracing();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("deployd runtime", e))?
        .block_on(run(config))
}

/// Bootstrap from `config`, bind, and serve until ctrl-c or a `shutdown`
/// request.
pub async fn run(config: DaemonConfig) -> Result<(), DaemonError> {
    let boot = joined(
        "bootstrap",
        tokio::task::spawn_blocking(move || bootstrap(&config)).await,
    )??;

    let listener = TcpListener::bind(boot.addr)
        .await
        .map_err(|e| io_err(boot.addr.to_string(), e))?;
    tracing::info!(addr = %boot.addr, services = boot.manager.list().len(), "deployd listening");

    let (stop_tx, _) = broadcast::channel::<()>(4);

    let server = tokio::spawn({
        let stop = stop_tx.clone();
        let manager = boot.manager.clone();
        async move {
            let served = serve(listener, manager, stop.clone()).await;
            // Wake the signal watcher even when the server failed.
            let _ = stop.send(());
            served
        }
    });
    let signals = tokio::spawn(watch_ctrl_c(stop_tx.clone()));

    let (server, signals) = tokio::join!(server, signals);
    joined("server", server)??;
    joined("ctrl-c watcher", signals)??;
    Ok(())
}

/// Resolve once ctrl-c arrives (broadcasting `stop`) or someone else stops
/// the daemon first.
async fn watch_ctrl_c(stop: broadcast::Sender<()>) -> Result<(), DaemonError> {
    let mut stopped = stop.subscribe();
    tokio::select! {
        _ = stopped.recv() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| io_err("ctrl-c handler", e))?;
            tracing::info!("ctrl-c received, stopping");
            let _ = stop.send(());
            Ok(())
        }
    }
}

/// Accept clients on `listener` until `stop` fires. Each client runs on
/// its own task; each request on a blocking worker.
pub async fn serve(
    listener: TcpListener,
    manager: Arc<ServiceManager>,
    stop: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let local = listener
        .local_addr()
        .map_err(|e| io_err("deployd listener", e))?;
    let mut stopped = stop.subscribe();

    loop {
        let (stream, peer) = tokio::select! {
            _ = stopped.recv() => break,
            accepted = listener.accept() => accepted.map_err(|e| io_err(local.to_string(), e))?,
        };
        let manager = manager.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, peer, manager, stop).await {
                tracing::warn!(%peer, error = %err, "client connection ended with error");
            }
        });
    }

    tracing::info!(addr = %local, "deployd stopped");
    Ok(())
}

/// Serve one connection: any number of request lines, one response line
/// each. A `shutdown` request is answered before the daemon stops.
async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    manager: Arc<ServiceManager>,
    stop: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(e) => return Err(io_err(peer.to_string(), e)),
        };
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<Request>(&line) {
            Ok(request) => request,
            Err(err) => {
                let reply = Response::error(format!("invalid request JSON: {err}"));
                write_response(&mut writer, &reply).await?;
                continue;
            }
        };

        let cmd = request.name();
        let stopping = matches!(request, Request::Shutdown);
        tracing::debug!(%peer, cmd, "request received");

        let manager = manager.clone();
        let reply = tokio::task::spawn_blocking(move || dispatch(&manager, request))
            .await
            .unwrap_or_else(|err| Response::error(format!("{cmd} worker panicked: {err}")));
        write_response(&mut writer, &reply).await?;

        if stopping {
            tracing::info!(%peer, "shutdown requested");
            let _ = stop.send(());
            return Ok(());
        }
    }
}

/// Frame `response` as one JSON line.
async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<(), DaemonError> {
    let mut frame = serde_json::to_vec(response)?;
    frame.push(b'\n');
    writer
        .write_all(&frame)
        .await
        .map_err(|e| io_err("response write", e))?;
    writer.flush().await.map_err(|e| io_err("response write", e))
}

fn joined<T>(task: &str, result: Result<T, JoinError>) -> Result<T, DaemonError> {
    result.map_err(|err| DaemonError::Protocol(format!("{task} task failed: {err}")))
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
