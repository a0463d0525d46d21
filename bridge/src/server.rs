use std::net::SocketAddr;

use minion_proto::{Message, RobotRequest, RobotResponse};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

use minion_core::RequestError;

use crate::{codec, convert, BridgeError, BridgeState, ConnectionInfo, Result};

/// Running server. Dropping it closes everything without waiting.
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop_accepting: watch::Sender<bool>,
    close: watch::Sender<bool>,
    task: JoinHandle<()>,
    state: BridgeState,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.len()
    }

    /// Stop accepting new connections. Open connections keep working.
    pub fn stop_accepting(&self) {
        let _ = self.stop_accepting.send(true);
    }

    /// Close every connection and wait for their tasks to end.
    pub async fn shutdown(self) {
        let _ = self.stop_accepting.send(true);
        let _ = self.close.send(true);
        if let Err(e) = self.task.await {
            warn!(target: "bridge", error = %e, "Accept task failed");
        }
        info!(target: "bridge", addr = %self.local_addr, "Bridge server shut down");
    }
}

/// Bind `addr` and serve clients in the background.
pub async fn start_server(addr: SocketAddr, state: BridgeState) -> Result<ServerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BridgeError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;
    let (stop_tx, stop_rx) = watch::channel(false);
    let (close_tx, close_rx) = watch::channel(false);
    info!(target: "bridge", addr = %local_addr, "Starting Minions Bridge server");

    let task = tokio::spawn(accept_loop(listener, state.clone(), stop_rx, close_rx));
    Ok(ServerHandle {
        local_addr,
        stop_accepting: stop_tx,
        close: close_tx,
        task,
        state,
    })
}

async fn accept_loop(
    listener: TcpListener,
    state: BridgeState,
    mut stop: watch::Receiver<bool>,
    mut close: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    let mut next_id = 0u64;
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    next_id += 1;
                    connections.spawn(serve_connection(
                        next_id,
                        stream,
                        peer,
                        state.clone(),
                        close.clone(),
                    ));
                }
                Err(e) => warn!(target: "bridge", error = %e, "Accept failed"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
    drop(listener);
    info!(target: "bridge", "Stopped accepting connections");

    while !*close.borrow() {
        if close.changed().await.is_err() {
            break;
        }
    }
    while connections.join_next().await.is_some() {}
}

async fn serve_connection(
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    state: BridgeState,
    close: watch::Receiver<bool>,
) {
    state.connections.insert(
        id,
        ConnectionInfo {
            peer,
            opened_at: chrono::Utc::now(),
        },
    );
    if let Err(e) = handle_connection(id, stream, peer, &state, close).await {
        warn!(target: "bridge", conn = id, %peer, error = %e, "Connection closed with error");
    }
    state.connections.remove(&id);
}

#[instrument(target = "bridge", skip_all, fields(conn = id, peer = %peer))]
async fn handle_connection(
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    state: &BridgeState,
    mut close: watch::Receiver<bool>,
) -> Result<()> {
    info!(target: "bridge", "Client connected");
    let (mut reader, writer) = stream.into_split();
    // Unbounded so the tick thread never waits on a slow client.
    let (tx, rx) = mpsc::unbounded_channel::<RobotResponse>();
    let write_task = tokio::spawn(write_responses(writer, rx, close.clone()));

    let result = loop {
        if *close.borrow() {
            break Ok(());
        }
        let frame = tokio::select! {
            _ = close.changed() => break Ok(()),
            frame = codec::read_frame(&mut reader, state.max_frame_len) => frame,
        };
        match frame {
            Ok(Some(bytes)) => handle_frame(&bytes, state, &tx),
            Ok(None) => {
                info!(target: "bridge", "Client disconnected");
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    drop(tx);
    drop(reader);
    match write_task.await {
        Ok(written) => written?,
        Err(e) => return Err(BridgeError::Internal(e.to_string())),
    }
    result
}

fn handle_frame(bytes: &[u8], state: &BridgeState, tx: &mpsc::UnboundedSender<RobotResponse>) {
    let request = match RobotRequest::decode(bytes) {
        Ok(request) => request,
        Err(e) => {
            // The frame boundary is intact, so only this request is lost.
            warn!(target: "bridge", error = %e, "Undecodable request");
            let _ = tx.send(convert::error_response(
                None,
                &RequestError::InvalidRequest(format!("undecodable request: {}", e)),
            ));
            return;
        }
    };
    debug!(target: "bridge", key = ?request.key, name = %request.name, "Request received");

    let reply_tx = tx.clone();
    let immediate = state.dispatcher.dispatch(request, move |response| {
        if reply_tx.send(response).is_err() {
            debug!(target: "bridge", "Connection gone before action completed");
        }
    });
    if let Some(response) = immediate {
        let _ = tx.send(response);
    }
}

async fn write_responses(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<RobotResponse>,
    mut close: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        let response = tokio::select! {
            response = rx.recv() => response,
            _ = close.changed() => None,
        };
        let Some(response) = response else { break };
        codec::write_frame(&mut writer, &response.encode_to_vec()).await?;
    }
    let _ = writer.shutdown().await;
    Ok(())
}
