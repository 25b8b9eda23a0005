//! Per-connection protocol handling.
//!
//! A session walks through `CONNECTED -> AWAITING_NAME -> ACTIVE -> CLOSED`:
//! it sends the name prompt, reads the name, joins the room and then relays
//! chat lines until the peer disconnects, sends `/quit` or an I/O error
//! occurs. Whatever the reason, the session ends by leaving the room, and no
//! error ever escapes the task running it.

use std::{net::SocketAddr, sync::Arc};

use tokio::{
    io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader},
    select,
};
use tracing::{debug, info, warn};

use crate::{
    error::SessionError,
    protocol,
    registry::{ConnectionId, Peer},
    room::Room,
};

/// Runs one client session to completion.
pub async fn handle_connection<R, W>(
    reader: R,
    writer: W,
    id: ConnectionId,
    addr: SocketAddr,
    room: Arc<Room>,
    read_buffer_size: usize,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let mut reader = BufReader::new(reader);
    let peer = Arc::new(Peer::new(id, addr, writer));

    if let Err(err) = run_session(&mut reader, &peer, &room, read_buffer_size).await {
        warn!(id, peer = %addr, error = %err, "client session ended with error");
    }

    room.leave(&peer).await;
    debug!(id, peer = %addr, "connection closed");
}

async fn run_session<R>(
    reader: &mut R,
    peer: &Arc<Peer>,
    room: &Room,
    limit: usize,
) -> Result<(), SessionError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(name) = perform_handshake(reader, peer, room, limit).await? else {
        debug!(id = peer.id(), "connection closed before a name was sent");
        return Ok(());
    };

    if !join(room, peer, &name).await? {
        return Ok(());
    }

    relay_lines(reader, peer, room, &name, limit).await
}

async fn perform_handshake<R>(
    reader: &mut R,
    peer: &Peer,
    room: &Room,
    limit: usize,
) -> Result<Option<String>, SessionError>
where
    R: AsyncBufRead + Unpin,
{
    room.deliver(peer, protocol::NAME_PROMPT).await?;

    let Some(line) = protocol::read_line(reader, limit).await? else {
        return Ok(None);
    };

    let name = line.trim();
    if name.is_empty() {
        return Ok(Some(protocol::default_name(peer.addr().port())));
    }
    Ok(Some(name.to_string()))
}

/// Registers the peer, welcomes it and tells everybody else. Returns `false`
/// when the registry refused the connection.
async fn join(room: &Room, peer: &Arc<Peer>, name: &str) -> Result<bool, SessionError> {
    if let Err(err) = room.registry().add(Arc::clone(peer), name.to_string()).await {
        warn!(id = peer.id(), error = %err, "rejecting connection");
        return Ok(false);
    }

    if let Err(err) = room.deliver(peer, &protocol::welcome(name)).await {
        // Nobody has heard of this client yet, so it goes without a notice.
        room.registry().remove(peer.id()).await;
        return Err(err.into());
    }

    let online = room.registry().len().await;
    info!(id = peer.id(), peer = %peer.addr(), %name, online, "client joined");
    room.broadcast(&protocol::joined(name), Some(peer.id())).await;
    Ok(true)
}

async fn relay_lines<R>(
    reader: &mut R,
    peer: &Peer,
    room: &Room,
    name: &str,
    limit: usize,
) -> Result<(), SessionError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        // A broadcast that dropped this peer closes it from another task.
        let line = select! {
            line = protocol::read_line(reader, limit) => line?,
            () = peer.closed() => {
                debug!(id = peer.id(), "peer dropped by the room");
                return Ok(());
            }
        };
        let Some(line) = line else {
            debug!(id = peer.id(), "peer closed the connection");
            return Ok(());
        };

        // A failed broadcast may already have dropped this peer.
        if peer.is_closed() {
            return Ok(());
        }

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if protocol::is_quit(text) {
            debug!(id = peer.id(), "client sent quit");
            return Ok(());
        }

        // The sender gets its own line back, same as everybody else.
        room.broadcast(&protocol::chat(name, text), None).await;
    }
}
