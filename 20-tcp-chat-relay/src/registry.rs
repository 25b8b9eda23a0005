use std::{
    collections::{HashMap, hash_map},
    io,
    net::SocketAddr,
    sync::Arc,
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, watch},
};
use tracing::debug;

use crate::error::RegistryError;

pub type ConnectionId = u64;

type PeerWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write side of one client connection.
///
/// The session owning the connection keeps the read half to itself; the
/// write half lives here so that the registry and the broadcaster can reach
/// it. All writes go through one lock, so a message is always written whole
/// even when several sessions broadcast to the same peer at once.
///
/// Closing a peer also wakes its session through [`Peer::closed`], so the
/// session stops reading and releases the read half as well.
pub struct Peer {
    id: ConnectionId,
    addr: SocketAddr,
    writer: Mutex<PeerWriter>,
    closed: watch::Sender<bool>,
}

impl Peer {
    pub fn new<W>(id: ConnectionId, addr: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            addr,
            writer: Mutex::new(Box::new(writer)),
            closed: watch::Sender::new(false),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn send(&self, message: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(message.as_bytes()).await?;
        writer.flush().await
    }

    /// Shuts the write half down and signals the owning session. Safe to
    /// call any number of times.
    pub async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        let mut writer = self.writer.lock().await;
        if let Err(error) = writer.shutdown().await {
            debug!(id = self.id, ?error, "peer already closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once [`Peer::close`] has been called.
    pub async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        // The sender lives in `self`, so the channel cannot be dropped here.
        let _ = closed.wait_for(|closed| *closed).await;
    }
}

struct Entry {
    peer: Arc<Peer>,
    name: String,
}

/// Live connections that completed the name handshake, keyed by connection id.
///
/// Every operation takes the single map lock for constant work and never
/// holds it across network I/O.
#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<ConnectionId, Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, peer: Arc<Peer>, name: String) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().await;
        match entries.entry(peer.id()) {
            hash_map::Entry::Occupied(_) => Err(RegistryError::DuplicateConnection(peer.id())),
            hash_map::Entry::Vacant(slot) => {
                slot.insert(Entry { peer, name });
                Ok(())
            }
        }
    }

    /// Returns the removed name, or `None` when the connection was not registered.
    pub async fn remove(&self, id: ConnectionId) -> Option<String> {
        let mut entries = self.entries.lock().await;
        entries.remove(&id).map(|entry| entry.name)
    }

    /// Copy of the current connection set; later changes to the registry do
    /// not affect the returned list.
    pub async fn snapshot(&self) -> Vec<Arc<Peer>> {
        let entries = self.entries.lock().await;
        entries.values().map(|entry| Arc::clone(&entry.peer)).collect()
    }

    #[cfg(test)]
    pub async fn name_of(&self, id: ConnectionId) -> Option<String> {
        let entries = self.entries.lock().await;
        entries.get(&id).map(|entry| entry.name.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
