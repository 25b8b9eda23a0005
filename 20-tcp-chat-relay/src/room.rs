use std::{collections::VecDeque, io, time::Duration};

use tokio::time::timeout;
use tracing::{debug, info};

use crate::{
    protocol,
    registry::{ConnectionId, Peer, Registry},
};

/// The shared chat room: the connection registry plus broadcast delivery.
///
/// One room is created per server and handed to every session as an
/// `Arc<Room>`. Sends happen on the task of whoever triggered them, so a
/// slow peer can hold up a broadcast for at most `write_timeout` before it
/// is dropped.
pub struct Room {
    registry: Registry,
    write_timeout: Duration,
}

impl Room {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            registry: Registry::new(),
            write_timeout,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Sends one message to one peer, failing if it does not complete in time.
    pub async fn deliver(&self, peer: &Peer, message: &str) -> io::Result<()> {
        match timeout(self.write_timeout, peer.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("write did not finish within {:?}", self.write_timeout),
            )),
        }
    }

    /// Sends `message` to every registered peer except `exclude`.
    ///
    /// Peers that fail to take the message are removed and closed; each of
    /// them that still had a name gets a departure notice broadcast once the
    /// current pass is over. Errors never reach the caller.
    pub async fn broadcast(&self, message: &str, exclude: Option<ConnectionId>) {
        let mut pending = VecDeque::from([(message.to_owned(), exclude)]);

        while let Some((message, exclude)) = pending.pop_front() {
            for peer in self.registry.snapshot().await {
                if Some(peer.id()) == exclude {
                    continue;
                }

                if let Err(error) = self.deliver(&peer, &message).await {
                    debug!(
                        id = peer.id(),
                        peer = %peer.addr(),
                        ?error,
                        "dropping peer after failed send"
                    );
                    if let Some(name) = self.disconnect(&peer).await {
                        pending.push_back((protocol::left(&name), None));
                    }
                }
            }
        }
    }

    /// Removes `peer`, closes it and announces the departure if it had joined.
    pub async fn leave(&self, peer: &Peer) {
        if let Some(name) = self.disconnect(peer).await {
            self.broadcast(&protocol::left(&name), None).await;
        }
    }

    /// Removes and closes `peer`, returning its name if it was still registered.
    async fn disconnect(&self, peer: &Peer) -> Option<String> {
        let name = self.registry.remove(peer.id()).await;
        peer.close().await;
        if let Some(name) = &name {
            info!(id = peer.id(), peer = %peer.addr(), %name, "client left");
        }
        name
    }
}
