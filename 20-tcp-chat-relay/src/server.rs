use std::{
    future::Future,
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    net::{TcpListener, TcpSocket, TcpStream},
    select,
};
use tracing::{info, warn};

use crate::{
    config::ServerConfig,
    error::ServerError,
    registry::ConnectionId,
    room::Room,
    session,
};

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    listener: TcpListener,
    room: Arc<Room>,
    read_buffer_size: usize,
    next_id: AtomicU64,
}

impl Server {
    /// Binds the configured address with `SO_REUSEADDR` and the configured backlog.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = resolve(&config.address()).await?;
        let listener =
            listen(addr, config.backlog).map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self::new(listener, config))
    }

    /// Wraps a listener that is already bound.
    pub fn new(listener: TcpListener, config: &ServerConfig) -> Self {
        Self {
            listener,
            room: Arc::new(Room::new(config.write_timeout())),
            read_buffer_size: config.read_buffer_size,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn room(&self) -> Arc<Room> {
        Arc::clone(&self.room)
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Sessions that are already running are left alone; they finish on
    /// their own when their clients go away.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("server no longer accepting connections");
                    break;
                }
                accept_result = self.listener.accept() => {
                    self.handle_accept_result(accept_result).await;
                }
            }
        }
    }

    pub async fn run_until_ctrl_c(self) {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }

    async fn handle_accept_result(&self, result: io::Result<(TcpStream, SocketAddr)>) {
        match result {
            Ok((stream, peer)) => self.spawn_session(stream, peer),
            Err(err) => {
                warn!(error = %ServerError::Accept(err), "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let id: ConnectionId = self.next_id.fetch_add(1, Ordering::Relaxed);
        let room = Arc::clone(&self.room);
        let read_buffer_size = self.read_buffer_size;
        info!(id, %peer, "client connected");

        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();
            session::handle_connection(reader, writer, id, peer, room, read_buffer_size).await;
        });
    }
}

async fn resolve(address: &str) -> Result<SocketAddr, ServerError> {
    let mut addrs = tokio::net::lookup_host(address)
        .await
        .map_err(|source| ServerError::Resolve {
            addr: address.to_string(),
            source,
        })?;
    addrs
        .next()
        .ok_or_else(|| ServerError::NoAddress(address.to_string()))
}

fn listen(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}
