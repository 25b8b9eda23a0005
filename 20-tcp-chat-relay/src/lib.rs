//! Line-oriented TCP chat relay with a matching terminal client.
//!
//! See `README.md` for usage and the wire protocol. Clients connect over
//! plain TCP, answer a name prompt and from then on every line they send is
//! relayed to everybody in the room. Each module owns one concern:
//!
//! - [`cli`] parses the `server` / `client` command line and merges it with
//!   the JSON settings from [`config`].
//! - [`protocol`] holds the wire text (prompt, announcements, chat lines)
//!   and the bounded, UTF-8 tolerant line reader.
//! - [`registry`] tracks joined connections and owns their write halves.
//! - [`room`] broadcasts to the registry and drops peers that stop taking
//!   messages.
//! - [`session`] runs the per-connection name handshake and relay loop.
//! - [`server`] binds the listener and spawns one task per connection.
//! - [`client`] connects to a server, printing what it receives while
//!   forwarding stdin.
//! - [`error`] defines the error types shared by the above.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;
