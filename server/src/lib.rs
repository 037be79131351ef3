//! # Lobby Server Library
//!
//! This library implements the lobby/matchmaking server: clients connect
//! over TCP, log in to receive an opaque session id, and create, list, join,
//! and leave rooms and the games hosted inside them.
//!
//! ## Core Responsibilities
//!
//! ### Session Registry
//! The canonical in-memory state: users, rooms, and games, all keyed by ids
//! drawn from one shared monotonic counter. Every compound operation
//! (allocate-then-insert, membership edits, deletion with referential
//! cleanup, list snapshots) happens atomically under a single lock, so no
//! connection ever observes a half-modified room.
//!
//! ### Command Dispatch
//! Each decoded packet maps by action code to exactly one command function
//! that reads or mutates the registry and produces the replies to send back.
//! Unknown action codes are ignored by design.
//!
//! ### Transport
//! A TCP accept loop with one tokio task per connection. Connections are
//! read in fixed-size chunks, one packet per read; transport failures drop
//! that client only, never the server.
//!
//! ## Module Organization
//!
//! - [`registry`] — users, rooms, games, and the shared id counter
//! - [`dispatcher`] — action-code command table over the registry
//! - [`network`] — listener, per-connection read loop, reply writing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::LobbyServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = LobbyServer::bind("127.0.0.1:17001").await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
pub mod network;
pub mod registry;
