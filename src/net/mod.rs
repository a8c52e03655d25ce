//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limit)
//!     → connection.rs (hyper connection driven through the router)
//!     → ConnectionSet (tracked until closed, drained at shutdown)
//!
//! Connection States:
//!     Accepted → Serving → Closing (stop signal) → Closed
//!                                 → Aborted (drain timeout)
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{serve_connection, ConnectionId, ConnectionSet, DrainTimeout};
pub use listener::{ConnectionPermit, Listener, ListenerError};
