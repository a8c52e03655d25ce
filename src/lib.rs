//! Service host library.
//!
//! Wires configuration, observability hooks, an HTTP router and pluggable
//! [`Service`]s together, and manages the process lifecycle around them.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                SERVICE HOST                  │
//!                    │                                              │
//!   Client Request   │  ┌─────────┐   ┌─────────┐   ┌───────────┐   │
//!   ─────────────────┼─▶│   net   │──▶│  http   │──▶│  router   │   │
//!                    │  │listener │   │ engine  │   │middleware │   │
//!                    │  └─────────┘   └─────────┘   └─────┬─────┘   │
//!                    │                                    ▼         │
//!   Client Response  │                             ┌───────────┐    │
//!   ◀────────────────┼──── recovery ◀──────────────│ services  │    │
//!                    │                             └───────────┘    │
//!                    │  ┌────────────────────────────────────────┐  │
//!                    │  │         Cross-Cutting Concerns         │  │
//!                    │  │  config · observability · lifecycle    │  │
//!                    │  └────────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod helloworld;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod service;

pub use config::{Config, ConfigLoader};
pub use error::{AppError, Error, ResultExt};
pub use lifecycle::{ExitCause, ExitSignal, Server, ServerError, ServerHandle};
pub use service::Service;
