//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, HTTP/1.1 + HTTP/2)
//!     → request.rs (assign x-request-id)
//!     → router.rs middleware chain (logging, telemetry, recovery)
//!     → handlers.rs (/health, /) or a service route
//!     → recovery.rs (panic / reported error → JSON error body)
//!     → Send to client
//! ```

pub mod handlers;
pub mod recovery;
pub mod request;
pub mod router;
pub mod server;

pub use recovery::Recovery;
pub use request::X_REQUEST_ID;
pub use server::{EngineMode, HttpServer};
