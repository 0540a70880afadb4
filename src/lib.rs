//! # AtlasPipe
//!
//! Deferred command batching for key-value backends:
//! - Entities queue reads and writes instead of issuing them
//! - Queued commands are grouped by connection
//! - One round trip per connection, fanned out concurrently
//! - Results delivered to callbacks in queue order
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Application (Records, KeyRefs, ...)              │
//! └──────────┬─────────────────────────────────┬────────────────┘
//!            │ attach / hydrate                │ dispatch
//! ┌──────────▼─────────────────────────────────▼────────────────┐
//! │                         Pipeline                             │
//! │         Registry: ConnectionId ─▶ (batch, callbacks)         │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │ execute
//!          ┌────────────────────┼────────────────────┐
//!          ▼                    ▼                    ▼
//!   ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!   │   conn#1    │      │   conn#2    │      │   conn#3    │
//!   │ round trip  │      │ round trip  │      │ round trip  │
//!   └─────────────┘      └─────────────┘      └─────────────┘
//!     (inline when only one connection, one worker each otherwise)
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod backend;
pub mod protocol;
pub mod pipeline;
pub mod memory;
pub mod cluster;
pub mod model;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{PipeError, Result};
pub use config::Config;
pub use backend::{BatchHandle, Callback, Connection, ConnectionId, Entity};
pub use pipeline::{Arg, Pipeline, Response};
pub use protocol::{Command, Kwargs, Value};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasPipe
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
