//! Convenient re-exports for common usage.
//!
//! ```rust
//! use redoubt_rollback::prelude::*;
//! ```
//!
//! The prelude includes the session and builder types, the [`Config`] and
//! [`SessionHost`] traits, the fundamental step/handle types and the error
//! types — everything a typical host integration touches.

// Session types
pub use crate::sessions::builder::{SessionBuilder, SessionSettings};
pub use crate::sessions::rollback_session::{RemoteInputHandle, RollbackSession};

// Core traits
pub use crate::{Config, SessionHost};

// Fundamental types and constants
pub use crate::{PlayerHandle, PlayerKind, Step, NULL_STEP};

// Error handling
pub use crate::error::{RollbackError, RollbackResult, SettingsError};

// Input vector type handed to `simulate`
pub use crate::InputVec;
