//! Error types for Redoubt Rollback.
//!
//! [`RollbackError`] is the crate's contract-violation sink: every
//! unrecoverable API misuse — bad handle, non-sequential input, ping over the
//! configured cap, rollback to an evicted snapshot — surfaces as one of its
//! variants. Duplicate or stale inputs are **not** errors; the input APIs
//! report those as `Ok(false)` and the session drops them silently.
//!
//! All variants store numeric data directly and format lazily in the
//! [`Display`] implementation, so constructing an error on a hot path never
//! allocates.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::{PlayerHandle, PlayerKind, Step};

/// Convenience alias for results whose error type is [`RollbackError`].
pub type RollbackResult<V> = Result<V, RollbackError>;

/// The error type for all fallible session operations.
///
/// These are contract violations in the sense of the session's API contract:
/// none of them occur in a correctly driven session, and none of them are
/// recoverable in-session. Hosts should treat them as bugs in their own
/// integration (or in their transport's ordering guarantees) and tear the
/// session down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RollbackError {
    /// A handle named a participant this session never issued.
    InvalidHandle {
        /// The offending handle.
        handle: PlayerHandle,
        /// The number of participants the session knows about.
        num_players: usize,
    },
    /// An operation reserved for one participant kind was invoked with a
    /// handle of another kind (e.g. a remote input for a local player, or a
    /// ping update for a spectator).
    WrongPlayerKind {
        /// The offending handle.
        handle: PlayerHandle,
        /// The kind the operation requires.
        required: PlayerKind,
        /// The kind actually registered for the handle.
        actual: PlayerKind,
    },
    /// An input skipped ahead: inputs must be appended strictly sequentially,
    /// one step at a time.
    NonSequentialInput {
        /// The step the history expected next.
        expected: Step,
        /// The step that was offered instead.
        got: Step,
    },
    /// A ping update exceeded the session's configured maximum remote ping.
    PingAboveMax {
        /// The offending handle.
        handle: PlayerHandle,
        /// The offered round-trip estimate in milliseconds.
        ping_ms: u32,
        /// The configured cap in milliseconds.
        max_ping_ms: u32,
    },
    /// A rollback targeted a step whose snapshot has been overwritten by a
    /// newer one — the correction arrived from further back than the rollback
    /// window allows.
    StateDiscarded {
        /// The step the rollback needed.
        requested: Step,
        /// The step actually resident in the targeted ring slot
        /// ([`Step::NULL`] if the slot was never written).
        resident: Step,
    },
    /// An input lookup hit a ring slot that has been overwritten by a newer
    /// step — the input aged out of the history window.
    InputDiscarded {
        /// The step the lookup needed.
        requested: Step,
        /// The step actually resident in the targeted ring slot.
        resident: Step,
    },
    /// Session settings failed validation at construction time.
    InvalidSettings {
        /// What was wrong with the settings.
        reason: SettingsError,
    },
}

/// Why session settings failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SettingsError {
    /// The update interval must be a positive number of milliseconds.
    ZeroUpdateInterval,
    /// The maximum remote ping must be a positive number of milliseconds.
    ZeroMaxRemotePing,
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroUpdateInterval => {
                write!(f, "update interval must be greater than zero")
            },
            Self::ZeroMaxRemotePing => {
                write!(f, "maximum remote ping must be greater than zero")
            },
        }
    }
}

impl Display for RollbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle {
                handle,
                num_players,
            } => {
                write!(
                    f,
                    "Invalid player handle {} (session has {} participants).",
                    handle, num_players
                )
            },
            Self::WrongPlayerKind {
                handle,
                required,
                actual,
            } => {
                write!(
                    f,
                    "Operation requires a {:?} player, but handle {} names a {:?} player.",
                    required, handle, actual
                )
            },
            Self::NonSequentialInput { expected, got } => {
                write!(
                    f,
                    "Input for step {} is not sequential (expected step {}).",
                    got, expected
                )
            },
            Self::PingAboveMax {
                handle,
                ping_ms,
                max_ping_ms,
            } => {
                write!(
                    f,
                    "Ping of {} ms for player {} exceeds the configured maximum of {} ms.",
                    ping_ms, handle, max_ping_ms
                )
            },
            Self::StateDiscarded {
                requested,
                resident,
            } => {
                write!(
                    f,
                    "Cannot roll back to step {}: its snapshot was discarded (slot now holds step {}).",
                    requested, resident
                )
            },
            Self::InputDiscarded {
                requested,
                resident,
            } => {
                write!(
                    f,
                    "Input for step {} aged out of the history window (slot now holds step {}).",
                    requested, resident
                )
            },
            Self::InvalidSettings { reason } => {
                write!(f, "Invalid session settings: {}.", reason)
            },
        }
    }
}

impl Error for RollbackError {}

impl From<SettingsError> for RollbackError {
    fn from(reason: SettingsError) -> Self {
        Self::InvalidSettings { reason }
    }
}

// #########
// # TESTS #
// #########

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_the_offending_step() {
        let err = RollbackError::NonSequentialInput {
            expected: Step::new(4),
            got: Step::new(7),
        };
        let text = err.to_string();
        assert!(text.contains('7'));
        assert!(text.contains('4'));
    }

    #[test]
    fn display_state_discarded_with_null_resident() {
        let err = RollbackError::StateDiscarded {
            requested: Step::new(2),
            resident: Step::NULL,
        };
        assert!(err.to_string().contains("NULL_STEP"));
    }

    #[test]
    fn settings_error_converts() {
        let err: RollbackError = SettingsError::ZeroUpdateInterval.into();
        assert_eq!(
            err,
            RollbackError::InvalidSettings {
                reason: SettingsError::ZeroUpdateInterval
            }
        );
    }

    #[test]
    fn errors_are_std_errors() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<RollbackError>();
    }
}
