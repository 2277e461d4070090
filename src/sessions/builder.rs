//! Session settings and construction.

use std::marker::PhantomData;

use crate::error::{RollbackResult, SettingsError};
use crate::sessions::rollback_session::RollbackSession;
use crate::Config;

/// Default update interval in milliseconds (62.5 Hz).
pub const DEFAULT_UPDATE_INTERVAL_MS: u32 = 16;

/// Default maximum remote ping in milliseconds.
pub const DEFAULT_MAX_REMOTE_PING_MS: u32 = 200;

/// Timing configuration for a session.
///
/// The rollback window — how many past snapshots and inputs are retained, and
/// therefore how far back a correction can reach — is derived from these two
/// values and fixed at construction:
///
/// ```text
/// rollback_window = ceil(max_remote_ping / update_interval) + 2
/// ```
///
/// # Example
///
/// ```
/// use redoubt_rollback::SessionSettings;
///
/// let settings = SessionSettings {
///     update_interval_ms: 16,
///     max_remote_ping_ms: 100,
/// };
/// assert_eq!(settings.rollback_window(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Duration of one simulation step in milliseconds. Must be positive.
    pub update_interval_ms: u32,
    /// The largest round-trip estimate [`set_ping`] accepts, in milliseconds.
    /// Must be positive; typically at least twice the update interval.
    ///
    /// [`set_ping`]: crate::RollbackSession::set_ping
    pub max_remote_ping_ms: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            max_remote_ping_ms: DEFAULT_MAX_REMOTE_PING_MS,
        }
    }
}

impl SessionSettings {
    /// Checks that both intervals are positive.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.update_interval_ms == 0 {
            return Err(SettingsError::ZeroUpdateInterval);
        }
        if self.max_remote_ping_ms == 0 {
            return Err(SettingsError::ZeroMaxRemotePing);
        }
        Ok(())
    }

    /// The derived rollback window: `ceil(max_remote_ping / update_interval)
    /// + 2`. At least 3 for any validated settings.
    #[must_use]
    pub fn rollback_window(&self) -> usize {
        if self.update_interval_ms == 0 {
            return 0;
        }
        self.max_remote_ping_ms.div_ceil(self.update_interval_ms) as usize + 2
    }

    /// Milliseconds of throttle delay applied per step of remote lag:
    /// `update_interval² / 1000` (one step of lag costs one update interval
    /// per second of wall time).
    #[must_use]
    pub fn delay_factor(&self) -> f64 {
        let interval = f64::from(self.update_interval_ms);
        interval * interval / 1000.0
    }
}

/// Builds a [`RollbackSession`] from validated settings.
///
/// # Example
///
/// ```
/// use redoubt_rollback::{Config, RollbackError, SessionBuilder};
///
/// #[derive(Clone)]
/// struct World;
/// struct GameConfig;
/// impl Config for GameConfig {
///     type Input = u8;
///     type State = World;
/// }
///
/// let session = SessionBuilder::<GameConfig>::new()
///     .with_update_interval(16)?
///     .with_max_remote_ping(100)?
///     .start_session()?;
/// assert_eq!(session.rollback_window(), 9);
/// # Ok::<(), RollbackError>(())
/// ```
#[derive(Debug)]
pub struct SessionBuilder<T>
where
    T: Config,
{
    settings: SessionSettings,
    phantom: PhantomData<T>,
}

impl<T: Config> Default for SessionBuilder<T> {
    fn default() -> Self {
        Self {
            settings: SessionSettings::default(),
            phantom: PhantomData,
        }
    }
}

impl<T: Config> SessionBuilder<T> {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the duration of one simulation step in milliseconds.
    ///
    /// # Errors
    /// Returns [`SettingsError::ZeroUpdateInterval`] for a zero interval.
    pub fn with_update_interval(mut self, update_interval_ms: u32) -> Result<Self, SettingsError> {
        if update_interval_ms == 0 {
            return Err(SettingsError::ZeroUpdateInterval);
        }
        self.settings.update_interval_ms = update_interval_ms;
        Ok(self)
    }

    /// Sets the largest accepted round-trip estimate in milliseconds. This
    /// also sizes the rollback window.
    ///
    /// # Errors
    /// Returns [`SettingsError::ZeroMaxRemotePing`] for a zero cap.
    pub fn with_max_remote_ping(mut self, max_remote_ping_ms: u32) -> Result<Self, SettingsError> {
        if max_remote_ping_ms == 0 {
            return Err(SettingsError::ZeroMaxRemotePing);
        }
        self.settings.max_remote_ping_ms = max_remote_ping_ms;
        Ok(self)
    }

    /// Replaces the settings wholesale; validation happens at
    /// [`start_session`](Self::start_session).
    #[must_use]
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Consumes the builder and starts a session.
    pub fn start_session(self) -> RollbackResult<RollbackSession<T>> {
        RollbackSession::new(self.settings)
    }
}

// #########
// # TESTS #
// #########
