//! The rollback session: step advancement, snapshot scheduling, misprediction
//! recovery and the catch-up throttle.
//!
//! # Update cycle
//!
//! Each host frame calls [`RollbackSession::update`] with the elapsed wall
//! time. One update performs, in order:
//!
//! 1. **Synchronization scan** (under the rollback lock): consume pending
//!    misprediction signals and compute the latest synchronized step.
//! 2. **Rollback** (under the rollback lock): if a signal lowered the
//!    synchronized step, load the snapshot saved at that step and re-simulate
//!    forward to the current step, re-saving snapshots along the way so a
//!    future rollback can target the re-simulated steps.
//! 3. **Throttle**: charge the frame's elapsed time to the step accumulator,
//!    minus a delay proportional to how far the most-trailing remote peer
//!    lags.
//! 4. **Advance at most one step**: if a full update interval has
//!    accumulated, save a snapshot, simulate with gathered inputs and
//!    increment the step counter.
//!
//! Advancing at most one step per call is deliberate: the throttle is computed
//! before advancement, and spending the entire accumulated time in one call
//! would let a single update deliver many steps and defeat the delay. Hosts
//! that fall far behind catch up over several calls.
//!
//! # Threading
//!
//! The session assumes two concurrent contexts: a *game thread* that calls
//! [`update`](RollbackSession::update),
//! [`add_local_input`](RollbackSession::add_local_input),
//! [`add_player`](RollbackSession::add_player) and the ping accessors, and a
//! *network thread* that calls
//! [`add_remote_input`](RollbackSession::add_remote_input) (through a
//! [`RemoteInputHandle`]) as packets arrive. A single rollback mutex guards
//! the player records; it is held across the synchronization scan and the
//! entire re-simulation, and for the duration of every remote-input
//! ingestion, so inbound inputs can never mutate signals or rings between the
//! moment the session computes the synchronized step and the moment
//! re-simulation finishes. The host's `save`/`simulate` calls on the common
//! advance path run with the lock released; only the brief input gathering
//! re-acquires it.

use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{RollbackError, RollbackResult, SettingsError};
use crate::ring_buffer::RingBuffer;
use crate::sessions::builder::SessionSettings;
use crate::sessions::player_registry::PlayerRegistry;
use crate::step_info::SavedStep;
use crate::{Config, InputVec, PlayerHandle, PlayerKind, SessionHost, Step};

/// A rollback netcode session.
///
/// Owns the step counter, the snapshot ring, the player set and the step
/// accumulator; drives the host simulation through [`SessionHost`]. Create
/// one via [`SessionBuilder`](crate::SessionBuilder).
///
/// See the [module documentation](self) for the update cycle and threading
/// model.
pub struct RollbackSession<T>
where
    T: Config,
{
    settings: SessionSettings,
    /// Snapshot ring; slot `s % window` holds the state captured at the
    /// beginning of step `s`.
    snapshots: RingBuffer<SavedStep<T::State>>,
    /// The next step to simulate. Monotonically non-decreasing.
    current_step: Step,
    /// Milliseconds accumulated towards the next step advance.
    update_timer: f64,
    /// Scratch inputs handed to the host's `simulate`, reused across calls.
    scratch: InputVec<T::Input>,
    /// All participant records, behind the rollback mutex.
    players: Arc<Mutex<PlayerRegistry<T::Input>>>,
}

impl<T: Config> RollbackSession<T> {
    /// Creates a session from settings, validating them and allocating the
    /// snapshot ring and player set.
    pub fn new(settings: SessionSettings) -> RollbackResult<Self> {
        settings.validate()?;
        // validated settings always yield a window of at least 3
        let Some(window) = NonZeroUsize::new(settings.rollback_window()) else {
            return Err(SettingsError::ZeroUpdateInterval.into());
        };
        Ok(Self {
            settings,
            snapshots: RingBuffer::with_capacity(window, SavedStep::default()),
            current_step: Step::new(0),
            update_timer: 0.0,
            scratch: InputVec::new(),
            players: Arc::new(Mutex::new(PlayerRegistry::new(window))),
        })
    }

    /// The session's timing configuration.
    #[inline]
    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// The derived rollback window (number of retained snapshots).
    #[inline]
    #[must_use]
    pub fn rollback_window(&self) -> usize {
        self.snapshots.capacity()
    }

    /// The next step the session will simulate.
    #[inline]
    #[must_use]
    pub fn current_step(&self) -> Step {
        self.current_step
    }

    /// The number of registered participants.
    #[must_use]
    pub fn num_players(&self) -> usize {
        self.players.lock().num_players()
    }

    /// Registers a new participant and returns its handle.
    ///
    /// Handles are stable for the session's lifetime and never reissued. The
    /// scratch input buffer grows to match the participant count, so
    /// `simulate` always receives one input per participant in insertion
    /// order (spectators contribute the blank input).
    pub fn add_player(&mut self, kind: PlayerKind) -> PlayerHandle {
        let mut players = self.players.lock();
        let handle = players.add_player(kind);
        let num_players = players.num_players();
        drop(players);
        if self.scratch.capacity() < num_players {
            self.scratch.grow(num_players);
        }
        handle
    }

    /// Records the local player's input for the current step and, if it was
    /// accepted, broadcasts it via [`SessionHost::broadcast`].
    ///
    /// Returns `Ok(false)` — without broadcasting — when an input for the
    /// current step was already recorded. Local inputs are authoritative at
    /// creation time; they never raise a misprediction signal.
    ///
    /// # Errors
    /// [`RollbackError::WrongPlayerKind`] if the handle does not name a local
    /// player; [`RollbackError::NonSequentialInput`] if a step was skipped
    /// (local input must be recorded every step, starting at step 0).
    pub fn add_local_input<H>(
        &mut self,
        host: &mut H,
        handle: PlayerHandle,
        input: T::Input,
    ) -> RollbackResult<bool>
    where
        H: SessionHost<T>,
    {
        let step = self.current_step;
        let (accepted, canonical) = {
            let mut players = self.players.lock();
            let player = players.player_of_kind_mut(handle, PlayerKind::Local)?;
            let canonical = player.handle();
            let accepted = player.history_mut().add_input(step, input, false)?;
            (accepted, canonical)
        };
        if accepted {
            host.broadcast(canonical, step, input);
        }
        Ok(accepted)
    }

    /// Ingests a remote player's authoritative input for a step.
    ///
    /// Stale or duplicate arrivals (`step` at or before the latest recorded
    /// step) return `Ok(false)` and mutate nothing. A newly recorded input
    /// that contradicts the prediction simulated with raises that player's
    /// misprediction signal; the next [`update`](Self::update) consumes it
    /// and rolls back.
    ///
    /// This is the only thread-safe entry point: it takes the rollback lock
    /// and may be called from a network thread via [`RemoteInputHandle`]
    /// while the game thread drives the session.
    ///
    /// # Errors
    /// [`RollbackError::WrongPlayerKind`] if the handle does not name a
    /// remote player; [`RollbackError::NonSequentialInput`] if the transport
    /// delivered a gap (inputs for each player must arrive in strictly
    /// increasing step order, starting at step 0).
    pub fn add_remote_input(
        &self,
        handle: PlayerHandle,
        step: Step,
        input: T::Input,
    ) -> RollbackResult<bool> {
        ingest_remote_input(&self.players, handle, step, input)
    }

    /// Returns a cloneable handle for feeding remote inputs from another
    /// thread.
    #[must_use]
    pub fn remote_input_handle(&self) -> RemoteInputHandle<T::Input> {
        RemoteInputHandle {
            players: Arc::clone(&self.players),
        }
    }

    /// Stores a remote player's most recent round-trip estimate.
    ///
    /// # Errors
    /// [`RollbackError::PingAboveMax`] if the estimate exceeds the configured
    /// cap; [`RollbackError::WrongPlayerKind`] for non-remote handles (their
    /// ping is fixed at 0).
    pub fn set_ping(&mut self, handle: PlayerHandle, ping_ms: u32) -> RollbackResult<()> {
        if ping_ms > self.settings.max_remote_ping_ms {
            return Err(RollbackError::PingAboveMax {
                handle,
                ping_ms,
                max_ping_ms: self.settings.max_remote_ping_ms,
            });
        }
        let mut players = self.players.lock();
        let player = players.player_of_kind_mut(handle, PlayerKind::Remote)?;
        player.set_ping_ms(ping_ms);
        Ok(())
    }

    /// Returns the stored round-trip estimate for a participant (0 for local
    /// players and spectators).
    pub fn get_ping(&self, handle: PlayerHandle) -> RollbackResult<u32> {
        Ok(self.players.lock().player(handle)?.ping_ms())
    }

    /// Runs one update cycle: misprediction recovery, throttle, and at most
    /// one step advance. See the [module documentation](self).
    ///
    /// `delta_ms` is the wall time elapsed since the previous call, in
    /// milliseconds.
    ///
    /// # Errors
    /// [`RollbackError::StateDiscarded`] when a correction reaches back past
    /// the rollback window; [`RollbackError::InputDiscarded`] when gathering
    /// hits an input that aged out. Neither occurs while the transport
    /// respects the window implied by `max_remote_ping`.
    pub fn update<H>(&mut self, host: &mut H, delta_ms: f64) -> RollbackResult<()>
    where
        H: SessionHost<T>,
    {
        let advantage;
        {
            let mut players = self.players.lock();

            // 1. latest synchronized step, consuming pending signals
            let sync = players.latest_synchronized_step(self.current_step);

            // 2. misprediction recovery: load the agreed snapshot, then
            //    re-simulate forward to the step we were at
            if sync != self.current_step {
                debug!(
                    "rolling back from step {} to step {}",
                    self.current_step, sync
                );
                {
                    let slot = self.snapshots.get(sync.as_i32());
                    let state = match (slot.step == sync, slot.state.as_ref()) {
                        (true, Some(state)) => state,
                        _ => {
                            return Err(RollbackError::StateDiscarded {
                                requested: sync,
                                resident: slot.step,
                            });
                        },
                    };
                    host.load(state);
                }

                let steps_to_resimulate = self.current_step - sync;
                for offset in 0..steps_to_resimulate {
                    let step = sync + offset;
                    // Re-simulation must leave behind the snapshots a future
                    // rollback will target; the slot at `sync` already holds
                    // the state we just loaded.
                    if step != sync {
                        self.snapshots.set(
                            step.as_i32(),
                            SavedStep {
                                step,
                                state: Some(host.save()),
                            },
                        );
                    }
                    players.gather_inputs(step, &mut self.scratch)?;
                    host.simulate(&self.scratch);
                }
            }

            // measured under the lock; the arithmetic below runs without it
            advantage = players.max_step_advantage(self.current_step, self.settings.update_interval_ms);
        }

        // 3. throttle: charge elapsed time minus the catch-up delay
        let delay = f64::from(advantage) * self.settings.delay_factor();
        if advantage > 0 {
            trace!("throttling: {advantage} steps of advantage, {delay:.3} ms delay");
        }
        self.update_timer = (self.update_timer + delta_ms - delay).max(0.0);

        // 4. advance at most one step
        let interval = f64::from(self.settings.update_interval_ms);
        if self.update_timer < interval {
            return Ok(());
        }
        self.update_timer -= interval;

        self.snapshots.set(
            self.current_step.as_i32(),
            SavedStep {
                step: self.current_step,
                state: Some(host.save()),
            },
        );
        {
            let players = self.players.lock();
            players.gather_inputs(self.current_step, &mut self.scratch)?;
        }
        host.simulate(&self.scratch);
        trace!("advanced past step {}", self.current_step);
        self.current_step += 1;
        Ok(())
    }
}

impl<T: Config> std::fmt::Debug for RollbackSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackSession")
            .field("settings", &self.settings)
            .field("current_step", &self.current_step)
            .field("update_timer", &self.update_timer)
            .field("rollback_window", &self.snapshots.capacity())
            .finish_non_exhaustive()
    }
}

/// A cloneable handle for feeding remote inputs into a session from another
/// thread.
///
/// Obtained via [`RollbackSession::remote_input_handle`]. The handle shares
/// the session's rollback mutex, so ingestion through it synchronizes with
/// the session's misprediction recovery exactly like
/// [`RollbackSession::add_remote_input`] does. With the `sync-send` feature
/// enabled the handle is `Send`, so it can live on a network thread.
pub struct RemoteInputHandle<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    players: Arc<Mutex<PlayerRegistry<I>>>,
}

impl<I> Clone for RemoteInputHandle<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    fn clone(&self) -> Self {
        Self {
            players: Arc::clone(&self.players),
        }
    }
}

impl<I> std::fmt::Debug for RemoteInputHandle<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteInputHandle").finish_non_exhaustive()
    }
}

impl<I> RemoteInputHandle<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    /// Ingests a remote player's input; semantics are identical to
    /// [`RollbackSession::add_remote_input`].
    pub fn add_remote_input(
        &self,
        handle: PlayerHandle,
        step: Step,
        input: I,
    ) -> RollbackResult<bool> {
        ingest_remote_input(&self.players, handle, step, input)
    }
}

fn ingest_remote_input<I>(
    players: &Mutex<PlayerRegistry<I>>,
    handle: PlayerHandle,
    step: Step,
    input: I,
) -> RollbackResult<bool>
where
    I: Copy + Clone + PartialEq + Default,
{
    let mut players = players.lock();
    let player = players.player_of_kind_mut(handle, PlayerKind::Remote)?;
    player.history_mut().add_input(step, input, true)
}

// #########
// # TESTS #
// #########
