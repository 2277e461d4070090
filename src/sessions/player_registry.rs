//! Player registry: the session's participant records.
//!
//! The registry owns every [`Player`] in insertion order (the order inputs
//! are presented to the host's `simulate`) and implements the registry-wide
//! scans the session needs: consuming pending misprediction signals to find
//! the latest synchronized step, gathering one input per player for a step,
//! and measuring how far the trailing remote peer lags for the catch-up
//! throttle.
//!
//! The whole registry lives behind the session's single rollback mutex; see
//! the session documentation for the locking discipline.

use std::num::NonZeroUsize;

use crate::error::{RollbackError, RollbackResult};
use crate::input_history::InputHistory;
use crate::{InputVec, PlayerHandle, PlayerKind, Step};

/// One participant's record: identity, input history and ping.
#[derive(Debug, Clone)]
pub struct Player<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    handle: PlayerHandle,
    history: InputHistory<I>,
    /// Most recent round-trip estimate in milliseconds. Stays 0 for local
    /// players and spectators.
    ping_ms: u32,
}

impl<I> Player<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    fn new(handle: PlayerHandle, window: NonZeroUsize) -> Self {
        Self {
            handle,
            history: InputHistory::new(window),
            ping_ms: 0,
        }
    }

    /// The handle issued for this player.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> PlayerHandle {
        self.handle
    }

    /// The participant kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> PlayerKind {
        self.handle.kind()
    }

    /// The player's input history.
    #[inline]
    #[must_use]
    pub fn history(&self) -> &InputHistory<I> {
        &self.history
    }

    /// The player's input history, mutably.
    #[inline]
    pub fn history_mut(&mut self) -> &mut InputHistory<I> {
        &mut self.history
    }

    /// Most recent round-trip estimate in milliseconds.
    #[inline]
    #[must_use]
    pub fn ping_ms(&self) -> u32 {
        self.ping_ms
    }

    pub(crate) fn set_ping_ms(&mut self, ping_ms: u32) {
        self.ping_ms = ping_ms;
    }

    /// An estimate of the step this player's endpoint has itself reached.
    #[must_use]
    pub fn estimated_local_step(&self, update_interval_ms: u32) -> Step {
        self.history
            .estimated_local_step(self.ping_ms, update_interval_ms)
    }
}

/// All participant records, in insertion order.
#[derive(Debug, Clone)]
pub struct PlayerRegistry<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    players: Vec<Player<I>>,
    /// Input-ring capacity for every player, fixed at construction.
    window: NonZeroUsize,
}

impl<I> PlayerRegistry<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    /// Creates an empty registry whose players get input rings of `window`
    /// slots.
    #[must_use]
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            players: Vec::new(),
            window,
        }
    }

    /// The number of registered participants.
    #[inline]
    #[must_use]
    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    /// Registers a new participant and returns its handle. Handle ids are
    /// issued sequentially and never reissued.
    pub fn add_player(&mut self, kind: PlayerKind) -> PlayerHandle {
        let handle = PlayerHandle::new(self.players.len(), kind);
        self.players.push(Player::new(handle, self.window));
        handle
    }

    /// Resolves a handle to its record.
    pub fn player(&self, handle: PlayerHandle) -> RollbackResult<&Player<I>> {
        self.players
            .get(handle.id())
            .ok_or(RollbackError::InvalidHandle {
                handle,
                num_players: self.players.len(),
            })
    }

    /// Resolves a handle to its record, mutably.
    pub fn player_mut(&mut self, handle: PlayerHandle) -> RollbackResult<&mut Player<I>> {
        let num_players = self.players.len();
        self.players
            .get_mut(handle.id())
            .ok_or(RollbackError::InvalidHandle {
                handle,
                num_players,
            })
    }

    /// Resolves a handle to its record, requiring the registered kind to
    /// match `required`. The kind check uses the registry's record, never the
    /// kind embedded in the caller's handle.
    pub fn player_of_kind_mut(
        &mut self,
        handle: PlayerHandle,
        required: PlayerKind,
    ) -> RollbackResult<&mut Player<I>> {
        let player = self.player_mut(handle)?;
        if player.kind() != required {
            return Err(RollbackError::WrongPlayerKind {
                handle: player.handle(),
                required,
                actual: player.kind(),
            });
        }
        Ok(player)
    }

    /// Iterates over all players in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Player<I>> {
        self.players.iter()
    }

    /// Determines the latest synchronized step, consuming pending
    /// misprediction signals along the way.
    ///
    /// Starting from `current_step`, every signal strictly below the running
    /// minimum lowers it and is cleared (consumed). A signal at or above the
    /// running minimum survives for a later update; re-simulation past it is
    /// idempotent, so a surviving signal costs a redundant rollback, never a
    /// divergence.
    pub fn latest_synchronized_step(&mut self, current_step: Step) -> Step {
        let mut sync = current_step;
        for player in &mut self.players {
            let confirmed = player.history().last_confirmed_step();
            if confirmed.is_valid() && confirmed < sync {
                sync = confirmed;
                player.history_mut().clear_confirmed();
            }
        }
        sync
    }

    /// Fills `scratch` with one input per player, in insertion order, for the
    /// given step. Players with no input at that step contribute their
    /// repeat-last prediction (blank if they never sent anything, which also
    /// covers spectators).
    pub fn gather_inputs(&self, step: Step, scratch: &mut InputVec<I>) -> RollbackResult<()> {
        scratch.clear();
        for player in &self.players {
            scratch.push(player.history().input_at(step)?);
        }
        Ok(())
    }

    /// The largest number of steps any remote player trails the local
    /// simulation by, as estimated from their latest input and ping. Local
    /// players and spectators do not participate; peers estimated to be ahead
    /// contribute zero.
    #[must_use]
    pub fn max_step_advantage(&self, current_step: Step, update_interval_ms: u32) -> i32 {
        let mut advantage = 0;
        for player in &self.players {
            if player.kind() != PlayerKind::Remote {
                continue;
            }
            let estimated = player.estimated_local_step(update_interval_ms);
            advantage = advantage.max((current_step - estimated).max(0));
        }
        advantage
    }
}

// #########
// # TESTS #
// #########

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used)]
mod tests {
    use super::*;
    use smallvec::SmallVec;

    fn registry() -> PlayerRegistry<u8> {
        PlayerRegistry::new(NonZeroUsize::new(4).unwrap())
    }

    #[test]
    fn handles_are_issued_sequentially() {
        let mut registry = registry();
        let a = registry.add_player(PlayerKind::Local);
        let b = registry.add_player(PlayerKind::Remote);
        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        assert_eq!(registry.num_players(), 2);
    }

    #[test]
    fn unknown_handle_is_invalid() {
        let registry = registry();
        let ghost = PlayerHandle::new(3, PlayerKind::Local);
        assert_eq!(
            registry.player(ghost).unwrap_err(),
            RollbackError::InvalidHandle {
                handle: ghost,
                num_players: 0,
            }
        );
    }

    #[test]
    fn kind_check_uses_the_registered_kind() {
        let mut registry = registry();
        let local = registry.add_player(PlayerKind::Local);
        // forge a handle with the same id but a lying kind
        let forged = PlayerHandle::new(local.id(), PlayerKind::Remote);
        let err = registry
            .player_of_kind_mut(forged, PlayerKind::Remote)
            .unwrap_err();
        assert_eq!(
            err,
            RollbackError::WrongPlayerKind {
                handle: local,
                required: PlayerKind::Remote,
                actual: PlayerKind::Local,
            }
        );
    }

    #[test]
    fn gather_respects_insertion_order() {
        let mut registry = registry();
        let a = registry.add_player(PlayerKind::Local);
        let b = registry.add_player(PlayerKind::Local);
        registry
            .player_mut(a)
            .unwrap()
            .history_mut()
            .add_input(Step::new(0), 10, false)
            .unwrap();
        registry
            .player_mut(b)
            .unwrap()
            .history_mut()
            .add_input(Step::new(0), 20, false)
            .unwrap();

        let mut scratch: SmallVec<[u8; 4]> = SmallVec::new();
        registry.gather_inputs(Step::new(0), &mut scratch).unwrap();
        assert_eq!(scratch.as_slice(), &[10, 20]);
    }

    #[test]
    fn gather_defaults_for_inputless_players() {
        let mut registry = registry();
        registry.add_player(PlayerKind::Remote);
        registry.add_player(PlayerKind::Spectator);

        let mut scratch: SmallVec<[u8; 4]> = SmallVec::new();
        registry.gather_inputs(Step::new(2), &mut scratch).unwrap();
        assert_eq!(scratch.as_slice(), &[0, 0]);
    }

    #[test]
    fn sync_step_consumes_the_lowest_signal() {
        let mut registry = registry();
        let remote = registry.add_player(PlayerKind::Remote);
        {
            let history = registry.player_mut(remote).unwrap().history_mut();
            history.add_input(Step::new(0), 0, true).unwrap();
            history.add_input(Step::new(1), 0, true).unwrap();
            history.add_input(Step::new(2), 9, true).unwrap(); // signal at 2
        }

        let sync = registry.latest_synchronized_step(Step::new(5));
        assert_eq!(sync, Step::new(2));
        // consumed
        assert!(registry
            .player(remote)
            .unwrap()
            .history()
            .last_confirmed_step()
            .is_null());
        // a second scan finds nothing
        assert_eq!(
            registry.latest_synchronized_step(Step::new(5)),
            Step::new(5)
        );
    }

    #[test]
    fn signal_at_current_step_survives() {
        let mut registry = registry();
        let remote = registry.add_player(PlayerKind::Remote);
        registry
            .player_mut(remote)
            .unwrap()
            .history_mut()
            .add_input(Step::new(0), 9, true)
            .unwrap(); // signal at 0

        // not strictly below current_step == 0: kept for later
        assert_eq!(
            registry.latest_synchronized_step(Step::new(0)),
            Step::new(0)
        );
        assert_eq!(
            registry
                .player(remote)
                .unwrap()
                .history()
                .last_confirmed_step(),
            Step::new(0)
        );
        // once the session has advanced, the signal is consumed
        assert_eq!(
            registry.latest_synchronized_step(Step::new(1)),
            Step::new(0)
        );
    }

    #[test]
    fn advantage_counts_remote_players_only() {
        let mut registry = registry();
        registry.add_player(PlayerKind::Local);
        assert_eq!(registry.max_step_advantage(Step::new(10), 16), 0);

        let remote = registry.add_player(PlayerKind::Remote);
        // remote has no inputs: estimated step is -1
        assert_eq!(registry.max_step_advantage(Step::new(10), 16), 11);

        {
            let player = registry.player_mut(remote).unwrap();
            player.history_mut().add_input(Step::new(0), 0, true).unwrap();
            player.set_ping_ms(32);
        }
        // estimated = 0 + 32/16 = 2
        assert_eq!(registry.max_step_advantage(Step::new(10), 16), 8);
    }

    #[test]
    fn advantage_is_never_negative() {
        let mut registry = registry();
        let remote = registry.add_player(PlayerKind::Remote);
        {
            let player = registry.player_mut(remote).unwrap();
            for step in 0..3 {
                player
                    .history_mut()
                    .add_input(Step::new(step), 0, true)
                    .unwrap();
            }
            player.set_ping_ms(64);
        }
        // estimated = 2 + 4 = 6, ahead of current step 1
        assert_eq!(registry.max_step_advantage(Step::new(1), 16), 0);
    }
}
