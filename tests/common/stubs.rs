//! A deterministic stub game for driving sessions in tests.
//!
//! [`CountingHost`] implements [`SessionHost`] over a tiny deterministic
//! world and tallies every callback, so tests can assert exactly how many
//! saves / loads / simulations a session performed and with which inputs.

// Allow test-specific patterns that are appropriate for test code
#![allow(dead_code, clippy::panic, clippy::unwrap_used)]

use serde::{Deserialize, Serialize};

use redoubt_rollback::prelude::*;

/// Input for the stub game: a single counter value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StubInput {
    pub value: u32,
}

impl StubInput {
    pub fn new(value: u32) -> Self {
        Self { value }
    }
}

/// The stub world: a step counter plus a running sum of every input ever
/// simulated. Any divergence between a predicted and a corrected timeline
/// shows up in `accumulated`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StubState {
    pub tick: i32,
    pub accumulated: i64,
}

/// Config marker for the stub game.
pub struct StubConfig;

impl Config for StubConfig {
    type Input = StubInput;
    type State = StubState;
}

/// A host that advances [`StubState`] deterministically and counts callbacks.
#[derive(Debug, Default)]
pub struct CountingHost {
    pub world: StubState,
    pub saves: usize,
    pub loads: usize,
    pub simulations: usize,
    /// Step values of every `load`, in order.
    pub loaded_ticks: Vec<i32>,
    /// The input slice of every `simulate`, in order.
    pub simulated_inputs: Vec<Vec<StubInput>>,
    /// Every `broadcast`, in order.
    pub broadcasts: Vec<(PlayerHandle, Step, StubInput)>,
}

impl CountingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the tallies (not the world) so a test can scope its assertions
    /// to one phase.
    pub fn reset_counts(&mut self) {
        self.saves = 0;
        self.loads = 0;
        self.simulations = 0;
        self.loaded_ticks.clear();
        self.simulated_inputs.clear();
        self.broadcasts.clear();
    }
}

impl SessionHost<StubConfig> for CountingHost {
    fn save(&mut self) -> StubState {
        self.saves += 1;
        self.world.clone()
    }

    fn load(&mut self, state: &StubState) {
        self.loads += 1;
        self.loaded_ticks.push(state.tick);
        self.world = state.clone();
    }

    fn simulate(&mut self, inputs: &[StubInput]) {
        self.simulations += 1;
        self.simulated_inputs.push(inputs.to_vec());
        self.world.tick += 1;
        self.world.accumulated += inputs.iter().map(|i| i64::from(i.value)).sum::<i64>();
    }

    fn broadcast(&mut self, player: PlayerHandle, step: Step, input: StubInput) {
        self.broadcasts.push((player, step, input));
    }
}

/// Installs a subscriber that routes session tracing to the test output.
/// Call at the top of a test when debugging; repeated calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A session over the stub game with the given timing.
pub fn stub_session(
    update_interval_ms: u32,
    max_remote_ping_ms: u32,
) -> RollbackSession<StubConfig> {
    SessionBuilder::<StubConfig>::new()
        .with_update_interval(update_interval_ms)
        .unwrap()
        .with_max_remote_ping(max_remote_ping_ms)
        .unwrap()
        .start_session()
        .unwrap()
}
