//! Per-player input history.
//!
//! [`InputHistory`] stores one player's inputs in a ring sized to the rollback
//! window and tracks two steps: the highest step for which an input was
//! recorded (`last_added_step`) and, for remote players, the earliest step at
//! which a newly arrived authoritative input contradicted the prediction the
//! session simulated with (`last_confirmed_step`).
//!
//! # Misprediction detection
//!
//! The session predicts a remote player's input by repeating their last known
//! input (blank before any input arrived). Because inputs are appended
//! strictly sequentially, the value stored at slot `step − 1` when `step`'s
//! input arrives is exactly that prediction — so detection is a single slot
//! comparison, no separate prediction table. At step 0 the slot at `−1` wraps
//! to the seeded blank input, which is the prediction used before any input
//! arrived.
//!
//! Detection fires for any arriving input that differs from its predecessor,
//! including inputs for steps the session has not simulated yet; the session
//! consumes such a signal only once its step counter has passed it.

use std::num::NonZeroUsize;

use tracing::trace;

use crate::error::{RollbackError, RollbackResult};
use crate::ring_buffer::RingBuffer;
use crate::step_info::PlayerInput;
use crate::Step;

/// A single player's sequential input record.
#[derive(Debug, Clone)]
pub struct InputHistory<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    /// Cyclic input storage; capacity equals the rollback window.
    inputs: RingBuffer<PlayerInput<I>>,
    /// The highest step for which an input was recorded.
    last_added_step: Step,
    /// The earliest step with a pending unconsumed misprediction, or
    /// [`Step::NULL`].
    last_confirmed_step: Step,
}

impl<I> InputHistory<I>
where
    I: Copy + Clone + PartialEq + Default,
{
    /// Creates an empty history whose ring holds `window` slots.
    #[must_use]
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            inputs: RingBuffer::with_capacity(window, PlayerInput::blank(Step::NULL)),
            last_added_step: Step::NULL,
            last_confirmed_step: Step::NULL,
        }
    }

    /// The highest step for which an input was recorded, or [`Step::NULL`]
    /// if none was.
    #[inline]
    #[must_use]
    pub fn last_added_step(&self) -> Step {
        self.last_added_step
    }

    /// The earliest step with a pending misprediction signal, or
    /// [`Step::NULL`] if the signal state is idle.
    #[inline]
    #[must_use]
    pub fn last_confirmed_step(&self) -> Step {
        self.last_confirmed_step
    }

    /// Resets the misprediction signal to idle. Called by the session when it
    /// consumes the signal during rollback.
    #[inline]
    pub fn clear_confirmed(&mut self) {
        self.last_confirmed_step = Step::NULL;
    }

    /// Records the input for `step`.
    ///
    /// - `Ok(false)`: `step` is at or before `last_added_step` — a duplicate
    ///   or stale arrival; nothing is mutated.
    /// - `Err(NonSequentialInput)`: `step` skips ahead of
    ///   `last_added_step + 1`.
    /// - `Ok(true)`: the input was recorded.
    ///
    /// With `detect_mispredictions` set (remote players only) and no signal
    /// already pending, the arriving input is compared against the prediction
    /// that occupied slot `step − 1`; on mismatch the signal is raised at
    /// `step`.
    pub fn add_input(
        &mut self,
        step: Step,
        input: I,
        detect_mispredictions: bool,
    ) -> RollbackResult<bool> {
        if step <= self.last_added_step {
            trace!("dropping stale input for step {step}");
            return Ok(false);
        }
        let expected = self.last_added_step + 1;
        if step != expected {
            return Err(RollbackError::NonSequentialInput {
                expected,
                got: step,
            });
        }

        if detect_mispredictions && self.last_confirmed_step.is_null() {
            let predicted = self.inputs.get(step.as_i32() - 1).input;
            if predicted != input {
                self.last_confirmed_step = step;
            }
        }

        self.last_added_step = step;
        self.inputs.set(step.as_i32(), PlayerInput::new(step, input));
        Ok(true)
    }

    /// Returns the input to simulate `step` with.
    ///
    /// The requested step is clamped into `[0, last_added_step]`, so a step
    /// beyond the latest known input yields the latest known input (the
    /// repeat-last prediction) and a history with no inputs at all yields the
    /// blank input. A clamped step whose ring slot has been overwritten by a
    /// newer step has aged out of the window — that is a contract violation.
    pub fn input_at(&self, step: Step) -> RollbackResult<I> {
        if self.last_added_step.is_null() {
            return Ok(I::default());
        }
        let clamped = step.clamp(Step::new(0), self.last_added_step);
        let slot = self.inputs.get(clamped.as_i32());
        if slot.step != clamped {
            return Err(RollbackError::InputDiscarded {
                requested: clamped,
                resident: slot.step,
            });
        }
        Ok(slot.input)
    }

    /// An estimate of the step the remote endpoint has itself reached
    /// locally: the latest step heard from them plus the steps that elapse
    /// during one network round trip.
    #[must_use]
    pub fn estimated_local_step(&self, ping_ms: u32, update_interval_ms: u32) -> Step {
        self.last_added_step + (ping_ms / update_interval_ms) as i32
    }
}

// #########
// # TESTS #
// #########
