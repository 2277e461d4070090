//! Slot types stored in the session's rings: an input tagged with its step,
//! and an opaque snapshot tagged with its step.

use crate::Step;

/// An opaque host snapshot captured at the beginning of a step.
///
/// `state` is `None` until the slot is first written; a populated slot whose
/// `step` no longer matches the step being looked up has been overwritten as
/// the ring wrapped.
#[derive(Debug, Clone)]
pub struct SavedStep<S> {
    /// The step this snapshot belongs to.
    pub step: Step,
    /// The host-provided state, captured via [`SessionHost::save`].
    ///
    /// [`SessionHost::save`]: crate::SessionHost::save
    pub state: Option<S>,
}

impl<S> Default for SavedStep<S> {
    fn default() -> Self {
        Self {
            step: Step::NULL,
            state: None,
        }
    }
}

/// Represents an input for a single player at a single step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlayerInput<I>
where
    I: Copy + Clone + PartialEq,
{
    /// The step this input belongs to. [`Step::NULL`] marks a never-written
    /// slot.
    pub step: Step,
    /// The input value given by the host.
    pub input: I,
}

impl<I: Copy + Clone + PartialEq + Default> PlayerInput<I> {
    /// Creates a new `PlayerInput` with the given step and input.
    #[must_use]
    pub fn new(step: Step, input: I) -> Self {
        Self { step, input }
    }

    /// Creates a blank input (the default value of the input type).
    ///
    /// Blank inputs seed the history ring; they double as the prediction used
    /// for a remote player before any of their inputs arrive.
    #[must_use]
    pub fn blank(step: Step) -> Self {
        Self {
            step,
            input: I::default(),
        }
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
    fn default_saved_step_is_empty() {
        let saved: SavedStep<u32> = SavedStep::default();
        assert_eq!(saved.step, Step::NULL);
        assert!(saved.state.is_none());
    }

    #[test]
    fn blank_input_uses_default_value() {
        let blank: PlayerInput<u8> = PlayerInput::blank(Step::NULL);
        assert_eq!(blank.input, 0);
        assert!(blank.step.is_null());
    }

    #[test]
    fn player_input_equality_covers_step_and_value() {
        let a = PlayerInput::new(Step::new(1), 5u8);
        let b = PlayerInput::new(Step::new(1), 5u8);
        let c = PlayerInput::new(Step::new(2), 5u8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
