//! # Redoubt Rollback
//!
//! A rollback netcode session core for deterministic, lockstep-style
//! multiplayer simulations (fighting games, fast-paced action games, RTS
//! micro-loops).
//!
//! The session coordinates a locally advancing simulation clock against remote
//! participants whose inputs arrive with variable latency by:
//!
//! - **predicting** remote input (repeat the last known input, or blank before
//!   any input arrived),
//! - **rewinding** the simulation to the latest commonly-agreed step when an
//!   authoritative input contradicts a prediction, then re-simulating forward
//!   deterministically,
//! - **throttling** local progress so trailing remote peers can catch up.
//!
//! The simulation itself stays on the host side: the session drives it through
//! the four callbacks of the [`SessionHost`] trait (`save`, `load`, `simulate`,
//! `broadcast`). Network transport, rendering and matchmaking are likewise the
//! host's business — remote inputs enter through
//! [`add_remote_input`](sessions::rollback_session::RollbackSession::add_remote_input)
//! and locally produced inputs leave through [`SessionHost::broadcast`].
//!
//! # Example
//!
//! ```
//! use redoubt_rollback::prelude::*;
//!
//! #[derive(Copy, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
//! struct Buttons(u8);
//!
//! #[derive(Clone, Default)]
//! struct World {
//!     tick: u64,
//! }
//!
//! struct Game {
//!     world: World,
//! }
//!
//! struct GameConfig;
//!
//! impl Config for GameConfig {
//!     type Input = Buttons;
//!     type State = World;
//! }
//!
//! impl SessionHost<GameConfig> for Game {
//!     fn save(&mut self) -> World {
//!         self.world.clone()
//!     }
//!     fn load(&mut self, state: &World) {
//!         self.world = state.clone();
//!     }
//!     fn simulate(&mut self, _inputs: &[Buttons]) {
//!         self.world.tick += 1;
//!     }
//! }
//!
//! let mut session = SessionBuilder::<GameConfig>::new()
//!     .with_update_interval(16)?
//!     .with_max_remote_ping(100)?
//!     .start_session()?;
//! let local = session.add_player(PlayerKind::Local);
//!
//! let mut game = Game { world: World::default() };
//! session.add_local_input(&mut game, local, Buttons(0))?;
//! session.update(&mut game, 16.0)?;
//! assert_eq!(game.world.tick, 1);
//! # Ok::<(), RollbackError>(())
//! ```
//!
//! # Threading
//!
//! Exactly one mutex guards the rollback-critical region and remote-input
//! ingestion. With the `sync-send` feature enabled, a
//! [`RemoteInputHandle`](sessions::rollback_session::RemoteInputHandle) can be
//! cloned onto a network thread while the game thread keeps driving the
//! session; every other API is game-thread only. See the session documentation
//! for details.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use serde::{de::DeserializeOwned, Serialize};
use smallvec::SmallVec;

pub use error::{RollbackError, RollbackResult};
pub use sessions::builder::{SessionBuilder, SessionSettings};
pub use sessions::rollback_session::{RemoteInputHandle, RollbackSession};
pub use step_info::{PlayerInput, SavedStep};

pub mod error;
pub mod input_history;
pub mod prelude;
pub mod ring_buffer;
pub mod step_info;
/// Session construction and orchestration.
pub mod sessions {
    pub mod builder;
    pub mod player_registry;
    pub mod rollback_session;
}

// #############
// # CONSTANTS #
// #############

/// Internally, -1 represents no step / invalid step.
///
/// This is the sentinel for "no input recorded yet" and "no pending
/// misprediction signal". Real steps are always non-negative.
pub const NULL_STEP: i32 = -1;

/// Stack-allocated input vector handed to [`SessionHost::simulate`], one entry
/// per player in insertion order. Spills to the heap above four players.
pub type InputVec<I> = SmallVec<[I; 4]>;

/// A step is a single discrete tick of the deterministic simulation.
///
/// Steps are the fundamental unit of time in rollback networking. Step numbers
/// start at 0 and increment sequentially; the session's step counter never
/// decreases — a rollback re-executes the simulation to reach the same step
/// value rather than rewinding the counter.
///
/// The special value [`Step::NULL`] ([`NULL_STEP`], -1) represents "no step".
///
/// # Examples
///
/// ```
/// use redoubt_rollback::Step;
///
/// let step = Step::new(0);
/// assert!(step.is_valid());
/// assert!(Step::NULL.is_null());
///
/// let next = step + 1;
/// assert_eq!(next.as_i32(), 1);
/// assert_eq!(next - step, 1);
/// ```
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Step(i32);

impl Step {
    /// The null step constant, representing "no step" ([`NULL_STEP`], -1).
    pub const NULL: Step = Step(NULL_STEP);

    /// Creates a new `Step` from an `i32` value.
    ///
    /// This does not validate the step number; use [`Step::is_valid`] to check
    /// for non-negative steps.
    #[inline]
    #[must_use]
    pub const fn new(step: i32) -> Self {
        Step(step)
    }

    /// Returns the underlying `i32` value.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Returns `true` if this step is the null step.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == NULL_STEP
    }

    /// Returns `true` if this step is valid (non-negative).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "NULL_STEP")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl std::ops::Add<i32> for Step {
    type Output = Step;

    #[inline]
    fn add(self, rhs: i32) -> Self::Output {
        Step(self.0 + rhs)
    }
}

impl std::ops::AddAssign<i32> for Step {
    #[inline]
    fn add_assign(&mut self, rhs: i32) {
        self.0 += rhs;
    }
}

impl std::ops::Sub<i32> for Step {
    type Output = Step;

    #[inline]
    fn sub(self, rhs: i32) -> Self::Output {
        Step(self.0 - rhs)
    }
}

impl std::ops::Sub<Step> for Step {
    type Output = i32;

    #[inline]
    fn sub(self, rhs: Step) -> Self::Output {
        self.0 - rhs.0
    }
}

impl From<i32> for Step {
    #[inline]
    fn from(value: i32) -> Self {
        Step(value)
    }
}

impl From<Step> for i32 {
    #[inline]
    fn from(step: Step) -> Self {
        step.0
    }
}

impl PartialEq<i32> for Step {
    #[inline]
    fn eq(&self, other: &i32) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<i32> for Step {
    #[inline]
    fn partial_cmp(&self, other: &i32) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

// #############
// #   ENUMS   #
// #############

/// The three kinds of participants a session distinguishes:
/// - local players, who play on the local device,
/// - remote players, who play on other devices, and
/// - spectators, who observe without contributing input.
///
/// Unlike a transport-owning library, no address is attached to remote
/// participants — delivering their inputs to [`add_remote_input`] is the
/// host's job.
///
/// [`add_remote_input`]: sessions::rollback_session::RollbackSession::add_remote_input
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum PlayerKind {
    /// This player plays on the local device.
    #[default]
    Local,
    /// This player plays on a remote device; their inputs arrive through
    /// [`add_remote_input`](sessions::rollback_session::RollbackSession::add_remote_input).
    Remote,
    /// This participant observes without contributing input.
    Spectator,
}

/// A unique identity for a participant in a session.
///
/// Handles are issued by
/// [`add_player`](sessions::rollback_session::RollbackSession::add_player),
/// are stable for the lifetime of the session and are never reissued. A handle
/// carries the participant's [`PlayerKind`] for the host's convenience, but
/// **equality, ordering and hashing use the id only** — two handles with the
/// same id name the same participant.
///
/// External code holds handles as opaque values and re-resolves them through
/// the session; the session owns the player records.
///
/// # Examples
///
/// ```
/// use redoubt_rollback::{PlayerHandle, PlayerKind};
///
/// let a = PlayerHandle::new(0, PlayerKind::Local);
/// let b = PlayerHandle::new(0, PlayerKind::Remote);
/// // Equality is by id only.
/// assert_eq!(a, b);
/// assert_eq!(a.id(), 0);
/// assert!(a.is_local());
/// ```
#[derive(Debug, Copy, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlayerHandle {
    id: usize,
    kind: PlayerKind,
}

impl PlayerHandle {
    /// Creates a handle from its parts.
    ///
    /// Hosts normally receive handles from
    /// [`add_player`](sessions::rollback_session::RollbackSession::add_player)
    /// rather than constructing them; this exists for rebuilding a handle from
    /// persisted or transmitted parts.
    #[inline]
    #[must_use]
    pub const fn new(id: usize, kind: PlayerKind) -> Self {
        PlayerHandle { id, kind }
    }

    /// Returns the participant id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> usize {
        self.id
    }

    /// Returns the participant kind recorded in this handle.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> PlayerKind {
        self.kind
    }

    /// Returns `true` if this handle names a local player.
    #[inline]
    #[must_use]
    pub fn is_local(self) -> bool {
        self.kind == PlayerKind::Local
    }

    /// Returns `true` if this handle names a remote player.
    #[inline]
    #[must_use]
    pub fn is_remote(self) -> bool {
        self.kind == PlayerKind::Remote
    }

    /// Returns `true` if this handle names a spectator.
    #[inline]
    #[must_use]
    pub fn is_spectator(self) -> bool {
        self.kind == PlayerKind::Spectator
    }
}

// Equality, ordering and hashing deliberately ignore the kind: the id alone
// identifies the participant.

impl PartialEq for PlayerHandle {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PlayerHandle {}

impl PartialOrd for PlayerHandle {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlayerHandle {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for PlayerHandle {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

// #############
// #  TRAITS   #
// #############

/// Compile time parameterization for sessions.
///
/// This trait bundles the generic types needed for a session. Implement it on
/// a marker struct to configure your session types.
///
/// # Example
///
/// ```
/// use redoubt_rollback::Config;
/// use serde::{Deserialize, Serialize};
///
/// // Your game's input type
/// #[derive(Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
/// struct GameInput {
///     buttons: u8,
///     stick_x: i8,
///     stick_y: i8,
/// }
///
/// // Your game's state (for save/load)
/// #[derive(Clone)]
/// struct GameState {
///     step: i32,
///     // ... game-specific state
/// }
///
/// // Marker struct for Config
/// struct GameConfig;
///
/// impl Config for GameConfig {
///     type Input = GameInput;
///     type State = GameState;
/// }
/// ```
#[cfg(feature = "sync-send")]
pub trait Config: 'static + Send + Sync {
    /// The input type for a session. This is the only game-related data the
    /// session ever interprets (it compares inputs for equality to detect
    /// mispredictions).
    ///
    /// The [`Default`] implementation represents "no input": it is the
    /// prediction used for a remote player before any of their inputs arrive,
    /// and the input reported for spectators. The serde bounds let hosts
    /// serialize inputs for their transport when fulfilling
    /// [`SessionHost::broadcast`].
    type Input: Copy + Clone + PartialEq + Default + Serialize + DeserializeOwned + Send + Sync;

    /// The save state type for the session. Must be a deep, independent value;
    /// the session clones it when re-seeding snapshot slots.
    type State: Clone + Send + Sync;
}

/// Compile time parameterization for sessions.
///
/// This trait bundles the generic types needed for a session. Implement it on
/// a marker struct to configure your session types. Enable the `sync-send`
/// feature for the variant with `Send + Sync` bounds.
#[cfg(not(feature = "sync-send"))]
pub trait Config: 'static {
    /// The input type for a session. This is the only game-related data the
    /// session ever interprets (it compares inputs for equality to detect
    /// mispredictions).
    ///
    /// The [`Default`] implementation represents "no input": it is the
    /// prediction used for a remote player before any of their inputs arrive,
    /// and the input reported for spectators. The serde bounds let hosts
    /// serialize inputs for their transport when fulfilling
    /// [`SessionHost::broadcast`].
    type Input: Copy + Clone + PartialEq + Default + Serialize + DeserializeOwned;

    /// The save state type for the session. Must be a deep, independent value;
    /// the session clones it when re-seeding snapshot slots.
    type State: Clone;
}

/// The four callbacks through which the session drives the host simulation.
///
/// All callbacks are synchronous and are invoked from whichever thread called
/// [`update`](sessions::rollback_session::RollbackSession::update) or
/// [`add_local_input`](sessions::rollback_session::RollbackSession::add_local_input).
/// They must not call back into the same session from another thread while the
/// session holds its rollback lock (the lock is not reentrant; doing so
/// deadlocks).
///
/// # Determinism
///
/// `simulate` must be a pure function of the loaded state and the inputs:
/// given the same state and the same input sequence it must produce the same
/// state on every peer. Floating-point divergence, iteration over unordered
/// containers and reads of wall clocks all break rollback.
pub trait SessionHost<T: Config> {
    /// Returns a deep, independent snapshot of the current host state.
    fn save(&mut self) -> T::State;

    /// Replaces the host state with the given snapshot. Subsequent
    /// [`simulate`](SessionHost::simulate) calls must be deterministic from
    /// this point.
    fn load(&mut self, state: &T::State);

    /// Advances the host state by exactly one step, using one input per
    /// player in insertion order.
    fn simulate(&mut self, inputs: &[T::Input]);

    /// Delivers a locally produced input to remote peers.
    ///
    /// Invoked once per accepted
    /// [`add_local_input`](sessions::rollback_session::RollbackSession::add_local_input);
    /// never invoked for rejected duplicates. The default implementation does
    /// nothing, for hosts that have no peers to notify (e.g. replay
    /// verification).
    fn broadcast(&mut self, player: PlayerHandle, step: Step, input: T::Input) {
        let _ = (player, step, input);
    }
}

// #########
// # TESTS #
// #########
