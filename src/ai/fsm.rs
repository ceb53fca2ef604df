//! Finite State Machine for AI Behavior
//!
//! A generic state machine driving one controller. States are registered once
//! under a small key (usually a `Copy` enum) and live as long as the machine;
//! transitions switch between the registered instances instead of allocating
//! new ones.
//!
//! # Lifecycle
//!
//! - [`StateMachine::initialize`] enters the start state.
//! - [`StateMachine::tick`] runs the current state's `execute()` once and
//!   applies at most one transition.
//! - A transition runs `exit()` on the old state strictly before `enter()` on
//!   the new one. `execute()` of the new state first runs on the next tick.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Key { Idle, Chase }
//!
//! let mut fsm = StateMachine::new("guard");
//! fsm.register(Key::Idle, Box::new(IdleState));
//! fsm.register(Key::Chase, Box::new(ChaseState));
//! fsm.initialize(&mut guard, Key::Idle)?;
//!
//! // Every simulation step
//! fsm.tick(&mut guard)?;
//! ```

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;
use thiserror::Error;

// ============================================================================
// State Trait
// ============================================================================

/// A behavioural mode of a controller of type `C`, registered under key `K`.
///
/// The lifecycle is:
///
/// 1. `enter()` - Called once when the state becomes current
/// 2. `execute()` - Called each tick while current
/// 3. `exit()` - Called once when another state takes over
///
/// `enter()` cannot transition. States that must act without a one-tick stall
/// do their actuation in `enter()` and leave decisions to `execute()`.
pub trait State<K, C>: fmt::Debug + Send + Sync {
    /// State name for debugging and logging.
    fn name(&self) -> &'static str;

    /// Called when entering this state. Reset per-state data here.
    fn enter(&mut self, _ctrl: &mut C) {}

    /// Called each tick while in this state.
    fn execute(&mut self, ctrl: &mut C) -> Transition<K>;

    /// Called when exiting this state.
    fn exit(&mut self, _ctrl: &mut C) {}
}

// ============================================================================
// Transition
// ============================================================================

/// Returned from `State::execute()`: stay, or switch to another state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<K> {
    /// Stay in the current state.
    None,
    /// Transition to the state registered under this key.
    To(K),
}

/// Result of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The machine switched state.
    Changed {
        /// Previous state name, `None` on initialization
        from: Option<&'static str>,
        /// New state name
        to: &'static str,
    },
    /// Nothing happened (no transition requested, or a self-transition).
    Unchanged,
}

/// State machine errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsmError {
    /// No state is registered under the requested key
    #[error("no state registered under {0}")]
    UnknownState(String),
    /// The machine was ticked before a start state was entered
    #[error("state machine has no current state")]
    NotInitialized,
}

// ============================================================================
// State Machine
// ============================================================================

/// A finite state machine over the states of one controller.
///
/// # Type Parameters
///
/// - `K`: key naming each registered state
/// - `C`: controller type passed to state methods
pub struct StateMachine<K, C> {
    /// Owner label used in log lines
    owner: String,
    /// Registered states
    states: FxHashMap<K, Box<dyn State<K, C>>>,
    /// Key of the active state
    current: Option<K>,
}

impl<K, C> StateMachine<K, C>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    /// Create an empty machine. `owner` labels its log lines.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            states: FxHashMap::default(),
            current: None,
        }
    }

    /// Register a state under `key`, replacing any previous one.
    pub fn register(&mut self, key: K, state: Box<dyn State<K, C>>) {
        self.states.insert(key, state);
    }

    /// Builder form of [`StateMachine::register`].
    #[must_use]
    pub fn with_state(mut self, key: K, state: impl State<K, C> + 'static) -> Self {
        self.register(key, Box::new(state));
        self
    }

    /// Enter the start state.
    ///
    /// # Errors
    ///
    /// Returns `FsmError::UnknownState` if nothing is registered under `start`.
    /// The machine is left without a current state.
    pub fn initialize(&mut self, ctrl: &mut C, start: K) -> Result<ChangeOutcome, FsmError> {
        if !self.states.contains_key(&start) {
            log::error!("[{}] null starting state {start:?}", self.owner);
            return Err(FsmError::UnknownState(format!("{start:?}")));
        }

        let from = self.exit_current(ctrl);
        self.current = Some(start);
        let to = self.enter_current(ctrl);
        log::debug!("[{}] initial state {to}", self.owner);

        Ok(ChangeOutcome::Changed { from, to })
    }

    /// Switch to the state registered under `next`.
    ///
    /// A request for the current state is a caller bug: it is logged and
    /// nothing runs.
    ///
    /// # Errors
    ///
    /// Returns `FsmError::UnknownState` if nothing is registered under `next`;
    /// the machine stays in its current state.
    pub fn change_state(&mut self, ctrl: &mut C, next: K) -> Result<ChangeOutcome, FsmError> {
        if self.current == Some(next) {
            log::warn!(
                "[{}] attempted to change to the same state: {}",
                self.owner,
                self.current_state_name().unwrap_or("?")
            );
            return Ok(ChangeOutcome::Unchanged);
        }

        if !self.states.contains_key(&next) {
            log::error!("[{}] change to unknown state {next:?}", self.owner);
            return Err(FsmError::UnknownState(format!("{next:?}")));
        }

        let from = self.exit_current(ctrl);
        self.current = Some(next);
        let to = self.enter_current(ctrl);
        log::debug!(
            "[{}] changing state from {} to {to}",
            self.owner,
            from.unwrap_or("None")
        );

        Ok(ChangeOutcome::Changed { from, to })
    }

    /// Execute the current state once and apply its transition, if any.
    ///
    /// # Errors
    ///
    /// Returns `FsmError::NotInitialized` when no state is current, or
    /// `FsmError::UnknownState` when the requested state does not exist.
    pub fn tick(&mut self, ctrl: &mut C) -> Result<ChangeOutcome, FsmError> {
        let Some(key) = self.current else {
            return Err(FsmError::NotInitialized);
        };

        let state = self
            .states
            .get_mut(&key)
            .ok_or_else(|| FsmError::UnknownState(format!("{key:?}")))?;

        match state.execute(ctrl) {
            Transition::None => Ok(ChangeOutcome::Unchanged),
            Transition::To(next) => self.change_state(ctrl, next),
        }
    }

    /// Key of the current state.
    #[must_use]
    pub fn current(&self) -> Option<K> {
        self.current
    }

    /// Get the name of the current state.
    #[must_use]
    pub fn current_state_name(&self) -> Option<&'static str> {
        self.current
            .and_then(|key| self.states.get(&key))
            .map(|state| state.name())
    }

    /// Check if the machine is in the state registered under `key`.
    #[must_use]
    pub fn is_in_state(&self, key: K) -> bool {
        self.current == Some(key)
    }

    /// Whether a start state has been entered
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.current.is_some()
    }

    /// Exit the current state, if any, and return its name
    fn exit_current(&mut self, ctrl: &mut C) -> Option<&'static str> {
        let key = self.current?;
        let state = self.states.get_mut(&key)?;
        state.exit(ctrl);
        Some(state.name())
    }

    /// Enter the (already switched) current state and return its name
    fn enter_current(&mut self, ctrl: &mut C) -> &'static str {
        match self.current.and_then(|key| self.states.get_mut(&key)) {
            Some(state) => {
                state.enter(ctrl);
                state.name()
            }
            None => "None",
        }
    }
}

impl<K: fmt::Debug, C> fmt::Debug for StateMachine<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("owner", &self.owner)
            .field("current", &self.current)
            .field("states", &self.states.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        Idle,
        Chase,
        Missing,
    }

    /// Records lifecycle calls in order
    #[derive(Debug, Default)]
    struct Probe {
        log: Vec<String>,
        can_see_target: bool,
        request: Option<Key>,
    }

    #[derive(Debug)]
    struct Recording(&'static str);

    impl State<Key, Probe> for Recording {
        fn name(&self) -> &'static str {
            self.0
        }

        fn enter(&mut self, ctrl: &mut Probe) {
            ctrl.log.push(format!("enter {}", self.0));
        }

        fn execute(&mut self, ctrl: &mut Probe) -> Transition<Key> {
            ctrl.log.push(format!("execute {}", self.0));
            if let Some(key) = ctrl.request.take() {
                return Transition::To(key);
            }
            if self.0 == "Idle" && ctrl.can_see_target {
                return Transition::To(Key::Chase);
            }
            Transition::None
        }

        fn exit(&mut self, ctrl: &mut Probe) {
            ctrl.log.push(format!("exit {}", self.0));
        }
    }

    fn machine() -> StateMachine<Key, Probe> {
        StateMachine::new("probe")
            .with_state(Key::Idle, Recording("Idle"))
            .with_state(Key::Chase, Recording("Chase"))
    }

    #[test]
    fn test_fsm_initialize_enters_start_state() {
        let mut fsm = machine();
        let mut probe = Probe::default();

        assert!(!fsm.is_initialized());
        let outcome = fsm.initialize(&mut probe, Key::Idle).unwrap();

        assert_eq!(
            outcome,
            ChangeOutcome::Changed {
                from: None,
                to: "Idle"
            }
        );
        assert_eq!(fsm.current_state_name(), Some("Idle"));
        assert_eq!(probe.log, vec!["enter Idle"]);
    }

    #[test]
    fn test_fsm_initialize_unknown_state_fails() {
        let mut fsm = machine();
        let mut probe = Probe::default();

        let err = fsm.initialize(&mut probe, Key::Missing).unwrap_err();

        assert!(matches!(err, FsmError::UnknownState(_)));
        assert!(!fsm.is_initialized());
        assert!(probe.log.is_empty());
    }

    #[test]
    fn test_fsm_tick_before_initialize_fails() {
        let mut fsm = machine();
        let mut probe = Probe::default();

        assert_eq!(fsm.tick(&mut probe), Err(FsmError::NotInitialized));
    }

    #[test]
    fn test_fsm_transition_exit_before_enter() {
        let mut fsm = machine();
        let mut probe = Probe::default();
        fsm.initialize(&mut probe, Key::Idle).unwrap();
        probe.log.clear();

        probe.can_see_target = true;
        let outcome = fsm.tick(&mut probe).unwrap();

        assert_eq!(
            outcome,
            ChangeOutcome::Changed {
                from: Some("Idle"),
                to: "Chase"
            }
        );
        // New state's execute is not run in the same tick
        assert_eq!(probe.log, vec!["execute Idle", "exit Idle", "enter Chase"]);
        assert!(fsm.is_in_state(Key::Chase));
    }

    #[test]
    fn test_fsm_self_transition_is_noop() {
        let mut fsm = machine();
        let mut probe = Probe::default();
        fsm.initialize(&mut probe, Key::Idle).unwrap();
        probe.log.clear();

        let outcome = fsm.change_state(&mut probe, Key::Idle).unwrap();

        assert_eq!(outcome, ChangeOutcome::Unchanged);
        assert!(probe.log.is_empty(), "no exit/enter on self-transition");
    }

    #[test]
    fn test_fsm_unknown_transition_keeps_state() {
        let mut fsm = machine();
        let mut probe = Probe::default();
        fsm.initialize(&mut probe, Key::Idle).unwrap();

        probe.request = Some(Key::Missing);
        let result = fsm.tick(&mut probe);

        assert!(matches!(result, Err(FsmError::UnknownState(_))));
        assert!(fsm.is_in_state(Key::Idle));
        assert!(!probe.log.contains(&"exit Idle".to_string()));
    }

    #[test]
    fn test_fsm_one_transition_per_tick() {
        let mut fsm = machine();
        let mut probe = Probe {
            can_see_target: true,
            ..Default::default()
        };
        fsm.initialize(&mut probe, Key::Idle).unwrap();

        fsm.tick(&mut probe).unwrap();
        assert_eq!(fsm.current(), Some(Key::Chase));

        // Chase stays put unless asked
        assert_eq!(fsm.tick(&mut probe).unwrap(), ChangeOutcome::Unchanged);
        assert_eq!(fsm.current(), Some(Key::Chase));
    }

    #[test]
    fn test_fsm_states_are_reused() {
        let mut fsm = machine();
        let mut probe = Probe::default();
        fsm.initialize(&mut probe, Key::Idle).unwrap();

        fsm.change_state(&mut probe, Key::Chase).unwrap();
        fsm.change_state(&mut probe, Key::Idle).unwrap();

        assert_eq!(
            probe.log,
            vec!["enter Idle", "exit Idle", "enter Chase", "exit Chase", "enter Idle"]
        );
        assert!(format!("{fsm:?}").contains("states: 2"));
    }
}
