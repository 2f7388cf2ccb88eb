//! Function-pointer finite state machine for the Improv provisioning session.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌───────────────────────┬──────────┬─────────┬────────────────┐ │
//! │  │ ProvisioningState     │ on_enter │ on_exit │ on_update      │ │
//! │  ├───────────────────────┼──────────┼─────────┼────────────────┤ │
//! │  │ Stopped               │ fn(ctx)  │ -       │ fn -> Option<> │ │
//! │  │ AwaitingAuthorization │ fn(ctx)  │ -       │ fn -> Option<> │ │
//! │  │ Authorized            │ fn(ctx)  │ -       │ fn -> Option<> │ │
//! │  │ Provisioning          │ fn(ctx)  │ -       │ fn -> Option<> │ │
//! │  │ Provisioned           │ fn(ctx)  │ -       │ fn -> Option<> │ │
//! │  └───────────────────────┴──────────┴─────────┴────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the current state.  If it
//! returns `Some(next)`, the engine runs `on_exit` for the current state,
//! then `on_enter` for the next.  Event-driven changes (connect, write,
//! disconnect) go through [`Fsm::force_transition`] so the same enter/exit
//! hooks run.  All handlers receive the [`SessionContext`] blackboard.

pub mod context;
pub mod states;

use context::SessionContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Improv device state.  The discriminant is the status characteristic byte.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProvisioningState {
    Stopped = 0,
    AwaitingAuthorization = 1,
    Authorized = 2,
    Provisioning = 3,
    Provisioned = 4,
}

impl ProvisioningState {
    pub const COUNT: usize = 5;

    /// Convert a table index back to a state.  Out-of-range indices fall
    /// back to `Stopped` (debug builds assert).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Stopped,
            1 => Self::AwaitingAuthorization,
            2 => Self::Authorized,
            3 => Self::Provisioning,
            4 => Self::Provisioned,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Stopped
            }
        }
    }

    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` action; runs once per transition.
pub type StateActionFn = fn(&mut SessionContext);

/// Per-tick handler.  `Some(next)` requests a transition.
pub type StateUpdateFn = fn(&mut SessionContext) -> Option<ProvisioningState>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: ProvisioningState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `ProvisioningState as usize`.
    table: [StateDescriptor; ProvisioningState::COUNT],
    current: usize,
    /// `ctx.now_ms` when the current state was entered.
    entered_at_ms: u64,
    transitions: u32,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; ProvisioningState::COUNT], initial: ProvisioningState) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table out of order"
        );
        Self {
            table,
            current: initial as usize,
            entered_at_ms: 0,
            transitions: 0,
        }
    }

    /// Run `on_enter` for the initial state.  Call once before the first tick.
    pub fn start(&mut self, ctx: &mut SessionContext) {
        info!("Improv FSM starting in state: {}", self.table[self.current].name);
        self.entered_at_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Run the current state's `on_update` and follow any transition it asks for.
    pub fn tick(&mut self, ctx: &mut SessionContext) {
        if let Some(next) = (self.table[self.current].on_update)(ctx) {
            self.transition(next, ctx);
        }
    }

    /// Jump to `next` now.  No-op when already there.
    pub fn force_transition(&mut self, next: ProvisioningState, ctx: &mut SessionContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> ProvisioningState {
        ProvisioningState::from_index(self.current)
    }

    pub fn time_in_state(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_at_ms)
    }

    /// Transitions taken since construction.
    pub fn transition_count(&self) -> u32 {
        self.transitions
    }

    fn transition(&mut self, next: ProvisioningState, ctx: &mut SessionContext) {
        let next_idx = next as usize;

        info!(
            "Improv state: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.entered_at_ms = ctx.now_ms;
        self.transitions = self.transitions.wrapping_add(1);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
