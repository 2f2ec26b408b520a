//! Timed tasks for the simulation
//!
//! Every delayed flow (fuses, chain delays, countdown steps, death animation
//! waits, respawns) is a task: a wait condition plus the action to run once
//! it is satisfied. The scheduler only moves forward when `advance` is called,
//! so a paused match freezes every task at once.

use serde::{Deserialize, Serialize};

use super::bomb::BombId;
use super::player::PlayerId;

/// Handle for cancelling or inspecting a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u32);

/// External notification a task can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// The host finished playing a player's death animation
    DeathAnimationDone(PlayerId),
}

/// What a task is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wait {
    /// Ticks left before firing
    Elapsed(u32),
    Signal(Signal),
}

/// Continuation run when a task fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskAction {
    /// Show the next countdown number (0 means "Go")
    Countdown(u32),
    /// Countdown finished, start play
    StartMatch,
    /// A bomb's own fuse ran out
    Fuse(BombId),
    /// A bomb caught in another blast goes off
    ChainDetonate(BombId),
    /// Death animation finished; settle lives
    ResolveDeath(PlayerId),
    Respawn(PlayerId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Task {
    id: TaskId,
    wait: Wait,
    action: TaskAction,
}

/// Cooperative task list polled once per tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    /// Pending tasks in scheduling order
    tasks: Vec<Task>,
    /// Signals raised since the last advance
    raised: Vec<Signal>,
    next_id: u32,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, wait: Wait, action: TaskAction) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        log::trace!("Scheduled {:?} as {:?} ({:?})", action, id, wait);
        self.tasks.push(Task { id, wait, action });
        id
    }

    /// Run `action` after `ticks` calls to `advance`.
    ///
    /// A zero delay fires on the next advance.
    pub fn after(&mut self, ticks: u32, action: TaskAction) -> TaskId {
        self.push(Wait::Elapsed(ticks.max(1)), action)
    }

    /// Run `action` on the first advance after `signal` is raised
    pub fn wait_until(&mut self, signal: Signal, action: TaskAction) -> TaskId {
        self.push(Wait::Signal(signal), action)
    }

    /// Drop a pending task. Returns false if it already fired or never existed.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let cancelled = self.tasks.len() != before;
        if cancelled {
            log::trace!("Cancelled {:?}", id);
        }
        cancelled
    }

    /// Record a signal for the next advance
    pub fn raise(&mut self, signal: Signal) {
        self.raised.push(signal);
    }

    /// Ticks left on a timed task
    pub fn remaining(&self, id: TaskId) -> Option<u32> {
        self.tasks.iter().find(|t| t.id == id).and_then(|t| match t.wait {
            Wait::Elapsed(ticks) => Some(ticks),
            Wait::Signal(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Step every task by one tick and return the actions that became due,
    /// in scheduling order. Each task fires exactly once.
    pub fn advance(&mut self) -> Vec<TaskAction> {
        let raised = std::mem::take(&mut self.raised);
        let mut due = Vec::new();

        self.tasks.retain_mut(|task| {
            let ready = match &mut task.wait {
                Wait::Elapsed(ticks) => {
                    *ticks = ticks.saturating_sub(1);
                    *ticks == 0
                }
                Wait::Signal(signal) => raised.contains(signal),
            };
            if ready {
                due.push(task.action);
            }
            !ready
        });

        due
    }
}
