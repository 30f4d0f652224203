//! # Task Control Block
//!
//! The scheduler's per-task record: static configuration (name, stack,
//! priority, core), execution state, and the routine the task runs.
//!
//! Tasks are pinned. A TCB's `config.core` is fixed at creation and the
//! scheduler only ever hands the task to that core.

use crate::app::{Setup, TaskH, TaskL};
use crate::config::{CoreId, MAX_TASKS};
use crate::routine::{Context, Outcome, Routine};

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task.
///
/// ```text
///   ┌──────────┐     schedule()      ┌─────────┐
///   │  Ready   │ ──────────────────► │ Running │
///   └──────────┘                     └─────────┘
///        ▲          preempt               │
///        ├────────────────────────────────┤
///        │                                │ sleep()
///        │   wake_at reached        ┌──────────┐
///        └───────────────────────── │ Blocked  │
///                                   └──────────┘
/// ```
///
/// Deleted tasks go back to `Suspended` and free their slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    /// Sleeping until `wake_at`.
    Blocked,
    /// Free slot, or a task that deleted itself.
    Suspended,
}

/// Opaque handle returned by task creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle(pub(crate) usize);

impl TaskHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Static configuration of a task, as passed to
/// [`Scheduler::create_task_pinned_to_core`](crate::scheduler::Scheduler::create_task_pinned_to_core).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfig {
    pub name: &'static str,

    /// Requested stack size in bytes. Recorded, not allocated: routines
    /// keep their state inline in the TCB.
    pub stack_size: usize,

    /// Base priority (higher = more important).
    pub priority: u8,

    /// The only core this task may run on.
    pub core: CoreId,
}

// ---------------------------------------------------------------------------
// Task bodies
// ---------------------------------------------------------------------------

/// The routine a task runs. Each variant owns its own state, so no
/// untyped task argument is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEntry {
    Setup(Setup),
    High(TaskH),
    Low(TaskL),
}

impl Routine for TaskEntry {
    fn step(&mut self, cx: &mut Context<'_>) -> Outcome {
        match self {
            TaskEntry::Setup(r) => r.step(cx),
            TaskEntry::High(r) => r.step(cx),
            TaskEntry::Low(r) => r.step(cx),
        }
    }

    fn in_critical(&self) -> bool {
        match self {
            TaskEntry::Setup(r) => r.in_critical(),
            TaskEntry::High(r) => r.in_critical(),
            TaskEntry::Low(r) => r.in_critical(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

pub struct TaskControlBlock {
    /// Index in the scheduler's task array.
    pub id: usize,

    pub state: TaskState,

    pub config: TaskConfig,

    /// `None` for a free slot.
    pub entry: Option<TaskEntry>,

    /// Uptime at which a `Blocked` task becomes ready again.
    pub wake_at: u64,

    /// Uptime of the last tick this task ran. Breaks priority ties.
    pub last_run: u64,

    /// Whether this slot is allocated.
    pub active: bool,
}

impl TaskControlBlock {
    /// An unallocated TCB.
    pub const EMPTY: Self = Self {
        id: 0,
        state: TaskState::Suspended,
        config: TaskConfig { name: "", stack_size: 0, priority: 0, core: CoreId::Pro },
        entry: None,
        wake_at: 0,
        last_run: 0,
        active: false,
    };

    /// Initialize a slot for a newly created task.
    pub fn init(&mut self, id: usize, config: TaskConfig, entry: TaskEntry) {
        *self = Self { id, state: TaskState::Ready, config, entry: Some(entry), active: true, ..Self::EMPTY };
    }

    /// Free the slot.
    pub fn clear(&mut self) {
        self.active = false;
        self.state = TaskState::Suspended;
        self.entry = None;
    }

    /// Ready or already running.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        self.active && matches!(self.state, TaskState::Ready | TaskState::Running)
    }

    #[inline]
    pub fn can_run_on_core(&self, core: CoreId) -> bool {
        self.config.core == core
    }

    /// Whether the task is inside a lock-protected section.
    pub fn in_critical(&self) -> bool {
        self.entry.map_or(false, |e| e.in_critical())
    }
}

/// Fresh table of free slots.
pub const fn empty_table() -> [TaskControlBlock; MAX_TASKS] {
    [TaskControlBlock::EMPTY; MAX_TASKS]
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
