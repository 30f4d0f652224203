//! # Scheduler
//!
//! Preemptive, priority-based scheduling over two cores. Every task is
//! pinned to one core, and each core picks only among its own tasks:
//!
//! 1. **Wake**: `Blocked` tasks whose `wake_at` has passed become `Ready`
//! 2. **Select**: highest priority runnable task pinned to the core
//! 3. **Tie-break**: equal priorities run round-robin, least recently run first
//!
//! Interrupt context is not the scheduler's business: the kernel runs a
//! pending interrupt on its core before asking for a task.

use crate::config::{CoreId, MAX_TASKS, NUM_CORES};
use crate::error::KernelError;
use crate::task::{empty_table, TaskConfig, TaskControlBlock, TaskEntry, TaskHandle, TaskState};

pub struct Scheduler {
    /// Fixed-size TCB table shared by both cores.
    pub tasks: [TaskControlBlock; MAX_TASKS],

    /// Task currently running on each core.
    pub current: [Option<usize>; NUM_CORES],

    /// Number of allocated slots.
    pub task_count: usize,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self { tasks: empty_table(), current: [None; NUM_CORES], task_count: 0 }
    }

    /// Create a task that will only ever run on `config.core`.
    ///
    /// # Returns
    /// - `Ok(handle)` for the new task, `Ready` immediately
    /// - `Err(KernelError::TaskTableFull)` if every slot is taken
    pub fn create_task_pinned_to_core(
        &mut self,
        entry: TaskEntry,
        config: TaskConfig,
    ) -> Result<TaskHandle, KernelError> {
        let id = self
            .tasks
            .iter()
            .position(|t| !t.active)
            .ok_or(KernelError::TaskTableFull)?;

        self.tasks[id].init(id, config, entry);
        self.task_count += 1;
        Ok(TaskHandle(id))
    }

    /// Delete the task running on `core`. Its slot is freed.
    pub fn delete_current_task(&mut self, core: CoreId) -> Result<TaskHandle, KernelError> {
        let id = self.current[core.index()]
            .take()
            .ok_or(KernelError::NoCurrentTask(core))?;
        self.tasks[id].clear();
        self.task_count -= 1;
        Ok(TaskHandle(id))
    }

    /// Put the task running on `core` to sleep until `until`.
    pub fn sleep_current(&mut self, core: CoreId, until: u64) -> Result<(), KernelError> {
        let id = self.current[core.index()]
            .take()
            .ok_or(KernelError::NoCurrentTask(core))?;
        self.tasks[id].state = TaskState::Blocked;
        self.tasks[id].wake_at = until;
        Ok(())
    }

    /// Select the task to run on `core` at uptime `now`.
    ///
    /// # Returns
    /// Index of the selected task, now `Running`, or `None` if the core has
    /// nothing to run.
    pub fn schedule(&mut self, core: CoreId, now: u64) -> Option<usize> {
        let mut best: Option<usize> = None;

        for i in 0..MAX_TASKS {
            let task = &mut self.tasks[i];
            if !task.active || !task.can_run_on_core(core) {
                continue;
            }
            if task.state == TaskState::Blocked && task.wake_at <= now {
                task.state = TaskState::Ready;
            }
            if !task.is_runnable() {
                continue;
            }

            best = match best {
                Some(b) if !self.outranks(i, b) => Some(b),
                _ => Some(i),
            };
        }

        let prev = self.current[core.index()];
        if let Some(p) = prev {
            if Some(p) != best && self.tasks[p].state == TaskState::Running {
                self.tasks[p].state = TaskState::Ready;
            }
        }

        if let Some(b) = best {
            self.tasks[b].state = TaskState::Running;
            self.tasks[b].last_run = now;
        }
        self.current[core.index()] = best;
        best
    }

    /// Whether task `a` should run in preference to task `b`.
    fn outranks(&self, a: usize, b: usize) -> bool {
        let (ta, tb) = (&self.tasks[a], &self.tasks[b]);
        match ta.config.priority.cmp(&tb.config.priority) {
            core::cmp::Ordering::Greater => true,
            core::cmp::Ordering::Less => false,
            core::cmp::Ordering::Equal => ta.last_run < tb.last_run,
        }
    }

    /// Look a live task up by name.
    pub fn find(&self, name: &str) -> Option<&TaskControlBlock> {
        self.tasks.iter().find(|t| t.active && t.config.name == name)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Setup, TaskH, TaskL};

    fn cfg(name: &'static str, priority: u8, core: CoreId) -> TaskConfig {
        TaskConfig { name, stack_size: 3072, priority, core }
    }

    #[test]
    fn test_pinned_tasks_stay_on_their_core() {
        let mut s = Scheduler::new();
        let l = s
            .create_task_pinned_to_core(TaskEntry::Low(TaskL::new(100)), cfg(TaskL::NAME, 1, CoreId::App))
            .unwrap();
        let h = s
            .create_task_pinned_to_core(TaskEntry::High(TaskH::new(0, 100)), cfg(TaskH::NAME, 2, CoreId::Pro))
            .unwrap();

        for now in 0..10 {
            assert_eq!(s.schedule(CoreId::Pro, now), Some(h.index()));
            assert_eq!(s.schedule(CoreId::App, now), Some(l.index()));
        }
    }

    #[test]
    fn test_higher_priority_wins() {
        let mut s = Scheduler::new();
        s.create_task_pinned_to_core(TaskEntry::Low(TaskL::new(100)), cfg("low", 1, CoreId::App))
            .unwrap();
        let hi = s
            .create_task_pinned_to_core(TaskEntry::Low(TaskL::new(100)), cfg("high", 5, CoreId::App))
            .unwrap();
        assert_eq!(s.schedule(CoreId::App, 0), Some(hi.index()));
        assert_eq!(s.schedule(CoreId::App, 1), Some(hi.index()));
    }

    #[test]
    fn test_equal_priority_round_robin() {
        let mut s = Scheduler::new();
        let a = s
            .create_task_pinned_to_core(TaskEntry::Low(TaskL::new(100)), cfg("a", 1, CoreId::App))
            .unwrap();
        let b = s
            .create_task_pinned_to_core(TaskEntry::Low(TaskL::new(100)), cfg("b", 1, CoreId::App))
            .unwrap();
        let first = s.schedule(CoreId::App, 1).unwrap();
        let second = s.schedule(CoreId::App, 2).unwrap();
        assert_ne!(first, second);
        assert!([a.index(), b.index()].contains(&first));
        assert_eq!(s.schedule(CoreId::App, 3), Some(first));
    }

    #[test]
    fn test_sleep_and_wake() {
        let mut s = Scheduler::new();
        let setup = s
            .create_task_pinned_to_core(TaskEntry::Setup(Setup::new(1000)), cfg(Setup::NAME, 1, CoreId::App))
            .unwrap();
        assert_eq!(s.schedule(CoreId::App, 0), Some(setup.index()));
        s.sleep_current(CoreId::App, 1000).unwrap();

        assert_eq!(s.schedule(CoreId::App, 999), None);
        assert_eq!(s.schedule(CoreId::App, 1000), Some(setup.index()));
    }

    #[test]
    fn test_delete_current_task() {
        let mut s = Scheduler::new();
        s.create_task_pinned_to_core(TaskEntry::Setup(Setup::new(0)), cfg(Setup::NAME, 1, CoreId::App))
            .unwrap();
        assert_eq!(s.delete_current_task(CoreId::App), Err(KernelError::NoCurrentTask(CoreId::App)));

        s.schedule(CoreId::App, 0);
        s.delete_current_task(CoreId::App).unwrap();
        assert_eq!(s.task_count, 0);
        assert!(s.find(Setup::NAME).is_none());
        assert_eq!(s.schedule(CoreId::App, 1), None);
    }

    #[test]
    fn test_task_table_full() {
        let mut s = Scheduler::new();
        for _ in 0..MAX_TASKS {
            s.create_task_pinned_to_core(TaskEntry::Low(TaskL::new(1)), cfg("t", 1, CoreId::App))
                .unwrap();
        }
        assert_eq!(
            s.create_task_pinned_to_core(TaskEntry::Low(TaskL::new(1)), cfg("t", 1, CoreId::App)),
            Err(KernelError::TaskTableFull)
        );
    }
}
