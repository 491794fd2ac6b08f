//! Priority task queue.
//!
//! Three bands, dispatched high → normal → low. Inside a band tasks leave in
//! the order they entered; a requeued task goes to the back of its band.

use std::collections::VecDeque;

use crate::domain::{Task, TaskPriority, TaskState};

/// Banded FIFO queue of tasks awaiting dispatch.
#[derive(Debug, Default)]
pub struct TaskQueue {
    bands: [VecDeque<Task>; 3],
}

const fn band(priority: TaskPriority) -> usize {
    match priority {
        TaskPriority::High => 0,
        TaskPriority::Normal => 1,
        TaskPriority::Low => 2,
    }
}

impl TaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the back of its band.
    pub fn push(&mut self, mut task: Task) {
        task.state = TaskState::Queued;
        self.bands[band(task.priority)].push_back(task);
    }

    /// Return a task to the front of its band without consuming a retry.
    pub fn push_front(&mut self, mut task: Task) {
        task.state = TaskState::Queued;
        self.bands[band(task.priority)].push_front(task);
    }

    /// Remove the next task to dispatch.
    pub fn pop(&mut self) -> Option<Task> {
        self.bands.iter_mut().find_map(VecDeque::pop_front)
    }

    /// Total queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bands.iter().map(VecDeque::len).sum()
    }

    /// Check if no task is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bands.iter().all(VecDeque::is_empty)
    }

    /// Queued tasks in one band.
    #[must_use]
    pub fn len_of(&self, priority: TaskPriority) -> usize {
        self.bands[band(priority)].len()
    }

    /// Remove every queued task in dispatch order.
    pub fn drain(&mut self) -> Vec<Task> {
        let mut drained = Vec::with_capacity(self.len());
        for band in &mut self.bands {
            drained.extend(band.drain(..));
        }
        drained
    }
}
