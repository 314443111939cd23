//! Task status aggregation.

use serde::{Deserialize, Serialize};

/// Workflow states a task moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not started.
    Todo,
    /// In progress.
    Doing,
    /// Awaiting review.
    Review,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// All statuses in workflow order.
    pub const ALL: [Self; 4] = [Self::Todo, Self::Doing, Self::Review, Self::Done];

    /// Returns the status as stored in the `status` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Doing => "doing",
            Self::Review => "review",
            Self::Done => "done",
        }
    }

    /// Parses a status string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "todo" => Some(Self::Todo),
            "doing" => Some(Self::Doing),
            "review" => Some(Self::Review),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Per-status counts of non-archived tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusCounts {
    /// Tasks in `todo`.
    pub todo: u64,
    /// Tasks in `doing`.
    pub doing: u64,
    /// Tasks in `review`.
    pub review: u64,
    /// Tasks in `done`.
    pub done: u64,
    /// Tasks whose status is not one of the above.
    pub other: u64,
}

impl TaskStatusCounts {
    /// Adds one task with the given status.
    pub fn record(&mut self, status: Option<&str>) {
        match status.and_then(TaskStatus::parse) {
            Some(TaskStatus::Todo) => self.todo += 1,
            Some(TaskStatus::Doing) => self.doing += 1,
            Some(TaskStatus::Review) => self.review += 1,
            Some(TaskStatus::Done) => self.done += 1,
            None => self.other += 1,
        }
    }

    /// Total number of counted tasks.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.todo + self.doing + self.review + self.done + self.other
    }
}
