use std::fmt;

/// Where a single delivery is in its processing
///
/// `Received -> Fetching -> Converting -> Publishing -> {Published, Failed}`.
/// `Released` and `Discarded` end the delivery without a published result:
/// released deliveries come back from the broker, discarded ones never will.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Received,
    Fetching,
    Converting,
    Publishing,
    /// A `Succeeded` result was published and the task acked
    Published,
    /// A `Failed` result was published and the task acked
    Failed,
    /// Nacked after a transient failure
    Released,
    /// Undecodable payload, acked without a result
    Discarded,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Received => "received",
            TaskState::Fetching => "fetching",
            TaskState::Converting => "converting",
            TaskState::Publishing => "publishing",
            TaskState::Published => "published",
            TaskState::Failed => "failed",
            TaskState::Released => "released",
            TaskState::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// Final states of the deliveries handled by one `run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub published: usize,
    pub failed: usize,
    pub released: usize,
    pub discarded: usize,
}

impl RunSummary {
    pub fn record(&mut self, state: TaskState) {
        match state {
            TaskState::Published => self.published += 1,
            TaskState::Failed => self.failed += 1,
            TaskState::Released => self.released += 1,
            TaskState::Discarded => self.discarded += 1,
            other => tracing::warn!(state = %other, "Delivery finished in a non-terminal state"),
        }
    }

    pub fn total(&self) -> usize {
        self.published + self.failed + self.released + self.discarded
    }
}
