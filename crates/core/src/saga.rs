//! Two-write protocol for creating a sync job and queueing it.
//!
//! The job row and the queue item live in different stores, so there is no
//! shared transaction. [`EnqueueSaga`] records which writes have happened so
//! the orchestrator knows exactly what to compensate.
//!
//! ```text
//! Created --enqueued--> Queued --commit--> Committed
//!    |
//!    +--compensate--> RolledBack
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::DbId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    /// Job row written, nothing queued yet.
    Created,
    /// Queue item written, job not yet marked queued.
    Queued,
    Committed,
    /// Job row removed after a failed enqueue.
    RolledBack,
}

impl SagaState {
    pub fn is_final(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

#[derive(Debug, Clone)]
pub struct EnqueueSaga {
    job_id: DbId,
    state: SagaState,
}

impl EnqueueSaga {
    /// Start tracking a saga for a freshly inserted job row.
    pub fn created(job_id: DbId) -> Self {
        Self {
            job_id,
            state: SagaState::Created,
        }
    }

    pub fn job_id(&self) -> DbId {
        self.job_id
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// The queue write succeeded.
    pub fn enqueued(&mut self) -> CoreResult<()> {
        self.advance(SagaState::Created, SagaState::Queued)
    }

    /// The queue item is durable; the saga is done.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.advance(SagaState::Queued, SagaState::Committed)
    }

    /// Whether a failure now requires deleting the job row.
    pub fn needs_compensation(&self) -> bool {
        self.state == SagaState::Created
    }

    /// The job row was deleted after an enqueue failure.
    pub fn compensated(&mut self) -> CoreResult<()> {
        self.advance(SagaState::Created, SagaState::RolledBack)
    }

    fn advance(&mut self, expected: SagaState, next: SagaState) -> CoreResult<()> {
        if self.state != expected {
            return Err(CoreError::Internal(format!(
                "Enqueue saga for job {} cannot move from {:?} to {next:?}",
                self.job_id, self.state
            )));
        }
        self.state = next;
        Ok(())
    }
}
