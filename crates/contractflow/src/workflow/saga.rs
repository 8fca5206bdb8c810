//! Compensating-action log for operations that write more than one record.
//!
//! Each completed write registers an undo closure. When a later step fails
//! the undos run newest first. If all of them succeed the caller gets the
//! original error back; otherwise it gets [`WorkflowError::PartialUpdate`].

use tracing::{debug, info, warn};

use super::error::WorkflowError;

type Undo<'a> = Box<dyn FnOnce() -> Result<(), WorkflowError> + 'a>;

struct Completed<'a> {
    step: String,
    undo: Undo<'a>,
}

pub(crate) struct Saga<'a> {
    operation: &'static str,
    completed: Vec<Completed<'a>>,
}

impl<'a> Saga<'a> {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self {
            operation,
            completed: Vec::new(),
        }
    }

    /// Runs one step. On failure every registered undo is executed before
    /// the error is returned.
    pub(crate) fn run<T>(
        &mut self,
        step: &str,
        action: impl FnOnce() -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        match action() {
            Ok(value) => {
                debug!(operation = self.operation, step, "Saga step completed");
                Ok(value)
            }
            Err(e) => Err(self.unwind(step, e)),
        }
    }

    /// Registers the undo for a step that has just completed.
    pub(crate) fn on_undo(
        &mut self,
        step: &str,
        undo: impl FnOnce() -> Result<(), WorkflowError> + 'a,
    ) {
        self.completed.push(Completed {
            step: step.to_string(),
            undo: Box::new(undo),
        });
    }

    fn unwind(&mut self, failed_step: &str, cause: WorkflowError) -> WorkflowError {
        let completed: Vec<String> = self.completed.iter().map(|c| c.step.clone()).collect();
        if completed.is_empty() {
            return cause;
        }

        warn!(
            operation = self.operation,
            failed_step,
            error = %cause,
            "Saga step failed, compensating"
        );

        let mut unreverted = Vec::new();
        while let Some(c) = self.completed.pop() {
            match (c.undo)() {
                Ok(()) => info!(operation = self.operation, step = %c.step, "Compensated"),
                Err(e) => {
                    warn!(
                        operation = self.operation,
                        step = %c.step,
                        error = %e,
                        "Compensation failed"
                    );
                    unreverted.push(c.step);
                }
            }
        }

        if unreverted.is_empty() {
            cause
        } else {
            WorkflowError::PartialUpdate {
                operation: self.operation,
                completed,
                failed_step: failed_step.to_string(),
                unreverted,
                source: Box::new(cause),
            }
        }
    }
}
