//! Undo actions for completed saga steps.

use std::future::Future;
use std::pin::Pin;

use metrics::counter;
use tracing::{info, warn};

use crate::error::{RollbackFailure, SagaError, ServiceError};

type Undo<'a> = Pin<Box<dyn Future<Output = Result<(), ServiceError>> + Send + 'a>>;

/// Stack of compensating actions, one per completed forward step.
///
/// Actions are not started when pushed; [`rollback`](Self::rollback) runs
/// them last-in first-out and keeps going past failures.
#[derive(Default)]
pub struct Compensations<'a> {
    stack: Vec<(&'static str, Undo<'a>)>,
}

impl<'a> Compensations<'a> {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Registers the action that undoes `step`.
    pub fn push<F>(&mut self, step: &'static str, undo: F)
    where
        F: Future<Output = Result<(), ServiceError>> + Send + 'a,
    {
        self.stack.push((step, Box::pin(undo)));
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs every action in reverse registration order and returns the ones
    /// that failed.
    pub async fn run(self) -> Vec<RollbackFailure> {
        let mut failures = Vec::new();

        for (step, undo) in self.stack.into_iter().rev() {
            counter!("saga_compensations_total", "step" => step).increment(1);
            match undo.await {
                Ok(()) => info!(step, "compensation completed"),
                Err(error) => {
                    warn!(step, error = %error, "compensation failed");
                    failures.push(RollbackFailure { step, error });
                }
            }
        }

        failures
    }

    /// Compensates every completed step and combines the outcome with the
    /// error that triggered the rollback.
    ///
    /// With nothing to compensate the cause is returned unchanged.
    pub async fn rollback(self, cause: SagaError) -> SagaError {
        if self.is_empty() {
            return cause;
        }

        warn!(error = %cause, steps = self.len(), "compensating saga");
        let failures = self.run().await;

        SagaError::RolledBack {
            cause: Box::new(cause),
            failures,
        }
    }
}
