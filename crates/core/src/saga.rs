//! Ordered ledger of completed remote side effects and how to undo them.
//!
//! A multi-step write records a compensation after each step that succeeds.
//! If a later step fails, `compensate` runs the recorded undo actions newest
//! first and folds their outcome into the error returned to the caller.

use std::future::Future;
use std::pin::Pin;

use crate::errors::ApplicationError;

type Compensation<'a> = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>> + Send + 'a>;

struct Step<'a> {
    name: &'static str,
    undo: Compensation<'a>,
}

#[derive(Default)]
pub struct Saga<'a> {
    steps: Vec<Step<'a>>,
}

/// Result of running the compensations of a failed saga.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompensationReport {
    pub compensated: Vec<&'static str>,
    pub failures: Vec<String>,
}

impl CompensationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<'a> Saga<'a> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn record<F, Fut>(&mut self, step: &'static str, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<(), String>> + Send + 'a,
    {
        self.steps.push(Step {
            name: step,
            undo: Box::new(move || Box::pin(undo())),
        });
    }

    pub fn completed_steps(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name).collect()
    }

    /// Drops the recorded compensations once every step has succeeded.
    pub fn commit(self) -> Vec<&'static str> {
        self.completed_steps()
    }

    /// Runs every compensation newest first. A failing compensation does not
    /// stop the ones recorded before it.
    pub async fn rollback(self) -> CompensationReport {
        let mut report = CompensationReport { compensated: Vec::new(), failures: Vec::new() };
        for step in self.steps.into_iter().rev() {
            match (step.undo)().await {
                Ok(()) => report.compensated.push(step.name),
                Err(error) => report.failures.push(format!("{}: {error}", step.name)),
            }
        }
        report
    }

    /// Rolls back and returns the error to surface for `original`: the
    /// original itself when every compensation succeeded, otherwise a
    /// `CompensationFailed` carrying both.
    pub async fn compensate(self, original: ApplicationError) -> (ApplicationError, CompensationReport) {
        let report = self.rollback().await;
        if report.is_clean() {
            (original, report)
        } else {
            let compensation = report.failures.join("; ");
            (
                ApplicationError::CompensationFailed { original: Box::new(original), compensation },
                report,
            )
        }
    }
}
