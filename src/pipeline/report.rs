use std::fmt;

use crate::logging::LogContext;

/// What happened to one unit of batched upstream work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Completed,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    /// Identifies the unit, e.g. `block 1234` or `lane 2 page 3`
    pub unit: String,
    pub outcome: UnitOutcome,
}

/// Outcomes of every unit in a batch, in the order they were recorded.
///
/// Failures recorded here never abort the batch; the caller decides what
/// a batch with failures means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    operation: String,
    units: Vec<UnitReport>,
}

impl BatchReport {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            units: Vec::new(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn completed(&mut self, unit: impl Into<String>) {
        self.push(unit, UnitOutcome::Completed);
    }

    pub fn skipped(&mut self, unit: impl Into<String>, reason: impl Into<String>) {
        self.push(unit, UnitOutcome::Skipped(reason.into()));
    }

    pub fn failed(&mut self, unit: impl Into<String>, reason: impl fmt::Display) {
        self.push(unit, UnitOutcome::Failed(reason.to_string()));
    }

    pub fn record<T, E: fmt::Display>(&mut self, unit: impl Into<String>, result: &Result<T, E>) {
        match result {
            Ok(_) => self.completed(unit),
            Err(e) => self.failed(unit, e),
        }
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.units.extend(other.units);
    }

    pub fn units(&self) -> &[UnitReport] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Completed))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Skipped(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Failed(_)))
    }

    /// True when at least one unit was attempted and every attempt failed
    pub fn all_failed(&self) -> bool {
        let failed = self.failed_count();
        failed > 0 && failed == self.len() - self.skipped_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.units.iter().filter_map(|u| match &u.outcome {
            UnitOutcome::Failed(reason) => Some((u.unit.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn log_summary(&self, context: LogContext) {
        let context = context
            .with_count("completed", self.completed_count())
            .with_count("skipped", self.skipped_count())
            .with_count("failed", self.failed_count());

        let message = format!(
            "{}: {} completed, {} skipped, {} failed",
            self.operation,
            self.completed_count(),
            self.skipped_count(),
            self.failed_count()
        );
        if self.failed_count() > 0 {
            context.warn(&message);
        } else {
            context.debug(&message);
        }
    }

    fn push(&mut self, unit: impl Into<String>, outcome: UnitOutcome) {
        self.units.push(UnitReport {
            unit: unit.into(),
            outcome,
        });
    }

    fn count(&self, predicate: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|u| predicate(&u.outcome)).count()
    }
}
