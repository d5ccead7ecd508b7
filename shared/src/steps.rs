//! The pluggable step contract.
//!
//! spec.md treats the concrete preprocessing steps (JSON path, regex,
//! arithmetic, throttling, ...) as out of scope (§1) and describes the
//! contract abstractly (§4.2, §9): "each step kind is a function of
//! `(value, timestamp, params) -> (value, timestamp) | Discard | Error`,
//! with no side effects outside the returned value and error." This module
//! is exactly that contract, with no concrete step kinds.

use std::collections::BTreeMap;

use crate::value::TimedValue;

/// Opaque, string-keyed parameters for a step instance. The concrete shape
/// of a step's parameters is owned by whichever step kind interprets them;
/// the scheduler never inspects this map itself.
pub type StepParams = BTreeMap<String, String>;

/// One entry in a task's preprocessing pipeline: a step kind name (dispatched
/// through the registry, §4.2) plus that step's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: String,
    pub params: StepParams,
}

impl Step {
    pub fn new(kind: impl Into<String>, params: StepParams) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }
}

/// What a single step produces, per spec.md §4.2: a new `(value, timestamp)`,
/// a discard marker that ends the pipeline with a no-value result, or an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Next(TimedValue),
    Discard,
    Error(String),
}

/// A single pluggable preprocessing step evaluator.
///
/// Implementations must be side-effect free beyond the returned value and
/// error, per spec.md §9's closing note, and must not block — step execution
/// is CPU-bound per spec.md §5 and must never touch the queue's lock.
pub trait StepEvaluator: Send + Sync {
    /// Evaluate this step kind against the current `(value, timestamp)`.
    fn evaluate(&self, input: &TimedValue, params: &StepParams) -> StepOutcome;
}

/// A registry of step evaluators keyed by step kind name, per spec.md §4.2's
/// "pluggable registry of step evaluators". The scheduler core dispatches
/// through this trait and never hard-codes a step kind.
pub trait StepRegistry: Send + Sync {
    fn lookup(&self, kind: &str) -> Option<&dyn StepEvaluator>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Uppercase;
    impl StepEvaluator for Uppercase {
        fn evaluate(&self, input: &TimedValue, _params: &StepParams) -> StepOutcome {
            match &input.value {
                crate::value::Value::Text(s) => StepOutcome::Next(TimedValue::new(
                    crate::value::Value::Text(s.to_uppercase()),
                    input.timestamp,
                )),
                _ => StepOutcome::Error("uppercase requires text input".to_string()),
            }
        }
    }

    #[test]
    fn step_evaluator_transforms_text() {
        let step = Uppercase;
        let input = TimedValue::new(
            crate::value::Value::Text("abc".to_string()),
            crate::value::Timestamp(1),
        );
        match step.evaluate(&input, &StepParams::new()) {
            StepOutcome::Next(out) => {
                assert_eq!(out.value, crate::value::Value::Text("ABC".to_string()))
            }
            other => panic!("expected Next, got {other:?}"),
        }
    }

    #[test]
    fn step_evaluator_errors_on_wrong_type() {
        let step = Uppercase;
        let input = TimedValue::new(crate::value::Value::Numeric(1.0), crate::value::Timestamp(1));
        assert!(matches!(
            step.evaluate(&input, &StepParams::new()),
            StepOutcome::Error(_)
        ));
    }
}
