//! A small end-to-end demo wiring the scheduler to a toy step registry.
//!
//! Not a deliverable step library — spec.md's Non-goals exclude a built-in
//! step catalogue (`SPEC_FULL.md`). These three steps exist only to push
//! tasks through the pipeline in a way a human can watch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use shared::steps::{Step, StepEvaluator, StepOutcome, StepParams, StepRegistry};
use shared::task::{PipelineJob, Task};
use shared::value::{Timestamp, TimedValue, Value};
use tracing::info;

use preproc::{Manager, WorkerPoolConfig};

#[derive(Parser, Debug)]
#[command(about = "Run a handful of demo tasks through the preprocessing scheduler")]
struct Args {
    /// Number of worker threads.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Value cache capacity.
    #[arg(long, default_value_t = 64)]
    cache_capacity: usize,
}

struct Uppercase;
impl StepEvaluator for Uppercase {
    fn evaluate(&self, input: &TimedValue, _params: &StepParams) -> StepOutcome {
        match &input.value {
            Value::Text(text) => StepOutcome::Next(TimedValue::new(
                Value::Text(text.to_uppercase()),
                input.timestamp,
            )),
            other => StepOutcome::Error(format!("uppercase: expected text, got {other:?}")),
        }
    }
}

struct Multiply;
impl StepEvaluator for Multiply {
    fn evaluate(&self, input: &TimedValue, params: &StepParams) -> StepOutcome {
        let factor: f64 = params
            .get("factor")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(1.0);
        match input.value {
            Value::Numeric(n) => {
                StepOutcome::Next(TimedValue::new(Value::Numeric(n * factor), input.timestamp))
            }
            ref other => StepOutcome::Error(format!("multiply: expected numeric, got {other:?}")),
        }
    }
}

struct DiscardIfEqual;
impl StepEvaluator for DiscardIfEqual {
    fn evaluate(&self, input: &TimedValue, params: &StepParams) -> StepOutcome {
        let threshold: f64 = params
            .get("value")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(f64::NAN);
        match input.value {
            Value::Numeric(n) if n == threshold => StepOutcome::Discard,
            _ => StepOutcome::Next(input.clone()),
        }
    }
}

struct DemoRegistry(HashMap<String, Box<dyn StepEvaluator>>);

impl StepRegistry for DemoRegistry {
    fn lookup(&self, kind: &str) -> Option<&dyn StepEvaluator> {
        self.0.get(kind).map(|evaluator| evaluator.as_ref())
    }
}

fn demo_registry() -> Arc<dyn StepRegistry> {
    let mut evaluators: HashMap<String, Box<dyn StepEvaluator>> = HashMap::new();
    evaluators.insert("uppercase".to_string(), Box::new(Uppercase));
    evaluators.insert("multiply".to_string(), Box::new(Multiply));
    evaluators.insert("discard_if_equal".to_string(), Box::new(DiscardIfEqual));
    Arc::new(DemoRegistry(evaluators))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let config = WorkerPoolConfig {
        worker_count: args.workers,
        cache_capacity: args.cache_capacity,
        queue_wait_timeout_ms: 100,
    };

    let manager = Manager::start(&config, demo_registry())?;

    let shout = PipelineJob::new(
        vec![Step::new("uppercase", StepParams::new())],
        TimedValue::new(Value::Text("hello scheduler".to_string()), Timestamp::now()),
    );
    manager.enqueue(Task::value(1, shout, Some(manager.cache())));

    let mut double_params = StepParams::new();
    double_params.insert("factor".to_string(), "2".to_string());
    let double = PipelineJob::new(
        vec![Step::new("multiply", double_params)],
        TimedValue::new(Value::Numeric(21.0), Timestamp::now()),
    );
    manager.enqueue(Task::value(2, double, Some(manager.cache())));

    let mut skip_params = StepParams::new();
    skip_params.insert("value".to_string(), "0".to_string());
    for item_id in 10..13u64 {
        let reading = PipelineJob::new(
            vec![Step::new("discard_if_equal", skip_params.clone())],
            TimedValue::new(Value::Numeric((item_id % 2) as f64), Timestamp::now()),
        );
        manager.enqueue(Task::value_seq(item_id, reading, None));
    }

    let dependent_job = Arc::new(PipelineJob::new(vec![], TimedValue::new(Value::None, Timestamp::now())));
    manager.enqueue(Task::dependent(1, Arc::clone(&dependent_job), Some(manager.cache())));

    let mut drained = Vec::new();
    while drained.len() < 6 {
        drained.extend(manager.fetch_finished());
        if drained.len() < 6 {
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    for task in &drained {
        info!(item_id = task.item_id, tag = task.tag(), result = ?task.result, "task finished");
    }

    manager.shutdown();
    Ok(())
}
