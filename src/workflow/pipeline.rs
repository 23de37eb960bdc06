//! Sequential orchestration of activities.
//!
//! A `Pipeline` is an ordered list of named steps. Payloads travel between
//! steps as JSON values, the way a workflow platform serializes them. Each
//! step reads either the previous step's output or a named earlier one.
//! The first exhausted step halts the run; later steps never start.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::activity::{Activity, ActivityError, ActivityExecutor, ExecutionError, Exhaustion};

/// Name under which the pipeline's initial input can be selected.
pub const INITIAL_INPUT: &str = "input";

/// A step that exhausted its activity, annotated with its position.
#[derive(Debug, Clone, Error)]
#[error("step {index} ({step}) failed: {source}")]
pub struct StepError {
    pub step: String,
    pub index: usize,
    pub source: ExecutionError,
}

/// Where a step takes its input from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    /// Output of the step right before this one, or the initial input.
    Previous,
    /// Output of a named earlier step, or `INITIAL_INPUT`.
    Named(String),
}

/// Outputs of a completed run, by step name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutputs {
    initial: Value,
    steps: Vec<(String, Value)>,
}

impl StepOutputs {
    fn new(initial: Value) -> Self {
        Self {
            initial,
            steps: Vec::new(),
        }
    }

    /// Raw output of `name`, or the initial input for `INITIAL_INPUT`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        if name == INITIAL_INPUT {
            return Some(&self.initial);
        }
        self.steps.iter().find(|(step, _)| step == name).map(|(_, v)| v)
    }

    /// Output of `name` decoded as `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<Result<T, serde_json::Error>> {
        self.value(name).map(|v| T::deserialize(v))
    }

    /// Output of the last step, or the initial input if no step ran.
    pub fn last(&self) -> &Value {
        self.steps.last().map(|(_, v)| v).unwrap_or(&self.initial)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|(name, _)| name.as_str())
    }

    fn select(&self, input: &StepInput) -> Option<Value> {
        match input {
            StepInput::Previous => Some(self.last().clone()),
            StepInput::Named(name) => self.value(name).cloned(),
        }
    }
}

#[async_trait]
trait ErasedStep: Send + Sync {
    fn activity(&self) -> &'static str;

    async fn run(
        &self,
        executor: &ActivityExecutor,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ExecutionError>;
}

struct ActivityStep<A> {
    activity: A,
}

#[async_trait]
impl<A> ErasedStep for ActivityStep<A>
where
    A: Activity + 'static,
    A::Input: DeserializeOwned,
    A::Output: Serialize,
{
    fn activity(&self) -> &'static str {
        self.activity.name()
    }

    async fn run(
        &self,
        executor: &ActivityExecutor,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ExecutionError> {
        let input: A::Input = serde_json::from_value(input)
            .map_err(|e| payload_error(self.activity.name(), 0, format!("cannot decode input: {e}")))?;

        let completed = executor.execute_detailed(&self.activity, &input, cancel).await?;

        serde_json::to_value(completed.output).map_err(|e| ExecutionError {
            elapsed: completed.elapsed,
            ..payload_error(self.activity.name(), completed.attempts, format!("cannot encode output: {e}"))
        })
    }
}

fn payload_error(activity: &str, attempts: u32, reason: String) -> ExecutionError {
    ExecutionError {
        activity: activity.to_string(),
        attempts,
        elapsed: Duration::ZERO,
        reason: Exhaustion::NonRetryable,
        source: ActivityError::fatal(reason),
    }
}

struct Step {
    name: String,
    input: StepInput,
    runner: Box<dyn ErasedStep>,
}

/// An ordered chain of activities.
pub struct Pipeline {
    name: String,
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step fed by the previous step's output.
    pub fn then<A>(self, step: impl Into<String>, activity: A) -> Self
    where
        A: Activity + 'static,
        A::Input: DeserializeOwned,
        A::Output: Serialize,
    {
        self.push(step.into(), StepInput::Previous, activity)
    }

    /// Append a step fed by the output of the earlier step `source`.
    pub fn then_from<A>(self, step: impl Into<String>, source: impl Into<String>, activity: A) -> Self
    where
        A: Activity + 'static,
        A::Input: DeserializeOwned,
        A::Output: Serialize,
    {
        self.push(step.into(), StepInput::Named(source.into()), activity)
    }

    fn push<A>(mut self, name: String, input: StepInput, activity: A) -> Self
    where
        A: Activity + 'static,
        A::Input: DeserializeOwned,
        A::Output: Serialize,
    {
        self.steps.push(Step {
            name,
            input,
            runner: Box::new(ActivityStep { activity }),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every step in order, stopping at the first failure.
    pub async fn run(
        &self,
        executor: &ActivityExecutor,
        initial: Value,
        cancel: &CancellationToken,
    ) -> Result<StepOutputs, StepError> {
        let mut outputs = StepOutputs::new(initial);

        for (index, step) in self.steps.iter().enumerate() {
            let input = outputs.select(&step.input).ok_or_else(|| StepError {
                step: step.name.clone(),
                index,
                source: payload_error(
                    step.runner.activity(),
                    0,
                    format!("no earlier output named {:?}", step_source(&step.input)),
                ),
            })?;

            tracing::debug!(pipeline = %self.name, step = %step.name, index, "Running step");

            let output = step
                .runner
                .run(executor, input, cancel)
                .await
                .map_err(|source| {
                    tracing::warn!(
                        pipeline = %self.name,
                        step = %step.name,
                        index,
                        error = %source,
                        "Step failed, halting pipeline"
                    );
                    StepError {
                        step: step.name.clone(),
                        index,
                        source,
                    }
                })?;

            outputs.steps.push((step.name.clone(), output));
        }

        Ok(outputs)
    }
}

fn step_source(input: &StepInput) -> &str {
    match input {
        StepInput::Previous => "<previous>",
        StepInput::Named(name) => name,
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}
