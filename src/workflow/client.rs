//! Workflow submission.
//!
//! # Responsibilities
//! - Submit a workflow by name and wait for its result (`WorkflowClient`)
//! - Run registered workflows in process (`LocalWorkflowClient`)
//! - Bound each execution by the configured execution timeout
//!
//! # Design Decisions
//! - Each execution gets a child token of the client's root token, so a
//!   shutdown cancels every in-flight workflow
//! - Metric scopes carry the platform dimensions: namespace, task queue and
//!   workflow type

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::activity::ActivityExecutor;
use crate::config::WorkflowConfig;
use crate::resilience::timeouts::with_deadline;
use crate::workflow::{Workflow, WorkflowContext, WorkflowError};

/// Build a workflow id of the form `<prefix>-<uuid v4>`.
pub fn workflow_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartWorkflowOptions {
    pub id: String,
    pub task_queue: String,
}

impl StartWorkflowOptions {
    pub fn new(id: impl Into<String>, task_queue: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_queue: task_queue.into(),
        }
    }
}

/// Submits workflows to an execution substrate.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Start `workflow` with `input` and wait for its result.
    async fn execute_workflow(
        &self,
        options: StartWorkflowOptions,
        workflow: &str,
        input: Value,
    ) -> Result<Value, WorkflowError>;

    /// Task queue submissions should target.
    fn task_queue(&self) -> &str;
}

/// In-process stand-in for the durable workflow service.
pub struct LocalWorkflowClient {
    workflows: HashMap<&'static str, Arc<dyn Workflow>>,
    executor: ActivityExecutor,
    namespace: String,
    task_queue: String,
    execution_timeout: Option<Duration>,
    root: CancellationToken,
}

impl LocalWorkflowClient {
    pub fn new(config: &WorkflowConfig, executor: ActivityExecutor, root: CancellationToken) -> Self {
        let execution_timeout = match config.execution_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            workflows: HashMap::new(),
            executor,
            namespace: config.namespace.clone(),
            task_queue: config.task_queue.clone(),
            execution_timeout,
            root,
        }
    }

    /// Register a workflow under its name. A later registration replaces an earlier one.
    pub fn register(mut self, workflow: impl Workflow + 'static) -> Self {
        let name = workflow.name();
        tracing::debug!(workflow_type = name, task_queue = %self.task_queue, "Workflow registered");
        self.workflows.insert(name, Arc::new(workflow));
        self
    }

    pub fn registered(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.workflows.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl WorkflowClient for LocalWorkflowClient {
    async fn execute_workflow(
        &self,
        options: StartWorkflowOptions,
        workflow: &str,
        input: Value,
    ) -> Result<Value, WorkflowError> {
        if options.task_queue != self.task_queue {
            return Err(WorkflowError::UnknownTaskQueue(options.task_queue));
        }
        let definition = self
            .workflows
            .get(workflow)
            .cloned()
            .ok_or_else(|| WorkflowError::NotRegistered(workflow.to_string()))?;
        if self.root.is_cancelled() {
            return Err(WorkflowError::Cancelled(options.id));
        }

        let scope = self
            .executor
            .scope()
            .with_tag("namespace", self.namespace.as_str())
            .with_tag("task_queue", self.task_queue.as_str())
            .with_tag("workflow_type", definition.name());
        let cancel = self.root.child_token();
        let ctx = WorkflowContext::new(options.id.clone(), self.executor.with_scope(scope), cancel.clone());

        tracing::info!(workflow_id = %options.id, workflow_type = definition.name(), "Workflow started");

        let result = with_deadline(self.execution_timeout, definition.run(&ctx, input)).await;
        // Stops anything the workflow left behind.
        cancel.cancel();

        match result {
            Ok(Ok(value)) => {
                tracing::info!(workflow_id = %options.id, "Workflow completed");
                Ok(value)
            }
            Ok(Err(err)) => {
                tracing::warn!(workflow_id = %options.id, error = %err, "Workflow failed");
                Err(err)
            }
            Err(deadline) => {
                tracing::warn!(workflow_id = %options.id, timeout = ?deadline.0, "Workflow timed out");
                Err(WorkflowError::TimedOut {
                    workflow_id: options.id,
                    timeout: deadline.0,
                })
            }
        }
    }

    fn task_queue(&self) -> &str {
        &self.task_queue
    }
}

impl std::fmt::Debug for LocalWorkflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWorkflowClient")
            .field("workflows", &self.registered())
            .field("namespace", &self.namespace)
            .field("task_queue", &self.task_queue)
            .field("execution_timeout", &self.execution_timeout)
            .finish_non_exhaustive()
    }
}
