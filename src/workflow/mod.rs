//! Workflow subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → client.rs WorkflowClient::execute_workflow(options, name, input)
//!     → registry lookup by name, WorkflowContext (id, executor, cancel token)
//!     → address.rs GetAddressFromIp
//!     → pipeline.rs (GetIP → GetLocationInfo → GetInternetServiceProvider)
//!     → greeting string
//! ```
//!
//! # Design Decisions
//! - The durable substrate is an external dependency behind `WorkflowClient`
//! - `LocalWorkflowClient` runs workflows in process with no persistence
//! - Every execution gets a child of the root cancellation token

pub mod address;
pub mod client;
pub mod pipeline;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::activity::ActivityExecutor;

pub use address::GetAddressFromIp;
pub use client::{workflow_id, LocalWorkflowClient, StartWorkflowOptions, WorkflowClient};
pub use pipeline::{Pipeline, StepError, StepInput, StepOutputs};

#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error("workflow type {0} is not registered")]
    NotRegistered(String),

    #[error("no worker polls task queue {0}")]
    UnknownTaskQueue(String),

    #[error("invalid workflow input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("missing or malformed output of step {step}: {reason}")]
    Output { step: String, reason: String },

    #[error("workflow {workflow_id} timed out after {timeout:?}")]
    TimedOut { workflow_id: String, timeout: Duration },

    #[error("workflow {0} cancelled")]
    Cancelled(String),
}

/// A named orchestration of activities.
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Workflow type used for registration and the `workflow_type` tag.
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, WorkflowError>;
}

/// Per-execution context handed to `Workflow::run`.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    workflow_id: String,
    executor: ActivityExecutor,
    cancel: CancellationToken,
}

impl WorkflowContext {
    pub fn new(workflow_id: impl Into<String>, executor: ActivityExecutor, cancel: CancellationToken) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            executor,
            cancel,
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn executor(&self) -> &ActivityExecutor {
        &self.executor
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
