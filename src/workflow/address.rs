//! The `GetAddressFromIP` workflow.

use async_trait::async_trait;
use serde_json::Value;

use crate::lookup::{GetInternetServiceProvider, GetIp, GetLocationInfo, Lookup};
use crate::workflow::pipeline::{Pipeline, StepOutputs};
use crate::workflow::{Workflow, WorkflowContext, WorkflowError};

const STEP_IP: &str = "ip";
const STEP_LOCATION: &str = "location";
const STEP_ISP: &str = "isp";

/// Greets `name` with the caller's IP, ISP and location.
#[derive(Debug)]
pub struct GetAddressFromIp {
    pipeline: Pipeline,
}

impl GetAddressFromIp {
    pub const NAME: &'static str = "GetAddressFromIP";

    pub fn new(lookup: Lookup) -> Self {
        let pipeline = Pipeline::new(Self::NAME)
            .then(STEP_IP, GetIp::new(lookup.clone()))
            .then(STEP_LOCATION, GetLocationInfo::new(lookup.clone()))
            .then_from(STEP_ISP, STEP_IP, GetInternetServiceProvider::new(lookup));
        Self { pipeline }
    }
}

#[async_trait]
impl Workflow for GetAddressFromIp {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, WorkflowError> {
        let name: String = serde_json::from_value(input)
            .map_err(|e| WorkflowError::InvalidInput(format!("expected a name: {e}")))?;

        tracing::info!(workflow_id = %ctx.workflow_id(), name = %name, "Resolving address");

        let outputs = self
            .pipeline
            .run(ctx.executor(), Value::Null, ctx.cancellation())
            .await?;

        let ip = output(&outputs, STEP_IP)?;
        let location = output(&outputs, STEP_LOCATION)?;
        let isp = output(&outputs, STEP_ISP)?;

        Ok(Value::String(format!(
            "Hello, {name}. Your IP is {ip} ({isp}) and your location is {location}"
        )))
    }
}

fn output(outputs: &StepOutputs, step: &str) -> Result<String, WorkflowError> {
    match outputs.get::<String>(step) {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(WorkflowError::Output {
            step: step.to_string(),
            reason: e.to_string(),
        }),
        None => Err(WorkflowError::Output {
            step: step.to_string(),
            reason: "step did not run".to_string(),
        }),
    }
}
