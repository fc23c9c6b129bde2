use async_trait::async_trait;
use serde_json::json;
use sluice_core::domain::job::ParamType;

use crate::worker::{ParamSpec, Worker, WorkerContext, WorkerError, WorkerSpec};

/// Manual gate: fails unless the confirmation box is checked
pub struct Checkpoint;

impl Checkpoint {
    pub fn spec() -> WorkerSpec {
        WorkerSpec::new(
            "Checkpoint",
            "Fails unless the confirmation parameter is set",
            || -> Box<dyn Worker> { Box::new(Checkpoint) },
        )
        .param(ParamSpec::optional(
            "checkbox",
            ParamType::Boolean,
            Some(json!(false)),
            "Check to continue the pipeline",
        ))
    }
}

#[async_trait]
impl Worker for Checkpoint {
    async fn execute(&self, ctx: &mut WorkerContext) -> Result<(), WorkerError> {
        if ctx.bool_param("checkbox")? {
            ctx.log_info("Checkpoint confirmed");
            Ok(())
        } else {
            Err(WorkerError::failure("Checkpoint is not confirmed"))
        }
    }
}
