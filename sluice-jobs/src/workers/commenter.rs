use async_trait::async_trait;
use serde_json::json;
use sluice_core::domain::job::ParamType;

use crate::worker::{ParamSpec, Worker, WorkerContext, WorkerError, WorkerSpec};

/// Does nothing but log its comment
pub struct Commenter;

impl Commenter {
    pub fn spec() -> WorkerSpec {
        WorkerSpec::new(
            "Commenter",
            "Logs a comment and succeeds",
            || -> Box<dyn Worker> { Box::new(Commenter) },
        )
        .param(ParamSpec::optional(
            "comment",
            ParamType::Text,
            Some(json!("")),
            "Comment",
        ))
    }
}

#[async_trait]
impl Worker for Commenter {
    async fn execute(&self, ctx: &mut WorkerContext) -> Result<(), WorkerError> {
        let comment = ctx.str_param("comment").unwrap_or_default().to_string();
        if !comment.is_empty() {
            ctx.log_info(comment);
        }
        Ok(())
    }
}
