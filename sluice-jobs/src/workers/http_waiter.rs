use async_trait::async_trait;
use serde_json::{Value, json};
use sluice_core::domain::job::ParamType;

use crate::worker::{ParamSpec, Worker, WorkerContext, WorkerError, WorkerSpec};

pub const POLL_COUNT: &str = "poll_count";

/// Waits for a URL to answer with the expected status
///
/// Each run polls once. Until the status matches, the worker enqueues
/// itself again with `poll_interval` delay, so no run ever blocks.
pub struct HttpWaiter;

impl HttpWaiter {
    pub fn spec() -> WorkerSpec {
        WorkerSpec::new(
            "HttpWaiter",
            "Polls a URL until it answers with the expected status",
            || -> Box<dyn Worker> { Box::new(HttpWaiter) },
        )
        .param(ParamSpec::required("url", ParamType::String, "URL"))
        .param(ParamSpec::optional(
            "expected_status",
            ParamType::Number,
            Some(json!(200)),
            "Expected status",
        ))
        .param(ParamSpec::optional(
            "poll_interval",
            ParamType::Number,
            Some(json!(60)),
            "Seconds between polls",
        ))
        .param(ParamSpec::optional(
            "max_polls",
            ParamType::Number,
            Some(json!(0)),
            "Maximum number of polls, 0 for no limit",
        ))
        .param(ParamSpec::optional(
            POLL_COUNT,
            ParamType::Number,
            Some(json!(0)),
            "Polls done so far",
        ))
    }
}

/// Whether another poll is allowed after `polls_done` polls
pub fn may_poll_again(polls_done: u64, max_polls: u64) -> bool {
    max_polls == 0 || polls_done < max_polls
}

#[async_trait]
impl Worker for HttpWaiter {
    async fn execute(&self, ctx: &mut WorkerContext) -> Result<(), WorkerError> {
        let url = ctx.str_param("url")?.to_string();
        let expected = ctx.u64_param("expected_status")?;
        let interval = ctx.u64_param("poll_interval")?;
        let max_polls = ctx.u64_param("max_polls")?;
        let polls_done = ctx.u64_param(POLL_COUNT)? + 1;

        match ctx.http().get(&url).send().await {
            Ok(response) if u64::from(response.status().as_u16()) == expected => {
                ctx.log_info(format!(
                    "{} answered {} after {} poll(s)",
                    url, expected, polls_done
                ));
                return Ok(());
            }
            Ok(response) => {
                ctx.log_debug(format!("{} answered {}", url, response.status()));
            }
            Err(e) => {
                ctx.log_warning(format!("Polling {} failed: {}", url, e));
            }
        }

        if !may_poll_again(polls_done, max_polls) {
            return Err(WorkerError::failure(format!(
                "{} did not answer {} after {} poll(s)",
                url, expected, polls_done
            )));
        }

        let mut params = ctx.params.clone();
        params.insert(POLL_COUNT.to_string(), Value::from(polls_done));
        ctx.enqueue("HttpWaiter", params, interval);
        ctx.log_info(format!("Polling {} again in {}s", url, interval));

        Ok(())
    }
}
