use std::{any::Any, panic::AssertUnwindSafe};

use fileforge_common::types::WorkItemResult;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::work::{WorkContext, WorkFunction};

/// Runs one work item inside a failure boundary. Never panics, never errors:
/// every outcome becomes a terminal [`WorkItemResult`].
pub async fn execute_item<W>(
    work: &W,
    ctx: &WorkContext,
    input: &W::Input,
    config: &W::Config,
) -> WorkItemResult
where
    W: WorkFunction,
{
    let identity = work.identity(ctx.index, input);

    match std::panic::catch_unwind(AssertUnwindSafe(|| work.precheck(input))) {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => {
            debug!(job_id = %ctx.job_id, item = %identity, reason = %reason, "work item skipped");
            return WorkItemResult::skipped(identity, reason);
        }
        Err(panic) => {
            return fail(ctx, identity, panic_message(panic.as_ref()));
        }
    }

    match AssertUnwindSafe(async { work.run(ctx, input, config).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(output)) => {
            debug!(job_id = %ctx.job_id, item = %identity, "work item succeeded");
            WorkItemResult::success(identity, output.message, output.artifact)
        }
        Ok(Err(err)) => fail(ctx, identity, err.to_string()),
        Err(panic) => fail(ctx, identity, panic_message(panic.as_ref())),
    }
}

fn fail(ctx: &WorkContext, identity: String, error: String) -> WorkItemResult {
    warn!(job_id = %ctx.job_id, item = %identity, error = %error, "work item failed");
    WorkItemResult::failed(identity, error)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return format!("work function panicked: {message}");
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return format!("work function panicked: {message}");
    }
    "work function panicked".to_string()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use async_trait::async_trait;
    use fileforge_common::{
        error::{ForgeError, Result},
        types::{ItemStatus, Utility},
    };

    use super::*;
    use crate::work::WorkOutput;

    enum Mode {
        Ok,
        Err,
        Panic,
        PanicAfterAwait,
    }

    struct Probe(Mode);

    #[async_trait]
    impl WorkFunction for Probe {
        type Input = String;
        type Config = ();

        fn utility(&self) -> Utility {
            Utility::Password
        }

        fn validate_config(&self, _config: &()) -> Result<()> {
            Ok(())
        }

        fn identity(&self, index: usize, input: &String) -> String {
            format!("{index}:{input}")
        }

        fn precheck(&self, input: &String) -> std::result::Result<(), String> {
            if input.is_empty() {
                return Err("label is required".to_string());
            }
            Ok(())
        }

        async fn run(&self, _ctx: &WorkContext, input: &String, _config: &()) -> Result<WorkOutput> {
            match self.0 {
                Mode::Ok => Ok(WorkOutput {
                    message: format!("handled {input}"),
                    artifact: None,
                }),
                Mode::Err => Err(ForgeError::WorkFailed("upstream returned 502".to_string())),
                Mode::Panic => panic!("sync boom"),
                Mode::PanicAfterAwait => {
                    tokio::task::yield_now().await;
                    panic!("async boom on {input}");
                }
            }
        }
    }

    fn ctx() -> WorkContext {
        WorkContext::new("job", 3, PathBuf::from("/nonexistent"))
    }

    #[tokio::test]
    async fn success_carries_message() {
        let result = execute_item(&Probe(Mode::Ok), &ctx(), &"x".to_string(), &()).await;
        assert_eq!(result.status, ItemStatus::Success);
        assert_eq!(result.identity, "3:x");
        assert_eq!(result.message, "handled x");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn error_and_panics_become_failed() {
        for mode in [Mode::Err, Mode::Panic, Mode::PanicAfterAwait] {
            let result = execute_item(&Probe(mode), &ctx(), &"x".to_string(), &()).await;
            assert_eq!(result.status, ItemStatus::Failed);
            assert!(!result.error.unwrap_or_default().is_empty());
        }
    }

    #[tokio::test]
    async fn panic_message_is_preserved() {
        let result = execute_item(&Probe(Mode::PanicAfterAwait), &ctx(), &"y".to_string(), &()).await;
        assert_eq!(
            result.error.as_deref(),
            Some("work function panicked: async boom on y")
        );
    }

    #[tokio::test]
    async fn precheck_failure_skips_without_running() {
        let result = execute_item(&Probe(Mode::Panic), &ctx(), &String::new(), &()).await;
        assert_eq!(result.status, ItemStatus::Skipped);
        assert!(result.message.contains("label is required"));
        assert!(result.error.is_none());
    }
}
