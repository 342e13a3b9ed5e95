//! Health check by running a command inside the container.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::health::{HealthCheckStrategy, HealthCheckTest};
use crate::context::WaitContext;
use crate::error::{WaitError, WaitResult};
use crate::target::{ContainerStatus, StrategyTarget};

/// Test that passes when a command exits with status zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTest {
    cmd: Vec<String>,
}

impl CommandTest {
    pub fn new(cmd: Vec<String>) -> Self {
        Self { cmd }
    }

    /// Full argv, program first.
    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }
}

#[async_trait]
impl HealthCheckTest for CommandTest {
    async fn test(&self, ctx: &WaitContext, target: &dyn StrategyTarget) -> WaitResult<bool> {
        let state = target.state(ctx).await?;

        if !is_cmd_testable(&state.status) {
            return Err(untestable(ctx, target, state.status).await);
        }

        if !state.running {
            debug!(status = %state.status, "Container not running yet");
            return Ok(false);
        }

        let output = target.exec(ctx, &self.cmd).await?;
        debug!(cmd = ?self.cmd, exit_code = output.exit_code, "Health check command finished");

        Ok(output.success())
    }
}

/// Build the error for a container that can never pass a command check.
async fn untestable(
    ctx: &WaitContext,
    target: &dyn StrategyTarget,
    status: ContainerStatus,
) -> WaitError {
    let logs = match target.logs(ctx).await {
        Ok(logs) => logs,
        Err(err) => {
            return WaitError::LogsUnavailable {
                status,
                source: Box::new(err),
            }
        }
    };

    let Some(mut logs) = logs else {
        return WaitError::NoLogs { status };
    };

    let mut out = Vec::new();
    if let Err(source) = logs.read_to_end(&mut out).await {
        return WaitError::LogsUnreadable { status, source };
    }

    WaitError::NotTestable {
        status,
        logs: String::from_utf8_lossy(&out).into_owned(),
    }
}

fn is_cmd_testable(status: &ContainerStatus) -> bool {
    matches!(
        status,
        ContainerStatus::Created | ContainerStatus::Running | ContainerStatus::Restarting
    )
}

/// Create a health check strategy that runs `cmd args...` in the container.
pub fn for_health_check_cmd<I, S>(cmd: impl Into<String>, args: I) -> HealthCheckStrategy
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = args.into_iter();
    let mut test = Vec::with_capacity(args.size_hint().0 + 1);
    test.push(cmd.into());
    test.extend(args.map(Into::into));

    HealthCheckStrategy::new(CommandTest::new(test))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::{failing_reader, MockTarget};
    use crate::strategy::Strategy;
    use crate::target::{ContainerState, ExecOutput};

    fn paused() -> ContainerState {
        ContainerState::new(ContainerStatus::Paused, false)
    }

    fn strategy() -> HealthCheckStrategy {
        for_health_check_cmd("test", Vec::<String>::new())
            .with_retries(0)
            .with_test_timeout(Duration::from_secs(60))
            .with_start_period(Duration::ZERO)
    }

    async fn run(target: &MockTarget) -> WaitResult<()> {
        let result = strategy()
            .wait_until_ready(&WaitContext::background(), target)
            .await;
        target.assert_expectations();
        result
    }

    #[test]
    fn test_argv_is_command_then_args() {
        let strategy = for_health_check_cmd("pg_isready", ["-U", "postgres"]);
        assert_eq!(strategy.retries(), 3);

        let test = CommandTest::new(vec!["pg_isready".into(), "-U".into(), "postgres".into()]);
        assert_eq!(test.cmd(), ["pg_isready", "-U", "postgres"]);
    }

    #[test]
    fn test_testable_statuses() {
        assert!(is_cmd_testable(&ContainerStatus::Created));
        assert!(is_cmd_testable(&ContainerStatus::Running));
        assert!(is_cmd_testable(&ContainerStatus::Restarting));
        assert!(!is_cmd_testable(&ContainerStatus::Paused));
        assert!(!is_cmd_testable(&ContainerStatus::Exited));
        assert!(!is_cmd_testable(&ContainerStatus::Other("up".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_error_is_returned() {
        let target = MockTarget::new().on_state(Err(WaitError::Target("get state error".into())));

        let err = run(&target).await.unwrap_err();
        assert_eq!(err.to_string(), "get state error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_untestable_and_logs_unavailable() {
        let target = MockTarget::new()
            .on_state(Ok(paused()))
            .on_logs(Err(WaitError::Target("get logs error".into())));

        let err = run(&target).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "container is paused and unable to get logs: get logs error"
        );
        assert_eq!(target.calls("state"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untestable_and_logs_unreadable() {
        let target = MockTarget::new()
            .on_state(Ok(paused()))
            .on_logs(Ok(Some(failing_reader("read logs error"))));

        let err = run(&target).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "container is paused and unable to read logs: read logs error"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_untestable_with_logs() {
        let target = MockTarget::new()
            .on_state(Ok(paused()))
            .on_logs(Ok(Some(Box::new(&b"log message"[..]))));

        let err = run(&target).await.unwrap_err();
        assert_eq!(err.to_string(), "container is paused, logs:\nlog message");
    }

    #[tokio::test(start_paused = true)]
    async fn test_untestable_and_no_logs() {
        let target = MockTarget::new()
            .on_state(Ok(paused()))
            .on_logs(Ok(None));

        let err = run(&target).await.unwrap_err();
        assert_eq!(err.to_string(), "container is paused and no logs");
    }

    #[tokio::test(start_paused = true)]
    async fn test_testable_but_not_running() {
        let target = MockTarget::new().on_state(Ok(ContainerState::new(
            ContainerStatus::Restarting,
            false,
        )));

        let err = run(&target).await.unwrap_err();
        assert!(err.is_max_retries_exceeded());
        assert_eq!(err.to_string(), "health check failed: max retries exceeded");
        assert_eq!(target.calls("exec"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exec_error_is_returned() {
        let target = MockTarget::new()
            .on_state(Ok(ContainerState::running()))
            .on_exec(Err(WaitError::Target("exec error".into())));

        let err = run(&target).await.unwrap_err();
        assert_eq!(err.to_string(), "exec error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_zero_exit_code() {
        let target = MockTarget::new()
            .on_state(Ok(ContainerState::running()))
            .on_exec(Ok(ExecOutput::code(1)));

        let err = run(&target).await.unwrap_err();
        assert!(err.is_max_retries_exceeded());
        assert_eq!(target.exec_commands(), vec![vec!["test".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_exit_code() {
        let target = MockTarget::new()
            .on_state(Ok(ContainerState::running()))
            .on_exec(Ok(ExecOutput::code(0)));

        run(&target).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_becomes_healthy_after_restart() {
        let target = MockTarget::new()
            .on_state(Ok(ContainerState::new(ContainerStatus::Restarting, false)))
            .on_state(Ok(ContainerState::new(ContainerStatus::Created, false)))
            .on_state(Ok(ContainerState::running()))
            .on_exec(Ok(ExecOutput::code(0)));

        let strategy = for_health_check_cmd("test", ["--quiet"])
            .with_test_interval(Duration::from_millis(100))
            .with_retries(5);

        strategy
            .wait_until_ready(&WaitContext::background(), &target)
            .await
            .unwrap();

        target.assert_expectations();
        assert_eq!(target.calls("state"), 3);
        assert_eq!(
            target.exec_commands(),
            vec![vec!["test".to_string(), "--quiet".to_string()]]
        );
    }
}
