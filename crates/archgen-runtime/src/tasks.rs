//! Supervision of background tasks.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::context::CancelSignal;
use crate::error::TaskError;

/// A task that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub name: String,
    pub error: String,
}

/// How every supervised task ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Tasks that returned `Ok`, in completion order.
    pub completed: Vec<String>,
    /// Tasks that failed, in completion order.
    pub failed: Vec<TaskFailure>,
}

impl ShutdownReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn record(&mut self, name: String, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => self.completed.push(name),
            Err(error) => self.failed.push(TaskFailure { name, error }),
        }
    }
}

/// Aborts the task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs `future` as its own task and reports how it ended. A failure or
/// panic cancels `signal`. Dropping the supervisor aborts the task.
pub(crate) async fn supervise<F>(
    name: String,
    future: F,
    signal: CancelSignal,
) -> (String, Result<(), String>)
where
    F: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    tracing::info!(task = %name, "running");
    let mut work = AbortOnDrop(tokio::spawn(future));
    let outcome = match (&mut work.0).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(err) if err.is_panic() => Err("task panicked".to_string()),
        Err(err) => Err(err.to_string()),
    };
    match &outcome {
        Ok(()) => tracing::info!(task = %name, "exited"),
        Err(error) => {
            tracing::error!(task = %name, error = %error, "failed, cancelling all tasks");
            signal.cancel();
        }
    }
    (name, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failure_cancels_signal() {
        let signal = CancelSignal::new();
        let failing = async { Err::<(), TaskError>("boom".into()) };
        let (name, outcome) = supervise("bad".to_string(), failing, signal.clone()).await;
        assert_eq!(name, "bad");
        assert_eq!(outcome, Err("boom".to_string()));
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn panic_is_reported() {
        let signal = CancelSignal::new();
        let (_, outcome) = supervise(
            "crash".to_string(),
            async {
                if true {
                    panic!("crash");
                }
                Ok::<(), TaskError>(())
            },
            signal.clone(),
        )
        .await;
        assert_eq!(outcome, Err("task panicked".to_string()));
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn clean_exit_leaves_signal_alone() {
        let signal = CancelSignal::new();
        let clean = async { Ok::<(), TaskError>(()) };
        let (_, outcome) = supervise("ok".to_string(), clean, signal.clone()).await;
        assert!(outcome.is_ok());
        assert!(!signal.is_cancelled());
    }

    #[tokio::test]
    async fn aborted_supervisor_stops_its_work() {
        let signal = CancelSignal::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let stuck = async move {
            let _tx = tx;
            std::future::pending::<()>().await;
            Ok::<(), TaskError>(())
        };
        let supervisor = tokio::spawn(supervise("stuck".to_string(), stuck, signal.clone()));
        tokio::task::yield_now().await;
        supervisor.abort();

        let dropped = tokio::time::timeout(std::time::Duration::from_secs(5), rx)
            .await
            .expect("work is dropped");
        assert!(dropped.is_err());
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn report_totals() {
        let mut report = ShutdownReport::default();
        report.record("a".into(), Ok(()));
        report.record("b".into(), Err("x".into()));
        assert_eq!(report.total(), 2);
        assert!(!report.is_clean());
        assert_eq!(report.failed[0].name, "b");
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"completed\":[\"a\"]"));
    }
}
