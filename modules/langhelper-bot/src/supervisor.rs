use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::is_cancellation;
use crate::export::Exporter;
use crate::feed::FeedConnector;
use crate::signals;

/// How long tasks get to finish after shutdown begins.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type TaskExit = (&'static str, anyhow::Result<()>);

/// Runs the feed, dispatch loop and optional exporter under one
/// cancellation token. The first task to fail brings the others down.
pub struct Supervisor {
    feed: Arc<FeedConnector>,
    dispatcher: Arc<Dispatcher>,
    exporter: Option<Arc<Exporter>>,
    grace: Duration,
}

impl Supervisor {
    pub fn new(
        feed: Arc<FeedConnector>,
        dispatcher: Arc<Dispatcher>,
        exporter: Option<Arc<Exporter>>,
    ) -> Self {
        Self {
            feed,
            dispatcher,
            exporter,
            grace: SHUTDOWN_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run until every task exits, one fails, or a shutdown signal arrives.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = CancellationToken::new();
        let listener = signals::spawn_listener(token.clone())?;
        let result = self.run_until(token).await;
        listener.abort();
        result
    }

    /// Same as [`run`](Self::run), but shutdown is driven only by `token`.
    pub async fn run_until(self, token: CancellationToken) -> anyhow::Result<()> {
        let mut tasks = JoinSet::new();

        let feed = self.feed.clone();
        spawn_named(&mut tasks, "feed", token.clone(), |t| async move {
            feed.start(&t).await
        });
        let dispatcher = self.dispatcher.clone();
        spawn_named(&mut tasks, "dispatch", token.clone(), |t| async move {
            dispatcher.run(t).await
        });
        if let Some(exporter) = self.exporter.clone() {
            spawn_named(&mut tasks, "export", token.clone(), |t| async move {
                exporter.run(t).await
            });
        }
        info!(tasks = tasks.len(), "Supervisor started");

        let mut failures = Vec::new();
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(joined) => record_exit(joined, &token, &mut failures),
                    None => break,
                },
                _ = token.cancelled() => break,
            }
        }

        if !tasks.is_empty() {
            info!(
                remaining = tasks.len(),
                grace_secs = self.grace.as_secs_f64(),
                "Waiting for tasks to stop"
            );
            let drained =
                tokio::time::timeout(self.grace, drain(&mut tasks, &token, &mut failures)).await;
            if drained.is_err() {
                warn!(
                    remaining = tasks.len(),
                    "Grace period elapsed, aborting remaining tasks"
                );
                failures.push(format!(
                    "{} task(s) did not stop within the grace period",
                    tasks.len()
                ));
                tasks.shutdown().await;
            }
        }

        if failures.is_empty() {
            info!("All tasks stopped");
            Ok(())
        } else {
            Err(anyhow!(failures.join("; ")))
        }
    }
}

fn spawn_named<F, Fut, E>(
    tasks: &mut JoinSet<TaskExit>,
    name: &'static str,
    token: CancellationToken,
    task: F,
) where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let fut = task(token);
    tasks.spawn(async move { (name, fut.await.map_err(anyhow::Error::from)) });
}

async fn drain(
    tasks: &mut JoinSet<TaskExit>,
    token: &CancellationToken,
    failures: &mut Vec<String>,
) {
    while let Some(joined) = tasks.join_next().await {
        record_exit(joined, token, failures);
    }
}

fn record_exit(
    joined: Result<TaskExit, JoinError>,
    token: &CancellationToken,
    failures: &mut Vec<String>,
) {
    match joined {
        Ok((name, Ok(()))) => info!(task = name, "Task finished"),
        Ok((name, Err(e))) if is_cancellation(&e) => {
            info!(task = name, "Task stopped before it got going");
        }
        Ok((name, Err(e))) => {
            let detail = format!("{e:#}");
            error!(task = name, error = detail.as_str(), "Task failed");
            failures.push(format!("{name}: {detail}"));
            token.cancel();
        }
        Err(e) if e.is_cancelled() => {}
        Err(e) => {
            error!(error = %e, "Task panicked");
            failures.push(format!("task panicked: {e}"));
            token.cancel();
        }
    }
}
