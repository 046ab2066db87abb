use std::{
    borrow::Cow,
    fmt::{self, Display},
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use futures::{stream::FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error, info, warn, Instrument};

use crate::shutdown::Shutdown;

/// Errors that can occur when joining a pool of [`Task`]s down to shutdown.
#[derive(Debug, Error)]
pub enum Error {
    #[error("static task finished prematurely: {name}")]
    PrematureFinish { name: Cow<'static, str> },
    #[error("some tasks failed to finish within the shutdown timeout: {hung_tasks:?}")]
    Hung { hung_tasks: Vec<String> },
}

/// Waits on a fixed set of "static" tasks (expected to run for the worker's
/// entire lifetime) plus an open-ended stream of "ephemeral" tasks (expected
/// to finish on their own, e.g. one per job run), and drives them all to
/// completion once `shutdown` fires.
///
/// If any static task finishes before shutdown is requested, that's treated
/// as a bug: a shutdown is triggered immediately and an error is returned so
/// the caller can decide how loudly to fail.
pub async fn join_pool_on_shutdown(
    static_tasks: Vec<Task<()>>,
    mut eph_tasks_rx: mpsc::Receiver<Task<()>>,
    mut shutdown: Shutdown,
    shutdown_timeout: Duration,
) -> Result<(), Error> {
    if static_tasks.is_empty() {
        shutdown.recv().await;
        return Ok(());
    }

    let mut static_tasks = static_tasks
        .into_iter()
        .map(Task::logged)
        .collect::<FuturesUnordered<_>>();
    let mut ephemeral_tasks = FuturesUnordered::new();

    let mut result = Ok(());

    loop {
        tokio::select! {
            biased;
            () = shutdown.recv() => break,
            Some(task) = eph_tasks_rx.recv() => {
                debug!("received ephemeral task: {name}", name = task.name());
                ephemeral_tasks.push(task.logged());
            }
            Some(name) = ephemeral_tasks.next() => {
                debug!("ephemeral task finished: {name}");
            }
            Some(name) = static_tasks.next() => {
                result = Err(Error::PrematureFinish { name });
                break shutdown.send();
            }
        }
    }

    let mut all_tasks = static_tasks
        .into_iter()
        .chain(ephemeral_tasks.into_iter())
        .collect::<FuturesUnordered<_>>();

    let shutdown_timeout_fut = tokio::time::sleep(shutdown_timeout);
    tokio::pin!(shutdown_timeout_fut);

    while !all_tasks.is_empty() {
        tokio::select! {
            Some(_name) = all_tasks.next() => (),
            () = &mut shutdown_timeout_fut => {
                let hung_tasks = all_tasks
                    .iter()
                    .map(|task| task.name().to_owned())
                    .collect::<Vec<_>>();
                return Err(Error::Hung { hung_tasks });
            }
        }
    }

    result
}

/// A thin wrapper around [`tokio::task::JoinHandle`] that:
///
/// (1) propagates panics instead of catching them, and
/// (2) is `#[must_use]`, so a spawned task can't be silently dropped without
///     either joining it or explicitly calling [`Task::detach`].
///
/// Joining all spawned tasks (structured concurrency) keeps control flow
/// sane and ensures a panic in a background task surfaces instead of being
/// swallowed, which matters for the worker pool: a panicked job runner must
/// not look like a job that's merely still PROCESSING.
#[must_use]
pub struct Task<T> {
    handle: JoinHandle<T>,
    name: Cow<'static, str>,
}

/// Wraps a [`Task`] so its result is logged when it finishes; the inner `T`
/// is discarded and the future resolves to the task's name.
pub struct LoggedTask<T>(Task<T>);

struct TaskOutputDisplay<'a> {
    name: &'a str,
    result: Result<(), &'a JoinError>,
}

impl<T> Task<T> {
    pub fn from_tokio(handle: JoinHandle<T>, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            handle,
            name: name.into(),
        }
    }

    /// Spawns a named task which inherits the current tracing span.
    #[inline]
    pub fn spawn<F>(name: impl Into<Cow<'static, str>>, future: F) -> Task<F::Output>
    where
        F: Future<Output = T> + Send + 'static,
        F::Output: Send + 'static,
    {
        let span = tracing::Span::current();
        Self::spawn_with_span(name, span, future)
    }

    /// Spawns a task without a name, for call-and-forget work (e.g. a single
    /// rule-application run) where joining later isn't useful.
    #[inline]
    pub fn spawn_unnamed<F>(future: F) -> Task<F::Output>
    where
        F: Future<Output = T> + Send + 'static,
        F::Output: Send + 'static,
    {
        Self::spawn_with_span(String::new(), tracing::Span::current(), future)
    }

    #[inline]
    pub fn spawn_with_span<F>(
        name: impl Into<Cow<'static, str>>,
        span: tracing::Span,
        future: F,
    ) -> Task<F::Output>
    where
        F: Future<Output = T> + Send + 'static,
        F::Output: Send + 'static,
    {
        let name = name.into();
        debug!("spawning task: {name}");
        Self {
            handle: tokio::spawn(future.instrument(span)),
            name,
        }
    }

    /// Drops the handle, letting the task keep running detached. Used
    /// sparingly - most tasks should be joined.
    #[inline]
    pub fn detach(self) {
        std::mem::drop(self)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    #[inline]
    pub fn logged(self) -> LoggedTask<T> {
        LoggedTask(self)
    }

    #[inline]
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };

        let result = match result {
            Ok(val) => Ok(val),
            Err(join_err) => match join_err.try_into_panic() {
                Ok(panic_reason) => {
                    error!(name = self.name(), "task panicked!");
                    std::panic::resume_unwind(panic_reason)
                }
                Err(join_err) => Err(join_err),
            },
        };

        Poll::Ready(result)
    }
}

impl<T> LoggedTask<T> {
    #[inline]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl<T> Future for LoggedTask<T> {
    type Output = Cow<'static, str>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map(|result| {
            let msg = TaskOutputDisplay {
                name: self.name(),
                result: result.as_ref().map(|_| ()),
            };
            match &result {
                Ok(_) => info!("{msg}"),
                Err(e) if e.is_cancelled() => warn!("{msg}"),
                Err(_) => error!("{msg}"),
            }
            self.0.name.clone()
        })
    }
}

impl Display for TaskOutputDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match &self.result {
            Ok(_) => "finished",
            Err(e) if e.is_cancelled() => "cancelled",
            Err(_) => "panicked",
        };
        write!(f, "task '{}' {label}", self.name)?;
        if let Err(e) = self.result {
            write!(f, ": {e:#}")?;
        }
        Ok(())
    }
}
