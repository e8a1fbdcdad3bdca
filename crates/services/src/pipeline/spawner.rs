use futures::future::BoxFuture;

/// Where per-message work runs. Swapping the implementation bounds concurrency
/// without touching the subscriber.
pub trait TaskSpawner: Send + Sync + 'static {
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Unbounded: every message becomes its own tokio task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}
