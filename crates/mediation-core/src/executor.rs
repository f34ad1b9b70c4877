//! The §5.1 executor abstraction: where a task physically runs. Production
//! wiring splits network-bound adapter/S2S calls (elastic, one task per
//! call) from bounded background work (config refresh, credential
//! validation); test mode degenerates both to synchronous, in-place
//! execution so `#[tokio::test]` callers never need real concurrency to
//! observe a result.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Runs a detached unit of work. Implementations must not block the caller
/// beyond scheduling it; the caller never awaits a return value through this
/// trait, only through whatever channel the spawned future closes over.
pub trait Executor: Send + Sync {
    fn spawn(&self, fut: BoxFuture);
}

/// The network executor: unbounded, one `tokio` task per call. This is the
/// default caller-affine executor too, per §5.1 ("the default used when the
/// host supplies none is the network executor itself").
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn spawn(&self, fut: BoxFuture) {
        tokio::task::spawn(fut);
    }
}

/// The background executor: gated by a semaphore so config refreshes and
/// credential validation sweeps can't unboundedly pile up `tokio` tasks.
pub struct BoundedExecutor {
    semaphore: Arc<Semaphore>,
}

impl BoundedExecutor {
    pub fn new(capacity: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(capacity.max(1))) }
    }
}

impl Executor for BoundedExecutor {
    fn spawn(&self, fut: BoxFuture) {
        let semaphore = self.semaphore.clone();
        tokio::task::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            fut.await;
        });
    }
}

/// Test-mode executor: runs the future to completion before `spawn`
/// returns. This is what makes `testMode` collapse the entire load/show
/// pipeline into ordinary synchronous control flow.
///
/// Deliberately does *not* `futures::executor::block_on` the future
/// directly on the calling thread: if the caller's own task is itself
/// being driven by a (commonly single-threaded, in `#[tokio::test]`)
/// `tokio` runtime, nesting a foreign executor there would starve that
/// runtime's timer/I/O driver for as long as the nested call runs, and a
/// real `tokio::time::timeout`/`sleep` inside `fut` (as the adapter
/// registry and config gate use throughout) would never wake up. Running
/// `fut` to completion on its own throwaway current-thread runtime on a
/// dedicated OS thread, and simply joining that thread, sidesteps this
/// without losing "caller blocks until done" semantics.
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn spawn(&self, fut: BoxFuture) {
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .expect("failed to build the inline test-mode executor's runtime");
                runtime.block_on(fut);
            });
        });
    }
}

/// Test-detection is a single observable predicate, not scattered `if
/// test_mode` checks: callers ask for an executor and get the right
/// implementation back without needing to know which mode produced it.
pub fn network_executor(test_mode: bool) -> Arc<dyn Executor> {
    if test_mode {
        Arc::new(InlineExecutor)
    } else {
        Arc::new(TokioExecutor)
    }
}

pub fn background_executor(test_mode: bool, capacity: usize) -> Arc<dyn Executor> {
    if test_mode {
        Arc::new(InlineExecutor)
    } else {
        Arc::new(BoundedExecutor::new(capacity))
    }
}
