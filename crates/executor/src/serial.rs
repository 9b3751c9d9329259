//! The serial executor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};

use serialq_config::ExecutorConfig;
use serialq_core::{Context, ExecutorError, ExecutorId, ExecutorResult, ExecutorState, Operation};
use serialq_observability as observability;

use crate::join::completion;
use crate::stats::ExecutorStats;

/// Log category for everything the executor emits.
const KIND: &str = "queue";

/// An accepted operation. Dropping it before it is taken counts as a discard,
/// wherever that happens: in the loop after a stop, or inside the channel
/// when the receiver goes away.
struct Queued {
    op: Option<Operation>,
    discarded: Arc<AtomicU64>,
}

impl Queued {
    fn take(mut self) -> Option<Operation> {
        self.op.take()
    }
}

impl Drop for Queued {
    fn drop(&mut self) {
        if self.op.is_some() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// The receiving end and context claimed by a run loop.
pub(crate) struct Claim {
    receiver: Receiver<Queued>,
    context: Context,
}

/// Channel ends, context and worker identity. Guarded together so lifecycle
/// transitions are observed atomically; never held across a send or an
/// operation call.
struct Slots {
    sender: Option<SyncSender<Queued>>,
    receiver: Option<Receiver<Queued>>,
    context: Option<Context>,
    worker: Option<ThreadId>,
}

/// Runs submitted operations one at a time, in submission order.
///
/// Lifecycle: [`new`](Self::new) → [`initialize`](Self::initialize) → run loop
/// started by the embedder ([`run`](Self::run) on its own thread, or
/// [`crate::spawn`]) → [`stop`](Self::stop). Instances are single use.
///
/// Submissions made before `initialize` are buffered up to the backlog and
/// then block until a run loop starts. Operations must not submit to their
/// own executor; doing so returns [`ExecutorError::Reentrant`].
pub struct SerialExecutor {
    id: ExecutorId,
    name: String,
    backlog: usize,
    poll_interval: Duration,
    slots: Mutex<Slots>,
    stats: Mutex<ExecutorStats>,
    discarded: Arc<AtomicU64>,
}

impl core::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("backlog", &self.backlog)
            .field("state", &self.state())
            .finish()
    }
}

impl SerialExecutor {
    /// Create an uninitialized executor with an empty queue of `backlog` slots.
    pub fn new(name: impl Into<String>, backlog: usize) -> Self {
        Self::from_config(&ExecutorConfig::default().with_name(name).with_backlog(backlog))
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        let (sender, receiver) = mpsc::sync_channel(config.backlog);
        Self {
            id: ExecutorId::new(),
            name: config.name.clone(),
            backlog: config.backlog,
            poll_interval: config.poll_interval,
            slots: Mutex::new(Slots {
                sender: Some(sender),
                receiver: Some(receiver),
                context: None,
                worker: None,
            }),
            stats: Mutex::new(ExecutorStats::default()),
            discarded: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> ExecutorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backlog(&self) -> usize {
        self.backlog
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        // Slots only hold Option handles; a panic mid-update cannot leave them torn.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats_mut(&self) -> MutexGuard<'_, ExecutorStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Derive the execution context as a child of `parent`.
    ///
    /// Cancelling `parent` later cancels the executor as well.
    pub fn initialize(&self, parent: &Context) -> ExecutorResult<()> {
        let mut slots = self.slots();
        if slots.sender.is_none() {
            return Err(ExecutorError::AlreadyStopped);
        }
        if slots.context.is_some() {
            return Err(ExecutorError::AlreadyInitialized);
        }
        debug!(
            kind = KIND,
            executor = %self.name,
            id = %self.id,
            "{} Queue::Initialize",
            self.name
        );
        slots.context = Some(parent.child_token());
        Ok(())
    }

    pub fn state(&self) -> ExecutorState {
        let slots = self.slots();
        match (&slots.sender, &slots.context) {
            (None, _) => ExecutorState::Stopped,
            (Some(_), None) => ExecutorState::Uninitialized,
            (Some(_), Some(_)) => ExecutorState::Ready,
        }
    }

    /// True once initialized and until stopped.
    pub fn is_ready(&self) -> bool {
        self.state() == ExecutorState::Ready
    }

    /// Snapshot of the run loop counters.
    pub fn stats(&self) -> ExecutorStats {
        let mut stats = self.stats_mut().snapshot();
        stats.discarded = self.discarded.load(Ordering::Relaxed);
        stats
    }

    /// Cancel the context and close the queue.
    ///
    /// Pending operations are discarded; the one currently running is not
    /// interrupted (it sees its context cancelled). Does not wait for the run
    /// loop to exit: use [`crate::RunLoopHandle::join`] for that.
    pub fn stop(&self) -> ExecutorResult<()> {
        let (context, sender, receiver) = {
            let mut slots = self.slots();
            let sender = slots.sender.take().ok_or(ExecutorError::AlreadyStopped)?;
            (slots.context.take(), sender, slots.receiver.take())
        };

        debug!(kind = KIND, executor = %self.name, id = %self.id, "{} Queue::Stop", self.name);

        if let Some(context) = context {
            context.cancel();
        }
        drop(sender);

        // No run loop ever claimed the receiver. Dropping it disconnects the
        // channel first, so blocked producers fail, then discards the buffer.
        drop(receiver);
        Ok(())
    }

    /// Take the receiver for a run loop. Fails if the executor is stopped,
    /// not initialized, or another loop already holds the receiver.
    pub(crate) fn claim(&self) -> ExecutorResult<Claim> {
        let mut slots = self.slots();
        if slots.sender.is_none() {
            return Err(ExecutorError::AlreadyStopped);
        }
        let context = slots.context.clone().ok_or(ExecutorError::NotInitialized)?;
        let receiver = slots.receiver.take().ok_or(ExecutorError::AlreadyRunning)?;
        Ok(Claim { receiver, context })
    }

    /// The worker loop. Blocks the calling thread until the executor is
    /// stopped, its parent context is cancelled, or every sender is gone.
    ///
    /// Only one run loop may consume the queue; a second call fails with
    /// [`ExecutorError::AlreadyRunning`].
    pub fn run(&self) -> ExecutorResult<()> {
        let claim = self.claim()?;
        self.run_with(claim);
        Ok(())
    }

    /// Loop over a claimed receiver. A stop that lands before the first
    /// iteration is a normal exit.
    pub(crate) fn run_with(&self, claim: Claim) {
        let Claim { receiver, context } = claim;
        self.slots().worker = Some(thread::current().id());

        debug!(kind = KIND, executor = %self.name, id = %self.id, "{} Queue::Run", self.name);
        self.stats_mut().started_at = Some(Utc::now());

        loop {
            if context.is_cancelled() {
                break;
            }

            match receiver.recv_timeout(self.poll_interval) {
                Ok(queued) => {
                    // Accepted before the stop, dequeued after it: dropped
                    // unrun, which counts it as discarded.
                    if context.is_cancelled() {
                        drop(queued);
                        break;
                    }
                    if let Some(op) = queued.take() {
                        self.execute(op, &context);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Disconnect before anything else: blocked producers get QueueClosed
        // and the buffered entries are discarded with the channel.
        drop(receiver);

        self.slots().worker = None;
        self.stats_mut().ended_at = Some(Utc::now());

        warn!(
            kind = KIND,
            executor = %self.name,
            id = %self.id,
            discarded = self.discarded.load(Ordering::Relaxed),
            "{} Queue::Run end",
            self.name
        );
    }

    fn execute(&self, op: Operation, context: &Context) {
        let title = format!("{} operation", self.name);
        match observability::guard(KIND, &title, || op(context)) {
            Ok(()) => self.stats_mut().executed += 1,
            // Already reported with its stack trace; the loop carries on.
            Err(_) => self.stats_mut().faulted += 1,
        }
    }

    fn submit(&self, op: Operation) -> ExecutorResult<()> {
        let sender = {
            let slots = self.slots();
            if slots.worker == Some(thread::current().id()) {
                return Err(ExecutorError::Reentrant);
            }
            slots.sender.clone().ok_or(ExecutorError::QueueClosed)?
        };

        let queued = Queued {
            op: Some(op),
            discarded: self.discarded.clone(),
        };
        // Blocks while the backlog is full. A rejected entry comes back in
        // the error; it was never accepted, so it is not a discard.
        sender.send(queued).map_err(|mpsc::SendError(mut rejected)| {
            rejected.op = None;
            ExecutorError::QueueClosed
        })
    }

    /// Push an operation behind everything queued before it.
    ///
    /// Returns once the operation is accepted, not once it has run. Blocks
    /// while the backlog is full.
    pub fn enqueue<F>(&self, op: F) -> ExecutorResult<()>
    where
        F: FnOnce(&Context) + Send + 'static,
    {
        self.submit(Box::new(op))
    }

    /// Push an operation and block until it has been dequeued and handled.
    ///
    /// Returns `Ok(true)` when `op` ran and returned. `Ok(false)` means it did
    /// not complete: `ctx` was already cancelled when its turn came, it
    /// panicked, or the executor was stopped before reaching it.
    pub fn join<F>(&self, ctx: &Context, op: F) -> ExecutorResult<bool>
    where
        F: FnOnce(&Context) + Send + 'static,
    {
        let caller = ctx.clone();
        let (completion, waiter) = completion();

        self.submit(Box::new(move |exec_ctx: &Context| {
            if caller.is_cancelled() {
                completion.complete(false);
                return;
            }
            op(exec_ctx);
            completion.complete(true);
        }))?;

        Ok(waiter.wait())
    }

    /// Like [`join`](Self::join), but skip `op` if it waited in the queue for
    /// `start_timeout` or longer.
    ///
    /// The check happens when the operation is dequeued; a stale entry still
    /// takes its turn in FIFO order and only reports `Ok(false)`.
    pub fn join_timeout<F>(
        &self,
        ctx: &Context,
        start_timeout: Duration,
        op: F,
    ) -> ExecutorResult<bool>
    where
        F: FnOnce(&Context) + Send + 'static,
    {
        let caller = ctx.clone();
        let name = self.name.clone();
        let (completion, waiter) = completion();
        let submitted = Instant::now();

        self.submit(Box::new(move |exec_ctx: &Context| {
            let waited = submitted.elapsed();
            if waited >= start_timeout {
                debug!(
                    kind = KIND,
                    executor = %name,
                    waited_ms = waited.as_millis() as u64,
                    timeout_ms = start_timeout.as_millis() as u64,
                    "stale join skipped"
                );
                completion.complete(false);
                return;
            }
            if caller.is_cancelled() {
                completion.complete(false);
                return;
            }
            op(exec_ctx);
            completion.complete(true);
        }))?;

        Ok(waiter.wait())
    }
}
