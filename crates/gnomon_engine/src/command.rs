//! # Command Queue
//!
//! Marshals UI-initiated engine work onto the render thread.
//!
//! ## Flow
//!
//! ```text
//! UI thread                              Render thread
//! ─────────                              ─────────────
//! CommandQueue::enqueue ──┐
//! CommandQueue::submit  ──┼──► channel ──► CommandReceiver::drain (FIFO)
//! request_pick / input  ──┘        │               │
//!                                  ▼               ▼
//!                        FrameScheduler::request   job(&mut dyn Engine)
//!                                                  │
//! CommandTicket ◄──────── oneshot ◄────────────────┘
//! ```
//!
//! Nothing here blocks the sender or runs synchronously. A ticket whose job
//! is dropped without running (session torn down, render side gone) resolves
//! to `None`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;

use crate::engine::{Engine, GizmoMode, InputEvent};
use crate::error::EngineResult;

/// Sending half that resolves a [`CommandTicket`].
pub type Reply<T> = oneshot::Sender<T>;

/// Deferred unit of engine work.
pub type Job = Box<dyn FnOnce(&mut dyn Engine) -> EngineResult<()> + Send>;

/// One entry of the command FIFO.
pub enum Command {
    /// Arbitrary engine work.
    Job {
        /// Short label for logs.
        label: &'static str,
        /// The work.
        job: Job,
    },
    /// Ray-pick at viewport coordinates on the next frame.
    Pick {
        /// X in pixels.
        x: f32,
        /// Y in pixels.
        y: f32,
    },
    /// New viewport size.
    Viewport {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Input forwarded to the engine.
    Input(InputEvent),
    /// Manipulator change.
    Gizmo(GizmoMode),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Job { label, .. } => f.debug_struct("Job").field("label", label).finish(),
            Self::Pick { x, y } => f.debug_struct("Pick").field("x", x).field("y", y).finish(),
            Self::Viewport { width, height } => f
                .debug_struct("Viewport")
                .field("width", width)
                .field("height", height)
                .finish(),
            Self::Input(event) => f.debug_tuple("Input").field(event).finish(),
            Self::Gizmo(mode) => f.debug_tuple("Gizmo").field(mode).finish(),
        }
    }
}

/// "Please render a frame" flag an idle render thread can sleep on.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    requested: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl FrameScheduler {
    /// Creates a scheduler with no pending request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a frame and wakes a waiting render thread.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
        let _lock = self.lock.lock();
        self.wake.notify_all();
    }

    /// True if a frame has been requested and not yet taken.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Consumes a pending request without waiting.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }

    /// Waits up to `timeout` for a request and consumes it.
    ///
    /// Returns false on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.take() {
            return true;
        }
        let mut lock = self.lock.lock();
        if !self.is_requested() {
            let _ = self.wake.wait_for(&mut lock, timeout);
        }
        drop(lock);
        self.take()
    }
}

/// Sending half, held by the UI context. Cheap to clone.
#[derive(Clone)]
pub struct CommandQueue {
    sender: Sender<Command>,
    scheduler: Arc<FrameScheduler>,
}

/// Receiving half, owned by the frame loop.
pub struct CommandReceiver {
    receiver: Receiver<Command>,
    scheduler: Arc<FrameScheduler>,
}

/// Creates a connected queue pair sharing one [`FrameScheduler`].
#[must_use]
pub fn command_channel() -> (CommandQueue, CommandReceiver) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let scheduler = Arc::new(FrameScheduler::new());
    (
        CommandQueue {
            sender,
            scheduler: Arc::clone(&scheduler),
        },
        CommandReceiver {
            receiver,
            scheduler,
        },
    )
}

impl CommandQueue {
    /// Appends a command and requests a frame. Never blocks.
    ///
    /// Returns false if the render side is gone; the command is dropped.
    pub fn send(&self, command: Command) -> bool {
        match self.sender.send(command) {
            Ok(()) => {
                self.scheduler.request();
                true
            }
            Err(err) => {
                tracing::debug!(command = ?err.0, "render side gone, command dropped");
                false
            }
        }
    }

    /// Queues engine work for the next frame.
    pub fn enqueue<F>(&self, label: &'static str, job: F) -> bool
    where
        F: FnOnce(&mut dyn Engine) -> EngineResult<()> + Send + 'static,
    {
        self.send(Command::Job {
            label,
            job: Box::new(job),
        })
    }

    /// Queues engine work and returns a ticket resolved with its value.
    ///
    /// The ticket resolves to `None` if the job fails, panics, or is
    /// discarded.
    pub fn submit<T, F>(&self, label: &'static str, job: F) -> CommandTicket<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Engine) -> EngineResult<T> + Send + 'static,
    {
        let (reply, ticket) = CommandTicket::channel();
        self.enqueue(label, move |engine| {
            let value = job(engine)?;
            let _ = reply.send(value);
            Ok(())
        });
        ticket
    }

    /// Asks the next frame to ray-pick at viewport coordinates.
    pub fn request_pick(&self, x: f32, y: f32) -> bool {
        self.send(Command::Pick { x, y })
    }

    /// Records a new viewport size.
    pub fn set_viewport(&self, width: u32, height: u32) -> bool {
        self.send(Command::Viewport { width, height })
    }

    /// Forwards an input event.
    pub fn forward_input(&self, event: InputEvent) -> bool {
        self.send(Command::Input(event))
    }

    /// Switches the manipulator.
    pub fn set_gizmo_mode(&self, mode: GizmoMode) -> bool {
        self.send(Command::Gizmo(mode))
    }

    /// Requests a frame without queuing work.
    pub fn request_frame(&self) {
        self.scheduler.request();
    }

    /// Number of commands not yet drained.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.sender.len())
            .finish_non_exhaustive()
    }
}

impl CommandReceiver {
    /// Takes every queued command, in FIFO order, without blocking.
    pub fn drain(&self) -> impl Iterator<Item = Command> + '_ {
        self.receiver.try_iter()
    }

    /// Drops every queued command. Their tickets resolve to `None`.
    pub fn discard(&self) -> usize {
        self.receiver.try_iter().count()
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Scheduler shared with the sending half.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<FrameScheduler> {
        &self.scheduler
    }
}

impl std::fmt::Debug for CommandReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandReceiver")
            .field("pending", &self.receiver.len())
            .finish_non_exhaustive()
    }
}

enum TicketState<T> {
    Waiting(oneshot::Receiver<T>),
    Done(Option<T>),
    Consumed,
}

/// Completion handle for a submitted command.
///
/// Await it, poll it with [`poll_ready`](Self::poll_ready) from an event
/// loop, or block on it from a thread that is not the render thread.
pub struct CommandTicket<T> {
    state: TicketState<T>,
}

impl<T> Unpin for CommandTicket<T> {}

impl<T> CommandTicket<T> {
    /// Creates a ticket and the sender that resolves it.
    #[must_use]
    pub fn channel() -> (Reply<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                state: TicketState::Waiting(rx),
            },
        )
    }

    /// A ticket that is already resolved.
    #[must_use]
    pub fn ready(value: T) -> Self {
        Self {
            state: TicketState::Done(Some(value)),
        }
    }

    /// A ticket that resolved without a value.
    #[must_use]
    pub fn failed() -> Self {
        Self {
            state: TicketState::Done(None),
        }
    }

    /// Non-blocking check. Yields the value at most once; later calls
    /// return `Ready(None)`.
    pub fn poll_ready(&mut self) -> Poll<Option<T>> {
        let outcome = match &mut self.state {
            TicketState::Waiting(rx) => match rx.try_recv() {
                Ok(value) => Some(value),
                Err(oneshot::error::TryRecvError::Empty) => return Poll::Pending,
                Err(oneshot::error::TryRecvError::Closed) => None,
            },
            TicketState::Done(value) => value.take(),
            TicketState::Consumed => None,
        };
        self.state = TicketState::Consumed;
        Poll::Ready(outcome)
    }

    /// Blocks the calling thread until the ticket resolves.
    ///
    /// Must not be called on the render thread or inside an async runtime.
    pub fn blocking_wait(self) -> Option<T> {
        match self.state {
            TicketState::Waiting(rx) => rx.blocking_recv().ok(),
            TicketState::Done(value) => value,
            TicketState::Consumed => None,
        }
    }
}

impl<T> Future for CommandTicket<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = match &mut this.state {
            TicketState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(result) => result.ok(),
                Poll::Pending => return Poll::Pending,
            },
            TicketState::Done(value) => value.take(),
            TicketState::Consumed => None,
        };
        this.state = TicketState::Consumed;
        Poll::Ready(outcome)
    }
}

impl<T> std::fmt::Debug for CommandTicket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            TicketState::Waiting(_) => "waiting",
            TicketState::Done(_) => "done",
            TicketState::Consumed => "consumed",
        };
        f.debug_struct("CommandTicket").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_enqueue_requests_frame() {
        let (queue, rx) = command_channel();
        assert!(!rx.scheduler().is_requested());
        assert!(queue.enqueue("noop", |_| Ok(())));
        assert!(rx.scheduler().take());
        assert!(!rx.scheduler().take());
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_drain_is_fifo() {
        let (queue, rx) = command_channel();
        queue.request_pick(1.0, 2.0);
        queue.set_viewport(640, 480);
        queue.set_gizmo_mode(GizmoMode::Rotate);

        let drained: Vec<_> = rx.drain().collect();
        assert!(matches!(drained[0], Command::Pick { .. }));
        assert!(matches!(drained[1], Command::Viewport { width: 640, height: 480 }));
        assert!(matches!(drained[2], Command::Gizmo(GizmoMode::Rotate)));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_discarded_job_resolves_none() {
        let (queue, rx) = command_channel();
        let mut ticket = queue.submit("never runs", |_| Ok(5_u32));
        assert_eq!(ticket.poll_ready(), Poll::Pending);
        assert_eq!(rx.discard(), 1);
        assert_eq!(ticket.poll_ready(), Poll::Ready(None));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (queue, rx) = command_channel();
        drop(rx);
        assert!(!queue.enqueue("orphan", |_| Ok(())));
        let ticket = queue.submit("orphan", |_| Ok(()));
        assert_eq!(ticket.blocking_wait(), None);
    }

    #[test]
    fn test_ready_ticket() {
        let mut ticket = CommandTicket::ready(3);
        assert_eq!(ticket.poll_ready(), Poll::Ready(Some(3)));
        assert_eq!(ticket.poll_ready(), Poll::Ready(None));
        assert_eq!(CommandTicket::<u8>::failed().blocking_wait(), None);
    }

    #[test]
    fn test_scheduler_wakes_waiter() {
        let scheduler = Arc::new(FrameScheduler::new());
        let s = Arc::clone(&scheduler);
        let waiter = thread::spawn(move || s.wait(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(10));
        scheduler.request();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_scheduler_times_out() {
        let scheduler = FrameScheduler::new();
        assert!(!scheduler.wait(Duration::from_millis(5)));
    }
}
