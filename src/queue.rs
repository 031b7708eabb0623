//! Bounded output queue between the read loop and the consumer
//!
//! The read loop is the only producer. It waits when the queue is full, so a
//! slow consumer slows reading instead of growing memory. The queue completes
//! in one of three ways:
//!
//! - normally, after which the consumer drains what is buffered and sees the end
//! - with an error, which the consumer sees once after draining
//! - forcibly, which ends the consumer's stream at once, buffered items included

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::Stream;
use log::debug;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::types::messages::Message;

/// State shared by both ends of the queue
#[derive(Debug, Default)]
struct QueueShared {
    /// Fires on forced completion
    forced: CancellationToken,
    /// Fault recorded by the producer before completing
    terminal: Mutex<Option<Arc<AgentError>>>,
    /// Set once the producer has completed the queue
    completed: AtomicBool,
}

/// Create a queue holding at most `capacity` messages
pub(crate) fn output_queue(capacity: usize) -> (QueueWriter, QueueHandle, MessageStream) {
    let (tx, rx) = mpsc::channel(capacity);
    let shared = Arc::new(QueueShared::default());
    (
        QueueWriter {
            tx: Some(tx),
            shared: Arc::clone(&shared),
        },
        QueueHandle {
            shared: Arc::clone(&shared),
        },
        MessageStream {
            rx,
            shared,
            error_delivered: false,
        },
    )
}

/// Outcome of offering a message to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    /// The message was enqueued
    Delivered,
    /// The queue is completed or the consumer is gone; the message was dropped
    Closed,
    /// The wait for space was cancelled
    Cancelled,
}

/// Producer end, owned by the read loop
#[derive(Debug)]
pub(crate) struct QueueWriter {
    tx: Option<mpsc::Sender<Message>>,
    shared: Arc<QueueShared>,
}

impl QueueWriter {
    /// Enqueue a message, waiting for space unless `cancel` fires first
    pub(crate) async fn push(&mut self, message: Message, cancel: &CancellationToken) -> PushOutcome {
        let Some(tx) = &self.tx else {
            return PushOutcome::Closed;
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => PushOutcome::Cancelled,
            () = self.shared.forced.cancelled() => PushOutcome::Closed,
            sent = tx.send(message) => match sent {
                Ok(()) => PushOutcome::Delivered,
                Err(_) => {
                    debug!("message consumer dropped, discarding message");
                    PushOutcome::Closed
                }
            },
        }
    }

    /// Whether the queue still accepts messages
    pub(crate) const fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    /// Complete normally; buffered messages stay available to the consumer
    pub(crate) fn complete(&mut self) {
        if self.tx.take().is_some() {
            self.shared.completed.store(true, Ordering::SeqCst);
        }
    }

    /// Complete with a terminal error the consumer sees after draining
    pub(crate) fn complete_with_error(&mut self, error: Arc<AgentError>) {
        if self.tx.is_none() {
            return;
        }
        *self.shared.terminal.lock() = Some(error);
        self.complete();
    }
}

/// Router-side handle for forced completion and terminal error inspection
#[derive(Debug, Clone)]
pub(crate) struct QueueHandle {
    shared: Arc<QueueShared>,
}

impl QueueHandle {
    /// End the consumer's stream immediately
    pub(crate) fn force_complete(&self) {
        self.shared.forced.cancel();
    }

    /// Terminal error, visible only once the queue has completed
    pub(crate) fn terminal_error(&self) -> Option<Arc<AgentError>> {
        if !self.shared.completed.load(Ordering::SeqCst) {
            return None;
        }
        self.shared.terminal.lock().clone()
    }
}

/// Consumer end: conversation messages in wire order
///
/// Yields `Ok(message)` for each message, then ends. If the session ended on
/// a transport fault, one `Err(AgentError::SessionTerminated)` is yielded
/// after the last message.
#[derive(Debug)]
pub struct MessageStream {
    rx: mpsc::Receiver<Message>,
    shared: Arc<QueueShared>,
    error_delivered: bool,
}

impl MessageStream {
    /// Next message, or `None` once the stream has ended
    pub async fn next_message(&mut self) -> Option<Result<Message>> {
        if self.shared.forced.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            () = self.shared.forced.cancelled() => None,
            received = self.rx.recv() => match received {
                Some(message) => Some(Ok(message)),
                None => self.take_terminal(),
            },
        }
    }

    fn take_terminal(&mut self) -> Option<Result<Message>> {
        if self.error_delivered {
            return None;
        }
        self.error_delivered = true;
        self.shared
            .terminal
            .lock()
            .clone()
            .map(|error| Err(AgentError::SessionTerminated(error)))
    }

    /// Whether the producer has completed the queue
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.shared.completed.load(Ordering::SeqCst)
    }

    /// Convert into a [`Stream`]
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Message>> + Send {
        async_stream::stream! {
            while let Some(item) = self.next_message().await {
                yield item;
            }
        }
    }
}
