//! Publisher task: the connection-lifecycle state machine
//!
//! One task owns the pending queue and the broker session. Log records,
//! close requests, setup completion and the idle timer all arrive at a single
//! `select!` loop, so every transition runs to completion before the next one
//! starts and no locking is needed around the queue or the session.
//!
//! ```text
//! Uninitialized ──► Connecting ──setup ok──► Ready ──idle/close──► Closed
//!                       ▲  │                                         │
//!                       │  └──setup failed──────────────────────────►│
//!                       └───────────────────── log ◄─────────────────┘
//! ```
//!
//! Ordering rule: a message never overtakes an older buffered one. A drain
//! stops at the first backpressured publish, and a new message is only
//! published directly when the queue is empty after draining.
//!
//! `Ready` is published only after the first drain of a new session. A close
//! that arrives while connecting still lets the finished setup drain the queue
//! before its resources are released.

use crate::broker::{BrokerClient, BrokerSession, SessionSettings};
use crate::core::diagnostics::{self, ErrorHandler};
use crate::core::{
    Admission, OverflowCallback, OverflowPolicy, PendingMessage, PendingQueue, Result,
    TransportError, TransportMetrics,
};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Lifecycle state of a transport's broker session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublisherState {
    /// Publisher task not started yet
    Uninitialized,
    /// Setup in flight; records are buffered
    Connecting,
    /// Channel available; records are published
    Ready,
    /// No usable channel; the next record triggers a new setup
    Closed,
}

impl fmt::Display for PublisherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublisherState::Uninitialized => write!(f, "Uninitialized"),
            PublisherState::Connecting => write!(f, "Connecting"),
            PublisherState::Ready => write!(f, "Ready"),
            PublisherState::Closed => write!(f, "Closed"),
        }
    }
}

pub(crate) enum Command {
    Log(PendingMessage),
    Close { done: Option<oneshot::Sender<()>> },
    PendingLen(oneshot::Sender<usize>),
}

type SetupFuture<B> = Pin<Box<dyn Future<Output = (BrokerSession<B>, Result<()>)> + Send>>;

pub(crate) struct Publisher<B: BrokerClient> {
    client: Arc<B>,
    settings: Arc<SessionSettings<B>>,
    /// `None` while the session is moved into an in-flight setup
    session: Option<BrokerSession<B>>,
    setup: Option<SetupFuture<B>>,
    /// Close arrived while setup was in flight
    close_requested: bool,
    /// `flush_and_close` callers waiting for an in-flight setup to resolve
    close_waiters: Vec<oneshot::Sender<()>>,
    pending: PendingQueue,
    idle_timeout: Duration,
    idle_deadline: Option<Instant>,
    state: watch::Sender<PublisherState>,
    metrics: Arc<TransportMetrics>,
    on_error: ErrorHandler,
    on_overflow: Option<OverflowCallback>,
}

impl<B: BrokerClient> Publisher<B> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        client: Arc<B>,
        settings: SessionSettings<B>,
        pending: PendingQueue,
        idle_timeout: Duration,
        state: watch::Sender<PublisherState>,
        metrics: Arc<TransportMetrics>,
        on_error: ErrorHandler,
        on_overflow: Option<OverflowCallback>,
    ) -> Self {
        Self {
            client,
            settings: Arc::new(settings),
            session: Some(BrokerSession::new()),
            setup: None,
            close_requested: false,
            close_waiters: Vec::new(),
            pending,
            idle_timeout,
            idle_deadline: None,
            state,
            metrics,
            on_error,
            on_overflow,
        }
    }

    /// Run until every transport handle is dropped
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.begin_setup();

        loop {
            let deadline = self.idle_deadline;
            tokio::select! {
                biased;

                (session, result) = poll_setup(&mut self.setup) => {
                    self.setup = None;
                    self.finish_setup(session, result).await;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                () = sleep_until(deadline) => {
                    self.idle_deadline = None;
                    self.metrics.record_idle_close();
                    self.close().await;
                }
            }
        }

        self.shutdown().await;
    }

    fn current_state(&self) -> PublisherState {
        *self.state.borrow()
    }

    fn set_state(&self, state: PublisherState) {
        self.state.send_replace(state);
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Log(message) => self.on_log(message).await,
            Command::Close { done } => {
                self.close().await;
                if let Some(done) = done {
                    if self.setup.is_some() {
                        // answered once the setup has been drained and released
                        self.close_waiters.push(done);
                    } else {
                        let _ = done.send(());
                    }
                }
            }
            Command::PendingLen(reply) => {
                let _ = reply.send(self.pending.len());
            }
        }
    }

    fn begin_setup(&mut self) {
        self.set_state(PublisherState::Connecting);
        self.close_requested = false;

        let session = self.session.take().unwrap_or_default();
        let client = Arc::clone(&self.client);
        let settings = Arc::clone(&self.settings);
        self.setup = Some(Box::pin(async move {
            session.establish(&client, &settings).await
        }));
    }

    async fn finish_setup(&mut self, mut session: BrokerSession<B>, result: Result<()>) {
        let cleanup_errors = session.take_cleanup_errors();
        self.session = Some(session);

        match result {
            Err(err) => {
                self.metrics.record_setup_failure();
                diagnostics::report(&self.on_error, &err);
                for err in &cleanup_errors {
                    diagnostics::report(&self.on_error, err);
                }
                self.close_requested = false;
                // records stay queued; the next log call retries setup
                self.set_state(PublisherState::Closed);
            }
            Ok(()) if self.close_requested => {
                self.metrics.record_setup_completed();
                self.close_requested = false;
                // the channel exists now, so buffered records go out before release
                self.drain().await;
                self.close_session().await;
            }
            Ok(()) => {
                self.metrics.record_setup_completed();
                self.drain().await;
                self.set_state(PublisherState::Ready);
                self.arm_idle_timer();
            }
        }

        self.release_close_waiters();
    }

    fn release_close_waiters(&mut self) {
        for done in self.close_waiters.drain(..) {
            let _ = done.send(());
        }
    }

    async fn on_log(&mut self, message: PendingMessage) {
        self.idle_deadline = None;

        let state = self.current_state();
        match state {
            PublisherState::Closed => {
                self.reopen();
                self.enqueue(message);
            }
            PublisherState::Uninitialized | PublisherState::Connecting => {
                self.enqueue(message);
            }
            PublisherState::Ready => {
                if self.drain().await {
                    self.publish_direct(message).await;
                } else {
                    self.enqueue(message);
                }
                self.arm_idle_timer();
            }
        }
    }

    /// Closed → Connecting
    fn reopen(&mut self) {
        if self.setup.is_some() {
            // closed while the previous setup was still running; let it finish
            self.close_requested = false;
            self.set_state(PublisherState::Connecting);
        } else {
            self.begin_setup();
        }
    }

    /// Publish buffered messages oldest first
    ///
    /// Stops at the first message the transport does not accept. Returns
    /// whether the queue is empty afterwards.
    async fn drain(&mut self) -> bool {
        let Some(session) = self.session.as_ref() else {
            return self.pending.is_empty();
        };

        loop {
            let payload = match self.pending.front() {
                Some(message) => message.payload(),
                None => return true,
            };
            let accepted = session
                .publish(&self.client, &self.settings.exchange, payload.as_bytes())
                .await;
            if !accepted {
                self.metrics.record_backpressure();
                return false;
            }

            self.metrics.record_published();
            if let Some(message) = self.pending.pop_front() {
                complete(message, Ok(()));
            }
        }
    }

    async fn publish_direct(&mut self, message: PendingMessage) {
        let payload = message.payload().as_bytes();
        let accepted = match self.session.as_ref() {
            Some(session) => {
                session
                    .publish(&self.client, &self.settings.exchange, payload)
                    .await
            }
            None => false,
        };

        if accepted {
            self.metrics.record_published();
            complete(message, Ok(()));
        } else {
            self.metrics.record_backpressure();
            self.enqueue(message);
        }
    }

    fn enqueue(&mut self, message: PendingMessage) {
        self.metrics.record_buffered();
        match self.pending.push(message) {
            Admission::Queued => {}
            Admission::Rejected(dropped) | Admission::Evicted(dropped) => self.overflow(dropped),
        }
    }

    fn overflow(&self, dropped: PendingMessage) {
        let previous = self.metrics.record_dropped();
        let capacity = self.pending.capacity().unwrap_or_default();

        if self.pending.policy() == OverflowPolicy::AlertAndDrop {
            let total = previous + 1;
            if previous == 0 || total % 1000 == 0 {
                diagnostics::warn(&format!(
                    "Pending queue full ({} messages), {} dropped. \
                     Broker may be unreachable; consider raising maxPending.",
                    capacity, total
                ));
                if let Some(ref callback) = self.on_overflow {
                    diagnostics::run_isolated("overflow callback", || callback(total));
                }
            }
        }

        complete(dropped, Err(TransportError::queue_overflow(capacity)));
    }

    fn arm_idle_timer(&mut self) {
        let owns_any = self.session.as_ref().is_some_and(BrokerSession::owns_any);
        if owns_any {
            // a timeout too large to represent never fires
            self.idle_deadline = Instant::now().checked_add(self.idle_timeout);
        }
    }

    /// Transition to Closed, releasing closeable resources
    ///
    /// Safe to call in any state and idempotent.
    async fn close(&mut self) {
        self.idle_deadline = None;

        let state = self.current_state();
        match state {
            PublisherState::Ready => {
                self.drain().await;
                self.close_session().await;
                self.metrics.record_close();
                self.set_state(PublisherState::Closed);
            }
            PublisherState::Connecting => {
                self.close_requested = true;
                self.metrics.record_close();
                self.set_state(PublisherState::Closed);
            }
            PublisherState::Uninitialized => self.set_state(PublisherState::Closed),
            PublisherState::Closed => {}
        }
    }

    async fn close_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            for err in session.close(&self.client).await {
                diagnostics::report(&self.on_error, &err);
            }
        }
    }

    /// Every transport handle is gone
    async fn shutdown(&mut self) {
        // a setup that never finishes must not keep the task alive
        self.setup = None;
        self.release_close_waiters();

        if self.current_state() == PublisherState::Ready {
            self.drain().await;
        }
        self.close_session().await;
        self.set_state(PublisherState::Closed);

        let abandoned = self.pending.take_all();
        if !abandoned.is_empty() {
            diagnostics::warn(&format!(
                "Transport dropped with {} unpublished messages",
                abandoned.len()
            ));
        }
        for message in abandoned {
            complete(message, Err(TransportError::TransportClosed));
        }
    }
}

fn complete(message: PendingMessage, result: Result<()>) {
    diagnostics::run_isolated("publish callback", || message.complete(result));
}

async fn poll_setup<B: BrokerClient>(
    setup: &mut Option<SetupFuture<B>>,
) -> (BrokerSession<B>, Result<()>) {
    match setup {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
