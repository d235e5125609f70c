/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 16/10/26
******************************************************************************/

use crate::config::SubscriptionConfig;
use crate::connection::FeedConnection;
use crate::error::{FeedError, FeedResult};
use crate::events::{InboundMessage, classify};
use crate::handlers::EventHandlers;
use crate::messages::{Change, Done, ErrorMessage, Match, Open, Received, SubscribeRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, yield_now};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a subscription's connection loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created, `subscribe` not called yet.
    Idle,
    /// Building the request and opening the transport.
    Connecting,
    /// The subscribe request has been sent.
    Subscribed,
    /// Pumping inbound messages to the listeners.
    ReceivingLoop,
    /// Releasing the session before a reconnect or shutdown.
    Closing,
    /// The task has exited. Terminal.
    Cancelled,
}

/// A resilient subscription to the real-time feed of one product.
///
/// `subscribe` spawns a task that connects, sends the subscribe request and pumps
/// messages to the registered listeners. Transport failures close the session and
/// the task reconnects and re-subscribes, until `unsubscribe` is called or the
/// subscription is dropped. Malformed messages are reported on the Error channel and
/// never tear down the session.
///
/// Messages on the authenticated feed do not advance the sequence number, so a
/// dropped authenticated message cannot be detected.
///
/// ```rust,no_run
/// use coinbase_feed::{FeedSubscription, SubscriptionConfig};
///
/// # async fn run() -> coinbase_feed::error::FeedResult<()> {
/// let subscription = FeedSubscription::new(SubscriptionConfig::new("BTC-USD")?);
/// subscription.on_match(|m| println!("{} @ {}", m.size, m.price));
/// subscription.subscribe();
/// // ...
/// subscription.unsubscribe();
/// subscription.wait().await;
/// # Ok(())
/// # }
/// ```
pub struct FeedSubscription {
    config: Arc<SubscriptionConfig>,
    handlers: Arc<EventHandlers>,
    cancel: CancellationToken,
    heartbeats: Arc<AtomicU64>,
    state: watch::Receiver<SubscriptionState>,
    state_tx: Mutex<Option<watch::Sender<SubscriptionState>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedSubscription {
    /// Creates an idle subscription. Nothing connects until `subscribe` is called.
    pub fn new(config: SubscriptionConfig) -> Self {
        let (state_tx, state) = watch::channel(SubscriptionState::Idle);
        Self {
            config: Arc::new(config),
            handlers: Arc::new(EventHandlers::new()),
            cancel: CancellationToken::new(),
            heartbeats: Arc::new(AtomicU64::new(0)),
            state,
            state_tx: Mutex::new(Some(state_tx)),
            task: Mutex::new(None),
        }
    }

    /// The configuration the subscription was created with.
    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    /// The listener slots, for callers that prefer to register on them directly.
    pub fn handlers(&self) -> &EventHandlers {
        &self.handlers
    }

    /// Registers a listener for `received` messages.
    ///
    /// Listeners of a category run in registration order on the subscription task
    /// and may register further listeners, which take effect from the next message.
    /// They should return quickly, since the next frame is not read until they do.
    ///
    /// # Arguments
    ///
    /// * `callback`: Invoked with each decoded `Received` record.
    pub fn on_received(&self, callback: impl Fn(&Received) + Send + Sync + 'static) {
        self.handlers.received.add(callback);
    }

    /// Registers a listener for `open` messages. See `on_received`.
    pub fn on_open(&self, callback: impl Fn(&Open) + Send + Sync + 'static) {
        self.handlers.open.add(callback);
    }

    /// Registers a listener for `done` messages. See `on_received`.
    pub fn on_done(&self, callback: impl Fn(&Done) + Send + Sync + 'static) {
        self.handlers.done.add(callback);
    }

    /// Registers a listener for `match` messages. See `on_received`.
    pub fn on_match(&self, callback: impl Fn(&Match) + Send + Sync + 'static) {
        self.handlers.matches.add(callback);
    }

    /// Registers a listener for `change` messages. See `on_received`.
    pub fn on_change(&self, callback: impl Fn(&Change) + Send + Sync + 'static) {
        self.handlers.change.add(callback);
    }

    /// Registers a listener for the Error channel.
    ///
    /// Receives `error` frames sent by the feed as well as locally detected
    /// failures: connect and transport errors, malformed frames and unrecognized
    /// message types. Nothing is reported once `unsubscribe` has been called.
    pub fn on_error(&self, callback: impl Fn(&ErrorMessage) + Send + Sync + 'static) {
        self.handlers.error.add(callback);
    }

    /// Starts the subscription task and returns immediately.
    ///
    /// Must be called from within a Tokio runtime. Calling it again is a no-op; a
    /// subscription cannot be restarted once it has been cancelled.
    pub fn subscribe(&self) {
        let state_tx = self
            .state_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(state_tx) = state_tx else {
            warn!(
                "Subscription for {} already started",
                self.config.product_id()
            );
            return;
        };

        let worker = SubscriptionWorker {
            config: self.config.clone(),
            handlers: self.handlers.clone(),
            cancel: self.cancel.clone(),
            heartbeats: self.heartbeats.clone(),
            state: state_tx,
        };

        let handle = tokio::spawn(worker.run());
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Requests cooperative shutdown. Idempotent.
    ///
    /// The task exits at its next suspension point without reconnecting, and no
    /// listener is invoked after it observes the request.
    pub fn unsubscribe(&self) {
        if !self.cancel.is_cancelled() {
            info!("Unsubscribing from {}", self.config.product_id());
            self.cancel.cancel();
        }
    }

    /// Whether `unsubscribe` was called or the subscription was dropped.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the subscription task to finish. Returns at once if it never started.
    pub async fn wait(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Subscription task failed: {}", e);
            }
        }
    }

    /// Current lifecycle state of the connection loop.
    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// A receiver notified on every state transition.
    pub fn state_changes(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// Number of heartbeat messages consumed so far.
    pub fn heartbeat_count(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SubscriptionWorker {
    config: Arc<SubscriptionConfig>,
    handlers: Arc<EventHandlers>,
    cancel: CancellationToken,
    heartbeats: Arc<AtomicU64>,
    state: watch::Sender<SubscriptionState>,
}

impl SubscriptionWorker {
    async fn run(self) {
        let mut connection = FeedConnection::new();
        let mut attempt: u64 = 0;

        while !self.cancel.is_cancelled() {
            // Every retry suspends at least once, raced against cancellation.
            if attempt > 0 {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = pause(self.config.reconnect_delay()) => {}
                }
            }
            attempt += 1;

            self.set_state(SubscriptionState::Connecting);
            match self.run_session(&mut connection, attempt).await {
                Ok(()) | Err(FeedError::Cancelled) => {}
                Err(e) => self.report(&e),
            }

            self.set_state(SubscriptionState::Closing);
            connection.close().await;
        }

        self.set_state(SubscriptionState::Cancelled);
        info!(
            "Subscription for {} stopped after {} connection attempts",
            self.config.product_id(),
            attempt
        );
    }

    /// Connects, subscribes and pumps messages until the session fails or the
    /// subscription is cancelled.
    async fn run_session(&self, connection: &mut FeedConnection, attempt: u64) -> FeedResult<()> {
        let request = SubscribeRequest::for_config(&self.config)?;
        let endpoint = self.config.endpoint()?;

        info!("Connecting to {} (attempt {})", endpoint, attempt);
        connection.connect(endpoint.as_str(), &self.cancel).await?;
        connection.send(&request).await?;

        self.set_state(SubscriptionState::Subscribed);
        info!("Subscribed to {}", self.config.product_id());

        self.set_state(SubscriptionState::ReceivingLoop);
        loop {
            let frame = connection.receive_one(&self.cancel).await?;
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            if frame.is_empty() {
                continue;
            }

            match classify(frame.as_str()) {
                Ok(message) => {
                    if let InboundMessage::Heartbeat(heartbeat) = &message {
                        self.heartbeats.fetch_add(1, Ordering::Relaxed);
                        trace!("Heartbeat: {:?}", heartbeat.sequence);
                    }
                    self.handlers.dispatch(&message);
                }
                Err(e) => {
                    debug!("Dropping message: {}", e);
                    self.handlers.report(&e);
                }
            }
        }
    }

    fn report(&self, error: &FeedError) {
        if self.cancel.is_cancelled() {
            return;
        }
        warn!("Feed session for {} ended: {}", self.config.product_id(), error);
        self.handlers.report(error);
    }

    fn set_state(&self, state: SubscriptionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Subscription state: {:?} -> {:?}", previous, state);
        }
    }
}

async fn pause(delay: Option<Duration>) {
    match delay {
        Some(delay) => sleep(delay).await,
        None => yield_now().await,
    }
}
