/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 16/10/26
******************************************************************************/

use crate::error::FeedError;
use crate::events::InboundMessage;
use crate::messages::{Change, Done, ErrorMessage, Match, Open, Received};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// A shared listener for values of type `T`.
pub type EventCallback<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// An ordered, append-only set of listeners for one event category.
///
/// Listeners run synchronously in registration order. `emit` invokes a snapshot of
/// the slot, so a listener may register further listeners; those first run on the
/// next emission.
pub struct Listeners<T> {
    callbacks: RwLock<Vec<EventCallback<T>>>,
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Appends a listener to the slot.
    pub fn add(&self, callback: impl Fn(&T) + Send + Sync + 'static) {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        callbacks.push(Arc::new(callback));
    }

    /// Invokes every listener registered so far with `value`.
    pub fn emit(&self, value: &T) {
        let callbacks: Vec<EventCallback<T>> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks.iter() {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener slots for the six event categories a subscription surfaces.
#[derive(Default)]
pub struct EventHandlers {
    pub received: Listeners<Received>,
    pub open: Listeners<Open>,
    pub done: Listeners<Done>,
    pub matches: Listeners<Match>,
    pub change: Listeners<Change>,
    pub error: Listeners<ErrorMessage>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a classified message to the listeners of its category.
    ///
    /// Heartbeats are consumed silently; unknown types are reported as errors.
    pub fn dispatch(&self, message: &InboundMessage) {
        match message {
            InboundMessage::Received(m) => self.received.emit(m),
            InboundMessage::Open(m) => self.open.emit(m),
            InboundMessage::Done(m) => self.done.emit(m),
            InboundMessage::Match(m) => self.matches.emit(m),
            InboundMessage::Change(m) => self.change.emit(m),
            InboundMessage::Error(m) => self.error.emit(m),
            InboundMessage::Heartbeat(_) => {}
            InboundMessage::Unknown { tag, payload } => {
                debug!("Unrecognized message type: {}", tag);
                self.error.emit(&ErrorMessage {
                    message: format!("unrecognized message type: {}", tag),
                    reason: None,
                    payload: Some(payload.clone()),
                });
            }
        }
    }

    /// Reports a locally detected failure on the Error channel.
    pub fn report(&self, error: &FeedError) {
        self.error.emit(&ErrorMessage::from_error(error));
    }
}
