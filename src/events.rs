/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 16/10/26
******************************************************************************/

use crate::error::{FeedError, FeedResult};
use crate::messages::{Change, Done, ErrorMessage, Heartbeat, Match, Open, Received};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Received,
    Open,
    Done,
    Match,
    Change,
    Error,
    Heartbeat,
}

impl EventType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "received" => Some(EventType::Received),
            "open" => Some(EventType::Open),
            "done" => Some(EventType::Done),
            "match" => Some(EventType::Match),
            "change" => Some(EventType::Change),
            "error" => Some(EventType::Error),
            "heartbeat" => Some(EventType::Heartbeat),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            EventType::Received => "received",
            EventType::Open => "open",
            EventType::Done => "done",
            EventType::Match => "match",
            EventType::Change => "change",
            EventType::Error => "error",
            EventType::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// One classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Received(Received),
    Open(Open),
    Done(Done),
    Match(Match),
    Change(Change),
    Error(ErrorMessage),
    Heartbeat(Heartbeat),
    /// A well-formed frame whose `type` is not one the feed defines.
    Unknown { tag: String, payload: String },
}

impl InboundMessage {
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            InboundMessage::Received(_) => Some(EventType::Received),
            InboundMessage::Open(_) => Some(EventType::Open),
            InboundMessage::Done(_) => Some(EventType::Done),
            InboundMessage::Match(_) => Some(EventType::Match),
            InboundMessage::Change(_) => Some(EventType::Change),
            InboundMessage::Error(_) => Some(EventType::Error),
            InboundMessage::Heartbeat(_) => Some(EventType::Heartbeat),
            InboundMessage::Unknown { .. } => None,
        }
    }
}

/// Parses a text frame and classifies it by its `type` field.
///
/// Returns `FeedError::Parse` if the text is not JSON or the body does not fit the
/// record for its type, and `FeedError::Protocol` if `type` is missing or not a
/// string.
pub fn classify(text: &str) -> FeedResult<InboundMessage> {
    let value: Value = serde_json::from_str(text).map_err(|e| FeedError::Parse {
        message: e.to_string(),
        payload: text.to_string(),
    })?;

    let tag = match value.get("type") {
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => {
            return Err(FeedError::Protocol {
                message: format!("message type is not a string: {}", other),
                payload: text.to_string(),
            });
        }
        None => {
            return Err(FeedError::Protocol {
                message: "message has no type".to_string(),
                payload: text.to_string(),
            });
        }
    };

    let Some(event_type) = EventType::from_tag(&tag) else {
        return Ok(InboundMessage::Unknown {
            tag,
            payload: text.to_string(),
        });
    };

    let message = match event_type {
        EventType::Received => InboundMessage::Received(decode(value, text)?),
        EventType::Open => InboundMessage::Open(decode(value, text)?),
        EventType::Done => InboundMessage::Done(decode(value, text)?),
        EventType::Match => InboundMessage::Match(decode(value, text)?),
        EventType::Change => InboundMessage::Change(decode(value, text)?),
        EventType::Error => {
            let mut error: ErrorMessage = decode(value, text)?;
            error.payload = Some(text.to_string());
            InboundMessage::Error(error)
        }
        // Heartbeat bodies are informational only; a malformed one is still a heartbeat.
        EventType::Heartbeat => {
            InboundMessage::Heartbeat(serde_json::from_value(value).unwrap_or_default())
        }
    };

    Ok(message)
}

fn decode<T: DeserializeOwned>(value: Value, text: &str) -> FeedResult<T> {
    serde_json::from_value(value).map_err(|e| FeedError::Parse {
        message: e.to_string(),
        payload: text.to_string(),
    })
}
