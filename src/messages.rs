/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 16/10/26
******************************************************************************/

use crate::auth::{AUTH_REQUEST_METHOD, AUTH_REQUEST_PATH, SignatureBlock};
use crate::config::SubscriptionConfig;
use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const SUBSCRIBE_TYPE: &str = "subscribe";

// SUBSCRIBE
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub message_type: String,
    pub product_id: String,
    #[serde(flatten)]
    pub signature: Option<SignatureBlock>,
}

impl SubscribeRequest {
    pub fn public(product_id: &str) -> Self {
        Self {
            message_type: SUBSCRIBE_TYPE.to_string(),
            product_id: product_id.to_string(),
            signature: None,
        }
    }

    pub fn authenticated(product_id: &str, signature: SignatureBlock) -> Self {
        Self {
            signature: Some(signature),
            ..Self::public(product_id)
        }
    }

    /// Builds the request for one connection attempt.
    ///
    /// Authenticated configurations invoke the signer on every call.
    pub fn for_config(config: &SubscriptionConfig) -> FeedResult<Self> {
        match config.signer() {
            None => Ok(Self::public(config.product_id())),
            Some(signer) => {
                let block = signer.sign(AUTH_REQUEST_PATH, AUTH_REQUEST_METHOD, "")?;
                Ok(Self::authenticated(config.product_id(), block))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

// RECEIVED
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Received {
    pub product_id: String,
    pub time: Option<DateTime<Utc>>,
    pub sequence: Option<u64>,
    pub order_id: Option<String>,
    pub client_oid: Option<String>,
    pub order_type: Option<String>,
    pub side: Option<Side>,
    pub price: Option<Decimal>,
    pub size: Option<Decimal>,
    pub funds: Option<Decimal>,
}

// OPEN
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Open {
    pub product_id: String,
    pub time: Option<DateTime<Utc>>,
    pub sequence: Option<u64>,
    pub order_id: Option<String>,
    pub side: Option<Side>,
    pub price: Option<Decimal>,
    pub remaining_size: Option<Decimal>,
}

// DONE
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Done {
    pub product_id: String,
    pub time: Option<DateTime<Utc>>,
    pub sequence: Option<u64>,
    pub order_id: Option<String>,
    pub side: Option<Side>,
    pub price: Option<Decimal>,
    pub remaining_size: Option<Decimal>,
    /// `filled` or `canceled`.
    pub reason: Option<String>,
}

// MATCH
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Match {
    pub product_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub time: Option<DateTime<Utc>>,
    pub sequence: Option<u64>,
    pub trade_id: Option<u64>,
    pub maker_order_id: Option<String>,
    pub taker_order_id: Option<String>,
    pub side: Option<Side>,
}

// CHANGE
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Change {
    pub product_id: String,
    pub time: Option<DateTime<Utc>>,
    pub sequence: Option<u64>,
    pub order_id: Option<String>,
    pub side: Option<Side>,
    pub price: Option<Decimal>,
    pub new_size: Option<Decimal>,
    pub old_size: Option<Decimal>,
    pub new_funds: Option<Decimal>,
    pub old_funds: Option<Decimal>,
}

// HEARTBEAT
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Heartbeat {
    pub product_id: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub sequence: Option<u64>,
    pub last_trade_id: Option<u64>,
}

/// Value delivered on the Error channel.
///
/// Built either from an `error` frame sent by the feed or from a failure detected
/// locally. `payload` holds the raw frame text when the failure concerns one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub message: String,
    pub reason: Option<String>,
    #[serde(skip)]
    pub payload: Option<String>,
}

impl ErrorMessage {
    pub fn from_error(error: &FeedError) -> Self {
        Self {
            message: error.to_string(),
            reason: None,
            payload: error.payload().map(str::to_string),
        }
    }
}
