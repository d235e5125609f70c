//! # coinbase-feed
//!
//! `coinbase-feed` is a Rust client for the Coinbase Exchange (formerly GDAX) real-time
//! WebSocket feed. It keeps one subscription per product alive for as long as you want
//! it: it connects, sends the subscribe request (signed, for the authenticated feed),
//! classifies every inbound message and hands it to the listeners you registered. When
//! the transport fails it reconnects and re-subscribes on its own.
//!
//! ## Features
//!
//! - Public and authenticated feed variants, production and sandbox endpoints
//! - HMAC-SHA256 request signing, recomputed on every connection attempt
//! - Typed `received`, `open`, `done`, `match`, `change` and `error` messages
//! - Multiple listeners per event category, invoked in registration order
//! - Malformed messages reported without dropping a healthy connection
//! - Cooperative cancellation with `unsubscribe`
//!
//! ## Example
//!
//! ```rust,no_run
//! use coinbase_feed::{FeedSubscription, SubscriptionConfig};
//! use std::error::Error;
//! use std::time::Duration;
//! use tokio::time::sleep;
//! use tracing::{info, warn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error>> {
//!     let config = SubscriptionConfig::new("BTC-USD")?;
//!     let subscription = FeedSubscription::new(config);
//!
//!     subscription.on_match(|m| {
//!         info!("Match: {} {} @ {}", m.product_id, m.size, m.price);
//!     });
//!     subscription.on_error(|e| {
//!         warn!("Feed error: {}", e.message);
//!     });
//!
//!     // Runs in its own task, returns immediately
//!     subscription.subscribe();
//!
//!     sleep(Duration::from_secs(60)).await;
//!
//!     subscription.unsubscribe();
//!     subscription.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Authenticated feed
//!
//! Attach a signer to subscribe to the authenticated variant of the feed. The request
//! is signed for `GET /users/self` and sent to that path of the endpoint:
//!
//! ```rust,no_run
//! use coinbase_feed::{Environment, HmacSigner, SubscriptionConfig};
//!
//! # fn build() -> coinbase_feed::error::FeedResult<SubscriptionConfig> {
//! let signer = HmacSigner::new("api-key", "c2VjcmV0", "passphrase")?;
//! let config = SubscriptionConfig::new("BTC-USD")?
//!     .with_environment(Environment::Sandbox)
//!     .with_signer(signer);
//! # Ok(config)
//! # }
//! ```
//!
//! Authenticated feed messages do not increment the sequence number, so it is not
//! possible to detect a dropped authenticated message.
//!
//! ## Error Handling
//!
//! Nothing inside the subscription task is escalated to the caller. Connect and
//! transport failures, malformed frames and frames without a usable `type` are all
//! delivered through the Error channel as [`ErrorMessage`] values:
//!
//! ```rust,no_run
//! use coinbase_feed::FeedSubscription;
//! use tracing::error;
//!
//! # fn example(subscription: &FeedSubscription) {
//! subscription.on_error(|e| match &e.payload {
//!     Some(raw) => error!("{} ({})", e.message, raw),
//!     None => error!("{}", e.message),
//! });
//! # }
//! ```
//!
//! ## License
//!
//! This project is licensed under the MIT License.

/// Request signing for the authenticated feed.
///
/// Defines the `Signer` capability consumed by the subscription, the
/// `SignatureBlock` it produces, and `HmacSigner`, which signs with API credentials.
pub mod auth;

/// Subscription settings.
///
/// `SubscriptionConfig` holds the product, the optional signer, the endpoint
/// selection and the reconnect policy.
pub mod config;

/// WebSocket transport for a single feed session.
///
/// `FeedConnection` connects, sends text frames, receives one frame at a time and
/// closes. Transport failures surface as `FeedError::Transport`.
pub mod connection;

/// Error handling module.
///
/// Defines `FeedError`, covering connect and transport failures, malformed messages,
/// protocol violations, signing failures, invalid configuration and cancellation.
pub mod error;

/// Classification of inbound frames.
///
/// Provides the `InboundMessage` union and `classify`, which turns frame text into
/// one of its variants.
pub mod events;

/// Event listener registration and dispatch.
pub mod handlers;

/// Wire message structures.
///
/// Contains the outbound subscribe request and the records built from inbound
/// `received`, `open`, `done`, `match`, `change`, `heartbeat` and `error` messages.
pub mod messages;

/// The reconnecting subscription loop.
pub mod subscription;

pub use auth::{HmacSigner, SignatureBlock, Signer};
pub use config::{Environment, SubscriptionConfig};
pub use connection::{FeedConnection, Frame};
pub use error::{FeedError, FeedResult};
pub use events::{EventType, InboundMessage, classify};
pub use messages::{
    Change, Done, ErrorMessage, Heartbeat, Match, Open, Received, Side, SubscribeRequest,
};
pub use subscription::{FeedSubscription, SubscriptionState};
