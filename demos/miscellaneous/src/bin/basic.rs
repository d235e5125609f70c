use coinbase_feed::{FeedSubscription, SubscriptionConfig};
use std::error::Error;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Configure logging
    tracing_subscriber::fmt::init();

    // COINBASE_FEED_PRODUCT, COINBASE_FEED_SANDBOX and optional COINBASE_API_* credentials
    let config = match SubscriptionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!("{}, falling back to the public BTC-USD feed", e);
            SubscriptionConfig::new("BTC-USD")?
        }
    };
    info!("Starting subscription: {:?}", config);

    let subscription = FeedSubscription::new(config);

    subscription.on_match(|m| {
        info!(
            "Match {}: {} @ {} ({:?})",
            m.product_id, m.size, m.price, m.side
        );
    });

    subscription.on_done(|d| {
        info!(
            "Done {}: order {:?} {:?}",
            d.product_id, d.order_id, d.reason
        );
    });

    subscription.on_error(|e| {
        warn!("Feed error: {}", e.message);
    });

    subscription.subscribe();
    info!("Subscribed, listening for 30 seconds...");

    sleep(Duration::from_secs(30)).await;

    info!(
        "Heartbeats seen: {}, unsubscribing",
        subscription.heartbeat_count()
    );
    subscription.unsubscribe();
    subscription.wait().await;

    info!("Subscription stopped");
    Ok(())
}
