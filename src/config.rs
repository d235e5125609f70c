/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 16/10/26
******************************************************************************/

use crate::auth::{AUTH_REQUEST_PATH, HmacSigner, Signer};
use crate::error::{FeedError, FeedResult};
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Production feed address.
pub const WSS_ENDPOINT_URL: &str = "wss://ws-feed.gdax.com";
/// Sandbox feed address.
pub const WSS_SANDBOX_ENDPOINT_URL: &str = "wss://ws-feed-public.sandbox.gdax.com";

const ENV_PRODUCT: &str = "COINBASE_FEED_PRODUCT";
const ENV_SANDBOX: &str = "COINBASE_FEED_SANDBOX";
const ENV_API_KEY: &str = "COINBASE_API_KEY";
const ENV_API_SECRET: &str = "COINBASE_API_SECRET";
const ENV_API_PASSPHRASE: &str = "COINBASE_API_PASSPHRASE";

/// Which of the two fixed feed deployments to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    /// Maps a boolean sandbox switch onto an environment.
    ///
    /// # Arguments
    ///
    /// * `sandbox`: `true` selects `Environment::Sandbox`, `false` selects
    ///   `Environment::Production`.
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox {
            Environment::Sandbox
        } else {
            Environment::Production
        }
    }

    /// Base WebSocket address of the environment, without the authenticated path.
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Production => WSS_ENDPOINT_URL,
            Environment::Sandbox => WSS_SANDBOX_ENDPOINT_URL,
        }
    }
}

/// Immutable settings for one feed subscription.
///
/// A configuration without a signer selects the public feed; with a signer the
/// subscription signs every subscribe request and connects to the authenticated
/// path of the endpoint.
#[derive(Clone)]
pub struct SubscriptionConfig {
    product_id: String,
    signer: Option<Arc<dyn Signer>>,
    environment: Environment,
    endpoint: Option<Url>,
    reconnect_delay: Option<Duration>,
}

impl SubscriptionConfig {
    /// Creates a public-feed configuration for `product_id`.
    ///
    /// Fails with `FeedError::InvalidConfig` if the product identifier is blank.
    pub fn new(product_id: &str) -> FeedResult<Self> {
        let product_id = product_id.trim();
        if product_id.is_empty() {
            return Err(FeedError::InvalidConfig(
                "product identifier must not be empty".to_string(),
            ));
        }

        Ok(Self {
            product_id: product_id.to_string(),
            signer: None,
            environment: Environment::default(),
            endpoint: None,
            reconnect_delay: None,
        })
    }

    /// Builds a configuration from `COINBASE_FEED_*` and `COINBASE_API_*` variables.
    ///
    /// Credentials are only used when key, secret and passphrase are all set.
    pub fn from_env() -> FeedResult<Self> {
        let product_id = env::var(ENV_PRODUCT).map_err(|_| {
            FeedError::InvalidConfig(format!("environment variable {} is not set", ENV_PRODUCT))
        })?;
        let sandbox = env::var(ENV_SANDBOX)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let mut config =
            Self::new(&product_id)?.with_environment(Environment::from_sandbox_flag(sandbox));

        if let (Ok(key), Ok(secret), Ok(passphrase)) = (
            env::var(ENV_API_KEY),
            env::var(ENV_API_SECRET),
            env::var(ENV_API_PASSPHRASE),
        ) {
            config = config.with_signer(HmacSigner::new(&key, &secret, &passphrase)?);
        }

        Ok(config)
    }

    /// Switches the configuration to the authenticated feed.
    ///
    /// # Arguments
    ///
    /// * `signer`: Produces the signature block for every subscribe request. A
    ///   closure `Fn(&str, &str, &str) -> FeedResult<SignatureBlock>` works too.
    ///
    /// # Returns
    ///
    /// The configuration with the signer attached. Any previous signer is replaced.
    pub fn with_signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Selects the production or sandbox deployment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Replaces the environment's base address, e.g. with a local relay.
    ///
    /// # Arguments
    ///
    /// * `endpoint`: An absolute `ws://` or `wss://` URL.
    ///
    /// # Returns
    ///
    /// The updated configuration, or `FeedError::InvalidConfig` if the URL does not
    /// parse or uses another scheme.
    pub fn with_endpoint(mut self, endpoint: &str) -> FeedResult<Self> {
        let url = Url::parse(endpoint)?;
        match url.scheme() {
            "ws" | "wss" => {}
            scheme => {
                return Err(FeedError::InvalidConfig(format!(
                    "unsupported endpoint scheme: {}",
                    scheme
                )));
            }
        }
        self.endpoint = Some(url);
        Ok(self)
    }

    /// Waits `delay` before each reconnect. Without it reconnection is immediate.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// The trimmed product identifier, e.g. `BTC-USD`.
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// The signer of an authenticated configuration.
    pub fn signer(&self) -> Option<&dyn Signer> {
        self.signer.as_deref()
    }

    /// Whether the authenticated feed variant is selected.
    pub fn is_authenticated(&self) -> bool {
        self.signer.is_some()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Pause before each reconnect, `None` for immediate reconnection.
    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.reconnect_delay
    }

    /// Address the subscription connects to.
    ///
    /// Authenticated sessions use the authenticated sub-path of the base address.
    pub fn endpoint(&self) -> FeedResult<Url> {
        let base = match &self.endpoint {
            Some(url) => url.clone(),
            None => Url::parse(self.environment.base_url())?,
        };

        if self.is_authenticated() {
            Ok(base.join(AUTH_REQUEST_PATH)?)
        } else {
            Ok(base)
        }
    }
}

impl fmt::Debug for SubscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionConfig")
            .field("product_id", &self.product_id)
            .field("authenticated", &self.is_authenticated())
            .field("environment", &self.environment)
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("reconnect_delay", &self.reconnect_delay)
            .finish()
    }
}
