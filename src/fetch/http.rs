//! HTTP portal sessions
//!
//! Each session is a dedicated `reqwest::Client` with its own cookie store,
//! so nothing a failed attempt left behind (cookies, pooled connections)
//! leaks into the next one. The amount is read from the `value` attribute of
//! the server-rendered amount field.

use crate::config::PortalConfig;
use crate::error::{FetchError, FetchResult};
use crate::fetch::{FetchSession, SessionProvider};
use crate::normalize::parse_amount;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("portal-reconcile/", env!("CARGO_PKG_VERSION"));

/// Session provider for the billing portal
pub struct HttpPortal {
    config: Arc<PortalConfig>,
    extractor: Arc<AmountExtractor>,
}

impl HttpPortal {
    /// Create a provider for the given routing settings
    pub fn new(config: PortalConfig) -> Self {
        let extractor = AmountExtractor::new(&config.amount_element);
        Self {
            config: Arc::new(config),
            extractor: Arc::new(extractor),
        }
    }

    fn tuned_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .connect_timeout(self.config.connect_timeout)
            .default_headers(default_headers())
            .build()
    }

    fn fallback_client() -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder().cookie_store(true).build()
    }
}

fn default_headers() -> reqwest::header::HeaderMap {
    use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ar"));
    headers
}

#[async_trait]
impl SessionProvider for HttpPortal {
    type Session = HttpSession;

    async fn create(&self) -> FetchResult<HttpSession> {
        let client = match self.tuned_client() {
            Ok(client) => client,
            Err(primary) => {
                warn!(error = %primary, "Tuned client failed, trying fallback provisioning");
                Self::fallback_client().map_err(|fallback| {
                    FetchError::Provision(format!("{}; fallback: {}", primary, fallback))
                })?
            }
        };

        Ok(HttpSession {
            client: Some(client),
            config: Arc::clone(&self.config),
            extractor: Arc::clone(&self.extractor),
        })
    }
}

/// One portal session
pub struct HttpSession {
    client: Option<reqwest::Client>,
    config: Arc<PortalConfig>,
    extractor: Arc<AmountExtractor>,
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn fetch_value(&mut self, account: &str) -> FetchResult<Option<f64>> {
        let client = self.client.as_ref().ok_or(FetchError::SessionClosed)?;
        let url = self.config.url_for(account);
        debug!(account, url = %url, "Requesting portal page");

        let response = client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                account: account.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(self.extractor.extract(&body))
    }

    fn destroy(&mut self) {
        // Dropping the client closes its pooled connections and cookie jar
        self.client.take();
    }
}

/// Finds the amount field in a portal page
#[derive(Debug)]
pub struct AmountExtractor {
    element: Regex,
    value: Regex,
}

impl AmountExtractor {
    /// Build an extractor for the element with the given id
    pub fn new(element_id: &str) -> Self {
        let id = regex::escape(element_id);
        let element =
            Regex::new(&format!(r#"(?is)<[a-z]+\b[^>]*\sid\s*=\s*["']{}["'][^>]*>"#, id))
                .expect("Invalid amount element regex");
        let value = Regex::new(r#"(?is)\svalue\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("Invalid value attribute regex");
        Self { element, value }
    }

    /// Extract the amount, `None` when the element is absent
    ///
    /// A present element with an empty value reads as zero.
    pub fn extract(&self, html: &str) -> Option<f64> {
        let tag = self.element.find(html)?.as_str();
        let raw = self
            .value
            .captures(tag)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str())
            .unwrap_or("");
        Some(parse_amount(raw))
    }
}
