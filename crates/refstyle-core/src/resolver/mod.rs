//! Network lookup of DOIs and URLs.
//!
//! Lookups are optional and never fail the caller: anything short of a
//! definite answer from the server becomes [`LinkStatus::Unverified`].

pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::links::{LinkCheck, LinkKind, LinkStatus, host_of};
use crate::rate_limit::{HostRateLimiters, LinkQueryError, check_rate_limit_response};

const USER_AGENT: &str = concat!("refstyle/", env!("CARGO_PKG_VERSION"));

/// Resolves a link and reports the final HTTP status code.
pub trait LinkResolver: Send + Sync {
    /// Short name for logs (e.g. "http").
    fn name(&self) -> &str;

    /// Fetch `target` and return the HTTP status of the response.
    fn resolve<'a>(
        &'a self,
        target: &'a str,
        kind: LinkKind,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<u16, LinkQueryError>> + Send + 'a>>;
}

/// [`LinkResolver`] backed by a shared `reqwest` client.
pub struct HttpResolver {
    client: reqwest::Client,
}

impl HttpResolver {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl LinkResolver for HttpResolver {
    fn name(&self) -> &str {
        "http"
    }

    fn resolve<'a>(
        &'a self,
        target: &'a str,
        kind: LinkKind,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<u16, LinkQueryError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = match kind {
                LinkKind::Doi => {
                    self.client
                        .get(target)
                        .header("Accept", "application/vnd.citationstyles.csl+json")
                        .timeout(timeout)
                        .send()
                        .await
                }
                LinkKind::Url => {
                    let head = self.client.head(target).timeout(timeout).send().await;
                    match head {
                        // Some servers refuse HEAD; retry those with GET
                        Ok(r) if matches!(r.status().as_u16(), 403 | 405 | 501) => {
                            self.client.get(target).timeout(timeout).send().await
                        }
                        other => other,
                    }
                }
            }
            .map_err(|e| {
                if e.is_timeout() {
                    LinkQueryError::Other("request timed out".into())
                } else {
                    LinkQueryError::Other(format!("request failed: {}", e))
                }
            })?;

            check_rate_limit_response(&resp)?;
            Ok(resp.status().as_u16())
        })
    }
}

/// Map a lookup result to a link status.
fn status_from_result(result: Result<u16, LinkQueryError>) -> LinkStatus {
    match result {
        Ok(code) if (200..400).contains(&code) => LinkStatus::Valid,
        Ok(code @ (404 | 410)) => LinkStatus::invalid(format!("not found (HTTP {})", code)),
        Ok(code) => LinkStatus::unverified(format!("HTTP {}", code)),
        Err(e) => LinkStatus::unverified(e.to_string()),
    }
}

async fn resolve_with_timeout(
    resolver: &dyn LinkResolver,
    target: &str,
    kind: LinkKind,
    timeout: Duration,
) -> Result<u16, LinkQueryError> {
    match tokio::time::timeout(timeout, resolver.resolve(target, kind, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(LinkQueryError::Other(format!(
            "timed out after {:.1}s",
            timeout.as_secs_f64()
        ))),
    }
}

/// Verify one link over the network.
///
/// 1. Links that failed the syntax check keep their `Invalid` status.
/// 2. Waits for the target host's limiter.
/// 3. Resolves under `timeout`.
/// 4. On 429: slows the host's limiter, honors Retry-After (capped at
///    `timeout`) and retries once.
///
/// Timeouts, connection errors and unexpected statuses yield `Unverified`.
pub async fn verify_link(
    link: &LinkCheck,
    resolver: &dyn LinkResolver,
    limiters: &HostRateLimiters,
    timeout: Duration,
) -> LinkStatus {
    if let LinkStatus::Invalid { .. } = link.status {
        return link.status.clone();
    }
    let Some(target) = link.lookup_url() else {
        return LinkStatus::invalid(format!("malformed {}", link.kind.label()));
    };
    let Some(host) = host_of(&target) else {
        return LinkStatus::invalid(format!("malformed {}", link.kind.label()));
    };

    let limiter = limiters.get(&host);
    limiter.acquire().await;

    let result = match resolve_with_timeout(resolver, &target, link.kind, timeout).await {
        Err(LinkQueryError::RateLimited { retry_after }) => {
            limiter.on_rate_limited();

            let wait = retry_after.unwrap_or(Duration::from_secs(2)).min(timeout);
            tracing::info!(
                host = %host,
                "429 rate limited, waiting {:.1}s then retrying",
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
            limiter.acquire().await;

            // Single retry; a second 429 becomes Unverified
            resolve_with_timeout(resolver, &target, link.kind, timeout).await
        }
        other => other,
    };

    if let Err(e) = &result {
        tracing::warn!(resolver = resolver.name(), target = %target, "link lookup failed: {}", e);
    }
    status_from_result(result)
}

/// Verify every link in `links` in order, updating their status in place.
pub async fn verify_links(
    links: &mut [LinkCheck],
    resolver: &dyn LinkResolver,
    limiters: &HostRateLimiters,
    timeout: Duration,
) {
    for link in links.iter_mut() {
        link.status = verify_link(link, resolver, limiters, timeout).await;
    }
}
