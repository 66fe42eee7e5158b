//! Authenticated HTTP transport for the game portal.
//!
//! A session is bootstrapped in two steps: a plain GET of the portal landing
//! page to collect session cookies, then a POST of the login form to the auth
//! endpoint. Every later call is an XHR-style GET carrying the session's
//! `csrf_token` cookie value as a query parameter.
//!
//! Timed-out requests are retried after a fixed pause and never reach the
//! core. Any other transport failure surfaces as a [`GatewayError::Http`].

use std::sync::Arc;
use std::time::Duration;

use adept_core::gateway::{GameGateway, GatewayError, RawResponse};
use adept_types::{FollowerId, MissionId, ProgressId};
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, error, info, warn};

use crate::config::{AuthConfig, RunnerConfig};
use crate::error::RunnerError;

/// Name of the anti-forgery cookie echoed back as a query parameter.
const CSRF_COOKIE: &str = "csrf_token";

/// Header marking a request as an in-page XHR call.
const X_REQUESTED_WITH: &str = "X-Requested-With";

/// A [`GameGateway`] speaking HTTP to the live portal.
#[derive(Debug)]
pub struct HttpGateway {
    client: reqwest::Client,
    jar: Arc<Jar>,
    auth: AuthConfig,
    portal_url: Url,
    auth_url: Url,
    hero_bag_url: Url,
    check_url: Option<Url>,
    request_timeout: Duration,
    timeout_retry_delay: Duration,
    auth_retry_delay: Duration,
}

impl HttpGateway {
    /// Build a gateway with an empty cookie jar. No request is made yet.
    pub fn new(config: &RunnerConfig) -> Result<Self, RunnerError> {
        let parse = |field: &str, url: &str| {
            Url::parse(url).map_err(|e| RunnerError::Http(format!("invalid {field} `{url}`: {e}")))
        };
        let jar = Arc::new(Jar::default());
        let request_timeout = config.polling.request_timeout();
        let client = build_client(&jar, request_timeout, config.auth.user_agent.as_deref())
            .map_err(|e| RunnerError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            jar,
            auth: config.auth.clone(),
            portal_url: parse("portal URL", &config.endpoints.portal_url)?,
            auth_url: parse("auth URL", &config.endpoints.auth_url)?,
            hero_bag_url: parse("HeroBag URL", &config.endpoints.hero_bag_url)?,
            check_url: config
                .admin
                .check_url
                .as_deref()
                .map(|url| parse("check URL", url))
                .transpose()?,
            request_timeout,
            timeout_retry_delay: config.polling.timeout_retry_delay(),
            auth_retry_delay: config.polling.auth_retry_delay(),
        })
    }

    /// Log in, retrying until the portal accepts the session bootstrap.
    pub async fn start(&mut self) {
        loop {
            match self.authenticate().await {
                Ok(()) => return,
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in_secs = self.auth_retry_delay.as_secs(),
                        "authentication failed"
                    );
                    tokio::time::sleep(self.auth_retry_delay).await;
                }
            }
        }
    }

    /// Run the two-step login against the current cookie jar.
    async fn authenticate(&self) -> Result<(), reqwest::Error> {
        info!(portal = %self.portal_url, "opening portal session");
        self.client.get(self.portal_url.clone()).send().await?;

        info!(login = self.auth.login.as_str(), "submitting login form");
        let form = [
            ("Page", self.auth.page.as_str()),
            ("Login", self.auth.login.as_str()),
            ("Domain", self.auth.domain.as_str()),
            ("Password", self.auth.password.as_str()),
            ("saveauth", "0"),
        ];
        self.client
            .post(self.auth_url.clone())
            .form(&form)
            .send()
            .await?;

        if self.csrf_token().is_none() {
            warn!("login finished without a csrf_token cookie");
        }
        Ok(())
    }

    /// Current `csrf_token` cookie value for the portal, if any.
    fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.portal_url)?;
        let header = header.to_str().ok()?;
        cookie_value(header, CSRF_COOKIE).map(ToOwned::to_owned)
    }

    /// Resolve an action link, which the portal may hand out relative.
    fn resolve(&self, link: &str) -> Result<Url, GatewayError> {
        self.portal_url.join(link).map_err(|e| GatewayError::Http {
            message: format!("invalid action link `{link}`: {e}"),
        })
    }

    /// XHR GET with the session token, retrying timeouts indefinitely.
    async fn xhr_get(&self, url: Url, mut query: Vec<(&str, String)>) -> Result<RawResponse, GatewayError> {
        match self.csrf_token() {
            Some(token) => query.push((CSRF_COOKIE, token)),
            None => warn!(url = %url, "no csrf_token cookie, sending request without it"),
        }

        loop {
            debug!(url = %url, params = query.len(), "sending request");
            let sent = self
                .client
                .get(url.clone())
                .header(ACCEPT, "application/json")
                .header(X_REQUESTED_WITH, "XMLHttpRequest")
                .query(&query)
                .send()
                .await;
            let response = match sent {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    self.pause_after_timeout(&url).await;
                    continue;
                }
                Err(e) => return Err(http_error(&e)),
            };

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(ToOwned::to_owned);
            match response.text().await {
                Ok(body) => {
                    return Ok(RawResponse {
                        status,
                        content_type,
                        body,
                    });
                }
                Err(e) if e.is_timeout() => self.pause_after_timeout(&url).await,
                Err(e) => return Err(http_error(&e)),
            }
        }
    }

    async fn pause_after_timeout(&self, url: &Url) {
        warn!(
            url = %url,
            timeout_secs = self.request_timeout.as_secs(),
            retry_in_secs = self.timeout_retry_delay.as_secs(),
            "request timed out, retrying"
        );
        tokio::time::sleep(self.timeout_retry_delay).await;
    }
}

impl GameGateway for HttpGateway {
    async fn fetch_snapshot(&mut self) -> Result<RawResponse, GatewayError> {
        self.xhr_get(self.hero_bag_url.clone(), Vec::new()).await
    }

    async fn finish_progress(
        &mut self,
        link: &str,
        progress: ProgressId,
    ) -> Result<RawResponse, GatewayError> {
        let url = self.resolve(link)?;
        self.xhr_get(url, vec![("progressId", progress.to_string())]).await
    }

    async fn start_mission(
        &mut self,
        link: &str,
        mission: MissionId,
        followers: &[FollowerId],
    ) -> Result<RawResponse, GatewayError> {
        let url = self.resolve(link)?;
        self.xhr_get(url, start_query(mission, followers)).await
    }

    async fn reauthenticate(&mut self) -> Result<(), GatewayError> {
        info!("dropping session cookies and logging in again");
        let jar = Arc::new(Jar::default());
        self.client = build_client(&jar, self.request_timeout, self.auth.user_agent.as_deref())
            .map_err(|e| GatewayError::AuthFailed {
                message: e.to_string(),
            })?;
        self.jar = jar;
        self.authenticate()
            .await
            .map_err(|e| GatewayError::AuthFailed {
                message: e.to_string(),
            })
    }

    async fn ping_health(&mut self) -> Result<(), GatewayError> {
        let Some(url) = self.check_url.clone() else {
            return Ok(());
        };
        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| http_error(&e))?;
        debug!("health check pinged");
        Ok(())
    }
}

fn build_client(
    jar: &Arc<Jar>,
    timeout: Duration,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .cookie_provider(Arc::clone(jar))
        .timeout(timeout);
    if let Some(user_agent) = user_agent {
        builder = builder.user_agent(user_agent.to_owned());
    }
    builder.build()
}

fn http_error(e: &reqwest::Error) -> GatewayError {
    GatewayError::Http {
        message: e.to_string(),
    }
}

/// Query for a start action: one `followerId` per follower, then `questId`.
fn start_query(mission: MissionId, followers: &[FollowerId]) -> Vec<(&'static str, String)> {
    followers
        .iter()
        .map(|id| ("followerId", id.to_string()))
        .chain(std::iter::once(("questId", mission.to_string())))
        .collect()
}

/// Find `name` in a `Cookie` header value (`a=1; b=2`).
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
