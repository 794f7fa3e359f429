//! Tarball availability probe against an npm-compatible registry.

use crate::types::{AuditOutcome, AuditStatus, AuditWorkItem, HttpConfig, Result};
use reqwest::Client;
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};

/// A single availability check for one work item.
///
/// Implementations must produce exactly one outcome per call and must not
/// panic on per-item failures; those belong in the outcome's status.
pub trait Prober: Send + Sync + 'static {
    fn probe(&self, item: &AuditWorkItem) -> impl Future<Output = AuditOutcome> + Send;
}

/// Probes `<registry>/<name>/-/<file>-<version>.tgz` with one GET per item.
pub struct RegistryProber {
    client: Client,
    registry_url: String,
    access_token: Option<String>,
}

impl RegistryProber {
    /// Create a prober. An empty token is treated as no token.
    pub fn new(registry_url: &str, access_token: Option<String>, http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(&http.user_agent)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            registry_url: registry_url.trim_end_matches('/').to_string(),
            access_token: access_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Perform the check. Never retries.
    pub async fn check(&self, item: &AuditWorkItem) -> AuditOutcome {
        let Some(url) = tarball_url(&self.registry_url, &item.name, &item.version) else {
            debug!("Invalid scoped package name: {}", item.name);
            return AuditOutcome::failed(
                item,
                AuditStatus::InvalidIdentity,
                "invalid scoped package format",
            );
        };
        trace!("Probing {}", url);

        let mut request = self.client.get(&url);
        if let Some(ref token) = self.access_token {
            request = request.bearer_auth(token);
        }

        // The body is never read; only the status matters.
        match request.send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                let status = classify_status(code);
                debug!("{}@{} -> {}", item.name, item.version, code);
                AuditOutcome::from_response(item, status, code)
            }
            Err(e) => {
                debug!("Request for {}@{} failed: {}", item.name, item.version, e);
                AuditOutcome::failed(item, AuditStatus::RequestFailed, error_chain(&e))
            }
        }
    }
}

impl Prober for RegistryProber {
    async fn probe(&self, item: &AuditWorkItem) -> AuditOutcome {
        self.check(item).await
    }
}

/// Tarball URL for `name@version`, or `None` for a scoped name with no `/`.
///
/// Scoped packages use only the segment after the last `/` in the file
/// name: `@scope/pkg` 1.0.0 -> `<base>/@scope/pkg/-/pkg-1.0.0.tgz`.
pub fn tarball_url(registry_url: &str, name: &str, version: &str) -> Option<String> {
    let base = registry_url.trim_end_matches('/');

    let file_stem = if name.starts_with('@') {
        let (_, last) = name.rsplit_once('/')?;
        last
    } else {
        name
    };

    Some(format!("{}/{}/-/{}-{}.tgz", base, name, file_stem, version))
}

/// Map an HTTP status code to an audit status.
pub fn classify_status(code: u16) -> AuditStatus {
    match code {
        200 => AuditStatus::Available,
        403 => AuditStatus::Blocked,
        404 => AuditStatus::NotFound,
        _ => AuditStatus::Unexpected,
    }
}

/// Render an error with its sources, e.g. the connect error behind a
/// reqwest failure.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(name: &str, version: &str) -> AuditWorkItem {
        AuditWorkItem {
            name: name.to_string(),
            version: version.to_string(),
            origin: Origin::Declared,
            position: 0,
        }
    }

    fn prober(base: &str, token: Option<&str>) -> RegistryProber {
        RegistryProber::new(base, token.map(str::to_string), &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_tarball_url_unscoped() {
        assert_eq!(
            tarball_url("https://registry.npmjs.org", "left-pad", "1.3.0").as_deref(),
            Some("https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz")
        );
    }

    #[test]
    fn test_tarball_url_scoped() {
        assert_eq!(
            tarball_url("https://registry.npmjs.org/", "@scope/pkg", "1.0.0").as_deref(),
            Some("https://registry.npmjs.org/@scope/pkg/-/pkg-1.0.0.tgz")
        );
    }

    #[test]
    fn test_tarball_url_invalid_scope() {
        assert_eq!(tarball_url("https://registry.npmjs.org", "@scope", "1.0.0"), None);
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), AuditStatus::Available);
        assert_eq!(classify_status(403), AuditStatus::Blocked);
        assert_eq!(classify_status(404), AuditStatus::NotFound);
        assert_eq!(classify_status(500), AuditStatus::Unexpected);
        assert_eq!(classify_status(204), AuditStatus::Unexpected);
    }

    #[tokio::test]
    async fn test_probe_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/left-pad/-/left-pad-1.3.0.tgz"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = prober(&server.uri(), None).probe(&item("left-pad", "1.3.0")).await;

        assert_eq!(outcome.status, AuditStatus::NotFound);
        assert_eq!(outcome.status_code, Some(404));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_scoped_available() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/@scope/pkg/-/pkg-1.0.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = prober(&server.uri(), None).probe(&item("@scope/pkg", "1.0.0")).await;

        assert_eq!(outcome.name, "@scope/pkg");
        assert_eq!(outcome.status, AuditStatus::Available);
        assert_eq!(outcome.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_probe_blocked_and_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocked/-/blocked-1.0.0.tgz"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky/-/flaky-1.0.0.tgz"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let prober = prober(&server.uri(), None);

        let blocked = prober.probe(&item("blocked", "1.0.0")).await;
        assert_eq!(blocked.status, AuditStatus::Blocked);
        assert_eq!(blocked.status_code, Some(403));

        let flaky = prober.probe(&item("flaky", "1.0.0")).await;
        assert_eq!(flaky.status, AuditStatus::Unexpected);
        assert_eq!(flaky.status_code, Some(502));
    }

    #[tokio::test]
    async fn test_probe_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/abbrev/-/abbrev-1.1.1.tgz"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = prober(&server.uri(), Some("secret-token"))
            .probe(&item("abbrev", "1.1.1"))
            .await;

        assert_eq!(outcome.status, AuditStatus::Available);
    }

    #[tokio::test]
    async fn test_empty_token_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer "))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let outcome = prober(&server.uri(), Some("")).probe(&item("abbrev", "1.1.1")).await;
        assert_eq!(outcome.status, AuditStatus::Available);
    }

    #[tokio::test]
    async fn test_invalid_identity_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = prober(&server.uri(), None).probe(&item("@noslash", "1.0.0")).await;

        assert_eq!(outcome.status, AuditStatus::InvalidIdentity);
        assert_eq!(outcome.status_code, None);
        assert_eq!(outcome.error.as_deref(), Some("invalid scoped package format"));
    }

    #[tokio::test]
    async fn test_connection_failure() {
        // Nothing listens on port 1.
        let outcome = prober("http://127.0.0.1:1", None)
            .probe(&item("left-pad", "1.3.0"))
            .await;

        assert_eq!(outcome.status, AuditStatus::RequestFailed);
        assert_eq!(outcome.status_code, None);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_timeout_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let http = HttpConfig {
            timeout_secs: 1,
            ..HttpConfig::default()
        };
        let prober = RegistryProber::new(&server.uri(), None, &http).unwrap();
        let outcome = prober.probe(&item("slow", "1.0.0")).await;

        assert_eq!(outcome.status, AuditStatus::RequestFailed);
    }
}
