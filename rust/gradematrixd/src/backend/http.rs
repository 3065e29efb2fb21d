use crate::backend::{Backend, MatrixSource, PersistenceSink};
use crate::config::{HttpConfig, RetryPolicy};
use crate::matrix::model::{GradeOption, RawMatrix, SavePayload, SessionKey};
use anyhow::{anyhow, Context};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpBackend {
    base_url: String,
    matrix_path: String,
    catalog_path: String,
    save_path: String,
    retry: RetryPolicy,
    client: Client,
}

impl HttpBackend {
    pub fn new(cfg: &HttpConfig) -> anyhow::Result<Self> {
        let base_url = cfg
            .base_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("http backend needs a base url"))?;
        reqwest::Url::parse(&base_url).with_context(|| format!("invalid base url {base_url}"))?;

        let mut headers = HeaderMap::new();
        if let Some(token) = cfg.bearer_token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("invalid bearer token")?;
            headers.insert(AUTHORIZATION, value);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            base_url,
            matrix_path: cfg.matrix_path.clone(),
            catalog_path: cfg.catalog_path.clone(),
            save_path: cfg.save_path.clone(),
            retry: cfg.retry.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get_json_with_retry<T, F>(&self, what: &str, build: F) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match build().send() {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<T>()
                        .with_context(|| format!("failed to parse {what} response"));
                }
                Ok(resp) if !is_retryable(resp.status()) => {
                    return Err(anyhow!("{what} request failed status={}", resp.status()));
                }
                Ok(resp) => anyhow!("{what} request failed status={}", resp.status()),
                Err(e) => anyhow!("{what} request failed: {e}"),
            };
            if attempt >= max_attempts {
                return Err(failure);
            }
            warn!(attempt, error = %failure, "retrying {what}");
            std::thread::sleep(Duration::from_millis(
                self.retry.base_backoff_ms.saturating_mul(attempt as u64),
            ));
        }
    }
}

/// Only server-side failures may clear up on their own; a 4xx never will.
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
}

impl MatrixSource for HttpBackend {
    fn fetch_matrix(&self, key: &SessionKey) -> anyhow::Result<RawMatrix> {
        let url = self.url(&self.matrix_path);
        debug!(%url, session_id = key.session_id, "fetching matrix");
        self.get_json_with_retry("matrix", || {
            self.client.get(&url).query(&[
                ("sessionId", key.session_id),
                ("tenantId", key.tenant_id),
                ("courseId", key.course_id),
                ("branchId", key.branch_id),
            ])
        })
    }

    fn fetch_grade_catalog(&self, tenant_id: i64) -> anyhow::Result<Vec<GradeOption>> {
        let url = self.url(&self.catalog_path);
        debug!(%url, tenant_id, "fetching grade catalog");
        self.get_json_with_retry("grade catalog", || {
            self.client.get(&url).query(&[("tenantId", tenant_id)])
        })
    }
}

impl PersistenceSink for HttpBackend {
    // Never retried here: a resubmit is the user's call.
    fn save_matrix(&self, payload: &SavePayload) -> anyhow::Result<()> {
        let url = self.url(&self.save_path);
        let resp = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .with_context(|| format!("save request to {url} failed"))?;
        if !resp.status().is_success() {
            return Err(anyhow!("save rejected status={}", resp.status()));
        }
        Ok(())
    }
}

impl Backend for HttpBackend {
    fn kind(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cfg(base: Option<&str>) -> HttpConfig {
        HttpConfig {
            base_url: base.map(str::to_string),
            ..HttpConfig::default()
        }
    }

    #[test]
    fn base_url_is_required() {
        assert!(HttpBackend::new(&cfg(None)).is_err());
        assert!(HttpBackend::new(&cfg(Some("   "))).is_err());
        assert!(HttpBackend::new(&cfg(Some("not a url"))).is_err());
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let b = HttpBackend::new(&cfg(Some("https://api.school.test/v1/"))).expect("backend");
        assert_eq!(b.base_url(), "https://api.school.test/v1");
        assert_eq!(
            b.url("/assessment/matrix"),
            "https://api.school.test/v1/assessment/matrix"
        );
        assert_eq!(b.url("grades"), "https://api.school.test/v1/grades");
    }

    #[test]
    fn unreachable_host_surfaces_error_after_retries() {
        let mut c = cfg(Some("http://127.0.0.1:9"));
        c.timeout_secs = 1;
        c.retry = RetryPolicy {
            max_attempts: 2,
            base_backoff_ms: 1,
        };
        let b = HttpBackend::new(&c).expect("backend");
        let err = b.fetch_grade_catalog(1).expect_err("nothing listens on port 9");
        assert!(format!("{err:#}").contains("grade catalog request failed"));
    }

    /// Answers every connection with `status_line` and counts the requests.
    fn canned_server(status_line: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn backend_with_attempts(base: &str, max_attempts: usize) -> HttpBackend {
        let mut c = cfg(Some(base));
        c.timeout_secs = 2;
        c.retry = RetryPolicy {
            max_attempts,
            base_backoff_ms: 1,
        };
        HttpBackend::new(&c).expect("backend")
    }

    #[test]
    fn client_errors_are_not_retried() {
        let (base, hits) = canned_server("404 Not Found");
        let b = backend_with_attempts(&base, 3);
        let err = b.fetch_grade_catalog(1).expect_err("404");
        assert!(format!("{err:#}").contains("status=404"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn server_errors_are_retried_up_to_the_limit() {
        let (base, hits) = canned_server("503 Service Unavailable");
        let b = backend_with_attempts(&base, 3);
        let err = b.fetch_grade_catalog(1).expect_err("503");
        assert!(format!("{err:#}").contains("status=503"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn only_server_errors_are_retryable() {
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::TOO_MANY_REQUESTS));
    }
}
