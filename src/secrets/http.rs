//! Secret store client over HTTPS.
//!
//! # Wire Format
//! ```text
//! GET {endpoint}/secrets/{name}   → 200 {"value": "..."} | 404
//! GET {endpoint}/secrets          → 200 {"value": [{"id": ".../secrets/{name}"}], "nextLink": "..."}
//! Authorization: Bearer {token}   (when a token is configured)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::store::{SecretError, SecretStore};

/// Upper bound on `nextLink` pages followed by [`HttpSecretStore::list`].
const MAX_LIST_PAGES: usize = 100;

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

#[derive(Deserialize)]
struct SecretItem {
    id: String,
}

#[derive(Deserialize)]
struct SecretPage {
    #[serde(default)]
    value: Vec<SecretItem>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

/// Remote secret store reached over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpSecretStore {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
    request_timeout: Duration,
}

impl HttpSecretStore {
    /// Create a client. No network I/O happens here.
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SecretError> {
        let mut endpoint: Url = endpoint.trim().parse().map_err(|e: url::ParseError| {
            SecretError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        })?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| SecretError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            token,
            request_timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn fetch(&self, url: Url) -> Result<reqwest::Response, SecretError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request.send().await.map_err(|e| self.map_error(e))
    }

    fn map_error(&self, error: reqwest::Error) -> SecretError {
        if error.is_timeout() {
            SecretError::Timeout(self.request_timeout)
        } else {
            SecretError::Transport(error.to_string())
        }
    }

    fn url_for(&self, path: &str) -> Result<Url, SecretError> {
        self.endpoint
            .join(path)
            .map_err(|e| SecretError::Malformed(format!("cannot build URL for '{path}': {e}")))
    }
}

fn check_status(status: StatusCode) -> Result<(), SecretError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SecretError::Unauthorized(status.as_u16()));
    }
    if !status.is_success() {
        return Err(SecretError::Transport(format!("unexpected status {status}")));
    }
    Ok(())
}

/// Secret name is the last path segment of an item id.
fn name_from_id(id: &str) -> Option<String> {
    id.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    fn name(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        let url = self.url_for(&format!("secrets/{name}"))?;
        let response = self.fetch(url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(response.status())?;

        let bundle: SecretBundle = response
            .json()
            .await
            .map_err(|e| SecretError::Malformed(e.to_string()))?;
        Ok(Some(bundle.value))
    }

    async fn list(&self) -> Result<Vec<String>, SecretError> {
        let mut names = Vec::new();
        let mut next = Some(self.url_for("secrets")?);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_LIST_PAGES {
                tracing::warn!(store = %self.endpoint, "secret listing truncated after {MAX_LIST_PAGES} pages");
                break;
            }

            let response = self.fetch(url).await?;
            check_status(response.status())?;
            let page: SecretPage = response
                .json()
                .await
                .map_err(|e| SecretError::Malformed(e.to_string()))?;

            names.extend(page.value.iter().filter_map(|item| name_from_id(&item.id)));
            next = match page.next_link {
                Some(link) => Some(
                    link.parse()
                        .map_err(|e: url::ParseError| SecretError::Malformed(e.to_string()))?,
                ),
                None => None,
            };
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_endpoint_rejected() {
        let err = HttpSecretStore::new("not a url", None, Duration::from_secs(1), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, SecretError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_endpoint_path_normalised() {
        let store = HttpSecretStore::new(
            "https://vault.example/tenant",
            None,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            store.url_for("secrets/a--b").unwrap().as_str(),
            "https://vault.example/tenant/secrets/a--b"
        );
    }

    #[test]
    fn test_name_from_id() {
        assert_eq!(
            name_from_id("https://vault.example/secrets/logging--remote--uri"),
            Some("logging--remote--uri".to_string())
        );
        assert_eq!(name_from_id(""), None);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(check_status(StatusCode::FORBIDDEN), Err(SecretError::Unauthorized(403))));
        assert!(matches!(check_status(StatusCode::BAD_GATEWAY), Err(SecretError::Transport(_))));
        assert!(check_status(StatusCode::OK).is_ok());
    }
}
