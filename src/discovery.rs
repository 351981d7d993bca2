//! `.well-known/matrix/client` lookup.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::user_id::UserId;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("well-known lookup for {server} failed: {source}")]
    Http {
        server: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("well-known lookup for {server} returned status {status}")]
    Status { server: String, status: u16 },
    #[error("invalid well-known document for {server}: {source}")]
    Json {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("well-known document for {server} has no homeserver base_url")]
    MissingHomeserver { server: String },
    #[error("well-known document for {server} has an invalid base_url {url:?}: {source}")]
    InvalidBaseUrl {
        server: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub homeserver: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_server: Option<Url>,
}

#[derive(Debug, Deserialize)]
struct WellKnown {
    #[serde(rename = "m.homeserver")]
    homeserver: Option<ServerInformation>,
    #[serde(rename = "m.identity_server")]
    identity_server: Option<ServerInformation>,
}

#[derive(Debug, Deserialize)]
struct ServerInformation {
    base_url: Option<String>,
}

#[derive(Clone)]
pub struct DiscoveryResolver {
    http: Client,
    scheme: &'static str,
}

impl DiscoveryResolver {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            scheme: "https",
        }
    }

    /// Plain-http lookups, for local test servers.
    #[cfg(test)]
    pub fn plain_http(http: Client) -> Self {
        Self {
            http,
            scheme: "http",
        }
    }

    /// Performs exactly one lookup against the user's server name.
    pub async fn resolve(&self, user: &UserId) -> Result<DiscoveryResult, DiscoveryError> {
        let server = user.server_name().to_string();
        let url = format!("{}://{}/.well-known/matrix/client", self.scheme, server);
        tracing::debug!(%url, "resolving homeserver");

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(source) => return Err(DiscoveryError::Http { server, source }),
        };
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                server,
                status: status.as_u16(),
            });
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => return Err(DiscoveryError::Http { server, source }),
        };
        let document: WellKnown = match serde_json::from_str(&body) {
            Ok(document) => document,
            Err(source) => return Err(DiscoveryError::Json { server, source }),
        };

        let Some(homeserver) = base_url(&server, document.homeserver)? else {
            return Err(DiscoveryError::MissingHomeserver { server });
        };
        let identity_server = base_url(&server, document.identity_server)?;
        tracing::info!(homeserver = %homeserver, "discovered homeserver");

        Ok(DiscoveryResult {
            homeserver,
            identity_server,
        })
    }
}

fn base_url(server: &str, info: Option<ServerInformation>) -> Result<Option<Url>, DiscoveryError> {
    let Some(raw) = info
        .and_then(|info| info.base_url)
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
    else {
        return Ok(None);
    };
    Url::parse(&raw)
        .map(Some)
        .map_err(|source| DiscoveryError::InvalidBaseUrl {
            server: server.to_string(),
            url: raw,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve_well_known(response: ResponseTemplate) -> (MockServer, UserId) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/matrix/client"))
            .respond_with(response)
            .expect(1)
            .mount(&server)
            .await;
        let host = server.address().to_string();
        let user = UserId::parse(&format!("@alice:{host}")).expect("valid user id");
        (server, user)
    }

    #[tokio::test]
    async fn resolves_homeserver_and_identity_server() {
        let (_server, user) = serve_well_known(ResponseTemplate::new(200).set_body_json(json!({
            "m.homeserver": { "base_url": "https://matrix.example.org/" },
            "m.identity_server": { "base_url": "https://identity.example.org" }
        })))
        .await;

        let result = DiscoveryResolver::plain_http(Client::new())
            .resolve(&user)
            .await
            .expect("discovery");
        assert_eq!(result.homeserver.as_str(), "https://matrix.example.org/");
        assert_eq!(
            result.identity_server.map(|url| url.to_string()),
            Some("https://identity.example.org/".to_string())
        );
    }

    #[tokio::test]
    async fn identity_server_is_optional() {
        let (_server, user) = serve_well_known(ResponseTemplate::new(200).set_body_json(json!({
            "m.homeserver": { "base_url": "https://matrix.example.org" },
            "m.identity_server": { "base_url": "" }
        })))
        .await;

        let result = DiscoveryResolver::plain_http(Client::new())
            .resolve(&user)
            .await
            .expect("discovery");
        assert!(result.identity_server.is_none());
    }

    #[tokio::test]
    async fn missing_homeserver_is_an_error() {
        let (_server, user) = serve_well_known(ResponseTemplate::new(200).set_body_json(json!({
            "m.homeserver": { "base_url": "" }
        })))
        .await;

        let error = DiscoveryResolver::plain_http(Client::new())
            .resolve(&user)
            .await
            .expect_err("empty base_url");
        assert!(matches!(error, DiscoveryError::MissingHomeserver { .. }));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (_server, user) = serve_well_known(ResponseTemplate::new(404)).await;

        let error = DiscoveryResolver::plain_http(Client::new())
            .resolve(&user)
            .await
            .expect_err("404");
        assert!(matches!(error, DiscoveryError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn non_json_body_is_an_error() {
        let (_server, user) =
            serve_well_known(ResponseTemplate::new(200).set_body_string("<html></html>")).await;

        let error = DiscoveryResolver::plain_http(Client::new())
            .resolve(&user)
            .await
            .expect_err("html");
        assert!(matches!(error, DiscoveryError::Json { .. }));
    }

    #[tokio::test]
    async fn unparsable_base_url_is_an_error() {
        let (_server, user) = serve_well_known(ResponseTemplate::new(200).set_body_json(json!({
            "m.homeserver": { "base_url": "not a url" }
        })))
        .await;

        let error = DiscoveryResolver::plain_http(Client::new())
            .resolve(&user)
            .await
            .expect_err("bad url");
        assert!(matches!(error, DiscoveryError::InvalidBaseUrl { .. }));
    }
}
