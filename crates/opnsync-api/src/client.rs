// Management API HTTP client
//
// Wraps `reqwest::Client` with OPNsense URL construction, basic auth
// and JSON-object body decoding. Endpoint semantics (which path, which
// payload key, which status field) belong to the caller; this module
// only moves attribute maps over the wire.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// A JSON object as returned by every management endpoint.
pub type JsonObject = Map<String, Value>;

/// API key/secret pair. OPNsense sends these as HTTP basic auth.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub key: SecretString,
    pub secret: SecretString,
}

impl ApiCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: SecretString::from(key.into()),
            secret: SecretString::from(secret.into()),
        }
    }
}

/// Authenticated client for one appliance.
///
/// All paths are relative to `{base_url}/api/`, e.g.
/// `haproxy/settings/searchAcls` or `trust/crl/get/{caref}`.
#[derive(Debug)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<ApiCredentials>,
}

impl DeviceClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the appliance root (e.g. `https://192.0.2.1`).
    pub fn new(
        base_url: Url,
        credentials: ApiCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            credentials: Some(credentials),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// Credentials are optional here so tests can talk to a mock server
    /// without auth.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Option<ApiCredentials>,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    /// The appliance base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{path}`.
    pub fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON object body.
    pub async fn get(&self, path: &str) -> Result<JsonObject, Error> {
        let url = self.api_url(path)?;
        debug!("GET {}", url);

        let resp = self.authorize(self.http.get(url)).send().await?;
        Self::parse_object(resp).await
    }

    /// Send a POST request with JSON body and decode the JSON object body.
    pub async fn post(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<JsonObject, Error> {
        let url = self.api_url(path)?;
        debug!("POST {}", url);

        let resp = self
            .authorize(self.http.post(url).json(body))
            .send()
            .await?;
        Self::parse_object(resp).await
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(creds) => builder.basic_auth(
                creds.key.expose_secret(),
                Some(creds.secret.expose_secret()),
            ),
            None => builder,
        }
    }

    /// Map HTTP status to an error, then require a JSON object body.
    async fn parse_object(resp: reqwest::Response) -> Result<JsonObject, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "API key or secret rejected (HTTP 401)".into(),
            });
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                message: "insufficient privileges for this endpoint (HTTP 403)".into(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: preview(&body).to_owned(),
            });
        }

        let body = resp.text().await?;
        trace!(len = body.len(), "response body received");

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(Error::Deserialization {
                message: format!("expected a JSON object, got {}", json_type(&other)),
                body,
            }),
            Err(e) => Err(Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&body)),
                body,
            }),
        }
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> DeviceClient {
        DeviceClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap(), None)
    }

    #[test]
    fn api_url_joins_without_double_slashes() {
        let c = client("https://192.0.2.1/");
        assert_eq!(
            c.api_url("/haproxy/settings/searchAcls").unwrap().as_str(),
            "https://192.0.2.1/api/haproxy/settings/searchAcls"
        );
    }

    #[test]
    fn api_url_keeps_base_path_prefix() {
        let c = client("https://fw.example.net:8443/opnsense");
        assert_eq!(
            c.api_url("trust/crl/get/abc").unwrap().as_str(),
            "https://fw.example.net:8443/opnsense/api/trust/crl/get/abc"
        );
    }

    #[test]
    fn preview_caps_long_bodies_on_char_boundary() {
        let body = "é".repeat(300);
        assert_eq!(preview(&body).chars().count(), 200);
        assert_eq!(preview("short"), "short");
    }
}
