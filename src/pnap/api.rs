//! Thin client for the Bare Metal Cloud API.
//!
//! The driver treats the remote API as an opaque command surface: each method
//! is a single request/response exchange with no retry. Client-credential
//! authentication fetches an OAuth access token from the token endpoint on
//! first use and caches it for the client's lifetime.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("pnap-machine-driver/", env!("CARGO_PKG_VERSION"));

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Endpoints an API client talks to.
///
/// The defaults target the production service; tests point both at a local
/// mock server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiEndpoints {
    /// Base URL of the API host.
    pub api_base: String,
    /// OAuth token endpoint used for client-credential authentication.
    pub token_url: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            api_base: String::from("https://api.phoenixnap.com"),
            token_url: String::from(
                "https://auth.phoenixnap.com/auth/realms/BMC/protocol/openid-connect/token",
            ),
        }
    }
}

/// Credential material a client authenticates with.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum AuthMode {
    /// A bearer token supplied by the host.
    Bearer(String),
    /// Application credentials supplied by the host.
    Credentials {
        /// OAuth client identifier.
        client_id: String,
        /// OAuth client secret.
        client_secret: String,
    },
    /// Application credentials discovered from the ambient environment.
    Ambient {
        /// OAuth client identifier.
        client_id: String,
        /// OAuth client secret.
        client_secret: String,
    },
}

/// Errors raised by the API client.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ApiError {
    /// Raised when a request cannot be sent or its response not read.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Request URL.
        url: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        /// HTTP method of the failed request.
        method: String,
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// Raised when a success response cannot be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Underlying error message.
        message: String,
    },
}

/// Authenticated handle to the Bare Metal Cloud API.
#[derive(Debug)]
pub(crate) struct BmcClient {
    auth: AuthMode,
    endpoints: ApiEndpoints,
    access_token: Mutex<Option<String>>,
}

impl BmcClient {
    pub(crate) fn new(auth: AuthMode, endpoints: ApiEndpoints) -> Self {
        Self {
            auth,
            endpoints,
            access_token: Mutex::new(None),
        }
    }

    pub(crate) const fn auth_mode(&self) -> &AuthMode {
        &self.auth
    }

    /// Returns the bearer value for the next request, fetching an OAuth
    /// access token for credential modes on first use.
    async fn bearer(&self) -> Result<String, ApiError> {
        let (client_id, client_secret) = match &self.auth {
            AuthMode::Bearer(token) => return Ok(token.clone()),
            AuthMode::Credentials {
                client_id,
                client_secret,
            }
            | AuthMode::Ambient {
                client_id,
                client_secret,
            } => (client_id, client_secret),
        };

        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let fetched = self.fetch_access_token(client_id, client_secret).await?;
        *cached = Some(fetched.clone());
        Ok(fetched)
    }

    async fn fetch_access_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String, ApiError> {
        let url = &self.endpoints.token_url;
        let response = HTTP_CLIENT
            .post(url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|err| ApiError::Transport {
                url: url.clone(),
                message: err.to_string(),
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| ApiError::Transport {
            url: url.clone(),
            message: err.to_string(),
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                method: Method::POST.to_string(),
                url: url.clone(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
                url: url.clone(),
                message: err.to_string(),
            })?;
        Ok(parsed.access_token)
    }

    async fn execute<B, T>(&self, method: Method, url: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let bearer = self.bearer().await?;
        let mut request = HTTP_CLIENT
            .request(method.clone(), url)
            .bearer_auth(bearer);
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|err| ApiError::Transport {
            url: url.to_owned(),
            message: err.to_string(),
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| ApiError::Transport {
            url: url.to_owned(),
            message: err.to_string(),
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                method: method.to_string(),
                url: url.to_owned(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
            url: url.to_owned(),
            message: err.to_string(),
        })
    }

    fn server_url(&self, server_id: &str) -> String {
        format!("{}/bmc/v1/servers/{server_id}", self.endpoints.api_base)
    }

    fn action_url(&self, server_id: &str, action: &str) -> String {
        format!(
            "{}/bmc/v1/servers/{server_id}/actions/{action}",
            self.endpoints.api_base
        )
    }

    pub(crate) async fn create_server(&self, request: &ServerCreate) -> Result<Server, ApiError> {
        let url = format!("{}/bmc/v1/servers", self.endpoints.api_base);
        self.execute(Method::POST, &url, Some(request)).await
    }

    pub(crate) async fn get_server(&self, server_id: &str) -> Result<Server, ApiError> {
        self.execute::<(), _>(Method::GET, &self.server_url(server_id), None)
            .await
    }

    pub(crate) async fn delete_server(&self, server_id: &str) -> Result<DeleteResult, ApiError> {
        self.execute::<(), _>(Method::DELETE, &self.server_url(server_id), None)
            .await
    }

    pub(crate) async fn power_on_server(&self, server_id: &str) -> Result<(), ApiError> {
        self.execute::<(), ActionResult>(Method::POST, &self.action_url(server_id, "power-on"), None)
            .await
            .map(|_| ())
    }

    pub(crate) async fn shutdown_server(&self, server_id: &str) -> Result<(), ApiError> {
        self.execute::<(), ActionResult>(Method::POST, &self.action_url(server_id, "shutdown"), None)
            .await
            .map(|_| ())
    }

    pub(crate) async fn reboot_server(&self, server_id: &str) -> Result<(), ApiError> {
        self.execute::<(), ActionResult>(Method::POST, &self.action_url(server_id, "reboot"), None)
            .await
            .map(|_| ())
    }

    /// Queries product availability for one server type in one location.
    pub(crate) async fn product_availability(
        &self,
        product_code: &str,
        location: &str,
        min_quantity: u32,
    ) -> Result<Vec<ProductAvailability>, ApiError> {
        let url = format!(
            "{}/billing/v1/product-availability?productCategory=SERVER&productCode={product_code}&location={location}&minQuantity={min_quantity}",
            self.endpoints.api_base
        );
        self.execute::<(), _>(Method::GET, &url, None).await
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ActionResult {
    #[serde(default, rename = "result")]
    _result: String,
}

/// Create-server request payload in the provider's wire form.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerCreate {
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub os: String,
    #[serde(rename = "type")]
    pub server_type: String,
    pub location: String,
    pub ssh_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    pub network_configuration: NetworkConfiguration,
    pub os_configuration: OsConfiguration,
}

/// Network block of the create request. The gateway address is always set.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NetworkConfiguration {
    pub gateway_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network_configuration: Option<PrivateNetworkConfiguration>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrivateNetworkConfiguration {
    pub configuration_type: String,
    pub private_networks: Vec<ServerPrivateNetwork>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerPrivateNetwork {
    pub id: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OsConfiguration {
    pub cloud_init: CloudInitConfiguration,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CloudInitConfiguration {
    pub user_data: String,
}

/// Server representation returned by create and get calls.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Server {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub ram: String,
    #[serde(default)]
    pub storage: String,
    #[serde(default)]
    pub private_ip_addresses: Vec<String>,
    #[serde(default)]
    pub public_ip_addresses: Vec<String>,
    #[serde(default)]
    pub provisioned_on: Option<DateTime<Utc>>,
}

/// Delete confirmation returned by the API.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteResult {
    #[serde(default)]
    pub result: String,
}

/// One product row of an availability query response.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProductAvailability {
    #[serde(default)]
    pub product_code: String,
    #[serde(default)]
    pub location_availability_details: Vec<LocationAvailabilityDetail>,
}

/// Per-location availability inside a product row.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LocationAvailabilityDetail {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub available_quantity: i64,
}
