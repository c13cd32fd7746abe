//! Shared helpers for driver integration tests.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{TimeDelta, Utc};
use pnap_driver::config::options;
use pnap_driver::{ApiEndpoints, DriverOptions, PnapDriver, SshKeyError, SshKeyGenerator};
use serde_json::{Value, json};
use wiremock::MockServer;

/// Key generator double that never touches the filesystem.
pub(crate) struct StaticKey;

impl SshKeyGenerator for StaticKey {
    fn generate(&self, _key_path: &Utf8Path) -> Result<String, SshKeyError> {
        Ok(String::from("ssh-ed25519 AAAATESTKEY integration\n"))
    }
}

/// Option registry double backed by maps.
#[derive(Default)]
pub(crate) struct MapOptions {
    strings: HashMap<&'static str, String>,
    bools: HashMap<&'static str, bool>,
}

impl MapOptions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.strings.insert(name, value.into());
        self
    }

    pub(crate) fn set_bool(mut self, name: &'static str, value: bool) -> Self {
        self.bools.insert(name, value);
        self
    }
}

impl DriverOptions for MapOptions {
    fn string_option(&self, name: &str) -> Option<String> {
        self.strings.get(name).cloned()
    }

    fn bool_option(&self, name: &str) -> bool {
        self.bools.get(name).copied().unwrap_or(false)
    }
}

/// Builds an unsigned bearer token expiring `expires_in_seconds` from now.
pub(crate) fn bearer_token(expires_in_seconds: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let exp = (Utc::now() + TimeDelta::seconds(expires_in_seconds)).timestamp();
    let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
    format!("{header}.{claims}.signature")
}

/// Options for a bearer-token authenticated driver.
pub(crate) fn base_options() -> MapOptions {
    MapOptions::new()
        .set(options::SERVER_HOSTNAME, "node-1")
        .set(options::SERVER_OS, "ubuntu/bionic")
        .set(options::SERVER_TYPE, "s1.c1.medium")
        .set(options::SERVER_LOCATION, "PHX")
        .set(options::CLIENT_TOKEN, bearer_token(300))
        .set_bool(options::PRIVATE_NETWORKING, false)
}

/// Options for a client-credential authenticated driver.
pub(crate) fn credential_options() -> MapOptions {
    MapOptions::new()
        .set(options::SERVER_HOSTNAME, "node-1")
        .set(options::SERVER_OS, "ubuntu/bionic")
        .set(options::SERVER_TYPE, "s1.c1.medium")
        .set(options::SERVER_LOCATION, "PHX")
        .set(options::CLIENT_IDENTIFIER, "test-client")
        .set(options::CLIENT_SECRET, "test-secret")
}

/// Builds a driver wired to the mock server with fast polling.
pub(crate) fn driver_for(server: &MockServer) -> PnapDriver {
    PnapDriver::new(Utf8PathBuf::from("/tmp/machines/node-1/id_ed25519"))
        .with_endpoints(ApiEndpoints {
            api_base: server.uri(),
            token_url: format!("{}/token", server.uri()),
        })
        .with_key_generator(Box::new(StaticKey))
        .with_poll_interval(Duration::from_millis(1))
}

/// Server payload in the provider's wire form.
pub(crate) fn server_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "hostname": "node-1",
        "cpu": "Dual Silver 4110",
        "ram": "64GB RAM",
        "storage": "2x 1TB NVMe",
        "privateIpAddresses": ["10.0.0.5"],
        "publicIpAddresses": ["1.2.3.4"],
        "provisionedOn": Utc::now().to_rfc3339(),
    })
}

/// Availability response with one product row.
pub(crate) fn availability_json(quantity: i64) -> Value {
    json!([
        {
            "productCode": "s1.c1.medium",
            "locationAvailabilityDetails": [
                {"location": "PHX", "availableQuantity": quantity}
            ]
        }
    ])
}
