//! Credential-tier selection and session caching.
//!
//! The session owns one lazily constructed API client per driver lifetime.
//! Tier order: a live bearer token, then host-supplied application
//! credentials, then credentials discovered from the ambient environment.
//! A bearer token is known to expire an hour after provisioning, so status
//! checks invalidate it once the instance's provisioning timestamp falls
//! outside that window, which re-opens the lower tiers.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::info;

use crate::config::options;
use crate::driver::DriverOptions;
use crate::pnap::api::{ApiEndpoints, AuthMode, BmcClient};
use crate::pnap::error::PnapDriverError;
use crate::pnap::token;

/// Environment variable consulted for the ambient credential tier.
pub(crate) const ENV_CLIENT_ID: &str = "PNAP_CLIENT_ID";
/// Environment variable consulted for the ambient credential tier.
pub(crate) const ENV_CLIENT_SECRET: &str = "PNAP_CLIENT_SECRET";

/// Bearer tokens are definitely expired one hour after provisioning.
const TOKEN_STALE_AFTER_MINUTES: i64 = 60;

/// Credential material supplied by the host's option registry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct CredentialState {
    pub client_identifier: String,
    pub client_secret: String,
    pub bearer_token: String,
}

impl CredentialState {
    pub(crate) fn from_options(opts: &dyn DriverOptions) -> Self {
        Self {
            client_identifier: opts
                .string_option(options::CLIENT_IDENTIFIER)
                .unwrap_or_default(),
            client_secret: opts.string_option(options::CLIENT_SECRET).unwrap_or_default(),
            bearer_token: opts.string_option(options::CLIENT_TOKEN).unwrap_or_default(),
        }
    }
}

/// Owns credential state and the cached API client handle.
#[derive(Debug)]
pub(crate) struct SessionManager {
    credentials: CredentialState,
    endpoints: ApiEndpoints,
    client: Option<Arc<BmcClient>>,
}

impl SessionManager {
    pub(crate) const fn new(credentials: CredentialState, endpoints: ApiEndpoints) -> Self {
        Self {
            credentials,
            endpoints,
            client: None,
        }
    }

    /// Replaces the credential material, discarding any cached handle.
    pub(crate) fn set_credentials(&mut self, credentials: CredentialState) {
        self.credentials = credentials;
        self.client = None;
    }

    /// Replaces the endpoints, discarding any cached handle.
    pub(crate) fn set_endpoints(&mut self, endpoints: ApiEndpoints) {
        self.endpoints = endpoints;
        self.client = None;
    }

    /// Returns the cached client handle, constructing it on first use.
    ///
    /// Idempotent after first success: subsequent calls return the same
    /// handle without re-evaluating credential tiers.
    pub(crate) fn client(&mut self) -> Result<Arc<BmcClient>, PnapDriverError> {
        if let Some(existing) = &self.client {
            return Ok(Arc::clone(existing));
        }

        let auth = self.select_auth()?;
        let handle = Arc::new(BmcClient::new(auth, self.endpoints.clone()));
        self.client = Some(Arc::clone(&handle));
        Ok(handle)
    }

    fn select_auth(&self) -> Result<AuthMode, PnapDriverError> {
        if !self.credentials.bearer_token.is_empty()
            && token::is_live(&self.credentials.bearer_token, Utc::now())
        {
            info!("token auth with the BMC API will be performed");
            return Ok(AuthMode::Bearer(self.credentials.bearer_token.clone()));
        }

        if !self.credentials.client_identifier.is_empty()
            && !self.credentials.client_secret.is_empty()
        {
            info!("cloud credentials will be used for authentication");
            return Ok(AuthMode::Credentials {
                client_id: self.credentials.client_identifier.clone(),
                client_secret: self.credentials.client_secret.clone(),
            });
        }

        let ambient_id = std::env::var(ENV_CLIENT_ID)
            .ok()
            .filter(|value| !value.is_empty());
        let ambient_secret = std::env::var(ENV_CLIENT_SECRET)
            .ok()
            .filter(|value| !value.is_empty());
        match (ambient_id, ambient_secret) {
            (Some(client_id), Some(client_secret)) => {
                info!("default config auth will be performed");
                Ok(AuthMode::Ambient {
                    client_id,
                    client_secret,
                })
            }
            _ => Err(PnapDriverError::ClientConstruction {
                message: format!(
                    "no bearer token or client credentials configured and {ENV_CLIENT_ID}/{ENV_CLIENT_SECRET} are unset"
                ),
            }),
        }
    }

    /// Clears the bearer token once the instance's provisioning timestamp is
    /// older than the known token lifetime, dropping the cached handle so the
    /// next [`SessionManager::client`] call re-evaluates the lower tiers.
    pub(crate) fn invalidate_if_stale(&mut self, provisioned_on: Option<DateTime<Utc>>) {
        let Some(timestamp) = provisioned_on else {
            return;
        };
        if timestamp + TimeDelta::minutes(TOKEN_STALE_AFTER_MINUTES) >= Utc::now() {
            return;
        }
        if self.credentials.bearer_token.is_empty() {
            return;
        }

        info!("bearer token invalidated");
        self.credentials.bearer_token.clear();
        self.client = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::{TimeDelta, Utc};

    use super::{CredentialState, ENV_CLIENT_ID, ENV_CLIENT_SECRET, SessionManager};
    use crate::pnap::api::{ApiEndpoints, AuthMode};
    use crate::pnap::error::PnapDriverError;

    fn bearer_token(expires_in_seconds: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let exp = (Utc::now() + TimeDelta::seconds(expires_in_seconds)).timestamp();
        let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
        format!("{header}.{claims}.signature")
    }

    fn session(credentials: CredentialState) -> SessionManager {
        SessionManager::new(credentials, ApiEndpoints::default())
    }

    #[test]
    fn live_token_wins_over_client_credentials() {
        let mut manager = session(CredentialState {
            client_identifier: String::from("client-id"),
            client_secret: String::from("client-secret"),
            bearer_token: bearer_token(300),
        });
        let client = manager.client().expect("token tier should construct");
        assert!(matches!(client.auth_mode(), AuthMode::Bearer(_)));
    }

    #[test]
    fn expired_token_falls_through_to_client_credentials() {
        let mut manager = session(CredentialState {
            client_identifier: String::from("client-id"),
            client_secret: String::from("client-secret"),
            bearer_token: bearer_token(-300),
        });
        let client = manager.client().expect("credential tier should construct");
        assert!(matches!(client.auth_mode(), AuthMode::Credentials { .. }));
    }

    #[test]
    fn no_credentials_fall_through_to_ambient_environment() {
        temp_env::with_vars(
            [
                (ENV_CLIENT_ID, Some("ambient-id")),
                (ENV_CLIENT_SECRET, Some("ambient-secret")),
            ],
            || {
                let mut manager = session(CredentialState::default());
                let client = manager.client().expect("ambient tier should construct");
                assert!(matches!(client.auth_mode(), AuthMode::Ambient { .. }));
            },
        );
    }

    #[test]
    fn no_credential_path_is_a_construction_error() {
        temp_env::with_vars(
            [
                (ENV_CLIENT_ID, None::<&str>),
                (ENV_CLIENT_SECRET, None::<&str>),
            ],
            || {
                let mut manager = session(CredentialState::default());
                let error = manager.client().expect_err("no tier should construct");
                assert!(matches!(
                    error,
                    PnapDriverError::ClientConstruction { .. }
                ));
            },
        );
    }

    #[test]
    fn client_is_cached_across_calls() {
        let mut manager = session(CredentialState {
            bearer_token: bearer_token(300),
            ..CredentialState::default()
        });
        let first = manager.client().expect("first construction");
        let second = manager.client().expect("cached handle");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn stale_provisioning_timestamp_clears_the_token() {
        let mut manager = session(CredentialState {
            bearer_token: bearer_token(300),
            ..CredentialState::default()
        });
        manager.invalidate_if_stale(Some(Utc::now() - TimeDelta::minutes(61)));
        assert!(manager.credentials.bearer_token.is_empty());
        assert!(manager.client.is_none());
    }

    #[test]
    fn fresh_provisioning_timestamp_keeps_the_token() {
        let mut manager = session(CredentialState {
            bearer_token: bearer_token(300),
            ..CredentialState::default()
        });
        manager.invalidate_if_stale(Some(Utc::now() - TimeDelta::minutes(59)));
        assert!(!manager.credentials.bearer_token.is_empty());
    }

    #[test]
    fn invalidation_reopens_the_credential_tier() {
        let mut manager = session(CredentialState {
            client_identifier: String::from("client-id"),
            client_secret: String::from("client-secret"),
            bearer_token: bearer_token(300),
        });
        let before = manager.client().expect("token tier should construct");
        assert!(matches!(before.auth_mode(), AuthMode::Bearer(_)));

        manager.invalidate_if_stale(Some(Utc::now() - TimeDelta::minutes(61)));
        let after = manager.client().expect("credential tier should construct");
        assert!(matches!(after.auth_mode(), AuthMode::Credentials { .. }));
    }
}
