//! Driver configuration resolved from the host's option registry.

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::info;

use crate::driver::DriverOptions;

/// Option names the driver registers with the host.
pub mod options {
    /// OS image identifier (for example `ubuntu/bionic`).
    pub const SERVER_OS: &str = "pnap-server-os";
    /// Location identifier. Cannot be changed once a server is created.
    pub const SERVER_LOCATION: &str = "pnap-server-location";
    /// Server type identifier. Cannot be changed once a server is created.
    pub const SERVER_TYPE: &str = "pnap-server-type";
    /// Free-form server description.
    pub const SERVER_DESCRIPTION: &str = "pnap-server-description";
    /// Hostname assigned to the server.
    pub const SERVER_HOSTNAME: &str = "pnap-server-hostname";
    /// Client ID from application credentials.
    pub const CLIENT_IDENTIFIER: &str = "pnap-client-identifier";
    /// Client secret from application credentials.
    pub const CLIENT_SECRET: &str = "pnap-client-secret";
    /// Bearer token issued by the authentication service.
    pub const CLIENT_TOKEN: &str = "pnap-client-token";
    /// Private network identifier to attach the server to.
    pub const SERVER_PRIVATE_NETWORK: &str = "pnap-server-private-network";
    /// Gateway address for the server's network configuration.
    pub const SERVER_GATEWAY: &str = "pnap-server-gateway";
    /// Whether to use the private network for communication.
    pub const PRIVATE_NETWORKING: &str = "pnap-private-networking";
    /// Path to a file with cloud-init user data.
    pub const USERDATA: &str = "pnap-userdata";
}

/// Immutable driver configuration.
///
/// Values map 1:1 from the host's option registry; empty OS, type, and
/// location fields take defaults at precheck time via [`DriverConfig::with_defaults`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DriverConfig {
    /// Hostname assigned to the server.
    pub hostname: String,
    /// OS image identifier.
    pub server_os: String,
    /// Server type identifier.
    pub server_type: String,
    /// Location identifier.
    pub server_location: String,
    /// Optional free-form description.
    pub server_description: String,
    /// Private network identifier, empty when no private network is attached.
    pub private_network: String,
    /// Gateway address, always forwarded to the provider.
    pub gateway: String,
    /// Whether the private network is used for communication.
    pub private_networking: bool,
    /// Path to the cloud-init user-data file, if configured.
    pub user_data_file: Option<Utf8PathBuf>,
}

impl DriverConfig {
    /// Builds a configuration from the host's option registry.
    #[must_use]
    pub fn from_options(opts: &dyn DriverOptions) -> Self {
        let user_data_file = opts
            .string_option(options::USERDATA)
            .filter(|path| !path.trim().is_empty())
            .map(Utf8PathBuf::from);
        Self {
            hostname: opts.string_option(options::SERVER_HOSTNAME).unwrap_or_default(),
            server_os: opts.string_option(options::SERVER_OS).unwrap_or_default(),
            server_type: opts.string_option(options::SERVER_TYPE).unwrap_or_default(),
            server_location: opts
                .string_option(options::SERVER_LOCATION)
                .unwrap_or_default(),
            server_description: opts
                .string_option(options::SERVER_DESCRIPTION)
                .unwrap_or_default(),
            private_network: opts
                .string_option(options::SERVER_PRIVATE_NETWORK)
                .unwrap_or_default(),
            gateway: opts.string_option(options::SERVER_GATEWAY).unwrap_or_default(),
            private_networking: opts.bool_option(options::PRIVATE_NETWORKING),
            user_data_file,
        }
    }

    /// Merges the default record into this configuration, filling the OS,
    /// type, and location fields when they are empty.
    #[must_use]
    pub fn with_defaults(mut self, defaults: &ConfigDefaults) -> Self {
        if self.server_location.is_empty() {
            info!(
                "location has not been set, {} will be used as the default location",
                defaults.server_location
            );
            self.server_location = defaults.server_location.clone();
        }
        if self.server_type.is_empty() {
            info!(
                "type has not been set, {} will be used as the default type",
                defaults.server_type
            );
            self.server_type = defaults.server_type.clone();
        }
        if self.server_os.is_empty() {
            info!(
                "OS has not been set, {} will be used as the default OS",
                defaults.server_os
            );
            self.server_os = defaults.server_os.clone();
        }
        self
    }

    /// Performs semantic validation on fields required to submit a create
    /// request. Error messages include guidance on how to provide missing
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.hostname,
            &FieldMetadata::new(
                "server hostname",
                "PNAP_SERVER_HOSTNAME",
                options::SERVER_HOSTNAME,
            ),
        )?;
        Ok(())
    }
}

/// Explicit default-configuration record merged into user-supplied
/// configuration at precheck time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigDefaults {
    /// Default OS image identifier.
    pub server_os: String,
    /// Default server type identifier.
    pub server_type: String,
    /// Default location identifier.
    pub server_location: String,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            server_os: String::from("ubuntu/bionic"),
            server_type: String::from("s1.c1.medium"),
            server_location: String::from("PHX"),
        }
    }
}

/// Metadata for a configuration field, used to generate actionable error
/// messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    option: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, option: &'static str) -> Self {
        Self {
            description,
            env_var,
            option,
        }
    }
}

fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(format!(
            "missing {}: set {} or supply the {} option",
            metadata.description, metadata.env_var, metadata.option
        )));
    }
    Ok(())
}

/// Errors raised during configuration validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
}
