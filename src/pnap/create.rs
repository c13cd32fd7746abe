//! Server provisioning for the PNAP driver.

use tracing::{debug, info};

use crate::cloud_init;
use crate::config::{ConfigDefaults, DriverConfig};
use crate::driver::MachineState;
use crate::pnap::PnapDriver;
use crate::pnap::api::{
    CloudInitConfiguration, NetworkConfiguration, OsConfiguration, PrivateNetworkConfiguration,
    ServerCreate, ServerPrivateNetwork,
};
use crate::pnap::error::PnapDriverError;

const NETWORK_TYPE_PRIVATE_ONLY: &str = "PRIVATE_ONLY";
const PRIVATE_NETWORK_USER_DEFINED: &str = "USER_DEFINED";
const MIN_AVAILABLE_QUANTITY: i64 = 1;

impl PnapDriver {
    /// Applies configuration defaults and verifies the requested type has
    /// capacity in the requested location.
    pub(crate) async fn run_precreate_check(&mut self) -> Result<(), PnapDriverError> {
        self.config = self.config.clone().with_defaults(&ConfigDefaults::default());

        let client = self.session.client()?;
        let availability = client
            .product_availability(&self.config.server_type, &self.config.server_location, 1)
            .await
            .map_err(|source| PnapDriverError::RemoteCommand {
                operation: "product-availability",
                source,
            })?;

        let available = availability.first().is_some_and(|product| {
            product
                .location_availability_details
                .first()
                .is_some_and(|detail| detail.available_quantity >= MIN_AVAILABLE_QUANTITY)
        });
        if !available {
            return Err(PnapDriverError::NoAvailability {
                server_type: self.config.server_type.clone(),
                location: self.config.server_location.clone(),
            });
        }
        Ok(())
    }

    /// Provisions the server and blocks until it is running.
    ///
    /// The precheck runs first so an unavailable type/location combination
    /// never submits a create request.
    pub(crate) async fn create_instance(&mut self) -> Result<(), PnapDriverError> {
        info!("creating pnap machine instance");
        self.run_precreate_check().await?;
        self.config.validate()?;

        let public_key = self.key_generator.generate(&self.ssh_key_path)?;
        let user_data = cloud_init::encoded_user_data(self.config.user_data_file.as_deref())?;
        let request = build_create_request(&self.config, &public_key, user_data);

        let client = self.session.client()?;
        let server = client
            .create_server(&request)
            .await
            .map_err(|source| PnapDriverError::RemoteCommand {
                operation: "create-server",
                source,
            })?;
        self.instance.populate(&server);

        // The address sets may still be empty while the server is creating;
        // resolution is retried on the next ip() call.
        if let Err(err) = self.resolve_ip_cached() {
            debug!("address not resolvable yet: {err}");
        }

        self.wait_for(MachineState::Running).await
    }
}

/// Assembles the create-server payload from the resolved configuration.
pub(crate) fn build_create_request(
    config: &DriverConfig,
    public_key: &str,
    user_data: String,
) -> ServerCreate {
    let description = (!config.server_description.is_empty())
        .then(|| config.server_description.clone());

    let network_type = (!config.private_network.is_empty() && config.private_networking)
        .then(|| String::from(NETWORK_TYPE_PRIVATE_ONLY));

    let private_network_configuration =
        (!config.private_network.is_empty()).then(|| PrivateNetworkConfiguration {
            configuration_type: String::from(PRIVATE_NETWORK_USER_DEFINED),
            private_networks: vec![ServerPrivateNetwork {
                id: config.private_network.clone(),
            }],
        });

    ServerCreate {
        hostname: config.hostname.clone(),
        description,
        os: config.server_os.clone(),
        server_type: config.server_type.clone(),
        location: config.server_location.clone(),
        ssh_keys: vec![public_key.trim().to_owned()],
        network_type,
        network_configuration: NetworkConfiguration {
            gateway_address: config.gateway.clone(),
            private_network_configuration,
        },
        os_configuration: OsConfiguration {
            cloud_init: CloudInitConfiguration { user_data },
        },
    }
}
