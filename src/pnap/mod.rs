//! PhoenixNAP implementation of the machine-driver contract.

mod api;
mod create;
mod error;
mod network;
mod session;
mod state;
mod token;
mod wait;

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{DriverConfig, options};
use crate::driver::{DriverFuture, DriverOptions, FlagDescriptor, MachineDriver, MachineState};
use crate::ssh::{ProcessKeyGenerator, SshKeyGenerator};
use api::{BmcClient, Server};
use session::{CredentialState, SessionManager};
use state::state_for_status;
use wait::POLL_INTERVAL;

pub use api::{ApiEndpoints, ApiError};
pub use error::PnapDriverError;

/// Stable driver identifier reported to the host.
const DRIVER_NAME: &str = "pnap";

/// Port the container engine listens on, used for the connection URL.
const DOCKER_PORT: u16 = 2376;

/// Runtime state of the one server a driver manages.
///
/// Populated by the create response and refreshed by status polls; each
/// refresh replaces the status and provisioning timestamp together.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstanceRecord {
    /// Remote server identifier, absent until creation succeeds.
    pub remote_id: Option<String>,
    /// Last provider status string observed.
    pub status: String,
    /// Private addresses reported by the provider.
    pub private_ip_addresses: Vec<String>,
    /// Public addresses reported by the provider.
    pub public_ip_addresses: Vec<String>,
    /// Externally usable address, resolved once and cached.
    pub resolved_ip: Option<String>,
    /// Provisioning timestamp reported by the provider.
    pub provisioned_on: Option<DateTime<Utc>>,
    /// CPU descriptor reported by the provider.
    pub cpu: String,
    /// RAM descriptor reported by the provider.
    pub ram: String,
    /// Storage descriptor reported by the provider.
    pub storage: String,
}

impl InstanceRecord {
    fn populate(&mut self, server: &Server) {
        self.remote_id = Some(server.id.clone());
        self.status = server.status.clone();
        self.private_ip_addresses = server.private_ip_addresses.clone();
        self.public_ip_addresses = server.public_ip_addresses.clone();
        self.cpu = server.cpu.clone();
        self.ram = server.ram.clone();
        self.storage = server.storage.clone();
        self.provisioned_on = server.provisioned_on;
    }

    fn refresh_status(&mut self, status: &str, provisioned_on: Option<DateTime<Utc>>) {
        self.status = status.to_owned();
        self.provisioned_on = provisioned_on;
    }
}

/// Machine driver for the PhoenixNAP Bare Metal Cloud.
///
/// One driver value manages exactly one server, sequentially; every operation
/// runs to completion on the calling task.
pub struct PnapDriver {
    config: DriverConfig,
    session: SessionManager,
    instance: InstanceRecord,
    ssh_key_path: Utf8PathBuf,
    key_generator: Box<dyn SshKeyGenerator + Send + Sync>,
    poll_interval: Duration,
    wait_deadline: Option<Duration>,
}

impl PnapDriver {
    /// Creates an unconfigured driver. The host supplies the path where the
    /// machine SSH keypair is written.
    #[must_use]
    pub fn new(ssh_key_path: Utf8PathBuf) -> Self {
        Self {
            config: DriverConfig::default(),
            session: SessionManager::new(CredentialState::default(), ApiEndpoints::default()),
            instance: InstanceRecord::default(),
            ssh_key_path,
            key_generator: Box::new(ProcessKeyGenerator),
            poll_interval: POLL_INTERVAL,
            wait_deadline: None,
        }
    }

    /// Points the driver at different API endpoints. Used by tests and
    /// air-gapped deployments.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: ApiEndpoints) -> Self {
        self.session.set_endpoints(endpoints);
        self
    }

    /// Replaces the SSH key generation strategy.
    #[must_use]
    pub fn with_key_generator(mut self, generator: Box<dyn SshKeyGenerator + Send + Sync>) -> Self {
        self.key_generator = generator;
        self
    }

    /// Overrides the status poll interval.
    ///
    /// This is primarily used by tests to keep wait scenarios fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bounds every wait loop with a deadline. The default is unbounded,
    /// matching the provider's submit-then-converge contract.
    #[must_use]
    pub const fn with_wait_deadline(mut self, deadline: Duration) -> Self {
        self.wait_deadline = Some(deadline);
        self
    }

    /// Applies the host's option registry to the driver configuration and
    /// credential state.
    pub fn configure_from_options(&mut self, opts: &dyn DriverOptions) {
        self.config = DriverConfig::from_options(opts);
        self.session.set_credentials(CredentialState::from_options(opts));
    }

    /// Returns the instance record for host inspection.
    #[must_use]
    pub const fn instance(&self) -> &InstanceRecord {
        &self.instance
    }

    /// Returns the flag descriptors the driver registers with the host.
    #[must_use]
    pub fn create_flags() -> Vec<FlagDescriptor> {
        vec![
            FlagDescriptor::new(
                options::SERVER_OS,
                "PNAP_SERVER_OS",
                "The server's OS ID used when the server was created (e.g., ubuntu/bionic, centos/centos7).",
            ),
            FlagDescriptor::new(
                options::SERVER_LOCATION,
                "PNAP_SERVER_LOCATION",
                "Server location ID. Cannot be changed once a server is created.",
            ),
            FlagDescriptor::new(
                options::SERVER_TYPE,
                "PNAP_SERVER_TYPE",
                "Server type ID. Cannot be changed once a server is created.",
            ),
            FlagDescriptor::new(
                options::SERVER_DESCRIPTION,
                "PNAP_SERVER_DESCRIPTION",
                "Server description.",
            ),
            FlagDescriptor::new(
                options::SERVER_HOSTNAME,
                "PNAP_SERVER_HOSTNAME",
                "Server hostname.",
            ),
            FlagDescriptor::new(
                options::CLIENT_IDENTIFIER,
                "PNAP_CLIENT_ID",
                "Client ID from application credentials.",
            ),
            FlagDescriptor::new(
                options::CLIENT_SECRET,
                "PNAP_CLIENT_SECRET",
                "Client secret from application credentials.",
            ),
            FlagDescriptor::new(
                options::CLIENT_TOKEN,
                "PNAP_CLIENT_TOKEN",
                "Client token generated by the authentication service.",
            ),
            FlagDescriptor::new(
                options::SERVER_PRIVATE_NETWORK,
                "PNAP_SERVER_PRIVATE_NETWORK",
                "Private network ID.",
            ),
            FlagDescriptor::new(
                options::SERVER_GATEWAY,
                "PNAP_SERVER_GATEWAY",
                "Server gateway address.",
            ),
            FlagDescriptor::new(
                options::PRIVATE_NETWORKING,
                "PNAP_PRIVATE_NETWORKING",
                "Defines whether to use the private network for communication.",
            ),
            FlagDescriptor::new(
                options::USERDATA,
                "PNAP_USERDATA",
                "Path to a file with cloud-init user data.",
            ),
        ]
    }

    fn require_server_id(&self) -> Result<String, PnapDriverError> {
        self.instance
            .remote_id
            .clone()
            .ok_or(PnapDriverError::MissingInstanceId)
    }

    fn resolve_ip_cached(&mut self) -> Result<String, PnapDriverError> {
        if let Some(ip) = &self.instance.resolved_ip {
            return Ok(ip.clone());
        }
        let ip = network::resolve_ip(
            self.config.private_networking,
            &self.instance.private_ip_addresses,
            &self.instance.public_ip_addresses,
        )?
        .to_owned();
        self.instance.resolved_ip = Some(ip.clone());
        Ok(ip)
    }

    /// Fetches the current canonical state, refreshing the instance record.
    ///
    /// Stale credentials are invalidated before the remote call, which is the
    /// only mutation the session performs outside construction.
    async fn fetch_state(&mut self) -> Result<MachineState, PnapDriverError> {
        self.session.invalidate_if_stale(self.instance.provisioned_on);
        let client = self.session.client()?;
        let server_id = self.require_server_id()?;

        let server = client
            .get_server(&server_id)
            .await
            .map_err(|source| PnapDriverError::RemoteCommand {
                operation: "get-server",
                source,
            })?;
        self.instance
            .refresh_status(&server.status, server.provisioned_on);
        Ok(state_for_status(&self.instance.status))
    }

    async fn start_instance(&mut self) -> Result<(), PnapDriverError> {
        info!("starting pnap machine instance");
        let (client, server_id) = self.lifecycle_client()?;
        client
            .power_on_server(&server_id)
            .await
            .map_err(|source| PnapDriverError::RemoteCommand {
                operation: "power-on",
                source,
            })?;
        self.wait_for(MachineState::Running).await
    }

    async fn stop_instance(&mut self) -> Result<(), PnapDriverError> {
        info!("stopping pnap machine instance");
        let (client, server_id) = self.lifecycle_client()?;
        client
            .shutdown_server(&server_id)
            .await
            .map_err(|source| PnapDriverError::RemoteCommand {
                operation: "shutdown",
                source,
            })?;
        self.wait_for(MachineState::Stopped).await
    }

    async fn restart_instance(&mut self) -> Result<(), PnapDriverError> {
        info!("rebooting pnap machine instance");
        let (client, server_id) = self.lifecycle_client()?;
        client
            .reboot_server(&server_id)
            .await
            .map_err(|source| PnapDriverError::RemoteCommand {
                operation: "reboot",
                source,
            })?;
        self.wait_for(MachineState::Running).await
    }

    async fn kill_instance(&mut self) -> Result<(), PnapDriverError> {
        info!("killing pnap machine instance");
        let (client, server_id) = self.lifecycle_client()?;
        client
            .delete_server(&server_id)
            .await
            .map_err(|source| PnapDriverError::RemoteCommand {
                operation: "delete-server",
                source,
            })?;
        self.wait_for(MachineState::Stopped).await
    }

    async fn remove_instance(&mut self) -> Result<(), PnapDriverError> {
        self.session.invalidate_if_stale(self.instance.provisioned_on);
        let Some(server_id) = self.instance.remote_id.clone() else {
            return Ok(());
        };

        info!("removing pnap machine instance with id {server_id}");
        let client = self.session.client()?;
        let outcome = client
            .delete_server(&server_id)
            .await
            .map_err(|source| PnapDriverError::RemoteCommand {
                operation: "delete-server",
                source,
            })?;
        info!(
            "removal of machine {server_id} returned result {}",
            outcome.result
        );
        Ok(())
    }

    /// Invalidates stale credentials and returns the client handle together
    /// with the recorded server id, the shared preamble of every lifecycle
    /// operation.
    fn lifecycle_client(&mut self) -> Result<(Arc<BmcClient>, String), PnapDriverError> {
        self.session.invalidate_if_stale(self.instance.provisioned_on);
        let client = self.session.client()?;
        let server_id = self.require_server_id()?;
        Ok((client, server_id))
    }

    fn ssh_username_for(server_os: &str) -> &'static str {
        if server_os.contains("ubuntu") {
            "ubuntu"
        } else if server_os.contains("centos") {
            "centos"
        } else if server_os.contains("windows") {
            "Admin"
        } else {
            "root"
        }
    }
}

impl MachineDriver for PnapDriver {
    type Error = PnapDriverError;

    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn precreate_check(&mut self) -> DriverFuture<'_, (), PnapDriverError> {
        Box::pin(self.run_precreate_check())
    }

    fn create(&mut self) -> DriverFuture<'_, (), PnapDriverError> {
        Box::pin(self.create_instance())
    }

    fn start(&mut self) -> DriverFuture<'_, (), PnapDriverError> {
        Box::pin(self.start_instance())
    }

    fn stop(&mut self) -> DriverFuture<'_, (), PnapDriverError> {
        Box::pin(self.stop_instance())
    }

    fn restart(&mut self) -> DriverFuture<'_, (), PnapDriverError> {
        Box::pin(self.restart_instance())
    }

    fn kill(&mut self) -> DriverFuture<'_, (), PnapDriverError> {
        Box::pin(self.kill_instance())
    }

    fn remove(&mut self) -> DriverFuture<'_, (), PnapDriverError> {
        Box::pin(self.remove_instance())
    }

    fn state(&mut self) -> DriverFuture<'_, MachineState, PnapDriverError> {
        Box::pin(self.fetch_state())
    }

    fn ip(&mut self) -> Result<String, PnapDriverError> {
        self.resolve_ip_cached()
    }

    fn ssh_hostname(&mut self) -> Result<String, PnapDriverError> {
        self.resolve_ip_cached()
    }

    fn ssh_username(&self) -> String {
        Self::ssh_username_for(&self.config.server_os).to_owned()
    }

    fn url(&mut self) -> Result<String, PnapDriverError> {
        let ip = self.resolve_ip_cached()?;
        Ok(format!("tcp://{ip}:{DOCKER_PORT}"))
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use rstest::rstest;

    use super::PnapDriver;
    use crate::driver::MachineDriver;

    fn driver() -> PnapDriver {
        PnapDriver::new(Utf8PathBuf::from("/machines/node-1/id_ed25519"))
    }

    #[rstest]
    #[case("ubuntu/bionic", "ubuntu")]
    #[case("centos/centos7", "centos")]
    #[case("windows/srv2019dc", "Admin")]
    #[case("debian/bullseye", "root")]
    fn ssh_username_follows_the_os_image(#[case] os: &str, #[case] expected: &str) {
        assert_eq!(PnapDriver::ssh_username_for(os), expected);
    }

    #[test]
    fn create_flags_advertise_the_documented_options() {
        let names: Vec<&str> = PnapDriver::create_flags()
            .iter()
            .map(|flag| flag.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "pnap-server-os",
                "pnap-server-location",
                "pnap-server-type",
                "pnap-server-description",
                "pnap-server-hostname",
                "pnap-client-identifier",
                "pnap-client-secret",
                "pnap-client-token",
                "pnap-server-private-network",
                "pnap-server-gateway",
                "pnap-private-networking",
                "pnap-userdata",
            ]
        );
    }

    #[test]
    fn url_formats_the_engine_endpoint() {
        let mut machine = driver();
        machine.instance.public_ip_addresses = vec![String::from("1.2.3.4")];
        assert_eq!(machine.url().unwrap(), "tcp://1.2.3.4:2376");
    }

    #[test]
    fn ip_is_memoized_after_first_resolution() {
        let mut machine = driver();
        machine.instance.public_ip_addresses = vec![String::from("1.2.3.4")];
        assert_eq!(machine.ip().unwrap(), "1.2.3.4");

        machine.instance.public_ip_addresses = vec![String::from("5.6.7.8")];
        assert_eq!(machine.ip().unwrap(), "1.2.3.4");
    }

    #[test]
    fn driver_name_is_stable() {
        assert_eq!(driver().driver_name(), "pnap");
    }
}
