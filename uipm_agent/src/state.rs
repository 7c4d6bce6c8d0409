//! Shared agent state: one owned guard per mutable concern.

use crate::config::AgentConfig;
use crate::error::SampleError;
use crate::exec::{CommandErrorLog, CommandGateway};
use crate::metrics::ResourceSampler;
use crate::network::NetSampler;
use crate::usb::UsbManager;
use crate::wifi::WirelessScanner;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub resources: Arc<ResourceSampler>,
    pub network: Arc<NetSampler>,
    pub wifi: Arc<WirelessScanner>,
    pub usb: Arc<UsbManager>,
    pub cmd_errors: Arc<CommandErrorLog>,
}

impl AppState {
    /// Seeds both samplers. Only an unreadable CPU source is an error.
    pub fn new(config: AgentConfig, gateway: CommandGateway) -> Result<Self, SampleError> {
        let paths = config.paths.clone();
        let resources = ResourceSampler::new(paths.clone())?;
        let network = NetSampler::new(paths.clone());
        network.seed();

        Ok(Self {
            cmd_errors: gateway.errors().clone(),
            wifi: Arc::new(WirelessScanner::new(
                paths.clone(),
                gateway.clone(),
                config.wifi_settle,
            )),
            usb: Arc::new(UsbManager::new(paths, gateway)),
            resources: Arc::new(resources),
            network: Arc::new(network),
            config: Arc::new(config),
        })
    }
}
