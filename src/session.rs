use std::path::Path;

use tokio::task::JoinHandle;
use tracing::info;

use crate::actions::{ActionRegistry, Dispatcher};
use crate::config::PanelConfig;
use crate::controls::{self, LightsControl};
use crate::display;
use crate::error::PanelError;
use crate::lookup::{self, LookupClient};
use crate::panel::{Panel, SharedPanel};
use crate::poller::Poller;
use crate::request::{ActionClient, QueryOutcome};
use crate::station;

/// Trigger clicked once at startup to fill the device selector
pub const REFRESH_DEVICES: &str = "refreshDevices";

/// Everything a page session owns: client, panel, bindings, poll and lights state
pub struct PanelSession {
    config: PanelConfig,
    client: ActionClient,
    panel: SharedPanel,
    dispatcher: Dispatcher,
    poller: Poller,
    lights: LightsControl,
    lookup: LookupClient,
}

impl PanelSession {
    pub fn new(config: PanelConfig) -> Result<Self, PanelError> {
        Self::with_registry(config, station::registry())
    }

    pub fn with_registry(config: PanelConfig, registry: ActionRegistry) -> Result<Self, PanelError> {
        let client = ActionClient::new(&config.backend_url)?;
        let lookup = LookupClient::new(config.lookup_url.as_deref(), config.lookup_alias)?;

        let mut panel = Panel::new();
        lookup::update_activate_tooltip(&mut panel, "None");
        let panel = SharedPanel::new(panel);

        let dispatcher = Dispatcher::setup_actions(
            &client,
            &panel,
            &config.actions.layout,
            &registry,
            config.actions.finished_flash(),
        )?;
        let poller = Poller::new(client.clone(), panel.clone(), config.poll.clone());

        info!("🎛️ Panel session for {}", config.backend_url);
        Ok(Self {
            config,
            client,
            panel,
            dispatcher,
            poller,
            lights: LightsControl::new(),
            lookup,
        })
    }

    pub fn panel(&self) -> &SharedPanel {
        &self.panel
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn click(&self, trigger: &str) -> Result<QueryOutcome, PanelError> {
        self.dispatcher.click(trigger).await
    }

    /// Populate the device selector the way the page did on load
    pub async fn refresh_devices(&self) -> Result<QueryOutcome, PanelError> {
        self.click(REFRESH_DEVICES).await
    }

    pub fn set_input(&self, id: &str, value: &str) {
        self.panel.write().set_value(id, value);
    }

    pub fn set_checked(&self, id: &str, checked: bool) {
        self.panel.write().set_checked(id, checked);
    }

    pub async fn submit_threshold(&self, threshold: &str) -> Result<bool, PanelError> {
        self.set_input(controls::THRESHOLD_INPUT, threshold);
        controls::submit_threshold(&self.client, &self.panel).await
    }

    /// Move the lights slider and/or switch; unchanged levels are not posted
    pub async fn set_lights(&self, enabled: Option<bool>, value: Option<&str>) -> Result<bool, PanelError> {
        {
            let mut panel = self.panel.write();
            if let Some(enabled) = enabled {
                panel.set_checked(station::LIGHTS_ENABLED, enabled);
            }
            if let Some(value) = value {
                panel.set_value(station::LIGHTS_VALUE, value);
            }
        }
        self.lights.update(&self.client, &self.panel).await
    }

    pub fn snapshot_burst(&self) -> JoinHandle<usize> {
        controls::snapshot_burst(self.client.clone(), self.panel.clone(), self.config.snapshot.clone())
    }

    pub async fn start_polling(&self) -> bool {
        self.poller.start().await
    }

    pub async fn stop_polling(&self) -> bool {
        self.poller.stop().await
    }

    pub async fn polling_active(&self) -> bool {
        self.poller.is_running().await
    }

    /// Level most recently posted to `/lights`
    pub async fn lights_level(&self) -> u32 {
        self.lights.last_level().await
    }

    /// Write the running configuration back out as JSON
    pub fn save_config(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        self.config.save(path.as_ref())?;
        info!("💾 Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    pub async fn lookup(&self, query: &str) -> Result<String, PanelError> {
        self.set_input("query", query);
        lookup::run_lookup(&self.lookup, &self.client, &self.panel, query).await
    }

    pub fn clear(&self, id: &str) {
        display::clear(&mut self.panel.write(), id);
    }

    pub fn render(&self) -> String {
        self.panel.read().to_string()
    }

    pub fn take_alerts(&self) -> Vec<String> {
        self.panel.write().take_alerts()
    }

    /// Stop polling and wait for the loop to wind down
    pub async fn shutdown(&self) {
        self.poller.stop().await;
        self.poller.join().await;
        info!("🛑 Panel session closed");
    }
}
