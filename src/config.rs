use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};

/// A user-triggerable action declared on the panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionElement {
    pub name: String,
    /// HTTP method; POST when left out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Control id that fires the action
    pub trigger: String,
    /// Element the reply is written to; each handler has its own fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ActionElement {
    pub fn new(name: &str, trigger: &str) -> Self {
        Self { name: name.to_string(), method: None, trigger: trigger.to_string(), output: None }
    }

    #[cfg(test)]
    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    #[cfg(test)]
    pub fn with_output(mut self, output: &str) -> Self {
        self.output = Some(output.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub endpoint: String,
    pub fields: Vec<String>,
    pub gap_ms: u64,
    pub highlight_negative: bool,
    /// Region marked as working while polling runs
    pub indicator: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            endpoint: "data".to_string(),
            fields: vec!["weight".to_string(), "height".to_string(), "bounds".to_string()],
            gap_ms: 200,
            highlight_negative: true,
            indicator: "control".to_string(),
        }
    }
}

impl PollConfig {
    pub fn gap(&self) -> Duration {
        Duration::from_millis(self.gap_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub finished_flash_ms: u64,
    pub layout: Vec<ActionElement>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            finished_flash_ms: 500,
            layout: vec![
                ActionElement::new("activate", "activateButton"),
                ActionElement::new("photos", "photosButton"),
                ActionElement::new("grab_data", "grabDataButton"),
                ActionElement::new("mount_device", "mountButton"),
                ActionElement::new("unmount_device", "unmountButton"),
                ActionElement::new("export", "exportButton"),
                ActionElement::new("block_devices", "refreshDevices"),
                ActionElement::new("setup", "setupButton"),
                ActionElement::new("tare", "tareButton"),
                ActionElement::new("calibrate_depth", "calibrateButton"),
            ],
        }
    }
}

impl ActionsConfig {
    pub fn finished_flash(&self) -> Duration {
        Duration::from_millis(self.finished_flash_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub repetitions: u32,
    pub spacing_ms: u64,
    pub outline_ms: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { repetitions: 10, spacing_ms: 15_000, outline_ms: 1_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub backend_url: String,
    pub lookup_url: Option<String>,
    pub lookup_alias: bool,
    pub poll: PollConfig,
    pub actions: ActionsConfig,
    pub snapshot: SnapshotConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".to_string(),
            lookup_url: None,
            lookup_alias: false,
            poll: PollConfig::default(),
            actions: ActionsConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl PanelConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Ok(config_str) = fs::read_to_string(path) {
            let config: PanelConfig = serde_json::from_str(&config_str)
                .with_context(|| format!("parsing {}", path.display()))?;
            return Ok(config);
        }

        tracing::warn!("{} not found, using default configuration", path.display());
        Ok(PanelConfig::default())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_str = serde_json::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }
}
