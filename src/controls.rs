use std::time::Duration;

use reqwest::Method;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SnapshotConfig;
use crate::display;
use crate::error::PanelError;
use crate::panel::SharedPanel;
use crate::request::ActionClient;
use crate::station::light_level;

pub const THRESHOLD_INPUT: &str = "threshold";
pub const THRESHOLD_OUTPUT: &str = "thresholdOutput";
pub const SNAPSHOT_CONTROL: &str = "snapshot";
pub const SNAPSHOT_RESULT: &str = "snapshotResult";
pub const OUTLINE: &str = "outline";

/// Mirror the threshold input and push it to `/config`.
///
/// Returns false when the input was rejected and nothing was sent.
pub async fn submit_threshold(client: &ActionClient, panel: &SharedPanel) -> Result<bool, PanelError> {
    let raw = {
        let mut panel = panel.write();
        let raw = panel.value(THRESHOLD_INPUT).trim().to_string();
        display::write_on(&mut panel, THRESHOLD_OUTPUT, raw.clone());
        raw
    };

    let threshold: i64 = match raw.parse() {
        Ok(threshold) => threshold,
        Err(_) => {
            panel.write().alert(format!("Threshold \"{}\" is not a whole number.", raw));
            return Ok(false);
        }
    };

    info!("🎚️ Threshold {}", threshold);
    client.send("config", Method::POST, Some(&json!({ "threshold": threshold }))).await?;
    Ok(true)
}

/// Lights form state; a level is only posted when it changed
#[derive(Debug, Default)]
pub struct LightsControl {
    last_level: Mutex<u32>,
}

impl LightsControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_level(&self) -> u32 {
        *self.last_level.lock().await
    }

    /// Returns true when a new level was sent
    pub async fn update(&self, client: &ActionClient, panel: &SharedPanel) -> Result<bool, PanelError> {
        let level = light_level(&panel.read());
        let level = match level {
            Ok(level) => level,
            Err(invalid) => {
                panel.write().alert(invalid.to_string());
                return Ok(false);
            }
        };

        {
            let mut last = self.last_level.lock().await;
            if *last == level {
                return Ok(false);
            }
            *last = level;
        }

        info!("💡 Lights level {}", level);
        client.send("lights", Method::POST, Some(&json!({ "level": level }))).await?;
        Ok(true)
    }
}

/// Fire `/snap` repeatedly in the background, each shot independent of the others.
///
/// The handle resolves to the number of shots that got a reply.
pub fn snapshot_burst(client: ActionClient, panel: SharedPanel, settings: SnapshotConfig) -> JoinHandle<usize> {
    let spacing = Duration::from_millis(settings.spacing_ms);
    let outline = Duration::from_millis(settings.outline_ms);

    tokio::spawn(async move {
        info!("📸 Snapshot burst: {} shots every {:?}", settings.repetitions, spacing);
        let mut shots = Vec::with_capacity(settings.repetitions as usize);
        for shot in 1..=settings.repetitions {
            if shot > 1 {
                tokio::time::sleep(spacing).await;
            }
            shots.push(tokio::spawn(take_snapshot(client.clone(), panel.clone(), outline, shot)));
        }

        let mut replied = 0;
        for shot in shots {
            if let Ok(true) = shot.await {
                replied += 1;
            }
        }
        info!("📸 Snapshot burst done: {}/{} replied", replied, settings.repetitions);
        replied
    })
}

async fn take_snapshot(client: ActionClient, panel: SharedPanel, outline: Duration, shot: u32) -> bool {
    let reply = match client.send("snap", Method::POST, None).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("📸 Snapshot {} failed: {}", shot, e);
            return false;
        }
    };

    {
        let mut panel = panel.write();
        display::write_on(&mut panel, SNAPSHOT_RESULT, reply.text());
        panel.add_class(SNAPSHOT_CONTROL, OUTLINE);
    }
    tokio::time::sleep(outline).await;
    panel.write().remove_class(SNAPSHOT_CONTROL, OUTLINE);
    true
}
