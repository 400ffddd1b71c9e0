use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::PollConfig;
use crate::display;
use crate::error::PanelError;
use crate::panel::{SharedPanel, TextColor, WORKING};
use crate::request::ActionClient;
use crate::types::scalar_text;

#[derive(Default)]
struct PollState {
    /// Flag of the current session; each start gets a fresh one
    running: Option<Arc<AtomicBool>>,
    task: Option<JoinHandle<()>>,
}

/// Live readout loop: one GET per cycle, fields written into same-named elements
pub struct Poller {
    client: ActionClient,
    panel: SharedPanel,
    settings: Arc<PollConfig>,
    state: Arc<Mutex<PollState>>,
}

impl Poller {
    pub fn new(client: ActionClient, panel: SharedPanel, settings: PollConfig) -> Self {
        Self {
            client,
            panel,
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(PollState::default())),
        }
    }

    /// Start a session; returns false when one is already running
    pub async fn start(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.running.as_ref().map_or(false, |flag| flag.load(Ordering::SeqCst)) {
            debug!("polling already running");
            return false;
        }

        let running = Arc::new(AtomicBool::new(true));
        self.panel.write().add_class(&self.settings.indicator, WORKING);

        let previous = state.task.take();
        state.task = Some(tokio::spawn(run_loop(
            self.client.clone(),
            self.panel.clone(),
            self.settings.clone(),
            running.clone(),
            self.state.clone(),
            previous,
        )));
        state.running = Some(running);
        true
    }

    /// Ask the loop to stop; the in-flight cycle still completes
    pub async fn stop(&self) -> bool {
        let state = self.state.lock().await;
        self.panel.write().remove_class(&self.settings.indicator, WORKING);
        state
            .running
            .as_ref()
            .map_or(false, |flag| flag.swap(false, Ordering::SeqCst))
    }

    pub async fn is_running(&self) -> bool {
        let state = self.state.lock().await;
        state.running.as_ref().map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    /// Wait for the most recent loop to exit
    pub async fn join(&self) {
        let task = self.state.lock().await.task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("poll loop panicked: {:?}", e);
            }
        }
    }
}

async fn run_loop(
    client: ActionClient,
    panel: SharedPanel,
    settings: Arc<PollConfig>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<PollState>>,
    previous: Option<JoinHandle<()>>,
) {
    // A stopped session may still be finishing its last cycle
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    info!("▶️ Polling /{} every {:?}", settings.endpoint, settings.gap());
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();

        if let Err(e) = poll_once(&client, &panel, &settings).await {
            error!("❌ Poll cycle failed, stopping: {}", e);
            // under the state lock so a concurrent start keeps its indicator
            let _state = state.lock().await;
            if running.swap(false, Ordering::SeqCst) {
                panel.write().remove_class(&settings.indicator, WORKING);
            }
            break;
        }

        tokio::time::sleep(settings.gap().saturating_sub(started.elapsed())).await;
    }
    info!("⏹️ Polling stopped");
}

/// One cycle: GET the endpoint and write each configured field
pub async fn poll_once(client: &ActionClient, panel: &SharedPanel, settings: &PollConfig) -> Result<(), PanelError> {
    let reply = client.send(&settings.endpoint, Method::GET, None).await?;
    let data: Value = reply.json()?;

    let mut panel = panel.write();
    for name in &settings.fields {
        let text = scalar_text(data.get(name));
        if settings.highlight_negative {
            let color = text.starts_with('-').then_some(TextColor::Red);
            panel.set_color(name, color);
        }
        display::write_on(&mut panel, name, text);
    }
    Ok(())
}
