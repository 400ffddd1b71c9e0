use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::ActionElement;
use crate::error::{InvalidInput, PanelError};
use crate::panel::{Panel, SharedPanel, FINISHED, WORKING};
use crate::request::{parse_method, ActionClient, FailureFn, GatherFn, QueryHandler, QueryOutcome, Reply, SuccessFn};

/// Builds an action's request body from the panel inputs
pub type Gatherer = Arc<dyn Fn(&Panel) -> Result<Value, InvalidInput> + Send + Sync>;
/// Applies an action's decoded JSON reply to the panel.
///
/// The last argument is the output element declared for the action, if any.
pub type Handler = Arc<dyn Fn(&mut Panel, &Value, Option<&str>) -> Result<(), PanelError> + Send + Sync>;

/// Gatherer and handler functions keyed by action name.
///
/// Missing gatherers send `{}`; missing handlers discard the reply.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    gatherers: HashMap<String, Gatherer>,
    handlers: HashMap<String, Handler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gather<F>(mut self, name: &str, gatherer: F) -> Self
    where
        F: Fn(&Panel) -> Result<Value, InvalidInput> + Send + Sync + 'static,
    {
        self.gatherers.insert(name.to_string(), Arc::new(gatherer));
        self
    }

    pub fn handle<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut Panel, &Value, Option<&str>) -> Result<(), PanelError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn gatherer(&self, name: &str) -> Option<&Gatherer> {
        self.gatherers.get(name)
    }

    pub fn handler(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }
}

/// Decode a handler's JSON payload into a typed reply
pub fn decode<T: DeserializeOwned>(action: &str, data: &Value) -> Result<T, PanelError> {
    T::deserialize(data).map_err(|source| PanelError::Decode {
        endpoint: format!("/{}", action),
        source,
    })
}

/// Click bindings from trigger control ids to their actions
pub struct Dispatcher {
    bindings: HashMap<String, QueryHandler>,
    panel: SharedPanel,
}

impl Dispatcher {
    /// Bind every declared action element to a request built from the registry
    pub fn setup_actions(
        client: &ActionClient,
        panel: &SharedPanel,
        layout: &[ActionElement],
        registry: &ActionRegistry,
        finished_flash: Duration,
    ) -> Result<Self, PanelError> {
        let mut bindings = HashMap::new();

        for element in layout {
            let method = parse_method(element.method.as_deref())?;
            let handler = QueryHandler::new(
                client.clone(),
                &element.name,
                method,
                gather_fn(panel, &element.trigger, registry.gatherer(&element.name).cloned()),
                success_fn(
                    panel,
                    &element.trigger,
                    element.output.clone(),
                    registry.handler(&element.name).cloned(),
                    finished_flash,
                ),
            )
            .on_failure(failure_fn(panel, &element.trigger));

            debug!("🔗 {} {} bound to #{}", handler.method(), element.name, element.trigger);
            if bindings.insert(element.trigger.clone(), handler).is_some() {
                warn!("control #{} declared twice, keeping the last action", element.trigger);
            }
        }

        info!("🔗 {} actions bound", bindings.len());
        Ok(Self { bindings, panel: panel.clone() })
    }

    pub async fn click(&self, trigger: &str) -> Result<QueryOutcome, PanelError> {
        let handler = self
            .bindings
            .get(trigger)
            .ok_or_else(|| PanelError::UnknownControl(trigger.to_string()))?;

        info!("🖱️ {} ({})", trigger, handler.name());
        let result = handler.invoke().await;
        if result.is_err() {
            self.panel.write().remove_class(trigger, WORKING);
        }
        result
    }

    pub fn action_name(&self, trigger: &str) -> Option<&str> {
        self.bindings.get(trigger).map(QueryHandler::name)
    }

    pub fn triggers(&self) -> Vec<&str> {
        let mut triggers: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        triggers.sort_unstable();
        triggers
    }
}

fn gather_fn(panel: &SharedPanel, trigger: &str, gatherer: Option<Gatherer>) -> GatherFn {
    let panel = panel.clone();
    let trigger = trigger.to_string();
    Arc::new(move || {
        let mut panel = panel.write();
        panel.add_class(&trigger, WORKING);
        match &gatherer {
            Some(gatherer) => gatherer(&*panel),
            None => Ok(Value::Object(Map::new())),
        }
    })
}

fn failure_fn(panel: &SharedPanel, trigger: &str) -> FailureFn {
    let panel = panel.clone();
    let trigger = trigger.to_string();
    Arc::new(move |invalid: &InvalidInput| {
        let mut panel = panel.write();
        panel.remove_class(&trigger, WORKING);
        panel.alert(invalid.to_string());
    })
}

fn success_fn(
    panel: &SharedPanel,
    trigger: &str,
    output: Option<String>,
    handler: Option<Handler>,
    finished_flash: Duration,
) -> SuccessFn {
    let panel = panel.clone();
    let trigger = trigger.to_string();
    Arc::new(move |reply: Reply| -> Result<(), PanelError> {
        {
            let mut panel = panel.write();
            panel.remove_class(&trigger, WORKING);
            panel.add_class(&trigger, FINISHED);
        }

        let clear_panel = panel.clone();
        let clear_trigger = trigger.clone();
        tokio::spawn(async move {
            tokio::time::sleep(finished_flash).await;
            clear_panel.write().remove_class(&clear_trigger, FINISHED);
        });

        match &handler {
            Some(handler) => {
                let data: Value = reply.json()?;
                handler(&mut *panel.write(), &data, output.as_deref())
            }
            None => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use serde_json::json;

    const FLASH: Duration = Duration::from_millis(50);

    fn dispatcher(backend: &MockBackend, panel: &SharedPanel, layout: &[ActionElement], registry: &ActionRegistry) -> Dispatcher {
        let client = ActionClient::new(&backend.url).unwrap();
        Dispatcher::setup_actions(&client, panel, layout, registry, FLASH).unwrap()
    }

    #[tokio::test]
    async fn test_missing_gatherer_sends_empty_object() {
        let backend = MockBackend::start().await;
        let panel = SharedPanel::default();
        let layout = [ActionElement::new("tare", "tareButton")];
        let dispatcher = dispatcher(&backend, &panel, &layout, &ActionRegistry::new());

        let outcome = dispatcher.click("tareButton").await.unwrap();

        assert!(matches!(outcome, QueryOutcome::Sent(_)));
        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/tare");
        assert_eq!(requests[0].json(), json!({}));
    }

    #[tokio::test]
    async fn test_visual_state_cycle() {
        let backend = MockBackend::start().await;
        let panel = SharedPanel::default();
        let layout = [ActionElement::new("tare", "tareButton")];
        let dispatcher = dispatcher(&backend, &panel, &layout, &ActionRegistry::new());

        dispatcher.click("tareButton").await.unwrap();
        {
            let panel = panel.read();
            assert!(!panel.has_class("tareButton", WORKING));
            assert!(panel.has_class("tareButton", FINISHED));
        }

        tokio::time::sleep(FLASH * 4).await;
        assert!(!panel.read().has_class("tareButton", FINISHED));
    }

    #[tokio::test]
    async fn test_gatherer_body_and_handler() {
        let backend = MockBackend::start().await;
        backend.respond("mount_device", r#"{"message": "Mounted."}"#);
        let panel = SharedPanel::default();
        panel.write().set_value("deviceSelect", "sda1");

        let registry = ActionRegistry::new()
            .gather("mount_device", |panel| Ok(json!({"device": panel.value("deviceSelect")})))
            .handle("mount_device", |panel, data, output| {
                panel.set_text(output.unwrap_or("mountResult"), data["message"].as_str().unwrap_or_default());
                Ok(())
            });
        let layout = [ActionElement::new("mount_device", "mountButton")];
        let dispatcher = dispatcher(&backend, &panel, &layout, &registry);

        dispatcher.click("mountButton").await.unwrap();

        let requests = backend.requests_to("mount_device");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].json(), json!({"device": "sda1"}));
        assert_eq!(panel.read().text("mountResult"), "Mounted.");
    }

    #[tokio::test]
    async fn test_declared_output_reaches_handler() {
        let backend = MockBackend::start().await;
        backend.respond("unmount_device", r#"{"message": "Ejected."}"#);
        let panel = SharedPanel::default();

        let registry = ActionRegistry::new().handle("unmount_device", |panel, data, output| {
            panel.set_text(output.unwrap_or("mountResult"), data["message"].as_str().unwrap_or_default());
            Ok(())
        });
        let layout = [ActionElement::new("unmount_device", "unmountButton").with_output("ejectResult")];
        let dispatcher = dispatcher(&backend, &panel, &layout, &registry);

        dispatcher.click("unmountButton").await.unwrap();

        let panel = panel.read();
        assert_eq!(panel.text("ejectResult"), "Ejected.");
        assert_eq!(panel.text("mountResult"), "");
    }

    #[tokio::test]
    async fn test_invalid_gatherer_alerts_without_request() {
        let backend = MockBackend::start().await;
        let panel = SharedPanel::default();
        let registry = ActionRegistry::new()
            .gather("activate", |_| Err(InvalidInput::new("Height override needs a value.")));
        let layout = [ActionElement::new("activate", "activateButton")];
        let dispatcher = dispatcher(&backend, &panel, &layout, &registry);

        let outcome = dispatcher.click("activateButton").await.unwrap();

        assert_eq!(outcome, QueryOutcome::Aborted);
        assert!(backend.requests().is_empty());
        let panel = panel.read();
        assert!(!panel.has_class("activateButton", WORKING));
        assert!(!panel.has_class("activateButton", FINISHED));
        assert_eq!(panel.alerts(), ["Height override needs a value."]);
    }

    #[tokio::test]
    async fn test_declared_get_method_has_no_body() {
        let backend = MockBackend::start().await;
        let panel = SharedPanel::default();
        let registry = ActionRegistry::new().gather("photos", |_| Ok(json!({"query": "123"})));
        let layout = [ActionElement::new("photos", "photosButton").with_method("GET")];
        let dispatcher = dispatcher(&backend, &panel, &layout, &registry);

        dispatcher.click("photosButton").await.unwrap();

        let requests = backend.requests();
        assert_eq!(requests[0].method, "GET");
        assert!(requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_control() {
        let backend = MockBackend::start().await;
        let panel = SharedPanel::default();
        let dispatcher = dispatcher(&backend, &panel, &[], &ActionRegistry::new());

        let result = dispatcher.click("nowhere").await;
        assert!(matches!(result, Err(PanelError::UnknownControl(name)) if name == "nowhere"));
    }

    #[tokio::test]
    async fn test_transport_error_clears_working() {
        let panel = SharedPanel::default();
        let client = ActionClient::new("http://127.0.0.1:1").unwrap();
        let layout = [ActionElement::new("tare", "tareButton")];
        let dispatcher = Dispatcher::setup_actions(&client, &panel, &layout, &ActionRegistry::new(), FLASH).unwrap();

        let result = dispatcher.click("tareButton").await;

        assert!(matches!(result, Err(PanelError::Http { .. })));
        assert!(!panel.read().has_class("tareButton", WORKING));
    }

    #[test]
    fn test_bad_declared_method_fails_setup() {
        let panel = SharedPanel::default();
        let client = ActionClient::new("http://127.0.0.1:5000").unwrap();
        let layout = [ActionElement::new("tare", "tareButton").with_method("BAD METHOD")];
        let result = Dispatcher::setup_actions(&client, &panel, &layout, &ActionRegistry::new(), FLASH);
        assert!(matches!(result, Err(PanelError::BadMethod(_))));
    }
}
