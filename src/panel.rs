use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{trace, warn};

/// Class set on a control while its request is in flight
pub const WORKING: &str = "working";
/// Class set on a control briefly after its request resolved
pub const FINISHED: &str = "finished";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    Red,
}

/// Image shown in a gallery element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// A displayable node on the panel
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub text: String,
    pub html: Option<String>,
    pub classes: BTreeSet<String>,
    pub title: Option<String>,
    pub color: Option<TextColor>,
    pub images: Vec<Image>,
    pub options: Vec<SelectOption>,
}

impl Element {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    fn is_blank(&self) -> bool {
        self.text.is_empty()
            && self.html.is_none()
            && self.classes.is_empty()
            && self.title.is_none()
            && self.images.is_empty()
            && self.options.is_empty()
    }
}

/// A form control the user types into or toggles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input {
    pub value: String,
    pub checked: bool,
}

/// In-memory page: display elements, form inputs and pending alerts
#[derive(Debug, Default)]
pub struct Panel {
    elements: BTreeMap<String, Element>,
    inputs: BTreeMap<String, Input>,
    alerts: Vec<String>,
}

impl Panel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Elements spring into existence on first write
    pub fn element_mut(&mut self, id: &str) -> &mut Element {
        self.elements.entry(id.to_string()).or_default()
    }

    pub fn text(&self, id: &str) -> &str {
        self.elements.get(id).map(|e| e.text.as_str()).unwrap_or("")
    }

    pub fn set_text(&mut self, id: &str, text: impl Into<String>) {
        let text = text.into();
        trace!(element = id, %text, "write");
        let element = self.element_mut(id);
        element.text = text;
        element.html = None;
    }

    pub fn set_html(&mut self, id: &str, html: impl Into<String>) {
        let element = self.element_mut(id);
        element.html = Some(html.into());
        element.text.clear();
    }

    pub fn set_title(&mut self, id: &str, title: impl Into<String>) {
        self.element_mut(id).title = Some(title.into());
    }

    pub fn set_color(&mut self, id: &str, color: Option<TextColor>) {
        self.element_mut(id).color = color;
    }

    pub fn add_class(&mut self, id: &str, class: &str) {
        self.element_mut(id).classes.insert(class.to_string());
    }

    pub fn remove_class(&mut self, id: &str, class: &str) {
        if let Some(element) = self.elements.get_mut(id) {
            element.classes.remove(class);
        }
    }

    pub fn has_class(&self, id: &str, class: &str) -> bool {
        self.elements.get(id).map_or(false, |e| e.has_class(class))
    }

    /// Current value of an input, empty when the input was never touched
    pub fn value(&self, id: &str) -> &str {
        self.inputs.get(id).map(|i| i.value.as_str()).unwrap_or("")
    }

    pub fn checked(&self, id: &str) -> bool {
        self.inputs.get(id).map_or(false, |i| i.checked)
    }

    pub fn set_value(&mut self, id: &str, value: impl Into<String>) {
        self.inputs.entry(id.to_string()).or_default().value = value.into();
    }

    pub fn set_checked(&mut self, id: &str, checked: bool) {
        self.inputs.entry(id.to_string()).or_default().checked = checked;
    }

    pub fn alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("⚠️ {}", message);
        self.alerts.push(message);
    }

    #[cfg(test)]
    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, element) in self.elements.iter().filter(|(_, e)| !e.is_blank()) {
            write!(f, "#{}", id)?;
            if !element.classes.is_empty() {
                let classes: Vec<&str> = element.classes.iter().map(String::as_str).collect();
                write!(f, " [{}]", classes.join(" "))?;
            }
            if let Some(color) = element.color {
                write!(f, " ({:?})", color)?;
            }
            if let Some(html) = &element.html {
                write!(f, " html={:?}", html)?;
            } else if !element.text.is_empty() {
                write!(f, " {:?}", element.text)?;
            }
            if let Some(title) = &element.title {
                write!(f, " title={:?}", title)?;
            }
            if !element.images.is_empty() {
                write!(f, " images={}", element.images.len())?;
            }
            if !element.options.is_empty() {
                let labels: Vec<&str> = element.options.iter().map(|o| o.label.as_str()).collect();
                write!(f, " options=[{}]", labels.join(", "))?;
            }
            writeln!(f)?;
        }
        for (id, input) in &self.inputs {
            writeln!(f, "input {} = {:?}{}", id, input.value, if input.checked { " (checked)" } else { "" })?;
        }
        Ok(())
    }
}

/// Panel handle shared by the console, dispatcher and poller.
///
/// The lock is only held for synchronous reads and writes, never across an await.
#[derive(Debug, Clone, Default)]
pub struct SharedPanel(Arc<RwLock<Panel>>);

impl SharedPanel {
    pub fn new(panel: Panel) -> Self {
        Self(Arc::new(RwLock::new(panel)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Panel> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Panel> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}
