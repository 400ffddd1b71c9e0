use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder shown for a scalar the station left out of a reply
pub const MISSING_VALUE: &str = "n/a";

/// Measurement record returned by activate, grab_data, photos and saved
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataReport {
    pub valid: bool,
    pub size: Option<Value>,
    pub weight: Option<Value>,
    pub height: Option<Value>,
    pub time: Option<Value>,
    pub photos: Vec<String>,
}

impl DataReport {
    /// One-line summary written into the data result element
    pub fn summary(&self) -> String {
        format!(
            "Size: {}, weight: {}, height: {}, time: {}.",
            scalar_text(self.size.as_ref()),
            scalar_text(self.weight.as_ref()),
            scalar_text(self.height.as_ref()),
            scalar_text(self.time.as_ref()),
        )
    }
}

/// Block devices seen by the station
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesReply {
    pub devices: Vec<String>,
}

/// Plain `{message}` reply used by mount and unmount
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageReply {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRow {
    #[serde(rename = "ItemLookupCode")]
    pub item_lookup_code: String,
}

/// Reply from the external ILC lookup service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupReply {
    pub data: Vec<LookupRow>,
    #[serde(default)]
    pub table: String,
}

/// Render a JSON scalar the way it reads on the panel
pub fn scalar_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING_VALUE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
