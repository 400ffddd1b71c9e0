use serde_json::{json, Value};

use crate::actions::{decode, ActionRegistry};
use crate::display::{self, DATA_RESULT, DEVICE_SELECT, GALLERY};
use crate::error::{InvalidInput, PanelError};
use crate::panel::Panel;
use crate::types::{DataReport, DevicesReply, MessageReply};

pub const ILC_INPUT: &str = "ilc";
pub const HEIGHT_OVERRIDE: &str = "heightOverride";
pub const HEIGHT_OVERRIDE_ENABLED: &str = "heightOverrideEnabled";
pub const LIGHTS_VALUE: &str = "lightsValue";
pub const LIGHTS_ENABLED: &str = "lightsEnabled";
pub const MOUNT_RESULT: &str = "mountResult";

/// Lights slider level, forced to 0 while the lights are switched off
pub fn light_level(panel: &Panel) -> Result<u32, InvalidInput> {
    if !panel.checked(LIGHTS_ENABLED) {
        return Ok(0);
    }
    let raw = panel.value(LIGHTS_VALUE).trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse()
        .map_err(|_| InvalidInput::new(format!("Light level \"{}\" is not a whole number.", raw)))
}

pub fn get_query(panel: &Panel) -> Result<Value, InvalidInput> {
    Ok(json!({
        "query": panel.value(ILC_INPUT),
        "light_level": light_level(panel)?,
    }))
}

/// Query plus the optional height override
pub fn gather_info(panel: &Panel) -> Result<Value, InvalidInput> {
    let mut data = get_query(panel)?;
    let height_override = if panel.checked(HEIGHT_OVERRIDE_ENABLED) {
        let raw = panel.value(HEIGHT_OVERRIDE).trim();
        if raw.is_empty() {
            return Err(InvalidInput::new("Height override is enabled but no height was entered."));
        }
        let height: f64 = raw
            .parse()
            .map_err(|_| InvalidInput::new(format!("Height override \"{}\" is not a number.", raw)))?;
        json!(height)
    } else {
        Value::Null
    };
    data["height_override"] = height_override;
    Ok(data)
}

pub fn get_mount_device(panel: &Panel) -> Result<Value, InvalidInput> {
    Ok(json!({ "device": panel.value(DEVICE_SELECT) }))
}

fn show_data(panel: &mut Panel, data: &Value, output: Option<&str>) -> Result<(), PanelError> {
    let report: DataReport = decode("grab_data", data)?;
    display::display_data_on(panel, output.unwrap_or(DATA_RESULT), &report);
    Ok(())
}

fn show_photos(panel: &mut Panel, data: &Value, output: Option<&str>) -> Result<(), PanelError> {
    let report: DataReport = decode("photos", data)?;
    display::display_photos_on(panel, output.unwrap_or(GALLERY), &report);
    Ok(())
}

/// The declared output takes the summary; photos always go to the gallery
fn show_activation(panel: &mut Panel, data: &Value, output: Option<&str>) -> Result<(), PanelError> {
    let report: DataReport = decode("activate", data)?;
    display::display_data_on(panel, output.unwrap_or(DATA_RESULT), &report);
    display::display_photos(panel, &report);
    Ok(())
}

// The selector doubles as the mount gatherers' input, so it never moves
fn refresh_devices(panel: &mut Panel, data: &Value, _output: Option<&str>) -> Result<(), PanelError> {
    let reply: DevicesReply = decode("block_devices", data)?;
    display::update_device_list(panel, &reply.devices);
    Ok(())
}

fn write_mount_result(panel: &mut Panel, data: &Value, output: Option<&str>) -> Result<(), PanelError> {
    let reply: MessageReply = decode("mount_device", data)?;
    let message = reply.message.unwrap_or_default();
    tracing::info!("💾 {}", message);
    display::update_on(panel, output.unwrap_or(MOUNT_RESULT), &message);
    Ok(())
}

/// Gatherers and handlers for the measuring station's actions
pub fn registry() -> ActionRegistry {
    ActionRegistry::new()
        .gather("activate", gather_info)
        .gather("photos", get_query)
        .gather("grab_data", gather_info)
        .gather("mount_device", get_mount_device)
        .gather("unmount_device", get_mount_device)
        .gather("export", get_mount_device)
        .handle("photos", show_photos)
        .handle("grab_data", show_data)
        .handle("activate", show_activation)
        .handle("block_devices", refresh_devices)
        .handle("mount_device", write_mount_result)
        .handle("unmount_device", write_mount_result)
}
