use chrono::{DateTime, Utc};

use crate::panel::{Image, Panel, SelectOption};
use crate::types::DataReport;

pub const GALLERY: &str = "photosGallery";
pub const DATA_RESULT: &str = "dataResult";
pub const DEVICE_SELECT: &str = "deviceSelect";

/// MIME prefix for base64 photo payloads
pub const PHOTO_URI_PREFIX: &str = "data:image/jpeg;base64,";

pub fn write_on(panel: &mut Panel, id: &str, text: impl Into<String>) {
    panel.set_text(id, text);
}

/// Write text followed by the current unix time in milliseconds
pub fn update_on(panel: &mut Panel, id: &str, text: &str) {
    update_on_at(panel, id, text, Utc::now());
}

pub fn update_on_at(panel: &mut Panel, id: &str, text: &str, now: DateTime<Utc>) {
    write_on(panel, id, format!("{} ({})", text, now.timestamp_millis()));
}

/// Replace a gallery's images with one per base64 photo, in order
pub fn fill_gallery(panel: &mut Panel, id: &str, photos: &[String]) {
    panel.element_mut(id).images = photos
        .iter()
        .map(|payload| Image { src: format!("{}{}", PHOTO_URI_PREFIX, payload) })
        .collect();
}

/// Replace the device selector options; the first device ends up selected
pub fn update_device_list(panel: &mut Panel, devices: &[String]) {
    panel.element_mut(DEVICE_SELECT).options = devices
        .iter()
        .map(|name| SelectOption { value: name.clone(), label: name.clone() })
        .collect();
    let selected = devices.first().cloned().unwrap_or_default();
    panel.set_value(DEVICE_SELECT, selected);
}

pub fn display_data(panel: &mut Panel, report: &DataReport) {
    display_data_on(panel, DATA_RESULT, report);
}

pub fn display_data_on(panel: &mut Panel, id: &str, report: &DataReport) {
    if report.valid {
        write_on(panel, id, report.summary());
    } else {
        write_on(panel, id, "No saved data found.");
    }
}

pub fn display_photos(panel: &mut Panel, report: &DataReport) {
    display_photos_on(panel, GALLERY, report);
}

pub fn display_photos_on(panel: &mut Panel, id: &str, report: &DataReport) {
    let photos: &[String] = if report.valid { &report.photos } else { &[] };
    fill_gallery(panel, id, photos);
}

/// Empty everything an element displays
pub fn clear(panel: &mut Panel, id: &str) {
    let element = panel.element_mut(id);
    element.text.clear();
    element.html = None;
    element.images.clear();
    element.options.clear();
}
