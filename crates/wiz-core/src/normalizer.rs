//! Raw status → [`BulbState`]
//!
//! Bulbs report a loosely typed `getPilot` result. Any field may be missing
//! or carry an unexpected type depending on firmware and bulb class; such
//! fields normalize to `None` instead of failing the refresh.

use serde_json::Value;

use crate::model::BulbState;
use crate::scenes::{self, RHYTHM_SCENE_ID};
use crate::traits::RawStatus;

/// Normalize a bulb's status payload
pub fn normalize(raw: &RawStatus) -> BulbState {
    let scene_id = scene_id(raw);
    BulbState {
        power_state: raw.get("state").and_then(Value::as_bool),
        scene_id,
        scene_name: scene_id
            .filter(|id| *id != 0)
            .and_then(scenes::scene_name)
            .map(str::to_string),
        brightness: raw
            .get("dimming")
            .and_then(Value::as_f64)
            .map(percent_to_brightness),
    }
}

fn scene_id(raw: &RawStatus) -> Option<u32> {
    if raw.get("schdPsetId").is_some() {
        return Some(RHYTHM_SCENE_ID);
    }
    raw.get("sceneId")
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok())
}

/// Convert a 0-100 dimming percentage to a 0-255 brightness
pub fn percent_to_brightness(percent: f64) -> u8 {
    let percent = percent.clamp(0.0, 100.0);
    (percent * 255.0 / 100.0).round() as u8
}

/// Convert a 0-255 brightness to the bulb's dimming percentage
///
/// Bulbs reject dimming below 10%.
pub fn brightness_to_percent(brightness: u8) -> u8 {
    let percent = (f64::from(brightness) * 100.0 / 255.0).round() as u8;
    percent.max(10)
}
