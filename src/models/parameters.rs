//! Mark parameter record pushed to the scancard.

use serde::{Deserialize, Serialize};

/// Laser and motion tuning values for one parameter slot.
///
/// Field names follow the device's JSON keys. The device does not accept
/// partial updates, so the record is always sent whole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkParameters {
    pub mark_speed: f64,
    pub jump_speed: f64,
    pub jump_delay: f64,
    pub laser_on_delay: f64,
    pub polygon_delay: f64,
    pub laser_off_delay: f64,
    pub polygon_killer_time: f64,
    pub laser_frequency: f64,
    pub current: f64,
    pub first_pulse_killer_length: f64,
    pub pulse_width: f64,
    pub first_pulse_width: f64,
    pub increment_step: f64,
}

impl MarkParameters {
    /// Field names paired with their values, in wire order.
    pub fn fields(&self) -> [(&'static str, f64); 13] {
        [
            ("markSpeed", self.mark_speed),
            ("jumpSpeed", self.jump_speed),
            ("jumpDelay", self.jump_delay),
            ("laserOnDelay", self.laser_on_delay),
            ("polygonDelay", self.polygon_delay),
            ("laserOffDelay", self.laser_off_delay),
            ("polygonKillerTime", self.polygon_killer_time),
            ("laserFrequency", self.laser_frequency),
            ("current", self.current),
            ("firstPulseKillerLength", self.first_pulse_killer_length),
            ("pulseWidth", self.pulse_width),
            ("firstPulseWidth", self.first_pulse_width),
            ("incrementStep", self.increment_step),
        ]
    }

    /// Name of the first field that is negative or not a finite number.
    pub fn invalid_field(&self) -> Option<&'static str> {
        self.fields()
            .into_iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
            .map(|(name, _)| name)
    }
}

impl Default for MarkParameters {
    fn default() -> Self {
        Self {
            mark_speed: 1000.0,
            jump_speed: 4000.0,
            jump_delay: 100.0,
            laser_on_delay: 100.0,
            polygon_delay: 50.0,
            laser_off_delay: 100.0,
            polygon_killer_time: 0.0,
            laser_frequency: 20.0,
            current: 50.0,
            first_pulse_killer_length: 0.0,
            pulse_width: 10.0,
            first_pulse_width: 0.0,
            increment_step: 0.0,
        }
    }
}
