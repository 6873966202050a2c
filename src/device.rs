//! Cloud device descriptions, reported state, and control commands.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::types::{Brightness, Color, PowerMode};

/// A device registered to the account, as returned by the device listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device id, usually a MAC-like string such as `"99:E5:A4:C1:38:29:DA:7B"`.
    pub device: String,
    pub model: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub controllable: bool,
    #[serde(default)]
    pub retrievable: bool,
    /// Command names the device accepts (`"turn"`, `"brightness"`, `"color"`, ...).
    #[serde(default)]
    pub support_cmds: Vec<String>,
}

impl Device {
    /// The user-facing name, falling back to the device id.
    pub fn name(&self) -> &str {
        self.device_name.as_deref().unwrap_or(&self.device)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceList {
    #[serde(default)]
    pub(crate) devices: Vec<Device>,
}

/// The state payload as sent by the server: a list of single-key objects.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDeviceState {
    device: String,
    model: String,
    #[serde(default)]
    properties: Vec<serde_json::Map<String, Value>>,
}

/// The last state the cloud reported for a device.
///
/// Properties the server did not report, or reported in an unexpected shape,
/// are `None`.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    device: String,
    model: String,
    online: Option<bool>,
    power: Option<PowerMode>,
    brightness: Option<Brightness>,
    color: Option<Color>,
    color_temp: Option<u32>,
}

impl DeviceState {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn online(&self) -> Option<bool> {
        self.online
    }

    pub fn power(&self) -> Option<PowerMode> {
        self.power
    }

    /// Check if the light is on.
    pub fn is_on(&self) -> bool {
        self.power == Some(PowerMode::On)
    }

    pub fn brightness(&self) -> Option<Brightness> {
        self.brightness
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    /// Color temperature in kelvin, when the light is in white mode.
    pub fn color_temp(&self) -> Option<u32> {
        self.color_temp
    }
}

impl From<RawDeviceState> for DeviceState {
    fn from(raw: RawDeviceState) -> Self {
        let mut state = DeviceState {
            device: raw.device,
            model: raw.model,
            online: None,
            power: None,
            brightness: None,
            color: None,
            color_temp: None,
        };

        for (key, value) in raw.properties.iter().flatten() {
            match key.as_str() {
                // Some models send "true"/"false" strings.
                "online" => {
                    state.online = match value {
                        Value::Bool(b) => Some(*b),
                        Value::String(s) => bool::from_str(s).ok(),
                        _ => None,
                    }
                }
                "powerState" => {
                    state.power = value.as_str().and_then(|s| PowerMode::from_str(s).ok())
                }
                "brightness" => {
                    state.brightness = value
                        .as_u64()
                        .and_then(|v| u8::try_from(v).ok())
                        .and_then(Brightness::create)
                }
                "color" => state.color = serde_json::from_value(value.clone()).ok(),
                "colorTem" | "colorTemInKelvin" => {
                    state.color_temp = value.as_u64().and_then(|v| u32::try_from(v).ok())
                }
                _ => {}
            }
        }
        state
    }
}

/// A control command, serialized as `{"name": ..., "value": ...}`.
///
/// # Examples
///
/// ```
/// use govee_lights_rs::{Brightness, Command, PowerMode};
///
/// let cmd = serde_json::to_value(Command::Turn(PowerMode::On)).unwrap();
/// assert_eq!(cmd, serde_json::json!({"name": "turn", "value": "on"}));
///
/// let cmd = serde_json::to_value(Command::Brightness(Brightness::create(40).unwrap())).unwrap();
/// assert_eq!(cmd, serde_json::json!({"name": "brightness", "value": 40}));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "value", rename_all = "camelCase")]
pub enum Command {
    Turn(PowerMode),
    Brightness(Brightness),
    Color(Color),
}

impl Command {
    /// The command name as listed in [`Device::support_cmds`].
    pub fn name(&self) -> &'static str {
        match self {
            Command::Turn(_) => "turn",
            Command::Brightness(_) => "brightness",
            Command::Color(_) => "color",
        }
    }
}
