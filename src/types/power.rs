//! Power mode for light control.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Power state for a light, as the API spells it (`"on"` / `"off"`).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PowerMode {
    /// Turn the light on
    On,
    /// Turn the light off
    Off,
}
