//! Brightness control for cloud lights.

use serde::{Deserialize, Serialize};

/// Brightness level from 0 to 100 percent.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Default for Brightness {
    fn default() -> Self {
        Self::new()
    }
}

impl Brightness {
    const MAX: u8 = 100;

    pub fn new() -> Self {
        Brightness { value: Self::MAX }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Returns None if value is above 100.
    pub fn create(value: u8) -> Option<Self> {
        if Self::is_valid(value) {
            Some(Brightness { value })
        } else {
            None
        }
    }

    /// Returns default (100%) if value is invalid.
    pub fn create_or(value: u8) -> Self {
        Self::create(value).unwrap_or_default()
    }

    /// Scale a 0-255 level, as used by most home-automation front ends.
    ///
    /// # Examples
    ///
    /// ```
    /// use govee_lights_rs::Brightness;
    ///
    /// assert_eq!(Brightness::from_255(255).value(), 100);
    /// assert_eq!(Brightness::from_255(128).value(), 50);
    /// assert_eq!(Brightness::from_255(0).value(), 0);
    /// ```
    pub fn from_255(level: u8) -> Self {
        Brightness {
            value: (u16::from(level) * 100 / 255) as u8,
        }
    }

    fn is_valid(value: u8) -> bool {
        value <= Self::MAX
    }
}
