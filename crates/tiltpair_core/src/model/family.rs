//! Particle family configuration.
//!
//! # Responsibility
//! - Hold the settings shared by every pick of one picking session.
//! - Provide the namespace used for per-micrograph output records.
//!
//! # Invariants
//! - `name` is non-blank; it becomes the record block name on disk.
//! - `size` is a positive box size in pixels.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static HEX_COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#?([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").expect("valid color regex")
});

pub const DEFAULT_FAMILY_NAME: &str = "DefaultFamily";
pub const DEFAULT_PARTICLE_SIZE: u32 = 100;

/// Display color of a family, serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const GREEN: Color = Color::rgb(0, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` or `RRGGBB` (case-insensitive).
    pub fn parse_hex(value: &str) -> Result<Self, FamilyError> {
        let captures = HEX_COLOR_RE
            .captures(value.trim())
            .ok_or_else(|| FamilyError::InvalidColor(value.to_string()))?;
        let channel = |index: usize| {
            u8::from_str_radix(&captures[index], 16)
                .map_err(|_| FamilyError::InvalidColor(value.to_string()))
        };
        Ok(Self::rgb(channel(1)?, channel(2)?, channel(3)?))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::GREEN
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = FamilyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

/// Validation errors for family settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyError {
    BlankName,
    ZeroSize,
    InvalidColor(String),
}

impl Display for FamilyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "family name must not be blank"),
            Self::ZeroSize => write!(f, "family particle size must be positive"),
            Self::InvalidColor(value) => {
                write!(f, "invalid family color `{value}`; expected #RRGGBB")
            }
        }
    }
}

impl Error for FamilyError {}

/// Settings shared by all picks of a picker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    name: String,
    #[serde(default = "default_size")]
    size: u32,
    #[serde(default)]
    color: Color,
}

impl Family {
    pub fn new(name: impl Into<String>, size: u32, color: Color) -> Self {
        Self {
            name: name.into(),
            size,
            color,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_size(&mut self, size: u32) {
        self.size = size;
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn validate(&self) -> Result<(), FamilyError> {
        if self.name.trim().is_empty() {
            return Err(FamilyError::BlankName);
        }
        if self.size == 0 {
            return Err(FamilyError::ZeroSize);
        }
        Ok(())
    }
}

impl Default for Family {
    fn default() -> Self {
        Self::new(DEFAULT_FAMILY_NAME, DEFAULT_PARTICLE_SIZE, Color::default())
    }
}

fn default_size() -> u32 {
    DEFAULT_PARTICLE_SIZE
}

#[cfg(test)]
mod tests {
    use super::{Color, Family, FamilyError};

    #[test]
    fn color_parses_with_and_without_hash() {
        assert_eq!(Color::parse_hex("#FF8000").unwrap(), Color::rgb(255, 128, 0));
        assert_eq!(Color::parse_hex("00ff00").unwrap(), Color::GREEN);
    }

    #[test]
    fn color_rejects_short_values() {
        let err = Color::parse_hex("#FFF").unwrap_err();
        assert_eq!(err, FamilyError::InvalidColor("#FFF".to_string()));
    }

    #[test]
    fn color_display_is_uppercase_hex() {
        assert_eq!(Color::rgb(1, 171, 255).to_string(), "#01ABFF");
    }

    #[test]
    fn validate_rejects_blank_name_and_zero_size() {
        let blank = Family::new("  ", 10, Color::GREEN);
        assert_eq!(blank.validate(), Err(FamilyError::BlankName));

        let zero = Family::new("ribosome", 0, Color::GREEN);
        assert_eq!(zero.validate(), Err(FamilyError::ZeroSize));

        assert!(Family::default().validate().is_ok());
    }
}
