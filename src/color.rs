use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BurnerError;

/// 8-bit RGB color, written as `#rrggbb` (or `#rgb`) in config and subtitle files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    pub fn r(&self) -> u8 {
        self.0[0]
    }

    pub fn g(&self) -> u8 {
        self.0[1]
    }

    pub fn b(&self) -> u8 {
        self.0[2]
    }
}

impl FromStr for Rgb {
    type Err = BurnerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let hex = value.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(BurnerError::Config(format!("Invalid color '{}'", value)));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(BurnerError::Config(format!("Invalid color '{}'", value))),
        };

        let mut rgb = [0u8; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            *channel = u8::from_str_radix(&expanded[i * 2..i * 2 + 2], 16)
                .map_err(|_| BurnerError::Config(format!("Invalid color '{}'", value)))?;
        }
        Ok(Rgb(rgb))
    }
}

impl TryFrom<String> for Rgb {
    type Error = BurnerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r(), self.g(), self.b())
    }
}
