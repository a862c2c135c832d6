use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Page viewport applied to every tab before navigation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
            device_scale_factor: 1.0,
            is_mobile: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ViewportParseError {
    #[error("Invalid viewport format: expected WIDTHxHEIGHT or WIDTHxHEIGHT@SCALE (e.g., 1440x900@2)")]
    InvalidFormat,
    #[error("Invalid width: {0}")]
    InvalidWidth(String),
    #[error("Invalid height: {0}")]
    InvalidHeight(String),
    #[error("Invalid scale factor: {0}")]
    InvalidScale(String),
    #[error("Width must be positive")]
    ZeroWidth,
    #[error("Height must be positive")]
    ZeroHeight,
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dims, scale) = match s.split_once('@') {
            Some((dims, scale)) => (dims, Some(scale)),
            None => (s, None),
        };

        let parts: Vec<&str> = dims.split('x').collect();
        if parts.len() != 2 {
            return Err(ViewportParseError::InvalidFormat);
        }

        let width: u32 = parts[0]
            .trim()
            .parse()
            .map_err(|_| ViewportParseError::InvalidWidth(parts[0].to_string()))?;

        let height: u32 = parts[1]
            .trim()
            .parse()
            .map_err(|_| ViewportParseError::InvalidHeight(parts[1].to_string()))?;

        if width == 0 {
            return Err(ViewportParseError::ZeroWidth);
        }
        if height == 0 {
            return Err(ViewportParseError::ZeroHeight);
        }

        let device_scale_factor = match scale {
            Some(raw) => {
                let value: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ViewportParseError::InvalidScale(raw.to_string()))?;
                if !(value > 0.0 && value.is_finite()) {
                    return Err(ViewportParseError::InvalidScale(raw.to_string()));
                }
                value
            }
            None => 1.0,
        };

        Ok(Viewport {
            width,
            height,
            device_scale_factor,
            is_mobile: false,
        })
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        if (self.device_scale_factor - 1.0).abs() > f64::EPSILON {
            write!(f, "@{}", self.device_scale_factor)?;
        }
        Ok(())
    }
}
