//! Playback speed as a rational frame rate
//!
//! Film and video rates like 23.976 are really 24000/1001, so speed is kept
//! as a fraction and only turned into a float for display or timing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Rational frames-per-second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawSpeed")]
pub struct Speed {
    num: u32,
    den: u32,
}

/// Unchecked wire form; zero components are clamped through `Speed::new`
#[derive(Deserialize)]
struct RawSpeed {
    num: u32,
    den: u32,
}

impl From<RawSpeed> for Speed {
    fn from(raw: RawSpeed) -> Self {
        Speed::new(raw.num, raw.den)
    }
}

/// Standard playback rates offered by the player
pub const PRESETS: &[Speed] = &[
    Speed::new_const(1, 1),
    Speed::new_const(3, 1),
    Speed::new_const(6, 1),
    Speed::new_const(12, 1),
    Speed::new_const(15, 1),
    Speed::new_const(16, 1),
    Speed::new_const(18, 1),
    Speed::new_const(24000, 1001),
    Speed::new_const(24, 1),
    Speed::new_const(25, 1),
    Speed::new_const(30000, 1001),
    Speed::new_const(30, 1),
    Speed::new_const(50, 1),
    Speed::new_const(60000, 1001),
    Speed::new_const(60, 1),
    Speed::new_const(120, 1),
];

impl Default for Speed {
    fn default() -> Self {
        Self::new_const(24, 1)
    }
}

impl Speed {
    const fn new_const(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Create a speed; a zero numerator or denominator falls back to 24 fps
    pub fn new(num: u32, den: u32) -> Self {
        if num == 0 || den == 0 {
            log::warn!("Invalid speed {}/{}, using 24 fps", num, den);
            return Self::default();
        }
        Self { num, den }
    }

    /// Nearest preset within 0.01 fps, otherwise a millisecond-precise fraction
    pub fn from_fps(fps: f64) -> Self {
        if !fps.is_finite() || fps <= 0.0 {
            log::warn!("Invalid fps {}, using 24 fps", fps);
            return Self::default();
        }
        if let Some(preset) = PRESETS.iter().find(|p| (p.fps() - fps).abs() < 0.01) {
            return *preset;
        }
        Self::new((fps * 1000.0).round() as u32, 1000)
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    pub fn fps(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Wall-clock duration of a single frame
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.den as f64 / self.num as f64)
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{:.3}", self.fps())
        }
    }
}

impl FromStr for Speed {
    type Err = String;

    /// Accepts "24", "23.976" or "24000/1001"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((num, den)) = s.split_once('/') {
            let num = num.trim().parse::<u32>().map_err(|e| format!("bad speed '{}': {}", s, e))?;
            let den = den.trim().parse::<u32>().map_err(|e| format!("bad speed '{}': {}", s, e))?;
            if num == 0 || den == 0 {
                return Err(format!("bad speed '{}': zero component", s));
            }
            return Ok(Self { num, den });
        }
        let fps = s.parse::<f64>().map_err(|e| format!("bad speed '{}': {}", s, e))?;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(format!("bad speed '{}': must be positive", s));
        }
        Ok(Self::from_fps(fps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_zero_speed_falls_back() {
        let speed: Speed = serde_json::from_str(r#"{"num":0,"den":1}"#).unwrap();
        assert_eq!(speed, Speed::default());
        assert_eq!(speed.frame_duration(), Duration::from_secs_f64(1.0 / 24.0));

        let speed: Speed = serde_json::from_str(r#"{"num":30000,"den":1001}"#).unwrap();
        assert_eq!(speed, Speed::new(30000, 1001));
    }

    #[test]
    fn test_ntsc_rates_snap_to_presets() {
        let speed = Speed::from_fps(23.976);
        assert_eq!((speed.num(), speed.den()), (24000, 1001));
        assert_eq!(speed.to_string(), "23.976");

        let speed: Speed = "29.97".parse().unwrap();
        assert_eq!((speed.num(), speed.den()), (30000, 1001));
    }

    #[test]
    fn test_parse_fraction_and_integer() {
        let speed: Speed = "24000/1001".parse().unwrap();
        assert_eq!(speed, Speed::from_fps(23.976));
        let speed: Speed = "25".parse().unwrap();
        assert_eq!(speed.to_string(), "25");
        assert!("0/1".parse::<Speed>().is_err());
        assert!("-3".parse::<Speed>().is_err());
    }

    #[test]
    fn test_frame_duration() {
        let speed = Speed::new(25, 1);
        assert_eq!(speed.frame_duration(), Duration::from_millis(40));
        assert_eq!(Speed::new(0, 1), Speed::default());
    }
}
