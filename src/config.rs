//! Surface configuration
//!
//! Defaults can be overridden through `GLSURFACE_*` environment variables.

use std::str::FromStr;

use log::debug;

use crate::error::ConfigError;
use crate::geometry::Size;

/// Initial settings for a surface and its window
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfig {
    /// Window title
    pub title: String,
    /// Initial content size in points
    pub size: Size,
    /// Target frame rate for the timer driver
    pub frame_rate: f64,
    /// Drive frames from the display refresh instead of a timer
    pub use_display_link: bool,
    /// Non-opaque window and context
    pub translucent: bool,
    /// Set the viewport and clear before every draw
    pub enable_setup_screen: bool,
    /// Install global/local event monitors at setup
    pub window_events: bool,
    /// Letterbox the viewport to this width/height ratio
    pub keep_aspect: Option<f64>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            title: "glsurface".to_string(),
            size: Size::new(1024.0, 768.0),
            frame_rate: 60.0,
            use_display_link: false,
            translucent: false,
            enable_setup_screen: true,
            window_events: false,
            keep_aspect: None,
        }
    }
}

impl SurfaceConfig {
    /// Build a configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(title) = lookup("GLSURFACE_TITLE") {
            config.title = title;
        }
        if let Some(width) = parse(&lookup, "GLSURFACE_WIDTH")? {
            config.size.width = positive("GLSURFACE_WIDTH", width)?;
        }
        if let Some(height) = parse(&lookup, "GLSURFACE_HEIGHT")? {
            config.size.height = positive("GLSURFACE_HEIGHT", height)?;
        }
        if let Some(fps) = parse(&lookup, "GLSURFACE_FPS")? {
            config.frame_rate = positive("GLSURFACE_FPS", fps)?;
        }
        if let Some(v) = flag(&lookup, "GLSURFACE_DISPLAY_LINK")? {
            config.use_display_link = v;
        }
        if let Some(v) = flag(&lookup, "GLSURFACE_TRANSLUCENT")? {
            config.translucent = v;
        }
        if let Some(v) = flag(&lookup, "GLSURFACE_WINDOW_EVENTS")? {
            config.window_events = v;
        }
        if let Some(aspect) = parse(&lookup, "GLSURFACE_KEEP_ASPECT")? {
            config.keep_aspect = Some(positive("GLSURFACE_KEEP_ASPECT", aspect)?);
        }

        debug!("Surface config: {:?}", config);
        Ok(config)
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, raw)),
        None => Ok(None),
    }
}

fn positive(key: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(key, value))
    }
}

fn flag<F>(lookup: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(invalid(key, raw)),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = SurfaceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SurfaceConfig::default());
        assert_eq!(config.frame_rate, 60.0);
        assert!(!config.use_display_link);
    }

    #[test]
    fn test_overrides() {
        let config = SurfaceConfig::from_lookup(lookup(&[
            ("GLSURFACE_TITLE", "sketch"),
            ("GLSURFACE_WIDTH", "640"),
            ("GLSURFACE_HEIGHT", "480"),
            ("GLSURFACE_FPS", "30"),
            ("GLSURFACE_DISPLAY_LINK", "yes"),
            ("GLSURFACE_KEEP_ASPECT", "1.5"),
        ]))
        .unwrap();

        assert_eq!(config.title, "sketch");
        assert_eq!(config.size, Size::new(640.0, 480.0));
        assert_eq!(config.frame_rate, 30.0);
        assert!(config.use_display_link);
        assert_eq!(config.keep_aspect, Some(1.5));
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = SurfaceConfig::from_lookup(lookup(&[("GLSURFACE_FPS", "0")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "GLSURFACE_FPS".to_string(),
                value: "0".to_string(),
            }
        );

        assert!(SurfaceConfig::from_lookup(lookup(&[("GLSURFACE_TRANSLUCENT", "maybe")])).is_err());
        assert!(SurfaceConfig::from_lookup(lookup(&[("GLSURFACE_WIDTH", "wide")])).is_err());
    }
}
