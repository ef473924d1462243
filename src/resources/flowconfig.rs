//! Flow configuration resource.
//!
//! Manages runtime settings loaded from an INI configuration file. Provides
//! defaults for safe startup and methods to load/save configuration.
//!
//! # Configuration File Format
//!
//! ```ini
//! [flow]
//! time_in_state_parameter = TimeInState
//! animation_finished_parameter = AnimationFinished
//!
//! [animation]
//! default_fps = 12
//! default_frame_count = 1
//!
//! [simulation]
//! delta = 0.016666
//! ticks = 120
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

/// Default safe values for startup
pub const DEFAULT_TIME_IN_STATE_PARAMETER: &str = "TimeInState";
pub const DEFAULT_ANIMATION_FINISHED_PARAMETER: &str = "AnimationFinished";
const DEFAULT_FPS: f32 = 12.0;
const DEFAULT_FRAME_COUNT: usize = 1;
const DEFAULT_DELTA: f32 = 1.0 / 60.0;
const DEFAULT_TICKS: u32 = 120;
const DEFAULT_CONFIG_PATH: &str = "./animflow.ini";

/// Flow configuration resource.
///
/// Stores the reserved parameter names controllers write each tick, the clip
/// defaults used when a flow description does not define its animations, and
/// the fixed step used by the simulator.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct FlowConfig {
    /// Parameter receiving the seconds spent in the active state.
    pub time_in_state_parameter: String,
    /// Parameter receiving whether the active animation has finished.
    pub animation_finished_parameter: String,
    /// Playback speed of clips not defined by the flow description.
    pub default_fps: f32,
    /// Frame count of clips not defined by the flow description.
    pub default_frame_count: usize,
    /// Fixed tick delta in seconds.
    pub delta: f32,
    /// Number of ticks to simulate.
    pub ticks: u32,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            time_in_state_parameter: DEFAULT_TIME_IN_STATE_PARAMETER.to_string(),
            animation_finished_parameter: DEFAULT_ANIMATION_FINISHED_PARAMETER.to_string(),
            default_fps: DEFAULT_FPS,
            default_frame_count: DEFAULT_FRAME_COUNT,
            delta: DEFAULT_DELTA,
            ticks: DEFAULT_TICKS,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;

        // [flow] section
        if let Some(name) = config.get("flow", "time_in_state_parameter") {
            if !name.is_empty() {
                self.time_in_state_parameter = name;
            }
        }
        if let Some(name) = config.get("flow", "animation_finished_parameter") {
            if !name.is_empty() {
                self.animation_finished_parameter = name;
            }
        }

        // [animation] section
        if let Some(fps) = config.getfloat("animation", "default_fps").ok().flatten() {
            self.default_fps = fps as f32;
        }
        if let Some(frames) = config
            .getuint("animation", "default_frame_count")
            .ok()
            .flatten()
        {
            self.default_frame_count = frames as usize;
        }

        // [simulation] section
        if let Some(delta) = config.getfloat("simulation", "delta").ok().flatten() {
            self.delta = delta as f32;
        }
        if let Some(ticks) = config.getuint("simulation", "ticks").ok().flatten() {
            self.ticks = ticks as u32;
        }

        info!(
            "Loaded config: time_in_state={}, animation_finished={}, fps={}, frames={}, delta={}, ticks={}",
            self.time_in_state_parameter,
            self.animation_finished_parameter,
            self.default_fps,
            self.default_frame_count,
            self.delta,
            self.ticks
        );

        Ok(())
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        // [flow] section
        config.set(
            "flow",
            "time_in_state_parameter",
            Some(self.time_in_state_parameter.clone()),
        );
        config.set(
            "flow",
            "animation_finished_parameter",
            Some(self.animation_finished_parameter.clone()),
        );

        // [animation] section
        config.set("animation", "default_fps", Some(self.default_fps.to_string()));
        config.set(
            "animation",
            "default_frame_count",
            Some(self.default_frame_count.to_string()),
        );

        // [simulation] section
        config.set("simulation", "delta", Some(self.delta.to_string()));
        config.set("simulation", "ticks", Some(self.ticks.to_string()));

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }
}
