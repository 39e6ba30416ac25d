//! Configuration loading and parsing.
//!
//! Parses `marionette.toml` (or an override path provided by the binary)
//! into the engine's configuration surface: vision model identifiers and
//! timeout, executor defaults, screen-dimension hints for the validator,
//! safety switches, and the file-queue bridge directories. Unknown fields
//! are ignored (TOML deserialization tolerance) so configs can carry keys
//! for newer builds without breaking older ones.
//!
//! Screen hints deserve a note: they are validator hints, not truth. The
//! runtime probes the real monitor at startup and `apply_probed_dimensions`
//! fills in any hint left at zero, logging when the probe disagrees with an
//! explicit value.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "marionette.toml";

/// Environment variable holding the vision API key. The only env var the
/// engine consults; everything else comes from this file.
pub const VISION_API_KEY_ENV: &str = "MARIONETTE_VISION_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct VisionConfig {
    #[serde(default = "VisionConfig::default_primary")]
    pub primary_model: String,
    #[serde(default = "VisionConfig::default_fallback")]
    pub fallback_model: String,
    #[serde(default = "VisionConfig::default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "VisionConfig::default_endpoint")]
    pub endpoint: String,
}

impl VisionConfig {
    fn default_primary() -> String {
        "gemini-2.0-flash".to_string()
    }
    fn default_fallback() -> String {
        "gemini-1.5-flash".to_string()
    }
    const fn default_timeout_ms() -> u64 {
        30_000
    }
    fn default_endpoint() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            primary_model: Self::default_primary(),
            fallback_model: Self::default_fallback(),
            timeout_ms: Self::default_timeout_ms(),
            endpoint: Self::default_endpoint(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub default_wait_after_ms: u64,
}

/// Validator hints. Zero means "unknown, probe at runtime".
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenConfig {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    #[serde(default = "SafetyConfig::default_enable_abort_flag")]
    pub enable_abort_flag: bool,
    #[serde(default)]
    pub interrupt_on_user_mouse_move: bool,
}

impl SafetyConfig {
    const fn default_enable_abort_flag() -> bool {
        true
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enable_abort_flag: Self::default_enable_abort_flag(),
            interrupt_on_user_mouse_move: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "BridgeConfig::default_inbox")]
    pub inbox: PathBuf,
    #[serde(default = "BridgeConfig::default_outbox")]
    pub outbox: PathBuf,
    #[serde(default = "BridgeConfig::default_poll_ms")]
    pub poll_ms: u64,
}

impl BridgeConfig {
    fn default_inbox() -> PathBuf {
        PathBuf::from("inbox")
    }
    fn default_outbox() -> PathBuf {
        PathBuf::from("outbox")
    }
    const fn default_poll_ms() -> u64 {
        250
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            inbox: Self::default_inbox(),
            outbox: Self::default_outbox(),
            poll_ms: Self::default_poll_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_dir")]
    pub dir: PathBuf,
}

impl LogConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from(".")
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Best-effort config path following platform conventions (XDG / AppData
/// Roaming). Prefers a `marionette.toml` in the working directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("marionette").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Load configuration, falling back to defaults when the file is missing.
/// A file that exists but fails to parse is an error: silently ignoring a
/// typo in a safety-relevant config is worse than refusing to start.
pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    match fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
            info!(target: "config", file = %path.display(), "config_loaded");
            Ok(cfg)
        }
        Err(_) => {
            info!(target: "config", file = %path.display(), "config_missing_using_defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Fill zero screen hints from a runtime monitor probe. Returns the
    /// effective dimensions. Explicit hints win but a disagreement with the
    /// probe is logged, since out-of-bounds warnings would then be produced
    /// against stale dimensions.
    pub fn apply_probed_dimensions(&mut self, probed: Option<(u32, u32)>) -> (u32, u32) {
        if let Some((pw, ph)) = probed {
            if self.screen.width == 0 {
                self.screen.width = pw;
            } else if self.screen.width != pw {
                warn!(
                    target: "config",
                    hint = self.screen.width,
                    probed = pw,
                    "screen_width_hint_disagrees_with_probe"
                );
            }
            if self.screen.height == 0 {
                self.screen.height = ph;
            } else if self.screen.height != ph {
                warn!(
                    target: "config",
                    hint = self.screen.height,
                    probed = ph,
                    "screen_height_hint_disagrees_with_probe"
                );
            }
        }
        (self.screen.width, self.screen.height)
    }
}
