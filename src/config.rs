use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::viewer::{ScaleRange, ViewerOptions};

const DEFAULT_PPI: f32 = 96.0;
const DEFAULT_VISIBILITY_MARGIN: f64 = 600.0;
const DEFAULT_PAGE_GAP: f64 = 16.0;

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub ppi: Option<f32>,
    #[serde(default)]
    pub viewer: ViewerConfigFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfigFile {
    pub min_scale: Option<f32>,
    pub max_scale: Option<f32>,
    pub scale_step: Option<f32>,
    pub default_scale: Option<f32>,
    pub visibility_margin: Option<f64>,
    pub page_gap: Option<f64>,
    pub scroll_step: Option<u32>,
    pub frame_budget_ms: Option<u64>,
    pub watch_interval_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Pixels per inch at scale 1.0.
    pub ppi: f32,
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub scale: ScaleRange,
    pub visibility_margin: f64,
    pub page_gap: f64,
    pub scroll_step: u32,
    pub frame_budget: Duration,
    pub watch_interval: Duration,
}

impl ViewerConfig {
    /// Controller options for a viewport of the given pixel size.
    pub fn options(&self, viewport_width: f64, viewport_height: f64) -> ViewerOptions {
        ViewerOptions {
            scale: self.scale,
            visibility_margin: self.visibility_margin,
            page_gap: self.page_gap,
            viewport_width,
            viewport_height,
        }
    }
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, scale: Option<f32>, ppi: Option<f32>) {
        if let Some(v) = scale {
            debug!("config: CLI override default_scale={v}");
            self.viewer.default_scale = scale;
        }
        if let Some(v) = ppi {
            debug!("config: CLI override ppi={v}");
            self.ppi = ppi;
        }
    }

    /// Resolve to a Config by applying defaults to missing or invalid fields.
    pub fn resolve(self) -> Config {
        let defaults = ScaleRange::default();
        let v = self.viewer;
        let scale = ScaleRange::new(
            v.min_scale.unwrap_or(defaults.min),
            v.max_scale.unwrap_or(defaults.max),
            v.scale_step.unwrap_or(defaults.step),
            v.default_scale.unwrap_or(defaults.default),
        );
        let config = Config {
            ppi: positive_or("ppi", self.ppi, DEFAULT_PPI),
            viewer: ViewerConfig {
                scale,
                visibility_margin: non_negative_or(
                    "visibility_margin",
                    v.visibility_margin,
                    DEFAULT_VISIBILITY_MARGIN,
                ),
                page_gap: non_negative_or("page_gap", v.page_gap, DEFAULT_PAGE_GAP),
                scroll_step: v.scroll_step.unwrap_or(3).max(1),
                frame_budget: Duration::from_millis(v.frame_budget_ms.unwrap_or(32)),
                watch_interval: Duration::from_millis(v.watch_interval_ms.unwrap_or(200)),
            },
        };
        info!(
            "config: resolved ppi={}, scale=[{}, {}] step {} default {}, \
             visibility_margin={}, page_gap={}, scroll_step={}, \
             frame_budget={}ms, watch_interval={}ms",
            config.ppi,
            config.viewer.scale.min,
            config.viewer.scale.max,
            config.viewer.scale.step,
            config.viewer.scale.default,
            config.viewer.visibility_margin,
            config.viewer.page_gap,
            config.viewer.scroll_step,
            config.viewer.frame_budget.as_millis(),
            config.viewer.watch_interval.as_millis(),
        );
        config
    }
}

fn positive_or(name: &str, value: Option<f32>, default: f32) -> f32 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        Some(v) => {
            warn!("config: invalid {name}={v}, using {default}");
            default
        }
        None => default,
    }
}

fn non_negative_or(name: &str, value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(v) => {
            warn!("config: invalid {name}={v}, using {default}");
            default
        }
        None => default,
    }
}

/// Resolve the XDG config path for pageview.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("pageview").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}
