//! Kiln configuration, read from `kiln/config.json` in xdg config directories.

use crate::debug::DebugMask;
use std::path::PathBuf;

/// Kiln configuration
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Seed for generated inputs
    pub seed: u64,
    /// Generated inputs are standard normal values multiplied by this
    pub input_scale: f32,
    /// Debug mask bits, see [DebugMask]
    pub debug: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { seed: 69420, input_scale: 8.0, debug: 0 }
    }
}

impl Config {
    /// Search through config directories and find kiln/config.json.
    /// If not found or failed to parse, use defaults.
    /// `KILN_DEBUG` and `KILN_SEED` override values from the file.
    #[must_use]
    pub fn load() -> Self {
        let mut debug = DebugMask::from_env();
        let mut config = Self::find_config_file()
            .and_then(|(path, file)| {
                serde_json::from_str::<Config>(&file)
                    .map_err(|e| {
                        if debug.dev() {
                            tracing::warn!("Failed to parse {}, {e}", path.display());
                        }
                    })
                    .ok()
            })
            .inspect(|_| {
                if debug.dev() {
                    tracing::info!("Config successfully read and parsed.");
                }
            })
            .unwrap_or_else(|| {
                if debug.dev() {
                    tracing::info!("Failed to get config, using defaults.");
                }
                Config::default()
            });
        if debug.bits() != 0 {
            config.debug = debug.bits();
        } else {
            debug = DebugMask::new(config.debug);
        }
        if let Some(seed) = std::env::var("KILN_SEED").ok().and_then(|x| x.parse().ok()) {
            if debug.dev() {
                tracing::info!("Using seed {seed} from KILN_SEED");
            }
            config.seed = seed;
        }
        config
    }

    /// Parse config from json text, missing fields take default values.
    pub fn from_json(text: &str) -> Result<Self, crate::KilnError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Debug mask of this config
    #[must_use]
    pub const fn debug_mask(&self) -> DebugMask {
        DebugMask::new(self.debug)
    }

    fn find_config_file() -> Option<(PathBuf, String)> {
        let bd = xdg::BaseDirectories::new()
            .map_err(|e| tracing::debug!("Failed to find config directories for config.json, {e}"))
            .ok()?;
        let mut dirs = bd.get_config_dirs();
        dirs.push(bd.get_config_home());
        dirs.into_iter().find_map(|mut path| {
            path.push("kiln/config.json");
            std::fs::read_to_string(&path).ok().map(|file| (path, file))
        })
    }
}

#[test]
fn partial_config_keeps_defaults() -> Result<(), crate::KilnError> {
    let config = Config::from_json(r#"{ "seed": 7 }"#)?;
    assert_eq!(config.seed, 7);
    assert_eq!(config.input_scale, 8.0);
    assert_eq!(config.debug, 0);
    assert!(Config::from_json("{ seed: }").is_err());
    Ok(())
}
