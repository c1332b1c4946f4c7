use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "data-meter";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_SAMPLE_INTERVAL_SECS: f64 = 2.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Data directory override; falls back to the platform default.
    pub data_dir: Option<PathBuf>,
    /// Seconds between sampler fetches during live tracking.
    pub sample_interval_secs: f64,
    /// URL fetched once per tick to simulate data consumption.
    pub fetch_url: String,
}

impl CliConfig {
    /// Validated sampler interval. The raw field is user-edited TOML, so
    /// negative, zero and non-finite values must be rejected before they
    /// reach `Duration::from_secs_f64`, which panics on them.
    pub fn sample_interval(&self) -> Result<Duration, String> {
        let secs = self.sample_interval_secs;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(format!(
                "sample_interval_secs must be a positive number, got {secs}"
            ));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            fetch_url: meter_app::DEFAULT_FETCH_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: CliConfig,
    pub paths: ConfigPaths,
    pub created: bool,
}

pub fn load_or_create() -> Result<ConfigLoad, String> {
    let dir = config_dir()?;
    fs::create_dir_all(&dir)
        .map_err(|err| format!("create config dir {}: {}", dir.display(), err))?;
    let file = dir.join(CONFIG_FILE_NAME);
    let paths = ConfigPaths { file };

    if paths.file.exists() {
        let contents = fs::read_to_string(&paths.file)
            .map_err(|err| format!("read config {}: {}", paths.file.display(), err))?;
        let config: CliConfig = toml::from_str(&contents)
            .map_err(|err| format!("parse config {}: {}", paths.file.display(), err))?;
        return Ok(ConfigLoad {
            config,
            paths,
            created: false,
        });
    }

    let config = CliConfig::default();
    let contents =
        toml::to_string_pretty(&config).map_err(|err| format!("serialize config: {}", err))?;
    fs::write(&paths.file, contents)
        .map_err(|err| format!("write config {}: {}", paths.file.display(), err))?;

    Ok(ConfigLoad {
        config,
        paths,
        created: true,
    })
}

fn config_dir() -> Result<PathBuf, String> {
    if let Ok(dir) = std::env::var("DATA_METER_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    Ok(PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME))
}
