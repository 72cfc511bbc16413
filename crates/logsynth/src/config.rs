use clap::ValueEnum;
use logsynth_core::GeneratorConfig;
use serde::Deserialize;
use std::path::Path;

/// Contents of a `logsynth.toml` file: generator parameters at the top level
/// plus an optional `[output]` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(flatten)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_count")]
    pub count: u64,
    #[serde(default)]
    pub format: LineFormat,
}

/// Text rendering of events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LineFormat {
    /// `<user> <millis> <operation> <address>`
    #[default]
    Compact,
    /// `[<rfc3339>] /<operation>?user=<hex> <dotted quad>`
    Weblog,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Config = toml::from_str(contents)?;
        config.generator.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `logsynth.toml` in the working directory if
    /// present, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = path {
            let config = Self::load(path)?;
            tracing::info!(path = %path.display(), "loaded config");
            return Ok(config);
        }

        let fallback = Path::new("logsynth.toml");
        if fallback.exists() {
            match Self::load(fallback) {
                Ok(c) => {
                    tracing::info!("loaded config from logsynth.toml");
                    Ok(c)
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to load logsynth.toml");
                    Err(e)
                }
            }
        } else {
            tracing::info!("no logsynth.toml found, using defaults");
            Ok(Config::default())
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            format: LineFormat::default(),
        }
    }
}

fn default_count() -> u64 {
    10_000
}
