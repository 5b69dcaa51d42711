use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read {}: {source}", path.display())]
    ReadFailed { path: path::PathBuf, source: io::Error },

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed { path: path::PathBuf, source: io::Error },

    #[error("Failed to parse {}: {source}", path.display())]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("Neither XDG_CONFIG_HOME nor a home directory is available")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub ping: Ping,
    pub hooks: Hooks,
}

/// Defaults applied when the matching CLI flag is absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub interval_secs: f64,
    pub timeout_secs: f64,
    pub max_failures: u32,
    /// Clear the alert on the first success after it was raised
    pub clear_on_recovery: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ping {
    pub program: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hooks {
    /// Interpreter used for success/failure scripts
    pub interpreter: String,
    /// Kill hooks running longer than this; unlimited when absent
    pub timeout_secs: Option<f64>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self { interval_secs: 5.0, timeout_secs: 2.0, max_failures: 3, clear_on_recovery: true }
    }
}

impl Default for Ping {
    fn default() -> Self {
        Self { program: "ping".into() }
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self { interpreter: "bash".into(), timeout_secs: None }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/pingkeeper/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("pingkeeper/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Interval (s)", &self.monitor.interval_secs)?;
        write_1(f, "Timeout (s)", &self.monitor.timeout_secs)?;
        write_1(f, "Max Failures", &self.monitor.max_failures)?;
        write_1(f, "Clear On Recovery", &self.monitor.clear_on_recovery)?;
        write_title_1(f, "Ping")?;
        write_1(f, "Program", &self.ping.program)?;
        write_title_1(f, "Hooks")?;
        write_1(f, "Interpreter", &self.hooks.interpreter)?;
        match self.hooks.timeout_secs {
            Some(timeout) => write_1(f, "Timeout (s)", &timeout)?,
            None => write_1(f, "Timeout (s)", &"none")?,
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/pingkeeper/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| Error::ParseFailed { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }
}
