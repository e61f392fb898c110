//! Configuration management for mtools.
//!
//! Settings are read from INI files with the following precedence:
//!
//! 1. Local configuration (`./mtools.cfg`)
//! 2. User configuration (`~/.config/mtools/mtools.cfg`)
//! 3. System configuration (`/etc/mtools/mtools.cfg`)
//! 4. Built-in defaults
//!
//! Each file only overrides the keys it sets, so a local file can change
//! the basis set while keeping library paths from the user file.
//!
//! ```ini
//! [libraries]
//! amino = ~/molaris/lib/amino98.lib
//! parameters = ~/molaris/lib/parm.lib
//! evb = ~/molaris/lib/evb.lib
//!
//! [gaussian]
//! method = B3LYP
//! basis = 6-31G*
//! mem = 1GB
//! nprocs = 1
//! charge_scheme = mulliken
//!
//! [mapping]
//! degree = 6
//!
//! [logging]
//! level = info
//! ```

use crate::gaussian::{ChargeScheme, GaussianInput};
use configparser::ini::Ini;
use log::{debug, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory and config directories.
pub const CONFIG_FILE: &str = "mtools.cfg";

type Section = HashMap<String, Option<String>>;

/// Errors that can occur during configuration loading and processing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error when reading configuration files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// INI parsing error
    #[error("INI parsing error: {0}")]
    IniParse(String),
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// All program settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Default Molaris library files
    pub libraries: LibrarySettings,
    /// Gaussian input defaults
    pub gaussian: GaussianSettings,
    /// Mapping analysis
    pub mapping: MappingSettings,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Default locations of the Molaris library files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySettings {
    /// Amino-acid library (default: `~/molaris/lib/amino98.lib`)
    pub amino: PathBuf,
    /// ENZYMIX parameter library (default: `~/molaris/lib/parm.lib`)
    pub parameters: PathBuf,
    /// EVB parameter library (default: `~/molaris/lib/evb.lib`)
    pub evb: PathBuf,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        let lib = home_dir().join("molaris").join("lib");
        Self {
            amino: lib.join("amino98.lib"),
            parameters: lib.join("parm.lib"),
            evb: lib.join("evb.lib"),
        }
    }
}

/// Defaults for generated Gaussian input decks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianSettings {
    /// Method (default: B3LYP)
    pub method: String,
    /// Basis set (default: 6-31G*)
    pub basis: String,
    /// `%mem` (default: 1GB)
    pub mem: String,
    /// `%nprocshared` (default: 1)
    pub nprocs: usize,
    /// Population analysis (default: mulliken)
    pub charge_scheme: ChargeScheme,
}

impl Default for GaussianSettings {
    fn default() -> Self {
        Self {
            method: "B3LYP".to_string(),
            basis: "6-31G*".to_string(),
            mem: "1GB".to_string(),
            nprocs: 1,
            charge_scheme: ChargeScheme::Mulliken,
        }
    }
}

impl GaussianSettings {
    /// Copies these defaults into `input`.
    pub fn configure(&self, input: &mut GaussianInput) {
        input.method = self.method.clone();
        input.basis = self.basis.clone();
        input.mem = self.mem.clone();
        input.nprocs = self.nprocs;
        input.charge_scheme = self.charge_scheme;
    }
}

/// Mapping analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSettings {
    /// Polynomial degree for the extrema fit (default: 6)
    pub degree: usize,
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self { degree: 6 }
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (default: "info")
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    /// The configured level as a filter.
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("Invalid log level: {}", self.level)))
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_default()
}

/// Expands a leading `~/` with `$HOME`.
pub fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(value),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("Invalid {}: {}", key, value)))
}

/// Configuration manager that handles loading and accessing program settings.
pub struct SettingsManager {
    settings: Settings,
    config_source: String,
}

impl SettingsManager {
    /// Loads settings from the system, user and local files, in that order.
    ///
    /// Unreadable files are skipped with a warning.
    pub fn load() -> Result<Self, ConfigError> {
        let candidates = [
            ("system", Self::get_system_config_path()),
            ("user", Self::get_user_config_path()),
            ("local", Some(PathBuf::from(CONFIG_FILE))),
        ];
        Ok(Self::load_layers(candidates))
    }

    /// Applies each existing file over the defaults, later layers winning.
    fn load_layers<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Option<PathBuf>)>,
    {
        let mut settings = Settings::default();
        let mut config_source = "built-in defaults".to_string();

        for (kind, path) in layers {
            let Some(path) = path.filter(|p| p.exists()) else {
                continue;
            };
            match Self::apply_config(&mut settings, &path) {
                Ok(()) => {
                    config_source = format!("{} config ({})", kind, path.display());
                    debug!("Loaded {} configuration from: {}", kind, path.display());
                }
                Err(e) => warn!(
                    "Failed to load {} config from {}: {}",
                    kind,
                    path.display(),
                    e
                ),
            }
        }

        Self {
            settings,
            config_source,
        }
    }

    /// Loads built-in defaults overridden by a single file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        Self::apply_config(&mut settings, path)?;
        Ok(Self {
            settings,
            config_source: path.display().to_string(),
        })
    }

    /// Returns the source of the loaded configuration.
    pub fn config_source(&self) -> &str {
        &self.config_source
    }

    /// Gets a reference to the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Gets the library paths.
    pub fn libraries(&self) -> &LibrarySettings {
        &self.settings.libraries
    }

    /// Gets the Gaussian defaults.
    pub fn gaussian(&self) -> &GaussianSettings {
        &self.settings.gaussian
    }

    /// Gets the mapping settings.
    pub fn mapping(&self) -> &MappingSettings {
        &self.settings.mapping
    }

    /// Gets the logging settings.
    pub fn logging(&self) -> &LoggingSettings {
        &self.settings.logging
    }

    /// Applies the keys present in one INI file.
    fn apply_config(settings: &mut Settings, path: &Path) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut ini = Ini::new();
        ini.read(content)
            .map_err(|e| ConfigError::IniParse(format!("Failed to parse INI: {}", e)))?;
        let map = ini.get_map_ref();

        if let Some(section) = map.get("libraries") {
            Self::parse_libraries(&mut settings.libraries, section);
        }
        if let Some(section) = map.get("gaussian") {
            Self::parse_gaussian(&mut settings.gaussian, section)?;
        }
        if let Some(section) = map.get("mapping") {
            Self::parse_mapping(&mut settings.mapping, section)?;
        }
        if let Some(section) = map.get("logging") {
            Self::parse_logging(&mut settings.logging, section)?;
        }
        Ok(())
    }

    fn parse_libraries(libraries: &mut LibrarySettings, section: &Section) {
        if let Some(Some(amino)) = section.get("amino") {
            libraries.amino = expand_home(amino);
        }
        if let Some(Some(parameters)) = section.get("parameters") {
            libraries.parameters = expand_home(parameters);
        }
        if let Some(Some(evb)) = section.get("evb") {
            libraries.evb = expand_home(evb);
        }
    }

    fn parse_gaussian(gaussian: &mut GaussianSettings, section: &Section) -> Result<(), ConfigError> {
        if let Some(Some(method)) = section.get("method") {
            gaussian.method = method.clone();
        }
        if let Some(Some(basis)) = section.get("basis") {
            gaussian.basis = basis.clone();
        }
        if let Some(Some(mem)) = section.get("mem") {
            gaussian.mem = mem.clone();
        }
        if let Some(Some(nprocs)) = section.get("nprocs") {
            gaussian.nprocs = parse_value("nprocs", nprocs)?;
            if gaussian.nprocs == 0 {
                return Err(ConfigError::InvalidValue("nprocs must be positive".to_string()));
            }
        }
        if let Some(Some(scheme)) = section.get("charge_scheme") {
            gaussian.charge_scheme = scheme.parse().map_err(ConfigError::InvalidValue)?;
        }
        Ok(())
    }

    fn parse_mapping(mapping: &mut MappingSettings, section: &Section) -> Result<(), ConfigError> {
        if let Some(Some(degree)) = section.get("degree") {
            mapping.degree = parse_value("degree", degree)?;
        }
        Ok(())
    }

    fn parse_logging(logging: &mut LoggingSettings, section: &Section) -> Result<(), ConfigError> {
        if let Some(Some(level)) = section.get("level") {
            logging.level = level.trim().to_lowercase();
            logging.level_filter()?;
        }
        Ok(())
    }

    /// Gets the system configuration file path.
    fn get_system_config_path() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            Some(PathBuf::from("/etc/mtools").join(CONFIG_FILE))
        }
        #[cfg(windows)]
        {
            std::env::var("PROGRAMDATA")
                .ok()
                .map(|pd| PathBuf::from(pd).join("mtools").join(CONFIG_FILE))
        }
    }

    /// Gets the user configuration file path.
    fn get_user_config_path() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            std::env::var("HOME").ok().map(|home| {
                PathBuf::from(home)
                    .join(".config")
                    .join("mtools")
                    .join(CONFIG_FILE)
            })
        }
        #[cfg(windows)]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|appdata| PathBuf::from(appdata).join("mtools").join(CONFIG_FILE))
        }
    }
}

impl SettingsManager {
    /// Writes a commented settings file holding the built-in defaults.
    pub fn create_template(path: &Path) -> Result<(), ConfigError> {
        fs::write(path, Self::generate_template_content())?;
        info!("Created settings template at: {}", path.display());
        Ok(())
    }

    fn generate_template_content() -> String {
        let gaussian = GaussianSettings::default();
        let scheme = match gaussian.charge_scheme {
            ChargeScheme::Mulliken => "mulliken",
            ChargeScheme::Chelpg => "chelpg",
            ChargeScheme::MerzKollman => "mk",
        };
        format!(
            r#"# mtools configuration file
#
# Files are read in this order, later files overriding earlier ones:
#
# 1. /etc/mtools/mtools.cfg
# 2. ~/.config/mtools/mtools.cfg
# 3. ./mtools.cfg
#
# Keys left out keep their built-in defaults.

[libraries]
# Molaris library files used when a command is given no explicit path.
# A leading ~/ is replaced by $HOME.
amino = ~/molaris/lib/amino98.lib
parameters = ~/molaris/lib/parm.lib
evb = ~/molaris/lib/evb.lib

[gaussian]
# Route defaults for generated input decks
method = {}
basis = {}
mem = {}
nprocs = {}

# mulliken, chelpg or mk
charge_scheme = {}

[mapping]
# Polynomial degree used to locate mapping extrema
degree = {}

[logging]
# debug, info, warn or error; RUST_LOG overrides this
level = {}
"#,
            gaussian.method,
            gaussian.basis,
            gaussian.mem,
            gaussian.nprocs,
            scheme,
            MappingSettings::default().degree,
            LoggingSettings::default().level,
        )
    }
}
