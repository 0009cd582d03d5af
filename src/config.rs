use crate::error::IncbakError;
use crate::filter::parse_filters;
use crate::utils::validate_directory;
use crate::Result;
use configparser::ini::Ini;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const MIN_INTERVAL_SECS: u64 = 10;
pub const MAX_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

const SECTION: &str = "incbak";

/// Immutable snapshot the engine runs against.
///
/// The scheduler clones it at `start`, so edits made afterwards only apply
/// to the next schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub source_root: PathBuf,
    pub backup_root: PathBuf,
    /// Lowercase filters; empty means every file is eligible
    pub extension_filters: BTreeSet<String>,
    pub interval_secs: u64,
}

impl BackupConfig {
    /// Build a validated config with canonical roots
    pub fn new(
        source_root: impl AsRef<Path>,
        backup_root: impl AsRef<Path>,
        extension_filters: BTreeSet<String>,
        interval_secs: u64,
    ) -> Result<Self> {
        let config = BackupConfig {
            source_root: validate_directory(source_root.as_ref(), "Source folder")?,
            backup_root: validate_directory(backup_root.as_ref(), "Backup folder")?,
            extension_filters: extension_filters
                .into_iter()
                .map(|filter| filter.to_lowercase())
                .collect(),
            interval_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Re-check a snapshot before it enters the run loop
    pub fn validate(&self) -> Result<()> {
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&self.interval_secs) {
            return Err(IncbakError::config_invalid(format!(
                "interval must be between {MIN_INTERVAL_SECS} and {MAX_INTERVAL_SECS} seconds, got {}",
                self.interval_secs
            )));
        }

        let source_root = validate_directory(&self.source_root, "Source folder")?;
        let backup_root = validate_directory(&self.backup_root, "Backup folder")?;

        if backup_root.starts_with(&source_root) {
            return Err(IncbakError::config_invalid(format!(
                "backup folder {} must not be inside the source folder {}",
                backup_root.display(),
                source_root.display()
            )));
        }

        Ok(())
    }
}

/// The persisted, user-editable settings record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source_dir: PathBuf,
    pub backup_dir: PathBuf,
    /// Comma-separated, as typed by the user
    pub filter_types: String,
    pub interval: u64,
    pub live_countdown: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            source_dir: PathBuf::new(),
            backup_dir: PathBuf::new(),
            filter_types: String::new(),
            interval: DEFAULT_INTERVAL_SECS,
            live_countdown: false,
        }
    }
}

impl Settings {
    /// Parse the filter list and build a validated engine config
    pub fn to_backup_config(&self) -> Result<BackupConfig> {
        BackupConfig::new(
            &self.source_dir,
            &self.backup_dir,
            parse_filters(&self.filter_types),
            self.interval,
        )
    }
}

/// Load settings from `path`, falling back to defaults when it does not exist
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let mut conf = Ini::new();
    conf.load(path)
        .map_err(|e| IncbakError::settings(format!("Failed to parse settings file: {e}")))?;

    let mut settings = Settings::default();

    if let Some(value) = conf.get(SECTION, "source_dir") {
        settings.source_dir = PathBuf::from(value);
    }
    if let Some(value) = conf.get(SECTION, "backup_dir") {
        settings.backup_dir = PathBuf::from(value);
    }
    if let Some(value) = conf.get(SECTION, "filter_types") {
        settings.filter_types = value;
    }
    if let Some(value) = conf.get(SECTION, "interval") {
        settings.interval = value
            .parse()
            .map_err(|_| IncbakError::settings(format!("Invalid interval: {value}")))?;
    }
    if let Some(value) = conf.get(SECTION, "live_countdown") {
        settings.live_countdown = parse_bool(&value).unwrap_or(settings.live_countdown);
    }

    Ok(settings)
}

/// Rewrite the settings file at `path`
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut conf = Ini::new();
    conf.set(
        SECTION,
        "source_dir",
        Some(settings.source_dir.to_string_lossy().into_owned()),
    );
    conf.set(
        SECTION,
        "backup_dir",
        Some(settings.backup_dir.to_string_lossy().into_owned()),
    );
    conf.set(SECTION, "filter_types", Some(settings.filter_types.clone()));
    conf.set(SECTION, "interval", Some(settings.interval.to_string()));
    conf.set(
        SECTION,
        "live_countdown",
        Some(settings.live_countdown.to_string()),
    );

    conf.write(path)
        .map_err(|e| IncbakError::settings(format!("Failed to write settings file: {e}")))
}

/// Get the settings file path for the current platform
pub fn settings_path() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return Ok(PathBuf::from(appdata).join("incbak").join("settings.ini"));
        }
    }

    if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
        Ok(PathBuf::from(config_dir)
            .join("incbak")
            .join("settings.ini"))
    } else if let Some(home) = std::env::var_os("HOME") {
        Ok(PathBuf::from(home)
            .join(".config")
            .join("incbak")
            .join("settings.ini"))
    } else {
        Err(IncbakError::settings("Could not determine config directory"))
    }
}

/// Parse a boolean value from INI string
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Display the effective settings
pub fn dump_config(path: &Path, settings: &Settings) {
    println!("incbak Settings");
    println!("===============");
    println!();

    if path.exists() {
        println!("Settings file: {} (found)", path.display());
    } else {
        println!("Settings file: {} (not found, using defaults)", path.display());
    }
    println!();

    println!("source_dir     = {}", settings.source_dir.display());
    println!("backup_dir     = {}", settings.backup_dir.display());
    println!("filter_types   = {}", settings.filter_types);
    println!("interval       = {}", settings.interval);
    println!("live_countdown = {}", settings.live_countdown);
    println!();

    match settings.to_backup_config() {
        Ok(config) if config.extension_filters.is_empty() => {
            println!("Configuration is valid; all file types are backed up.")
        }
        Ok(config) => {
            let filters: Vec<&str> = config.extension_filters.iter().map(String::as_str).collect();
            println!("Configuration is valid; backing up: {}", filters.join(", "));
        }
        Err(e) => println!("Configuration is not usable yet: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn dirs() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let backup = dir.path().join("backup");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&backup).unwrap();
        (dir, source, backup)
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.interval, 60);
        assert!(!settings.live_countdown);
        assert!(settings.filter_types.is_empty());
        assert_eq!(settings.source_dir, PathBuf::new());
    }

    #[test]
    fn test_backup_config_new() {
        let (_dir, source, backup) = dirs();
        let filters = [".TXT".to_string()].into_iter().collect();

        let config = BackupConfig::new(&source, &backup, filters, 30).unwrap();

        assert!(config.source_root.is_absolute());
        assert_eq!(config.source_root, source.canonicalize().unwrap());
        assert!(config.extension_filters.contains(".txt"));
        assert_eq!(config.interval_secs, 30);
    }

    #[test]
    fn test_interval_bounds() {
        let (_dir, source, backup) = dirs();

        assert!(BackupConfig::new(&source, &backup, BTreeSet::new(), 10).is_ok());
        assert!(BackupConfig::new(&source, &backup, BTreeSet::new(), 3600).is_ok());

        for bad in [0, 9, 3601] {
            match BackupConfig::new(&source, &backup, BTreeSet::new(), bad) {
                Err(IncbakError::ConfigInvalid { message }) => assert!(message.contains("interval")),
                other => panic!("Expected ConfigInvalid for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_roots_are_invalid() {
        let (dir, source, _backup) = dirs();
        let missing = dir.path().join("missing");

        assert!(matches!(
            BackupConfig::new(&source, &missing, BTreeSet::new(), 60),
            Err(IncbakError::ConfigInvalid { .. })
        ));
        assert!(matches!(
            BackupConfig::new(&missing, &source, BTreeSet::new(), 60),
            Err(IncbakError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_backup_inside_source_is_invalid() {
        let (_dir, source, _backup) = dirs();
        let nested = source.join("backup");
        fs::create_dir_all(&nested).unwrap();

        assert!(matches!(
            BackupConfig::new(&source, &nested, BTreeSet::new(), 60),
            Err(IncbakError::ConfigInvalid { .. })
        ));
        assert!(matches!(
            BackupConfig::new(&source, &source, BTreeSet::new(), 60),
            Err(IncbakError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_validate_detects_removed_root() {
        let (_dir, source, backup) = dirs();
        let config = BackupConfig::new(&source, &backup, BTreeSet::new(), 60).unwrap();
        assert!(config.validate().is_ok());

        fs::remove_dir_all(&backup).unwrap();
        assert!(matches!(
            config.validate(),
            Err(IncbakError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_settings_to_backup_config() {
        let (_dir, source, backup) = dirs();
        let settings = Settings {
            source_dir: source,
            backup_dir: backup,
            filter_types: " .TXT , .pdf,".to_string(),
            interval: 120,
            live_countdown: true,
        };

        let config = settings.to_backup_config().unwrap();
        let filters: Vec<&str> = config.extension_filters.iter().map(String::as_str).collect();
        assert_eq!(filters, vec![".pdf", ".txt"]);
        assert_eq!(config.interval_secs, 120);
    }

    #[test]
    fn test_load_settings_nonexistent_file() {
        let dir = tempdir().unwrap();
        let settings = load_settings(&dir.path().join("settings.ini")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.ini");
        let settings = Settings {
            source_dir: PathBuf::from("/home/user/documents"),
            backup_dir: PathBuf::from("/mnt/usb/backup"),
            filter_types: ".txt,.pdf".to_string(),
            interval: 300,
            live_countdown: true,
        };

        save_settings(&path, &settings).unwrap();
        assert!(path.exists());

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_settings_partial_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.ini");
        fs::write(&path, "[incbak]\ninterval = 15\nlive_countdown = yes\n").unwrap();

        let settings = load_settings(&path).unwrap();
        let default = Settings::default();

        assert_eq!(settings.interval, 15);
        assert!(settings.live_countdown);
        assert_eq!(settings.source_dir, default.source_dir);
        assert_eq!(settings.filter_types, default.filter_types);
    }

    #[test]
    fn test_invalid_values_in_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.ini");

        fs::write(&path, "[incbak]\nlive_countdown = maybe\n").unwrap();
        let settings = load_settings(&path).unwrap();
        assert!(!settings.live_countdown);

        fs::write(&path, "[incbak]\ninterval = soon\n").unwrap();
        match load_settings(&path) {
            Err(IncbakError::Settings { message }) => assert!(message.contains("soon")),
            other => panic!("Expected Settings error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool(""), None);
        assert_eq!(parse_bool("maybe"), None);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_settings_path_uses_xdg_config_home() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let original = std::env::var_os("XDG_CONFIG_HOME");

        let dir = tempdir().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", dir.path());

        let path = settings_path().unwrap();
        assert_eq!(path, dir.path().join("incbak").join("settings.ini"));

        match original {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}
