//! Config manager for loading, saving, and atomic updates.
//!
//! Writes go to a temp file in the same directory and are renamed into
//! place. Section updates go through toml_edit so the other tables, and
//! any comments in them, survive untouched.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings and the file they came from.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Create a manager for `config_path` holding default settings.
    ///
    /// Nothing is read until one of the `load*` methods is called.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a mutable reference to the current settings.
    ///
    /// Changes stay in memory until `save()` or `update_section()`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Consume the manager, keeping the settings.
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Load config from file.
    ///
    /// Returns `NotFound` if the file doesn't exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }
        let content = fs::read_to_string(&self.config_path)?;
        self.settings = toml::from_str(&content)?;
        tracing::debug!(path = %self.config_path.display(), "Loaded config");
        Ok(())
    }

    /// Load config from file, keeping defaults if it doesn't exist.
    ///
    /// Never writes to disk.
    pub fn load_or_default(&mut self) -> ConfigResult<()> {
        match self.load() {
            Err(ConfigError::NotFound(path)) => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                self.settings = Settings::default();
                Ok(())
            }
            other => other,
        }
    }

    /// Load config from file, creating it with defaults if it doesn't exist.
    ///
    /// A file with unknown tables or missing keys is rewritten in full.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, was_modified) = parse_and_clean(&content)?;
            self.settings = settings;
            if was_modified {
                tracing::info!(path = %self.config_path.display(), "Rewriting config with defaults");
                self.save()?;
            }
        } else {
            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.render()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Rewrite only `section` in the file on disk.
    ///
    /// The file is re-read first, so edits made to other tables since the
    /// last load are kept.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = current_content.parse()?;
        let section_doc: DocumentMut = self.section_toml(section)?.parse()?;
        doc[section.table_name()] = Item::Table(section_doc.as_table().clone());

        self.atomic_write(&doc.to_string())?;
        Ok(())
    }

    fn section_toml(&self, section: ConfigSection) -> ConfigResult<String> {
        let text = match section {
            ConfigSection::Engine => toml::to_string_pretty(&self.settings.engine)?,
            ConfigSection::Logging => toml::to_string_pretty(&self.settings.logging)?,
            ConfigSection::NoiseTest => toml::to_string_pretty(&self.settings.noise_test)?,
        };
        Ok(text)
    }

    /// Full file content, one commented table per section.
    fn render(&self) -> ConfigResult<String> {
        let mut output = String::from("# track-align configuration\n");
        for section in ConfigSection::ALL {
            output.push('\n');
            output.push_str(&format!("# {}\n", section.description()));
            output.push_str(&format!("[{}]\n", section.table_name()));
            output.push_str(&self.section_toml(section)?);
        }
        Ok(output)
    }

    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.config_path)?;

        tracing::debug!(path = %self.config_path.display(), "Wrote config");
        Ok(())
    }
}

/// Parse `content`, reporting whether it lacked keys or had unknown tables.
fn parse_and_clean(content: &str) -> ConfigResult<(Settings, bool)> {
    let doc: DocumentMut = content.parse()?;
    let settings: Settings = toml::from_str(content)?;

    let known: Vec<&str> = ConfigSection::ALL.iter().map(|s| s.table_name()).collect();
    let has_unknown = doc.iter().any(|(key, _)| !known.contains(&key));

    let reparsed: DocumentMut = toml::to_string_pretty(&settings)?.parse()?;
    let missing_keys = ConfigSection::ALL.iter().any(|section| {
        let name = section.table_name();
        let expected = reparsed.get(name).and_then(Item::as_table_like);
        let present = doc.get(name).and_then(Item::as_table_like);
        match (expected, present) {
            (Some(expected), Some(present)) => {
                expected.iter().any(|(key, _)| !present.contains_key(key))
            }
            (Some(_), None) => true,
            _ => false,
        }
    });

    Ok((settings, has_unknown || missing_keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ResampleQuality;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join("track-align.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[engine]"));
        assert!(content.contains("[logging]"));
        assert!(content.contains("[noise_test]"));

        let mut reloaded = ConfigManager::new(&config_path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings(), &Settings::default());
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("track-align.toml");
        fs::write(&config_path, "[engine]\nworking_sample_rate = 8000.0\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().engine.working_sample_rate, 8000.0);
        // Missing tables were filled in on disk.
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[noise_test]"));
        assert!(content.contains("working_sample_rate = 8000.0"));
    }

    #[test]
    fn complete_file_is_not_rewritten() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("track-align.toml");
        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let mut content = fs::read_to_string(&config_path).unwrap();
        content.push_str("# kept by hand\n");
        fs::write(&config_path, &content).unwrap();

        manager.load_or_create().unwrap();
        assert!(fs::read_to_string(&config_path)
            .unwrap()
            .contains("# kept by hand"));
    }

    #[test]
    fn missing_file_loads_defaults_without_writing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("absent.toml");

        let mut manager = ConfigManager::new(&config_path);
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
        manager.load_or_default().unwrap();
        assert_eq!(manager.settings(), &Settings::default());
        assert!(!config_path.exists());
    }

    #[test]
    fn update_section_only_changes_target() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("track-align.toml");
        fs::write(
            &config_path,
            "# engine tuned by hand\n[engine]\nthread_count = 8\n\n[logging]\nsend_messages = false\n",
        )
        .unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load().unwrap();
        manager.settings_mut().logging.send_messages = true;
        manager.settings_mut().engine.resample_quality = ResampleQuality::Nearest;
        manager.update_section(ConfigSection::Logging).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("send_messages = true"));
        assert!(content.contains("# engine tuned by hand"));
        assert!(content.contains("thread_count = 8"));
        assert!(!content.contains("nearest"));
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("track-align.toml");
        fs::write(&config_path, "[engine]\nthread_count = \"many\"\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        assert!(matches!(manager.load(), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn atomic_write_creates_no_temp_on_success() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("track-align.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(!config_path.with_extension("toml.tmp").exists());
    }
}
