use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::preset::{Language, Preset};

/// Namespaced key the user config blob is stored under.
pub const CONFIG_KEY: &str = "treetype_config";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserConfig {
    pub preset: Preset,
    pub language: Language,
}

pub trait ConfigStore {
    /// Stored config, or the default when nothing usable is stored.
    fn load(&self) -> UserConfig;
    fn save(&self, cfg: &UserConfig) -> std::io::Result<()>;
}

/// Keeps the config as one JSON blob named after [`CONFIG_KEY`].
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let file_name = format!("{CONFIG_KEY}.json");
        let path = match AppDirs::config_dir() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> UserConfig {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return UserConfig::default(),
        };
        match serde_json::from_slice::<UserConfig>(&bytes) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "ignoring unreadable config");
                UserConfig::default()
            }
        }
    }

    fn save(&self, cfg: &UserConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_is_standard_python() {
        let cfg = UserConfig::default();
        assert_eq!(cfg.preset, Preset::Standard);
        assert_eq!(cfg.language, Language::Python);
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested").join("config.json"));
        let cfg = UserConfig {
            preset: Preset::Full,
            language: Language::Tsx,
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn stored_as_lowercase_names() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        store
            .save(&UserConfig {
                preset: Preset::Minimal,
                language: Language::Typescript,
            })
            .unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"minimal\""));
        assert!(raw.contains("\"typescript\""));
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), UserConfig::default());
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{\"preset\": \"turbo\"").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), UserConfig::default());

        fs::write(&path, "{\"preset\": \"turbo\", \"language\": \"python\"}").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), UserConfig::default());
    }
}
