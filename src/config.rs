use crate::app_dirs::AppDirs;
use crate::schedule::SessionConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistence seam for the session timing settings.
pub trait ConfigStore {
    fn load(&self) -> SessionConfig;
    fn save(&self, config: &SessionConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("drillcall_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> SessionConfig {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(config) = serde_json::from_slice::<SessionConfig>(&bytes) {
                return config;
            }
        }
        SessionConfig::default()
    }

    fn save(&self, config: &SessionConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(config).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
