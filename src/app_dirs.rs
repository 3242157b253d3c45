use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("drillcall"),
            )
        } else {
            ProjectDirs::from("", "", "drillcall")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "drillcall").map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
    }

    /// Play-history database (sqlite).
    pub fn history_db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("history.db"))
    }

    /// Command library document (json).
    pub fn library_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("library.json"))
    }

    /// Session timing settings (json).
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }
}
