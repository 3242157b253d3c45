use crate::app_dirs::AppDirs;
use crate::command::Library;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistence seam for the command library. The library is one JSON
/// document (commands, groups, presets, id counter); a missing or
/// unreadable file loads as an empty library.
pub trait LibraryStore {
    fn load(&self) -> Library;
    fn save(&self, library: &Library) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileLibraryStore {
    path: PathBuf,
}

impl FileLibraryStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::library_path().unwrap_or_else(|| PathBuf::from("drillcall_library.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileLibraryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryStore for FileLibraryStore {
    fn load(&self) -> Library {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(library) = serde_json::from_slice::<Library>(&bytes) {
                return library;
            }
        }
        Library::default()
    }

    fn save(&self, library: &Library) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(library).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::GroupColor;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = FileLibraryStore::with_path(dir.path().join("nope.json"));
        assert_eq!(store.load(), Library::default());
    }

    #[test]
    fn roundtrip_preserves_the_whole_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("library.json");
        let store = FileLibraryStore::with_path(&path);

        let mut library = Library::default();
        let gid = library.add_group("footwork", GroupColor::Orange);
        let cid = library.add_command("crossover", Some(gid));
        library.set_audio_path(&cid, Some(PathBuf::from("/audio/crossover.wav")));
        library.set_session_count(&cid, 3);
        library.toggle_selected(&cid);
        library.record_play(&cid);
        library.save_preset("default", Some("plain run".to_string()));

        store.save(&library).unwrap();
        let loaded = store.load();
        assert_eq!(library, loaded);

        // Id allocation continues where it left off after a reload
        let mut loaded = loaded;
        let new_id = loaded.add_command("spin", None);
        assert_ne!(new_id, cid);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileLibraryStore::with_path(&path);
        assert_eq!(store.load(), Library::default());
    }
}
