use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::info;

use super::{atomic_io, PersistError};

pub fn load_standings(path: &Path) -> Result<HashMap<String, i32>, PersistError> {
    if !path.exists() {
        info!(path = %path.display(), "no standings file, starting empty");
        return Ok(HashMap::new());
    }
    let raw = fs::read_to_string(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| PersistError::Parse {
        path: path.to_path_buf(),
        detail: source.to_string(),
    })
}

pub fn save_standings(path: &Path, standings: &HashMap<String, i32>) -> Result<(), PersistError> {
    let json = serde_json::to_string_pretty(standings)
        .map_err(|source| PersistError::Encode { source })?;
    atomic_io::write_text_atomic(path, &json).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standings_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("standings.json");
        let mut standings = HashMap::new();
        standings.insert("andrea".to_string(), 20);
        standings.insert("maria".to_string(), 10);

        save_standings(&path, &standings).expect("save");
        let restored = load_standings(&path).expect("load");
        assert_eq!(restored, standings);
    }

    #[test]
    fn missing_standings_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let restored = load_standings(&dir.path().join("standings.json")).expect("load");
        assert!(restored.is_empty());
    }
}
