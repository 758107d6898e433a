use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::anchors::AnchorDescriptor;

mod atomic_io;
mod experience;
mod standings;

pub use experience::{ExperienceArchive, ExperienceData};
pub use standings::{load_standings, save_standings};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode save data: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },
    #[error("save data validation failed: {detail}")]
    Validation { detail: String },
}

/// Load/save boundary the core pushes snapshots through. The orchestrator
/// and binder never learn where the data lives.
pub trait PersistenceGateway {
    fn persist_anchor_data(
        &mut self,
        bindings: &HashMap<String, HashMap<Uuid, AnchorDescriptor>>,
    ) -> Result<(), PersistError>;

    fn persist_rotation(
        &mut self,
        experience: &str,
        concept: &str,
        rotation: [f32; 4],
    ) -> Result<(), PersistError>;

    fn load_standings(&mut self) -> Result<HashMap<String, i32>, PersistError>;

    fn save_standings(&mut self, standings: &HashMap<String, i32>) -> Result<(), PersistError>;
}

/// File-backed gateway: experiences JSON plus a standings JSON next to it.
pub struct FileGateway {
    archive: ExperienceArchive,
    standings_path: PathBuf,
}

impl FileGateway {
    pub fn new(archive: ExperienceArchive, standings_path: impl Into<PathBuf>) -> Self {
        Self {
            archive,
            standings_path: standings_path.into(),
        }
    }

    pub fn archive(&self) -> &ExperienceArchive {
        &self.archive
    }

    pub fn archive_mut(&mut self) -> &mut ExperienceArchive {
        &mut self.archive
    }
}

impl PersistenceGateway for FileGateway {
    fn persist_anchor_data(
        &mut self,
        bindings: &HashMap<String, HashMap<Uuid, AnchorDescriptor>>,
    ) -> Result<(), PersistError> {
        self.archive.replace_anchor_data(bindings);
        self.archive.save()
    }

    fn persist_rotation(
        &mut self,
        experience: &str,
        concept: &str,
        rotation: [f32; 4],
    ) -> Result<(), PersistError> {
        self.archive.set_rotation(experience, concept, rotation);
        self.archive.save()
    }

    fn load_standings(&mut self) -> Result<HashMap<String, i32>, PersistError> {
        load_standings(&self.standings_path)
    }

    fn save_standings(&mut self, standings: &HashMap<String, i32>) -> Result<(), PersistError> {
        save_standings(&self.standings_path, standings)
    }
}

/// In-memory gateway for tests and serverless desktop runs.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    pub experiences: HashMap<String, ExperienceData>,
    pub standings: HashMap<String, i32>,
    pub anchor_data_writes: u32,
    pub rotation_writes: u32,
}

impl PersistenceGateway for MemoryGateway {
    fn persist_anchor_data(
        &mut self,
        bindings: &HashMap<String, HashMap<Uuid, AnchorDescriptor>>,
    ) -> Result<(), PersistError> {
        for (key, anchor_data) in bindings {
            self.experiences
                .entry(key.clone())
                .or_default()
                .anchor_data = anchor_data.clone();
        }
        self.anchor_data_writes = self.anchor_data_writes.saturating_add(1);
        Ok(())
    }

    fn persist_rotation(
        &mut self,
        experience: &str,
        concept: &str,
        rotation: [f32; 4],
    ) -> Result<(), PersistError> {
        self.experiences
            .entry(experience.to_string())
            .or_default()
            .concept_rotations
            .insert(concept.to_string(), rotation);
        self.rotation_writes = self.rotation_writes.saturating_add(1);
        Ok(())
    }

    fn load_standings(&mut self) -> Result<HashMap<String, i32>, PersistError> {
        Ok(self.standings.clone())
    }

    fn save_standings(&mut self, standings: &HashMap<String, i32>) -> Result<(), PersistError> {
        self.standings = standings.clone();
        Ok(())
    }
}
