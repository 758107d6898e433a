use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{atomic_io, PersistError};
use crate::anchors::AnchorDescriptor;

/// Per-experience persisted state: the anchor records plus the saved model
/// rotations of 3D concepts. Keyed in the archive by
/// `room_code + user_id + experience_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceData {
    #[serde(default)]
    pub anchor_data: HashMap<Uuid, AnchorDescriptor>,
    #[serde(default)]
    pub concept_rotations: HashMap<String, [f32; 4]>,
}

/// The experiences file. Read once at session start; rewritten wholesale on
/// every anchor-dictionary or rotation change. A missing file is a fresh
/// start, not an error.
#[derive(Debug)]
pub struct ExperienceArchive {
    path: PathBuf,
    experiences: HashMap<String, ExperienceData>,
}

impl ExperienceArchive {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        if !path.exists() {
            info!(path = %path.display(), "no experiences file, starting fresh");
            return Ok(Self {
                path,
                experiences: HashMap::new(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| PersistError::Io {
            path: path.clone(),
            source,
        })?;
        let experiences = parse_experiences(&raw, &path)?;
        validate_experiences(&experiences)?;
        info!(
            path = %path.display(),
            experiences = experiences.len(),
            "experiences loaded"
        );
        Ok(Self { path, experiences })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn experiences(&self) -> &HashMap<String, ExperienceData> {
        &self.experiences
    }

    pub fn experience(&self, key: &str) -> Option<&ExperienceData> {
        self.experiences.get(key)
    }

    /// Creates an empty record on first visit to a room/experience pair.
    pub fn ensure_experience(&mut self, key: &str) -> &mut ExperienceData {
        self.experiences.entry(key.to_string()).or_insert_with(|| {
            debug!(key, "new experience record created");
            ExperienceData::default()
        })
    }

    pub fn replace_anchor_data(
        &mut self,
        bindings: &HashMap<String, HashMap<Uuid, AnchorDescriptor>>,
    ) {
        for (key, anchor_data) in bindings {
            self.ensure_experience(key).anchor_data = anchor_data.clone();
        }
    }

    pub fn set_rotation(&mut self, key: &str, concept: &str, rotation: [f32; 4]) {
        let record = self.ensure_experience(key);
        if record
            .concept_rotations
            .insert(concept.to_string(), rotation)
            .is_some()
        {
            debug!(concept, "rotation data updated");
        } else {
            debug!(concept, "rotation data added");
        }
    }

    pub fn save(&self) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(&self.experiences)
            .map_err(|source| PersistError::Encode { source })?;
        atomic_io::write_text_atomic(&self.path, &json).map_err(|source| PersistError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "experiences saved");
        Ok(())
    }

    /// Explicit debug operation; records are never deleted automatically.
    pub fn delete_file(&mut self) -> Result<(), PersistError> {
        self.experiences.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn parse_experiences(
    raw: &str,
    path: &Path,
) -> Result<HashMap<String, ExperienceData>, PersistError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, HashMap<String, ExperienceData>>(&mut deserializer)
    {
        Ok(experiences) => Ok(experiences),
        Err(error) => {
            let doc_path = error.path().to_string();
            let source = error.into_inner();
            let detail = if doc_path.is_empty() || doc_path == "." {
                source.to_string()
            } else {
                format!("at {doc_path}: {source}")
            };
            Err(PersistError::Parse {
                path: path.to_path_buf(),
                detail,
            })
        }
    }
}

fn validate_experiences(
    experiences: &HashMap<String, ExperienceData>,
) -> Result<(), PersistError> {
    for (key, record) in experiences {
        for (concept, rotation) in &record.concept_rotations {
            if rotation.iter().any(|component| !component.is_finite()) {
                return Err(PersistError::Validation {
                    detail: format!(
                        "experience '{key}' concept '{concept}': rotation has a non-finite component"
                    ),
                });
            }
        }
        for (uuid, descriptor) in &record.anchor_data {
            let is_concept = descriptor.object_kind == crate::anchors::ObjectKind::Concept;
            if is_concept && descriptor.concept_id.is_none() {
                return Err(PersistError::Validation {
                    detail: format!(
                        "experience '{key}' anchor {uuid}: concept record is missing its concept id"
                    ),
                });
            }
        }
    }
    Ok(())
}
