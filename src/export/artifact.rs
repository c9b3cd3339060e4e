//! Persisted model artifact
//!
//! One file holds everything inference needs: the fitted feature encoder and
//! the winning model, plus metadata describing how it was chosen. Files are
//! bincode, prefixed by a header that identifies the format.

use crate::error::{MathScoreError, Result};
use crate::preprocessing::FeatureEncoder;
use crate::training::{ModelMetrics, ModelType, TrainedModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ARTIFACT_MAGIC: [u8; 8] = *b"MSCOREAR";
/// Bumped whenever the serialized layout changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Leading bytes of every artifact file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    magic: [u8; 8],
    pub format_version: u32,
}

impl Default for ArtifactHeader {
    fn default() -> Self {
        Self {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
        }
    }
}

impl ArtifactHeader {
    fn check(&self) -> Result<()> {
        if self.magic != ARTIFACT_MAGIC {
            return Err(MathScoreError::SerializationError(
                "file is not a mathscore model artifact".to_string(),
            ));
        }
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(MathScoreError::SerializationError(format!(
                "artifact format version {} is not supported (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

/// How the persisted model was selected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub candidate_name: String,
    pub model_type: ModelType,
    /// R² on the held-out test partition
    pub r2: f64,
    pub metrics: ModelMetrics,
    pub trained_at: DateTime<Utc>,
    /// Encoded column names, in model input order
    pub feature_names: Vec<String>,
}

/// Winning model together with the preprocessing state it was trained behind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub header: ArtifactHeader,
    pub metadata: ArtifactMetadata,
    pub preprocessor: FeatureEncoder,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn new(metadata: ArtifactMetadata, preprocessor: FeatureEncoder, model: TrainedModel) -> Self {
        Self {
            header: ArtifactHeader::default(),
            metadata,
            preprocessor,
            model,
        }
    }

    /// Write the artifact, replacing any existing file at `path`.
    ///
    /// Bytes go to a sibling `.tmp` file first, which is then renamed over the
    /// destination, so readers never observe a partial artifact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let bytes = bincode::serialize(self)?;
        let tmp = temp_path(path);
        if let Err(err) = write_then_rename(&tmp, path, &bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            candidate = %self.metadata.candidate_name,
            "Artifact saved"
        );
        Ok(())
    }

    /// Read an artifact written by [`ModelArtifact::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(MathScoreError::ArtifactNotFound(path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        // The header leads the encoding, so it can be checked on its own
        let header: ArtifactHeader = bincode::deserialize(&bytes)
            .map_err(|_| MathScoreError::SerializationError("artifact header is unreadable".to_string()))?;
        header.check()?;

        let artifact: ModelArtifact = bincode::deserialize(&bytes)?;
        debug!(
            path = %path.display(),
            candidate = %artifact.metadata.candidate_name,
            model_type = %artifact.metadata.model_type,
            "Artifact loaded"
        );
        Ok(artifact)
    }
}

fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    {
        let mut writer = BufWriter::new(File::create(tmp)?);
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    fs::rename(tmp, path)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
