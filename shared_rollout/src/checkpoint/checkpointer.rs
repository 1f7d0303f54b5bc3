//! End-of-run checkpoints.
//!
//! A checkpoint is two opaque blobs produced by the update collaborator:
//! the policy network (`actor.bin`) and the learner network
//! (`learner.bin`). Collaborators built on burn can use
//! [`record_module_bytes`] / [`load_module_bytes`] to produce and consume
//! them.

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::algorithms::ModelBlobs;

pub const ACTOR_FILE: &str = "actor.bin";
pub const LEARNER_FILE: &str = "learner.bin";

/// Error type for checkpointing operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    /// No checkpoint in the model directory.
    NoCheckpoints,
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::NoCheckpoints => write!(f, "No checkpoints found"),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// Where a checkpoint was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPaths {
    pub actor: PathBuf,
    pub learner: PathBuf,
}

/// Writes and reads the two checkpoint blobs in one directory.
#[derive(Debug, Clone)]
pub struct Checkpointer {
    model_dir: PathBuf,
}

impl Checkpointer {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn paths(&self) -> CheckpointPaths {
        CheckpointPaths {
            actor: self.model_dir.join(ACTOR_FILE),
            learner: self.model_dir.join(LEARNER_FILE),
        }
    }

    /// Write both blobs, creating the directory if needed.
    ///
    /// Each file is written next to its target and renamed into place, so a
    /// reader never sees a partially written blob.
    pub fn save(&self, blobs: &ModelBlobs) -> Result<CheckpointPaths, CheckpointError> {
        fs::create_dir_all(&self.model_dir)?;
        let paths = self.paths();
        write_replace(&paths.actor, &blobs.actor)?;
        write_replace(&paths.learner, &blobs.learner)?;
        log::info!(
            "checkpoint saved to {} ({} + {} bytes)",
            self.model_dir.display(),
            blobs.actor.len(),
            blobs.learner.len()
        );
        Ok(paths)
    }

    /// Read both blobs back.
    pub fn load(&self) -> Result<ModelBlobs, CheckpointError> {
        let paths = self.paths();
        if !paths.actor.exists() || !paths.learner.exists() {
            return Err(CheckpointError::NoCheckpoints);
        }
        Ok(ModelBlobs {
            actor: fs::read(&paths.actor)?,
            learner: fs::read(&paths.learner)?,
        })
    }
}

fn write_replace(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("bin.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Serialise a burn module with full precision.
pub fn record_module_bytes<B: Backend, M: Module<B>>(
    module: M,
) -> Result<Vec<u8>, CheckpointError> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    Recorder::<B>::record(&recorder, module.into_record(), ())
        .map_err(|e| CheckpointError::Recorder(e.to_string()))
}

/// Load bytes from [`record_module_bytes`] into `template`.
pub fn load_module_bytes<B: Backend, M: Module<B>>(
    template: M,
    bytes: Vec<u8>,
    device: &B::Device,
) -> Result<M, CheckpointError> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let record = Recorder::<B>::load(&recorder, bytes, device)
        .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
    Ok(template.load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::{Linear, LinearConfig};
    use tempfile::tempdir;

    type B = NdArray;

    fn weights(linear: &Linear<B>) -> Vec<f32> {
        linear.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_save_creates_dir_and_both_files() {
        let dir = tempdir().unwrap();
        let model_dir = dir.path().join("nested/model");
        let checkpointer = Checkpointer::new(&model_dir);

        let blobs = ModelBlobs {
            actor: vec![1, 2, 3],
            learner: b"learner".to_vec(),
        };
        let paths = checkpointer.save(&blobs).unwrap();

        assert_eq!(paths.actor, model_dir.join("actor.bin"));
        assert_eq!(paths.learner, model_dir.join("learner.bin"));
        assert_eq!(fs::read(&paths.actor).unwrap(), vec![1, 2, 3]);
        assert_eq!(checkpointer.load().unwrap(), blobs);
        assert!(!model_dir.join("actor.bin.tmp").exists());
    }

    #[test]
    fn test_save_overwrites_previous_checkpoint() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path());
        checkpointer
            .save(&ModelBlobs {
                actor: vec![0; 16],
                learner: vec![0; 16],
            })
            .unwrap();
        checkpointer
            .save(&ModelBlobs {
                actor: vec![9],
                learner: vec![8],
            })
            .unwrap();

        let blobs = checkpointer.load().unwrap();
        assert_eq!(blobs.actor, vec![9]);
        assert_eq!(blobs.learner, vec![8]);
    }

    #[test]
    fn test_load_without_checkpoint() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path().join("missing"));
        assert!(matches!(
            checkpointer.load(),
            Err(CheckpointError::NoCheckpoints)
        ));
    }

    #[test]
    fn test_module_bytes_round_trip() {
        let device = Default::default();
        let original: Linear<B> = LinearConfig::new(3, 2).init(&device);
        let bytes = record_module_bytes(original.clone()).unwrap();
        assert!(!bytes.is_empty());

        let template: Linear<B> = LinearConfig::new(3, 2).init(&device);
        let loaded = load_module_bytes(template, bytes, &device).unwrap();
        assert_eq!(weights(&loaded), weights(&original));
    }
}
