use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::SpendcatError;
use crate::pipeline::{ArtifactBlobs, Predictor};

const CURRENT_FILE: &str = "CURRENT";
const MANIFEST_FILE: &str = "manifest.json";
const ENCODER_FILE: &str = "encoder.json";
const CLASSIFIER_FILE: &str = "classifier.json";
const LABEL_CODEC_FILE: &str = "label_codec.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No artifact set has been published under {0:?}")]
    NotPublished(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
    #[error("Invalid run id: {0:?}")]
    InvalidRunId(String),
    #[error("Run {0} is current and cannot be removed")]
    RunInUse(String),
    #[error("Invalid artifact set: {0}")]
    Artifact(#[from] SpendcatError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ManifestEntry {
    file: String,
    sha256: String,
    bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Manifest {
    run_id: String,
    published_at: u64,
    files: Vec<ManifestEntry>,
}

/// On-disk home for published artifact sets.
///
/// Every set lives in `runs/<run_id>/`; the `CURRENT` file names the run
/// that prediction should load. Replacing `CURRENT` is an atomic rename, so
/// readers see either the previous set or the new one.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    publish_lock: Arc<Mutex<()>>,
}

impl ArtifactStore {
    /// Creates a store in the default artifacts directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::default_root())
    }

    /// Returns the default artifacts directory path
    pub fn default_root() -> PathBuf {
        if let Ok(path) = env::var("SPENDCAT_HOME") {
            return PathBuf::from(path).join("artifacts");
        }

        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("spendcat").join("artifacts");
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".local").join("share").join("spendcat").join("artifacts");
        }

        env::temp_dir().join("spendcat").join("artifacts")
    }

    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("runs"))?;
        Ok(Self {
            root,
            publish_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("runs").join(run_id)
    }

    pub fn is_published(&self) -> bool {
        self.root.join(CURRENT_FILE).exists()
    }

    /// The run id `CURRENT` points at, if any set has been published.
    pub fn current_run_id(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.root.join(CURRENT_FILE)) {
            Ok(raw) => Ok(Some(raw.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes a set and makes it current.
    ///
    /// The blobs are decoded first, so a mismatched set is rejected before
    /// anything touches the disk. Concurrent publishes are serialized.
    pub async fn publish(&self, blobs: &ArtifactBlobs) -> Result<PathBuf, StoreError> {
        let predictor = Predictor::from_blobs(blobs)?;
        if predictor.artifacts().run_id() != blobs.run_id {
            return Err(SpendcatError::ArtifactMismatch(format!(
                "blobs are labeled run {} but their headers name run {}",
                blobs.run_id,
                predictor.artifacts().run_id()
            ))
            .into());
        }
        check_run_id(&blobs.run_id)?;
        let _lock = self.publish_lock.lock().await;

        let run_dir = self.run_dir(&blobs.run_id);
        log::info!("Publishing run {} to {:?}", blobs.run_id, run_dir);
        fs::create_dir_all(&run_dir)?;

        let mut files = Vec::with_capacity(3);
        for (name, bytes) in self.files_of(blobs) {
            let path = run_dir.join(name);
            fs::write(&path, bytes)?;
            log::debug!("Wrote {} bytes to {:?}", bytes.len(), path);
            files.push(ManifestEntry {
                file: name.to_string(),
                sha256: sha256_hex(bytes),
                bytes: bytes.len(),
            });
        }

        let manifest = Manifest {
            run_id: blobs.run_id.clone(),
            published_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            files,
        };
        fs::write(run_dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;

        let pending = self.root.join(format!("{}.tmp", CURRENT_FILE));
        fs::write(&pending, &blobs.run_id)?;
        fs::rename(&pending, self.root.join(CURRENT_FILE))?;

        log::info!("Run {} is now current", blobs.run_id);
        Ok(run_dir)
    }

    /// Reads the current set, verifying every file against its manifest digest.
    pub fn load_current(&self) -> Result<ArtifactBlobs, StoreError> {
        let run_id = self
            .current_run_id()?
            .ok_or_else(|| StoreError::NotPublished(self.root.clone()))?;
        self.load_run(&run_id)
    }

    pub fn load_run(&self, run_id: &str) -> Result<ArtifactBlobs, StoreError> {
        check_run_id(run_id)?;
        let run_dir = self.run_dir(run_id);
        let manifest: Manifest = serde_json::from_slice(&fs::read(run_dir.join(MANIFEST_FILE))?)?;
        if manifest.run_id != run_id {
            return Err(SpendcatError::ArtifactMismatch(format!(
                "manifest in {:?} names run {}",
                run_dir, manifest.run_id
            ))
            .into());
        }

        let read_verified = |name: &str| -> Result<Vec<u8>, StoreError> {
            let bytes = fs::read(run_dir.join(name))?;
            let expected = manifest
                .files
                .iter()
                .find(|entry| entry.file == name)
                .map(|entry| entry.sha256.clone())
                .unwrap_or_default();
            let actual = sha256_hex(&bytes);
            if actual != expected {
                log::error!("{} hash mismatch: expected {}, got {}", name, expected, actual);
                return Err(StoreError::HashMismatch {
                    file_type: name.to_string(),
                    expected,
                    actual,
                });
            }
            Ok(bytes)
        };

        Ok(ArtifactBlobs {
            run_id: manifest.run_id.clone(),
            encoder: read_verified(ENCODER_FILE)?,
            classifier: read_verified(CLASSIFIER_FILE)?,
            label_codec: read_verified(LABEL_CODEC_FILE)?,
        })
    }

    pub fn load_predictor(&self) -> Result<Predictor, StoreError> {
        let blobs = self.load_current()?;
        Ok(Predictor::from_blobs(&blobs)?)
    }

    /// Deletes a run directory; the current run cannot be removed.
    pub fn remove_run(&self, run_id: &str) -> Result<(), StoreError> {
        check_run_id(run_id)?;
        if self.current_run_id()?.as_deref() == Some(run_id) {
            return Err(StoreError::RunInUse(run_id.to_string()));
        }
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }

    fn files_of<'a>(&self, blobs: &'a ArtifactBlobs) -> [(&'static str, &'a [u8]); 3] {
        [
            (ENCODER_FILE, blobs.encoder.as_slice()),
            (CLASSIFIER_FILE, blobs.classifier.as_slice()),
            (LABEL_CODEC_FILE, blobs.label_codec.as_slice()),
        ]
    }
}

/// Run ids are hex digests, so they are always a single plain path component.
fn check_run_id(run_id: &str) -> Result<(), StoreError> {
    if run_id.is_empty() || !run_id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(StoreError::InvalidRunId(run_id.to_string()));
    }
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
