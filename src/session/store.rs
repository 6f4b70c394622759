//! # Session Store
//!
//! Manages the per-session directory tree on durable storage. Each session
//! key owns exactly one directory under the storage root containing the
//! source media, the normalized mono audio, the transcript, and the most
//! recent generated output.
//!
//! ## Invariants:
//! - `create_or_open` is idempotent and safe under concurrent calls with the
//!   same key ("already exists" is success, not an error)
//! - Artifact writes are atomic from a reader's perspective: bytes land in a
//!   uniquely named temp file in the session directory and are renamed into
//!   place, so a concurrent reader sees either the old artifact or the new
//!   one, never a partial write
//! - Session keys are validated so a key can never path-escape the root

use crate::error::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum accepted session key length.
const MAX_KEY_LEN: usize = 128;

/// The artifacts a session directory may hold.
///
/// File names are fixed; the directory name (the session key) is the only
/// variable part of any artifact path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Uploaded audio source, as received
    SourceAudio,
    /// Uploaded video source, as received
    SourceVideo,
    /// Mono 16-bit PCM audio derived from the source during ingestion
    NormalizedAudio,
    /// The wire-format word array produced by transcription
    Transcript,
    /// Most recent generated audio output (overwritten per request)
    OutputAudio,
    /// Most recent generated video output (overwritten per request)
    OutputVideo,
}

impl ArtifactKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::SourceAudio => "source.wav",
            ArtifactKind::SourceVideo => "video.mp4",
            ArtifactKind::NormalizedAudio => "audio.wav",
            ArtifactKind::Transcript => "transcript.json",
            ArtifactKind::OutputAudio => "concat.wav",
            ArtifactKind::OutputVideo => "concat.mp4",
        }
    }
}

/// An opened session: a validated key plus its directory.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    key: String,
    dir: PathBuf,
}

impl SessionHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Store rooted at one configured directory. Constructed once from explicit
/// configuration and shared; there is no global storage path.
#[derive(Debug)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Open a store at `root`, creating the directory if needed.
    pub fn new(root: PathBuf) -> AppResult<Self> {
        fs::create_dir_all(&root)
            .map_err(|e| AppError::Storage(format!("failed to create storage root: {}", e)))?;
        Ok(SessionStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject keys that are empty, oversized, or contain anything besides
    /// `[A-Za-z0-9_-]`. This keeps directory names sweep-parseable and makes
    /// path traversal impossible by construction.
    fn validate_key(key: &str) -> AppResult<()> {
        if key.is_empty() {
            return Err(AppError::BadRequest("session key is empty".to_string()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(AppError::BadRequest(format!(
                "session key exceeds {} characters",
                MAX_KEY_LEN
            )));
        }
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(AppError::BadRequest(format!(
                "session key contains invalid characters: {:?}",
                key
            )));
        }
        Ok(())
    }

    /// Idempotently create or open the session directory for `key`.
    ///
    /// Concurrent calls with the same key must not race on creation;
    /// `create_dir_all` treats an existing directory as success.
    pub fn create_or_open(&self, key: &str) -> AppResult<SessionHandle> {
        Self::validate_key(key)?;
        let dir = self.root.join(key);
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::Storage(format!("failed to create session dir {}: {}", key, e)))?;
        Ok(SessionHandle {
            key: key.to_string(),
            dir,
        })
    }

    /// Open an existing session, failing with `SessionNotFound` if it was
    /// never created (or has already been swept).
    pub fn open_existing(&self, key: &str) -> AppResult<SessionHandle> {
        Self::validate_key(key)?;
        let dir = self.root.join(key);
        if !dir.is_dir() {
            return Err(AppError::SessionNotFound(key.to_string()));
        }
        Ok(SessionHandle {
            key: key.to_string(),
            dir,
        })
    }

    pub fn artifact_path(&self, handle: &SessionHandle, kind: ArtifactKind) -> PathBuf {
        handle.dir.join(kind.file_name())
    }

    pub fn has_artifact(&self, handle: &SessionHandle, kind: ArtifactKind) -> bool {
        self.artifact_path(handle, kind).is_file()
    }

    /// A uniquely named scratch path inside the session directory, suitable
    /// as an external tool's output target before [`promote_artifact`].
    ///
    /// Temp names start with a dot so the retention sweep never parses them.
    pub fn temp_path(&self, handle: &SessionHandle, suffix: &str) -> PathBuf {
        handle.dir.join(format!(".tmp-{}{}", uuid::Uuid::new_v4(), suffix))
    }

    /// Atomically replace the artifact with `bytes` (write temp, rename).
    pub fn write_artifact(
        &self,
        handle: &SessionHandle,
        kind: ArtifactKind,
        bytes: &[u8],
    ) -> AppResult<PathBuf> {
        let temp = self.temp_path(handle, "");
        fs::write(&temp, bytes).map_err(|e| {
            AppError::Storage(format!("failed to write {}: {}", kind.file_name(), e))
        })?;
        self.promote_artifact(handle, kind, &temp)
    }

    /// Atomically move an already-written temp file into place as `kind`.
    ///
    /// The rename replaces any prior artifact in one step, which is what
    /// keeps a failed generation from destroying the previous output.
    pub fn promote_artifact(
        &self,
        handle: &SessionHandle,
        kind: ArtifactKind,
        temp: &Path,
    ) -> AppResult<PathBuf> {
        let target = self.artifact_path(handle, kind);
        fs::rename(temp, &target).map_err(|e| {
            // Best-effort cleanup of the orphaned temp file.
            let _ = fs::remove_file(temp);
            AppError::Storage(format!("failed to publish {}: {}", kind.file_name(), e))
        })?;
        Ok(target)
    }

    pub fn read_artifact(&self, handle: &SessionHandle, kind: ArtifactKind) -> AppResult<Vec<u8>> {
        let path = self.artifact_path(handle, kind);
        fs::read(&path).map_err(|e| {
            AppError::Storage(format!("failed to read {}: {}", kind.file_name(), e))
        })
    }
}
