//! Submissions: one user-initiated upload attempt.
//!
//! A [`Submission`] is created only after input validation succeeds and is
//! identified by a monotonically increasing [`SubmissionId`]. Every async
//! activity spawned for it (ticker, request, hide timer) carries that id so
//! the workflow can discard events from superseded submissions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of one submission within a controller's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a selected file's bytes come from.
#[derive(Clone)]
pub enum FileSource {
    /// A file on the local file system, read when the request is issued.
    Path(PathBuf),
    /// Bytes already held in memory (e.g. handed over by an embedding host).
    Memory(Arc<[u8]>),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            FileSource::Memory(b) => write!(f, "Memory({} bytes)", b.len()),
        }
    }
}

/// A reference to a user-selected file plus its display name.
#[derive(Debug, Clone)]
pub struct FileRef {
    name: String,
    source: FileSource,
}

impl FileRef {
    /// Reference a file on disk. The display name is the final path component.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            source: FileSource::Path(path.to_path_buf()),
        }
    }

    /// Reference in-memory content under the given display name.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(bytes.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Load the file's bytes for transmission.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(p) => tokio::fs::read(p).await,
            FileSource::Memory(b) => Ok(b.to_vec()),
        }
    }
}

/// One validated upload attempt.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: SubmissionId,
    pub file: FileRef,
}

impl Submission {
    /// Name shown to the user and used to derive the download name.
    pub fn display_name(&self) -> &str {
        self.file.name()
    }
}
