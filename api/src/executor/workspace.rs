/// Per-job scratch space and the streamed artifact.
///
/// A `JobWorkspace` is a uniquely named directory under the temp root that
/// is removed when dropped. On success it moves into the `ArtifactReader`,
/// so the directory lives exactly as long as the response body.
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::OwnedSemaphorePermit;

#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    /// Create `<root>/job-XXXXXX`, creating `root` if needed.
    pub fn create(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("job-").tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Finished clip ready to be streamed back.
#[derive(Debug)]
pub struct Artifact {
    pub filename: String,
    pub size: u64,
    pub reader: ArtifactReader,
}

/// Reads the artifact file while holding the job's workspace and
/// concurrency slot. Both are released when the reader is dropped.
#[derive(Debug)]
pub struct ArtifactReader {
    file: File,
    _workspace: JobWorkspace,
    _permit: OwnedSemaphorePermit,
}

impl ArtifactReader {
    pub async fn open(
        workspace: JobWorkspace,
        path: &Path,
        permit: OwnedSemaphorePermit,
    ) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            file,
            _workspace: workspace,
            _permit: permit,
        })
    }
}

impl AsyncRead for ArtifactReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}
