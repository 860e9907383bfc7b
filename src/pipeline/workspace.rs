//! Per-run workspace directory.
//!
//! Every run gets its own `TempDir`. Raw downloads, normalised and
//! composited clips, the concat manifest and the stitched file all live in
//! it. The directory is removed when the [`Workspace`] is closed or dropped,
//! so an early return, an `Err` or a panic all leave nothing behind. The
//! only file that outlives the run is the one [`Workspace::promote`] moves
//! out.

use crate::error::Pdf2VideoError;
use crate::output::{MediaAsset, MediaRole};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Exclusively owned scratch directory of one run.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `root` (or the system temp dir).
    pub fn create(root: Option<&Path>, run_id: &str) -> Result<Self, Pdf2VideoError> {
        let prefix = format!("pdf2video-{run_id}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| Pdf2VideoError::workspace(root, e))?;
                builder
                    .tempdir_in(root)
                    .map_err(|e| Pdf2VideoError::workspace(root, e))?
            }
            None => builder
                .tempdir()
                .map_err(|e| Pdf2VideoError::workspace(std::env::temp_dir(), e))?,
        };
        debug!("Workspace created at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where page images are rasterised to.
    pub fn pages_dir(&self) -> PathBuf {
        self.path().join("pages")
    }

    /// Concat manifest location.
    pub fn manifest_path(&self) -> PathBuf {
        self.path().join("list.txt")
    }

    /// Location for a media file of `role` belonging to segment `page_index`.
    ///
    /// `Final` ignores the index; there is one per run.
    pub fn asset(&self, role: MediaRole, page_index: usize) -> MediaAsset {
        let name = match role {
            MediaRole::RawDownload => format!("raw-{page_index}.mp4"),
            MediaRole::Normalized => format!("normalized-{page_index}.mp4"),
            MediaRole::Composited => format!("composited-{page_index}.mp4"),
            MediaRole::Final => "stitched.mp4".to_string(),
        };
        MediaAsset {
            path: self.path().join(name),
            role,
        }
    }

    /// Move `artifact` out of the workspace into `output_dir/file_name`.
    ///
    /// Uses a rename, falling back to copy + remove when `output_dir` is on
    /// another filesystem.
    pub async fn promote(
        &self,
        artifact: &Path,
        output_dir: &Path,
        file_name: &str,
    ) -> Result<PathBuf, Pdf2VideoError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| Pdf2VideoError::OutputWriteFailed {
                path: output_dir.to_path_buf(),
                source: e,
            })?;
        let dest = output_dir.join(file_name);

        if let Err(rename_err) = tokio::fs::rename(artifact, &dest).await {
            debug!("rename failed ({}), copying instead", rename_err);
            copy_into_place(artifact, &dest).await?;
            if let Err(e) = tokio::fs::remove_file(artifact).await {
                warn!("Could not remove {}: {}", artifact.display(), e);
            }
        }
        Ok(dest)
    }

    /// Delete the workspace now, reporting failure instead of ignoring it.
    pub fn close(self) -> Result<(), Pdf2VideoError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| Pdf2VideoError::workspace(path, e))
    }
}

/// Copy `src` to `dest` through a `.part` sibling that is renamed into
/// place. On failure the partial copy is removed and `dest` is untouched.
async fn copy_into_place(src: &Path, dest: &Path) -> Result<(), Pdf2VideoError> {
    let partial = dest.with_extension("mp4.part");
    let result = match tokio::fs::copy(src, &partial).await {
        Ok(_) => tokio::fs::rename(&partial, dest).await,
        Err(e) => Err(e),
    };
    if let Err(source) = result {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove partial output {}: {}", partial.display(), e);
            }
        }
        return Err(Pdf2VideoError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Output file name unique to one run: `stitched-<millis>-<run id>.mp4`.
pub fn output_file_name(run_id: &str) -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("stitched-{millis}-{run_id}.mp4")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path()), "run-a").unwrap();
        let dir = ws.path().to_path_buf();
        std::fs::create_dir_all(ws.pages_dir()).unwrap();
        std::fs::write(ws.asset(MediaRole::RawDownload, 1).path, b"clip").unwrap();
        std::fs::write(ws.manifest_path(), b"file 'x'\n").unwrap();

        ws.close().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn dropping_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let ws = Workspace::create(Some(root.path()), "run-b").unwrap();
            std::fs::write(ws.asset(MediaRole::Normalized, 0).path, b"clip").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn concurrent_runs_get_separate_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(Some(root.path()), "same").unwrap();
        let b = Workspace::create(Some(root.path()), "same").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn asset_names_by_role() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path()), "r").unwrap();
        let a = ws.asset(MediaRole::Composited, 3);
        assert!(a.path.ends_with("composited-3.mp4"));
        assert_eq!(a.role, MediaRole::Composited);
        assert!(ws.asset(MediaRole::Final, 9).path.ends_with("stitched.mp4"));
    }

    #[tokio::test]
    async fn promote_moves_artifact_out() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path()), "r").unwrap();
        let artifact = ws.asset(MediaRole::Final, 0).path;
        std::fs::write(&artifact, b"video").unwrap();

        let dest = ws
            .promote(&artifact, &out.path().join("videos"), "final.mp4")
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"video");
        assert!(!artifact.exists());

        let ws_dir = ws.path().to_path_buf();
        ws.close().unwrap();
        assert!(!ws_dir.exists());
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn failed_promote_leaves_no_partial_output() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path()), "r").unwrap();
        let artifact = ws.asset(MediaRole::Final, 0).path;
        std::fs::write(&artifact, b"video").unwrap();
        // A directory squatting on the destination name defeats both renames.
        std::fs::create_dir_all(out.path().join("final.mp4/keep")).unwrap();

        let err = ws.promote(&artifact, out.path(), "final.mp4").await.unwrap_err();
        assert!(matches!(err, Pdf2VideoError::OutputWriteFailed { .. }), "got: {err:?}");

        let names: Vec<String> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["final.mp4".to_string()]);
        assert!(out.path().join("final.mp4").is_dir());
    }

    #[tokio::test]
    async fn copy_into_place_replaces_via_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.mp4");
        let dest = dir.path().join("dest.mp4");
        std::fs::write(&src, b"video").unwrap();

        copy_into_place(&src, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"video");
        assert!(!dir.path().join("dest.mp4.part").exists());
    }

    #[test]
    fn output_names_are_unique_per_run() {
        let a = output_file_name("run-1");
        let b = output_file_name("run-2");
        assert_ne!(a, b);
        assert!(a.starts_with("stitched-") && a.ends_with("-run-1.mp4"));
    }
}
