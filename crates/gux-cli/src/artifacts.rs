//! Zone crops and diff images written by `gux check --out-dir`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gux_core::ZoneArtifact;

/// File stem for a zone path: `main/chart` becomes `main__chart`.
pub fn artifact_stem(path: &str) -> String {
    path.replace('/', "__")
}

/// Save every non-empty crop as `<stem>.png` and every diff as
/// `<stem>_diff.png`. Returns the written files in zone order.
pub fn write_all(dir: &Path, artifacts: &[ZoneArtifact]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

    let mut written = Vec::new();
    for artifact in artifacts {
        let stem = artifact_stem(&artifact.path);
        if artifact.crop.width() > 0 && artifact.crop.height() > 0 {
            let path = dir.join(format!("{stem}.png"));
            artifact
                .crop
                .save(&path)
                .with_context(|| format!("write {}", path.display()))?;
            written.push(path);
        }
        if let Some(diff) = &artifact.diff {
            let path = dir.join(format!("{stem}_diff.png"));
            diff.save(&path)
                .with_context(|| format!("write {}", path.display()))?;
            written.push(path);
        }
    }
    tracing::debug!(dir = %dir.display(), files = written.len(), "artifacts written");
    Ok(written)
}
