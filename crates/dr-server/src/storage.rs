use std::fs;
use std::path::{Path, PathBuf};

use dr_core::{Error, Result};
use image::RgbImage;

/// Flat directory of output artifacts, one PNG per job id.
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Open (and create if needed) the artifact directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Persist the artifact for `job_id` and return its reference.
    pub fn save(&self, job_id: &str, image: &RgbImage) -> Result<String> {
        let name = format!("{job_id}.png");
        image
            .save(self.dir.join(&name))
            .map_err(|e| Error::Execution(format!("failed to save artifact: {e}")))?;
        Ok(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        match Self::validate(name) {
            Ok(()) => self.dir.join(name).is_file(),
            Err(_) => false,
        }
    }

    /// Read an artifact back as raw bytes.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        Self::validate(name)?;
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(Error::ArtifactNotFound(name.into()));
        }
        Ok(fs::read(path)?)
    }

    /// Artifact references are bare file names; reject anything that could
    /// escape the store directory.
    fn validate(name: &str) -> Result<()> {
        let is_bare = Path::new(name)
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)))
            && !name.contains(['/', '\\']);
        if name.is_empty() || !is_bare {
            return Err(Error::ArtifactNotFound(name.into()));
        }
        Ok(())
    }
}
