use crate::{
    checksum::{compute_checksum_file, ChecksumComputeError},
    mimetype, Checksum, ChecksumAlgorithm,
};
use digest::Digest;
use std::{
    fmt::Display,
    path::{Component, Path, PathBuf},
};
use tokio::fs;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PayloadError {
    #[error("Path `{0}` escapes the directory of its manifest")]
    NotInsidePackage(PathBuf),
    #[error("Failed to read metadata of `{0}`")]
    Metadata(PathBuf, std::io::ErrorKind),
    #[error("Failed to compute checksum of `{0}`: {1}")]
    ComputeChecksum(PathBuf, ChecksumComputeError),
}

#[derive(Debug, Clone, PartialEq)]
/// A file referenced by a manifest, with everything its METS `file` element records
pub struct Payload<'a> {
    checksum: Checksum<'a>,

    /// Path relative to the directory holding the manifest
    relative_path: PathBuf,

    size: u64,

    mimetype: String,

    checksum_type: String,
}

impl Display for Payload<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.checksum, self.href())
    }
}

impl Payload<'static> {
    /// Hash and stat `relative_path` inside `base_directory`
    pub async fn describe<ChecksumAlgo: Digest>(
        base_directory: impl AsRef<Path>,
        relative_path: impl AsRef<Path>,
        checksum_algorithm: &ChecksumAlgorithm<ChecksumAlgo>,
    ) -> Result<Self, PayloadError> {
        let relative_path = relative_path.as_ref();
        if relative_path
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(PayloadError::NotInsidePackage(relative_path.to_path_buf()));
        }

        let file_path = base_directory.as_ref().join(relative_path);
        let metadata = fs::metadata(&file_path)
            .await
            .map_err(|e| PayloadError::Metadata(file_path.clone(), e.kind()))?;
        let checksum = compute_checksum_file::<ChecksumAlgo>(&file_path)
            .await
            .map_err(|e| PayloadError::ComputeChecksum(file_path.clone(), e))?;

        Ok(Self {
            checksum,
            relative_path: relative_path.to_path_buf(),
            size: metadata.len(),
            mimetype: mimetype::guess(relative_path),
            checksum_type: checksum_algorithm.name().to_string(),
        })
    }
}

impl Payload<'_> {
    pub fn checksum(&self) -> &Checksum<'_> {
        &self.checksum
    }

    /// Path of payload relative to the manifest directory
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Relative URL written in `xlink:href`, always with forward slashes
    pub fn href(&self) -> String {
        self.relative_path
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    /// Value for `CHECKSUMTYPE`
    pub fn checksum_type(&self) -> &str {
        &self.checksum_type
    }
}
