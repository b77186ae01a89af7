pub(crate) use compute::compute_checksum_file;
pub use compute::ChecksumComputeError;
use digest::Digest;
use std::{borrow::Cow, fmt::Display};

mod compute {
    use super::Checksum;
    use digest::Digest;
    use std::path::Path;
    use tokio::{
        fs::File,
        io::{AsyncReadExt, BufReader},
    };

    /// Bytes read from disk before feeding the hasher
    const CHUNK_SIZE: usize = 64 * 1024;

    #[derive(thiserror::Error, Debug, PartialEq)]
    /// Possible errors when hashing a file on disk
    pub enum ChecksumComputeError {
        /// Path does not point to a regular file
        #[error("File not found on disk")]
        FileNotFound,
        /// File exists but could not be opened
        #[error("Failed to open file")]
        OpenFile(std::io::ErrorKind),
        /// Reading the file failed midway
        #[error("Failed to read file")]
        ReadFile(std::io::ErrorKind),
    }

    pub(crate) async fn compute_checksum_file<ChecksumAlgo: Digest>(
        path: impl AsRef<Path>,
    ) -> Result<Checksum<'static>, ChecksumComputeError> {
        if !path.as_ref().is_file() {
            return Err(ChecksumComputeError::FileNotFound);
        }

        let file = File::open(&path)
            .await
            .map_err(|e| ChecksumComputeError::OpenFile(e.kind()))?;
        let mut buffer_reader = BufReader::new(file);

        let mut hasher = ChecksumAlgo::new();
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let read_bytes = buffer_reader
                .read(&mut chunk)
                .await
                .map_err(|e| ChecksumComputeError::ReadFile(e.kind()))?;

            // EOF
            if read_bytes == 0 {
                break;
            }

            hasher.update(&chunk[..read_bytes]);
        }

        Ok(hasher.finalize().to_vec().into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Hex-encoded digest, as written in the `CHECKSUM` attribute of a METS `file`
pub struct Checksum<'a>(Cow<'a, str>);

impl Checksum<'_> {
    /// Compute checksum for vector of bytes
    pub fn digest<Algorithm: Digest>(bytes: Vec<u8>) -> Self {
        Algorithm::digest(bytes).to_vec().into()
    }
}

impl From<&[u8]> for Checksum<'_> {
    fn from(value: &[u8]) -> Self {
        Self(Cow::Owned(hex::encode(value)))
    }
}

impl From<Vec<u8>> for Checksum<'_> {
    fn from(value: Vec<u8>) -> Self {
        Self(Cow::Owned(hex::encode(value)))
    }
}

impl<'a> From<&'a str> for Checksum<'a> {
    fn from(value: &'a str) -> Checksum<'a> {
        Self(Cow::Borrowed(value))
    }
}

impl Display for Checksum<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Checksum<'_> {
    fn as_ref(&self) -> &str {
        match &self.0 {
            Cow::Borrowed(borrowed) => borrowed,
            Cow::Owned(owned) => owned.as_ref(),
        }
    }
}
