//! Directory names of information packages and the async filesystem helpers used to reshape them.

use std::path::{Path, PathBuf};
use tokio::fs;

pub const METS_FILE: &str = "METS.xml";
pub const REPRESENTATIONS_DIR: &str = "representations";
pub const SUBMISSION_DIR: &str = "submission";
pub const DATA_DIR: &str = "data";

/// Top-level SIP directories also copied to the AIP root
pub const SHARED_DIRS: [&str; 3] = ["metadata", "schemas", "documentation"];

/// Legacy marker of representations holding an archived payload
pub const PRESERVATION_SUFFIX: &str = "-preservation";

/// Name of the `index`-th (1-based) preservation representation: `rep01.1`, `rep02.1`, ...
pub fn preservation_name(index: usize) -> String {
    format!("rep{index:02}.1")
}

/// Last component of `path` as UTF-8, lossy
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Sorted subdirectories of `directory`
pub async fn list_directories(directory: impl AsRef<Path>) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(directory.as_ref()).await?;
    let mut directories = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            directories.push(entry.path());
        }
    }
    directories.sort();
    Ok(directories)
}

/// Every regular file below `directory`, relative to `base`, sorted
pub async fn list_files(
    base: impl AsRef<Path>,
    directory: impl AsRef<Path>,
) -> std::io::Result<Vec<PathBuf>> {
    let base = base.as_ref();
    let mut files = Vec::new();
    let mut pending = vec![directory.as_ref().to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative = path
                    .strip_prefix(base)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
                files.push(relative.to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Copy `source` into `destination` recursively, creating `destination` if needed
///
/// Entries of `source` whose name is in `skip` (top level only) are left out.
pub async fn copy_directory(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    skip: &[&str],
) -> std::io::Result<()> {
    let mut pending = vec![(source.as_ref().to_path_buf(), destination.as_ref().to_path_buf())];
    let mut top_level = true;

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to).await?;
        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if top_level && skip.iter().any(|skipped| name.as_os_str() == *skipped) {
                continue;
            }

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push((entry.path(), to.join(&name)));
            } else {
                fs::copy(entry.path(), to.join(&name)).await?;
            }
        }
        top_level = false;
    }

    Ok(())
}

/// Delete `directory` if it exists, then create it empty
///
/// Returns whether something was deleted.
pub async fn recreate_directory(directory: impl AsRef<Path>) -> std::io::Result<bool> {
    let directory = directory.as_ref();
    let existed = fs::try_exists(directory).await?;
    if existed {
        fs::remove_dir_all(directory).await?;
    }
    fs::create_dir_all(directory).await?;
    Ok(existed)
}
