use super::{filesystem, Stage, TransformError, TransformOptions};
use crate::{
    layout::{self, METS_FILE, REPRESENTATIONS_DIR},
    sequence::{validate_sequence, RepresentationName},
    PackageName,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// SIP that passed every precondition
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ValidatedSip {
    /// Canonical path of the SIP directory
    pub directory: PathBuf,
    pub name: String,
    /// Parsed `name`, absent in same-name mode
    pub package_name: Option<PackageName>,
    /// Representation directory names in SIP order
    pub representations: Vec<String>,
}

pub(super) async fn validate(
    sip: &Path,
    output: &Path,
    options: &TransformOptions,
) -> Result<ValidatedSip, TransformError> {
    let directory = fs::canonicalize(sip).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TransformError::SipNotFound(sip.to_path_buf()),
        _ => filesystem(Stage::Inspect, sip)(e),
    })?;
    if !directory.is_dir() {
        return Err(TransformError::SipNotDirectory(sip.to_path_buf()));
    }
    if !directory.join(METS_FILE).is_file() {
        return Err(TransformError::MissingManifest(directory.join(METS_FILE)));
    }

    let representations_directory = directory.join(REPRESENTATIONS_DIR);
    if !representations_directory.is_dir() {
        return Err(TransformError::MissingRepresentations(representations_directory));
    }
    let representation_directories = layout::list_directories(&representations_directory)
        .await
        .map_err(filesystem(Stage::Inspect, &representations_directory))?;
    if representation_directories.is_empty() {
        return Err(TransformError::MissingRepresentations(representations_directory));
    }
    for representation in &representation_directories {
        if !representation.join(METS_FILE).is_file() {
            return Err(TransformError::MissingManifest(representation.join(METS_FILE)));
        }
    }

    if output.exists() && !output.is_dir() {
        return Err(TransformError::OutputNotDirectory(output.to_path_buf()));
    }
    if resolve_output(output).await?.starts_with(&directory) {
        return Err(TransformError::OutputIsSip(output.to_path_buf()));
    }

    let name = layout::file_name(&directory);
    let package_name = if options.same_name {
        None
    } else {
        Some(name.parse::<PackageName>()?)
    };

    let mut representations = representation_directories
        .iter()
        .map(|directory| layout::file_name(directory))
        .collect::<Vec<_>>();
    if options.enforce_sequence {
        validate_sequence(&representations)?;
        representations.sort_by_cached_key(|name| name.parse::<RepresentationName>().ok());
    }
    debug!(sip = name.as_str(), ?representations, "SIP is valid");

    Ok(ValidatedSip {
        directory,
        name,
        package_name,
        representations,
    })
}

/// Absolute form of `output`, canonical up to its closest existing ancestor
async fn resolve_output(output: &Path) -> Result<PathBuf, TransformError> {
    let absolute = if output.is_absolute() {
        output.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(filesystem(Stage::Inspect, output))?
            .join(output)
    };

    let existing = absolute
        .ancestors()
        .find(|ancestor| ancestor.exists())
        .unwrap_or(absolute.as_path());
    let mut resolved = fs::canonicalize(existing)
        .await
        .map_err(filesystem(Stage::Inspect, existing))?;
    if let Ok(missing) = absolute.strip_prefix(existing) {
        resolved.extend(missing.components());
    }
    Ok(resolved)
}
