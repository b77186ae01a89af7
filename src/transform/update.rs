use super::{filesystem, rewrite, Stage, TransformError, Transformer};
use crate::{
    layout::{self, DATA_DIR, METS_FILE, REPRESENTATIONS_DIR},
    mets::{Manifest, RewriteReport},
};
use digest::Digest;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Extension of the archived payload of a preservation representation
const PAYLOAD_EXTENSION: &str = "zip";

#[derive(Debug, Clone, PartialEq)]
/// Outcome of [`Transformer::update_representation()`]
pub struct UpdateReport {
    pub aip_directory: PathBuf,
    /// Representation directory name, e.g. `rep01.1`
    pub name: String,
    /// Path of the payload relative to the representation directory
    pub payload: PathBuf,
    pub representation: RewriteReport,
    pub root: RewriteReport,
}

/// Representation of an AIP whose `data/` holds a single archive
struct ArchivedRepresentation {
    directory: PathBuf,
    name: String,
    aip_directory: PathBuf,
    payload: PathBuf,
}

async fn inspect(representation: &Path) -> Result<ArchivedRepresentation, TransformError> {
    let directory = fs::canonicalize(representation)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                TransformError::RepresentationNotFound(representation.to_path_buf())
            }
            _ => filesystem(Stage::Inspect, representation)(e),
        })?;

    let aip_directory = match directory.parent() {
        Some(parent) if directory.is_dir() && layout::file_name(parent) == REPRESENTATIONS_DIR => {
            parent.parent().map(Path::to_path_buf)
        }
        _ => None,
    }
    .ok_or_else(|| TransformError::NotARepresentation(representation.to_path_buf()))?;

    for manifest in [directory.join(METS_FILE), aip_directory.join(METS_FILE)] {
        if !manifest.is_file() {
            return Err(TransformError::MissingManifest(manifest));
        }
    }

    let data = directory.join(DATA_DIR);
    if !data.is_dir() {
        return Err(TransformError::MissingPayload(data));
    }
    let files = layout::list_files(&directory, &data)
        .await
        .map_err(filesystem(Stage::Inspect, &data))?;
    let payload = match files.as_slice() {
        [] => return Err(TransformError::MissingPayload(data)),
        [payload] if payload.extension().is_some_and(|extension| extension == PAYLOAD_EXTENSION) => {
            payload.clone()
        }
        _ => return Err(TransformError::UnexpectedPayload(data)),
    };

    Ok(ArchivedRepresentation {
        name: layout::file_name(&directory),
        directory,
        aip_directory,
        payload,
    })
}

impl<ChecksumAlgo: Digest> Transformer<'_, ChecksumAlgo> {
    /// Describe the archive that replaced the data of `representation` in its manifest and in the AIP root manifest
    ///
    /// `representation` is `<aip>/representations/<name>`, its `data/` directory
    /// must hold exactly one `.zip` file. Running this again replaces the
    /// entries written by the previous run.
    pub async fn update_representation(
        &self,
        representation: impl AsRef<Path>,
    ) -> Result<UpdateReport, TransformError> {
        let archived = inspect(representation.as_ref()).await?;
        let rewriter = self.rewriter();
        info!(
            representation = archived.name.as_str(),
            payload = %archived.payload.display(),
            "Updating representation"
        );

        let path = archived.directory.join(METS_FILE);
        let mut manifest = Manifest::read(&path).await.map_err(rewrite(&path))?;
        let representation = rewriter
            .refresh_representation(&mut manifest, &archived.directory, &archived.payload)
            .await
            .map_err(rewrite(&path))?;
        manifest.write(&path).await.map_err(rewrite(&path))?;

        let path = archived.aip_directory.join(METS_FILE);
        let mut manifest = Manifest::read(&path).await.map_err(rewrite(&path))?;
        let root = rewriter
            .refresh_root(&mut manifest, &archived.aip_directory, &archived.name)
            .await
            .map_err(rewrite(&path))?;
        manifest.write(&path).await.map_err(rewrite(&path))?;

        info!(
            representation = archived.name.as_str(),
            unresolved = representation.unresolved.len() + root.unresolved.len(),
            "Representation updated"
        );

        Ok(UpdateReport {
            aip_directory: archived.aip_directory,
            name: archived.name,
            payload: archived.payload,
            representation,
            root,
        })
    }
}
