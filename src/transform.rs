//! SIP to AIP pipeline: validation, layout of the AIP directory and manifest rewrites.
//!
//! Representations of an existing AIP can also be updated once their data was archived.

mod update;
mod validate;

pub use update::UpdateReport;

use crate::{
    error::{InvalidPackageNameError, SequenceError},
    identifier::IdGenerator,
    layout::{self, DATA_DIR, METS_FILE, REPRESENTATIONS_DIR, SHARED_DIRS, SUBMISSION_DIR},
    mets::{IdRemap, Manifest, RewriteError, RewriteReport, Rewriter, RootLayout},
    ChecksumAlgorithm,
};
use digest::Digest;
use std::{
    fmt::Display,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Runtime switches of a [`Transformer`]
pub struct TransformOptions {
    /// Reuse the SIP directory name as the AIP name instead of allocating a fresh UUID
    pub same_name: bool,

    /// Require representations named `<prefix>1`, `<prefix>2`, ... and process them in that order
    pub enforce_sequence: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            same_name: false,
            enforce_sequence: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Filesystem step that failed
pub enum Stage {
    Inspect,
    Clear,
    Copy,
    CreateDirectory,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Inspect => "inspect",
            Stage::Clear => "clear",
            Stage::Copy => "copy",
            Stage::CreateDirectory => "create directory",
        })
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TransformError {
    #[error("SIP `{0}` does not exist")]
    SipNotFound(PathBuf),
    #[error("SIP `{0}` is not a directory")]
    SipNotDirectory(PathBuf),
    #[error("Manifest `{0}` is missing")]
    MissingManifest(PathBuf),
    #[error("No representation directory in `{0}`")]
    MissingRepresentations(PathBuf),
    #[error("Output `{0}` is not a directory")]
    OutputNotDirectory(PathBuf),
    #[error("Output `{0}` overlaps the SIP")]
    OutputIsSip(PathBuf),
    #[error("Representation `{0}` does not exist")]
    RepresentationNotFound(PathBuf),
    #[error("`{0}` is not a representation directory of an AIP")]
    NotARepresentation(PathBuf),
    #[error("No archived payload in `{0}`")]
    MissingPayload(PathBuf),
    #[error("`{0}` must hold a single `.zip` archive")]
    UnexpectedPayload(PathBuf),
    #[error("Invalid SIP name: {0}")]
    PackageName(#[from] InvalidPackageNameError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("Failed to {stage} `{path}`")]
    Filesystem {
        stage: Stage,
        path: PathBuf,
        kind: std::io::ErrorKind,
    },
    #[error("Failed to rewrite `{0}`: {1}")]
    Rewrite(PathBuf, RewriteError),
}

impl TransformError {
    /// `1` for unmet preconditions, `2` for failures while building the AIP
    pub fn exit_code(&self) -> u8 {
        match self {
            TransformError::SipNotFound(_)
            | TransformError::SipNotDirectory(_)
            | TransformError::MissingManifest(_)
            | TransformError::MissingRepresentations(_)
            | TransformError::OutputNotDirectory(_)
            | TransformError::OutputIsSip(_)
            | TransformError::RepresentationNotFound(_)
            | TransformError::NotARepresentation(_)
            | TransformError::MissingPayload(_)
            | TransformError::UnexpectedPayload(_)
            | TransformError::PackageName(_)
            | TransformError::Sequence(_) => 1,
            TransformError::Filesystem { .. } | TransformError::Rewrite(..) => 2,
        }
    }
}

/// Wrap an I/O error raised while doing `stage` on `path`
fn filesystem(stage: Stage, path: &Path) -> impl FnOnce(std::io::Error) -> TransformError + '_ {
    move |e| TransformError::Filesystem {
        stage,
        path: path.to_path_buf(),
        kind: e.kind(),
    }
}

fn rewrite(path: &Path) -> impl FnOnce(RewriteError) -> TransformError + '_ {
    move |e| TransformError::Rewrite(path.to_path_buf(), e)
}

#[derive(Debug, Clone, PartialEq)]
/// Rewrite of one representation manifest
pub struct RepresentationReport {
    /// Directory name in the SIP
    pub source: String,
    /// Directory name in the AIP, also the manifest `OBJID`
    pub name: String,
    pub report: RewriteReport,
}

#[derive(Debug, Clone, PartialEq)]
/// Outcome of [`Transformer::run()`]
pub struct TransformReport {
    pub aip_name: String,
    pub aip_directory: PathBuf,
    pub root: RewriteReport,
    pub representations: Vec<RepresentationReport>,
}

/// Builds AIPs out of SIPs
///
/// # Examples
///
/// ```no_run
/// use eark_aip::{Algorithm, ChecksumAlgorithm, RandomIds, TransformOptions, Transformer};
/// use sha2::Sha256;
///
/// # async fn transform() {
/// let algo = ChecksumAlgorithm::<Sha256>::new(Algorithm::Sha256);
/// let transformer = Transformer::new(&RandomIds, &algo, TransformOptions::default());
///
/// let report = transformer
///     .run("sips/my-package-uuid-4b6f6a4e-2f7c-4a8e-9d3b-1c2d3e4f5a6b", "aips")
///     .await
///     .unwrap();
/// println!("{}", report.aip_name);
/// # }
/// ```
pub struct Transformer<'a, ChecksumAlgo: Digest> {
    ids: &'a dyn IdGenerator,
    checksum_algorithm: &'a ChecksumAlgorithm<ChecksumAlgo>,
    options: TransformOptions,
    timestamp: Option<String>,
}

impl<'a, ChecksumAlgo: Digest> Transformer<'a, ChecksumAlgo> {
    pub fn new(
        ids: &'a dyn IdGenerator,
        checksum_algorithm: &'a ChecksumAlgorithm<ChecksumAlgo>,
        options: TransformOptions,
    ) -> Self {
        Self {
            ids,
            checksum_algorithm,
            options,
            timestamp: None,
        }
    }

    /// Stamp every manifest with `timestamp` instead of the time of the run
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    fn rewriter(&self) -> Rewriter<'a, ChecksumAlgo> {
        let rewriter = Rewriter::new(self.ids, self.checksum_algorithm);
        match &self.timestamp {
            Some(timestamp) => rewriter.with_timestamp(timestamp.as_str()),
            None => rewriter,
        }
    }

    /// Check every precondition on `sip` and `output` without writing anything
    pub async fn validate(
        &self,
        sip: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), TransformError> {
        validate::validate(sip.as_ref(), output.as_ref(), &self.options).await?;
        Ok(())
    }

    /// Build the AIP of `sip` in a new directory of `output`
    ///
    /// An existing AIP directory with the same name is deleted first.
    pub async fn run(
        &self,
        sip: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<TransformReport, TransformError> {
        let output = output.as_ref();
        let sip = validate::validate(sip.as_ref(), output, &self.options).await?;

        let aip_name = match &sip.package_name {
            Some(package_name) => package_name.with_uuid(self.ids.next_uuid()).to_string(),
            None => sip.name.clone(),
        };
        info!(sip = sip.name.as_str(), aip = aip_name.as_str(), "Transforming SIP");

        fs::create_dir_all(output)
            .await
            .map_err(filesystem(Stage::CreateDirectory, output))?;
        let output = fs::canonicalize(output)
            .await
            .map_err(filesystem(Stage::Inspect, output))?;
        let aip_directory = output.join(&aip_name);
        if aip_directory.starts_with(&sip.directory) || sip.directory.starts_with(&aip_directory) {
            return Err(TransformError::OutputIsSip(aip_directory));
        }

        if layout::recreate_directory(&aip_directory)
            .await
            .map_err(filesystem(Stage::Clear, &aip_directory))?
        {
            warn!(aip = %aip_directory.display(), "Overwrote existing AIP directory");
        }

        let submission = aip_directory.join(SUBMISSION_DIR);
        layout::copy_directory(&sip.directory, &submission, &[])
            .await
            .map_err(filesystem(Stage::Copy, &sip.directory))?;
        for shared in SHARED_DIRS {
            let source = sip.directory.join(shared);
            if source.is_dir() {
                debug!(directory = shared, "Copying shared directory");
                layout::copy_directory(&source, aip_directory.join(shared), &[])
                    .await
                    .map_err(filesystem(Stage::Copy, &source))?;
            }
        }

        let rewriter = self.rewriter();

        let mut representations = Vec::with_capacity(sip.representations.len());
        for (index, source) in sip.representations.iter().enumerate() {
            let name = layout::preservation_name(index + 1);
            let report = self
                .build_representation(&rewriter, &aip_directory, source, &name)
                .await?;
            representations.push(RepresentationReport {
                source: source.clone(),
                name,
                report,
            });
        }

        let template = submission.join(METS_FILE);
        let mut manifest = Manifest::read(&template)
            .await
            .map_err(rewrite(&template))?;
        let mut remap = IdRemap::new();
        remap.seed(sip.name.as_str(), aip_name.as_str());
        if let Some(object_id) = manifest.object_id() {
            remap.seed(object_id, aip_name.as_str());
        }
        let root = rewriter
            .rewrite_root(
                &mut manifest,
                &RootLayout::new(aip_name.as_str(), &aip_directory),
                remap,
            )
            .await
            .map_err(rewrite(&template))?;
        let target = aip_directory.join(METS_FILE);
        manifest.write(&target).await.map_err(rewrite(&target))?;

        info!(
            aip = aip_name.as_str(),
            representations = representations.len(),
            unresolved = root.unresolved.len(),
            "AIP created"
        );

        Ok(TransformReport {
            aip_name,
            aip_directory,
            root,
            representations,
        })
    }

    /// Copy `representations/<source>` of the submission to `representations/<name>` and rewrite its manifest
    async fn build_representation(
        &self,
        rewriter: &Rewriter<'_, ChecksumAlgo>,
        aip_directory: &Path,
        source: &str,
        name: &str,
    ) -> Result<RewriteReport, TransformError> {
        let submitted = aip_directory
            .join(SUBMISSION_DIR)
            .join(REPRESENTATIONS_DIR)
            .join(source);
        let target = aip_directory.join(REPRESENTATIONS_DIR).join(name);
        info!(source, representation = name, "Creating representation");

        layout::copy_directory(&submitted, &target, &[METS_FILE])
            .await
            .map_err(filesystem(Stage::Copy, &submitted))?;
        let data = target.join(DATA_DIR);
        fs::create_dir_all(&data)
            .await
            .map_err(filesystem(Stage::CreateDirectory, &data))?;

        let template = submitted.join(METS_FILE);
        let mut manifest = Manifest::read(&template)
            .await
            .map_err(rewrite(&template))?;
        let report = rewriter
            .rewrite_representation(&mut manifest, &target, name)
            .await
            .map_err(rewrite(&template))?;
        let output = target.join(METS_FILE);
        manifest.write(&output).await.map_err(rewrite(&output))?;

        Ok(report)
    }
}
