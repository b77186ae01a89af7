//! Rewrite of SIP manifests into AIP manifests.
//!
//! A rewrite runs in passes over a copy of the document:
//!
//! 1. sections, groups and files get fresh identifiers, recorded in an [`IdRemap`]
//! 2. structural maps get fresh identifiers and their pointers are resolved
//!    against the complete table
//! 3. entries describing the new layout are appended
//! 4. identifiers are checked for uniqueness
//!
//! The manifest is only replaced once every pass succeeded.
//!
//! Manifests already in an AIP can be refreshed after their payload changed:
//! only the affected group and division are rebuilt, the remaining
//! identifiers are kept and pointers to replaced ones are resolved again.

mod audit;
mod header;
mod names;
mod refresh;
mod remap;
mod sections;
mod struct_map;
mod synthesize;

pub use remap::{IdRemap, UnresolvedReference};

use crate::{
    identifier::IdGenerator,
    layout::{self, DATA_DIR, METS_FILE, PRESERVATION_SUFFIX, REPRESENTATIONS_DIR, SUBMISSION_DIR},
    payload::{Payload, PayloadError},
    sequence::natural_key,
    xml::{Document, Element, NamespaceRegistry, XmlError},
    ChecksumAlgorithm,
};
use digest::Digest;
use names::MetsNames;
use remap::Resolver;
use std::path::{Path, PathBuf};
use synthesize::LinkedManifest;
use tokio::fs;
use tracing::{debug, info};

/// Name of the agent recorded as creator of rewritten manifests
pub const SOFTWARE_NAME: &str = "E-ARK AIP Creator";

/// Version recorded next to [`SOFTWARE_NAME`]
pub const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RewriteError {
    #[error("Failed to read manifest `{0}`")]
    ReadManifest(PathBuf, std::io::ErrorKind),
    #[error("Failed to write manifest `{0}`")]
    WriteManifest(PathBuf, std::io::ErrorKind),
    #[error("Failed to list directory `{0}`")]
    ListDirectory(PathBuf, std::io::ErrorKind),
    #[error(transparent)]
    Format(#[from] XmlError),
    #[error("Manifest does not declare the METS namespace")]
    MissingMetsNamespace,
    #[error("Manifest has no `{0}` element")]
    MissingElement(&'static str),
    #[error("Unsupported manifest structure: {0}")]
    UnsupportedStructure(String),
    #[error("Identifier `{0}` is used more than once")]
    DuplicateIdentifier(String),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

#[derive(Debug, Clone, PartialEq)]
/// A parsed METS document together with the namespaces it declares
pub struct Manifest {
    namespaces: NamespaceRegistry,
    document: Document,
}

impl Manifest {
    pub fn parse(input: &str) -> Result<Self, RewriteError> {
        let namespaces = NamespaceRegistry::extract(input)?;
        let document = Document::parse(input)?;
        Ok(Self {
            namespaces,
            document,
        })
    }

    pub async fn read(path: impl AsRef<Path>) -> Result<Self, RewriteError> {
        let path = path.as_ref();
        let input = fs::read_to_string(path)
            .await
            .map_err(|e| RewriteError::ReadManifest(path.to_path_buf(), e.kind()))?;
        Self::parse(&input)
    }

    pub async fn write(&self, path: impl AsRef<Path>) -> Result<(), RewriteError> {
        let path = path.as_ref();
        fs::write(path, self.to_xml()?)
            .await
            .map_err(|e| RewriteError::WriteManifest(path.to_path_buf(), e.kind()))
    }

    pub fn to_xml(&self) -> Result<String, RewriteError> {
        Ok(self.document.to_xml()?)
    }

    pub fn root(&self) -> &Element {
        self.document.root()
    }

    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    pub fn object_id(&self) -> Option<&str> {
        self.root().attribute("OBJID")
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
/// What a rewrite did to identifiers
pub struct RewriteReport {
    pub remap: IdRemap,
    pub unresolved: Vec<UnresolvedReference>,
}

#[derive(Debug, Clone, PartialEq)]
/// Where the root manifest of an AIP lives and what it links to
pub struct RootLayout {
    /// New `OBJID`, the AIP name
    pub object_id: String,

    /// AIP directory, all hrefs are relative to it
    pub package_directory: PathBuf,

    /// Copy of the SIP root manifest, relative to `package_directory`
    pub submission_manifest: Option<PathBuf>,
}

impl RootLayout {
    /// Layout of an AIP holding a `submission/` copy of its SIP
    pub fn new(object_id: impl Into<String>, package_directory: impl Into<PathBuf>) -> Self {
        Self {
            object_id: object_id.into(),
            package_directory: package_directory.into(),
            submission_manifest: Some(Path::new(SUBMISSION_DIR).join(METS_FILE)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Root,
    Representation,
}

impl Role {
    /// File groups regenerated by this role
    fn drops_group(self, group: &Element) -> bool {
        let group_use = group.attribute("USE").unwrap_or_default();
        match self {
            Role::Root => group_use
                .to_ascii_lowercase()
                .starts_with(REPRESENTATIONS_DIR),
            Role::Representation => group_use.eq_ignore_ascii_case(DATA_DIR),
        }
    }

    /// Top-level divisions regenerated by this role
    fn drops_division(self, division: &Element) -> bool {
        let label = division.attribute("LABEL").unwrap_or_default();
        match self {
            Role::Root => label.to_ascii_lowercase().starts_with(REPRESENTATIONS_DIR),
            Role::Representation => label.eq_ignore_ascii_case(DATA_DIR),
        }
    }
}

/// State shared by the passes of one rewrite
struct Context<'a> {
    ids: &'a dyn IdGenerator,
    timestamp: &'a str,
}

/// Rewrites SIP manifests into AIP manifests
///
/// Identifiers come from `ids`, checksums of described files from `checksum_algorithm`.
pub struct Rewriter<'a, ChecksumAlgo: Digest> {
    ids: &'a dyn IdGenerator,
    checksum_algorithm: &'a ChecksumAlgorithm<ChecksumAlgo>,
    timestamp: String,
}

impl<'a, ChecksumAlgo: Digest> Rewriter<'a, ChecksumAlgo> {
    /// Stamps rewritten manifests with the current time
    pub fn new(
        ids: &'a dyn IdGenerator,
        checksum_algorithm: &'a ChecksumAlgorithm<ChecksumAlgo>,
    ) -> Self {
        Self {
            ids,
            checksum_algorithm,
            timestamp: jiff::Timestamp::now()
                .strftime(TIMESTAMP_FORMAT)
                .to_string(),
        }
    }

    /// Stamp rewritten manifests with `timestamp` instead of the current time
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Turn the SIP root manifest into the AIP root manifest
    ///
    /// `remap` may be seeded with pairs known beforehand, such as the SIP name
    /// mapped to the AIP name. Manifests linked from the output are described
    /// from `layout.package_directory`, so they must be written first.
    pub async fn rewrite_root(
        &self,
        manifest: &mut Manifest,
        layout: &RootLayout,
        remap: IdRemap,
    ) -> Result<RewriteReport, RewriteError> {
        let mut linked = Vec::new();
        if let Some(submission) = &layout.submission_manifest {
            linked.push(LinkedManifest {
                label: SUBMISSION_DIR.to_string(),
                payload: Payload::describe(
                    &layout.package_directory,
                    submission,
                    self.checksum_algorithm,
                )
                .await?,
            });
        }
        linked.extend(
            self.representation_manifests(&layout.package_directory)
                .await?,
        );

        self.apply(manifest, Role::Root, &layout.object_id, remap, |root, names, context| {
            synthesize::link_manifests(root, names, context, &linked)
        })
    }

    /// Turn a SIP representation manifest into the manifest of `representation_directory`
    ///
    /// Every file below its `data/` directory is described in the output.
    pub async fn rewrite_representation(
        &self,
        manifest: &mut Manifest,
        representation_directory: impl AsRef<Path>,
        object_id: &str,
    ) -> Result<RewriteReport, RewriteError> {
        let representation_directory = representation_directory.as_ref();
        let data = representation_directory.join(DATA_DIR);

        let files = if data.is_dir() {
            layout::list_files(representation_directory, &data)
                .await
                .map_err(|e| RewriteError::ListDirectory(data.clone(), e.kind()))?
        } else {
            Vec::new()
        };

        let mut payloads = Vec::with_capacity(files.len());
        for file in files {
            let payload =
                Payload::describe(representation_directory, file, self.checksum_algorithm).await?;
            debug!(%payload, "Described payload");
            payloads.push(payload);
        }

        self.apply(
            manifest,
            Role::Representation,
            object_id,
            IdRemap::new(),
            |root, names, context| {
                synthesize::describe_data(root, names, context, &payloads).map(|_| ())
            },
        )
    }

    /// Describe the single archived payload of an AIP representation in its manifest
    ///
    /// The `data` group and `DATA` division are rebuilt around `payload`, a path
    /// relative to `representation_directory`; everything else keeps its identifiers.
    pub async fn refresh_representation(
        &self,
        manifest: &mut Manifest,
        representation_directory: impl AsRef<Path>,
        payload: impl AsRef<Path>,
    ) -> Result<RewriteReport, RewriteError> {
        let payload =
            Payload::describe(representation_directory, payload, self.checksum_algorithm).await?;

        self.refresh(manifest, |root, names, context, remap| {
            refresh::replace_data(root, names, context, &payload, remap)
        })
    }

    /// Point the AIP root manifest at the current manifest of `representations/<representation>`
    ///
    /// A group and division already describing it are replaced in place, so
    /// running this again does not add entries.
    pub async fn refresh_root(
        &self,
        manifest: &mut Manifest,
        package_directory: impl AsRef<Path>,
        representation: &str,
    ) -> Result<RewriteReport, RewriteError> {
        let label = format!("{REPRESENTATIONS_DIR}/{representation}");
        let payload = Payload::describe(
            package_directory,
            Path::new(&label).join(METS_FILE),
            self.checksum_algorithm,
        )
        .await?;
        let linked = LinkedManifest { label, payload };

        self.refresh(manifest, |root, names, context, remap| {
            refresh::relink_manifest(root, names, context, &linked, remap)
        })
    }

    /// Manifests of `representations/*/` in natural order, skipping legacy preservation directories
    async fn representation_manifests(
        &self,
        package_directory: &Path,
    ) -> Result<Vec<LinkedManifest>, RewriteError> {
        let representations = package_directory.join(REPRESENTATIONS_DIR);
        if !representations.is_dir() {
            return Ok(Vec::new());
        }

        let mut directories = layout::list_directories(&representations)
            .await
            .map_err(|e| RewriteError::ListDirectory(representations.clone(), e.kind()))?;
        directories.sort_by_cached_key(|directory| natural_key(&layout::file_name(directory)));

        let mut linked = Vec::with_capacity(directories.len());
        for directory in directories {
            let name = layout::file_name(&directory);
            if name.ends_with(PRESERVATION_SUFFIX) {
                debug!(name = name.as_str(), "Skipping preservation directory");
                continue;
            }

            let label = format!("{REPRESENTATIONS_DIR}/{name}");
            let payload = Payload::describe(
                package_directory,
                Path::new(&label).join(METS_FILE),
                self.checksum_algorithm,
            )
            .await?;
            linked.push(LinkedManifest { label, payload });
        }

        Ok(linked)
    }

    fn apply(
        &self,
        manifest: &mut Manifest,
        role: Role,
        object_id: &str,
        mut remap: IdRemap,
        synthesize: impl FnOnce(&mut Element, &MetsNames, &Context) -> Result<(), RewriteError>,
    ) -> Result<RewriteReport, RewriteError> {
        info!(object_id, ?role, "Rewriting manifest");

        let mut namespaces = manifest.namespaces.clone();
        let mut document = manifest.document.clone();
        let root = document.root_mut();

        namespaces.promote_to_aip(root);
        let names = MetsNames::resolve(&mut namespaces, root)?;
        let context = Context {
            ids: self.ids,
            timestamp: &self.timestamp,
        };

        root.set_attribute("OBJID", object_id);
        if let Some(schema_location) = &names.schema_location {
            if let Some(locations) = root.attribute(schema_location) {
                let locations = locations.replace("SIPExtensionMETS", "AIPExtensionMETS");
                root.set_attribute(schema_location, locations);
            }
        }

        header::rewrite_header(root, &names, &context)?;
        sections::record_metadata_sections(root, &names, &context, &mut remap);
        sections::record_file_section(root, &names, &context, &mut remap, role)?;

        let referenceable = audit::referenceable_identifiers(root, &names);
        let mut resolver = Resolver::new(&remap, referenceable, self.ids);
        struct_map::rewrite_struct_maps(root, &names, &context, role, object_id, &mut resolver)?;
        let unresolved = resolver.into_unresolved();

        synthesize(root, &names, &context)?;
        audit::check_unique_identifiers(root)?;

        debug!(
            object_id,
            remapped = remap.len(),
            unresolved = unresolved.len(),
            "Manifest rewritten"
        );
        manifest.namespaces = namespaces;
        manifest.document = document;

        Ok(RewriteReport { remap, unresolved })
    }

    fn refresh(
        &self,
        manifest: &mut Manifest,
        update: impl FnOnce(&mut Element, &MetsNames, &Context, &mut IdRemap) -> Result<(), RewriteError>,
    ) -> Result<RewriteReport, RewriteError> {
        let mut namespaces = manifest.namespaces.clone();
        let mut document = manifest.document.clone();
        let root = document.root_mut();

        let names = MetsNames::resolve(&mut namespaces, root)?;
        let context = Context {
            ids: self.ids,
            timestamp: &self.timestamp,
        };
        info!(object_id = root.attribute("OBJID"), "Refreshing manifest");

        refresh::touch_header(root, &names, &context)?;
        let mut remap = IdRemap::new();
        update(root, &names, &context, &mut remap)?;

        let mut resolver = Resolver::remapping_only(&remap, self.ids);
        struct_map::resolve_struct_maps(root, &names, &mut resolver);
        let unresolved = resolver.into_unresolved();
        audit::check_unique_identifiers(root)?;

        manifest.namespaces = namespaces;
        manifest.document = document;

        Ok(RewriteReport { remap, unresolved })
    }
}
