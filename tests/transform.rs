use eark_aip::{
    error::{RewriteError, SequenceError, TransformError},
    layout,
    mets::SOFTWARE_VERSION,
    xml::Element,
    Algorithm, ChecksumAlgorithm, Manifest, PackageName, RandomIds, SequentialIds,
    TransformOptions, TransformReport, Transformer,
};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const SIP_NAME: &str = "my-package-uuid-4b6f6a4e-2f7c-4a8e-9d3b-1c2d3e4f5a6b";
const TIMESTAMP: &str = "2024-05-01T10:00:00Z";

fn sample_sip() -> PathBuf {
    let mut sip = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    sip.push("tests/sample-sip");
    sip.push(SIP_NAME);
    sip
}

async fn transform(
    sip: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: TransformOptions,
) -> Result<TransformReport, TransformError> {
    let ids = SequentialIds::default();
    let algo = ChecksumAlgorithm::<Sha256>::new(Algorithm::Sha256);
    Transformer::new(&ids, &algo, options)
        .with_timestamp(TIMESTAMP)
        .run(sip, output)
        .await
}

/// Writable copy of the fixture SIP
async fn copy_of_sample(directory: &Path) -> PathBuf {
    let sip = directory.join(SIP_NAME);
    layout::copy_directory(sample_sip(), &sip, &[]).await.unwrap();
    sip
}

fn elements<'a>(manifest: &'a Manifest, name: &str) -> Vec<&'a Element> {
    manifest
        .root()
        .descendants()
        .into_iter()
        .filter(|element| element.name() == name)
        .collect()
}

fn relative_files(directory: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![directory.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path.strip_prefix(directory).unwrap().to_path_buf());
            }
        }
    }
    files.sort();
    files
}

async fn manifests(aip: &Path) -> Vec<(PathBuf, Manifest)> {
    let mut manifests = Vec::new();
    for base in [
        aip.to_path_buf(),
        aip.join("representations/rep01.1"),
        aip.join("representations/rep02.1"),
    ] {
        let manifest = Manifest::read(base.join("METS.xml")).await.unwrap();
        manifests.push((base, manifest));
    }
    manifests
}

#[tokio::test]
async fn end_to_end() {
    let output = async_tempfile::TempDir::new().await.unwrap();
    let algo = ChecksumAlgorithm::<Sha256>::new(Algorithm::Sha256);
    let report = Transformer::new(&RandomIds, &algo, TransformOptions::default())
        .run(sample_sip(), output.to_path_buf())
        .await
        .unwrap();

    // Same prefix, fresh UUID
    let sip_name = SIP_NAME.parse::<PackageName>().unwrap();
    let aip_name = report.aip_name.parse::<PackageName>().unwrap();
    assert_eq!(aip_name.prefix(), "my-package-");
    assert_ne!(aip_name.uuid(), sip_name.uuid());
    assert_eq!(report.aip_directory.file_name().unwrap(), report.aip_name.as_str());

    let aip = &report.aip_directory;
    for path in [
        "METS.xml",
        "submission/METS.xml",
        "submission/representations/rep2/data/archive.zip",
        "metadata/descriptive/DC.xml",
        "schemas/mets1_12.xsd",
        "documentation/README.txt",
        "representations/rep01.1/METS.xml",
        "representations/rep01.1/data/report.txt",
        "representations/rep02.1/METS.xml",
        "representations/rep02.1/data/archive.zip",
    ] {
        assert!(aip.join(path).is_file(), "{path} is missing");
    }
    assert!(!aip.join("representations/rep1").exists());

    let sources = report
        .representations
        .iter()
        .map(|representation| (representation.source.as_str(), representation.name.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(sources, [("rep1", "rep01.1"), ("rep2", "rep02.1")]);

    let root = Manifest::read(aip.join("METS.xml")).await.unwrap();
    assert_eq!(root.object_id(), Some(report.aip_name.as_str()));
    let uses = elements(&root, "mets:fileGrp")
        .into_iter()
        .map(|group| group.attribute("USE").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        uses,
        [
            "Documentation",
            "Schemas",
            "submission",
            "representations/rep01.1",
            "representations/rep02.1"
        ]
    );

    let hrefs = elements(&root, "mets:mptr")
        .into_iter()
        .map(|pointer| pointer.attribute("xlink:href").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        hrefs,
        [
            "submission/METS.xml",
            "representations/rep01.1/METS.xml",
            "representations/rep02.1/METS.xml"
        ]
    );
}

#[tokio::test]
async fn checksums_match_files() {
    let output = async_tempfile::TempDir::new().await.unwrap();
    let report = transform(sample_sip(), output.to_path_buf(), TransformOptions::default())
        .await
        .unwrap();

    for (base, manifest) in manifests(&report.aip_directory).await {
        check_checksums(&base, &manifest);
    }
}

/// Every `file` matches the file its `FLocat` points at
fn check_checksums(base: &Path, manifest: &Manifest) {
    let files = elements(manifest, "mets:file");
    assert!(!files.is_empty());

    for file in files {
        let href = file
            .find("mets:FLocat")
            .and_then(|location| location.attribute("xlink:href"))
            .unwrap();
        let contents = std::fs::read(base.join(href)).unwrap();

        assert_eq!(
            file.attribute("CHECKSUM").unwrap(),
            hex::encode(Sha256::digest(&contents)),
            "checksum of {href}"
        );
        assert_eq!(file.attribute("CHECKSUMTYPE"), Some("SHA-256"));
        assert_eq!(file.attribute("SIZE").unwrap(), contents.len().to_string());
    }
}

/// IDs are unique and every pointer targets one of them
fn check_identifiers(manifest: &Manifest) {
    let mut identifiers = HashSet::new();
    for element in manifest.root().descendants() {
        if let Some(id) = element.attribute("ID") {
            assert!(identifiers.insert(id), "{id} is not unique");
        }
    }

    let mut references = Vec::new();
    for division in elements(manifest, "mets:div") {
        for attribute in ["DMDID", "ADMID"] {
            if let Some(value) = division.attribute(attribute) {
                references.extend(value.split_whitespace());
            }
        }
    }
    references.extend(
        elements(manifest, "mets:fptr")
            .into_iter()
            .filter_map(|pointer| pointer.attribute("FILEID")),
    );
    references.extend(
        elements(manifest, "mets:mptr")
            .into_iter()
            .filter_map(|pointer| pointer.attribute("xlink:title")),
    );

    assert!(!references.is_empty());
    for reference in references {
        assert!(identifiers.contains(reference), "{reference} points nowhere");
    }
}

#[tokio::test]
async fn identifiers_are_unique_and_references_resolve() {
    let output = async_tempfile::TempDir::new().await.unwrap();
    let report = transform(sample_sip(), output.to_path_buf(), TransformOptions::default())
        .await
        .unwrap();

    assert!(report.root.unresolved.is_empty());
    for representation in &report.representations {
        assert!(representation.report.unresolved.is_empty());
    }

    for (_, manifest) in manifests(&report.aip_directory).await {
        check_identifiers(&manifest);
    }

    // Old identifiers are gone, untouched ones survive
    let root = std::fs::read_to_string(report.aip_directory.join("METS.xml")).unwrap();
    assert!(!root.contains("\"dmd-dc\""));
    assert!(!root.contains("fileGrp-rep1"));
    assert!(root.contains("ADMID=\"digiprov-premis\""));
    assert_eq!(report.root.remap.get(SIP_NAME), Some(report.aip_name.as_str()));
}

#[tokio::test]
async fn root_header_and_namespaces() {
    let output = async_tempfile::TempDir::new().await.unwrap();
    let report = transform(sample_sip(), output.to_path_buf(), TransformOptions::default())
        .await
        .unwrap();
    let root = Manifest::read(report.aip_directory.join("METS.xml")).await.unwrap();

    let header = root.root().find("mets:metsHdr").unwrap();
    assert_eq!(header.attribute("CREATEDATE"), Some("2023-11-02T10:00:00Z"));
    assert_eq!(header.attribute("LASTMODDATE"), Some(TIMESTAMP));
    assert_eq!(header.attribute("RECORDSTATUS"), Some("Revised"));
    assert_eq!(header.attribute("csip:OAISPACKAGETYPE"), Some("AIP"));
    assert!(header.find("mets:metsDocumentID").is_none());

    let agents = header
        .find_all("mets:agent")
        .map(|agent| agent.find("mets:name").unwrap().text())
        .collect::<Vec<_>>();
    assert_eq!(agents, ["Municipal Archive", "E-ARK AIP Creator"]);
    let version = header.find_all("mets:agent").last().unwrap();
    assert_eq!(version.find("mets:note").unwrap().text(), SOFTWARE_VERSION);

    assert_eq!(
        root.root().attribute("xmlns:aip"),
        Some("https://DILCIS.eu/XML/METS/AIPExtensionMETS")
    );
    assert_eq!(root.root().attribute("xmlns:sip"), None);
    let locations = root.root().attribute("xsi:schemaLocation").unwrap();
    assert!(locations.contains("https://DILCIS.eu/XML/METS/AIPExtensionMETS"));
    assert!(!locations.contains("SIPExtensionMETS "));

    let division = root
        .root()
        .find("mets:structMap")
        .and_then(|map| map.find("mets:div"))
        .unwrap();
    assert_eq!(division.attribute("LABEL"), Some(report.aip_name.as_str()));

    let written = std::fs::read_to_string(report.aip_directory.join("METS.xml")).unwrap();
    assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(written.contains("\n    <mets:metsHdr"));
}

#[tokio::test]
async fn representation_manifests() {
    let output = async_tempfile::TempDir::new().await.unwrap();
    let report = transform(sample_sip(), output.to_path_buf(), TransformOptions::default())
        .await
        .unwrap();
    let manifest = Manifest::read(report.aip_directory.join("representations/rep02.1/METS.xml"))
        .await
        .unwrap();

    assert_eq!(manifest.object_id(), Some("rep02.1"));

    let groups = elements(&manifest, "mets:fileGrp");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].attribute("USE"), Some("data"));
    let file = groups[0].find("mets:file").unwrap();
    assert_eq!(file.attribute("MIMETYPE"), Some("application/zip"));
    assert_eq!(
        file.find("mets:FLocat").unwrap().attribute("xlink:href"),
        Some("data/archive.zip")
    );

    let root_division = manifest
        .root()
        .find("mets:structMap")
        .and_then(|map| map.find("mets:div"))
        .unwrap();
    assert_eq!(root_division.attribute("LABEL"), Some("rep02.1"));
    assert_eq!(root_division.attribute("TYPE"), Some("ORIGINAL"));
    let children = root_division.find_all("mets:div").collect::<Vec<_>>();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].attribute("LABEL"), Some("data"));
    assert_eq!(children[0].attribute("TYPE"), Some("DATA"));
    assert_eq!(
        children[0].find("mets:fptr").unwrap().attribute("FILEID"),
        file.attribute("ID")
    );
}

#[tokio::test]
async fn rerun_overwrites() {
    let output = async_tempfile::TempDir::new().await.unwrap();
    let options = TransformOptions {
        same_name: true,
        ..Default::default()
    };

    let first = transform(sample_sip(), output.to_path_buf(), options).await.unwrap();
    assert_eq!(first.aip_name, SIP_NAME);
    let first_files = relative_files(&first.aip_directory);
    let first_manifest = std::fs::read_to_string(first.aip_directory.join("METS.xml")).unwrap();

    std::fs::write(first.aip_directory.join("leftover.txt"), "stale").unwrap();

    let second = transform(sample_sip(), output.to_path_buf(), options).await.unwrap();
    assert_eq!(second.aip_directory, first.aip_directory);
    assert_eq!(relative_files(&second.aip_directory), first_files);
    assert_eq!(
        std::fs::read_to_string(second.aip_directory.join("METS.xml")).unwrap(),
        first_manifest
    );
}

#[tokio::test]
async fn preconditions_fail_with_exit_code_1() {
    let output = async_tempfile::TempDir::new().await.unwrap();

    let missing = output.to_path_buf().join("missing-uuid-4b6f6a4e-2f7c-4a8e-9d3b-1c2d3e4f5a6b");
    let error = transform(&missing, output.to_path_buf(), TransformOptions::default())
        .await
        .unwrap_err();
    assert_eq!(error, TransformError::SipNotFound(missing));
    assert_eq!(error.exit_code(), 1);

    let work = async_tempfile::TempDir::new().await.unwrap();
    let sip = copy_of_sample(&work.to_path_buf()).await;
    std::fs::rename(sip.join("representations/rep2"), sip.join("representations/rep3")).unwrap();

    let error = transform(&sip, output.to_path_buf(), TransformOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        error,
        TransformError::Sequence(SequenceError::Gap {
            expected: 2,
            found: 3
        })
    );
    assert_eq!(error.exit_code(), 1);
    // Nothing is written before validation passes
    assert_eq!(std::fs::read_dir(output.to_path_buf()).unwrap().count(), 0);

    let options = TransformOptions {
        enforce_sequence: false,
        ..Default::default()
    };
    let report = transform(&sip, output.to_path_buf(), options).await.unwrap();
    assert_eq!(report.representations[1].source, "rep3");
    assert_eq!(report.representations[1].name, "rep02.1");
}

#[tokio::test]
async fn output_overlapping_sip_is_rejected() {
    let work = async_tempfile::TempDir::new().await.unwrap();
    let sip = copy_of_sample(&work.to_path_buf()).await;
    let files = relative_files(&sip);

    for output in [sip.clone(), sip.join("aips")] {
        let error = transform(&sip, &output, TransformOptions::default())
            .await
            .unwrap_err();
        assert_eq!(error, TransformError::OutputIsSip(output));
        assert_eq!(error.exit_code(), 1);
    }

    // Same name next to the SIP would delete it
    let options = TransformOptions {
        same_name: true,
        ..Default::default()
    };
    let error = transform(&sip, work.to_path_buf(), options).await.unwrap_err();
    assert!(matches!(error, TransformError::OutputIsSip(_)));
    assert_eq!(error.exit_code(), 1);

    assert_eq!(relative_files(&sip), files);
}

#[tokio::test]
async fn broken_manifest_fails_with_exit_code_2() {
    let work = async_tempfile::TempDir::new().await.unwrap();
    let output = async_tempfile::TempDir::new().await.unwrap();
    let sip = copy_of_sample(&work.to_path_buf()).await;
    std::fs::write(
        sip.join("representations/rep1/METS.xml"),
        "<mets:mets xmlns:mets=\"http://www.loc.gov/METS/\"><mets:metsHdr>",
    )
    .unwrap();

    let error = transform(&sip, output.to_path_buf(), TransformOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        TransformError::Rewrite(_, RewriteError::Format(_))
    ));
    assert_eq!(error.exit_code(), 2);
}

#[tokio::test]
async fn update_archived_representation() {
    let output = async_tempfile::TempDir::new().await.unwrap();
    let ids = SequentialIds::default();
    let algo = ChecksumAlgorithm::<Sha256>::new(Algorithm::Sha256);
    let transformer =
        Transformer::new(&ids, &algo, TransformOptions::default()).with_timestamp(TIMESTAMP);
    let report = transformer
        .run(sample_sip(), output.to_path_buf())
        .await
        .unwrap();
    let aip = &report.aip_directory;
    let representation = aip.join("representations/rep01.1");

    // Data replaced by its archive
    std::fs::remove_file(representation.join("data/report.txt")).unwrap();
    let archive = std::fs::read(sample_sip().join("representations/rep2/data/archive.zip")).unwrap();
    std::fs::write(representation.join("data/rep01.1.zip"), &archive).unwrap();

    // A second run replaces what the first one wrote
    for _ in 0..2 {
        let update = transformer
            .update_representation(&representation)
            .await
            .unwrap();
        assert_eq!(update.name, "rep01.1");
        assert_eq!(update.payload, Path::new("data/rep01.1.zip"));
        assert_eq!(update.aip_directory, aip.canonicalize().unwrap());
        assert!(update.representation.unresolved.is_empty());
        assert!(update.root.unresolved.is_empty());
    }

    for (base, manifest) in manifests(aip).await {
        check_checksums(&base, &manifest);
        check_identifiers(&manifest);
    }

    let manifest = Manifest::read(representation.join("METS.xml")).await.unwrap();
    let files = elements(&manifest, "mets:file");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].attribute("MIMETYPE"), Some("application/zip"));
    assert_eq!(
        files[0].find("mets:FLocat").unwrap().attribute("xlink:href"),
        Some("data/rep01.1.zip")
    );

    let root = Manifest::read(aip.join("METS.xml")).await.unwrap();
    let groups = elements(&root, "mets:fileGrp")
        .into_iter()
        .filter(|group| group.attribute("USE") == Some("representations/rep01.1"))
        .collect::<Vec<_>>();
    assert_eq!(groups.len(), 1);
    let divisions = elements(&root, "mets:div")
        .into_iter()
        .filter(|division| division.attribute("LABEL") == Some("representations/rep01.1"))
        .collect::<Vec<_>>();
    assert_eq!(divisions.len(), 1);
    assert_eq!(
        divisions[0].find("mets:mptr").unwrap().attribute("xlink:title"),
        groups[0].attribute("ID")
    );
}

#[tokio::test]
async fn update_requires_single_archive() {
    let output = async_tempfile::TempDir::new().await.unwrap();
    let report = transform(sample_sip(), output.to_path_buf(), TransformOptions::default())
        .await
        .unwrap();
    let representation = report.aip_directory.join("representations/rep01.1");
    let root_manifest = std::fs::read_to_string(report.aip_directory.join("METS.xml")).unwrap();

    let ids = SequentialIds::default();
    let algo = ChecksumAlgorithm::<Sha256>::new(Algorithm::Sha256);
    let transformer = Transformer::new(&ids, &algo, TransformOptions::default());

    // data/ still holds the original text file
    let error = transformer
        .update_representation(&representation)
        .await
        .unwrap_err();
    assert!(matches!(error, TransformError::UnexpectedPayload(_)));
    assert_eq!(error.exit_code(), 1);

    let error = transformer
        .update_representation(&report.aip_directory)
        .await
        .unwrap_err();
    assert_eq!(
        error,
        TransformError::NotARepresentation(report.aip_directory.clone())
    );
    assert_eq!(error.exit_code(), 1);

    assert_eq!(
        std::fs::read_to_string(report.aip_directory.join("METS.xml")).unwrap(),
        root_manifest
    );
}
