#![cfg_attr(docsrs, feature(doc_cfg))] // https://stackoverflow.com/a/61417700/4809297

/*!

Rust library to turn E-ARK submission packages (SIP) into archival packages (AIP), with the [Tokio async runtime](https://docs.rs/tokio).

# Learn about E-ARK packages

Here are some resources to get started with E-ARK information packages:

- The [Common Specification for Information Packages](https://earkcsip.dilcis.eu/) (CSIP), shared by SIPs and AIPs
- The [E-ARK AIP specification](https://earkaip.dilcis.eu/), describing the archival layout produced by this crate
- The [METS schema](https://www.loc.gov/standards/mets/), format of every manifest in a package

For the integrity part of the manifests, any type implementing the `Digest` trait from the [`digest`](https://docs.rs/digest) crate can be used to compute hashes.

## Transform a SIP

```no_run
use eark_aip::{Algorithm, ChecksumAlgorithm, RandomIds, TransformOptions, Transformer};

# #[tokio::main(flavor = "current_thread")]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
// Specify the algorithm to use for checksums
type AlgorithmToUse = sha2::Sha256;
let algorithm = ChecksumAlgorithm::<AlgorithmToUse>::new(Algorithm::Sha256);

// Where is the SIP, and where should the AIP be placed?
let sip_directory = "/somewhere/my-package-uuid-4b6f6a4e-2f7c-4a8e-9d3b-1c2d3e4f5a6b";
let output_directory = "/somewhere/else";

// Validate the SIP, lay out the AIP and rewrite every manifest
let transformer = Transformer::new(&RandomIds, &algorithm, TransformOptions::default());
let report = transformer.run(sip_directory, output_directory).await?;

// The AIP keeps the prefix of the SIP name, with a fresh UUID
println!("{}", report.aip_name);

# Ok(())
# }
```

## Rewrite a single manifest

```no_run
use eark_aip::{Algorithm, ChecksumAlgorithm, Manifest, Rewriter, SequentialIds};

# #[tokio::main(flavor = "current_thread")]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
let algorithm = ChecksumAlgorithm::<sha2::Sha256>::new(Algorithm::Sha256);

// Predictable identifiers and timestamp, handy to compare outputs
let ids = SequentialIds::default();
let rewriter = Rewriter::new(&ids, &algorithm).with_timestamp("2024-01-01T00:00:00Z");

let representation = "/somewhere/aip/representations/rep01.1";
let mut manifest = Manifest::read("/somewhere/sip/representations/rep1/METS.xml").await?;
let report = rewriter
    .rewrite_representation(&mut manifest, representation, "rep01.1")
    .await?;
manifest.write(format!("{representation}/METS.xml")).await?;

// Pointers whose target could not be found were given a fresh identifier
for reference in report.unresolved {
    eprintln!("{} `{}` was replaced", reference.attribute, reference.target);
}

# Ok(())
# }
```

## Update an archived representation

Once the data of a representation has been replaced by a single `.zip` archive,
its manifest and the AIP root manifest are refreshed in place:

```no_run
use eark_aip::{Algorithm, ChecksumAlgorithm, RandomIds, TransformOptions, Transformer};

# #[tokio::main(flavor = "current_thread")]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
let algorithm = ChecksumAlgorithm::<sha2::Sha256>::new(Algorithm::Sha256);
let transformer = Transformer::new(&RandomIds, &algorithm, TransformOptions::default());

let report = transformer
    .update_representation("/somewhere/aip/representations/rep01.1")
    .await?;
println!("{} now describes {}", report.name, report.payload.display());

# Ok(())
# }
```

*/

mod algorithm;
mod checksum;
mod identifier;
pub mod layout;
pub mod mets;
pub mod mimetype;
mod package_name;
mod payload;
mod sequence;
mod transform;
pub mod xml;

/// Possible errors when transforming packages
pub mod error {
    pub use crate::checksum::ChecksumComputeError;
    pub use crate::mets::RewriteError;
    pub use crate::package_name::InvalidPackageNameError;
    pub use crate::payload::PayloadError;
    pub use crate::sequence::SequenceError;
    pub use crate::transform::TransformError;
    pub use crate::xml::XmlError;
}

pub use algorithm::{Algorithm, ChecksumAlgorithm};
pub use checksum::Checksum;
pub use identifier::{IdGenerator, RandomIds, SequentialIds, FILE_ID_PREFIX, PACKAGE_ID_PREFIX};
pub use mets::{IdRemap, Manifest, RewriteReport, Rewriter, RootLayout, UnresolvedReference};
pub use package_name::PackageName;
pub use payload::Payload;
pub use sequence::{validate_sequence, RepresentationName};
pub use transform::{
    RepresentationReport, Stage, TransformOptions, TransformReport, Transformer, UpdateReport,
};
