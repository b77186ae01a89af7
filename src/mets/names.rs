use super::RewriteError;
use crate::xml::{Element, NamespaceRegistry, CSIP_NS, METS_NS, XLINK_NS, XSI_NS};

/// Qualified names of everything the rewrite touches, spelled with the document's own prefixes
pub(super) struct MetsNames {
    pub mets_hdr: String,
    pub agent: String,
    pub name: String,
    pub note: String,
    pub mets_document_id: String,
    pub dmd_sec: String,
    pub amd_sec: String,
    pub file_sec: String,
    pub file_grp: String,
    pub file: String,
    pub flocat: String,
    pub struct_map: String,
    pub div: String,
    pub fptr: String,
    pub mptr: String,
    pub href: String,
    pub title: String,
    pub xlink_type: String,
    pub package_type: String,
    pub note_type: String,
    pub schema_location: Option<String>,
}

impl MetsNames {
    /// Declares the xlink and CSIP namespaces on `root` when the document lacks them
    pub(super) fn resolve(
        namespaces: &mut NamespaceRegistry,
        root: &mut Element,
    ) -> Result<Self, RewriteError> {
        let prefix = namespaces
            .prefix(METS_NS)
            .ok_or(RewriteError::MissingMetsNamespace)?
            .to_string();
        let mets = |local: &str| match prefix.as_str() {
            "" => local.to_string(),
            prefix => format!("{prefix}:{local}"),
        };

        if root.name() != mets("mets") {
            return Err(RewriteError::MissingElement("mets"));
        }

        Ok(Self {
            mets_hdr: mets("metsHdr"),
            agent: mets("agent"),
            name: mets("name"),
            note: mets("note"),
            mets_document_id: mets("metsDocumentID"),
            dmd_sec: mets("dmdSec"),
            amd_sec: mets("amdSec"),
            file_sec: mets("fileSec"),
            file_grp: mets("fileGrp"),
            file: mets("file"),
            flocat: mets("FLocat"),
            struct_map: mets("structMap"),
            div: mets("div"),
            fptr: mets("fptr"),
            mptr: mets("mptr"),
            href: namespaces.qualify_or_declare(root, XLINK_NS, "xlink", "href"),
            title: namespaces.qualify_or_declare(root, XLINK_NS, "xlink", "title"),
            xlink_type: namespaces.qualify_or_declare(root, XLINK_NS, "xlink", "type"),
            package_type: namespaces.qualify_or_declare(root, CSIP_NS, "csip", "OAISPACKAGETYPE"),
            note_type: namespaces.qualify_or_declare(root, CSIP_NS, "csip", "NOTETYPE"),
            schema_location: namespaces.qualify(XSI_NS, "schemaLocation"),
        })
    }
}
