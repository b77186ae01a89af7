use super::{names::MetsNames, RewriteError};
use crate::xml::Element;
use std::collections::HashSet;

/// Every `ID` attribute must appear once in the document
pub(super) fn check_unique_identifiers(root: &Element) -> Result<(), RewriteError> {
    let mut seen = HashSet::new();
    for element in root.descendants() {
        if let Some(id) = element.attribute("ID") {
            if !seen.insert(id) {
                return Err(RewriteError::DuplicateIdentifier(id.to_string()));
            }
        }
    }
    Ok(())
}

/// IDs a pointer may still target once sections and files are rewritten
///
/// Divisions are left out: their identifiers are regenerated after this is computed.
pub(super) fn referenceable_identifiers(root: &Element, names: &MetsNames) -> HashSet<String> {
    root.children()
        .filter(|child| child.name() != names.struct_map)
        .flat_map(Element::descendants)
        .filter_map(|element| element.attribute("ID"))
        .map(str::to_string)
        .collect()
}
