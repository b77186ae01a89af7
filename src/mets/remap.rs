use crate::identifier::IdGenerator;
use crate::xml::Element;
use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Default, Clone, PartialEq)]
/// Old identifier to new identifier, filled while sections, groups and files are rewritten
pub struct IdRemap(HashMap<String, String>);

impl IdRemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pair known before the rewrite starts, e.g. the SIP name and the AIP name
    pub fn seed(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.0.insert(old.into(), new.into());
    }

    pub(super) fn record(&mut self, old: &str, new: &str) {
        self.0.insert(old.to_string(), new.to_string());
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.0.get(old).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Pointer whose target could not be found; it now carries `substitute`
pub struct UnresolvedReference {
    /// Qualified name of the element holding the pointer
    pub element: String,
    pub attribute: String,
    pub target: String,
    pub substitute: String,
}

/// Second pass of a rewrite: maps pointer values through the finished [`IdRemap`]
pub(super) struct Resolver<'a> {
    remap: &'a IdRemap,
    /// IDs present in the document that were not regenerated, `None` to keep every unknown target
    surviving: Option<HashSet<String>>,
    ids: &'a dyn IdGenerator,
    unresolved: Vec<UnresolvedReference>,
}

impl<'a> Resolver<'a> {
    pub(super) fn new(remap: &'a IdRemap, surviving: HashSet<String>, ids: &'a dyn IdGenerator) -> Self {
        Self {
            remap,
            surviving: Some(surviving),
            ids,
            unresolved: Vec::new(),
        }
    }

    /// Only rewrite targets found in `remap`, for documents whose other identifiers did not change
    pub(super) fn remapping_only(remap: &'a IdRemap, ids: &'a dyn IdGenerator) -> Self {
        Self {
            remap,
            surviving: None,
            ids,
            unresolved: Vec::new(),
        }
    }

    /// Resolve every whitespace-separated identifier of `attribute`, if present
    pub(super) fn resolve_attribute(&mut self, element: &mut Element, attribute: &str) {
        let Some(value) = element.attribute(attribute) else {
            return;
        };

        let resolved = value
            .split_whitespace()
            .map(|target| self.resolve(element.name(), attribute, target))
            .collect::<Vec<_>>()
            .join(" ");
        element.set_attribute(attribute, resolved);
    }

    fn resolve(&mut self, element: &str, attribute: &str, target: &str) -> String {
        if let Some(new) = self.remap.get(target) {
            return new.to_string();
        }
        match &self.surviving {
            Some(surviving) if !surviving.contains(target) => {}
            _ => return target.to_string(),
        }

        let substitute = self.ids.new_package_id();
        warn!(
            element,
            attribute,
            target,
            substitute = substitute.as_str(),
            "Reference not found in identifier table, substituting a fresh identifier"
        );
        self.unresolved.push(UnresolvedReference {
            element: element.to_string(),
            attribute: attribute.to_string(),
            target: target.to_string(),
            substitute: substitute.clone(),
        });
        substitute
    }

    pub(super) fn into_unresolved(self) -> Vec<UnresolvedReference> {
        self.unresolved
    }
}
