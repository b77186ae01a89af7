use super::{malformed, Element, XmlError};
use quick_xml::events::Event;
use quick_xml::Reader;

pub const METS_NS: &str = "http://www.loc.gov/METS/";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const CSIP_NS: &str = "https://DILCIS.eu/XML/METS/CSIPExtensionMETS";

const SIP_EXTENSION: &str = "SIPExtensionMETS";
const AIP_EXTENSION: &str = "AIPExtensionMETS";

#[derive(Debug, Default, Clone, PartialEq)]
/// Prefix to URI bindings declared in one manifest
///
/// The empty prefix stands for the default namespace. A registry belongs to a
/// single document: build a new one for every manifest that is parsed.
pub struct NamespaceRegistry {
    declarations: Vec<(String, String)>,
}

impl NamespaceRegistry {
    /// Stream the document and record every `xmlns` declaration, first one wins per prefix
    pub fn extract(input: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(input);
        let mut registry = Self::default();

        loop {
            match reader.read_event().map_err(malformed)? {
                Event::Start(start) | Event::Empty(start) => {
                    for attribute in start.attributes() {
                        let attribute = attribute.map_err(malformed)?;
                        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
                        let prefix = match key.strip_prefix("xmlns") {
                            Some("") => "",
                            Some(rest) => match rest.strip_prefix(':') {
                                Some(prefix) => prefix,
                                None => continue,
                            },
                            None => continue,
                        };
                        let uri = attribute.unescape_value().map_err(malformed)?;
                        registry.declare(prefix, &uri);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(registry)
    }

    fn declare(&mut self, prefix: &str, uri: &str) {
        if self.uri(prefix).is_none() {
            self.declarations.push((prefix.to_string(), uri.to_string()));
        }
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(declared, _)| declared == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Prefix bound to `uri`, compared ASCII case-insensitively
    pub fn prefix(&self, uri: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(_, declared)| declared.eq_ignore_ascii_case(uri))
            .map(|(prefix, _)| prefix.as_str())
    }

    /// Qualified name of `local` in namespace `uri`, e.g. `mets:fileSec`
    pub fn qualify(&self, uri: &str, local: &str) -> Option<String> {
        self.prefix(uri).map(|prefix| match prefix {
            "" => local.to_string(),
            prefix => format!("{prefix}:{local}"),
        })
    }

    /// Same as [`Self::qualify()`], declaring `uri` on `root` under `preferred_prefix` when missing
    pub fn qualify_or_declare(
        &mut self,
        root: &mut Element,
        uri: &str,
        preferred_prefix: &str,
        local: &str,
    ) -> String {
        if let Some(qualified) = self.qualify(uri, local) {
            return qualified;
        }

        root.set_attribute(format!("xmlns:{preferred_prefix}"), uri);
        self.declare(preferred_prefix, uri);
        format!("{preferred_prefix}:{local}")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.declarations
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    /// Turn the SIP extension namespace into the AIP one
    ///
    /// The URI is rewritten wherever it is declared in `root`, and the `sip`
    /// prefix becomes `aip` on every element and attribute using it. When the
    /// document already binds `aip`, the `sip` prefix is kept.
    pub fn promote_to_aip(&mut self, root: &mut Element) {
        let aip_declared = self.uri("aip").is_some();
        let mut renamed = Vec::new();
        for (prefix, uri) in self.declarations.iter_mut() {
            if !uri.contains(SIP_EXTENSION) {
                continue;
            }
            let aip_uri = uri.replace(SIP_EXTENSION, AIP_EXTENSION);
            replace_declaration(root, prefix, &aip_uri);
            *uri = aip_uri;

            if *prefix == "sip" && !aip_declared {
                renamed.push(prefix.clone());
                *prefix = "aip".to_string();
            }
        }

        for prefix in renamed {
            root.rename_prefix(&prefix, "aip");
        }
    }
}

fn replace_declaration(element: &mut Element, prefix: &str, uri: &str) {
    let key = match prefix {
        "" => "xmlns".to_string(),
        prefix => format!("xmlns:{prefix}"),
    };
    if element.attribute(&key).is_some() {
        element.set_attribute(key, uri);
    }
    for child in element.children_mut() {
        replace_declaration(child, prefix, uri);
    }
}
