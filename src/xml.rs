//! Ordered XML tree with the exact qualified names of the source document.
//!
//! Names are kept as written (`mets:fileSec`), so prefixes survive a
//! parse/serialize cycle unchanged. Namespace resolution is the job of
//! [`NamespaceRegistry`].

mod namespace;

pub use namespace::{NamespaceRegistry, CSIP_NS, METS_NS, XLINK_NS, XSI_NS};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

#[derive(thiserror::Error, Debug, PartialEq)]
/// Manifest is not well-formed XML, or cannot be written back
pub enum XmlError {
    #[error("Malformed XML: {0}")]
    Malformed(String),
    #[error("Document has no root element")]
    NoRoot,
    #[error("Document has more than one root element")]
    MultipleRoots,
    #[error("Element `{0}` is never closed")]
    Unclosed(String),
    #[error("Failed to serialize document: {0}")]
    Serialize(String),
}

fn malformed(error: impl std::fmt::Display) -> XmlError {
    XmlError::Malformed(error.to_string())
}

fn serialize(error: impl std::fmt::Display) -> XmlError {
    XmlError::Serialize(error.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Qualified name, as written in the document
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Replace the value in place, or append the attribute
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(name, _)| *name == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let position = self.attributes.iter().position(|(name, _)| name == key)?;
        Some(self.attributes.remove(position).1)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Concatenated text content of direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Child elements, skipping text and comments
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First child element with this qualified name
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children().find(|child| child.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children_mut().find(|child| child.name == name)
    }

    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children().filter(move |child| child.name == name)
    }

    pub fn find_all_mut<'a>(&'a mut self, name: &'a str) -> impl Iterator<Item = &'a mut Element> {
        self.children_mut().filter(move |child| child.name == name)
    }

    /// This element and every element below it, depth-first
    pub fn descendants(&self) -> Vec<&Element> {
        let mut found = Vec::new();
        let mut stack = vec![self];
        while let Some(element) = stack.pop() {
            found.push(element);
            let mut children: Vec<&Element> = element.children().collect();
            children.reverse();
            stack.extend(children);
        }
        found
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Insert right after the last child element named `name`, or first if there is none
    pub fn insert_after_last(&mut self, name: &str, child: Element) {
        let position = self
            .children
            .iter()
            .rposition(|node| matches!(node, Node::Element(element) if element.name == name))
            .map_or(0, |last| last + 1);
        self.children.insert(position, Node::Element(child));
    }

    /// Keep child elements matching `keep`; text and comments are always kept
    pub fn retain_children(&mut self, mut keep: impl FnMut(&Element) -> bool) {
        self.children.retain(|node| match node {
            Node::Element(element) => keep(element),
            _ => true,
        });
    }

    /// Put `replacement` where the first child element matching `matches` is, removing every match
    ///
    /// `replacement` is appended when nothing matches. Removed elements are returned in order.
    pub fn replace_children(
        &mut self,
        mut matches: impl FnMut(&Element) -> bool,
        replacement: Element,
    ) -> Vec<Element> {
        let mut replacement = Some(replacement);
        let mut removed = Vec::new();
        let mut children = Vec::with_capacity(self.children.len());

        for node in std::mem::take(&mut self.children) {
            match node {
                Node::Element(element) if matches(&element) => {
                    if let Some(replacement) = replacement.take() {
                        children.push(Node::Element(replacement));
                    }
                    removed.push(element);
                }
                node => children.push(node),
            }
        }
        if let Some(replacement) = replacement {
            children.push(Node::Element(replacement));
        }

        self.children = children;
        removed
    }

    /// Rename prefix `from` to `to` on this element, its attributes and its descendants
    ///
    /// `xmlns:<from>` declarations are renamed as well.
    pub(crate) fn rename_prefix(&mut self, from: &str, to: &str) {
        let qualified = format!("{from}:");
        let declaration = format!("xmlns:{from}");

        if let Some(local) = self.name.strip_prefix(&qualified) {
            self.name = format!("{to}:{local}");
        }
        for (key, _) in self.attributes.iter_mut() {
            if let Some(local) = key.strip_prefix(&qualified) {
                *key = format!("{to}:{local}");
            } else if *key == declaration {
                *key = format!("xmlns:{to}");
            }
        }
        for child in self.children_mut() {
            child.rename_prefix(from, to);
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute.map_err(malformed)?;
            let value = attribute.unescape_value().map_err(malformed)?;
            element.attributes.push((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                value.into_owned(),
            ));
        }
        Ok(element)
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(serialize);
        }

        writer.write_event(Event::Start(start)).map_err(serialize)?;
        for child in &self.children {
            match child {
                Node::Element(element) => element.write(writer)?,
                Node::Text(text) => writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(serialize)?,
                Node::Comment(comment) => writer
                    .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                    .map_err(serialize)?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(serialize)
    }
}

/// Hand a completed element to its parent, or make it the root
fn attach(
    element: Element,
    open: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), XmlError> {
    match open.last_mut() {
        Some(parent) => parent.push(element),
        None if root.is_some() => return Err(XmlError::MultipleRoots),
        None => *root = Some(element),
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
/// Parsed XML document with a single root element
pub struct Document {
    root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn parse(input: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut open: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().map_err(malformed)? {
                Event::Start(start) => open.push(Element::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Element::from_start(&start)?;
                    attach(element, &mut open, &mut root)?;
                }
                Event::End(_) => {
                    // quick-xml already rejects mismatched end tags
                    let element = open
                        .pop()
                        .ok_or_else(|| XmlError::Malformed("unexpected closing tag".into()))?;
                    attach(element, &mut open, &mut root)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = open.last_mut() {
                        let text = text.unescape().map_err(malformed)?;
                        if !text.is_empty() {
                            parent.children.push(Node::Text(text.into_owned()));
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = open.last_mut() {
                        parent
                            .children
                            .push(Node::Text(String::from_utf8_lossy(&data).into_owned()));
                    }
                }
                Event::Comment(comment) => {
                    if let Some(parent) = open.last_mut() {
                        parent
                            .children
                            .push(Node::Comment(String::from_utf8_lossy(&comment).into_owned()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.pop() {
            return Err(XmlError::Unclosed(unclosed.name));
        }

        root.map(Self::new).ok_or(XmlError::NoRoot)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Serialize with an XML declaration and 4-space indentation
    pub fn to_xml(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(serialize)?;
        self.root.write(&mut writer)?;

        let mut xml = String::from_utf8(writer.into_inner()).map_err(serialize)?;
        xml.push('\n');
        Ok(xml)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mets:mets xmlns:mets="http://www.loc.gov/METS/" xmlns:xlink="http://www.w3.org/1999/xlink" OBJID="a &amp; b">
    <!-- generated by hand -->
    <mets:metsHdr CREATEDATE="2023-05-01T10:00:00">
        <mets:agent ROLE="CREATOR"><mets:name>Jane &lt;Archivist&gt;</mets:name></mets:agent>
    </mets:metsHdr>
    <mets:fileSec ID="fs"><mets:fileGrp ID="g1"/><mets:fileGrp ID="g2"/></mets:fileSec>
</mets:mets>"#;

    #[test]
    fn parse_keeps_prefixes_and_order() {
        let document = Document::parse(SAMPLE).unwrap();
        let root = document.root();

        assert_eq!(root.name(), "mets:mets");
        assert_eq!(root.attribute("OBJID"), Some("a & b"));
        assert_eq!(root.attribute("xmlns:xlink"), Some(XLINK_NS));

        let agent_name = root
            .find("mets:metsHdr")
            .and_then(|header| header.find("mets:agent"))
            .and_then(|agent| agent.find("mets:name"))
            .unwrap();
        assert_eq!(agent_name.text(), "Jane <Archivist>");

        let groups: Vec<_> = root
            .find("mets:fileSec")
            .unwrap()
            .find_all("mets:fileGrp")
            .filter_map(|group| group.attribute("ID"))
            .collect();
        assert_eq!(groups, ["g1", "g2"]);
    }

    #[test]
    fn serialize_then_parse_again() {
        let document = Document::parse(SAMPLE).unwrap();
        let xml = document.to_xml().unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("<mets:mets "));
        assert!(xml.contains("OBJID=\"a &amp; b\""));
        assert!(xml.contains("<!-- generated by hand -->"));
        assert!(xml.contains("\n    <mets:metsHdr"));
        assert_eq!(Document::parse(&xml).unwrap(), document);
    }

    #[test]
    fn edit_tree() {
        let mut header = Element::new("mets:metsHdr")
            .with_child(Element::new("mets:agent").with_attribute("ROLE", "ARCHIVIST"))
            .with_child(Element::new("mets:altRecordID"));

        header.insert_after_last(
            "mets:agent",
            Element::new("mets:agent").with_attribute("ROLE", "CREATOR"),
        );
        let names: Vec<_> = header
            .children()
            .map(|child| (child.name(), child.attribute("ROLE")))
            .collect();
        assert_eq!(
            names,
            [
                ("mets:agent", Some("ARCHIVIST")),
                ("mets:agent", Some("CREATOR")),
                ("mets:altRecordID", None)
            ]
        );

        header.retain_children(|child| child.attribute("ROLE") != Some("ARCHIVIST"));
        header.insert_after_last("mets:nothing", Element::new("mets:first"));
        assert_eq!(
            header.children().map(Element::name).collect::<Vec<_>>(),
            ["mets:first", "mets:agent", "mets:altRecordID"]
        );

        let mut agent = Element::new("mets:agent").with_attribute("ROLE", "CREATOR");
        agent.set_attribute("ROLE", "EDITOR");
        agent.set_attribute("TYPE", "OTHER");
        assert_eq!(
            agent.attributes().collect::<Vec<_>>(),
            [("ROLE", "EDITOR"), ("TYPE", "OTHER")]
        );
        assert_eq!(agent.remove_attribute("ROLE"), Some("EDITOR".into()));
        assert_eq!(agent.attribute("ROLE"), None);
    }

    #[test]
    fn replace_in_place() {
        let mut file_sec = Element::new("mets:fileSec")
            .with_child(Element::new("mets:fileGrp").with_attribute("USE", "Documentation"))
            .with_child(Element::new("mets:fileGrp").with_attribute("USE", "rep1").with_attribute("ID", "a"))
            .with_child(Element::new("mets:fileGrp").with_attribute("USE", "Schemas"))
            .with_child(Element::new("mets:fileGrp").with_attribute("USE", "rep1").with_attribute("ID", "b"));

        let removed = file_sec.replace_children(
            |group| group.attribute("USE") == Some("rep1"),
            Element::new("mets:fileGrp").with_attribute("USE", "rep1").with_attribute("ID", "c"),
        );
        assert_eq!(
            removed.iter().map(|group| group.attribute("ID")).collect::<Vec<_>>(),
            [Some("a"), Some("b")]
        );
        assert_eq!(
            file_sec
                .children()
                .map(|group| group.attribute("ID").unwrap_or_default())
                .collect::<Vec<_>>(),
            ["", "c", ""]
        );

        let removed = file_sec.replace_children(
            |group| group.attribute("USE") == Some("rep2"),
            Element::new("mets:fileGrp").with_attribute("ID", "d"),
        );
        assert!(removed.is_empty());
        assert_eq!(
            file_sec.children().last().and_then(|group| group.attribute("ID")),
            Some("d")
        );
    }

    #[test]
    fn descendants_depth_first() {
        let document = Document::parse(SAMPLE).unwrap();
        let names: Vec<_> = document
            .root()
            .descendants()
            .into_iter()
            .map(Element::name)
            .collect();
        assert_eq!(
            names,
            [
                "mets:mets",
                "mets:metsHdr",
                "mets:agent",
                "mets:name",
                "mets:fileSec",
                "mets:fileGrp",
                "mets:fileGrp"
            ]
        );
    }

    #[test]
    fn rename_prefix() {
        let mut root = Element::new("sip:thing")
            .with_attribute("xmlns:sip", "urn:sip")
            .with_attribute("sip:TYPE", "x")
            .with_child(Element::new("mets:div").with_attribute("sip:LABEL", "y"));
        root.rename_prefix("sip", "aip");

        assert_eq!(root.name(), "aip:thing");
        assert_eq!(root.attribute("xmlns:aip"), Some("urn:sip"));
        assert_eq!(root.attribute("aip:TYPE"), Some("x"));
        assert_eq!(
            root.find("mets:div").and_then(|div| div.attribute("aip:LABEL")),
            Some("y")
        );
    }

    #[test]
    fn malformed_documents() {
        assert!(matches!(
            Document::parse("<a><b></a>"),
            Err(XmlError::Malformed(_))
        ));
        assert!(matches!(
            Document::parse("<a><b/>"),
            Err(XmlError::Unclosed(_) | XmlError::Malformed(_))
        ));
        assert_eq!(Document::parse(""), Err(XmlError::NoRoot));
        assert_eq!(Document::parse("<a/><b/>"), Err(XmlError::MultipleRoots));
    }
}
