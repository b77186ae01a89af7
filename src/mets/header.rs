use super::{names::MetsNames, Context, RewriteError, SOFTWARE_NAME, SOFTWARE_VERSION};
use crate::xml::Element;

const RECORD_STATUS: &str = "Revised";
const PACKAGE_TYPE: &str = "AIP";

pub(super) fn rewrite_header(
    root: &mut Element,
    names: &MetsNames,
    context: &Context,
) -> Result<(), RewriteError> {
    let header = root
        .find_mut(&names.mets_hdr)
        .ok_or(RewriteError::MissingElement("metsHdr"))?;

    if header.attribute("CREATEDATE").is_none() {
        header.set_attribute("CREATEDATE", context.timestamp);
    }
    header.set_attribute("LASTMODDATE", context.timestamp);
    header.set_attribute("RECORDSTATUS", RECORD_STATUS);
    header.set_attribute(&names.package_type, PACKAGE_TYPE);

    header.retain_children(|child| {
        child.name() != names.mets_document_id
            && !(child.name() == names.agent && is_replaced_creator(child))
    });
    header.insert_after_last(&names.agent, software_agent(names));

    Ok(())
}

/// Creator agents describing the tooling or person behind the SIP
fn is_replaced_creator(agent: &Element) -> bool {
    if agent.attribute("ROLE") != Some("CREATOR") {
        return false;
    }
    match agent.attribute("TYPE") {
        Some("INDIVIDUAL") => true,
        Some("OTHER") => agent.attribute("OTHERTYPE") == Some("SOFTWARE"),
        _ => false,
    }
}

fn software_agent(names: &MetsNames) -> Element {
    Element::new(&names.agent)
        .with_attribute("ROLE", "CREATOR")
        .with_attribute("TYPE", "OTHER")
        .with_attribute("OTHERTYPE", "SOFTWARE")
        .with_child(Element::new(&names.name).with_text(SOFTWARE_NAME))
        .with_child(
            Element::new(&names.note)
                .with_attribute(&names.note_type, "SOFTWARE VERSION")
                .with_text(SOFTWARE_VERSION),
        )
}
