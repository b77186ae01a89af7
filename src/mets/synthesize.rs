use super::{names::MetsNames, Context, RewriteError};
use crate::{layout::DATA_DIR, payload::Payload, xml::Element};

/// Manifest referenced from the root manifest, under `label`
pub(super) struct LinkedManifest {
    pub label: String,
    pub payload: Payload<'static>,
}

/// `file` element with its `FLocat`, returned with its new ID
fn file_entry(names: &MetsNames, context: &Context, payload: &Payload) -> (Element, String) {
    let id = context.ids.new_file_id();
    let file = Element::new(&names.file)
        .with_attribute("ID", id.as_str())
        .with_attribute("MIMETYPE", payload.mimetype())
        .with_attribute("SIZE", payload.size().to_string())
        .with_attribute("CREATED", context.timestamp)
        .with_attribute("CHECKSUM", payload.checksum().to_string())
        .with_attribute("CHECKSUMTYPE", payload.checksum_type())
        .with_child(
            Element::new(&names.flocat)
                .with_attribute("LOCTYPE", "URL")
                .with_attribute(&names.xlink_type, "simple")
                .with_attribute(&names.href, payload.href()),
        );
    (file, id)
}

pub(super) fn primary_division<'a>(
    root: &'a mut Element,
    names: &MetsNames,
) -> Result<&'a mut Element, RewriteError> {
    root.find_mut(&names.struct_map)
        .and_then(|map| map.find_mut(&names.div))
        .ok_or(RewriteError::MissingElement("structMap/div"))
}

/// Group and division pointing at a linked manifest
pub(super) struct Link {
    pub group: Element,
    pub group_id: String,
    pub file_id: String,
    pub division: Element,
}

pub(super) fn link(names: &MetsNames, context: &Context, manifest: &LinkedManifest) -> Link {
    let group_id = context.ids.new_package_id();
    let (file, file_id) = file_entry(names, context, &manifest.payload);
    let group = Element::new(&names.file_grp)
        .with_attribute("ID", group_id.as_str())
        .with_attribute("USE", manifest.label.as_str())
        .with_child(file);
    let division = Element::new(&names.div)
        .with_attribute("ID", context.ids.new_package_id())
        .with_attribute("LABEL", manifest.label.as_str())
        .with_child(
            Element::new(&names.mptr)
                .with_attribute("LOCTYPE", "URL")
                .with_attribute(&names.xlink_type, "simple")
                .with_attribute(&names.href, manifest.payload.href())
                .with_attribute(&names.title, group_id.as_str()),
        );

    Link {
        group,
        group_id,
        file_id,
        division,
    }
}

/// One group and one division with an `mptr` per linked manifest
pub(super) fn link_manifests(
    root: &mut Element,
    names: &MetsNames,
    context: &Context,
    linked: &[LinkedManifest],
) -> Result<(), RewriteError> {
    let mut groups = Vec::with_capacity(linked.len());
    let mut divisions = Vec::with_capacity(linked.len());

    for manifest in linked {
        let link = link(names, context, manifest);
        groups.push(link.group);
        divisions.push(link.division);
    }

    let file_sec = root
        .find_mut(&names.file_sec)
        .ok_or(RewriteError::MissingElement("fileSec"))?;
    for group in groups {
        file_sec.push(group);
    }

    let root_division = primary_division(root, names)?;
    for division in divisions {
        root_division.push(division);
    }

    Ok(())
}

/// A `data` group listing `payloads` and the matching `DATA` division
///
/// Returns the new group ID followed by the new file IDs.
pub(super) fn describe_data(
    root: &mut Element,
    names: &MetsNames,
    context: &Context,
    payloads: &[Payload],
) -> Result<Vec<String>, RewriteError> {
    let group_id = context.ids.new_package_id();
    let mut ids = vec![group_id.clone()];
    let mut group = Element::new(&names.file_grp)
        .with_attribute("ID", group_id)
        .with_attribute("USE", DATA_DIR);
    let mut data_division = Element::new(&names.div)
        .with_attribute("ID", context.ids.new_package_id())
        .with_attribute("LABEL", DATA_DIR)
        .with_attribute("TYPE", "DATA");

    for payload in payloads {
        let (file, id) = file_entry(names, context, payload);
        group.push(file);
        data_division.push(Element::new(&names.fptr).with_attribute("FILEID", id.as_str()));
        ids.push(id);
    }

    root.find_mut(&names.file_sec)
        .ok_or(RewriteError::MissingElement("fileSec"))?
        .push(group);

    let root_division = primary_division(root, names)?;
    root_division.set_attribute("TYPE", "ORIGINAL");
    root_division.push(data_division);

    Ok(ids)
}
