use super::{
    names::MetsNames,
    remap::IdRemap,
    synthesize::{self, LinkedManifest},
    Context, RewriteError, Role,
};
use crate::{payload::Payload, xml::Element};
use tracing::debug;

pub(super) fn touch_header(
    root: &mut Element,
    names: &MetsNames,
    context: &Context,
) -> Result<(), RewriteError> {
    root.find_mut(&names.mets_hdr)
        .ok_or(RewriteError::MissingElement("metsHdr"))?
        .set_attribute("LASTMODDATE", context.timestamp);
    Ok(())
}

/// Rebuild the `data` group and `DATA` division of a representation around `payload`
pub(super) fn replace_data(
    root: &mut Element,
    names: &MetsNames,
    context: &Context,
    payload: &Payload,
    remap: &mut IdRemap,
) -> Result<(), RewriteError> {
    let file_sec = root
        .find_mut(&names.file_sec)
        .ok_or(RewriteError::MissingElement("fileSec"))?;
    let mut replaced = Vec::new();
    file_sec.retain_children(|group| {
        let dropped = group.name() == names.file_grp && Role::Representation.drops_group(group);
        if dropped {
            replaced.extend(identifiers(group));
        }
        !dropped
    });
    if replaced.is_empty() {
        return Err(RewriteError::UnsupportedStructure(
            "no `data` file group to replace".to_string(),
        ));
    }

    synthesize::primary_division(root, names)?.retain_children(|division| {
        !(division.name() == names.div && Role::Representation.drops_division(division))
    });

    let ids = synthesize::describe_data(root, names, context, std::slice::from_ref(payload))?;
    let [group_id, file_id] = ids.as_slice() else {
        return Err(RewriteError::UnsupportedStructure(
            "archived payload was not described".to_string(),
        ));
    };
    for (old, is_group) in replaced {
        remap.record(&old, if is_group { group_id } else { file_id });
    }
    debug!(payload = %payload, "Replaced data file group");

    Ok(())
}

/// Replace the group and division linking `linked.label`, in place, appending them when missing
pub(super) fn relink_manifest(
    root: &mut Element,
    names: &MetsNames,
    context: &Context,
    linked: &LinkedManifest,
    remap: &mut IdRemap,
) -> Result<(), RewriteError> {
    let link = synthesize::link(names, context, linked);
    let labelled = |element: &Element, name: &str, attribute: &str| {
        element.name() == name
            && element
                .attribute(attribute)
                .is_some_and(|value| value.eq_ignore_ascii_case(&linked.label))
    };

    let removed = root
        .find_mut(&names.file_sec)
        .ok_or(RewriteError::MissingElement("fileSec"))?
        .replace_children(|group| labelled(group, &names.file_grp, "USE"), link.group);
    for group in &removed {
        for (old, is_group) in identifiers(group) {
            remap.record(&old, if is_group { &link.group_id } else { &link.file_id });
        }
    }

    synthesize::primary_division(root, names)?
        .replace_children(|division| labelled(division, &names.div, "LABEL"), link.division);
    debug!(
        label = linked.label.as_str(),
        replaced = removed.len(),
        "Relinked manifest"
    );

    Ok(())
}

/// IDs of `group` and everything below it, flagged `true` for groups
fn identifiers(group: &Element) -> Vec<(String, bool)> {
    group
        .descendants()
        .into_iter()
        .filter_map(|element| {
            let id = element.attribute("ID")?;
            let is_group = element.name() == group.name();
            Some((id.to_string(), is_group))
        })
        .collect()
}
