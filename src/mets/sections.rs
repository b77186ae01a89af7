use super::{names::MetsNames, remap::IdRemap, Context, RewriteError, Role};
use crate::xml::Element;
use tracing::debug;

/// Fresh IDs for `dmdSec` and `amdSec`; their children keep theirs
pub(super) fn record_metadata_sections(
    root: &mut Element,
    names: &MetsNames,
    context: &Context,
    remap: &mut IdRemap,
) {
    for section in root.find_all_mut(&names.dmd_sec) {
        let fresh = context.ids.new_package_id();
        if let Some(old) = section.attribute("ID") {
            remap.record(old, &fresh);
        }
        section.set_attribute("ID", fresh);
        section.set_attribute("CREATED", context.timestamp);
    }

    for section in root.find_all_mut(&names.amd_sec) {
        let fresh = context.ids.new_package_id();
        if let Some(old) = section.attribute("ID") {
            remap.record(old, &fresh);
        }
        section.set_attribute("ID", fresh);
    }
}

/// Drop the groups `role` regenerates, give every remaining group and file a fresh ID
pub(super) fn record_file_section(
    root: &mut Element,
    names: &MetsNames,
    context: &Context,
    remap: &mut IdRemap,
    role: Role,
) -> Result<(), RewriteError> {
    let file_sec = root
        .find_mut(&names.file_sec)
        .ok_or(RewriteError::MissingElement("fileSec"))?;
    file_sec.set_attribute("ID", context.ids.new_package_id());

    if role == Role::Root {
        for group in file_sec.find_all(&names.file_grp) {
            if role.drops_group(group) {
                check_representation_group(group, names)?;
            }
        }
    }

    file_sec.retain_children(|group| {
        let dropped = group.name() == names.file_grp && role.drops_group(group);
        if dropped {
            debug!(group = group.attribute("USE"), "Dropping file group");
        }
        !dropped
    });

    for group in file_sec.find_all_mut(&names.file_grp) {
        record_group(group, names, context, remap);
    }

    Ok(())
}

/// `representations/<name>`, holding files or one level of groups holding files
fn check_representation_group(group: &Element, names: &MetsNames) -> Result<(), RewriteError> {
    let group_use = group.attribute("USE").unwrap_or_default();
    if group_use.split('/').filter(|segment| !segment.is_empty()).count() > 2 {
        return Err(RewriteError::UnsupportedStructure(format!(
            "file group `{group_use}` is nested deeper than representations/<name>"
        )));
    }

    for nested in group.find_all(&names.file_grp) {
        if nested.find(&names.file_grp).is_some() {
            return Err(RewriteError::UnsupportedStructure(format!(
                "file group `{group_use}` nests more than one level of groups"
            )));
        }
    }

    Ok(())
}

fn record_group(group: &mut Element, names: &MetsNames, context: &Context, remap: &mut IdRemap) {
    let fresh = context.ids.new_package_id();
    if let Some(old) = group.attribute("ID") {
        remap.record(old, &fresh);
    }
    group.set_attribute("ID", fresh);

    for child in group.children_mut() {
        if child.name() == names.file {
            let fresh = context.ids.new_file_id();
            if let Some(old) = child.attribute("ID") {
                remap.record(old, &fresh);
            }
            child.set_attribute("ID", fresh);
        } else if child.name() == names.file_grp {
            record_group(child, names, context, remap);
        }
    }
}
