use super::{names::MetsNames, remap::Resolver, Context, RewriteError, Role};
use crate::xml::Element;
use tracing::debug;

/// Regenerate map and division IDs and resolve the pointers they carry
pub(super) fn rewrite_struct_maps(
    root: &mut Element,
    names: &MetsNames,
    context: &Context,
    role: Role,
    object_id: &str,
    resolver: &mut Resolver,
) -> Result<(), RewriteError> {
    let mut maps = root.find_all_mut(&names.struct_map);

    let primary = maps
        .next()
        .ok_or(RewriteError::MissingElement("structMap"))?;
    primary.set_attribute("ID", context.ids.new_package_id());
    let root_division = primary
        .find_mut(&names.div)
        .ok_or(RewriteError::MissingElement("structMap/div"))?;
    root_division.set_attribute("LABEL", object_id);
    root_division.retain_children(|division| {
        let dropped = division.name() == names.div && role.drops_division(division);
        if dropped {
            debug!(label = division.attribute("LABEL"), "Dropping division");
        }
        !dropped
    });
    rewrite_division(root_division, names, context, resolver);

    for map in maps {
        map.set_attribute("ID", context.ids.new_package_id());
        for division in map.children_mut() {
            if division.name() == names.div {
                rewrite_division(division, names, context, resolver);
            }
        }
    }

    Ok(())
}

/// Resolve the pointers of every structural map, keeping division IDs
pub(super) fn resolve_struct_maps(root: &mut Element, names: &MetsNames, resolver: &mut Resolver) {
    for map in root.find_all_mut(&names.struct_map) {
        for division in map.find_all_mut(&names.div) {
            visit_division(division, names, resolver, &mut |_| {});
        }
    }
}

fn rewrite_division(
    division: &mut Element,
    names: &MetsNames,
    context: &Context,
    resolver: &mut Resolver,
) {
    visit_division(division, names, resolver, &mut |division| {
        division.set_attribute("ID", context.ids.new_package_id())
    });
}

/// Apply `on_division` to `division` and the divisions below it, resolving their pointers
fn visit_division(
    division: &mut Element,
    names: &MetsNames,
    resolver: &mut Resolver,
    on_division: &mut dyn FnMut(&mut Element),
) {
    on_division(division);
    resolver.resolve_attribute(division, "DMDID");
    resolver.resolve_attribute(division, "ADMID");

    for child in division.children_mut() {
        if child.name() == names.div {
            visit_division(child, names, resolver, on_division);
        } else if child.name() == names.fptr {
            resolver.resolve_attribute(child, "FILEID");
        } else if child.name() == names.mptr {
            resolver.resolve_attribute(child, &names.title);
        }
    }
}
