//! LOD material variants and final parenting of the generated sections.

use std::collections::{BTreeMap, BTreeSet};

use terrasect_mesh::MaterialId;
use terrasect_scene::{ObjectId, Scene};
use tracing::{debug, info};

use crate::error::SectionsError;
use crate::names::lod_material_name;
use crate::section::Section;

/// Creates the `<name>_LOD` variant of every collected material, reusing a
/// variant left by an earlier run.
///
/// Variants neither collide nor cast or receive shadows; the originals are
/// set to do all three. Returns the original -> variant map.
pub fn create_lod_materials(
    scene: &mut Scene,
    materials: &BTreeSet<MaterialId>,
) -> Result<BTreeMap<MaterialId, MaterialId>, SectionsError> {
    let mut variants = BTreeMap::new();
    for &id in materials {
        let original = scene.material_mut(id)?;
        original.physics = true;
        original.cast_shadows = true;
        original.receive_shadows = true;
        let name = lod_material_name(&original.name);

        let variant = match scene.find_material(&name) {
            Some(existing) => existing,
            None => scene.copy_material(id, &name)?,
        };
        let copy = scene.material_mut(variant)?;
        copy.physics = false;
        copy.cast_shadows = false;
        copy.receive_shadows = false;
        debug!("Created LOD material {}", copy.name);
        variants.insert(id, variant);
    }
    Ok(variants)
}

/// Points every material slot of `object` at its LOD variant.
///
/// Objects without slots, such as the shared terminal placeholder, are left
/// untouched so their mesh is never copied.
fn remap_slots(
    scene: &mut Scene,
    object: ObjectId,
    variants: &BTreeMap<MaterialId, MaterialId>,
) -> Result<(), SectionsError> {
    let slots = &scene.mesh(object)?.materials;
    if slots.is_empty() {
        return Ok(());
    }
    let remapped = slots
        .iter()
        .map(|slot| {
            variants.get(slot).copied().ok_or_else(|| {
                let name = scene
                    .material(*slot)
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|_| format!("{slot:?}"));
                SectionsError::UnknownMaterial(name)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    scene.mesh_mut(object)?.materials = remapped;
    Ok(())
}

/// Switches LOD children to the LOD material variants and parents every
/// section to `source`, keeping its world placement.
pub fn finalize(
    scene: &mut Scene,
    source: ObjectId,
    sections: &[Section],
    materials: &BTreeSet<MaterialId>,
) -> Result<(), SectionsError> {
    let variants = create_lod_materials(scene, materials)?;
    for section in sections {
        for object in section.lod_objects() {
            remap_slots(scene, object, &variants)?;
        }
        scene.set_parent(section.object, Some(source), true)?;
    }
    info!(
        "Finalized {} sections with {} LOD materials",
        sections.len(),
        variants.len()
    );
    Ok(())
}
