//! The object arena: naming, hierarchy, transforms, mesh access and LOD
//! selection.

use std::sync::Arc;

use glam::{Affine3A, Vec3};
use rustc_hash::FxHashMap;
use terrasect_mesh::{MaterialId, Mesh};

use crate::material::Material;
use crate::modifier::Modifier;
use crate::object::{LodLevel, ObjectId, SceneObject};

/// Errors returned by scene operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The id does not name a live object.
    #[error("unknown object {0:?}")]
    UnknownObject(ObjectId),
    /// The object has no mesh.
    #[error("object '{0}' has no mesh")]
    MissingMesh(String),
    /// The id does not name a material of this scene.
    #[error("unknown material {0:?}")]
    UnknownMaterial(MaterialId),
    /// The modifier index is out of range.
    #[error("object '{object}' has no modifier at index {index}")]
    MissingModifier {
        /// Object name.
        object: String,
        /// Requested stack index.
        index: usize,
    },
    /// The modifier cannot be baked into the mesh.
    #[error("modifier '{modifier}' on '{object}' cannot be applied")]
    NotApplicable {
        /// Object name.
        object: String,
        /// Modifier name.
        modifier: String,
    },
    /// Parenting would make an object its own ancestor.
    #[error("parenting '{child}' to '{parent}' would create a cycle")]
    ParentCycle {
        /// Child object name.
        child: String,
        /// Requested parent name.
        parent: String,
    },
}

/// Picks the LOD level for an object at `distance` from the camera.
///
/// Returns 0 (the object's own mesh) closer than the first level's distance
/// and `k + 1` once `distance` reaches `levels[k].distance`. Levels are
/// expected in increasing distance order.
pub fn select_lod(levels: &[LodLevel], distance: f32) -> usize {
    debug_assert!(distance >= 0.0, "distance must be non-negative");
    for (i, level) in levels.iter().enumerate() {
        if distance < level.distance {
            return i;
        }
    }
    levels.len()
}

/// An in-memory scene graph.
///
/// Objects live in an arena addressed by [`ObjectId`]; names are unique and
/// clash resolution appends `.001`, `.002`, ... like the host does. Meshes are
/// held behind [`Arc`] so several objects can share one; the only mutable
/// access is [`Scene::mesh_mut`], which copies a shared mesh before writing.
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<Option<SceneObject>>,
    names: FxHashMap<String, ObjectId>,
    materials: Vec<Material>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object owning `mesh` (or an empty when `None`).
    ///
    /// The requested name is made unique; read it back from the object.
    pub fn add_object(&mut self, name: &str, mesh: Option<Mesh>) -> ObjectId {
        self.insert(name, mesh.map(Arc::new))
    }

    /// Adds an object referencing an existing shared mesh.
    pub fn add_object_with_shared_mesh(&mut self, name: &str, mesh: Arc<Mesh>) -> ObjectId {
        self.insert(name, Some(mesh))
    }

    fn insert(&mut self, name: &str, mesh: Option<Arc<Mesh>>) -> ObjectId {
        let name = self.unique_name(name);
        let id = ObjectId(self.objects.len() as u32);
        self.names.insert(name.clone(), id);
        self.objects.push(Some(SceneObject::new(name, mesh)));
        id
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.names.contains_key(base) {
            return base.to_string();
        }
        let stem = match base.rsplit_once('.') {
            Some((stem, suffix))
                if suffix.len() == 3 && suffix.bytes().all(|b| b.is_ascii_digit()) =>
            {
                stem
            }
            _ => base,
        };
        (1u32..)
            .map(|n| format!("{stem}.{n:03}"))
            .find(|candidate| !self.names.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Returns `true` while `id` names a live object.
    pub fn contains(&self, id: ObjectId) -> bool {
        matches!(self.objects.get(id.0 as usize), Some(Some(_)))
    }

    /// Borrows an object.
    pub fn object(&self, id: ObjectId) -> Result<&SceneObject, SceneError> {
        self.objects
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(SceneError::UnknownObject(id))
    }

    /// Mutably borrows an object.
    ///
    /// Renaming must go through [`Scene::rename`] to keep the name index valid.
    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut SceneObject, SceneError> {
        self.objects
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(SceneError::UnknownObject(id))
    }

    /// Looks an object up by name.
    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.names.get(name).copied()
    }

    /// Iterates live objects in creation order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|o| (ObjectId(i as u32), o)))
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.iter().flatten().count()
    }

    /// Renames an object; returns the (possibly suffixed) name it received.
    pub fn rename(&mut self, id: ObjectId, name: &str) -> Result<String, SceneError> {
        let old = self.object(id)?.name.clone();
        if old == name {
            return Ok(old);
        }
        self.names.remove(&old);
        let name = self.unique_name(name);
        self.names.insert(name.clone(), id);
        self.object_mut(id)?.name = name.clone();
        Ok(name)
    }

    /// Copies an object under a new name.
    ///
    /// The mesh is deep-copied, the copy is unparented at the original's world
    /// transform, and it has no children or LOD levels.
    pub fn duplicate(&mut self, id: ObjectId, name: &str) -> Result<ObjectId, SceneError> {
        let world = self.world_transform(id)?;
        let source = self.object(id)?;
        let mut copy = source.clone();
        copy.mesh = source.mesh.as_ref().map(|m| Arc::new(Mesh::clone(m)));
        copy.transform = world;
        copy.parent = None;
        copy.children.clear();
        copy.lod_levels.clear();
        copy.current_lod = 0;

        let new_id = ObjectId(self.objects.len() as u32);
        copy.name = self.unique_name(name);
        self.names.insert(copy.name.clone(), new_id);
        self.objects.push(Some(copy));
        Ok(new_id)
    }

    /// World transform of an object (parent chain applied).
    pub fn world_transform(&self, id: ObjectId) -> Result<Affine3A, SceneError> {
        let object = self.object(id)?;
        match object.parent {
            Some(parent) => Ok(self.world_transform(parent)? * object.transform),
            None => Ok(object.transform),
        }
    }

    /// Sets or clears an object's parent.
    ///
    /// With `keep_transform` the local transform is rewritten so the world
    /// transform is unchanged; otherwise the local transform is kept as is.
    pub fn set_parent(
        &mut self,
        child: ObjectId,
        parent: Option<ObjectId>,
        keep_transform: bool,
    ) -> Result<(), SceneError> {
        let world = self.world_transform(child)?;
        if let Some(parent) = parent {
            let mut cursor = Some(parent);
            while let Some(id) = cursor {
                if id == child {
                    return Err(SceneError::ParentCycle {
                        child: self.object(child)?.name.clone(),
                        parent: self.object(parent)?.name.clone(),
                    });
                }
                cursor = self.object(id)?.parent;
            }
        }

        if let Some(old) = self.object(child)?.parent {
            self.object_mut(old)?.children.retain(|&c| c != child);
        }
        let local = match parent {
            Some(parent) if keep_transform => self.world_transform(parent)?.inverse() * world,
            None if keep_transform => world,
            _ => self.object(child)?.transform,
        };
        if let Some(parent) = parent {
            self.object_mut(parent)?.children.push(child);
        }
        let object = self.object_mut(child)?;
        object.parent = parent;
        object.transform = local;
        Ok(())
    }

    /// Direct children of an object.
    pub fn children(&self, id: ObjectId) -> Result<&[ObjectId], SceneError> {
        Ok(&self.object(id)?.children)
    }

    /// Removes a single object.
    ///
    /// Its children are unparented at their current world transform.
    pub fn remove(&mut self, id: ObjectId) -> Result<SceneObject, SceneError> {
        let children = self.object(id)?.children.clone();
        for child in children {
            self.set_parent(child, None, true)?;
        }
        if let Some(parent) = self.object(id)?.parent {
            self.object_mut(parent)?.children.retain(|&c| c != id);
        }
        let object = self.objects[id.0 as usize]
            .take()
            .ok_or(SceneError::UnknownObject(id))?;
        self.names.remove(&object.name);
        Ok(object)
    }

    /// Removes an object and all of its descendants; returns how many were removed.
    pub fn remove_recursive(&mut self, id: ObjectId) -> Result<usize, SceneError> {
        let children = self.object(id)?.children.clone();
        let mut removed = 0;
        for child in children {
            removed += self.remove_recursive(child)?;
        }
        self.remove(id)?;
        Ok(removed + 1)
    }

    /// Borrows an object's mesh.
    pub fn mesh(&self, id: ObjectId) -> Result<&Mesh, SceneError> {
        let object = self.object(id)?;
        object
            .mesh
            .as_deref()
            .ok_or_else(|| SceneError::MissingMesh(object.name.clone()))
    }

    /// Mutably borrows an object's mesh, copying it first if it is shared.
    pub fn mesh_mut(&mut self, id: ObjectId) -> Result<&mut Mesh, SceneError> {
        let object = self.object_mut(id)?;
        match object.mesh.as_mut() {
            Some(mesh) => Ok(Arc::make_mut(mesh)),
            None => Err(SceneError::MissingMesh(object.name.clone())),
        }
    }

    /// Replaces an object's mesh.
    pub fn set_mesh(&mut self, id: ObjectId, mesh: Mesh) -> Result<(), SceneError> {
        self.object_mut(id)?.mesh = Some(Arc::new(mesh));
        Ok(())
    }

    /// Bakes the modifier at `index` into the mesh and removes it from the stack.
    pub fn apply_modifier(&mut self, id: ObjectId, index: usize) -> Result<Modifier, SceneError> {
        let object = self.object(id)?;
        let modifier = object
            .modifiers
            .get(index)
            .ok_or_else(|| SceneError::MissingModifier {
                object: object.name.clone(),
                index,
            })?;
        let Modifier::Deform(deform) = modifier else {
            return Err(SceneError::NotApplicable {
                object: object.name.clone(),
                modifier: modifier.name().to_string(),
            });
        };
        let transform = deform.transform;
        self.mesh_mut(id)?.transform(&transform);
        Ok(self.object_mut(id)?.modifiers.remove(index))
    }

    /// Removes the modifier at `index` without applying it.
    pub fn remove_modifier(&mut self, id: ObjectId, index: usize) -> Result<Modifier, SceneError> {
        let object = self.object_mut(id)?;
        if index >= object.modifiers.len() {
            return Err(SceneError::MissingModifier {
                object: object.name.clone(),
                index,
            });
        }
        Ok(object.modifiers.remove(index))
    }

    /// Moves the object's origin to `world_point` without moving its geometry.
    pub fn set_origin(&mut self, id: ObjectId, world_point: Vec3) -> Result<(), SceneError> {
        let local = self
            .world_transform(id)?
            .inverse()
            .transform_point3(world_point);
        self.mesh_mut(id)?.translate(-local);
        let object = self.object_mut(id)?;
        object.transform = object.transform * Affine3A::from_translation(local);
        Ok(())
    }

    /// Adds a material; its name is made unique.
    pub fn add_material(&mut self, mut material: Material) -> MaterialId {
        if self.find_material(&material.name).is_some() {
            let stem = material.name.clone();
            material.name = (1u32..)
                .map(|n| format!("{stem}.{n:03}"))
                .find(|candidate| self.find_material(candidate).is_none())
                .unwrap_or(stem);
        }
        self.materials.push(material);
        MaterialId((self.materials.len() - 1) as u32)
    }

    /// Borrows a material.
    pub fn material(&self, id: MaterialId) -> Result<&Material, SceneError> {
        self.materials
            .get(id.0 as usize)
            .ok_or(SceneError::UnknownMaterial(id))
    }

    /// Mutably borrows a material.
    pub fn material_mut(&mut self, id: MaterialId) -> Result<&mut Material, SceneError> {
        self.materials
            .get_mut(id.0 as usize)
            .ok_or(SceneError::UnknownMaterial(id))
    }

    /// Looks a material up by name.
    pub fn find_material(&self, name: &str) -> Option<MaterialId> {
        self.materials
            .iter()
            .position(|m| m.name == name)
            .map(|i| MaterialId(i as u32))
    }

    /// Copies a material under a new name.
    pub fn copy_material(&mut self, id: MaterialId, name: &str) -> Result<MaterialId, SceneError> {
        let mut copy = self.material(id)?.clone();
        copy.name = name.to_string();
        Ok(self.add_material(copy))
    }

    /// Re-selects the current LOD of every object with LOD levels from the
    /// camera's distance to the object's world origin.
    pub fn update_lod_levels(&mut self, camera: Vec3) {
        let distances: Vec<(usize, f32)> = self
            .objects()
            .filter(|(_, o)| !o.lod_levels.is_empty())
            .filter_map(|(id, _)| {
                let origin = Vec3::from(self.world_transform(id).ok()?.translation);
                Some((id.0 as usize, origin.distance(camera)))
            })
            .collect();
        for (index, distance) in distances {
            if let Some(Some(object)) = self.objects.get_mut(index) {
                object.current_lod = select_lod(&object.lod_levels, distance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::{DeformModifier, ParticleSystem};
    use terrasect_mesh::cuboid;

    fn lod(distance: f32) -> LodLevel {
        LodLevel {
            object: ObjectId(0),
            distance,
            ratio: 1.0 / distance,
            use_material: true,
        }
    }

    #[test]
    fn test_names_are_made_unique() {
        let mut scene = Scene::new();
        let a = scene.add_object("Cube", None);
        let b = scene.add_object("Cube", None);
        let c = scene.add_object("Cube.001", None);
        assert_eq!(scene.object(a).unwrap().name, "Cube");
        assert_eq!(scene.object(b).unwrap().name, "Cube.001");
        assert_eq!(scene.object(c).unwrap().name, "Cube.002");
        assert_eq!(scene.find("Cube.001"), Some(b));
    }

    #[test]
    fn test_rename_updates_lookup() {
        let mut scene = Scene::new();
        let a = scene.add_object("A", None);
        assert_eq!(scene.rename(a, "B").unwrap(), "B");
        assert_eq!(scene.find("A"), None);
        assert_eq!(scene.find("B"), Some(a));
    }

    #[test]
    fn test_parent_keep_transform_preserves_world() {
        let mut scene = Scene::new();
        let parent = scene.add_object("P", None);
        let child = scene.add_object("C", None);
        scene.object_mut(parent).unwrap().transform =
            Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0));
        scene.object_mut(child).unwrap().transform =
            Affine3A::from_translation(Vec3::new(3.0, 4.0, 0.0));

        scene.set_parent(child, Some(parent), true).unwrap();
        let world = scene.world_transform(child).unwrap();
        assert!(Vec3::from(world.translation).abs_diff_eq(Vec3::new(3.0, 4.0, 0.0), 1e-6));
        assert_eq!(scene.children(parent).unwrap(), &[child]);

        scene.set_parent(child, None, false).unwrap();
        assert!(scene.children(parent).unwrap().is_empty());
        let local = Vec3::from(scene.object(child).unwrap().transform.translation);
        assert!(local.abs_diff_eq(Vec3::new(-7.0, 4.0, 0.0), 1e-6));
    }

    #[test]
    fn test_parent_cycle_rejected() {
        let mut scene = Scene::new();
        let a = scene.add_object("A", None);
        let b = scene.add_object("B", None);
        scene.set_parent(b, Some(a), false).unwrap();
        assert!(matches!(
            scene.set_parent(a, Some(b), false),
            Err(SceneError::ParentCycle { .. })
        ));
    }

    #[test]
    fn test_remove_recursive_removes_descendants() {
        let mut scene = Scene::new();
        let root = scene.add_object("Root", None);
        let mid = scene.add_object("Mid", None);
        let leaf = scene.add_object("Leaf", None);
        let other = scene.add_object("Other", None);
        scene.set_parent(mid, Some(root), false).unwrap();
        scene.set_parent(leaf, Some(mid), false).unwrap();

        assert_eq!(scene.remove_recursive(mid).unwrap(), 2);
        assert!(!scene.contains(mid));
        assert!(!scene.contains(leaf));
        assert!(scene.contains(root));
        assert!(scene.contains(other));
        assert!(scene.children(root).unwrap().is_empty());
        assert!(matches!(scene.object(leaf), Err(SceneError::UnknownObject(_))));
    }

    #[test]
    fn test_shared_mesh_is_copied_on_write() {
        let mut scene = Scene::new();
        let shared = Arc::new(Mesh::new("placeholder"));
        let a = scene.add_object_with_shared_mesh("A", shared.clone());
        let b = scene.add_object_with_shared_mesh("B", shared.clone());

        scene.mesh_mut(a).unwrap().add_vertex(Vec3::ONE);
        assert!(shared.is_empty());
        assert!(scene.mesh(b).unwrap().is_empty());
        assert_eq!(scene.mesh(a).unwrap().vertex_count(), 1);
    }

    #[test]
    fn test_duplicate_deep_copies_and_detaches() {
        let mut scene = Scene::new();
        let parent = scene.add_object("P", None);
        let src = scene.add_object("Src", Some(cuboid("box", Vec3::ONE)));
        scene.object_mut(parent).unwrap().transform =
            Affine3A::from_translation(Vec3::new(0.0, 5.0, 0.0));
        scene.set_parent(src, Some(parent), false).unwrap();

        let copy = scene.duplicate(src, "Src_BASE").unwrap();
        scene.mesh_mut(copy).unwrap().translate(Vec3::X);
        assert_eq!(scene.object(copy).unwrap().parent, None);
        assert_eq!(
            Vec3::from(scene.object(copy).unwrap().transform.translation),
            Vec3::new(0.0, 5.0, 0.0)
        );
        assert_ne!(scene.mesh(copy).unwrap().positions, scene.mesh(src).unwrap().positions);
    }

    #[test]
    fn test_apply_deform_modifier_bakes_transform() {
        let mut scene = Scene::new();
        let id = scene.add_object("Box", Some(cuboid("box", Vec3::ONE)));
        scene.object_mut(id).unwrap().modifiers.push(Modifier::Deform(DeformModifier {
            name: "Scale".into(),
            transform: Affine3A::from_scale(Vec3::splat(2.0)),
        }));
        scene.apply_modifier(id, 0).unwrap();
        assert!(scene.object(id).unwrap().modifiers.is_empty());
        assert_eq!(scene.mesh(id).unwrap().dimensions(), Vec3::splat(4.0));
    }

    #[test]
    fn test_particle_modifier_is_not_applicable() {
        let mut scene = Scene::new();
        let rock = scene.add_object("Rock", None);
        let id = scene.add_object("Box", Some(cuboid("box", Vec3::ONE)));
        scene
            .object_mut(id)
            .unwrap()
            .modifiers
            .push(Modifier::ParticleSystem(ParticleSystem::new("Rocks", rock, Vec::new())));
        assert!(matches!(
            scene.apply_modifier(id, 0),
            Err(SceneError::NotApplicable { .. })
        ));
        assert!(matches!(
            scene.remove_modifier(id, 3),
            Err(SceneError::MissingModifier { index: 3, .. })
        ));
        assert!(scene.remove_modifier(id, 0).is_ok());
    }

    #[test]
    fn test_set_origin_keeps_geometry_in_place() {
        let mut scene = Scene::new();
        let id = scene.add_object("Box", Some(cuboid("box", Vec3::ONE)));
        scene.set_origin(id, Vec3::new(1.0, 1.0, 0.0)).unwrap();

        let world = scene.world_transform(id).unwrap();
        assert_eq!(Vec3::from(world.translation), Vec3::new(1.0, 1.0, 0.0));
        let (lo, hi) = scene.mesh(id).unwrap().bounds().unwrap();
        assert!(world.transform_point3(lo).abs_diff_eq(Vec3::splat(-1.0), 1e-6));
        assert!(world.transform_point3(hi).abs_diff_eq(Vec3::splat(1.0), 1e-6));
    }

    #[test]
    fn test_material_copy_and_lookup() {
        let mut scene = Scene::new();
        let grass = scene.add_material(Material::new("Grass"));
        let copy = scene.copy_material(grass, "Grass_LOD").unwrap();
        scene.material_mut(copy).unwrap().physics = false;

        assert_eq!(scene.find_material("Grass_LOD"), Some(copy));
        assert!(scene.material(grass).unwrap().physics);
        assert_eq!(scene.add_material(Material::new("Grass")), MaterialId(2));
        assert_eq!(scene.material(MaterialId(2)).unwrap().name, "Grass.001");
        assert!(scene.material(MaterialId(9)).is_err());
    }

    #[test]
    fn test_select_lod_thresholds() {
        let levels = [lod(10.0), lod(20.0), lod(30.0)];
        assert_eq!(select_lod(&levels, 0.0), 0);
        assert_eq!(select_lod(&levels, 9.99), 0);
        assert_eq!(select_lod(&levels, 10.0), 1);
        assert_eq!(select_lod(&levels, 25.0), 2);
        assert_eq!(select_lod(&levels, 1000.0), 3);
        assert_eq!(select_lod(&[], 1000.0), 0);
    }

    #[test]
    fn test_update_lod_levels_uses_world_origin() {
        let mut scene = Scene::new();
        let near = scene.add_object("Near", None);
        let far = scene.add_object("Far", None);
        for id in [near, far] {
            scene.object_mut(id).unwrap().lod_levels = vec![lod(10.0), lod(20.0)];
        }
        scene.object_mut(far).unwrap().transform =
            Affine3A::from_translation(Vec3::new(15.0, 0.0, 0.0));

        scene.update_lod_levels(Vec3::ZERO);
        assert_eq!(scene.object(near).unwrap().current_lod, 0);
        assert_eq!(scene.object(far).unwrap().current_lod, 1);
    }
}
