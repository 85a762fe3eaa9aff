//! Per-frame section bookkeeping for generated sources.
//!
//! A source object carrying [`UPDATE_ENTRY`] in its logic is driven by
//! [`SectionsRuntime::update`]. The first update restores the recorded seam
//! normals and registers a [`SectionTracker`] for the object; every update
//! then compares which sections are at full detail against the previous
//! frame and hands the difference to a [`CollisionPolicy`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glam::Vec3;
use terrasect_scene::{ObjectId, PhysicsType, Scene, SceneError};
use tracing::{debug, info};

use crate::error::RuntimeError;
use crate::names::{MARKER_PROPERTY, UPDATE_ENTRY};
use crate::normals::restore;
use crate::record::NormalRecord;

/// Reacts to sections entering or leaving full detail.
pub trait CollisionPolicy {
    /// The named section reached full detail.
    fn activate(&mut self, scene: &mut Scene, name: &str) -> Result<(), SceneError>;

    /// The named section left full detail.
    fn deactivate(&mut self, scene: &mut Scene, name: &str) -> Result<(), SceneError>;
}

/// Makes full-detail sections static colliders and everything else
/// non-colliding.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhysicsTogglePolicy;

impl PhysicsTogglePolicy {
    fn set(scene: &mut Scene, name: &str, physics: PhysicsType) -> Result<(), SceneError> {
        match scene.find(name) {
            Some(id) => scene.object_mut(id)?.physics = physics,
            None => debug!("Section {name} no longer exists"),
        }
        Ok(())
    }
}

impl CollisionPolicy for PhysicsTogglePolicy {
    fn activate(&mut self, scene: &mut Scene, name: &str) -> Result<(), SceneError> {
        Self::set(scene, name, PhysicsType::Static)
    }

    fn deactivate(&mut self, scene: &mut Scene, name: &str) -> Result<(), SceneError> {
        Self::set(scene, name, PhysicsType::NoCollision)
    }
}

/// Sections that entered and left full detail during one tick, sorted by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerDelta {
    /// Sections that reached full detail.
    pub activated: Vec<String>,
    /// Sections that dropped to a coarser level.
    pub deactivated: Vec<String>,
}

impl TrackerDelta {
    /// Returns `true` when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.activated.is_empty() && self.deactivated.is_empty()
    }
}

/// Full-detail sections of one parent as of the last tick.
#[derive(Clone, Debug, Default)]
pub struct SectionTracker {
    active: BTreeSet<String>,
}

impl SectionTracker {
    /// Names of the sections currently at full detail.
    pub fn active(&self) -> &BTreeSet<String> {
        &self.active
    }

    /// Recomputes the full-detail children of `parent` and notifies `policy`
    /// of the changes, deactivations first.
    pub fn tick(
        &mut self,
        scene: &mut Scene,
        parent: ObjectId,
        policy: &mut dyn CollisionPolicy,
    ) -> Result<TrackerDelta, SceneError> {
        let mut now = BTreeSet::new();
        for &child in scene.children(parent)? {
            let object = scene.object(child)?;
            if object.current_lod == 0 {
                now.insert(object.name.clone());
            }
        }

        let delta = TrackerDelta {
            activated: now.difference(&self.active).cloned().collect(),
            deactivated: self.active.difference(&now).cloned().collect(),
        };
        for name in &delta.deactivated {
            policy.deactivate(scene, name)?;
        }
        for name in &delta.activated {
            policy.activate(scene, name)?;
        }
        self.active = now;
        Ok(delta)
    }
}

/// Trackers keyed by the object they belong to.
///
/// An object only gets a tracker through [`TrackerRegistry::register`].
#[derive(Debug, Default)]
pub struct TrackerRegistry {
    trackers: BTreeMap<ObjectId, SectionTracker>,
}

impl TrackerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives `owner` a tracker, keeping an existing one.
    pub fn register(&mut self, owner: ObjectId) -> &mut SectionTracker {
        self.trackers.entry(owner).or_default()
    }

    /// Returns `true` when `owner` has a tracker.
    pub fn is_registered(&self, owner: ObjectId) -> bool {
        self.trackers.contains_key(&owner)
    }

    /// The tracker of `owner`, if registered.
    pub fn resolve(&mut self, owner: ObjectId) -> Option<&mut SectionTracker> {
        self.trackers.get_mut(&owner)
    }

    /// Drops the tracker of `owner`.
    pub fn release(&mut self, owner: ObjectId) -> Option<SectionTracker> {
        self.trackers.remove(&owner)
    }

    /// Number of registered owners.
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Returns `true` when no owner is registered.
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

/// Drives the trackers of every generated source in a scene.
#[derive(Debug)]
pub struct SectionsRuntime<P = PhysicsTogglePolicy> {
    data_dir: PathBuf,
    registry: TrackerRegistry,
    policy: P,
}

impl SectionsRuntime {
    /// Runtime reading records from `data_dir` and toggling physics.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_policy(data_dir, PhysicsTogglePolicy)
    }
}

impl<P: CollisionPolicy> SectionsRuntime<P> {
    /// Runtime with a custom collision policy.
    pub fn with_policy(data_dir: impl Into<PathBuf>, policy: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            registry: TrackerRegistry::new(),
            policy,
        }
    }

    /// Directory normal records are read from.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Trackers of the sources loaded so far.
    pub fn registry(&self) -> &TrackerRegistry {
        &self.registry
    }

    /// Policy notified of collision changes.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Restores the recorded seam normals of `owner` and registers its tracker.
    ///
    /// Normals are only restored when the marker property is set. Returns the
    /// number of normals restored.
    pub fn on_load(&mut self, scene: &mut Scene, owner: ObjectId) -> Result<usize, RuntimeError> {
        let object = scene.object(owner)?;
        let marked = object
            .property(MARKER_PROPERTY)
            .is_some_and(|p| p.as_bool());
        let name = object.name.clone();

        let mut restored = 0;
        if marked {
            let record = NormalRecord::load(&self.data_dir, &name)?;
            for (target, table) in record.iter() {
                let id = scene
                    .find(target)
                    .ok_or_else(|| RuntimeError::UnknownObject(target.to_string()))?;
                restored += restore(scene.mesh_mut(id)?, Vec3::ZERO, table, None)?;
            }
            info!(
                "Restored {restored} normals on {} objects of {name}",
                record.len()
            );
        }
        self.registry.register(owner);
        Ok(restored)
    }

    /// Per-frame entry point bound to a generated source.
    ///
    /// Loads the source on its first update, then ticks its tracker.
    pub fn update(&mut self, scene: &mut Scene, owner: ObjectId) -> Result<TrackerDelta, RuntimeError> {
        if !self.registry.is_registered(owner) {
            self.on_load(scene, owner)?;
        }
        let tracker = self.registry.register(owner);
        Ok(tracker.tick(scene, owner, &mut self.policy)?)
    }

    /// Updates every object bound to the update entry point, in id order.
    pub fn tick_all(&mut self, scene: &mut Scene) -> Result<Vec<(ObjectId, TrackerDelta)>, RuntimeError> {
        let owners: Vec<ObjectId> = scene
            .objects()
            .filter(|(_, o)| o.logic.iter().any(|entry| entry == UPDATE_ENTRY))
            .map(|(id, _)| id)
            .collect();
        owners
            .into_iter()
            .map(|owner| Ok((owner, self.update(scene, owner)?)))
            .collect()
    }

    /// Forgets the tracker of `owner`; the next update loads it again.
    pub fn release(&mut self, owner: ObjectId) -> bool {
        self.registry.release(owner).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrasect_scene::LodLevel;

    #[derive(Default)]
    struct Recording {
        events: Vec<String>,
    }

    impl CollisionPolicy for Recording {
        fn activate(&mut self, _: &mut Scene, name: &str) -> Result<(), SceneError> {
            self.events.push(format!("+{name}"));
            Ok(())
        }

        fn deactivate(&mut self, _: &mut Scene, name: &str) -> Result<(), SceneError> {
            self.events.push(format!("-{name}"));
            Ok(())
        }
    }

    /// A parent with two sections, each with one LOD level at distance 10.
    fn parent(scene: &mut Scene, name: &str) -> (ObjectId, [ObjectId; 2]) {
        let parent = scene.add_object(name, None);
        scene.object_mut(parent).unwrap().logic.push(UPDATE_ENTRY.to_string());
        let sections = [0, 1].map(|i| {
            let section = scene.add_object(&format!("{name}_SECT{i}"), None);
            let level = scene.add_object(&format!("{name}_SECT{i}_LOD.0"), None);
            scene.set_parent(level, Some(section), false).unwrap();
            scene.set_parent(section, Some(parent), false).unwrap();
            let object = scene.object_mut(section).unwrap();
            object.physics = PhysicsType::NoCollision;
            object.lod_levels.push(LodLevel {
                object: level,
                distance: 10.0,
                ratio: 0.25,
                use_material: true,
            });
            section
        });
        (parent, sections)
    }

    #[test]
    fn test_tick_reports_changes_in_order() {
        let mut scene = Scene::new();
        let (owner, [a, b]) = parent(&mut scene, "Ground");
        let mut tracker = SectionTracker::default();
        let mut policy = Recording::default();

        let delta = tracker.tick(&mut scene, owner, &mut policy).unwrap();
        assert_eq!(delta.activated, ["Ground_SECT0", "Ground_SECT1"]);
        assert!(delta.deactivated.is_empty());

        scene.object_mut(a).unwrap().current_lod = 1;
        let delta = tracker.tick(&mut scene, owner, &mut policy).unwrap();
        assert_eq!(delta.deactivated, ["Ground_SECT0"]);
        assert!(delta.activated.is_empty());

        scene.object_mut(a).unwrap().current_lod = 0;
        scene.object_mut(b).unwrap().current_lod = 1;
        tracker.tick(&mut scene, owner, &mut policy).unwrap();
        assert!(tracker.tick(&mut scene, owner, &mut policy).unwrap().is_empty());

        assert_eq!(
            policy.events,
            ["+Ground_SECT0", "+Ground_SECT1", "-Ground_SECT0", "-Ground_SECT1", "+Ground_SECT0"]
        );
        assert_eq!(tracker.active().len(), 1);
    }

    #[test]
    fn test_physics_follows_full_detail() {
        let mut scene = Scene::new();
        let (owner, [a, b]) = parent(&mut scene, "Ground");
        let mut runtime = SectionsRuntime::new(".");

        runtime.update(&mut scene, owner).unwrap();
        assert_eq!(scene.object(a).unwrap().physics, PhysicsType::Static);
        assert_eq!(scene.object(b).unwrap().physics, PhysicsType::Static);

        scene.update_lod_levels(Vec3::new(50.0, 0.0, 0.0));
        runtime.update(&mut scene, owner).unwrap();
        assert_eq!(scene.object(a).unwrap().physics, PhysicsType::NoCollision);
        assert_eq!(scene.object(b).unwrap().physics, PhysicsType::NoCollision);

        scene.update_lod_levels(Vec3::new(5.0, 0.0, 0.0));
        let delta = runtime.update(&mut scene, owner).unwrap();
        assert_eq!(delta.activated.len(), 2);
        assert_eq!(scene.object(a).unwrap().physics, PhysicsType::Static);
    }

    #[test]
    fn test_registry_keeps_state_per_parent() {
        let mut scene = Scene::new();
        let (first, [a, _]) = parent(&mut scene, "Hills");
        let (second, _) = parent(&mut scene, "Dunes");
        let mut runtime = SectionsRuntime::with_policy(".", Recording::default());

        let deltas = runtime.tick_all(&mut scene).unwrap();
        assert_eq!(deltas.len(), 2);
        assert_eq!(runtime.registry().len(), 2);

        scene.object_mut(a).unwrap().current_lod = 1;
        let deltas = runtime.tick_all(&mut scene).unwrap();
        assert_eq!(deltas[0], (first, TrackerDelta {
            activated: vec![],
            deactivated: vec!["Hills_SECT0".to_string()],
        }));
        assert_eq!(deltas[1], (second, TrackerDelta::default()));

        assert!(runtime.release(first));
        assert!(!runtime.registry().is_registered(first));
        assert!(runtime.registry().is_registered(second));
        assert!(!runtime.release(first));
    }

    #[test]
    fn test_marked_source_without_record_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        let (owner, _) = parent(&mut scene, "Ground");
        scene
            .object_mut(owner)
            .unwrap()
            .set_bool_property(MARKER_PROPERTY, true);

        let mut runtime = SectionsRuntime::new(dir.path());
        let result = runtime.update(&mut scene, owner);
        assert!(matches!(result, Err(RuntimeError::Record(_))));
        assert!(!runtime.registry().is_registered(owner));
    }

    #[test]
    fn test_unmarked_source_registers_without_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        let (owner, _) = parent(&mut scene, "Ground");
        scene
            .object_mut(owner)
            .unwrap()
            .set_bool_property(MARKER_PROPERTY, false);

        let mut runtime = SectionsRuntime::new(dir.path());
        assert_eq!(runtime.on_load(&mut scene, owner).unwrap(), 0);
        assert!(runtime.registry().is_registered(owner));
    }
}
