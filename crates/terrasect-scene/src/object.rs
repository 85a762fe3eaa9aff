//! Scene objects and the records attached to them.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Affine3A;
use terrasect_mesh::Mesh;

use crate::modifier::Modifier;

/// Stable handle of an object in a [`crate::Scene`].
///
/// Ids are never reused within a scene, so a stale id resolves to nothing
/// rather than to a different object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// Viewport drawing style.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawType {
    /// Bounding box only.
    Bounds,
    /// Wireframe.
    Wire,
    /// Flat shaded.
    Solid,
    /// Textured.
    Textured,
}

/// Visibility flags restored by the section teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayFlags {
    /// Hidden in the viewport.
    pub hide: bool,
    /// Hidden in renders.
    pub hide_render: bool,
    /// Viewport drawing style.
    pub draw_type: DrawType,
}

impl Default for DisplayFlags {
    fn default() -> Self {
        Self {
            hide: false,
            hide_render: false,
            draw_type: DrawType::Textured,
        }
    }
}

/// Collision participation of an object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PhysicsType {
    /// Ignored by collision.
    NoCollision,
    /// Immovable collider.
    #[default]
    Static,
    /// Simulated body.
    Dynamic,
}

/// A typed game property.
#[derive(Clone, Debug, PartialEq)]
pub enum GameProperty {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f32),
    /// Text value.
    Text(String),
}

impl GameProperty {
    /// Truthiness of the property value.
    pub fn as_bool(&self) -> bool {
        match self {
            GameProperty::Bool(b) => *b,
            GameProperty::Int(i) => *i != 0,
            GameProperty::Float(f) => *f != 0.0,
            GameProperty::Text(s) => !s.is_empty(),
        }
    }
}

/// One level of an object's LOD chain.
#[derive(Clone, Debug, PartialEq)]
pub struct LodLevel {
    /// Object providing the level's geometry.
    pub object: ObjectId,
    /// Camera distance from which the level is shown.
    pub distance: f32,
    /// Fraction of the full-detail triangles the level was decimated to.
    pub ratio: f32,
    /// Render with the level object's own materials.
    pub use_material: bool,
}

/// An object in the scene.
#[derive(Clone, Debug)]
pub struct SceneObject {
    /// Unique name.
    pub name: String,
    /// Geometry; `None` for empties. Shared meshes are copied on write.
    pub mesh: Option<Arc<Mesh>>,
    /// Transform relative to the parent (or the world when unparented).
    pub transform: Affine3A,
    /// Parent object.
    pub parent: Option<ObjectId>,
    /// Child objects in insertion order.
    pub children: Vec<ObjectId>,
    /// Current visibility flags.
    pub display: DisplayFlags,
    /// Flags saved before a generator changed them.
    pub saved_display: Option<DisplayFlags>,
    /// Collision participation.
    pub physics: PhysicsType,
    /// Modifier stack, applied first to last.
    pub modifiers: Vec<Modifier>,
    /// Game properties by name.
    pub properties: BTreeMap<String, GameProperty>,
    /// Names of per-frame logic entry points bound to this object.
    pub logic: Vec<String>,
    /// LOD chain; level 0 of the selection is the object's own mesh.
    pub lod_levels: Vec<LodLevel>,
    /// Currently selected LOD (0 = own mesh, `k + 1` = `lod_levels[k]`).
    pub current_lod: usize,
}

impl SceneObject {
    pub(crate) fn new(name: String, mesh: Option<Arc<Mesh>>) -> Self {
        Self {
            name,
            mesh,
            transform: Affine3A::IDENTITY,
            parent: None,
            children: Vec::new(),
            display: DisplayFlags::default(),
            saved_display: None,
            physics: PhysicsType::default(),
            modifiers: Vec::new(),
            properties: BTreeMap::new(),
            logic: Vec::new(),
            lod_levels: Vec::new(),
            current_lod: 0,
        }
    }

    /// Returns the value of a property, or `None` when absent.
    pub fn property(&self, name: &str) -> Option<&GameProperty> {
        self.properties.get(name)
    }

    /// Sets a boolean property, converting any existing property of that name.
    pub fn set_bool_property(&mut self, name: &str, value: bool) {
        self.properties
            .insert(name.to_string(), GameProperty::Bool(value));
    }
}
