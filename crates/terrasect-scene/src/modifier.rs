//! Object modifier stack entries.

use glam::Affine3A;

use crate::object::ObjectId;

/// A non-destructive operation attached to an object.
#[derive(Clone, Debug, PartialEq)]
pub enum Modifier {
    /// Deforms the vertices by an affine transform when applied.
    Deform(DeformModifier),
    /// Scatters copies of an instance object.
    ParticleSystem(ParticleSystem),
}

impl Modifier {
    /// Display name of the modifier.
    pub fn name(&self) -> &str {
        match self {
            Modifier::Deform(m) => &m.name,
            Modifier::ParticleSystem(p) => &p.name,
        }
    }
}

/// Affine vertex deformation.
#[derive(Clone, Debug, PartialEq)]
pub struct DeformModifier {
    /// Display name.
    pub name: String,
    /// Transform applied to vertex positions in object space.
    pub transform: Affine3A,
}

/// Instanced decoration scattered over an object.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleSystem {
    /// Display name.
    pub name: String,
    /// Visible in the viewport.
    pub show_viewport: bool,
    /// Visible in renders.
    pub show_render: bool,
    /// Object whose mesh is instanced at every particle.
    pub instance_object: Option<ObjectId>,
    /// World-space transform of every instance.
    pub instances: Vec<Affine3A>,
}

impl ParticleSystem {
    /// Creates a visible particle system instancing `object`.
    pub fn new(name: impl Into<String>, object: ObjectId, instances: Vec<Affine3A>) -> Self {
        Self {
            name: name.into(),
            show_viewport: true,
            show_render: true,
            instance_object: Some(object),
            instances,
        }
    }
}
