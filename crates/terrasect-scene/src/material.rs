//! Material render and physics flags.

/// A material as seen by the section pipeline.
///
/// Only the flags that decide whether geometry takes part in collision and
/// shadowing are modelled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Material {
    /// Unique name.
    pub name: String,
    /// Faces using this material collide.
    pub physics: bool,
    /// Faces using this material cast shadows.
    pub cast_shadows: bool,
    /// Faces using this material receive shadows.
    pub receive_shadows: bool,
}

impl Material {
    /// Creates a material with physics and shadows enabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            physics: true,
            cast_shadows: true,
            receive_shadows: true,
        }
    }
}
