//! Procedural mesh builders used for demo scenes and tests.

use glam::{UVec2, Vec2, Vec3};

use crate::mesh::Mesh;

/// Builds an origin-centred grid of quads over `extent`, displaced along +Z
/// by `height(x, y)`.
///
/// `segments` is the number of quads along each axis (minimum 1).
pub fn heightfield(
    name: impl Into<String>,
    extent: Vec2,
    segments: UVec2,
    height: impl Fn(f32, f32) -> f32,
) -> Mesh {
    let segments = segments.max(UVec2::ONE);
    let step = extent / segments.as_vec2();
    let origin = -extent * 0.5;
    let row = segments.x + 1;

    let mut mesh = Mesh::new(name);
    for j in 0..=segments.y {
        for i in 0..=segments.x {
            let xy = origin + step * Vec2::new(i as f32, j as f32);
            mesh.add_vertex(Vec3::new(xy.x, xy.y, height(xy.x, xy.y)));
        }
    }
    for j in 0..segments.y {
        for i in 0..segments.x {
            let a = j * row + i;
            mesh.add_face(vec![a, a + 1, a + row + 1, a + row], 0);
        }
    }
    mesh.recompute_normals();
    mesh
}

/// Builds an axis-aligned box centred on the origin.
pub fn cuboid(name: impl Into<String>, half_extents: Vec3) -> Mesh {
    let h = half_extents;
    let mut mesh = Mesh::new(name);
    let corners = [
        Vec3::new(-h.x, -h.y, -h.z),
        Vec3::new(h.x, -h.y, -h.z),
        Vec3::new(h.x, h.y, -h.z),
        Vec3::new(-h.x, h.y, -h.z),
        Vec3::new(-h.x, -h.y, h.z),
        Vec3::new(h.x, -h.y, h.z),
        Vec3::new(h.x, h.y, h.z),
        Vec3::new(-h.x, h.y, h.z),
    ];
    for c in corners {
        mesh.add_vertex(c);
    }
    for quad in [
        [0, 3, 2, 1],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [1, 2, 6, 5],
        [2, 3, 7, 6],
        [3, 0, 4, 7],
    ] {
        mesh.add_face(quad.to_vec(), 0);
    }
    mesh.recompute_normals();
    mesh
}
