//! Mesh data structure: shared vertex positions and normals, polygon faces with
//! material slots, and named vertex groups.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Affine3A, Vec3};

/// Identifier of a material owned by the scene.
///
/// Meshes only store ids in their slot list; names and render flags live with
/// the scene's material table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// A single polygon.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    /// Vertex indices in counter-clockwise order.
    pub vertices: Vec<u32>,
    /// Index into [`Mesh::materials`].
    pub material: u16,
}

impl Face {
    /// Creates a face using material slot 0.
    pub fn new(vertices: Vec<u32>) -> Self {
        Self {
            vertices,
            material: 0,
        }
    }

    /// Iterates the face's edges as `(from, to)` pairs, closing the loop.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Returns `true` for three-vertex faces.
    pub fn is_triangle(&self) -> bool {
        self.vertices.len() == 3
    }
}

/// Polygon mesh with per-vertex shading normals.
///
/// `positions` and `normals` are always the same length. Faces reference
/// vertices by index; a vertex may be referenced by any number of faces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Datablock name.
    pub name: String,
    /// Vertex positions in object-local space.
    pub positions: Vec<Vec3>,
    /// Per-vertex shading normals.
    pub normals: Vec<Vec3>,
    /// Polygons.
    pub faces: Vec<Face>,
    /// Material slots referenced by [`Face::material`].
    pub materials: Vec<MaterialId>,
    /// Named vertex groups (group name -> member vertex indices).
    pub vertex_groups: BTreeMap<String, BTreeSet<u32>>,
}

impl Mesh {
    /// Creates an empty mesh.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a vertex with a zero normal and returns its index.
    pub fn add_vertex(&mut self, position: Vec3) -> u32 {
        self.positions.push(position);
        self.normals.push(Vec3::ZERO);
        (self.positions.len() - 1) as u32
    }

    /// Appends a face.
    pub fn add_face(&mut self, vertices: Vec<u32>, material: u16) {
        debug_assert!(vertices.len() >= 3, "faces need at least three vertices");
        self.faces.push(Face { vertices, material });
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of polygons.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of triangles the polygons would produce when fan-triangulated.
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().map(|f| f.vertices.len() - 2).sum()
    }

    /// Returns `true` when the mesh has no faces.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Axis-aligned bounds of all vertices, or `None` for a vertex-less mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
        )
    }

    /// Extent of the bounding box along each axis.
    pub fn dimensions(&self) -> Vec3 {
        self.bounds().map_or(Vec3::ZERO, |(lo, hi)| hi - lo)
    }

    /// Center of the bounding box.
    pub fn bounds_center(&self) -> Option<Vec3> {
        self.bounds().map(|(lo, hi)| (lo + hi) * 0.5)
    }

    /// Mean of all vertex positions (median-point origin).
    pub fn centroid(&self) -> Option<Vec3> {
        if self.positions.is_empty() {
            return None;
        }
        let sum: Vec3 = self.positions.iter().copied().sum();
        Some(sum / self.positions.len() as f32)
    }

    /// Moves every vertex by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            *p += offset;
        }
    }

    /// Applies an affine transform to positions and normals.
    pub fn transform(&mut self, transform: &Affine3A) {
        let normal_matrix = transform.matrix3.inverse().transpose();
        for p in &mut self.positions {
            *p = transform.transform_point3(*p);
        }
        for n in &mut self.normals {
            *n = normal_matrix.mul_vec3(*n).normalize_or_zero();
        }
    }

    /// Newell normal of a face (not normalized; length is twice the area).
    pub fn face_normal(&self, face: &Face) -> Vec3 {
        face.edges().fold(Vec3::ZERO, |acc, (a, b)| {
            let pa = self.positions[a as usize];
            let pb = self.positions[b as usize];
            acc + Vec3::new(
                (pa.y - pb.y) * (pa.z + pb.z),
                (pa.z - pb.z) * (pa.x + pb.x),
                (pa.x - pb.x) * (pa.y + pb.y),
            )
        })
    }

    /// Recomputes smooth vertex normals as the area-weighted face normal sum.
    ///
    /// Vertices not referenced by any face get `+Z`.
    pub fn recompute_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.positions.len()];
        for face in &self.faces {
            let n = self.face_normal(face);
            for &v in &face.vertices {
                acc[v as usize] += n;
            }
        }
        self.normals = acc
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Z))
            .collect();
    }

    /// Vertex indices touched by each material slot, in slot order.
    ///
    /// A vertex shared by faces of two slots appears under both.
    pub fn vertices_by_material(&self) -> Vec<(u16, Vec<u32>)> {
        let mut slots: BTreeMap<u16, (BTreeSet<u32>, Vec<u32>)> = BTreeMap::new();
        for face in &self.faces {
            let (seen, ordered) = slots.entry(face.material).or_default();
            for &v in &face.vertices {
                if seen.insert(v) {
                    ordered.push(v);
                }
            }
        }
        slots
            .into_iter()
            .map(|(slot, (_, ordered))| (slot, ordered))
            .collect()
    }

    /// Replaces (or creates) a vertex group.
    pub fn set_vertex_group(&mut self, name: &str, members: impl IntoIterator<Item = u32>) {
        self.vertex_groups
            .insert(name.to_string(), members.into_iter().collect());
    }

    /// Members of a vertex group.
    pub fn vertex_group(&self, name: &str) -> Option<&BTreeSet<u32>> {
        self.vertex_groups.get(name)
    }

    /// Removes a vertex group, returning its members.
    pub fn remove_vertex_group(&mut self, name: &str) -> Option<BTreeSet<u32>> {
        self.vertex_groups.remove(name)
    }

    /// Returns the slot index for `material`, appending a slot when missing.
    pub fn ensure_material(&mut self, material: MaterialId) -> u16 {
        if let Some(i) = self.materials.iter().position(|&m| m == material) {
            return i as u16;
        }
        self.materials.push(material);
        (self.materials.len() - 1) as u16
    }

    /// Merges `other` into this mesh.
    ///
    /// Material slots are matched by [`MaterialId`], vertex groups by name.
    pub fn join(&mut self, other: Mesh) {
        let offset = self.positions.len() as u32;
        let slot_map: Vec<u16> = other
            .materials
            .iter()
            .map(|&m| self.ensure_material(m))
            .collect();

        self.positions.extend(other.positions);
        self.normals.extend(other.normals);
        for face in other.faces {
            let material = slot_map
                .get(face.material as usize)
                .copied()
                .unwrap_or(face.material);
            self.faces.push(Face {
                vertices: face.vertices.into_iter().map(|v| v + offset).collect(),
                material,
            });
        }
        for (name, members) in other.vertex_groups {
            self.vertex_groups
                .entry(name)
                .or_default()
                .extend(members.into_iter().map(|v| v + offset));
        }
    }

    /// Drops vertices no face references, remapping faces and vertex groups.
    ///
    /// Returns the old-index -> new-index table (`None` for dropped vertices).
    pub fn compact(&mut self) -> Vec<Option<u32>> {
        let mut used = vec![false; self.positions.len()];
        for face in &self.faces {
            for &v in &face.vertices {
                used[v as usize] = true;
            }
        }

        let mut remap = vec![None; self.positions.len()];
        let mut positions = Vec::with_capacity(self.positions.len());
        let mut normals = Vec::with_capacity(self.normals.len());
        for (i, keep) in used.iter().enumerate() {
            if *keep {
                remap[i] = Some(positions.len() as u32);
                positions.push(self.positions[i]);
                normals.push(self.normals[i]);
            }
        }
        self.positions = positions;
        self.normals = normals;

        for face in &mut self.faces {
            for v in &mut face.vertices {
                // Every face vertex is marked used above.
                *v = remap[*v as usize].unwrap_or(*v);
            }
        }
        for members in self.vertex_groups.values_mut() {
            *members = members
                .iter()
                .filter_map(|&v| remap.get(v as usize).copied().flatten())
                .collect();
        }
        remap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        let mut mesh = Mesh::new("quad");
        let a = mesh.add_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(Vec3::new(1.0, 1.0, 0.0));
        let d = mesh.add_vertex(Vec3::new(0.0, 1.0, 0.0));
        mesh.add_face(vec![a, b, c, d], 0);
        mesh.materials.push(MaterialId(7));
        mesh
    }

    #[test]
    fn test_bounds_and_centroid() {
        let mesh = quad();
        let (lo, hi) = mesh.bounds().unwrap();
        assert_eq!(lo, Vec3::ZERO);
        assert_eq!(hi, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(mesh.centroid().unwrap(), Vec3::new(0.5, 0.5, 0.0));
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_recompute_normals_points_up_for_ccw_quad() {
        let mut mesh = quad();
        mesh.recompute_normals();
        for n in &mesh.normals {
            assert!((*n - Vec3::Z).length() < 1e-6, "normal was {n}");
        }
    }

    #[test]
    fn test_join_offsets_faces_and_groups() {
        let mut a = quad();
        a.set_vertex_group("edge", [0, 1]);
        let mut b = quad();
        b.materials = vec![MaterialId(9)];
        b.set_vertex_group("edge", [2]);

        a.join(b);
        assert_eq!(a.vertex_count(), 8);
        assert_eq!(a.faces[1].vertices, vec![4, 5, 6, 7]);
        assert_eq!(a.faces[1].material, 1);
        assert_eq!(a.materials, vec![MaterialId(7), MaterialId(9)]);
        let group: Vec<u32> = a.vertex_group("edge").unwrap().iter().copied().collect();
        assert_eq!(group, vec![0, 1, 6]);
    }

    #[test]
    fn test_compact_drops_unused_vertices() {
        let mut mesh = quad();
        mesh.add_vertex(Vec3::splat(5.0));
        mesh.set_vertex_group("g", [3, 4]);
        let remap = mesh.compact();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(remap[4], None);
        assert_eq!(mesh.vertex_group("g").unwrap().len(), 1);
    }

    #[test]
    fn test_vertices_by_material_lists_shared_vertices_per_slot() {
        let mut mesh = quad();
        let e = mesh.add_vertex(Vec3::new(2.0, 0.0, 0.0));
        mesh.add_face(vec![1, e, 2], 1);
        let slots = mesh.vertices_by_material();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].1, vec![0, 1, 2, 3]);
        assert_eq!(slots[1].1, vec![1, 4, 2]);
    }

    #[test]
    fn test_transform_moves_positions() {
        let mut mesh = quad();
        mesh.recompute_normals();
        mesh.transform(&Affine3A::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(mesh.positions[0], Vec3::new(1.0, 2.0, 3.0));
        assert!((mesh.normals[0] - Vec3::Z).length() < 1e-6);
    }
}
