//! Connectivity queries and cleanup operations: edge maps, loose-part
//! separation, boundary loops, duplicate-vertex removal, and triangulation.

use std::collections::BTreeSet;

use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;

use crate::mesh::{Face, Mesh};

/// Order-independent key for an undirected edge.
pub fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

/// Maps every undirected edge to the faces that use it.
pub fn edge_face_map(mesh: &Mesh) -> FxHashMap<(u32, u32), Vec<usize>> {
    let mut map: FxHashMap<(u32, u32), Vec<usize>> = FxHashMap::default();
    for (f, face) in mesh.faces.iter().enumerate() {
        for (a, b) in face.edges() {
            map.entry(edge_key(a, b)).or_default().push(f);
        }
    }
    map
}

/// Union-find over dense indices with path halving and union by rank.
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    pub(crate) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Splits a mesh into its maximal face-connected pieces.
///
/// Pieces are ordered by their lowest face index and named `<name>.001`,
/// `<name>.002`, ... Vertices that no face references are dropped. Material
/// slots are copied to every piece; vertex groups are remapped.
pub fn separate_loose(mesh: Mesh) -> Vec<Mesh> {
    let mut sets = DisjointSet::new(mesh.positions.len());
    for face in &mesh.faces {
        let first = face.vertices[0] as usize;
        for &v in &face.vertices[1..] {
            sets.union(first, v as usize);
        }
    }

    let mut piece_of_root: FxHashMap<usize, usize> = FxHashMap::default();
    let mut piece_faces: Vec<Vec<usize>> = Vec::new();
    for (f, face) in mesh.faces.iter().enumerate() {
        let root = sets.find(face.vertices[0] as usize);
        let piece = *piece_of_root.entry(root).or_insert_with(|| {
            piece_faces.push(Vec::new());
            piece_faces.len() - 1
        });
        piece_faces[piece].push(f);
    }

    piece_faces
        .into_iter()
        .enumerate()
        .map(|(k, faces)| {
            let mut piece = Mesh::new(format!("{}.{:03}", mesh.name, k + 1));
            piece.materials = mesh.materials.clone();
            let mut remap: FxHashMap<u32, u32> = FxHashMap::default();
            for f in faces {
                let face = &mesh.faces[f];
                let vertices = face
                    .vertices
                    .iter()
                    .map(|&v| {
                        *remap.entry(v).or_insert_with(|| {
                            piece.positions.push(mesh.positions[v as usize]);
                            piece.normals.push(mesh.normals[v as usize]);
                            (piece.positions.len() - 1) as u32
                        })
                    })
                    .collect();
                piece.faces.push(Face {
                    vertices,
                    material: face.material,
                });
            }
            for (name, members) in &mesh.vertex_groups {
                let mapped: BTreeSet<u32> =
                    members.iter().filter_map(|v| remap.get(v).copied()).collect();
                if !mapped.is_empty() {
                    piece.vertex_groups.insert(name.clone(), mapped);
                }
            }
            piece
        })
        .collect()
}

/// Vertices on open boundary edges (edges used by exactly one face).
///
/// This is the vertex set of the boundary loops of a fully selected mesh.
pub fn boundary_loop(mesh: &Mesh) -> BTreeSet<u32> {
    edge_face_map(mesh)
        .into_iter()
        .filter(|(_, faces)| faces.len() == 1)
        .flat_map(|((a, b), _)| [a, b])
        .collect()
}

/// Merges vertices closer than `threshold`, keeping the lowest index.
///
/// Faces that collapse below three distinct vertices are removed, group
/// memberships are merged and unused vertices are compacted away. Returns the
/// number of merged vertices.
pub fn remove_doubles(mesh: &mut Mesh, threshold: f32) -> usize {
    let threshold = threshold.max(f32::EPSILON);
    let cell_of = |p: Vec3| (p / threshold).floor().as_ivec3();

    let mut buckets: FxHashMap<IVec3, Vec<u32>> = FxHashMap::default();
    let mut target: Vec<u32> = (0..mesh.positions.len() as u32).collect();
    let mut merged = 0;

    for (i, &p) in mesh.positions.iter().enumerate() {
        let cell = cell_of(p);
        let mut found = None;
        'search: for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let Some(candidates) = buckets.get(&(cell + IVec3::new(dx, dy, dz))) else {
                        continue;
                    };
                    for &c in candidates {
                        if mesh.positions[c as usize].distance(p) <= threshold {
                            found = Some(c);
                            break 'search;
                        }
                    }
                }
            }
        }
        match found {
            Some(c) => {
                target[i] = c;
                merged += 1;
            }
            None => buckets.entry(cell).or_default().push(i as u32),
        }
    }

    if merged == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        let mut vertices: Vec<u32> = Vec::with_capacity(face.vertices.len());
        for &v in &face.vertices {
            let t = target[v as usize];
            if vertices.last() != Some(&t) {
                vertices.push(t);
            }
        }
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        face.vertices = vertices;
    }
    mesh.faces.retain(|f| {
        let distinct: BTreeSet<u32> = f.vertices.iter().copied().collect();
        distinct.len() >= 3 && distinct.len() == f.vertices.len()
    });
    for members in mesh.vertex_groups.values_mut() {
        *members = members.iter().map(|&v| target[v as usize]).collect();
    }
    mesh.compact();
    merged
}

/// Fan-triangulates every polygon with more than three vertices.
///
/// Polygons are assumed convex, which holds for faces produced by plane
/// bisection of triangles and for quads of regular grids.
pub fn triangulate(mesh: &mut Mesh) {
    if mesh.faces.iter().all(Face::is_triangle) {
        return;
    }
    let faces = std::mem::take(&mut mesh.faces);
    for face in faces {
        if face.is_triangle() {
            mesh.faces.push(face);
            continue;
        }
        let pivot = face.vertices[0];
        for pair in face.vertices[1..].windows(2) {
            mesh.faces.push(Face {
                vertices: vec![pivot, pair[0], pair[1]],
                material: face.material,
            });
        }
    }
}
