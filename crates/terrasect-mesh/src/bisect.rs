//! Plane bisection and edge splitting.
//!
//! Together these cut a mesh into disconnected regions along a plane: the
//! bisection inserts vertices where edges cross the plane and splits the
//! crossed polygons, and [`split_edges`] then duplicates the vertices along
//! the cut so the faces on either side no longer share them.

use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::kernel::BisectOutcome;
use crate::mesh::{Face, Mesh};
use crate::topology::{DisjointSet, edge_face_map, edge_key};

/// Signed distances below this magnitude count as lying on the plane.
pub const PLANE_EPSILON: f32 = 1e-5;

/// Cuts every polygon crossing the plane through `point` with `normal`.
///
/// Vertices created on crossed edges are shared between the two polygons
/// adjacent to that edge. The returned cut edges include edges that already
/// lay in the plane, so a following [`split_edges`] separates those too.
pub fn bisect_plane(mesh: &mut Mesh, point: Vec3, normal: Vec3) -> BisectOutcome {
    let Some(normal) = normal.try_normalize() else {
        return BisectOutcome::NoIntersection;
    };

    let mut distance: Vec<f32> = mesh
        .positions
        .iter()
        .map(|&p| {
            let d = normal.dot(p - point);
            if d.abs() < PLANE_EPSILON { 0.0 } else { d }
        })
        .collect();

    let mut edge_points: FxHashMap<(u32, u32), u32> = FxHashMap::default();
    let mut cut_edges: Vec<[u32; 2]> = Vec::new();
    let faces = std::mem::take(&mut mesh.faces);
    let mut out = Vec::with_capacity(faces.len());

    for face in faces {
        let front = face.vertices.iter().any(|&v| distance[v as usize] > 0.0);
        let back = face.vertices.iter().any(|&v| distance[v as usize] < 0.0);

        if !(front && back) {
            for (a, b) in face.edges() {
                if distance[a as usize] == 0.0 && distance[b as usize] == 0.0 {
                    let (lo, hi) = edge_key(a, b);
                    cut_edges.push([lo, hi]);
                }
            }
            out.push(face);
            continue;
        }

        let mut front_loop = Vec::with_capacity(face.vertices.len() + 2);
        let mut back_loop = Vec::with_capacity(face.vertices.len() + 2);
        let mut on_plane = Vec::with_capacity(2);

        for (a, b) in face.edges() {
            let da = distance[a as usize];
            let db = distance[b as usize];
            if da >= 0.0 {
                front_loop.push(a);
            }
            if da <= 0.0 {
                back_loop.push(a);
            }
            if da == 0.0 {
                on_plane.push(a);
            }
            if (da > 0.0 && db < 0.0) || (da < 0.0 && db > 0.0) {
                let key = edge_key(a, b);
                let v = *edge_points.entry(key).or_insert_with(|| {
                    let (lo, hi) = key;
                    let d_lo = distance[lo as usize];
                    let d_hi = distance[hi as usize];
                    let t = d_lo / (d_lo - d_hi);
                    let p_lo = mesh.positions[lo as usize];
                    let p_hi = mesh.positions[hi as usize];
                    let n_lo = mesh.normals[lo as usize];
                    let n_hi = mesh.normals[hi as usize];
                    let v = mesh.add_vertex(p_lo.lerp(p_hi, t));
                    mesh.normals[v as usize] = n_lo.lerp(n_hi, t).normalize_or_zero();
                    distance.push(0.0);
                    v
                });
                front_loop.push(v);
                back_loop.push(v);
                on_plane.push(v);
            }
        }

        if on_plane.len() >= 2 {
            let (lo, hi) = edge_key(on_plane[0], on_plane[1]);
            cut_edges.push([lo, hi]);
        }
        if front_loop.len() >= 3 {
            out.push(Face {
                vertices: front_loop,
                material: face.material,
            });
        }
        if back_loop.len() >= 3 {
            out.push(Face {
                vertices: back_loop,
                material: face.material,
            });
        }
    }

    mesh.faces = out;
    cut_edges.sort_unstable();
    cut_edges.dedup();

    if cut_edges.is_empty() {
        BisectOutcome::NoIntersection
    } else {
        BisectOutcome::Cut { cut_edges }
    }
}

/// Disconnects the faces on either side of each listed edge.
///
/// Around every endpoint of a split edge, the incident face corners are
/// grouped by walking across non-split edges; every group after the first
/// receives its own copy of the vertex (position, normal and vertex-group
/// membership are copied).
pub fn split_edges(mesh: &mut Mesh, edges: &[[u32; 2]]) {
    if edges.is_empty() {
        return;
    }
    let split: FxHashSet<(u32, u32)> = edges.iter().map(|e| edge_key(e[0], e[1])).collect();
    let touched: FxHashSet<u32> = edges.iter().flatten().copied().collect();
    let faces_of_edge = edge_face_map(mesh);

    let mut offsets = Vec::with_capacity(mesh.faces.len());
    let mut corners = 0usize;
    for face in &mesh.faces {
        offsets.push(corners);
        corners += face.vertices.len();
    }

    let corner_at = |face: &Face, v: u32| face.vertices.iter().position(|&x| x == v);
    let mut sets = DisjointSet::new(corners);
    for (f, face) in mesh.faces.iter().enumerate() {
        let n = face.vertices.len();
        for i in 0..n {
            let a = face.vertices[i];
            let b = face.vertices[(i + 1) % n];
            let key = edge_key(a, b);
            if split.contains(&key) {
                continue;
            }
            let Some(neighbours) = faces_of_edge.get(&key) else {
                continue;
            };
            for &g in neighbours {
                if g == f {
                    continue;
                }
                let other = &mesh.faces[g];
                if let Some(ga) = corner_at(other, a) {
                    sets.union(offsets[f] + i, offsets[g] + ga);
                }
                if let Some(gb) = corner_at(other, b) {
                    sets.union(offsets[f] + (i + 1) % n, offsets[g] + gb);
                }
            }
        }
    }

    let mut claimed: FxHashSet<u32> = FxHashSet::default();
    let mut copy_of_root: FxHashMap<usize, u32> = FxHashMap::default();
    let mut copies: Vec<(u32, u32)> = Vec::new();
    let mut next_index = mesh.positions.len() as u32;
    let mut rewritten: Vec<(usize, usize, u32)> = Vec::new();

    for (f, face) in mesh.faces.iter().enumerate() {
        for (i, &v) in face.vertices.iter().enumerate() {
            if !touched.contains(&v) {
                continue;
            }
            let root = sets.find(offsets[f] + i);
            let target = *copy_of_root.entry(root).or_insert_with(|| {
                if claimed.insert(v) {
                    v
                } else {
                    let copy = next_index;
                    next_index += 1;
                    copies.push((v, copy));
                    copy
                }
            });
            if target != v {
                rewritten.push((f, i, target));
            }
        }
    }

    for &(original, _) in &copies {
        let p = mesh.positions[original as usize];
        let n = mesh.normals[original as usize];
        let v = mesh.add_vertex(p);
        mesh.normals[v as usize] = n;
    }
    for (f, i, target) in rewritten {
        mesh.faces[f].vertices[i] = target;
    }
    for members in mesh.vertex_groups.values_mut() {
        let extra: Vec<u32> = copies
            .iter()
            .filter(|(original, _)| members.contains(original))
            .map(|&(_, copy)| copy)
            .collect();
        members.extend(extra);
    }
}
