//! Edge-collapse decimation and limited dissolve.
//!
//! Both operations use half-edge collapses: a vertex is merged into one of its
//! neighbours and takes that neighbour's position, so every surviving vertex
//! keeps its original position. Collapses are ordered by quadric error.
//! Locked vertices are never merged away, never moved, and never left without
//! faces.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use glam::{DVec3, Vec3};
use tracing::debug;

use crate::mesh::Mesh;
use crate::topology::{boundary_loop, triangulate};

/// Minimum cosine between a face normal before and after a collapse.
const FLIP_COS: f32 = 0.0;

/// Parameters for [`decimate_collapse`].
#[derive(Clone, Debug)]
pub struct DecimateOptions<'a> {
    /// Fraction of triangles to keep, in `[0, 1]`.
    pub ratio: f32,
    /// Vertices excluded from collapse.
    pub protected: Option<&'a BTreeSet<u32>>,
    /// Triangulate polygons before collapsing. When `false`, non-triangle
    /// faces are left alone and their vertices are locked.
    pub triangulate: bool,
}

impl<'a> DecimateOptions<'a> {
    /// Collapse to `ratio` without protection or triangulation.
    pub fn ratio(ratio: f32) -> Self {
        Self {
            ratio,
            protected: None,
            triangulate: false,
        }
    }
}

/// Summary of a decimation run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecimateStats {
    /// Triangle count before collapsing.
    pub triangles_before: usize,
    /// Triangle count after collapsing.
    pub triangles_after: usize,
    /// Number of successful collapses.
    pub collapses: usize,
}

/// Symmetric 4x4 error quadric stored as its upper triangle.
#[derive(Clone, Copy, Debug, Default)]
struct Quadric([f64; 10]);

impl Quadric {
    fn from_plane(n: DVec3, d: f64) -> Self {
        Self([
            n.x * n.x,
            n.x * n.y,
            n.x * n.z,
            n.x * d,
            n.y * n.y,
            n.y * n.z,
            n.y * d,
            n.z * n.z,
            n.z * d,
            d * d,
        ])
    }

    fn add(&mut self, other: &Quadric) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }

    fn error(&self, p: DVec3) -> f64 {
        let q = &self.0;
        q[0] * p.x * p.x
            + 2.0 * q[1] * p.x * p.y
            + 2.0 * q[2] * p.x * p.z
            + 2.0 * q[3] * p.x
            + q[4] * p.y * p.y
            + 2.0 * q[5] * p.y * p.z
            + 2.0 * q[6] * p.y
            + q[7] * p.z * p.z
            + 2.0 * q[8] * p.z
            + q[9]
    }
}

#[derive(Debug)]
struct Candidate {
    cost: f64,
    from: u32,
    to: u32,
    stamp: (u32, u32),
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost; vertex indices break ties deterministically.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.from.cmp(&self.from))
            .then_with(|| other.to.cmp(&self.to))
    }
}

/// Working state for a sequence of half-edge collapses on the triangles of a mesh.
struct Collapser<'m> {
    mesh: &'m mut Mesh,
    locked: Vec<bool>,
    removed: Vec<bool>,
    alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    quadrics: Vec<Quadric>,
    version: Vec<u32>,
    live_triangles: usize,
    collapses: usize,
}

impl<'m> Collapser<'m> {
    fn new(mesh: &'m mut Mesh, mut locked: Vec<bool>) -> Self {
        let n = mesh.positions.len();
        let mut vertex_faces = vec![Vec::new(); n];
        let mut quadrics = vec![Quadric::default(); n];
        let mut live_triangles = 0;

        for (f, face) in mesh.faces.iter().enumerate() {
            if !face.is_triangle() {
                for &v in &face.vertices {
                    locked[v as usize] = true;
                }
                continue;
            }
            live_triangles += 1;
            let normal = mesh.face_normal(face).as_dvec3();
            let len = normal.length();
            let plane = if len > 1e-12 {
                let n = normal / len;
                let p0 = mesh.positions[face.vertices[0] as usize].as_dvec3();
                Some(Quadric::from_plane(n, -n.dot(p0)))
            } else {
                None
            };
            for &v in &face.vertices {
                vertex_faces[v as usize].push(f);
                if let Some(q) = &plane {
                    quadrics[v as usize].add(q);
                }
            }
        }

        Self {
            alive: vec![true; mesh.faces.len()],
            removed: vec![false; n],
            version: vec![0; n],
            mesh,
            locked,
            vertex_faces,
            quadrics,
            live_triangles,
            collapses: 0,
        }
    }

    fn faces_of(&self, v: u32) -> impl Iterator<Item = usize> + '_ {
        self.vertex_faces[v as usize]
            .iter()
            .copied()
            .filter(|&f| self.alive[f])
    }

    fn neighbours(&self, v: u32) -> BTreeSet<u32> {
        self.faces_of(v)
            .flat_map(|f| self.mesh.faces[f].vertices.iter().copied())
            .filter(|&w| w != v)
            .collect()
    }

    fn candidate(&self, from: u32, to: u32) -> Option<Candidate> {
        if self.locked[from as usize] || self.removed[from as usize] || self.removed[to as usize] {
            return None;
        }
        let mut q = self.quadrics[from as usize];
        q.add(&self.quadrics[to as usize]);
        Some(Candidate {
            cost: q.error(self.mesh.positions[to as usize].as_dvec3()),
            from,
            to,
            stamp: (self.version[from as usize], self.version[to as usize]),
        })
    }

    fn is_current(&self, c: &Candidate) -> bool {
        !self.removed[c.from as usize]
            && !self.removed[c.to as usize]
            && c.stamp == (self.version[c.from as usize], self.version[c.to as usize])
    }

    /// Merges `from` into `to`. Returns `false` (leaving the mesh untouched)
    /// when the collapse would flip a face, break the link condition or strand
    /// a locked vertex.
    fn try_collapse(&mut self, from: u32, to: u32) -> bool {
        if from == to || self.locked[from as usize] {
            return false;
        }
        let (dying, surviving): (Vec<usize>, Vec<usize>) = self
            .faces_of(from)
            .partition(|&f| self.mesh.faces[f].vertices.contains(&to));
        if dying.is_empty() {
            return false;
        }

        // Link condition: the shared neighbours are exactly the apexes of the
        // collapsing triangles.
        let apexes: BTreeSet<u32> = dying
            .iter()
            .flat_map(|&f| self.mesh.faces[f].vertices.iter().copied())
            .filter(|&w| w != from && w != to)
            .collect();
        let shared = self.neighbours(from).intersection(&self.neighbours(to)).count();
        if shared != apexes.len() {
            return false;
        }

        let target = self.mesh.positions[to as usize];
        for &f in &surviving {
            let face = &self.mesh.faces[f];
            let before = self.mesh.face_normal(face);
            let corners: Vec<Vec3> = face
                .vertices
                .iter()
                .map(|&v| {
                    if v == from {
                        target
                    } else {
                        self.mesh.positions[v as usize]
                    }
                })
                .collect();
            let after = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
            match (before.try_normalize(), after.try_normalize()) {
                (Some(b), Some(a)) if b.dot(a) > FLIP_COS => {}
                _ => return false,
            }
        }

        for &w in apexes.iter().chain(std::iter::once(&to)) {
            if !self.locked[w as usize] {
                continue;
            }
            let remaining = self.faces_of(w).filter(|f| !dying.contains(f)).count()
                + if w == to { surviving.len() } else { 0 };
            if remaining == 0 {
                return false;
            }
        }

        for &f in &dying {
            self.alive[f] = false;
            self.live_triangles -= 1;
        }
        for &f in &surviving {
            for v in &mut self.mesh.faces[f].vertices {
                if *v == from {
                    *v = to;
                }
            }
            self.vertex_faces[to as usize].push(f);
        }
        let q = self.quadrics[from as usize];
        self.quadrics[to as usize].add(&q);
        self.removed[from as usize] = true;
        self.vertex_faces[from as usize].clear();
        self.version[to as usize] += 1;
        for w in self.neighbours(to) {
            self.version[w as usize] += 1;
        }
        self.collapses += 1;
        true
    }

    fn push_around(&self, v: u32, heap: &mut BinaryHeap<Candidate>) {
        for w in self.neighbours(v) {
            heap.extend(self.candidate(v, w));
            heap.extend(self.candidate(w, v));
        }
    }

    /// Collapses cheapest-first until at most `target` triangles remain or no
    /// legal collapse is left.
    fn reduce_to(&mut self, target: usize) {
        let mut heap = BinaryHeap::new();
        for v in 0..self.mesh.positions.len() as u32 {
            for w in self.neighbours(v) {
                heap.extend(self.candidate(v, w));
            }
        }
        while self.live_triangles > target {
            let Some(c) = heap.pop() else {
                break;
            };
            if !self.is_current(&c) {
                continue;
            }
            if self.try_collapse(c.from, c.to) {
                self.push_around(c.to, &mut heap);
            }
        }
    }

    /// Drops dead faces and merged vertices, then refreshes normals.
    fn finish(self) -> usize {
        let Self {
            mesh,
            alive,
            collapses,
            ..
        } = self;
        let mut index = 0;
        mesh.faces.retain(|_| {
            let keep = alive[index];
            index += 1;
            keep
        });
        mesh.compact();
        mesh.recompute_normals();
        collapses
    }
}

/// Collapse-decimates the mesh's triangles down to `ratio` of their count.
///
/// Protected vertices are excluded from collapse: they keep their index
/// identity (up to compaction), their position, and at least one face.
pub fn decimate_collapse(mesh: &mut Mesh, options: &DecimateOptions<'_>) -> DecimateStats {
    if options.triangulate {
        triangulate(mesh);
    }
    let triangles_before = mesh.faces.iter().filter(|f| f.is_triangle()).count();
    let ratio = options.ratio.clamp(0.0, 1.0);
    if ratio >= 1.0 || triangles_before == 0 {
        return DecimateStats {
            triangles_before,
            triangles_after: triangles_before,
            collapses: 0,
        };
    }
    let target = (triangles_before as f32 * ratio).ceil() as usize;

    let mut locked = vec![false; mesh.positions.len()];
    if let Some(protected) = options.protected {
        for &v in protected {
            if let Some(slot) = locked.get_mut(v as usize) {
                *slot = true;
            }
        }
    }

    let mut collapser = Collapser::new(mesh, locked);
    collapser.reduce_to(target);
    let collapses = collapser.finish();

    let stats = DecimateStats {
        triangles_before,
        triangles_after: mesh.faces.iter().filter(|f| f.is_triangle()).count(),
        collapses,
    };
    debug!(
        "Decimated {}: {} -> {} triangles in {} collapses",
        mesh.name, stats.triangles_before, stats.triangles_after, stats.collapses
    );
    stats
}

/// Dissolves vertices whose surrounding faces are flat within `angle_limit`
/// radians and share one material.
///
/// Boundary vertices are kept. Returns the number of dissolved vertices.
pub fn dissolve_limited(mesh: &mut Mesh, angle_limit: f32) -> usize {
    let cos_limit = angle_limit.clamp(0.0, std::f32::consts::PI).cos();
    let mut locked = vec![false; mesh.positions.len()];
    for v in boundary_loop(mesh) {
        locked[v as usize] = true;
    }

    let mut collapser = Collapser::new(mesh, locked);
    loop {
        let mut changed = false;
        for v in 0..collapser.mesh.positions.len() as u32 {
            if collapser.removed[v as usize] || collapser.locked[v as usize] {
                continue;
            }
            if !is_flat(&collapser, v, cos_limit) {
                continue;
            }
            for w in collapser.neighbours(v) {
                if collapser.try_collapse(v, w) {
                    changed = true;
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }
    let dissolved = collapser.finish();
    debug!("Dissolved {dissolved} vertices of {}", mesh.name);
    dissolved
}

fn is_flat(collapser: &Collapser<'_>, v: u32, cos_limit: f32) -> bool {
    let mut reference: Option<(Vec3, u16)> = None;
    for f in collapser.faces_of(v) {
        let face = &collapser.mesh.faces[f];
        let Some(n) = collapser.mesh.face_normal(face).try_normalize() else {
            return false;
        };
        match reference {
            None => reference = Some((n, face.material)),
            Some((r, material)) => {
                if material != face.material || r.dot(n) < cos_limit {
                    return false;
                }
            }
        }
    }
    reference.is_some()
}
