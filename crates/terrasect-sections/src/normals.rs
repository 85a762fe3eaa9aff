//! Shading-normal capture and restore keyed by quantised XY position.
//!
//! Cutting and decimation never move a vertex in the XY plane, so a vertex's
//! rounded planar position identifies it across every mesh derived from the
//! same base. Normals captured from the base are written back onto the
//! derived meshes wherever the key matches; other vertices keep their
//! computed normals.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Vec2, Vec3};
use terrasect_mesh::Mesh;

use crate::error::NormalsError;

/// Rounded planar position: `(round(x * 10^d), round(y * 10^d))`.
pub type QuantKey = (i64, i64);

/// Exclusive bound on the magnitude of a scaled coordinate (2^63).
const KEY_LIMIT: f64 = i64::MAX as f64;

fn key_scale(digits: u32) -> f64 {
    10f64.powi(i32::try_from(digits).unwrap_or(i32::MAX))
}

fn fits_key(scaled: f64) -> bool {
    scaled.is_finite() && scaled.abs() < KEY_LIMIT
}

fn quantize_axis(value: f32, digits: u32) -> Result<i64, NormalsError> {
    let scaled = (f64::from(value) * key_scale(digits)).round();
    if fits_key(scaled) {
        Ok(scaled as i64)
    } else {
        Err(NormalsError::KeyOverflow { value, digits })
    }
}

/// Quantises a planar position to `digits` decimals.
///
/// Fails when a scaled coordinate does not fit an `i64`, so two distinct
/// positions never share a saturated key.
pub fn quantize(point: Vec2, digits: u32) -> Result<QuantKey, NormalsError> {
    Ok((quantize_axis(point.x, digits)?, quantize_axis(point.y, digits)?))
}

/// Checks that every coordinate within `extent` of the keying origin can be
/// quantised to `digits` decimals.
pub fn check_extent(extent: f32, digits: u32) -> Result<(), NormalsError> {
    if fits_key(f64::from(extent.abs()) * key_scale(digits)) {
        Ok(())
    } else {
        Err(NormalsError::ExtentOverflow { extent, digits })
    }
}

/// Normals by quantised position, all keys quantised to the same digits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalTable {
    digits: u32,
    entries: BTreeMap<QuantKey, Vec3>,
}

impl NormalTable {
    /// Creates an empty table quantising to `digits` decimals.
    pub fn new(digits: u32) -> Self {
        Self {
            digits,
            entries: BTreeMap::new(),
        }
    }

    /// Decimal digits the keys are quantised to.
    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the table holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records `normal` for `key`, replacing any earlier value.
    pub fn insert(&mut self, key: QuantKey, normal: Vec3) {
        self.entries.insert(key, normal);
    }

    /// Normal stored for `key`.
    pub fn get(&self, key: &QuantKey) -> Option<Vec3> {
        self.entries.get(key).copied()
    }

    /// Normal stored for the key of a planar position.
    pub fn lookup(&self, point: Vec2) -> Result<Option<Vec3>, NormalsError> {
        Ok(self.get(&quantize(point, self.digits)?))
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&QuantKey, &Vec3)> + '_ {
        self.entries.iter()
    }
}

/// Captures the normals of `mesh`, whose local origin sits at `origin` in the
/// keying space.
///
/// Vertices are visited per material slot; a key seen twice keeps the last
/// normal visited. With a `mask`, only the listed vertices are captured.
pub fn capture(
    mesh: &Mesh,
    origin: Vec3,
    digits: u32,
    mask: Option<&BTreeSet<u32>>,
) -> Result<NormalTable, NormalsError> {
    let mut table = NormalTable::new(digits);
    for (_, vertices) in mesh.vertices_by_material() {
        for v in vertices {
            if mask.is_some_and(|m| !m.contains(&v)) {
                continue;
            }
            let key = quantize((origin + mesh.positions[v as usize]).truncate(), digits)?;
            table.insert(key, mesh.normals[v as usize]);
        }
    }
    Ok(table)
}

/// Overwrites the normals of vertices whose key is in `table`.
///
/// `origin` places the mesh in the keying space as in [`capture`]. With a
/// `mask`, only the listed vertices are considered. Returns how many normals
/// were restored.
pub fn restore(
    mesh: &mut Mesh,
    origin: Vec3,
    table: &NormalTable,
    mask: Option<&BTreeSet<u32>>,
) -> Result<usize, NormalsError> {
    let mut restored = 0;
    for (v, position) in mesh.positions.iter().enumerate() {
        if mask.is_some_and(|m| !m.contains(&(v as u32))) {
            continue;
        }
        if let Some(normal) = table.lookup((origin + *position).truncate())? {
            mesh.normals[v] = normal;
            restored += 1;
        }
    }
    Ok(restored)
}
