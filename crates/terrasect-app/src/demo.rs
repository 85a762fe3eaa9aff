//! Procedural demo scene: an fBm terrain scattered with rocks.

use std::f32::consts::TAU;

use glam::{Affine3A, UVec2, Vec2, Vec3};
use noise::{NoiseFn, Simplex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use terrasect_mesh::{cuboid, heightfield};
use terrasect_scene::{DeformModifier, Material, Modifier, ObjectId, ParticleSystem, Scene};

/// Parameters of the demo terrain.
#[derive(Clone, Debug)]
pub struct DemoParams {
    pub seed: u64,
    /// Footprint of the terrain.
    pub extent: Vec2,
    /// Quads along each axis.
    pub segments: UVec2,
    pub octaves: u32,
    /// Frequency of the first octave.
    pub base_frequency: f64,
    /// Height contribution of the first octave.
    pub amplitude: f64,
    /// Rock instances scattered over the terrain.
    pub rocks: usize,
}

impl Default for DemoParams {
    fn default() -> Self {
        Self {
            seed: 7,
            extent: Vec2::splat(128.0),
            segments: UVec2::splat(64),
            octaves: 5,
            base_frequency: 0.015,
            amplitude: 6.0,
            rocks: 200,
        }
    }
}

/// Fractal Brownian motion over simplex noise.
struct Fbm {
    noise: Simplex,
    octaves: u32,
    base_frequency: f64,
    amplitude: f64,
}

impl Fbm {
    fn new(params: &DemoParams) -> Self {
        Self {
            noise: Simplex::new(params.seed as u32),
            octaves: params.octaves,
            base_frequency: params.base_frequency,
            amplitude: params.amplitude,
        }
    }

    fn sample(&self, x: f32, y: f32) -> f32 {
        let mut total = 0.0;
        let mut frequency = self.base_frequency;
        let mut amplitude = self.amplitude;
        for _ in 0..self.octaves {
            total += self.noise.get([x as f64 * frequency, y as f64 * frequency]) * amplitude;
            frequency *= 2.0;
            amplitude *= 0.5;
        }
        total as f32
    }
}

/// Adds the demo terrain and its rock prototype to `scene`; returns the terrain.
///
/// The terrain carries a vertical exaggeration in its modifier stack and a
/// particle system scattering the rock over its surface.
pub fn build_scene(scene: &mut Scene, params: &DemoParams) -> ObjectId {
    let grass = scene.add_material(Material::new("Grass"));
    let stone = scene.add_material(Material::new("Stone"));

    let fbm = Fbm::new(params);
    let mut mesh = heightfield("TerrainMesh", params.extent, params.segments, |x, y| {
        fbm.sample(x, y)
    });
    mesh.ensure_material(grass);
    let terrain = scene.add_object("Terrain", Some(mesh));

    let mut rock_mesh = cuboid("RockMesh", Vec3::new(0.6, 0.4, 0.3));
    rock_mesh.ensure_material(stone);
    let rock = scene.add_object("Rock", Some(rock_mesh));
    if let Ok(object) = scene.object_mut(rock) {
        object.display.hide = true;
        object.display.hide_render = true;
    }

    let exaggeration = 1.25;
    let instances = scatter(params, |x, y| fbm.sample(x, y) * exaggeration);
    if let Ok(object) = scene.object_mut(terrain) {
        object.modifiers.push(Modifier::Deform(DeformModifier {
            name: "Exaggerate".to_string(),
            transform: Affine3A::from_scale(Vec3::new(1.0, 1.0, exaggeration)),
        }));
        object
            .modifiers
            .push(Modifier::ParticleSystem(ParticleSystem::new("Rocks", rock, instances)));
    }
    terrain
}

/// Random rock placements on the surface `height`, deterministic per seed.
fn scatter(params: &DemoParams, height: impl Fn(f32, f32) -> f32) -> Vec<Affine3A> {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let half = params.extent * 0.5;
    (0..params.rocks)
        .map(|_| {
            let x = rng.random_range(-half.x..half.x);
            let y = rng.random_range(-half.y..half.y);
            let yaw = rng.random_range(0.0..TAU);
            let scale = rng.random_range(0.5..1.5);
            Affine3A::from_scale_rotation_translation(
                Vec3::splat(scale),
                glam::Quat::from_rotation_z(yaw),
                Vec3::new(x, y, height(x, y)),
            )
        })
        .collect()
}

/// Camera positions sweeping diagonally across the terrain at `altitude`.
pub fn camera_path(extent: Vec2, altitude: f32, steps: usize) -> Vec<Vec3> {
    let start = (-extent * 0.75).extend(altitude);
    let end = (extent * 0.75).extend(altitude);
    let steps = steps.max(2);
    (0..steps)
        .map(|i| start.lerp(end, i as f32 / (steps - 1) as f32))
        .collect()
}
