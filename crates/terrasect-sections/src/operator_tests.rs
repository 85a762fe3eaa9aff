//! End-to-end generator scenarios on procedural terrain.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use glam::{Affine3A, UVec2, Vec2, Vec3};
use terrasect_config::{GenerationMode, NumberMode, OutputMode, SectionsConfig};
use terrasect_mesh::{Mesh, ReferenceKernel, cuboid, heightfield};
use terrasect_scene::{
    DrawType, Material, Modifier, ObjectId, ParticleSystem, PhysicsType, Scene, Selection,
};

use crate::error::{NormalsError, SectionsError, SelectionError};
use crate::names::{BOUNDARY_GROUP, MARKER_PROPERTY, UPDATE_ENTRY};
use crate::normals::quantize;
use crate::operator::{Action, ExecuteOutcome, GenerationReport, LodSections};
use crate::record::NormalRecord;
use crate::runtime::SectionsRuntime;

fn config(data_dir: &Path) -> SectionsConfig {
    let mut config = SectionsConfig::default();
    config.generation.number = [2, 2];
    config.output.data_dir = data_dir.to_path_buf();
    config
}

/// Adds a terrain whose heights are odd in x, so its bounds centre lies at z = 0.
fn add_terrain(scene: &mut Scene, name: &str, extent: Vec2, segments: UVec2) -> ObjectId {
    let grass = match scene.find_material("Grass") {
        Some(id) => id,
        None => scene.add_material(Material::new("Grass")),
    };
    let mut mesh = heightfield(format!("{name}Mesh"), extent, segments, |x, y| {
        0.5 * (0.7 * x).sin() * (0.7 * y).cos()
    });
    mesh.ensure_material(grass);
    scene.add_object(name, Some(mesh))
}

fn generate(scene: &mut Scene, source: ObjectId, config: SectionsConfig) -> GenerationReport {
    let operator = LodSections::new(config);
    match operator
        .execute(scene, &ReferenceKernel, source, Action::Update)
        .unwrap()
    {
        ExecuteOutcome::Generated(report) => report,
        ExecuteOutcome::Cleared { .. } => panic!("expected a generation run"),
    }
}

fn world_position(scene: &Scene, id: ObjectId) -> Vec3 {
    Vec3::from(scene.world_transform(id).unwrap().translation)
}

#[test]
fn test_two_by_two_sections_of_square_terrain() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    let report = generate(&mut scene, source, config(dir.path()));

    assert_eq!(report.counts, UVec2::new(2, 2));
    assert_eq!(report.size, Vec2::splat(8.0));
    let names: Vec<&str> = report
        .sections
        .iter()
        .map(|s| scene.object(s.object).unwrap().name.as_str())
        .collect();
    assert_eq!(names, ["Ground_SECT1", "Ground_SECT2", "Ground_SECT3", "Ground_SECT4"]);

    let expected = [
        Vec3::new(-4.0, -4.0, 0.0),
        Vec3::new(4.0, -4.0, 0.0),
        Vec3::new(-4.0, 4.0, 0.0),
        Vec3::new(4.0, 4.0, 0.0),
    ];
    for (section, want) in report.sections.iter().zip(expected) {
        let got = world_position(&scene, section.object);
        assert!(got.abs_diff_eq(want, 1e-4), "section at {got}, expected {want}");
        let dims = scene.mesh(section.object).unwrap().dimensions();
        assert!((dims.x - 8.0).abs() < 1e-4 && (dims.y - 8.0).abs() < 1e-4);
        assert_eq!(scene.object(section.object).unwrap().parent, Some(source));
    }
    assert!(scene.find("Ground_BASE").is_none());
    assert!(report.message.starts_with("Finished generating 4 (2 X 2) sections in"));
}

#[test]
fn test_by_size_automatic_covers_wide_terrain() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::new(17.0, 16.0), UVec2::new(17, 16));
    let mut config = config(dir.path());
    config.generation.mode = GenerationMode::BySize;
    config.generation.size = [8.0, 8.0];
    config.generation.number_mode = NumberMode::Automatic;

    let report = generate(&mut scene, source, config);
    assert_eq!(report.counts, UVec2::new(3, 2));
    assert_eq!(report.sections.len(), 6);
    let ids: Vec<String> = report.sections.iter().map(|s| s.cell.to_string()).collect();
    assert_eq!(ids, ["1", "2", "3", "4", "5", "6"]);
}

#[test]
fn test_particle_merges_only_into_its_cell() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    let rock_material = scene.add_material(Material::new("Rock"));
    let mut rock_mesh = cuboid("RockMesh", Vec3::splat(0.25));
    rock_mesh.ensure_material(rock_material);
    let rock = scene.add_object("Rock", Some(rock_mesh));
    scene
        .object_mut(source)
        .unwrap()
        .modifiers
        .push(Modifier::ParticleSystem(ParticleSystem::new(
            "Rocks",
            rock,
            vec![Affine3A::from_translation(Vec3::new(-4.0, 4.0, 0.0))],
        )));

    let report = generate(&mut scene, source, config(dir.path()));
    assert_eq!(report.particles, 1);
    let rock_lod = scene.find_material("Rock_LOD").unwrap();

    for section in &report.sections {
        let in_cell_three = section.cell.to_string() == "3";
        let mesh = scene.mesh(section.object).unwrap();
        assert_eq!(mesh.materials.contains(&rock_material), in_cell_three);
        for &level in &section.levels {
            let slots = &scene.mesh(level).unwrap().materials;
            assert_eq!(slots.contains(&rock_lod), in_cell_three);
        }
    }

    let Modifier::ParticleSystem(system) = &scene.object(source).unwrap().modifiers[0] else {
        panic!("particle system expected");
    };
    assert!(!system.show_viewport && !system.show_render);
}

#[test]
fn test_double_clear_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    scene.object_mut(source).unwrap().display.draw_type = DrawType::Wire;
    let before = scene.object_count();
    let before_display = scene.object(source).unwrap().display;

    generate(&mut scene, source, config(dir.path()));
    let display = scene.object(source).unwrap().display;
    assert_eq!(display.draw_type, DrawType::Bounds);
    assert!(display.hide_render);
    assert!(scene.object_count() > before);

    let operator = LodSections::new(config(dir.path()));
    let outcome = operator
        .execute(&mut scene, &ReferenceKernel, source, Action::Clear)
        .unwrap();
    // Four sections with four LOD children each.
    assert!(matches!(outcome, ExecuteOutcome::Cleared { removed: 20 }));
    assert_eq!(scene.object_count(), before);
    let object = scene.object(source).unwrap();
    assert_eq!(object.display, before_display);
    assert!(object.property(MARKER_PROPERTY).is_none());
    assert!(!object.logic.iter().any(|e| e == UPDATE_ENTRY));

    assert_eq!(LodSections::clear(&mut scene, source).unwrap(), 0);
    assert_eq!(scene.object_count(), before);
    assert_eq!(scene.object(source).unwrap().display, before_display);
}

#[test]
fn test_regenerating_replaces_sections() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    generate(&mut scene, source, config(dir.path()));
    let count = scene.object_count();
    let report = generate(&mut scene, source, config(dir.path()));
    assert_eq!(scene.object_count(), count);
    assert_eq!(scene.object(report.sections[0].object).unwrap().name, "Ground_SECT1");
    // The display flags saved by the first run survive the second.
    let saved = scene.object(source).unwrap().saved_display.unwrap();
    assert_eq!(saved.draw_type, DrawType::Textured);
    assert!(scene.find_material("Grass_LOD").is_some());
    assert!(scene.find_material("Grass_LOD.001").is_none());
}

#[test]
fn test_boundary_vertices_unmoved_in_every_level() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    let mut config = config(dir.path());
    config.output.mode = OutputMode::Sections;
    let report = generate(&mut scene, source, config);
    assert!(report.record.is_none());

    let boundary = |mesh: &Mesh| -> BTreeSet<[u32; 3]> {
        mesh.vertex_group(BOUNDARY_GROUP)
            .unwrap()
            .iter()
            .map(|&v| mesh.positions[v as usize].to_array().map(f32::to_bits))
            .collect()
    };
    for section in &report.sections {
        let expected = boundary(scene.mesh(section.object).unwrap());
        assert!(!expected.is_empty());
        assert_eq!(section.levels.len(), 3);
        for &level in &section.levels {
            assert_eq!(boundary(scene.mesh(level).unwrap()), expected);
        }
    }
}

/// Adds a terrain that is hilly for x < 0 and perfectly flat for x >= 0.
fn add_half_flat_terrain(scene: &mut Scene, name: &str) -> ObjectId {
    let grass = scene.add_material(Material::new("Grass"));
    let height = |x: f32, y: f32| {
        if x < 0.0 {
            0.5 * (0.7 * x).sin() * (0.7 * y).cos()
        } else {
            0.0
        }
    };
    let mut mesh = heightfield(format!("{name}Mesh"), Vec2::splat(16.0), UVec2::splat(16), height);
    mesh.ensure_material(grass);
    scene.add_object(name, Some(mesh))
}

#[test]
fn test_dissolve_thins_flat_ground_before_cutting() {
    let dir = tempfile::tempdir().unwrap();
    let run = |dissolve: bool| {
        let mut scene = Scene::new();
        let source = add_half_flat_terrain(&mut scene, "Plain");
        let mut config = config(dir.path());
        config.output.mode = OutputMode::Sections;
        config.dissolve.enabled = dissolve;
        let report = generate(&mut scene, source, config);
        (scene, report)
    };
    let (plain_scene, plain) = run(false);
    let (scene, report) = run(true);

    assert_eq!(report.sections.len(), 4);
    assert_eq!(report.counts, UVec2::new(2, 2));
    let vertices = |scene: &Scene, report: &GenerationReport| -> usize {
        report
            .sections
            .iter()
            .map(|s| scene.mesh(s.object).unwrap().vertex_count())
            .sum()
    };
    assert!(vertices(&scene, &report) < vertices(&plain_scene, &plain));

    // Sections are 8 x 8 and centred on their cell, so every seam vertex
    // sits on a cell edge; decimated levels keep them in place.
    for section in &report.sections {
        let mesh = scene.mesh(section.object).unwrap();
        let boundary = mesh.vertex_group(BOUNDARY_GROUP).unwrap();
        assert!(!boundary.is_empty());
        let seam: BTreeSet<[u32; 3]> = boundary
            .iter()
            .map(|&v| mesh.positions[v as usize])
            .inspect(|p| {
                let on_edge = (p.x.abs() - 4.0).abs() < 1e-4 || (p.y.abs() - 4.0).abs() < 1e-4;
                assert!(on_edge, "seam vertex {p} off the cell edge");
            })
            .map(|p| p.to_array().map(f32::to_bits))
            .collect();
        for &level in &section.levels {
            let level_mesh = scene.mesh(level).unwrap();
            let level_seam: BTreeSet<[u32; 3]> = level_mesh
                .vertex_group(BOUNDARY_GROUP)
                .unwrap()
                .iter()
                .map(|&v| level_mesh.positions[v as usize].to_array().map(f32::to_bits))
                .collect();
            assert_eq!(level_seam, seam);
        }
    }
}

#[test]
fn test_exact_normals_restored_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    let mut config = config(dir.path());
    config.output.approximate = false;
    let report = generate(&mut scene, source, config);
    assert!(report.record.is_some());

    let record = NormalRecord::load(dir.path(), "Ground").unwrap();
    assert_eq!(record.digits(), 0);

    let mut runtime = SectionsRuntime::new(dir.path());
    for section in &report.sections {
        for normal in &mut scene.mesh_mut(section.object).unwrap().normals {
            *normal = Vec3::NEG_Z;
        }
    }
    assert!(runtime.on_load(&mut scene, source).unwrap() > 0);

    for section in &report.sections {
        let name = &scene.object(section.object).unwrap().name;
        let table = record.get(name).unwrap();
        assert_eq!(table.digits(), 0);
        let mesh = scene.mesh(section.object).unwrap();
        let mut seams = 0;
        for (v, position) in mesh.positions.iter().enumerate() {
            match table.get(&quantize(position.truncate(), 0).unwrap()) {
                Some(normal) => {
                    seams += 1;
                    assert_eq!(mesh.normals[v], normal);
                }
                None => assert_eq!(mesh.normals[v], Vec3::NEG_Z),
            }
        }
        assert!(seams > 0, "no seam normals restored on {name}");
    }
}

#[test]
fn test_footprint_too_wide_for_digits_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Vast", Vec2::splat(20000.0), UVec2::splat(4));
    let before = scene.object_count();
    let mut config = config(dir.path());
    config.output.digits = 15;

    let result =
        LodSections::new(config).execute(&mut scene, &ReferenceKernel, source, Action::Update);
    assert!(matches!(
        result,
        Err(SectionsError::Normals(NormalsError::ExtentOverflow { digits: 15, .. }))
    ));
    assert_eq!(scene.object_count(), before);
    assert!(scene.find("Vast_BASE").is_none());
    assert!(scene.object(source).unwrap().properties.is_empty());
    assert!(!NormalRecord::path(dir.path(), "Vast").exists());
}

#[test]
fn test_lod_chain_shape() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    let report = generate(&mut scene, source, config(dir.path()));
    assert_eq!(report.lod_levels, 4);

    let terminals: Vec<&Arc<Mesh>> = report
        .sections
        .iter()
        .map(|s| {
            scene
                .object(s.terminal.unwrap())
                .unwrap()
                .mesh
                .as_ref()
                .unwrap()
        })
        .collect();
    assert!(terminals.iter().all(|&m| Arc::ptr_eq(m, terminals[0])));
    assert!(terminals[0].is_empty());
    assert_eq!(terminals[0].name, "GroundMesh_SECT0.3");

    let grass_lod = scene.find_material("Grass_LOD").unwrap();
    for section in &report.sections {
        let object = scene.object(section.object).unwrap();
        assert_eq!(object.physics, PhysicsType::NoCollision);
        let levels = &object.lod_levels;
        for pair in levels.windows(2) {
            assert!(pair[1].distance > pair[0].distance);
            assert!(pair[1].ratio < pair[0].ratio);
        }
        for child in section.lod_objects() {
            assert!(scene.object(child).unwrap().display.hide);
        }
        for &level in &section.levels {
            assert_eq!(scene.mesh(level).unwrap().materials, [grass_lod]);
        }
    }
}

#[test]
fn test_invoke_errors_leave_scene_untouched() {
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    let empty = scene.add_object("Empty", None);
    let before = scene.object_count();
    let operator = LodSections::default();

    assert_eq!(operator.invoke(&scene, &Selection::single(source)), Ok(source));
    assert_eq!(
        operator.invoke(&scene, &Selection::single(empty)),
        Err(SelectionError::WrongObject)
    );
    let editable_not_active = Selection {
        active: None,
        selected: vec![source],
        editable: vec![source],
    };
    assert_eq!(
        operator.invoke(&scene, &editable_not_active),
        Err(SelectionError::NoActiveObjectSelected)
    );
    let hidden_layer = Selection {
        active: Some(source),
        selected: vec![source],
        editable: vec![],
    };
    assert_eq!(operator.invoke(&scene, &hidden_layer), Err(SelectionError::WrongLayer));
    assert_eq!(
        operator.invoke(&scene, &Selection::default()),
        Err(SelectionError::NoObjectSelected)
    );

    assert_eq!(scene.object_count(), before);
    assert!(scene.object(source).unwrap().properties.is_empty());
}

#[test]
fn test_invalid_options_rejected_before_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    let before = scene.object_count();
    let mut config = config(dir.path());
    config.lod.factor = 2.0;

    let result =
        LodSections::new(config).execute(&mut scene, &ReferenceKernel, source, Action::Update);
    assert!(matches!(result, Err(SectionsError::Config(_))));
    assert_eq!(scene.object_count(), before);
}

#[test]
fn test_base_removed_when_generation_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = scene.add_object("Flat", Some(Mesh::new("FlatMesh")));
    let before = scene.object_count();

    let result = LodSections::new(config(dir.path())).execute(
        &mut scene,
        &ReferenceKernel,
        source,
        Action::Update,
    );
    assert!(matches!(result, Err(SectionsError::EmptyMesh(name)) if name == "Flat"));
    assert_eq!(scene.object_count(), before);
    assert!(scene.find("Flat_BASE").is_none());
}

#[test]
fn test_exported_normals_restored_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let source = add_terrain(&mut scene, "Ground", Vec2::splat(16.0), UVec2::splat(16));
    let report = generate(&mut scene, source, config(dir.path()));

    let path = report.record.clone().unwrap();
    assert_eq!(path, NormalRecord::path(dir.path(), "Ground"));
    let object = scene.object(source).unwrap();
    assert_eq!(object.property(MARKER_PROPERTY).map(|p| p.as_bool()), Some(true));
    assert!(object.logic.iter().any(|e| e == UPDATE_ENTRY));

    let record = NormalRecord::load(dir.path(), "Ground").unwrap();
    assert_eq!(record.digits(), 2);
    // Every section and decimated level is recorded.
    assert_eq!(record.len(), 4 * 4);

    let section = report.sections[0].object;
    assert!(scene.mesh(section).unwrap().vertex_group(BOUNDARY_GROUP).is_none());
    for normal in &mut scene.mesh_mut(section).unwrap().normals {
        *normal = Vec3::NEG_Z;
    }

    let mut runtime = SectionsRuntime::new(dir.path());
    let restored = runtime.on_load(&mut scene, source).unwrap();
    assert!(restored > 0);

    let table = record.get("Ground_SECT1").unwrap();
    let mesh = scene.mesh(section).unwrap();
    let mut seams = 0;
    for (v, position) in mesh.positions.iter().enumerate() {
        if table.get(&quantize(position.truncate(), 2).unwrap()).is_some() {
            seams += 1;
            assert_ne!(mesh.normals[v], Vec3::NEG_Z);
        } else {
            assert_eq!(mesh.normals[v], Vec3::NEG_Z);
        }
    }
    assert!(seams > 0);
}

#[test]
fn test_runtime_tracks_each_source_separately() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = Scene::new();
    let hills = add_terrain(&mut scene, "Hills", Vec2::splat(16.0), UVec2::splat(8));
    let dunes = add_terrain(&mut scene, "Dunes", Vec2::splat(16.0), UVec2::splat(8));
    scene.object_mut(dunes).unwrap().transform =
        Affine3A::from_translation(Vec3::new(100.0, 0.0, 0.0));
    let hills_report = generate(&mut scene, hills, config(dir.path()));
    let dunes_report = generate(&mut scene, dunes, config(dir.path()));

    let mut runtime = SectionsRuntime::new(dir.path());
    scene.update_lod_levels(Vec3::new(100.0, 0.0, 0.0));
    let deltas = runtime.tick_all(&mut scene).unwrap();
    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas[0].0, hills);
    assert!(deltas[0].1.activated.is_empty());
    assert_eq!(deltas[1].1.activated.len(), 4);

    let physics = |scene: &Scene, report: &GenerationReport| -> Vec<PhysicsType> {
        report
            .sections
            .iter()
            .map(|s| scene.object(s.object).unwrap().physics)
            .collect()
    };
    assert_eq!(physics(&scene, &hills_report), [PhysicsType::NoCollision; 4]);
    assert_eq!(physics(&scene, &dunes_report), [PhysicsType::Static; 4]);

    scene.update_lod_levels(Vec3::ZERO);
    let deltas = runtime.tick_all(&mut scene).unwrap();
    assert_eq!(deltas[0].1.activated.len(), 4);
    assert_eq!(deltas[1].1.deactivated.len(), 4);
    assert_eq!(physics(&scene, &hills_report), [PhysicsType::Static; 4]);
    assert_eq!(physics(&scene, &dunes_report), [PhysicsType::NoCollision; 4]);
    assert_eq!(runtime.registry().len(), 2);
}
