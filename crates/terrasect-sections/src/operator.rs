//! The section generator: selection checks, the generation pipeline and
//! teardown.

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

use glam::{Affine3A, UVec2, Vec2, Vec3};
use terrasect_config::SectionsConfig;
use terrasect_log::Profiler;
use terrasect_mesh::{MaterialId, MeshKernel};
use terrasect_scene::{DrawType, Modifier, ObjectId, PhysicsType, Scene, Selection};
use tracing::{debug, info, warn};

use crate::error::{SectionsError, SelectionError};
use crate::finalize::finalize;
use crate::grid::GridSpec;
use crate::lod::generate_lod;
use crate::names::{
    BASE_SUFFIX, BOUNDARY_GROUP, MARKER_PROPERTY, SECT_SUFFIX, UPDATE_ENTRY, section_name,
};
use crate::normals::{NormalTable, capture, check_extent, restore};
use crate::particles::{convert_particles, join_particles};
use crate::partition::partition;
use crate::record::NormalRecord;
use crate::section::Section;

/// Digits used to match vertices between the base and the sections it was
/// cut into.
const TRANSFER_DIGITS: u32 = 4;

/// What [`LodSections::execute`] should do with the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    /// Regenerate the sections, clearing earlier ones first.
    #[default]
    Update,
    /// Only remove earlier sections.
    Clear,
}

/// Result of a successful [`LodSections::execute`].
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// Earlier sections were removed; `removed` counts removed objects.
    Cleared { removed: usize },
    /// New sections were generated.
    Generated(GenerationReport),
}

/// Summary of one generation run.
#[derive(Debug)]
pub struct GenerationReport {
    /// Generated sections in cell order.
    pub sections: Vec<Section>,
    /// Cells per axis.
    pub counts: UVec2,
    /// Cell size.
    pub size: Vec2,
    /// LOD levels per section, terminal level included.
    pub lod_levels: u32,
    /// Particle clusters merged into sections.
    pub particles: usize,
    /// Written normal record, when normals were exported.
    pub record: Option<PathBuf>,
    /// Final log line.
    pub message: String,
}

/// Removes the temporary baked base from the scene when dropped.
struct BaseGuard<'a> {
    scene: &'a mut Scene,
    base: ObjectId,
}

impl Deref for BaseGuard<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        self.scene
    }
}

impl DerefMut for BaseGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        self.scene
    }
}

impl Drop for BaseGuard<'_> {
    fn drop(&mut self) {
        if self.scene.contains(self.base) {
            if let Err(err) = self.scene.remove(self.base) {
                warn!("Failed to remove base object: {err}");
            }
        }
    }
}

/// Generates LOD sections for a source object.
#[derive(Clone, Debug, Default)]
pub struct LodSections {
    config: SectionsConfig,
}

impl LodSections {
    pub fn new(config: SectionsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SectionsConfig {
        &self.config
    }

    /// Checks that the selection names a usable source and returns it.
    ///
    /// The scene is only read.
    pub fn invoke(&self, scene: &Scene, selection: &Selection) -> Result<ObjectId, SelectionError> {
        match selection.active {
            Some(active) if selection.editable.contains(&active) => {
                let has_mesh = scene.object(active).is_ok_and(|o| o.mesh.is_some());
                if has_mesh {
                    Ok(active)
                } else {
                    Err(SelectionError::WrongObject)
                }
            }
            _ if !selection.editable.is_empty() => Err(SelectionError::NoActiveObjectSelected),
            _ if !selection.selected.is_empty() => Err(SelectionError::WrongLayer),
            _ => Err(SelectionError::NoObjectSelected),
        }
    }

    /// Runs `action` on `source`.
    ///
    /// A source that was generated before is cleared first. The options are
    /// validated before the scene is touched.
    pub fn execute<K: MeshKernel + ?Sized>(
        &self,
        scene: &mut Scene,
        kernel: &K,
        source: ObjectId,
        action: Action,
    ) -> Result<ExecuteOutcome, SectionsError> {
        self.config.validate()?;
        let generated = scene.object(source)?.property(MARKER_PROPERTY).is_some();

        if action == Action::Clear {
            let removed = Self::clear(scene, source)?;
            return Ok(ExecuteOutcome::Cleared { removed });
        }
        if generated {
            Self::clear(scene, source)?;
        }
        self.generate(scene, kernel, source).map(ExecuteOutcome::Generated)
    }

    /// Removes the sections of `source` and restores its display flags.
    ///
    /// Clearing a source that has no sections changes nothing. Returns the
    /// number of removed objects.
    pub fn clear(scene: &mut Scene, source: ObjectId) -> Result<usize, SectionsError> {
        let object = scene.object_mut(source)?;
        let generated = object.properties.remove(MARKER_PROPERTY).is_some();
        object.logic.retain(|entry| entry != UPDATE_ENTRY);
        match object.saved_display.take() {
            Some(saved) => object.display = saved,
            None if generated => {
                object.display.hide_render = false;
                object.display.draw_type = DrawType::Textured;
            }
            None => {}
        }

        let prefix = format!("{}{SECT_SUFFIX}", object.name);
        let children = object.children.clone();
        let sections: Vec<ObjectId> = children
            .into_iter()
            .filter(|&child| scene.object(child).is_ok_and(|c| c.name.starts_with(&prefix)))
            .collect();
        let mut removed = 0;
        for section in sections {
            removed += scene.remove_recursive(section)?;
        }
        if generated || removed > 0 {
            info!("Cleared {removed} objects from {}", scene.object(source)?.name);
        }
        Ok(removed)
    }

    fn generate<K: MeshKernel + ?Sized>(
        &self,
        scene: &mut Scene,
        kernel: &K,
        source: ObjectId,
    ) -> Result<GenerationReport, SectionsError> {
        let profiler = Profiler::new();
        let source_name = scene.object(source)?.name.clone();
        let source_mesh = scene.mesh(source)?.name.clone();

        let base = scene.duplicate(source, &format!("{source_name}{BASE_SUFFIX}"))?;
        let mut work = BaseGuard {
            scene: &mut *scene,
            base,
        };

        info!("{}", profiler.timed("Initializing base"));
        let partition_transform = initialize(&mut work, kernel, base, &source_name)?;

        if self.config.dissolve.enabled {
            let mesh = work.mesh_mut(base)?;
            let dissolved = kernel.dissolve_limited(mesh, self.config.dissolve.angle_limit);
            kernel.triangulate(mesh);
            info!("{}", profiler.timed(&format!("Dissolved {dissolved} vertices")));
        }

        let base_mesh = work.mesh(base)?;
        let footprint = base_mesh.dimensions().truncate();
        check_extent(footprint.max_element(), TRANSFER_DIGITS)?;
        if self.config.output.mode.exports_normals() {
            check_extent(footprint.max_element(), self.config.output.effective_digits())?;
        }
        let base_normals = capture(base_mesh, Vec3::ZERO, TRANSFER_DIGITS, None)?;
        let mut materials: BTreeSet<MaterialId> = base_mesh.materials.iter().copied().collect();
        let grid = GridSpec::from_config(&self.config.generation, footprint)?;

        info!("{}", profiler.timed("Multisecting base"));
        let mut sections = Vec::new();
        for mut piece in partition(kernel, work.mesh(base)?, &grid) {
            piece.mesh.name = section_name(&source_mesh, &piece.cell);
            let id = work.add_object(&section_name(&source_name, &piece.cell), Some(piece.mesh));
            let object = work.object_mut(id)?;
            object.transform = partition_transform * Affine3A::from_translation(grid.center3(&piece.cell));
            object.physics = PhysicsType::NoCollision;
            sections.push(Section::new(piece.cell, id));
        }
        if sections.is_empty() {
            return Err(SectionsError::DegenerateGrid(format!(
                "no piece of {source_name} fell inside the grid"
            )));
        }

        let placeholder = generate_lod(
            &mut work,
            kernel,
            &mut sections,
            &grid,
            &self.config.lod,
            &source_mesh,
            &profiler,
        )?;

        info!("{}", profiler.timed("Converting particles"));
        let clusters = convert_particles(
            &mut work,
            source,
            &source_name,
            &grid,
            &partition_transform,
            &mut materials,
        )?;
        let particles =
            join_particles(&mut work, kernel, &sections, clusters, &grid, self.config.lod.factor)?;

        info!("{}", profiler.timed("Restoring seam normals"));
        for section in &sections {
            restore_seam_normals(&mut work, section, &grid, &base_normals)?;
        }
        drop(work);

        finalize(scene, source, &sections, &materials)?;

        let record = if self.config.output.mode.exports_normals() {
            info!("{}", profiler.timed("Exporting normals"));
            Some(self.export_normals(scene, &source_name, &sections)?)
        } else {
            None
        };

        restore_initial_state(scene, source, &sections)?;
        let object = scene.object_mut(source)?;
        object.set_bool_property(MARKER_PROPERTY, record.is_some());
        if !object.logic.iter().any(|entry| entry == UPDATE_ENTRY) {
            object.logic.push(UPDATE_ENTRY.to_string());
        }

        let counts = grid.counts();
        let message = profiler.timed(&format!(
            "Finished generating {} ({} X {}) sections in",
            sections.len(),
            counts.x,
            counts.y
        ));
        info!("{message}");
        Ok(GenerationReport {
            sections,
            counts,
            size: grid.size(),
            lod_levels: if placeholder.is_some() { self.config.lod.number } else { 0 },
            particles,
            record,
            message,
        })
    }

    /// Records the boundary normals of every section and decimated level,
    /// then drops the boundary groups.
    fn export_normals(
        &self,
        scene: &mut Scene,
        source_name: &str,
        sections: &[Section],
    ) -> Result<PathBuf, SectionsError> {
        let digits = self.config.output.effective_digits();
        let mut record = NormalRecord::new(digits);
        for section in sections {
            for id in section.detail_objects() {
                let mesh = scene.mesh(id)?;
                let table = capture(mesh, Vec3::ZERO, digits, mesh.vertex_group(BOUNDARY_GROUP))?;
                record.insert(scene.object(id)?.name.clone(), table)?;
            }
        }
        let path = record.save(&self.config.output.data_dir, source_name)?;
        for section in sections {
            for id in section.detail_objects() {
                scene.mesh_mut(id)?.remove_vertex_group(BOUNDARY_GROUP);
            }
        }
        Ok(path)
    }
}

/// Bakes the base into partition space and returns the partition transform.
///
/// Particle systems are dropped, the other modifiers applied in stack order,
/// the world rotation and scale frozen into the vertices and the origin moved
/// to the bounds centre.
fn initialize<K: MeshKernel + ?Sized>(
    scene: &mut Scene,
    kernel: &K,
    base: ObjectId,
    source_name: &str,
) -> Result<Affine3A, SectionsError> {
    scene
        .object_mut(base)?
        .modifiers
        .retain(|m| !matches!(m, Modifier::ParticleSystem(_)));
    while !scene.object(base)?.modifiers.is_empty() {
        let modifier = scene.apply_modifier(base, 0)?;
        debug!("Applied modifier {}", modifier.name());
    }

    let world = scene.object(base)?.transform;
    let linear = Affine3A {
        matrix3: world.matrix3,
        translation: Default::default(),
    };
    scene.mesh_mut(base)?.transform(&linear);
    scene.object_mut(base)?.transform = Affine3A::from_translation(world.translation.into());

    let mesh = scene.mesh(base)?;
    let Some(center) = mesh.bounds_center().filter(|_| !mesh.faces.is_empty()) else {
        return Err(SectionsError::EmptyMesh(source_name.to_string()));
    };
    let world_center = Vec3::from(world.translation) + center;
    scene.set_origin(base, world_center)?;
    kernel.triangulate(scene.mesh_mut(base)?);
    Ok(Affine3A::from_translation(world_center))
}

/// Writes base normals onto the cut boundary of a section and its decimated
/// levels.
///
/// Boundary vertices created by the cuts have no base counterpart; the
/// levels take those from the section itself.
fn restore_seam_normals(
    scene: &mut Scene,
    section: &Section,
    grid: &GridSpec,
    base: &NormalTable,
) -> Result<(), SectionsError> {
    let origin = grid.center3(&section.cell);
    let mesh = scene.mesh_mut(section.object)?;
    let boundary = mesh.vertex_group(BOUNDARY_GROUP).cloned().unwrap_or_default();
    let restored = restore(mesh, origin, base, Some(&boundary))?;
    let seams = capture(mesh, Vec3::ZERO, TRANSFER_DIGITS, Some(&boundary))?;
    debug!("Restored {restored} of {} seam normals on section {}", boundary.len(), section.cell);

    for &level in &section.levels {
        let mesh = scene.mesh_mut(level)?;
        let boundary = mesh.vertex_group(BOUNDARY_GROUP).cloned().unwrap_or_default();
        restore(mesh, Vec3::ZERO, &seams, Some(&boundary))?;
    }
    Ok(())
}

/// Hides the LOD children and shows the source as bounds only, saving its
/// previous display flags for [`LodSections::clear`].
fn restore_initial_state(
    scene: &mut Scene,
    source: ObjectId,
    sections: &[Section],
) -> Result<(), SectionsError> {
    for section in sections {
        for level in section.lod_objects() {
            scene.object_mut(level)?.display.hide = true;
        }
    }
    let object = scene.object_mut(source)?;
    object.saved_display = Some(object.display);
    object.display.draw_type = DrawType::Bounds;
    object.display.hide_render = true;
    Ok(())
}
