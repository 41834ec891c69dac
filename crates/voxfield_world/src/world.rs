use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use voxfield_core::jobs::JobSystem;
use voxfield_shared::block::BlockType;
use voxfield_shared::chunk::{Chunk, ChunkData, ChunkState};
use voxfield_shared::coords::{
    chunk_pos_of, chunk_pos_of_point, world_to_chunk, ChunkPos, LocalPos, CHUNK_SIZE,
};
use voxfield_shared::mesh::{self, ChunkNeighbors};
use voxfield_shared::worldgen::TerrainGenerator;

use crate::error::WorldError;
use crate::render::GeometrySink;
use crate::settings::WorldSettings;

const LAST_LOCAL: u8 = (CHUNK_SIZE - 1) as u8;
/// (dx, dz) steps to the four chunks sharing a face with a chunk.
const HORIZONTAL_NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

struct ResidentChunk {
    chunk: Chunk,
    /// Tick of the last load or edit that needed this chunk.
    last_touched: u64,
    /// Whether the sink currently holds geometry for this chunk.
    submitted: bool,
}

impl ResidentChunk {
    fn new(chunk: Chunk, tick: u64) -> Self {
        Self {
            chunk,
            last_touched: tick,
            submitted: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub observer_chunk: ChunkPos,
    /// Chunks generated by this call.
    pub generated: usize,
    /// Chunks in the render square left for later calls by the per-tick budget.
    pub pending: usize,
    pub evicted: usize,
}

/// Registry of resident chunks keyed by chunk position. Owns every chunk,
/// streams them around an observer and keeps the sink in sync with the
/// geometry each chunk last built.
pub struct WorldIndex<S: GeometrySink> {
    chunks: FxHashMap<ChunkPos, ResidentChunk>,
    generator: TerrainGenerator,
    settings: WorldSettings,
    jobs: Option<JobSystem>,
    sink: S,
    tick: u64,
    observer_chunk: Option<ChunkPos>,
}

impl<S: GeometrySink> WorldIndex<S> {
    pub fn new(settings: WorldSettings, sink: S) -> Result<Self, WorldError> {
        let settings = settings.sanitize();
        let jobs = match settings.worker_threads {
            0 => None,
            threads => Some(JobSystem::new(threads)?),
        };
        debug!(
            "World index ready: seed {:#x}, render distance {}, {} worker threads",
            settings.seed, settings.render_distance, settings.worker_threads
        );

        Ok(Self {
            chunks: FxHashMap::default(),
            generator: TerrainGenerator::new(settings.seed, settings.terrain),
            settings,
            jobs,
            sink,
            tick: 0,
            observer_chunk: None,
        })
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Number of `load_around` calls so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn observer_chunk(&self) -> Option<ChunkPos> {
        self.observer_chunk
    }

    pub fn resident_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos).map(|resident| &resident.chunk)
    }

    /// `None` means the chunk was never requested (or has been evicted).
    pub fn chunk_state(&self, pos: ChunkPos) -> Option<ChunkState> {
        self.chunk(pos).map(Chunk::state)
    }

    pub fn generated_positions(&self) -> Vec<ChunkPos> {
        let mut positions: Vec<ChunkPos> = self
            .chunks
            .iter()
            .filter(|(_, resident)| resident.chunk.is_generated())
            .map(|(pos, _)| *pos)
            .collect();
        positions.sort();
        positions
    }

    pub fn get_or_create_chunk(&mut self, pos: ChunkPos) -> &mut Chunk {
        let tick = self.tick;
        let resident = self.chunks.entry(pos).or_insert_with(|| {
            trace!("Registered chunk ({}, {})", pos.x, pos.z);
            ResidentChunk::new(Chunk::new(pos), tick)
        });
        resident.last_touched = tick;
        &mut resident.chunk
    }

    /// Creates the chunk if needed and, the first time only, generates its
    /// terrain and submits its geometry. Returns whether terrain was generated.
    pub fn ensure_generated(&mut self, pos: ChunkPos) -> bool {
        let generated = {
            let tick = self.tick;
            let resident = self
                .chunks
                .entry(pos)
                .or_insert_with(|| ResidentChunk::new(Chunk::new(pos), tick));
            resident.last_touched = tick;
            resident.chunk.generate_terrain(&self.generator)
        };

        if generated {
            self.rebuild(pos);
            if self.settings.cull_chunk_borders {
                self.rebuild_generated_neighbors(pos);
            }
        }
        generated
    }

    /// Brings every chunk within the render distance of `observer` up to the
    /// generated state, nearest first, then applies the resident cap.
    pub fn load_around(&mut self, observer: Vec3) -> LoadReport {
        self.tick = self.tick.saturating_add(1);
        let tick = self.tick;
        let center = chunk_pos_of_point(observer);
        self.observer_chunk = Some(center);

        let mut missing = Vec::new();
        for pos in center.square_around(self.settings.render_distance) {
            match self.chunks.get_mut(&pos) {
                Some(resident) => {
                    resident.last_touched = tick;
                    if !resident.chunk.is_generated() {
                        missing.push(pos);
                    }
                }
                None => missing.push(pos),
            }
        }

        let budget = match self.settings.max_chunks_per_tick {
            0 => missing.len(),
            limit => limit.min(missing.len()),
        };
        let pending = missing.len() - budget;
        missing.truncate(budget);

        let generated = if self.jobs.is_some() && missing.len() > 1 {
            self.generate_batch(missing)
        } else {
            missing
                .into_iter()
                .filter(|&pos| self.ensure_generated(pos))
                .count()
        };
        let evicted = self.enforce_resident_cap(center);

        if generated > 0 || evicted > 0 {
            debug!(
                "Tick {tick}: observer chunk ({}, {}), generated {generated}, pending {pending}, evicted {evicted}, resident {}",
                center.x,
                center.z,
                self.chunks.len()
            );
        }

        LoadReport {
            observer_chunk: center,
            generated,
            pending,
            evicted,
        }
    }

    /// Block at a world position. Reads never create chunks; anything not yet
    /// generated reads as air.
    pub fn block_at(&self, world_pos: IVec3) -> BlockType {
        self.probe_block(world_pos).unwrap_or(BlockType::AIR)
    }

    /// Like `block_at`, but `None` when the owning chunk has no terrain yet.
    pub fn probe_block(&self, world_pos: IVec3) -> Option<BlockType> {
        let chunk = self
            .chunk(chunk_pos_of(world_pos.x, world_pos.z))
            .filter(|chunk| chunk.is_generated())?;
        let block = match world_to_chunk(world_pos) {
            Some((_, local)) => chunk.data().get(local),
            None => BlockType::AIR,
        };
        Some(block)
    }

    /// Writes a block, generating its chunk first if needed, and rebuilds the
    /// chunk's geometry when the block actually changed. Returns the replaced
    /// block, or `None` when `y` is outside the world.
    pub fn set_block_at(&mut self, world_pos: IVec3, block: BlockType) -> Option<BlockType> {
        let (chunk_pos, local) = world_to_chunk(world_pos)?;
        self.ensure_generated(chunk_pos);

        let tick = self.tick;
        let resident = self.chunks.get_mut(&chunk_pos)?;
        resident.last_touched = tick;
        let previous = resident.chunk.set(
            i32::from(local.x),
            i32::from(local.y),
            i32::from(local.z),
            block,
        )?;

        if previous != block {
            self.rebuild(chunk_pos);
            if self.settings.cull_chunk_borders {
                for neighbor in border_neighbors(chunk_pos, local) {
                    self.rebuild_if_generated(neighbor);
                }
            }
        }
        Some(previous)
    }

    /// Removes a chunk and withdraws its geometry, handing the chunk back to
    /// the caller.
    pub fn evict(&mut self, pos: ChunkPos) -> Option<Chunk> {
        let resident = self.chunks.remove(&pos)?;
        if resident.submitted {
            self.sink.remove_chunk_geometry(pos);
        }
        debug!("Evicted chunk ({}, {})", pos.x, pos.z);

        if self.settings.cull_chunk_borders && resident.chunk.is_generated() {
            self.rebuild_generated_neighbors(pos);
        }
        Some(resident.chunk)
    }

    /// Rebuilds a generated chunk's geometry and resubmits it. Returns false
    /// when the chunk is not resident or has no terrain.
    pub fn rebuild(&mut self, pos: ChunkPos) -> bool {
        let geometry = {
            let Some(data) = self.generated_data(pos) else {
                return false;
            };
            mesh::build_chunk_geometry(data, &self.neighbors_of(pos))
        };

        let Some(resident) = self.chunks.get_mut(&pos) else {
            return false;
        };
        resident.chunk.install_geometry(geometry);
        self.submit(pos);
        true
    }

    fn rebuild_if_generated(&mut self, pos: ChunkPos) {
        if self.generated_data(pos).is_some() {
            self.rebuild(pos);
        }
    }

    fn rebuild_generated_neighbors(&mut self, pos: ChunkPos) {
        for (dx, dz) in HORIZONTAL_NEIGHBORS {
            if let Some(neighbor) = pos.checked_offset(dx, dz) {
                self.rebuild_if_generated(neighbor);
            }
        }
    }

    /// Replaces whatever the sink holds for `pos` with the chunk's current
    /// geometry. Empty geometry is withdrawn but not re-added.
    fn submit(&mut self, pos: ChunkPos) {
        let Some(resident) = self.chunks.get_mut(&pos) else {
            return;
        };
        if resident.submitted {
            self.sink.remove_chunk_geometry(pos);
            resident.submitted = false;
        }
        if let Some(geometry) = resident.chunk.geometry().filter(|g| !g.is_empty()) {
            trace!(
                "Submitting {} triangles for chunk ({}, {})",
                geometry.triangle_count(),
                pos.x,
                pos.z
            );
            self.sink.add_chunk_geometry(pos, pos.world_offset(), geometry);
            resident.submitted = true;
        }
    }

    fn generated_data(&self, pos: ChunkPos) -> Option<&ChunkData> {
        self.chunk(pos)
            .filter(|chunk| chunk.is_generated())
            .map(Chunk::data)
    }

    fn neighbors_of(&self, pos: ChunkPos) -> ChunkNeighbors<'_> {
        if !self.settings.cull_chunk_borders {
            return ChunkNeighbors::default();
        }
        let at = |dx, dz| {
            pos.checked_offset(dx, dz)
                .and_then(|neighbor| self.generated_data(neighbor))
        };
        ChunkNeighbors {
            pos_x: at(1, 0),
            neg_x: at(-1, 0),
            pos_z: at(0, 1),
            neg_z: at(0, -1),
        }
    }

    /// Generates a batch of chunks on the worker pool. Each chunk is owned by
    /// exactly one task until it is registered again afterwards.
    fn generate_batch(&mut self, positions: Vec<ChunkPos>) -> usize {
        let Some(jobs) = self.jobs.as_ref() else {
            return 0;
        };

        let mut batch: Vec<Chunk> = positions
            .iter()
            .map(|&pos| {
                self.chunks
                    .remove(&pos)
                    .map(|resident| resident.chunk)
                    .unwrap_or_else(|| Chunk::new(pos))
            })
            .collect();

        let threads = jobs.thread_count();
        let generator = &self.generator;
        let mesh_in_worker = !self.settings.cull_chunk_borders;
        jobs.for_each_mut(&mut batch, |chunk| {
            chunk.generate_terrain(generator);
            if mesh_in_worker {
                chunk.build_geometry();
            }
        });

        let tick = self.tick;
        let count = batch.len();
        for chunk in batch {
            let pos = chunk.pos();
            let previous = self.chunks.insert(pos, ResidentChunk::new(chunk, tick));
            assert!(previous.is_none(), "chunk ({}, {}) registered twice", pos.x, pos.z);
        }

        if mesh_in_worker {
            for &pos in &positions {
                self.submit(pos);
            }
        } else {
            let mut dirty: Vec<ChunkPos> = positions
                .iter()
                .flat_map(|&pos| {
                    let neighbors = HORIZONTAL_NEIGHBORS
                        .into_iter()
                        .filter_map(move |(dx, dz)| pos.checked_offset(dx, dz));
                    std::iter::once(pos).chain(neighbors)
                })
                .collect();
            dirty.sort();
            dirty.dedup();
            for pos in dirty {
                self.rebuild_if_generated(pos);
            }
        }

        debug!("Generated {count} chunks on {threads} workers");
        count
    }

    /// Evicts least recently touched chunks outside the render square until
    /// the resident cap is met.
    fn enforce_resident_cap(&mut self, center: ChunkPos) -> usize {
        let cap = self.settings.max_resident_chunks;
        if cap == 0 || self.chunks.len() <= cap {
            return 0;
        }

        let radius = self.settings.render_distance;
        let mut candidates: Vec<(u64, i32, ChunkPos)> = self
            .chunks
            .iter()
            .filter(|(pos, _)| pos.distance(center) > radius)
            .map(|(pos, resident)| (resident.last_touched, pos.distance(center), *pos))
            .collect();
        candidates.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        let excess = self.chunks.len() - cap;
        candidates
            .into_iter()
            .take(excess)
            .filter(|&(_, _, pos)| self.evict(pos).is_some())
            .count()
    }
}

/// Neighbor chunks sharing a face with the block at `local`.
fn border_neighbors(pos: ChunkPos, local: LocalPos) -> Vec<ChunkPos> {
    let mut steps = Vec::new();
    if local.x == 0 {
        steps.push((-1, 0));
    }
    if local.x == LAST_LOCAL {
        steps.push((1, 0));
    }
    if local.z == 0 {
        steps.push((0, -1));
    }
    if local.z == LAST_LOCAL {
        steps.push((0, 1));
    }
    steps
        .into_iter()
        .filter_map(|(dx, dz)| pos.checked_offset(dx, dz))
        .collect()
}

#[cfg(test)]
mod tests {
    use glam::{IVec3, Vec3};
    use voxfield_core::events;
    use voxfield_shared::block::BlockType;
    use voxfield_shared::chunk::ChunkState;
    use voxfield_shared::coords::{ChunkPos, MAX_CHUNK_COORD};

    use super::WorldIndex;
    use crate::render::{ChannelSink, GeometryEvent, NullSink, RecordingSink};
    use crate::settings::WorldSettings;

    fn settings(render_distance: i32) -> WorldSettings {
        WorldSettings {
            render_distance,
            ..WorldSettings::default()
        }
    }

    fn world(settings: WorldSettings) -> WorldIndex<RecordingSink> {
        WorldIndex::new(settings, RecordingSink::new()).expect("build world")
    }

    fn square(center: ChunkPos, radius: i32) -> Vec<ChunkPos> {
        let mut positions = center.square_around(radius);
        positions.sort();
        positions
    }

    fn observer_in(pos: ChunkPos) -> Vec3 {
        pos.world_offset() + Vec3::new(8.0, 80.0, 8.0)
    }

    #[test]
    fn load_around_generates_exactly_the_render_square() {
        let mut world = world(settings(2));
        let report = world.load_around(Vec3::new(0.0, 80.0, 0.0));

        assert_eq!(report.observer_chunk, ChunkPos::new(0, 0));
        assert_eq!(report.generated, 25);
        assert_eq!(report.pending, 0);
        assert_eq!(world.generated_positions(), square(ChunkPos::new(0, 0), 2));
        assert_eq!(world.resident_count(), 25);
        assert_eq!(world.sink().len(), 25);
        assert_eq!(world.sink().duplicate_adds(), 0);

        let again = world.load_around(Vec3::new(3.0, 80.0, 12.0));
        assert_eq!(again.generated, 0);
        assert_eq!(world.sink().adds(), 25);
        assert_eq!(world.tick(), 2);
    }

    #[test]
    fn negative_observer_positions_floor_into_chunks() {
        let mut world = world(settings(1));
        let report = world.load_around(Vec3::new(-0.5, 80.0, -17.0));
        assert_eq!(report.observer_chunk, ChunkPos::new(-1, -2));
        assert_eq!(world.observer_chunk(), Some(ChunkPos::new(-1, -2)));
        assert_eq!(world.generated_positions(), square(ChunkPos::new(-1, -2), 1));
    }

    #[test]
    fn geometry_is_submitted_at_the_chunk_offset() {
        let mut world = world(settings(1));
        world.load_around(Vec3::ZERO);
        let recorded = world.sink().get(ChunkPos::new(-1, 1)).expect("geometry submitted");
        assert_eq!(recorded.offset, Vec3::new(-16.0, 0.0, 16.0));
        assert!(!recorded.geometry.is_empty());
    }

    #[test]
    fn reads_never_create_chunks() {
        let mut world = world(settings(0));
        assert_eq!(world.block_at(IVec3::new(0, 0, 0)), BlockType::AIR);
        assert_eq!(world.probe_block(IVec3::new(0, 0, 0)), None);
        assert_eq!(world.resident_count(), 0);

        world.get_or_create_chunk(ChunkPos::new(0, 0));
        assert_eq!(world.chunk_state(ChunkPos::new(0, 0)), Some(ChunkState::Empty));
        assert_eq!(world.probe_block(IVec3::new(0, 0, 0)), None);

        world.load_around(Vec3::ZERO);
        assert_eq!(world.block_at(IVec3::new(0, 0, 0)), BlockType::Bedrock);
        assert_eq!(world.probe_block(IVec3::new(3, 0, 3)), Some(BlockType::Bedrock));
        assert_eq!(world.probe_block(IVec3::new(3, 300, 3)), Some(BlockType::AIR));
        assert_eq!(world.chunk_state(ChunkPos::new(5, 5)), None);
    }

    #[test]
    fn ensure_generated_runs_once_per_chunk() {
        let mut world = world(settings(0));
        let pos = ChunkPos::new(4, -7);
        assert!(world.ensure_generated(pos));
        assert!(!world.ensure_generated(pos));
        assert_eq!(world.chunk_state(pos), Some(ChunkState::Generated));
        assert_eq!(world.sink().adds(), 1);
        assert_eq!(world.chunk(pos).map(|c| c.mesh_builds()), Some(1));
    }

    #[test]
    fn replacing_surface_grass_with_sand_swaps_the_quad_color() {
        let mut world = world(settings(0));
        world.load_around(Vec3::new(0.0, 80.0, 0.0));
        let h = world.generator().surface_height(0, 0);
        let top = IVec3::new(0, h, 0);
        assert_eq!(world.block_at(top), BlockType::Grass);

        let quads_at_top = |world: &WorldIndex<RecordingSink>, color: [f32; 3]| {
            let recorded = world.sink().get(ChunkPos::new(0, 0)).expect("chunk geometry");
            recorded
                .geometry
                .quads()
                .filter(|quad| quad.block() == top && quad.color == color)
                .count()
        };
        assert!(quads_at_top(&world, BlockType::Grass.color()) > 0);
        assert_eq!(quads_at_top(&world, BlockType::Sand.color()), 0);

        assert_eq!(world.set_block_at(top, BlockType::Sand), Some(BlockType::Grass));
        assert_eq!(world.block_at(top), BlockType::Sand);
        assert_eq!(quads_at_top(&world, BlockType::Grass.color()), 0);
        assert!(quads_at_top(&world, BlockType::Sand.color()) > 0);

        let sink = world.sink();
        assert_eq!(sink.removes(), 1);
        assert_eq!(sink.adds(), 2);
        assert_eq!(sink.duplicate_adds(), 0);
    }

    #[test]
    fn unchanged_writes_skip_the_rebuild() {
        let mut world = world(settings(0));
        world.load_around(Vec3::ZERO);
        let pos = IVec3::new(5, 0, 5);
        assert_eq!(world.set_block_at(pos, BlockType::Bedrock), Some(BlockType::Bedrock));
        assert_eq!(world.chunk(ChunkPos::new(0, 0)).map(|c| c.mesh_builds()), Some(1));
        assert_eq!(world.sink().adds(), 1);
    }

    #[test]
    fn edits_rebuild_only_the_owning_chunk() {
        let mut world = world(settings(1));
        world.load_around(Vec3::ZERO);
        let before: Vec<(ChunkPos, u32)> = world
            .generated_positions()
            .into_iter()
            .map(|pos| (pos, world.chunk(pos).map_or(0, |c| c.mesh_builds())))
            .collect();

        world.set_block_at(IVec3::new(5, 120, 5), BlockType::Cobblestone);

        for (pos, builds) in before {
            let now = world.chunk(pos).map_or(0, |c| c.mesh_builds());
            let expected = if pos == ChunkPos::new(0, 0) { builds + 1 } else { builds };
            assert_eq!(now, expected, "chunk {pos:?}");
        }
    }

    #[test]
    fn edits_at_negative_coordinates_land_in_the_right_chunk() {
        let mut world = world(settings(0));
        let target = IVec3::new(-1, 150, -17);
        assert_eq!(world.set_block_at(target, BlockType::Log), Some(BlockType::AIR));
        let chunk = world.chunk(ChunkPos::new(-1, -2)).expect("chunk generated on write");
        assert!(chunk.is_generated());
        assert_eq!(chunk.get(15, 150, 15), BlockType::Log);
        assert_eq!(world.block_at(target), BlockType::Log);
    }

    #[test]
    fn writes_outside_the_world_height_are_rejected() {
        let mut world = world(settings(0));
        assert_eq!(world.set_block_at(IVec3::new(0, 256, 0), BlockType::Stone), None);
        assert_eq!(world.set_block_at(IVec3::new(0, -1, 0), BlockType::Stone), None);
        assert_eq!(world.resident_count(), 0);
    }

    #[test]
    fn per_tick_budget_loads_nearest_chunks_first() {
        let mut world = world(WorldSettings {
            max_chunks_per_tick: 5,
            ..settings(2)
        });

        let first = world.load_around(Vec3::ZERO);
        assert_eq!(first.generated, 5);
        assert_eq!(first.pending, 20);
        assert_eq!(
            world.generated_positions(),
            vec![
                ChunkPos::new(-1, -1),
                ChunkPos::new(-1, 0),
                ChunkPos::new(-1, 1),
                ChunkPos::new(0, -1),
                ChunkPos::new(0, 0),
            ]
        );
        assert_eq!(world.chunk_state(ChunkPos::new(2, 2)), None);

        let mut total = first.generated;
        for _ in 0..4 {
            total += world.load_around(Vec3::ZERO).generated;
        }
        assert_eq!(total, 25);
        assert_eq!(world.load_around(Vec3::ZERO).pending, 0);
        assert_eq!(world.generated_positions(), square(ChunkPos::new(0, 0), 2));
    }

    #[test]
    fn resident_cap_evicts_chunks_left_behind() {
        let mut world = world(WorldSettings {
            max_resident_chunks: 9,
            ..settings(1)
        });
        world.load_around(observer_in(ChunkPos::new(0, 0)));
        let report = world.load_around(observer_in(ChunkPos::new(3, 0)));

        assert_eq!(report.generated, 9);
        assert_eq!(report.evicted, 9);
        assert_eq!(world.resident_count(), 9);
        assert_eq!(world.generated_positions(), square(ChunkPos::new(3, 0), 1));
        assert_eq!(world.sink().len(), 9);
        assert_eq!(world.sink().removes(), 9);
    }

    #[test]
    fn eviction_prefers_stale_then_distant_then_lowest_position() {
        let mut world = world(WorldSettings {
            max_resident_chunks: 10,
            ..settings(1)
        });
        world.load_around(observer_in(ChunkPos::new(0, 0)));
        let report = world.load_around(observer_in(ChunkPos::new(1, 0)));

        assert_eq!(report.generated, 3);
        assert_eq!(report.evicted, 2);
        assert_eq!(world.chunk_state(ChunkPos::new(-1, -1)), None);
        assert_eq!(world.chunk_state(ChunkPos::new(-1, 0)), None);
        assert_eq!(
            world.chunk_state(ChunkPos::new(-1, 1)),
            Some(ChunkState::Generated)
        );
    }

    #[test]
    fn resident_cap_never_evicts_inside_the_render_square() {
        let mut world = world(WorldSettings {
            max_resident_chunks: 1,
            ..settings(1)
        });
        assert_eq!(world.settings().max_resident_chunks, 9);
        let report = world.load_around(Vec3::ZERO);
        assert_eq!(report.evicted, 0);
        assert_eq!(world.resident_count(), 9);
    }

    #[test]
    fn evict_hands_back_the_chunk_and_withdraws_geometry() {
        let mut world = world(settings(0));
        world.load_around(Vec3::ZERO);
        let h = world.generator().surface_height(2, 2);
        world.set_block_at(IVec3::new(2, h, 2), BlockType::Water);

        let chunk = world.evict(ChunkPos::new(0, 0)).expect("chunk was resident");
        assert_eq!(chunk.get(2, h, 2), BlockType::Water);
        assert_eq!(world.chunk_state(ChunkPos::new(0, 0)), None);
        assert!(world.sink().is_empty());
        assert!(world.evict(ChunkPos::new(0, 0)).is_none());
        assert_eq!(world.block_at(IVec3::new(2, h, 2)), BlockType::AIR);
    }

    #[test]
    fn worker_pool_matches_sequential_generation() {
        for cull_chunk_borders in [false, true] {
            let base = WorldSettings {
                cull_chunk_borders,
                ..settings(2)
            };
            let mut sequential = world(base.clone());
            let mut parallel = world(WorldSettings {
                worker_threads: 3,
                ..base
            });

            let observer = Vec3::new(-20.0, 80.0, 7.0);
            let a = sequential.load_around(observer);
            let b = parallel.load_around(observer);
            assert_eq!(a, b);
            assert_eq!(sequential.generated_positions(), parallel.generated_positions());

            for pos in sequential.generated_positions() {
                assert_eq!(
                    sequential.sink().get(pos),
                    parallel.sink().get(pos),
                    "chunk {pos:?} (culling {cull_chunk_borders})"
                );
            }
            assert_eq!(parallel.sink().duplicate_adds(), 0);
        }
    }

    #[test]
    fn border_culling_hides_faces_between_generated_chunks() {
        let mut plain = world(settings(1));
        let mut culled = world(WorldSettings {
            cull_chunk_borders: true,
            ..settings(1)
        });
        plain.load_around(Vec3::ZERO);
        culled.load_around(Vec3::ZERO);

        let center = ChunkPos::new(0, 0);
        let plain_quads = plain.sink().get(center).map(|r| r.geometry.quad_count());
        let culled_quads = culled.sink().get(center).map(|r| r.geometry.quad_count());
        assert!(culled_quads < plain_quads);
        assert!(culled.sink().total_triangles() < plain.sink().total_triangles());
        assert_eq!(culled.sink().duplicate_adds(), 0);

        let interior_wall = culled
            .sink()
            .get(center)
            .expect("center geometry")
            .geometry
            .quads()
            .filter(|quad| quad.block().x == 0 && quad.normal().x < -0.5)
            .count();
        assert!(interior_wall < 16 * 4);
    }

    #[test]
    fn border_edits_rebuild_the_adjacent_chunk_when_culling() {
        let mut world = world(WorldSettings {
            cull_chunk_borders: true,
            ..settings(1)
        });
        world.load_around(Vec3::ZERO);
        let west = ChunkPos::new(-1, 0);
        let builds = world.chunk(west).map_or(0, |c| c.mesh_builds());

        let h = world.generator().surface_height(0, 4);
        world.set_block_at(IVec3::new(0, h, 4), BlockType::Air);
        assert_eq!(world.chunk(west).map_or(0, |c| c.mesh_builds()), builds + 1);
    }

    #[test]
    fn channel_sink_delivers_streamed_geometry() {
        let (tx, rx) = events::channel();
        let mut world =
            WorldIndex::new(settings(1), ChannelSink::new(tx)).expect("build world");
        world.load_around(Vec3::ZERO);
        world.evict(ChunkPos::new(1, 1));

        let received = rx.drain();
        let upserts = received
            .iter()
            .filter(|event| matches!(event, GeometryEvent::Upsert { .. }))
            .count();
        assert_eq!(upserts, 9);
        assert!(matches!(
            received.last(),
            Some(GeometryEvent::Remove { pos }) if *pos == ChunkPos::new(1, 1)
        ));
        assert_eq!(world.sink().dropped(), 0);
    }

    #[test]
    fn far_observers_stream_the_outermost_chunks() {
        for cull_chunk_borders in [false, true] {
            let mut world = world(WorldSettings {
                cull_chunk_borders,
                ..settings(1)
            });
            let report = world.load_around(Vec3::new(1.0e11, 80.0, 0.0));
            assert_eq!(report.observer_chunk, ChunkPos::new(MAX_CHUNK_COORD, 0));
            assert_eq!(report.generated, 9);
            assert_eq!(world.sink().duplicate_adds(), 0);
            assert_eq!(world.block_at(IVec3::new(i32::MAX, 0, 0)), BlockType::Bedrock);

            let h = world.generator().surface_height(i32::MAX, 0);
            let edge = IVec3::new(i32::MAX, h, 0);
            assert_eq!(world.set_block_at(edge, BlockType::Sand), Some(BlockType::Grass));
        }
    }

    #[test]
    fn chunks_at_the_coordinate_limits_generate() {
        for cull_chunk_borders in [false, true] {
            let mut world = world(WorldSettings {
                cull_chunk_borders,
                ..settings(0)
            });
            for pos in [
                ChunkPos::new(i32::MAX, 0),
                ChunkPos::new(i32::MIN, i32::MAX),
                ChunkPos::new(i32::MAX - 1, 0),
            ] {
                assert!(world.ensure_generated(pos), "chunk {pos:?}");
                let offset = world.sink().get(pos).map(|r| r.offset);
                assert_eq!(offset, Some(pos.world_offset()));
                assert!(offset.is_some_and(|o| o.is_finite()));
            }
            let corner = ChunkPos::new(i32::MAX, 0);
            assert_eq!(world.evict(corner).map(|c| c.pos()), Some(corner));
        }
    }

    #[test]
    fn null_sink_worlds_stream_without_geometry_consumers() {
        let mut world = WorldIndex::new(
            WorldSettings {
                worker_threads: 2,
                max_resident_chunks: 9,
                ..settings(1)
            },
            NullSink,
        )
        .expect("build world");
        world.load_around(Vec3::ZERO);
        let report = world.load_around(observer_in(ChunkPos::new(5, 5)));
        assert_eq!(report.generated, 9);
        assert_eq!(report.evicted, 9);
        assert_eq!(world.resident_count(), 9);
    }
}
