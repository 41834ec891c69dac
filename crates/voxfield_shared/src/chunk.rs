use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::block::BlockType;
use crate::coords::{local_to_index, ChunkPos, LocalPos, CHUNK_VOLUME};
use crate::mesh::{self, ChunkGeometry, ChunkNeighbors, FaceMask};
use crate::worldgen::TerrainGenerator;

/// Dense block storage for one chunk, indexed by `local_to_index`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkData {
    pub blocks: Box<[BlockType; CHUNK_VOLUME]>,
}

impl ChunkData {
    pub fn new_empty() -> Self {
        Self::new_filled(BlockType::AIR)
    }

    pub fn new_filled(block: BlockType) -> Self {
        Self {
            blocks: Box::new([block; CHUNK_VOLUME]),
        }
    }

    pub fn get(&self, local: LocalPos) -> BlockType {
        self.blocks[local_to_index(local)]
    }

    pub fn set(&mut self, local: LocalPos, block: BlockType) {
        let index = local_to_index(local);
        self.blocks[index] = block;
    }

    pub fn get_index(&self, index: usize) -> BlockType {
        self.blocks[index]
    }

    pub fn set_index(&mut self, index: usize, block: BlockType) {
        self.blocks[index] = block;
    }

    pub fn solid_count(&self) -> usize {
        self.blocks.iter().filter(|block| block.is_solid()).count()
    }
}

impl Default for ChunkData {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl Serialize for ChunkData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.blocks.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChunkData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let blocks = Vec::<BlockType>::deserialize(deserializer)?;
        if blocks.len() != CHUNK_VOLUME {
            return Err(de::Error::custom(format!(
                "expected {CHUNK_VOLUME} blocks, got {}",
                blocks.len()
            )));
        }

        let blocks: Box<[BlockType; CHUNK_VOLUME]> = blocks
            .into_boxed_slice()
            .try_into()
            .map_err(|_| de::Error::custom("failed to deserialize chunk block array"))?;

        Ok(Self { blocks })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Registered but no terrain written yet; reads see air.
    Empty,
    Generated,
}

/// A chunk column: block storage, generation state and the geometry last
/// built from it. Geometry is chunk-local; the owner translates it by
/// `pos.world_offset()`.
#[derive(Clone, Debug)]
pub struct Chunk {
    pos: ChunkPos,
    data: ChunkData,
    state: ChunkState,
    geometry: Option<ChunkGeometry>,
    mesh_builds: u32,
}

impl Chunk {
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            data: ChunkData::new_empty(),
            state: ChunkState::Empty,
            geometry: None,
            mesh_builds: 0,
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn is_generated(&self) -> bool {
        self.state == ChunkState::Generated
    }

    pub fn data(&self) -> &ChunkData {
        &self.data
    }

    /// Block at chunk-local coordinates; air outside the chunk.
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockType {
        LocalPos::new(x, y, z)
            .map(|local| self.data.get(local))
            .unwrap_or(BlockType::AIR)
    }

    /// Writes a block and returns the one it replaced. `None` means the
    /// coordinates lie outside the chunk and nothing was written.
    pub fn set(&mut self, x: i32, y: i32, z: i32, block: BlockType) -> Option<BlockType> {
        let local = LocalPos::new(x, y, z)?;
        let previous = self.data.get(local);
        if previous != block {
            self.data.set(local, block);
        }
        Some(previous)
    }

    /// Fills the chunk from the terrain generator. Returns false, leaving the
    /// chunk untouched, when terrain was already generated.
    pub fn generate_terrain(&mut self, generator: &TerrainGenerator) -> bool {
        if self.is_generated() {
            return false;
        }
        generator.fill_chunk(self.pos, &mut self.data);
        self.state = ChunkState::Generated;
        debug!(
            "Generated terrain for chunk ({}, {}): {} solid blocks",
            self.pos.x,
            self.pos.z,
            self.data.solid_count()
        );
        true
    }

    pub fn is_face_exposed(&self, x: i32, y: i32, z: i32) -> bool {
        !self.exposed_faces(x, y, z).is_empty()
    }

    /// Faces of a solid voxel that border air or the chunk boundary.
    pub fn exposed_faces(&self, x: i32, y: i32, z: i32) -> FaceMask {
        match LocalPos::new(x, y, z) {
            Some(local) => mesh::exposed_faces(&self.data, &ChunkNeighbors::default(), local),
            None => FaceMask::empty(),
        }
    }

    /// Rebuilds geometry treating everything outside the chunk as air.
    pub fn build_geometry(&mut self) -> &ChunkGeometry {
        self.build_geometry_with(&ChunkNeighbors::default())
    }

    pub fn build_geometry_with(&mut self, neighbors: &ChunkNeighbors<'_>) -> &ChunkGeometry {
        let geometry = mesh::build_chunk_geometry(&self.data, neighbors);
        self.install_geometry(geometry)
    }

    /// Stores geometry built elsewhere from this chunk's data.
    pub fn install_geometry(&mut self, geometry: ChunkGeometry) -> &ChunkGeometry {
        self.mesh_builds = self.mesh_builds.saturating_add(1);
        self.geometry.insert(geometry)
    }

    pub fn geometry(&self) -> Option<&ChunkGeometry> {
        self.geometry.as_ref()
    }

    pub fn mesh_builds(&self) -> u32 {
        self.mesh_builds
    }
}
