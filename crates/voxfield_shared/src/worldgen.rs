use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::block::BlockType;
use crate::chunk::ChunkData;
use crate::coords::{ChunkPos, LocalPos, CHUNK_SIZE, WORLD_HEIGHT};
use crate::noise_field::NoiseField;

const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;
const WORLD_HEIGHT_I32: i32 = WORLD_HEIGHT as i32;
/// Stone stops this many blocks below the surface; the gap is dirt.
const DIRT_DEPTH: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainParams {
    #[serde(default = "default_base_height")]
    pub base_height: f64,
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            base_height: default_base_height(),
            frequency: default_frequency(),
            amplitude: default_amplitude(),
        }
    }
}

fn default_base_height() -> f64 {
    60.0
}

fn default_frequency() -> f64 {
    0.01
}

fn default_amplitude() -> f64 {
    20.0
}

/// Heightmap terrain driven by one noise field shared by every chunk, so
/// columns line up across chunk borders.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    noise: NoiseField,
    params: TerrainParams,
}

impl TerrainGenerator {
    pub fn new(seed: u64, params: TerrainParams) -> Self {
        Self {
            noise: NoiseField::new(seed),
            params,
        }
    }

    pub fn seed(&self) -> u64 {
        self.noise.seed()
    }

    /// World y of the grass block in column (x, z).
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        self.height_at(f64::from(world_x), f64::from(world_z))
    }

    /// Surface height of local column (x, z) of the chunk at `pos`. Defined
    /// for every chunk position, including ones whose block columns fall
    /// outside the `i32` range.
    pub fn column_height(&self, pos: ChunkPos, local_x: i32, local_z: i32) -> i32 {
        let world_x = i64::from(pos.x) * i64::from(CHUNK_SIZE_I32) + i64::from(local_x);
        let world_z = i64::from(pos.z) * i64::from(CHUNK_SIZE_I32) + i64::from(local_z);
        self.height_at(world_x as f64, world_z as f64)
    }

    fn height_at(&self, world_x: f64, world_z: f64) -> i32 {
        let frequency = self.params.frequency;
        let sample = self.noise.sample(world_x * frequency, 0.0, world_z * frequency);
        let height = (self.params.base_height + sample * self.params.amplitude).floor();
        (height as i32).clamp(0, WORLD_HEIGHT_I32 - 1)
    }

    /// Writes terrain columns into `data`. Cells above the surface are left
    /// untouched, so `data` is expected to start out empty.
    pub fn fill_chunk(&self, pos: ChunkPos, data: &mut ChunkData) {
        for z in 0..CHUNK_SIZE_I32 {
            for x in 0..CHUNK_SIZE_I32 {
                let surface = self.column_height(pos, x, z);

                for y in 0..=surface {
                    let block = layer_at(y, surface);
                    if let Some(local) = LocalPos::new(x, y, z) {
                        data.set(local, block);
                    }
                }
            }
        }
        trace!("Filled terrain for chunk ({}, {})", pos.x, pos.z);
    }

    pub fn generate_chunk(&self, pos: ChunkPos) -> ChunkData {
        let mut data = ChunkData::new_empty();
        self.fill_chunk(pos, &mut data);
        data
    }
}

/// Block at height `y` of a column whose grass sits at `surface`.
pub fn layer_at(y: i32, surface: i32) -> BlockType {
    if y == 0 {
        BlockType::Bedrock
    } else if y <= surface - (DIRT_DEPTH + 1) {
        BlockType::Stone
    } else if y < surface {
        BlockType::Dirt
    } else if y == surface {
        BlockType::Grass
    } else {
        BlockType::Air
    }
}
