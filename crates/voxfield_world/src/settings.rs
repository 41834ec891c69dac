use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use voxfield_shared::coords::WORLD_HEIGHT;
use voxfield_shared::worldgen::TerrainParams;

use crate::error::SettingsError;

pub const MIN_RENDER_DISTANCE: i32 = 0;
pub const MAX_RENDER_DISTANCE: i32 = 32;
pub const MAX_WORKER_THREADS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Chebyshev radius, in chunks, kept resident around the observer.
    #[serde(default = "default_render_distance")]
    pub render_distance: i32,
    /// Upper bound on chunks generated per `load_around` call. 0 = no limit.
    #[serde(default)]
    pub max_chunks_per_tick: usize,
    /// Resident chunk cap enforced by LRU eviction. 0 = never evict.
    #[serde(default)]
    pub max_resident_chunks: usize,
    /// Chunk generation workers. 0 = generate on the calling thread.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default)]
    pub cull_chunk_borders: bool,
    #[serde(default)]
    pub terrain: TerrainParams,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            render_distance: default_render_distance(),
            max_chunks_per_tick: 0,
            max_resident_chunks: 0,
            worker_threads: 0,
            cull_chunk_borders: false,
            terrain: TerrainParams::default(),
        }
    }
}

impl WorldSettings {
    pub fn sanitize(mut self) -> Self {
        self.render_distance = self
            .render_distance
            .clamp(MIN_RENDER_DISTANCE, MAX_RENDER_DISTANCE);
        self.worker_threads = self.worker_threads.min(MAX_WORKER_THREADS);
        if self.max_resident_chunks != 0 {
            self.max_resident_chunks = self.max_resident_chunks.max(self.render_square_area());
        }

        let defaults = TerrainParams::default();
        let terrain = &mut self.terrain;
        if !terrain.base_height.is_finite() {
            terrain.base_height = defaults.base_height;
        }
        terrain.base_height = terrain.base_height.clamp(0.0, (WORLD_HEIGHT - 1) as f64);
        if !terrain.frequency.is_finite() || terrain.frequency <= 0.0 {
            terrain.frequency = defaults.frequency;
        }
        if !terrain.amplitude.is_finite() || terrain.amplitude < 0.0 {
            terrain.amplitude = defaults.amplitude;
        }
        self
    }

    /// Number of chunks in the square around the observer.
    pub fn render_square_area(&self) -> usize {
        let side = (2 * self.render_distance.max(0) + 1) as usize;
        side * side
    }

    pub fn from_toml_str(path: &Path, contents: &str) -> Result<Self, SettingsError> {
        let parsed = toml::from_str::<Self>(contents).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(parsed.sanitize())
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(path, &contents)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let settings = self.clone().sanitize();
        let serialized =
            toml::to_string_pretty(&settings).map_err(|e| SettingsError::Serialize {
                message: e.to_string(),
            })?;
        fs::write(path, serialized).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn default_seed() -> u64 {
    0xC0FFEE
}

fn default_render_distance() -> i32 {
    5
}
