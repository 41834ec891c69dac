use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

pub const CHUNK_SIZE: usize = 16;
pub const WORLD_HEIGHT: usize = 256;
pub const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;
pub const CHUNK_VOLUME: usize = CHUNK_AREA * WORLD_HEIGHT;

const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;
const WORLD_HEIGHT_I32: i32 = WORLD_HEIGHT as i32;

/// Chunk coordinates that contain at least one `i32` block column.
pub const MIN_CHUNK_COORD: i32 = i32::MIN / CHUNK_SIZE_I32;
pub const MAX_CHUNK_COORD: i32 = i32::MAX / CHUNK_SIZE_I32;

// LocalPos stores every axis in a u8.
const _: () = assert!(CHUNK_SIZE <= 256 && WORLD_HEIGHT <= 256);

/// Position of a chunk on the horizontal chunk grid. A chunk spans the full
/// world height, so there is no vertical component.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chebyshev distance in chunks, saturating at `i32::MAX`.
    pub fn distance(self, other: ChunkPos) -> i32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).abs();
        i32::try_from(dx.max(dz)).unwrap_or(i32::MAX)
    }

    /// Neighbor position, or `None` when it is not representable.
    pub fn checked_offset(self, dx: i32, dz: i32) -> Option<ChunkPos> {
        Some(ChunkPos::new(self.x.checked_add(dx)?, self.z.checked_add(dz)?))
    }

    /// World-space translation of this chunk's local origin.
    pub fn world_offset(self) -> Vec3 {
        let size = CHUNK_SIZE as f32;
        Vec3::new(self.x as f32 * size, 0.0, self.z as f32 * size)
    }

    /// Every representable chunk within `radius` (Chebyshev) of `self`,
    /// nearest ring first, then ordered by (x, z) inside a ring.
    pub fn square_around(self, radius: i32) -> Vec<ChunkPos> {
        let radius = radius.max(0);
        let side = (2 * radius as usize) + 1;
        let mut positions = Vec::with_capacity(side * side);
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                if let Some(pos) = self.checked_offset(dx, dz) {
                    positions.push(pos);
                }
            }
        }
        positions.sort_by_key(|pos| (pos.distance(self), pos.x, pos.z));
        positions
    }
}

impl LocalPos {
    /// Bounds-checked conversion; `None` when any axis is outside the chunk.
    pub fn new(x: i32, y: i32, z: i32) -> Option<Self> {
        if !(0..CHUNK_SIZE_I32).contains(&x)
            || !(0..WORLD_HEIGHT_I32).contains(&y)
            || !(0..CHUNK_SIZE_I32).contains(&z)
        {
            return None;
        }
        Some(Self {
            x: x as u8,
            y: y as u8,
            z: z as u8,
        })
    }
}

fn div_rem_floor(value: i32, divisor: i32) -> (i32, i32) {
    let mut q = value / divisor;
    let mut r = value % divisor;
    if r < 0 {
        q -= 1;
        r += divisor;
    }
    (q, r)
}

/// Chunk column containing the world block column (x, z).
pub fn chunk_pos_of(world_x: i32, world_z: i32) -> ChunkPos {
    let size = CHUNK_SIZE_I32;
    ChunkPos {
        x: div_rem_floor(world_x, size).0,
        z: div_rem_floor(world_z, size).0,
    }
}

/// Chunk column containing a continuous world position. Positions beyond
/// the `i32` block range clamp to the outermost chunk.
pub fn chunk_pos_of_point(position: Vec3) -> ChunkPos {
    let size = CHUNK_SIZE as f32;
    let axis = |value: f32| {
        ((value / size).floor() as i32).clamp(MIN_CHUNK_COORD, MAX_CHUNK_COORD)
    };
    ChunkPos {
        x: axis(position.x),
        z: axis(position.z),
    }
}

/// Splits a world position into its chunk and in-chunk position. `None` when
/// y lies outside the world height.
pub fn world_to_chunk(world_pos: IVec3) -> Option<(ChunkPos, LocalPos)> {
    let size = CHUNK_SIZE_I32;

    let (chunk_x, local_x) = div_rem_floor(world_pos.x, size);
    let (chunk_z, local_z) = div_rem_floor(world_pos.z, size);
    let local = LocalPos::new(local_x, world_pos.y, local_z)?;

    Some((
        ChunkPos {
            x: chunk_x,
            z: chunk_z,
        },
        local,
    ))
}

pub fn chunk_to_world(chunk_pos: ChunkPos, local: LocalPos) -> IVec3 {
    let size = CHUNK_SIZE_I32;
    IVec3::new(
        chunk_pos.x * size + i32::from(local.x),
        i32::from(local.y),
        chunk_pos.z * size + i32::from(local.z),
    )
}

pub fn local_to_index(local: LocalPos) -> usize {
    usize::from(local.x) + usize::from(local.z) * CHUNK_SIZE + usize::from(local.y) * CHUNK_AREA
}

pub fn index_to_local(index: usize) -> LocalPos {
    assert!(index < CHUNK_VOLUME, "chunk index out of bounds: {index}");

    let y = index / CHUNK_AREA;
    let rem = index % CHUNK_AREA;
    let z = rem / CHUNK_SIZE;
    let x = rem % CHUNK_SIZE;

    LocalPos {
        x: x as u8,
        y: y as u8,
        z: z as u8,
    }
}
