use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec3};
use tracing::trace;

use crate::block::BlockType;
use crate::chunk::ChunkData;
use crate::coords::{LocalPos, CHUNK_SIZE, WORLD_HEIGHT};

const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;
const WORLD_HEIGHT_I32: i32 = WORLD_HEIGHT as i32;
const HALF: f32 = 0.5;
const VERTICES_PER_QUAD: usize = 6;

/// Corners of a unit cube centered on the voxel coordinate.
const CUBE_CORNERS: [[f32; 3]; 8] = [
    [-HALF, -HALF, HALF],
    [HALF, -HALF, HALF],
    [HALF, HALF, HALF],
    [-HALF, HALF, HALF],
    [-HALF, -HALF, -HALF],
    [HALF, -HALF, -HALF],
    [HALF, HALF, -HALF],
    [-HALF, HALF, -HALF],
];

/// Two counter-clockwise triangles over a quad's four corners.
const QUAD_TRIANGLES: [usize; VERTICES_PER_QUAD] = [0, 1, 2, 0, 2, 3];

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaceMask: u8 {
        const FRONT  = 0b0000_0001;
        const BACK   = 0b0000_0010;
        const TOP    = 0b0000_0100;
        const BOTTOM = 0b0000_1000;
        const RIGHT  = 0b0001_0000;
        const LEFT   = 0b0010_0000;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
    Top,
    Bottom,
    Right,
    Left,
}

impl Face {
    /// Emission order for every voxel.
    pub const ALL: [Face; 6] = [
        Face::Front,
        Face::Back,
        Face::Top,
        Face::Bottom,
        Face::Right,
        Face::Left,
    ];

    pub fn normal(self) -> IVec3 {
        match self {
            Face::Front => IVec3::Z,
            Face::Back => IVec3::NEG_Z,
            Face::Top => IVec3::Y,
            Face::Bottom => IVec3::NEG_Y,
            Face::Right => IVec3::X,
            Face::Left => IVec3::NEG_X,
        }
    }

    pub fn flag(self) -> FaceMask {
        match self {
            Face::Front => FaceMask::FRONT,
            Face::Back => FaceMask::BACK,
            Face::Top => FaceMask::TOP,
            Face::Bottom => FaceMask::BOTTOM,
            Face::Right => FaceMask::RIGHT,
            Face::Left => FaceMask::LEFT,
        }
    }

    // Ordered counter-clockwise when looking at the face from outside the cube.
    fn corners(self) -> [usize; 4] {
        match self {
            Face::Front => [0, 1, 2, 3],
            Face::Back => [5, 4, 7, 6],
            Face::Top => [3, 2, 6, 7],
            Face::Bottom => [4, 5, 1, 0],
            Face::Right => [1, 5, 6, 2],
            Face::Left => [4, 0, 3, 7],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ColoredVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}
const _: [(); 24] = [(); std::mem::size_of::<ColoredVertex>()];

/// Non-indexed triangle list for one chunk, in chunk-local space. Vertex
/// `i` of `positions` is colored by `colors[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkGeometry {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
}

impl ChunkGeometry {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn quad_count(&self) -> usize {
        self.positions.len() / VERTICES_PER_QUAD
    }

    /// Positions as a flat `x, y, z, x, y, z, ...` slice.
    pub fn positions_flat(&self) -> &[f32] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Colors as a flat `r, g, b, r, g, b, ...` slice.
    pub fn colors_flat(&self) -> &[f32] {
        bytemuck::cast_slice(&self.colors)
    }

    pub fn interleaved(&self) -> Vec<ColoredVertex> {
        self.positions
            .iter()
            .zip(&self.colors)
            .map(|(&position, &color)| ColoredVertex { position, color })
            .collect()
    }

    pub fn quads(&self) -> impl Iterator<Item = GeometryQuad<'_>> + '_ {
        self.positions
            .chunks_exact(VERTICES_PER_QUAD)
            .zip(self.colors.chunks_exact(VERTICES_PER_QUAD))
            .map(|(positions, colors)| GeometryQuad {
                positions,
                color: colors[0],
            })
    }

    fn push_quad(&mut self, local: LocalPos, face: Face, color: [f32; 3]) {
        let center = [
            f32::from(local.x),
            f32::from(local.y),
            f32::from(local.z),
        ];
        let corners = face.corners();
        for corner in QUAD_TRIANGLES {
            let offset = CUBE_CORNERS[corners[corner]];
            self.positions.push([
                center[0] + offset[0],
                center[1] + offset[1],
                center[2] + offset[2],
            ]);
            self.colors.push(color);
        }
    }
}

/// One emitted face: six vertices forming two triangles.
#[derive(Clone, Copy, Debug)]
pub struct GeometryQuad<'a> {
    pub positions: &'a [[f32; 3]],
    pub color: [f32; 3],
}

impl GeometryQuad<'_> {
    pub fn center(&self) -> Vec3 {
        let sum: Vec3 = self.positions.iter().map(|&p| Vec3::from(p)).sum();
        sum / self.positions.len() as f32
    }

    /// Unit normal of the first triangle, following its winding.
    pub fn normal(&self) -> Vec3 {
        let a = Vec3::from(self.positions[0]);
        let b = Vec3::from(self.positions[1]);
        let c = Vec3::from(self.positions[2]);
        (b - a).cross(c - a).normalize_or_zero()
    }

    /// Local coordinate of the voxel this face belongs to.
    pub fn block(&self) -> IVec3 {
        (self.center() - self.normal() * HALF).round().as_ivec3()
    }
}

/// Boundary layers of the four horizontal neighbors, used to decide whether a
/// face on the chunk border is hidden. A missing neighbor counts as air.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkNeighbors<'a> {
    pub pos_x: Option<&'a ChunkData>,
    pub neg_x: Option<&'a ChunkData>,
    pub pos_z: Option<&'a ChunkData>,
    pub neg_z: Option<&'a ChunkData>,
}

/// Block at chunk-local coordinates that may step one cell outside the chunk.
pub fn sample_block(
    chunk: &ChunkData,
    neighbors: &ChunkNeighbors<'_>,
    coords: IVec3,
) -> BlockType {
    let IVec3 { x, y, z } = coords;
    if !(0..WORLD_HEIGHT_I32).contains(&y) {
        return BlockType::AIR;
    }

    let neighbor = match (axis_out(x), axis_out(z)) {
        (0, 0) => Some(chunk),
        (-1, 0) => neighbors.neg_x,
        (1, 0) => neighbors.pos_x,
        (0, -1) => neighbors.neg_z,
        (0, 1) => neighbors.pos_z,
        _ => None,
    };

    neighbor
        .and_then(|data| {
            LocalPos::new(wrap_to_local(x), y, wrap_to_local(z)).map(|local| data.get(local))
        })
        .unwrap_or(BlockType::AIR)
}

/// Faces of the voxel at `local` that touch a non-solid cell. Empty for air.
pub fn exposed_faces(
    chunk: &ChunkData,
    neighbors: &ChunkNeighbors<'_>,
    local: LocalPos,
) -> FaceMask {
    if !chunk.get(local).is_solid() {
        return FaceMask::empty();
    }

    let origin = IVec3::new(
        i32::from(local.x),
        i32::from(local.y),
        i32::from(local.z),
    );
    let mut mask = FaceMask::empty();
    for face in Face::ALL {
        if !sample_block(chunk, neighbors, origin + face.normal()).is_solid() {
            mask |= face.flag();
        }
    }
    mask
}

/// Emits one quad per exposed face of every solid voxel.
pub fn build_chunk_geometry(chunk: &ChunkData, neighbors: &ChunkNeighbors<'_>) -> ChunkGeometry {
    let mut geometry = ChunkGeometry::default();

    for y in 0..WORLD_HEIGHT_I32 {
        for z in 0..CHUNK_SIZE_I32 {
            for x in 0..CHUNK_SIZE_I32 {
                let Some(local) = LocalPos::new(x, y, z) else {
                    continue;
                };
                let block = chunk.get(local);
                if !block.is_solid() {
                    continue;
                }

                let mask = exposed_faces(chunk, neighbors, local);
                if mask.is_empty() {
                    continue;
                }

                let color = block.color();
                for face in Face::ALL {
                    if mask.contains(face.flag()) {
                        geometry.push_quad(local, face, color);
                    }
                }
            }
        }
    }

    trace!(
        "Built chunk geometry: {} quads, {} vertices",
        geometry.quad_count(),
        geometry.vertex_count()
    );
    geometry
}

fn axis_out(value: i32) -> i8 {
    if value < 0 {
        -1
    } else if value >= CHUNK_SIZE_I32 {
        1
    } else {
        0
    }
}

fn wrap_to_local(value: i32) -> i32 {
    if value < 0 {
        value + CHUNK_SIZE_I32
    } else if value >= CHUNK_SIZE_I32 {
        value - CHUNK_SIZE_I32
    } else {
        value
    }
}
