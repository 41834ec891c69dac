use serde::{Deserialize, Serialize};

#[repr(u8)]
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    #[default]
    Air = 0,
    Grass = 1,
    Dirt = 2,
    Stone = 3,
    Wood = 4,
    Leaves = 5,
    Cobblestone = 6,
    Bedrock = 7,
    Water = 8,
    Sand = 9,
    #[serde(rename = "oak_log")]
    Log = 10,
}

impl BlockType {
    pub const AIR: Self = BlockType::Air;

    pub const ALL: [BlockType; 11] = [
        BlockType::Air,
        BlockType::Grass,
        BlockType::Dirt,
        BlockType::Stone,
        BlockType::Wood,
        BlockType::Leaves,
        BlockType::Cobblestone,
        BlockType::Bedrock,
        BlockType::Water,
        BlockType::Sand,
        BlockType::Log,
    ];

    pub fn is_air(self) -> bool {
        self == BlockType::AIR
    }

    /// Every non-air block occupies its cell and hides the faces it touches.
    pub fn is_solid(self) -> bool {
        !self.is_air()
    }

    /// Key used by the external texture synthesizer.
    pub fn name(self) -> &'static str {
        match self {
            BlockType::Air => "air",
            BlockType::Grass => "grass",
            BlockType::Dirt => "dirt",
            BlockType::Stone => "stone",
            BlockType::Wood => "wood",
            BlockType::Leaves => "leaves",
            BlockType::Cobblestone => "cobblestone",
            BlockType::Bedrock => "bedrock",
            BlockType::Water => "water",
            BlockType::Sand => "sand",
            BlockType::Log => "oak_log",
        }
    }

    pub fn from_name(name: &str) -> Option<BlockType> {
        Self::ALL.into_iter().find(|block| block.name() == name)
    }

    /// Flat vertex color, RGB in 0..=1.
    pub fn color(self) -> [f32; 3] {
        match self {
            BlockType::Air => [0.0, 0.0, 0.0],
            BlockType::Grass => [0.4, 0.8, 0.4],
            BlockType::Dirt => [0.6, 0.4, 0.2],
            BlockType::Stone => [0.5, 0.5, 0.5],
            BlockType::Wood => [0.6, 0.4, 0.2],
            BlockType::Leaves => [0.2, 0.6, 0.2],
            BlockType::Cobblestone => [0.4, 0.4, 0.4],
            BlockType::Bedrock => [0.1, 0.1, 0.1],
            // #2196F3
            BlockType::Water => [0.13, 0.59, 0.95],
            BlockType::Sand => [0.9, 0.8, 0.5],
            BlockType::Log => [0.5, 0.3, 0.1],
        }
    }
}
