pub mod block;
pub mod chunk;
pub mod coords;
pub mod mesh;
pub mod noise_field;
pub mod worldgen;
