use std::env;

use voxfield_shared::block::BlockType;
use voxfield_shared::coords::{ChunkPos, LocalPos, CHUNK_SIZE, WORLD_HEIGHT};
use voxfield_shared::worldgen::{TerrainGenerator, TerrainParams};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 3 {
        eprintln!("Usage: heightmap_probe <seed> <chunk_x> <chunk_z>");
        std::process::exit(2);
    }

    if let Err(err) = run(&args[0], &args[1], &args[2]) {
        eprintln!("heightmap_probe error: {err}");
        std::process::exit(1);
    }
}

fn run(seed: &str, chunk_x: &str, chunk_z: &str) -> Result<(), String> {
    let seed = parse_seed(seed)?;
    let chunk_x = chunk_x
        .parse::<i32>()
        .map_err(|err| format!("invalid chunk x '{chunk_x}': {err}"))?;
    let chunk_z = chunk_z
        .parse::<i32>()
        .map_err(|err| format!("invalid chunk z '{chunk_z}': {err}"))?;

    let pos = ChunkPos::new(chunk_x, chunk_z);
    let generator = TerrainGenerator::new(seed, TerrainParams::default());
    let data = generator.generate_chunk(pos);
    let size = CHUNK_SIZE as i32;

    println!("Seed: {:#x}", generator.seed());
    println!("Chunk: ({}, {})", pos.x, pos.z);
    println!("Surface heights (rows = z, columns = x):");
    let mut min = i32::MAX;
    let mut max = i32::MIN;
    for z in 0..size {
        let row: Vec<String> = (0..size)
            .map(|x| {
                let h = generator.column_height(pos, x, z);
                min = min.min(h);
                max = max.max(h);
                format!("{h:3}")
            })
            .collect();
        println!("  {}", row.join(" "));
    }
    println!("Height range: {min}..={max}");
    println!("Solid blocks: {}", data.solid_count());

    println!("Column (0, 0) layers:");
    let column: Vec<BlockType> = (0..WORLD_HEIGHT as i32)
        .filter_map(|y| LocalPos::new(0, y, 0))
        .map(|local| data.get(local))
        .collect();
    let mut run_start = 0;
    for y in 1..=column.len() {
        if y == column.len() || column[y] != column[run_start] {
            println!("  y {:3}..={:3}  {}", run_start, y - 1, column[run_start].name());
            run_start = y;
        }
    }
    Ok(())
}

fn parse_seed(value: &str) -> Result<u64, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed.map_err(|err| format!("invalid seed '{value}': {err}"))
}
