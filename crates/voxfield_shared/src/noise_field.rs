//! Seeded 3D gradient noise used for terrain heightmaps.
//!
//! The permutation table is derived from the seed and built the first time a
//! field is sampled. After that it never changes, so a field always returns
//! the same value for the same coordinate.

use std::fmt;
use std::sync::OnceLock;

use noise::NoiseFn;
use tracing::trace;

const TABLE_SIZE: usize = 256;
const TABLE_MASK: i64 = TABLE_SIZE as i64 - 1;

pub struct NoiseField {
    seed: u64,
    // Doubled so that `hash + 1` lookups never wrap.
    permutation: OnceLock<Box<[u8; TABLE_SIZE * 2]>>,
}

impl NoiseField {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            permutation: OnceLock::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_initialized(&self) -> bool {
        self.permutation.get().is_some()
    }

    /// Samples the field at a continuous coordinate. The result is in [0, 1]
    /// and is exactly 0.5 on integer lattice points.
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let p = self.permutation();

        let (xi, x) = lattice(x);
        let (yi, y) = lattice(y);
        let (zi, z) = lattice(z);

        let u = fade(x);
        let v = fade(y);
        let w = fade(z);

        let a = usize::from(p[xi]) + yi;
        let aa = usize::from(p[a]) + zi;
        let ab = usize::from(p[a + 1]) + zi;
        let b = usize::from(p[xi + 1]) + yi;
        let ba = usize::from(p[b]) + zi;
        let bb = usize::from(p[b + 1]) + zi;

        let near = lerp(
            lerp(grad(p[aa], x, y, z), grad(p[ba], x - 1.0, y, z), u),
            lerp(grad(p[ab], x, y - 1.0, z), grad(p[bb], x - 1.0, y - 1.0, z), u),
            v,
        );
        let far = lerp(
            lerp(
                grad(p[aa + 1], x, y, z - 1.0),
                grad(p[ba + 1], x - 1.0, y, z - 1.0),
                u,
            ),
            lerp(
                grad(p[ab + 1], x, y - 1.0, z - 1.0),
                grad(p[bb + 1], x - 1.0, y - 1.0, z - 1.0),
                u,
            ),
            v,
        );

        ((lerp(near, far, w) + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    fn permutation(&self) -> &[u8; TABLE_SIZE * 2] {
        self.permutation.get_or_init(|| build_permutation(self.seed))
    }
}

impl Clone for NoiseField {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            permutation: self.permutation.clone(),
        }
    }
}

impl fmt::Debug for NoiseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseField")
            .field("seed", &self.seed)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl NoiseFn<f64, 3> for NoiseField {
    fn get(&self, point: [f64; 3]) -> f64 {
        self.sample(point[0], point[1], point[2])
    }
}

fn build_permutation(seed: u64) -> Box<[u8; TABLE_SIZE * 2]> {
    let mut state = seed;
    let mut base: [u8; TABLE_SIZE] = std::array::from_fn(|index| index as u8);
    for i in (1..TABLE_SIZE).rev() {
        let j = (splitmix64(&mut state) % (i as u64 + 1)) as usize;
        base.swap(i, j);
    }

    let mut table = Box::new([0u8; TABLE_SIZE * 2]);
    for (index, slot) in table.iter_mut().enumerate() {
        *slot = base[index % TABLE_SIZE];
    }
    trace!("Built noise permutation table for seed {seed:#x}");
    table
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Integer cell (wrapped into the table) and fractional offset of one axis.
/// Uses floor so negative coordinates land in the cell below.
fn lattice(value: f64) -> (usize, f64) {
    let value = if value.is_finite() { value } else { 0.0 };
    let floor = value.floor();
    (((floor as i64) & TABLE_MASK) as usize, value - floor)
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

// Low 4 bits of the hash select one of 12 edge gradients (4 repeated).
fn grad(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}
