use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::stages::GrainParams;

/// Grey noise at grain resolution. Both backends upscale it with the same
/// nearest-neighbour mapping, so a given seed yields the same grain everywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseField {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl NoiseField {
    pub fn generate(params: &GrainParams, width: u32, height: u32) -> Self {
        let size_factor = 0.5 + (params.size / 100.0) * 1.5;
        let nw = ((width as f32 / size_factor).round() as u32).max(1);
        let nh = ((height as f32 / size_factor).round() as u32).max(1);

        let roughness_factor = 0.5 + (params.roughness / 100.0) * 1.5;
        let intensity = (params.amount / 100.0) * 30.0 * roughness_factor;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let data = (0..(nw as usize) * (nh as usize))
            .map(|_| {
                let r: f32 = rng.gen();
                (128.0 + (r - 0.5) * 2.0 * intensity).clamp(0.0, 255.0) as u8
            })
            .collect();

        Self {
            width: nw,
            height: nh,
            data,
        }
    }

    /// Samples packed four per `u32`, least significant byte first; the tail
    /// word is zero-padded.
    pub fn packed(&self) -> Vec<u32> {
        self.data
            .chunks(4)
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                u32::from_le_bytes(word)
            })
            .collect()
    }

    /// Nearest-neighbour lookup for pixel `(x, y)` of a `full_w × full_h` image.
    #[inline]
    pub fn sample(&self, x: u32, y: u32, full_w: u32, full_h: u32) -> u8 {
        let nx = scale_index(x, self.width, full_w);
        let ny = scale_index(y, self.height, full_h);
        self.data[ny as usize * self.width as usize + nx as usize]
    }
}

#[inline]
fn scale_index(i: u32, small: u32, full: u32) -> u32 {
    ((i as u64 * small as u64 / full.max(1) as u64) as u32).min(small - 1)
}
