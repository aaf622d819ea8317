//! Seeded gradient noise for organic micro-movement.
//!
//! Improved Perlin noise over a 256-entry permutation table. The table is
//! shuffled with a small linear congruential generator driven only by the
//! construction seed, so two fields built from the same seed produce the same
//! values forever.

const TABLE_SIZE: usize = 256;

pub const PUPIL_SEED: u64 = 100;
pub const EYEBROW_SEED: u64 = 200;
pub const HEAD_SEED: u64 = 300;
pub const MOUTH_SEED: u64 = 400;

#[derive(Debug, Clone)]
pub struct NoiseField {
    seed: u64,
    perm: [u8; TABLE_SIZE * 2],
}

/// LCG used only to shuffle the permutation table.
struct ShuffleRng {
    value: u64,
}

impl ShuffleRng {
    const MULTIPLIER: u64 = 9301;
    const INCREMENT: u64 = 49297;
    const MODULUS: u64 = 233280;

    fn new(seed: u64) -> Self {
        Self {
            value: seed % Self::MODULUS,
        }
    }

    fn next_f64(&mut self) -> f64 {
        self.value = (self.value * Self::MULTIPLIER + Self::INCREMENT) % Self::MODULUS;
        self.value as f64 / Self::MODULUS as f64
    }
}

impl NoiseField {
    pub fn new(seed: u64) -> Self {
        let mut table: [u8; TABLE_SIZE] = [0; TABLE_SIZE];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = i as u8;
        }

        let mut rng = ShuffleRng::new(seed);
        for i in (1..TABLE_SIZE).rev() {
            let j = ((rng.next_f64() * (i + 1) as f64).floor() as usize).min(i);
            table.swap(i, j);
        }

        let mut perm = [0u8; TABLE_SIZE * 2];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i % TABLE_SIZE];
        }

        Self { seed, perm }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn noise1d(&self, x: f64) -> f64 {
        self.noise3d(x, 0.0, 0.0)
    }

    pub fn noise2d(&self, x: f64, y: f64) -> f64 {
        self.noise3d(x, y, 0.0)
    }

    /// Value in [-1, 1].
    pub fn noise3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let xi = (x.floor() as i64 & 255) as usize;
        let yi = (y.floor() as i64 & 255) as usize;
        let zi = (z.floor() as i64 & 255) as usize;

        let x = x - x.floor();
        let y = y - y.floor();
        let z = z - z.floor();

        let u = fade(x);
        let v = fade(y);
        let w = fade(z);

        let p = &self.perm;
        let a = p[xi] as usize + yi;
        let aa = p[a] as usize + zi;
        let ab = p[a + 1] as usize + zi;
        let b = p[xi + 1] as usize + yi;
        let ba = p[b] as usize + zi;
        let bb = p[b + 1] as usize + zi;

        let value = lerp(
            lerp(
                lerp(grad(p[aa], x, y, z), grad(p[ba], x - 1.0, y, z), u),
                lerp(grad(p[ab], x, y - 1.0, z), grad(p[bb], x - 1.0, y - 1.0, z), u),
                v,
            ),
            lerp(
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
            ),
            w,
        );

        value.clamp(-1.0, 1.0)
    }

    /// `noise1d(time * frequency) * amplitude`
    pub fn sample(&self, time: f64, frequency: f64, amplitude: f64) -> f64 {
        self.noise1d(time * frequency) * amplitude
    }

    /// Two offset coordinates of the same field, as an (x, y) pair.
    pub fn sample2d(&self, time: f64, frequency: f64, amplitude: f64) -> (f64, f64) {
        let t = time * frequency;
        (self.noise2d(t, 0.0) * amplitude, self.noise2d(0.0, t) * amplitude)
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

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
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

/// The four independently seeded fields that drive micro-movement.
#[derive(Debug, Clone)]
pub struct NoiseChannels {
    pub pupil: NoiseField,
    pub eyebrow: NoiseField,
    pub head: NoiseField,
    pub mouth: NoiseField,
}

impl Default for NoiseChannels {
    fn default() -> Self {
        Self {
            pupil: NoiseField::new(PUPIL_SEED),
            eyebrow: NoiseField::new(EYEBROW_SEED),
            head: NoiseField::new(HEAD_SEED),
            mouth: NoiseField::new(MOUTH_SEED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_values() {
        let a = NoiseField::new(42);
        let b = NoiseField::new(42);

        for i in 0..1_000 {
            let t = i as f64 * 0.037;
            assert_eq!(a.noise1d(t), b.noise1d(t));
            assert_eq!(a.noise2d(t, t * 0.5), b.noise2d(t, t * 0.5));
        }
    }

    #[test]
    fn test_noise_range() {
        let field = NoiseField::new(100);
        for i in 0..10_000 {
            let t = i as f64 * 0.0173 - 50.0;
            let value = field.noise1d(t);
            assert!((-1.0..=1.0).contains(&value), "{} out of range at {}", value, t);
        }
    }

    #[test]
    fn test_channels_are_uncorrelated() {
        let channels = NoiseChannels::default();
        let differs = (0..200).any(|i| {
            let t = i as f64 * 0.31 + 0.5;
            channels.pupil.noise1d(t) != channels.eyebrow.noise1d(t)
        });
        assert!(differs);
    }

    #[test]
    fn test_noise_is_continuous() {
        let field = NoiseField::new(7);
        let mut previous = field.noise1d(0.0);
        for i in 1..2_000 {
            let current = field.noise1d(i as f64 * 0.001);
            assert!((current - previous).abs() < 0.05);
            previous = current;
        }
    }

    #[test]
    fn test_sample_scales_by_amplitude() {
        let field = NoiseField::new(300);
        let raw = field.noise1d(2.5 * 0.1);
        assert!((field.sample(2.5, 0.1, 0.5) - raw * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_integer_lattice_is_zero() {
        let field = NoiseField::new(400);
        assert_eq!(field.noise1d(3.0), 0.0);
    }
}
