//! Tiling noise textures and sampling kernels
//!
//! Both nodes tile a small texture of random unit vectors across the output
//! resolution and the shadow node additionally draws a kernel of unit
//! offsets. The generator is injected so regeneration is deterministic under
//! a fixed seed.

use glam::Vec2;
use rand::Rng;

/// Encode a signed-normalized component to an unsigned byte:
/// `round(c * 128 + 128) & 0xFF`. Wrap-around semantics, not saturating.
pub fn encode_snorm_byte(component: f32) -> u8 {
    (((component * 128.0 + 128.0).round() as i64) & 0xff) as u8
}

/// Inverse of [`encode_snorm_byte`] up to quantization.
pub fn decode_snorm_byte(byte: u8) -> f32 {
    (byte as f32 - 128.0) / 128.0
}

/// Draw a random unit vector with components initially uniform in [-1, 1).
pub fn random_unit_vec2<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    loop {
        let v = Vec2::new(
            rng.random::<f32>() * 2.0 - 1.0,
            rng.random::<f32>() * 2.0 - 1.0,
        );
        // Degenerate draws cannot be normalized; redraw.
        if v.length_squared() > 1e-6 {
            return v.normalize();
        }
    }
}

/// Generate a tightly packed `size * size * components` byte buffer of unit
/// vectors on the z = 0 plane, row-major and component-interleaved.
/// `components` is 2 or 3; the third component encodes zero.
pub fn generate_noise<R: Rng + ?Sized>(rng: &mut R, size: u32, components: usize) -> Vec<u8> {
    debug_assert!(components == 2 || components == 3);
    let count = (size * size) as usize;
    let mut data = Vec::with_capacity(count * components);
    for _ in 0..count {
        let noise = random_unit_vec2(rng);
        data.push(encode_snorm_byte(noise.x));
        data.push(encode_snorm_byte(noise.y));
        if components == 3 {
            data.push(encode_snorm_byte(0.0));
        }
    }
    data
}

/// Generate `count` random unit offsets for the shadow sampling kernel.
pub fn generate_kernel<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Vec2> {
    (0..count).map(|_| random_unit_vec2(rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    #[test]
    fn encode_decode_round_trip() {
        // Components are drawn from [-1, 1); exactly 1.0 wraps by design.
        for &c in &[-1.0f32, -0.5, -1.0 / 256.0, 0.0, 0.3, 0.7, 127.0 / 128.0] {
            let decoded = decode_snorm_byte(encode_snorm_byte(c));
            assert!(
                (decoded - c).abs() <= 1.0 / 128.0,
                "component {c} decoded to {decoded}"
            );
        }
    }

    #[test]
    fn encode_wraps_instead_of_saturating() {
        assert_eq!(encode_snorm_byte(1.0), 0);
        assert_eq!(encode_snorm_byte(0.0), 128);
        assert_eq!(encode_snorm_byte(-1.0), 0);
    }

    #[rstest]
    #[case(2, 2)]
    #[case(4, 3)]
    #[case(8, 2)]
    fn noise_buffer_length(#[case] size: u32, #[case] components: usize) {
        let mut rng = StdRng::seed_from_u64(7);
        let data = generate_noise(&mut rng, size, components);
        assert_eq!(data.len(), (size * size) as usize * components);
    }

    #[test]
    fn noise_encodes_unit_vectors() {
        let mut rng = StdRng::seed_from_u64(42);
        let data = generate_noise(&mut rng, 4, 3);
        for texel in data.chunks_exact(3) {
            let v = Vec2::new(decode_snorm_byte(texel[0]), decode_snorm_byte(texel[1]));
            assert!((v.length() - 1.0).abs() < 0.05, "not unit length: {v}");
            assert_eq!(texel[2], encode_snorm_byte(0.0));
        }
    }

    #[test]
    fn kernel_vectors_are_unit_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let kernel = generate_kernel(&mut rng, 16);
        assert_eq!(kernel.len(), 16);
        for v in kernel {
            assert!((v.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn generation_is_deterministic_under_a_seed() {
        let mut a = StdRng::seed_from_u64(11);
        let mut b = StdRng::seed_from_u64(11);
        assert_eq!(generate_noise(&mut a, 4, 2), generate_noise(&mut b, 4, 2));
        assert_eq!(generate_kernel(&mut a, 8), generate_kernel(&mut b, 8));
    }
}
