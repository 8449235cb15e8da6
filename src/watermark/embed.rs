//! Block quantization embedder over the LL band of the chroma planes.

use image::RgbImage;
use ndarray::{s, Array2, Axis};

use crate::error::{Error, Result};

use super::transform::{self, BlockDct, Subbands, BLOCK};
use super::Algorithm;

/// Image pixels covered by one embedding block along each axis
/// (one DWT level halves, then `BLOCK` LL samples).
const PIXELS_PER_BLOCK: u32 = 2 * BLOCK as u32;

/// Number of blocks per channel an image of this size offers.
#[must_use]
pub fn capacity(width: u32, height: u32) -> usize {
    (width / PIXELS_PER_BLOCK) as usize * (height / PIXELS_PER_BLOCK) as usize
}

/// Fail unless every payload bit lands in at least one block.
///
/// # Errors
///
/// Returns [`Error::UnsupportedDimensions`] when the image is too small.
pub fn ensure_capacity(width: u32, height: u32, bit_len: usize) -> Result<()> {
    let blocks = capacity(width, height);
    if blocks < bit_len {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: format!("{blocks} blocks cannot carry a {bit_len}-bit watermark"),
        });
    }
    Ok(())
}

/// Payload bytes to bits, most significant bit first.
#[must_use]
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
        .collect()
}

/// Bits back to bytes, most significant bit first. A trailing partial
/// byte is padded with zeros.
#[must_use]
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | (u8::from(bit) << (7 - i)))
        })
        .collect()
}

/// Quantize `value` onto the lattice point that encodes `bit`.
#[inline]
fn quantize(value: f32, bit: bool, scale: f32) -> f32 {
    let offset = if bit { 0.75 } else { 0.25 };
    ((value / scale).floor() + offset) * scale
}

/// Read back the bit a quantized value encodes.
#[inline]
fn reads_one(value: f32, scale: f32) -> bool {
    value.rem_euclid(scale) > scale * 0.5
}

/// Row and column of the largest-magnitude AC coefficient.
fn largest_ac(coeffs: &Array2<f32>) -> (usize, usize) {
    coeffs
        .indexed_iter()
        .skip(1)
        .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
        .map_or((0, 1), |(idx, _)| idx)
}

impl Algorithm {
    /// Embed one bit into a block of DCT coefficients.
    fn embed_block(self, coeffs: &mut Array2<f32>, bit: bool, scale: f32) {
        match self {
            Self::DwtDct => {
                let idx = largest_ac(coeffs);
                let value = coeffs[idx];
                coeffs[idx] = quantize(value.abs(), bit, scale).copysign(value);
            }
            Self::DwtDctSvd => {
                let (sigma, u, v) = transform::top_singular(coeffs);
                let outer = u
                    .view()
                    .insert_axis(Axis(1))
                    .dot(&v.view().insert_axis(Axis(0)));
                coeffs.scaled_add(quantize(sigma, bit, scale) - sigma, &outer);
            }
        }
    }

    /// Recover the bit a block of DCT coefficients votes for.
    fn extract_block(self, coeffs: &Array2<f32>, scale: f32) -> bool {
        match self {
            Self::DwtDct => reads_one(coeffs[largest_ac(coeffs)].abs(), scale),
            Self::DwtDctSvd => reads_one(transform::top_singular(coeffs).0, scale),
        }
    }
}

/// Even-sized region of the image the transforms operate on.
fn working_area(rgb: &RgbImage) -> (usize, usize) {
    ((rgb.width() & !1) as usize, (rgb.height() & !1) as usize)
}

/// Visit every block of the LL band in row-major order.
fn for_each_block(ll: &mut Array2<f32>, mut visit: impl FnMut(usize, &mut Array2<f32>)) {
    let (rows, cols) = ll.dim();
    let mut index = 0;

    for by in 0..rows / BLOCK {
        for bx in 0..cols / BLOCK {
            let mut view = ll.slice_mut(s![
                by * BLOCK..(by + 1) * BLOCK,
                bx * BLOCK..(bx + 1) * BLOCK
            ]);
            let mut block = view.to_owned();
            visit(index, &mut block);
            view.assign(&block);
            index += 1;
        }
    }
}

/// Embed `bits` into the pixels of `rgb`.
///
/// Block `n` of each embedding channel carries `bits[n % bits.len()]`.
/// Channels whose scale is zero are left untouched, as are pixels in a
/// trailing odd row or column.
///
/// # Errors
///
/// Returns an error if the image cannot carry every bit.
pub fn embed_bits(
    rgb: &mut RgbImage,
    bits: &[bool],
    algorithm: Algorithm,
    scales: [f32; 3],
) -> Result<()> {
    ensure_capacity(rgb.width(), rgb.height(), bits.len())?;

    let (width, height) = working_area(rgb);
    let dct = BlockDct::new();
    let mut planes = transform::rgb_to_yuv(rgb, width, height);

    for (plane, &scale) in planes.iter_mut().zip(scales.iter()) {
        if scale == 0.0 {
            continue;
        }

        let mut bands: Subbands = transform::haar_forward(plane);
        for_each_block(&mut bands.ll, |index, block| {
            let mut coeffs = dct.forward(block.view());
            algorithm.embed_block(&mut coeffs, bits[index % bits.len()], scale);
            *block = dct.inverse(coeffs.view());
        });
        *plane = transform::haar_inverse(&bands);
    }

    transform::yuv_to_rgb(&planes, rgb);
    tracing::debug!(
        "Embedded {} bits with {algorithm} over {width}x{height} pixels",
        bits.len()
    );

    Ok(())
}

/// Extract `bit_len` bits from the pixels of `rgb`.
///
/// Every block votes for the bit it carries; votes are averaged per bit
/// and across embedding channels, and a bit reads as set when more than
/// half of the votes say so.
///
/// # Errors
///
/// Returns an error if the image is too small to hold `bit_len` bits.
#[allow(clippy::cast_precision_loss)]
pub fn extract_bits(
    rgb: &RgbImage,
    bit_len: usize,
    algorithm: Algorithm,
    scales: [f32; 3],
) -> Result<Vec<bool>> {
    ensure_capacity(rgb.width(), rgb.height(), bit_len)?;

    let (width, height) = working_area(rgb);
    let dct = BlockDct::new();
    let planes = transform::rgb_to_yuv(rgb, width, height);

    let mut averages = vec![0.0_f32; bit_len];
    let mut channels = 0_u32;

    for (plane, &scale) in planes.iter().zip(scales.iter()) {
        if scale == 0.0 {
            continue;
        }

        let mut ones = vec![0_u32; bit_len];
        let mut seen = vec![0_u32; bit_len];
        let mut ll = transform::haar_forward(plane).ll;

        for_each_block(&mut ll, |index, block| {
            let slot = index % bit_len;
            let coeffs = dct.forward(block.view());
            if algorithm.extract_block(&coeffs, scale) {
                ones[slot] += 1;
            }
            seen[slot] += 1;
        });

        for ((avg, &one), &count) in averages.iter_mut().zip(&ones).zip(&seen) {
            *avg += one as f32 / count.max(1) as f32;
        }
        channels += 1;
    }

    let channels = channels.max(1) as f32;
    Ok(averages.iter().map(|avg| avg / channels > 0.5).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SCALES: [f32; 3] = [0.0, 36.0, 36.0];

    fn noisy(width: u32, height: u32, seed: u64) -> RgbImage {
        let mut rng = StdRng::seed_from_u64(seed);
        RgbImage::from_fn(width, height, |_, _| {
            Rgb([
                rng.random_range(80..176),
                rng.random_range(80..176),
                rng.random_range(80..176),
            ])
        })
    }

    #[test]
    fn test_bits_roundtrip_msb_first() {
        let bits = bytes_to_bits(&[0b1000_0001, 0xff]);
        assert_eq!(bits.len(), 16);
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[7]);
        assert_eq!(bits_to_bytes(&bits), vec![0b1000_0001, 0xff]);
    }

    #[test]
    fn test_quantize_reads_back() {
        for value in [0.0_f32, 5.0, 17.9, 18.1, 35.9, 1000.3] {
            assert!(reads_one(quantize(value, true, 36.0), 36.0));
            assert!(!reads_one(quantize(value, false, 36.0), 36.0));
        }
    }

    #[test]
    fn test_capacity() {
        assert_eq!(capacity(256, 256), 1024);
        assert_eq!(capacity(17, 9), 2);
        assert_eq!(capacity(7, 100), 0);
        assert!(ensure_capacity(96, 96, 144).is_ok());
        assert!(matches!(
            ensure_capacity(64, 64, 144),
            Err(Error::UnsupportedDimensions { .. })
        ));
    }

    #[test]
    fn test_svd_block_roundtrip() {
        let dct = BlockDct::new();
        let block = Array2::from_shape_fn((BLOCK, BLOCK), |(r, c)| 250.0 + (r * 4 + c) as f32);

        for bit in [false, true] {
            let mut coeffs = dct.forward(block.view());
            Algorithm::DwtDctSvd.embed_block(&mut coeffs, bit, 36.0);
            assert_eq!(Algorithm::DwtDctSvd.extract_block(&coeffs, 36.0), bit);
        }
    }

    #[test]
    fn test_dct_block_keeps_sign() {
        let mut coeffs = Array2::<f32>::zeros((BLOCK, BLOCK));
        coeffs[[0, 0]] = 500.0;
        coeffs[[2, 1]] = -40.0;

        Algorithm::DwtDct.embed_block(&mut coeffs, true, 36.0);

        assert!((coeffs[[2, 1]] - -63.0).abs() < 1e-4);
        assert!(Algorithm::DwtDct.extract_block(&coeffs, 36.0));
    }

    #[test]
    fn test_roundtrip_through_pixels() {
        let bits = bytes_to_bits(b"\xc2\xa9 test");

        for algorithm in [Algorithm::DwtDctSvd, Algorithm::DwtDct] {
            let mut rgb = noisy(512, 512, 7);
            embed_bits(&mut rgb, &bits, algorithm, SCALES).unwrap();

            let recovered = extract_bits(&rgb, bits.len(), algorithm, SCALES).unwrap();
            assert_eq!(recovered, bits, "{algorithm}");
        }
    }

    #[test]
    fn test_odd_edges_untouched() {
        let bits = bytes_to_bits(b"ab");
        let original = noisy(129, 65, 3);
        let mut rgb = original.clone();

        embed_bits(&mut rgb, &bits, Algorithm::DwtDctSvd, SCALES).unwrap();

        for y in 0..65 {
            assert_eq!(rgb.get_pixel(128, y), original.get_pixel(128, y));
        }
        for x in 0..129 {
            assert_eq!(rgb.get_pixel(x, 64), original.get_pixel(x, 64));
        }
    }

    #[test]
    fn test_zero_scale_channel_is_not_read() {
        let rgb = noisy(64, 64, 11);
        let bits = extract_bits(&rgb, 8, Algorithm::DwtDctSvd, [0.0, 0.0, 0.0]).unwrap();
        assert_eq!(bits, vec![false; 8]);
    }
}
