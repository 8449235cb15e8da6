//! Colour, wavelet and block transforms used by the embedder.

use image::{Rgb, RgbImage};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Side length of the square blocks the LL band is split into.
pub const BLOCK: usize = 4;

/// Offset added to the chroma planes.
const CHROMA_OFFSET: f32 = 128.0;

const KR: f32 = 0.299;
const KG: f32 = 0.587;
const KB: f32 = 0.114;
const U_GAIN: f32 = 0.492;
const V_GAIN: f32 = 0.877;

/// Power iterations used to find the dominant singular vector.
const POWER_ITERATIONS: usize = 32;

/// Y, U and V planes of an image region, indexed `[[row, col]]`.
pub type YuvPlanes = [Array2<f32>; 3];

/// Convert the top-left `width` x `height` region of an image to YUV.
#[allow(clippy::cast_possible_truncation)]
pub fn rgb_to_yuv(rgb: &RgbImage, width: usize, height: usize) -> YuvPlanes {
    let mut y_plane = Array2::<f32>::zeros((height, width));
    let mut u_plane = Array2::<f32>::zeros((height, width));
    let mut v_plane = Array2::<f32>::zeros((height, width));

    for row in 0..height {
        for col in 0..width {
            let Rgb([r, g, b]) = *rgb.get_pixel(col as u32, row as u32);
            let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));

            let y = KR.mul_add(r, KG.mul_add(g, KB * b));
            y_plane[[row, col]] = y;
            u_plane[[row, col]] = U_GAIN.mul_add(b - y, CHROMA_OFFSET);
            v_plane[[row, col]] = V_GAIN.mul_add(r - y, CHROMA_OFFSET);
        }
    }

    [y_plane, u_plane, v_plane]
}

/// Write YUV planes back over the matching top-left region of an image.
///
/// This is the exact inverse of [`rgb_to_yuv`] before rounding.
#[allow(clippy::cast_possible_truncation, clippy::suboptimal_flops)]
pub fn yuv_to_rgb(planes: &YuvPlanes, rgb: &mut RgbImage) {
    let [y_plane, u_plane, v_plane] = planes;
    let (height, width) = y_plane.dim();

    for row in 0..height {
        for col in 0..width {
            let y = y_plane[[row, col]];
            let b = y + (u_plane[[row, col]] - CHROMA_OFFSET) / U_GAIN;
            let r = y + (v_plane[[row, col]] - CHROMA_OFFSET) / V_GAIN;
            let g = (y - KR * r - KB * b) / KG;

            rgb.put_pixel(
                col as u32,
                row as u32,
                Rgb([to_u8(r), to_u8(g), to_u8(b)]),
            );
        }
    }
}

/// Round and clamp a channel value to `u8`.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(value: f32) -> u8 {
    // Safe: clamped to [0, 255] range before casting
    value.round().clamp(0.0, 255.0) as u8
}

/// One level of an orthonormal Haar decomposition.
#[derive(Debug, Clone)]
pub struct Subbands {
    /// Approximation band.
    pub ll: Array2<f32>,
    /// Horizontal detail.
    pub lh: Array2<f32>,
    /// Vertical detail.
    pub hl: Array2<f32>,
    /// Diagonal detail.
    pub hh: Array2<f32>,
}

/// Forward Haar DWT. Both dimensions of `plane` must be even.
pub fn haar_forward(plane: &Array2<f32>) -> Subbands {
    let (rows, cols) = plane.dim();
    let half = (rows / 2, cols / 2);

    let mut bands = Subbands {
        ll: Array2::zeros(half),
        lh: Array2::zeros(half),
        hl: Array2::zeros(half),
        hh: Array2::zeros(half),
    };

    for row in 0..half.0 {
        for col in 0..half.1 {
            let a = plane[[2 * row, 2 * col]];
            let b = plane[[2 * row, 2 * col + 1]];
            let c = plane[[2 * row + 1, 2 * col]];
            let d = plane[[2 * row + 1, 2 * col + 1]];

            bands.ll[[row, col]] = (a + b + c + d) / 2.0;
            bands.lh[[row, col]] = (a + b - c - d) / 2.0;
            bands.hl[[row, col]] = (a - b + c - d) / 2.0;
            bands.hh[[row, col]] = (a - b - c + d) / 2.0;
        }
    }

    bands
}

/// Inverse Haar DWT.
pub fn haar_inverse(bands: &Subbands) -> Array2<f32> {
    let (rows, cols) = bands.ll.dim();
    let mut plane = Array2::<f32>::zeros((rows * 2, cols * 2));

    for row in 0..rows {
        for col in 0..cols {
            let ll = bands.ll[[row, col]];
            let lh = bands.lh[[row, col]];
            let hl = bands.hl[[row, col]];
            let hh = bands.hh[[row, col]];

            plane[[2 * row, 2 * col]] = (ll + lh + hl + hh) / 2.0;
            plane[[2 * row, 2 * col + 1]] = (ll + lh - hl - hh) / 2.0;
            plane[[2 * row + 1, 2 * col]] = (ll - lh + hl - hh) / 2.0;
            plane[[2 * row + 1, 2 * col + 1]] = (ll - lh - hl + hh) / 2.0;
        }
    }

    plane
}

/// Orthonormal DCT-II over `BLOCK` x `BLOCK` blocks.
#[derive(Debug, Clone)]
pub struct BlockDct {
    basis: Array2<f32>,
}

impl Default for BlockDct {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDct {
    /// Build the DCT basis matrix.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new() -> Self {
        let n = BLOCK as f32;
        let basis = Array2::from_shape_fn((BLOCK, BLOCK), |(k, i)| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            let angle = std::f32::consts::PI * (2.0 * i as f32 + 1.0) * k as f32 / (2.0 * n);
            scale * angle.cos()
        });

        Self { basis }
    }

    /// Spatial block to coefficients.
    #[must_use]
    pub fn forward(&self, block: ArrayView2<'_, f32>) -> Array2<f32> {
        self.basis.dot(&block).dot(&self.basis.t())
    }

    /// Coefficients back to a spatial block.
    #[must_use]
    pub fn inverse(&self, coeffs: ArrayView2<'_, f32>) -> Array2<f32> {
        self.basis.t().dot(&coeffs).dot(&self.basis)
    }
}

/// Largest singular value of `m` with its left and right singular vectors.
///
/// Power iteration on `mᵀm`, seeded with its largest column so the start
/// vector never lies in the null space of a non-zero matrix. A zero
/// matrix yields `0` and unit vectors along the first axis.
#[must_use]
pub fn top_singular(m: &Array2<f32>) -> (f32, Array1<f32>, Array1<f32>) {
    let gram = m.t().dot(m);

    let seed = gram
        .axis_iter(Axis(1))
        .map(|col| col.to_owned())
        .max_by(|a, b| a.dot(a).total_cmp(&b.dot(b)));

    let mut v = match seed {
        Some(col) if col.dot(&col) > 0.0 => {
            let norm = col.dot(&col).sqrt();
            col / norm
        }
        _ => return (0.0, unit(m.nrows()), unit(m.ncols())),
    };

    for _ in 0..POWER_ITERATIONS {
        let next = gram.dot(&v);
        let norm = next.dot(&next).sqrt();
        if norm == 0.0 {
            break;
        }
        v = next / norm;
    }

    let mv = m.dot(&v);
    let sigma = mv.dot(&mv).sqrt();
    if sigma == 0.0 {
        return (0.0, unit(m.nrows()), v);
    }

    (sigma, mv / sigma, v)
}

/// Unit vector along the first axis.
fn unit(len: usize) -> Array1<f32> {
    let mut e = Array1::<f32>::zeros(len);
    e[0] = 1.0;
    e
}
