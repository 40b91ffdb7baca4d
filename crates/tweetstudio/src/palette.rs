//! Shared palette construction and quantization.
//!
//! One palette is derived from the pool of every frame so that all frames
//! index the same colors and nothing flickers between frames. Frames that
//! already use few colors (flat card designs usually do) get an exact
//! palette; richer pools are reduced with NeuQuant.

use crate::bitmap::Bitmap;
use crate::result::{ExportError, ExportResult};
use color_quant::NeuQuant;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Largest palette a GIF global color table can hold
pub const MAX_PALETTE_COLORS: usize = 256;

/// Upper bound on pixels fed to the NeuQuant network
const TRAINING_PIXEL_CAP: usize = 4 * 1024 * 1024;

/// NeuQuant sampling factor: 1 trains on every pixel, 30 on one in thirty
const SAMPLE_FACTOR: i32 = 10;

/// Pools smaller than this train on every pixel
const SMALL_POOL: usize = 1 << 16;

/// An ordered list of distinct RGB colors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Palette {
    /// Build a palette from explicit colors
    ///
    /// # Errors
    ///
    /// Returns an encoding error for an empty list or more than 256 colors
    pub fn from_colors(colors: Vec<[u8; 3]>) -> ExportResult<Self> {
        if colors.is_empty() {
            return Err(ExportError::encoding("Palette has no colors"));
        }
        if colors.len() > MAX_PALETTE_COLORS {
            return Err(ExportError::encoding(format!(
                "Palette has {} colors; at most {MAX_PALETTE_COLORS} are allowed",
                colors.len()
            )));
        }
        Ok(Self { colors })
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether the palette has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Entries in index order
    #[must_use]
    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    /// Flattened `r, g, b, r, g, b, …` table
    #[must_use]
    pub fn to_rgb_table(&self) -> Vec<u8> {
        self.colors.iter().flatten().copied().collect()
    }

    /// Index of the entry closest to `rgb` by squared distance.
    ///
    /// Ties resolve to the lowest index.
    #[must_use]
    pub fn nearest(&self, rgb: [u8; 3]) -> u8 {
        let mut best = 0usize;
        let mut best_dist = u32::MAX;
        for (i, c) in self.colors.iter().enumerate() {
            let dist = distance(*c, rgb);
            if dist < best_dist {
                best = i;
                best_dist = dist;
                if dist == 0 {
                    break;
                }
            }
        }
        best as u8
    }
}

fn distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = i32::from(a[0]) - i32::from(b[0]);
    let dg = i32::from(a[1]) - i32::from(b[1]);
    let db = i32::from(a[2]) - i32::from(b[2]);
    (dr * dr + dg * dg + db * db) as u32
}

fn rgb(px: &[u8]) -> [u8; 3] {
    [px[0], px[1], px[2]]
}

/// Distinct colors of the pool in first-seen order, or `None` once more than
/// `limit` have been found
fn distinct_colors(frames: &[&Bitmap], limit: usize) -> Option<Vec<[u8; 3]>> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    let mut last = None;
    for frame in frames {
        for px in frame.as_rgba().chunks_exact(4) {
            let color = rgb(px);
            if last == Some(color) {
                continue;
            }
            last = Some(color);
            if seen.insert(color) {
                if ordered.len() == limit {
                    return None;
                }
                ordered.push(color);
            }
        }
    }
    Some(ordered)
}

/// Derive one palette of at most `max_colors` entries from every frame.
///
/// # Errors
///
/// Returns an encoding error when there are no frames, the frames hold no
/// pixels, or `max_colors` is outside `1..=256`.
pub fn build_palette<'a, I>(frames: I, max_colors: usize) -> ExportResult<Palette>
where
    I: IntoIterator<Item = &'a Bitmap>,
{
    let frames: Vec<&Bitmap> = frames.into_iter().collect();
    if frames.is_empty() {
        return Err(ExportError::encoding("Cannot build a palette from zero frames"));
    }
    if max_colors == 0 || max_colors > MAX_PALETTE_COLORS {
        return Err(ExportError::encoding(format!(
            "Palette size must be between 1 and {MAX_PALETTE_COLORS}, got {max_colors}"
        )));
    }
    let total: usize = frames.iter().map(|f| f.pixel_count()).sum();
    if total == 0 {
        return Err(ExportError::encoding("Frames contain no pixels"));
    }

    if let Some(colors) = distinct_colors(&frames, max_colors) {
        debug!(colors = colors.len(), "exact palette");
        return Palette::from_colors(colors);
    }

    let colors = train(&frames, total, max_colors);
    debug!(colors = colors.len(), pixels = total, "quantized palette");
    Palette::from_colors(colors)
}

/// Train NeuQuant on a strided sample of the pool
fn train(frames: &[&Bitmap], total: usize, max_colors: usize) -> Vec<[u8; 3]> {
    let stride = total.div_ceil(TRAINING_PIXEL_CAP).max(1);
    let mut pool = Vec::with_capacity((total / stride + 1) * 4);
    let mut index = 0usize;
    for frame in frames {
        for px in frame.as_rgba().chunks_exact(4) {
            if index % stride == 0 {
                pool.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
            index += 1;
        }
    }

    let sample_factor = if pool.len() / 4 < SMALL_POOL {
        1
    } else {
        SAMPLE_FACTOR
    };
    // the network needs a few neurons to converge
    let net_size = max_colors.max(4);
    let network = NeuQuant::new(sample_factor, net_size, &pool);

    let mut seen = HashSet::new();
    let mut colors: Vec<[u8; 3]> = network
        .color_map_rgb()
        .chunks_exact(3)
        .map(rgb)
        .filter(|c| seen.insert(*c))
        .collect();
    colors.truncate(max_colors);
    colors
}

/// Map every pixel of `bitmap` to its nearest palette index
#[must_use]
pub fn quantize(bitmap: &Bitmap, palette: &Palette) -> Vec<u8> {
    let mut cache: HashMap<[u8; 3], u8> = HashMap::new();
    let mut last: Option<([u8; 3], u8)> = None;
    let mut indices = Vec::with_capacity(bitmap.pixel_count());
    for px in bitmap.as_rgba().chunks_exact(4) {
        let color = rgb(px);
        let index = match last {
            Some((c, i)) if c == color => i,
            _ => {
                let i = *cache
                    .entry(color)
                    .or_insert_with(|| palette.nearest(color));
                last = Some((color, i));
                i
            }
        };
        indices.push(index);
    }
    indices
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient(width: u32, height: u32) -> Bitmap {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) % 256) as u8, 255]);
            }
        }
        Bitmap::from_rgba(width, height, data).unwrap()
    }

    mod palette_tests {
        use super::*;

        #[test]
        fn test_from_colors_bounds() {
            assert!(Palette::from_colors(vec![]).is_err());
            assert!(Palette::from_colors(vec![[0, 0, 0]; 257]).is_err());
            assert_eq!(Palette::from_colors(vec![[1, 2, 3]]).unwrap().len(), 1);
        }

        #[test]
        fn test_nearest_and_ties() {
            let palette = Palette::from_colors(vec![[0, 0, 0], [255, 255, 255], [0, 0, 0]]).unwrap();
            assert_eq!(palette.nearest([10, 10, 10]), 0);
            assert_eq!(palette.nearest([200, 200, 200]), 1);
        }

        #[test]
        fn test_rgb_table() {
            let palette = Palette::from_colors(vec![[1, 2, 3], [4, 5, 6]]).unwrap();
            assert_eq!(palette.to_rgb_table(), vec![1, 2, 3, 4, 5, 6]);
        }
    }

    mod build_tests {
        use super::*;

        #[test]
        fn test_zero_frames_is_encoding_error() {
            let err = build_palette(Vec::<&Bitmap>::new(), 256).unwrap_err();
            assert_eq!(err.kind(), "encoding");
        }

        #[test]
        fn test_exact_palette_in_first_seen_order() {
            let a = Bitmap::filled(2, 2, [9, 9, 9, 255]);
            let mut b = Bitmap::filled(2, 2, [1, 1, 1, 255]);
            b.put_pixel(1, 1, [9, 9, 9, 255]);
            let palette = build_palette([&a, &b], 256).unwrap();
            assert_eq!(palette.colors(), &[[9, 9, 9], [1, 1, 1]]);
        }

        #[test]
        fn test_rich_pool_is_reduced() {
            let frames = [gradient(64, 64), gradient(48, 80)];
            let palette = build_palette(frames.iter(), 256).unwrap();
            assert!(palette.len() <= 256);
            assert!(palette.len() > 16);
        }

        #[test]
        fn test_small_limit() {
            let frame = gradient(32, 32);
            let palette = build_palette([&frame], 8).unwrap();
            assert!(palette.len() <= 8);
            assert!(!palette.is_empty());
        }

        #[test]
        fn test_invalid_limit() {
            let frame = Bitmap::filled(1, 1, [0, 0, 0, 255]);
            assert!(build_palette([&frame], 0).is_err());
            assert!(build_palette([&frame], 300).is_err());
        }
    }

    mod quantize_tests {
        use super::*;

        #[test]
        fn test_exact_palette_round_trips() {
            let mut frame = Bitmap::filled(3, 1, [10, 20, 30, 255]);
            frame.put_pixel(2, 0, [200, 100, 0, 255]);
            let palette = build_palette([&frame], 256).unwrap();
            let indices = quantize(&frame, &palette);
            assert_eq!(indices, vec![0, 0, 1]);
        }

        #[test]
        fn test_indices_within_palette() {
            let frame = gradient(40, 40);
            let palette = build_palette([&frame], 16).unwrap();
            let indices = quantize(&frame, &palette);
            assert_eq!(indices.len(), 1600);
            assert!(indices.iter().all(|&i| usize::from(i) < palette.len()));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_palette_bound_and_valid_indices(
            pixels in proptest::collection::vec(any::<[u8; 3]>(), 1..600),
            max_colors in 1usize..=256,
        ) {
            let width = pixels.len() as u32;
            let data: Vec<u8> = pixels.iter().flat_map(|c| [c[0], c[1], c[2], 255]).collect();
            let frame = Bitmap::from_rgba(width, 1, data).unwrap();
            let palette = build_palette([&frame], max_colors).unwrap();
            prop_assert!(palette.len() <= max_colors);
            prop_assert!(palette.len() <= MAX_PALETTE_COLORS);
            let indices = quantize(&frame, &palette);
            prop_assert!(indices.iter().all(|&i| usize::from(i) < palette.len()));
        }
    }
}
