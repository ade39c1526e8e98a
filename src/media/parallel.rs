// SPDX-License-Identifier: GPL-3.0-only

//! Row-parallel helpers for per-pixel stages
//!
//! Every stage works on one frame at a time. Inside a stage, rows are
//! independent, so they are spread over the rayon pool once a frame is large
//! enough for the scheduling overhead to pay off. Small frames (tests,
//! thumbnails) stay on the calling thread.

use rayon::prelude::*;

/// Minimum number of pixels before work is split across the pool
pub const PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Allocate an RGB buffer and fill it row by row
///
/// `fill_row(y, row)` receives the row index and a mutable slice of
/// `width * 3` channel values.
pub fn fill_rows<F>(width: u32, height: u32, fill_row: F) -> Vec<f32>
where
    F: Fn(usize, &mut [f32]) + Sync,
{
    let row_len = width as usize * 3;
    let mut data = vec![0.0f32; row_len * height as usize];
    if row_len == 0 {
        return data;
    }

    if width as usize * height as usize >= PARALLEL_THRESHOLD {
        data.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| fill_row(y, row));
    } else {
        for (y, row) in data.chunks_mut(row_len).enumerate() {
            fill_row(y, row);
        }
    }

    data
}

/// Apply a per-pixel mapping to an interleaved RGB buffer
pub fn map_pixels<F>(src: &[f32], map: F) -> Vec<f32>
where
    F: Fn([f32; 3]) -> [f32; 3] + Sync,
{
    let mut out = vec![0.0f32; src.len()];
    let apply = |(dst, px): (&mut [f32], &[f32])| {
        let mapped = map([px[0], px[1], px[2]]);
        dst.copy_from_slice(&mapped);
    };

    if src.len() / 3 >= PARALLEL_THRESHOLD {
        out.par_chunks_exact_mut(3)
            .zip(src.par_chunks_exact(3))
            .for_each(apply);
    } else {
        out.chunks_exact_mut(3).zip(src.chunks_exact(3)).for_each(apply);
    }

    out
}

/// Parallel fold/reduce over RGB pixels with threshold-based dispatch
///
/// `stride` selects every Nth pixel (1 = all pixels), which lets statistics
/// passes subsample without changing what they compute.
pub fn fold_pixels<A, I, F, R>(data: &[f32], stride: usize, init: I, fold: F, reduce: R) -> A
where
    A: Send,
    I: Fn() -> A + Sync + Send,
    F: Fn(A, [f32; 3]) -> A + Sync + Send,
    R: Fn(A, A) -> A + Sync + Send,
{
    let stride = stride.max(1);
    let pixel_count = data.len() / 3;

    if pixel_count / stride >= PARALLEL_THRESHOLD {
        data.par_chunks_exact(3)
            .step_by(stride)
            .fold(&init, |acc, px| fold(acc, [px[0], px[1], px[2]]))
            .reduce(&init, &reduce)
    } else {
        data.chunks_exact(3)
            .step_by(stride)
            .fold(init(), |acc, px| fold(acc, [px[0], px[1], px[2]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rows_passes_row_index() {
        let data = fill_rows(2, 3, |y, row| row.fill(y as f32));
        assert_eq!(data.len(), 18);
        assert_eq!(data[0], 0.0);
        assert_eq!(data[6], 1.0);
        assert_eq!(data[17], 2.0);
    }

    #[test]
    fn test_fill_rows_parallel_matches_sequential_layout() {
        // Large enough to take the rayon path
        let width = 512u32;
        let height = 256u32;
        let data = fill_rows(width, height, |y, row| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                px[0] = x as f32;
                px[1] = y as f32;
            }
        });
        let idx = (100 * width as usize + 7) * 3;
        assert_eq!(data[idx], 7.0);
        assert_eq!(data[idx + 1], 100.0);
    }

    #[test]
    fn test_fold_pixels_with_stride() {
        let data: Vec<f32> = (0..10).flat_map(|i| [i as f32, 0.0, 0.0]).collect();
        let (sum, count) = fold_pixels(
            &data,
            2,
            || (0.0f32, 0usize),
            |(s, c), px| (s + px[0], c + 1),
            |a, b| (a.0 + b.0, a.1 + b.1),
        );
        assert_eq!(count, 5);
        assert_eq!(sum, 0.0 + 2.0 + 4.0 + 6.0 + 8.0);
    }

    #[test]
    fn test_map_pixels() {
        let out = map_pixels(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], |px| [px[2], px[1], px[0]]);
        assert_eq!(out, vec![0.3, 0.2, 0.1, 0.6, 0.5, 0.4]);
    }
}
