// SPDX-License-Identifier: GPL-3.0-only

//! Color space helpers shared by every processing stage
//!
//! All functions operate on normalized channel values (0.0 - 1.0). Hue is
//! expressed in degrees (0.0 - 360.0), saturation and value in 0.0 - 1.0.

/// BT.601 luma weights (R, G, B)
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// HSV color representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

/// Clamp a value to the 0.0 - 1.0 range
#[inline]
pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Clamp every channel of a pixel to the 0.0 - 1.0 range
#[inline]
pub fn clamp_rgb(rgb: [f32; 3]) -> [f32; 3] {
    [clamp01(rgb[0]), clamp01(rgb[1]), clamp01(rgb[2])]
}

/// BT.601 luminance of a normalized pixel
#[inline]
pub fn luminance(rgb: [f32; 3]) -> f32 {
    LUMA_WEIGHTS[0] * rgb[0] + LUMA_WEIGHTS[1] * rgb[1] + LUMA_WEIGHTS[2] * rgb[2]
}

/// Difference between the largest and smallest channel
#[inline]
pub fn channel_spread(rgb: [f32; 3]) -> f32 {
    let max = rgb[0].max(rgb[1]).max(rgb[2]);
    let min = rgb[0].min(rgb[1]).min(rgb[2]);
    max - min
}

/// Linear interpolation between two pixels
#[inline]
pub fn lerp_rgb(from: [f32; 3], to: [f32; 3], t: f32) -> [f32; 3] {
    [
        from[0] + (to[0] - from[0]) * t,
        from[1] + (to[1] - from[1]) * t,
        from[2] + (to[2] - from[2]) * t,
    ]
}

/// sRGB transfer function: encoded value to linear light
#[inline]
pub fn srgb_to_linear(value: f32) -> f32 {
    let v = clamp01(value);
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Inverse sRGB transfer function: linear light to encoded value
#[inline]
pub fn linear_to_srgb(value: f32) -> f32 {
    let v = clamp01(value);
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

/// Decode a gamma-encoded value with a pure power law
#[inline]
pub fn gamma_decode(value: f32, gamma: f32) -> f32 {
    value.max(0.0).powf(gamma)
}

/// Encode a linear value with a pure power law
#[inline]
pub fn gamma_encode(value: f32, gamma: f32) -> f32 {
    value.max(0.0).powf(1.0 / gamma)
}

/// Convert RGB to HSV
///
/// Input channels are clamped to 0.0 - 1.0 first, so the returned saturation
/// and value are always inside 0.0 - 1.0.
#[inline]
pub fn rgb_to_hsv(rgb: [f32; 3]) -> Hsv {
    let [r, g, b] = clamp_rgb(rgb);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    // Achromatic case
    if delta < 1e-6 {
        return Hsv { h: 0.0, s: 0.0, v: max };
    }

    let s = if max > 0.0 { delta / max } else { 0.0 };

    let h = if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    Hsv {
        h: wrap_hue(h),
        s: clamp01(s),
        v: max,
    }
}

/// Convert HSV to RGB
#[inline]
pub fn hsv_to_rgb(hsv: Hsv) -> [f32; 3] {
    let s = clamp01(hsv.s);
    let v = clamp01(hsv.v);

    if s < 1e-6 {
        return [v, v, v];
    }

    let h = wrap_hue(hsv.h) / 60.0;
    let sector = h.floor();
    let f = h - sector;

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match sector as i32 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Wrap a hue angle into 0.0 - 360.0
#[inline]
pub fn wrap_hue(h: f32) -> f32 {
    let wrapped = h.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rgb_close(a: [f32; 3], b: [f32; 3]) {
        for c in 0..3 {
            assert!((a[c] - b[c]).abs() < 1e-4, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_hsv_primaries() {
        let red = rgb_to_hsv([1.0, 0.0, 0.0]);
        assert_eq!(red.h, 0.0);
        assert_eq!(red.s, 1.0);

        let green = rgb_to_hsv([0.0, 1.0, 0.0]);
        assert!((green.h - 120.0).abs() < 1e-4);

        let blue = rgb_to_hsv([0.0, 0.0, 1.0]);
        assert!((blue.h - 240.0).abs() < 1e-4);
    }

    #[test]
    fn test_hsv_round_trip() {
        for rgb in [
            [0.2, 0.4, 0.6],
            [0.9, 0.1, 0.3],
            [0.5, 0.5, 0.5],
            [0.05, 0.8, 0.2],
        ] {
            assert_rgb_close(hsv_to_rgb(rgb_to_hsv(rgb)), rgb);
        }
    }

    #[test]
    fn test_srgb_linear_inverse() {
        for v in [0.0, 0.02, 0.18, 0.5, 0.9, 1.0] {
            assert!((linear_to_srgb(srgb_to_linear(v)) - v).abs() < 1e-4);
        }
    }

    #[test]
    fn test_luminance_of_white_is_one() {
        assert!((luminance([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_wrap_hue() {
        assert_eq!(wrap_hue(370.0), 10.0);
        assert_eq!(wrap_hue(-30.0), 330.0);
        assert!(wrap_hue(-1e-9) < 360.0);
    }
}
