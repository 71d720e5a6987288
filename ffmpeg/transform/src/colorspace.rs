/*!
    YUV ↔ RGB colorspace conversion in 16.16 fixed point.
*/

use ffmpeg_types::{ColorMatrix, ColorRange};

const SHIFT: u32 = 16;
const ROUND: i32 = 1 << (SHIFT - 1);

fn fixed(value: f64) -> i32 {
    (value * f64::from(1u32 << SHIFT)).round() as i32
}

#[inline]
fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/**
    Precomputed integer coefficients for one matrix/range combination.

    Coefficients are derived once from the (Kr, Kb) pair of the matrix and
    then used exclusively in integer arithmetic.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct YuvMatrix {
    range: ColorRange,
    y_offset: i32,
    y_gain: i32,
    r_v: i32,
    g_u: i32,
    g_v: i32,
    b_u: i32,
    y_r: i32,
    y_g: i32,
    y_b: i32,
    u_r: i32,
    u_g: i32,
    u_b: i32,
    v_r: i32,
    v_g: i32,
    v_b: i32,
}

impl YuvMatrix {
    pub fn new(matrix: ColorMatrix, range: ColorRange) -> Self {
        let (kr, kb) = matrix.coefficients();
        let kg = 1.0 - kr - kb;
        let (y_gain, c_gain, y_offset) = match range {
            ColorRange::Full => (1.0, 1.0, 0),
            ColorRange::Limited => (255.0 / 219.0, 255.0 / 224.0, 16),
        };

        Self {
            range,
            y_offset,
            y_gain: fixed(y_gain),
            r_v: fixed(2.0 * (1.0 - kr) * c_gain),
            g_u: fixed(-2.0 * kb * (1.0 - kb) / kg * c_gain),
            g_v: fixed(-2.0 * kr * (1.0 - kr) / kg * c_gain),
            b_u: fixed(2.0 * (1.0 - kb) * c_gain),
            y_r: fixed(kr / y_gain),
            y_g: fixed(kg / y_gain),
            y_b: fixed(kb / y_gain),
            u_r: fixed(-kr / (2.0 * (1.0 - kb)) / c_gain),
            u_g: fixed(-kg / (2.0 * (1.0 - kb)) / c_gain),
            u_b: fixed(0.5 / c_gain),
            v_r: fixed(0.5 / c_gain),
            v_g: fixed(-kg / (2.0 * (1.0 - kr)) / c_gain),
            v_b: fixed(-kb / (2.0 * (1.0 - kr)) / c_gain),
        }
    }

    pub fn range(&self) -> ColorRange {
        self.range
    }

    /**
        Convert one 8-bit YUV sample triple to RGB.
    */
    #[inline]
    pub fn to_rgb(&self, y: u8, u: u8, v: u8) -> [u8; 3] {
        let y = (i32::from(y) - self.y_offset) * self.y_gain + ROUND;
        let u = i32::from(u) - 128;
        let v = i32::from(v) - 128;

        [
            clamp_u8((y + self.r_v * v) >> SHIFT),
            clamp_u8((y + self.g_u * u + self.g_v * v) >> SHIFT),
            clamp_u8((y + self.b_u * u) >> SHIFT),
        ]
    }

    /**
        Convert one RGB pixel to an 8-bit YUV sample triple.
    */
    #[inline]
    pub fn to_yuv(&self, rgb: [u8; 3]) -> [u8; 3] {
        let [r, g, b] = rgb.map(i32::from);
        let y = ((self.y_r * r + self.y_g * g + self.y_b * b + ROUND) >> SHIFT) + self.y_offset;
        let u = ((self.u_r * r + self.u_g * g + self.u_b * b + ROUND) >> SHIFT) + 128;
        let v = ((self.v_r * r + self.v_g * g + self.v_b * b + ROUND) >> SHIFT) + 128;
        [clamp_u8(y), clamp_u8(u), clamp_u8(v)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: [u8; 3], expected: [u8; 3], tolerance: u8) {
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                a.abs_diff(e) <= tolerance,
                "{actual:?} vs {expected:?} (tolerance {tolerance})"
            );
        }
    }

    #[test]
    fn limited_range_black_and_white() {
        let m = YuvMatrix::new(ColorMatrix::Bt601, ColorRange::Limited);
        assert_eq!(m.to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(m.to_rgb(235, 128, 128), [255, 255, 255]);
        assert_eq!(m.to_yuv([0, 0, 0]), [16, 128, 128]);
        assert_eq!(m.to_yuv([255, 255, 255]), [235, 128, 128]);
    }

    #[test]
    fn full_range_gray_is_identity() {
        let m = YuvMatrix::new(ColorMatrix::Bt709, ColorRange::Full);
        for value in [0u8, 1, 64, 128, 200, 255] {
            assert_eq!(m.to_rgb(value, 128, 128), [value; 3]);
            assert_eq!(m.to_yuv([value; 3]), [value, 128, 128]);
        }
    }

    #[test]
    fn bt601_red() {
        let m = YuvMatrix::new(ColorMatrix::Bt601, ColorRange::Limited);
        assert_eq!(m.to_yuv([255, 0, 0]), [81, 90, 240]);
        assert_close(m.to_rgb(81, 90, 240), [255, 0, 0], 2);
    }

    #[test]
    fn bt709_differs_from_bt601() {
        let sd = YuvMatrix::new(ColorMatrix::Bt601, ColorRange::Limited);
        let hd = YuvMatrix::new(ColorMatrix::Bt709, ColorRange::Limited);
        assert_ne!(sd.to_yuv([0, 255, 0]), hd.to_yuv([0, 255, 0]));
        assert_close(hd.to_rgb(63, 102, 240), [255, 0, 0], 2);
    }

    #[test]
    fn rgb_round_trip_within_tolerance() {
        for (matrix, range, tolerance) in [
            (ColorMatrix::Bt601, ColorRange::Full, 2),
            (ColorMatrix::Bt709, ColorRange::Full, 2),
            (ColorMatrix::Bt601, ColorRange::Limited, 3),
            (ColorMatrix::Bt709, ColorRange::Limited, 3),
        ] {
            let m = YuvMatrix::new(matrix, range);
            for r in (0..=255).step_by(51) {
                for g in (0..=255).step_by(51) {
                    for b in (0..=255).step_by(51) {
                        let rgb = [r as u8, g as u8, b as u8];
                        let [y, u, v] = m.to_yuv(rgb);
                        assert_close(m.to_rgb(y, u, v), rgb, tolerance);
                    }
                }
            }
        }
    }
}
