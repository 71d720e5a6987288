/*!
    RGBA raster scaling.
*/

use rayon::prelude::*;

use crate::planes::Rgba;
use crate::video::ScalingAlgorithm;

/**
    Resize a `src_w`×`src_h` raster to `dst_w`×`dst_h`.

    Sample positions use pixel centers, so scaling by an integer factor
    and back is symmetric.
*/
pub(crate) fn scale(
    src: &[Rgba],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
    algorithm: ScalingAlgorithm,
) -> Vec<Rgba> {
    let mut dst = vec![[0u8; 4]; dst_w * dst_h];
    match algorithm {
        ScalingAlgorithm::Nearest => {
            let xs: Vec<usize> = (0..dst_w).map(|x| nearest(x, src_w, dst_w)).collect();
            dst.par_chunks_mut(dst_w).enumerate().for_each(|(y, out)| {
                let sy = nearest(y, src_h, dst_h);
                let line = &src[sy * src_w..(sy + 1) * src_w];
                for (px, &sx) in out.iter_mut().zip(&xs) {
                    *px = line[sx];
                }
            });
        }
        ScalingAlgorithm::Bilinear => {
            let xs: Vec<Tap> = (0..dst_w).map(|x| Tap::new(x, src_w, dst_w)).collect();
            dst.par_chunks_mut(dst_w).enumerate().for_each(|(y, out)| {
                let ty = Tap::new(y, src_h, dst_h);
                let top = &src[ty.i0 * src_w..(ty.i0 + 1) * src_w];
                let bottom = &src[ty.i1 * src_w..(ty.i1 + 1) * src_w];
                for (px, tx) in out.iter_mut().zip(&xs) {
                    for c in 0..4 {
                        let t = tx.blend(top[tx.i0][c], top[tx.i1][c]);
                        let b = tx.blend(bottom[tx.i0][c], bottom[tx.i1][c]);
                        px[c] = ((t * (256 - ty.frac) + b * ty.frac + (1 << 15)) >> 16) as u8;
                    }
                }
            });
        }
    }
    dst
}

fn nearest(dst: usize, src_len: usize, dst_len: usize) -> usize {
    ((2 * dst + 1) * src_len / (2 * dst_len)).min(src_len - 1)
}

/// Two source taps and a Q8 weight for the second one.
struct Tap {
    i0: usize,
    i1: usize,
    frac: u32,
}

impl Tap {
    fn new(dst: usize, src_len: usize, dst_len: usize) -> Self {
        // center of the destination pixel in Q8 source coordinates
        let pos = ((2 * dst + 1) * src_len * 256 / (2 * dst_len)) as i64 - 128;
        let pos = pos.max(0) as usize;
        let i0 = (pos >> 8).min(src_len - 1);
        Self {
            i0,
            i1: (i0 + 1).min(src_len - 1),
            frac: (pos & 0xff) as u32,
        }
    }

    /// Horizontal blend in Q8.
    #[inline]
    fn blend(&self, a: u8, b: u8) -> u32 {
        u32::from(a) * (256 - self.frac) + u32::from(b) * self.frac
    }
}
