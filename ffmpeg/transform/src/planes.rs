/*!
    Plane-level access: geometry validation, stride-normalizing copies,
    unpacking rows to RGBA and packing RGBA into target layouts.
*/

use rayon::prelude::*;

use ffmpeg_types::{ChromaSiting, Error, FrameBuffer, PixelFormat, Result};

use crate::colorspace::YuvMatrix;

pub(crate) type Rgba = [u8; 4];

/**
    Check that a frame's planes are self-consistent with its format.
*/
pub(crate) fn validate(frame: &FrameBuffer) -> Result<()> {
    if frame.width == 0 || frame.height == 0 {
        return Err(Error::invalid_frame(format!(
            "zero dimensions {}x{}",
            frame.width, frame.height
        )));
    }

    let expected = frame.format.plane_count();
    if frame.planes.len() != expected {
        return Err(Error::invalid_frame(format!(
            "{:?} needs {} planes, frame has {}",
            frame.format,
            expected,
            frame.planes.len()
        )));
    }

    let data_len = frame.data().len();
    for (index, layout) in frame.planes.iter().enumerate() {
        let row_bytes = frame.format.plane_row_bytes(index, frame.width);
        if layout.stride < row_bytes {
            return Err(Error::invalid_frame(format!(
                "plane {index}: stride {} is smaller than row size {row_bytes}",
                layout.stride
            )));
        }

        let rows = frame.format.plane_rows(index, frame.height);
        let end = layout
            .stride
            .checked_mul(rows - 1)
            .and_then(|n| n.checked_add(layout.offset))
            .and_then(|n| n.checked_add(row_bytes));
        match end {
            Some(end) if end <= data_len => {}
            _ => {
                return Err(Error::invalid_frame(format!(
                    "plane {index} extends past the end of a {data_len} byte buffer"
                )));
            }
        }
    }

    Ok(())
}

/**
    Row `y` of `plane`, without padding. The frame must be validated.
*/
#[inline]
fn row(frame: &FrameBuffer, plane: usize, y: usize) -> &[u8] {
    let layout = frame.planes[plane];
    let start = layout.offset + y * layout.stride;
    let row_bytes = frame.format.plane_row_bytes(plane, frame.width);
    &frame.data()[start..start + row_bytes]
}

/**
    Copy every plane row by row into a tightly packed buffer.
*/
pub(crate) fn copy_planes(frame: &FrameBuffer) -> Vec<u8> {
    let format = frame.format;
    let mut output = Vec::with_capacity(format.frame_size(frame.width, frame.height));
    for plane in 0..format.plane_count() {
        for y in 0..format.plane_rows(plane, frame.height) {
            output.extend_from_slice(row(frame, plane, y));
        }
    }
    output
}

pub(crate) fn is_readable(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::Rgba
            | PixelFormat::Bgra
            | PixelFormat::Rgb24
            | PixelFormat::Bgr24
            | PixelFormat::Yuv420p
            | PixelFormat::Yuv422p
            | PixelFormat::Yuv444p
            | PixelFormat::Nv12
            | PixelFormat::Yuv420p10
            | PixelFormat::P010le
    )
}

pub(crate) fn is_writable(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::Rgba
            | PixelFormat::Bgra
            | PixelFormat::Rgb24
            | PixelFormat::Bgr24
            | PixelFormat::Yuv420p
            | PixelFormat::Yuv422p
            | PixelFormat::Yuv444p
            | PixelFormat::Nv12
    )
}

/**
    Unpack a validated frame into an RGBA raster, one rayon task per row.
*/
pub(crate) fn unpack(frame: &FrameBuffer, matrix: &YuvMatrix) -> Result<Vec<Rgba>> {
    if !is_readable(frame.format) {
        return Err(Error::unsupported_format(format!(
            "pixel format {:?} not supported for input",
            frame.format
        )));
    }

    let width = frame.width as usize;
    let mut raster = vec![[0u8; 4]; width * frame.height as usize];
    raster
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out)| read_row(frame, matrix, y, out));
    Ok(raster)
}

fn read_row(frame: &FrameBuffer, matrix: &YuvMatrix, y: usize, out: &mut [Rgba]) {
    match frame.format {
        PixelFormat::Rgba => {
            for (px, src) in out.iter_mut().zip(row(frame, 0, y).chunks_exact(4)) {
                *px = [src[0], src[1], src[2], src[3]];
            }
        }
        PixelFormat::Bgra => {
            for (px, src) in out.iter_mut().zip(row(frame, 0, y).chunks_exact(4)) {
                *px = [src[2], src[1], src[0], src[3]];
            }
        }
        PixelFormat::Rgb24 => {
            for (px, src) in out.iter_mut().zip(row(frame, 0, y).chunks_exact(3)) {
                *px = [src[0], src[1], src[2], 255];
            }
        }
        PixelFormat::Bgr24 => {
            for (px, src) in out.iter_mut().zip(row(frame, 0, y).chunks_exact(3)) {
                *px = [src[2], src[1], src[0], 255];
            }
        }
        _ => read_yuv_row(frame, matrix, y, out),
    }
}

fn read_yuv_row(frame: &FrameBuffer, matrix: &YuvMatrix, y: usize, out: &mut [Rgba]) {
    let format = frame.format;
    let (hs, vs) = format.chroma_shift();
    let cy = y >> vs;

    let luma = samples_8bit(format, row(frame, 0, y));
    let (u, v): (Vec<u8>, Vec<u8>) = match format {
        PixelFormat::Nv12 | PixelFormat::P010le => {
            let uv = samples_8bit(format, row(frame, 1, cy));
            uv.chunks_exact(2).map(|pair| (pair[0], pair[1])).unzip()
        }
        _ => (
            samples_8bit(format, row(frame, 1, cy)),
            samples_8bit(format, row(frame, 2, cy)),
        ),
    };

    let siting = frame.color.siting;
    for (x, px) in out.iter_mut().enumerate() {
        let cu = upsample(&u, x, hs, siting);
        let cv = upsample(&v, x, hs, siting);
        let [r, g, b] = matrix.to_rgb(luma[x], cu, cv);
        *px = [r, g, b, 255];
    }
}

/**
    Reduce a row of samples to 8 bits per component.
*/
fn samples_8bit(format: PixelFormat, row: &[u8]) -> Vec<u8> {
    match format {
        PixelFormat::Yuv420p10 => row
            .chunks_exact(2)
            .map(|s| {
                let value = u16::from_le_bytes([s[0], s[1]]) & 0x3ff;
                ((value + 2) >> 2).min(255) as u8
            })
            .collect(),
        PixelFormat::P010le => row
            .chunks_exact(2)
            .map(|s| {
                let value = u16::from_le_bytes([s[0], s[1]]) >> 6;
                ((value + 2) >> 2).min(255) as u8
            })
            .collect(),
        _ => row.to_vec(),
    }
}

/**
    Chroma value for luma column `x`.

    Left-sited chroma lies on even luma columns; odd columns average their
    two neighbours. Center-sited chroma lies between two luma columns, so
    each luma column takes 3/4 of the nearest sample and 1/4 of the next.
*/
#[inline]
fn upsample(chroma: &[u8], x: usize, shift: u32, siting: ChromaSiting) -> u8 {
    if shift == 0 {
        return chroma[x];
    }
    let i = x >> 1;
    let last = chroma.len() - 1;
    let here = u16::from(chroma[i]);
    let even = x & 1 == 0;
    let value = match siting {
        ChromaSiting::Left if even => here,
        ChromaSiting::Left => (here + u16::from(chroma[(i + 1).min(last)]) + 1) >> 1,
        ChromaSiting::Center if even => {
            (3 * here + u16::from(chroma[i.saturating_sub(1)]) + 2) >> 2
        }
        ChromaSiting::Center => (3 * here + u16::from(chroma[(i + 1).min(last)]) + 2) >> 2,
    };
    value as u8
}

/**
    Pack an RGBA raster into a tightly packed frame of `format`.
*/
pub(crate) fn pack(
    raster: &[Rgba],
    width: u32,
    height: u32,
    format: PixelFormat,
    matrix: &YuvMatrix,
) -> Result<Vec<u8>> {
    let w = width as usize;
    match format {
        PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
            let bpp = format.packed_bytes_per_pixel().unwrap_or(4);
            let mut output = vec![0u8; w * height as usize * bpp];
            output
                .par_chunks_mut(w * bpp)
                .zip(raster.par_chunks(w))
                .for_each(|(dst, src)| {
                    for (out, px) in dst.chunks_exact_mut(bpp).zip(src) {
                        let [r, g, b, a] = *px;
                        match format {
                            PixelFormat::Rgba => out.copy_from_slice(&[r, g, b, a]),
                            PixelFormat::Bgra => out.copy_from_slice(&[b, g, r, a]),
                            PixelFormat::Rgb24 => out.copy_from_slice(&[r, g, b]),
                            _ => out.copy_from_slice(&[b, g, r]),
                        }
                    }
                });
            Ok(output)
        }

        PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p | PixelFormat::Nv12 => {
            let yuv: Vec<[u8; 3]> = raster
                .par_iter()
                .map(|&[r, g, b, _]| matrix.to_yuv([r, g, b]))
                .collect();
            Ok(pack_yuv(&yuv, width, height, format))
        }

        _ => Err(Error::unsupported_format(format!(
            "pixel format {:?} not supported for output",
            format
        ))),
    }
}

/**
    Write Y at full resolution and average U/V over each chroma block.
*/
fn pack_yuv(yuv: &[[u8; 3]], width: u32, height: u32, format: PixelFormat) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let (hs, vs) = format.chroma_shift();
    let cw = (w + (1 << hs) - 1) >> hs;
    let ch = format.plane_rows(1, height);

    let mut output = Vec::with_capacity(format.frame_size(width, height));
    output.extend(yuv.iter().map(|s| s[0]));

    let mut u_plane = vec![0u8; cw * ch];
    let mut v_plane = vec![0u8; cw * ch];
    u_plane
        .par_chunks_mut(cw)
        .zip(v_plane.par_chunks_mut(cw))
        .enumerate()
        .for_each(|(cy, (u_row, v_row))| {
            let y0 = cy << vs;
            let y1 = ((cy + 1) << vs).min(h);
            for cx in 0..cw {
                let x0 = cx << hs;
                let x1 = ((cx + 1) << hs).min(w);
                let (mut su, mut sv, mut n) = (0u32, 0u32, 0u32);
                for line in yuv[y0 * w..y1 * w].chunks_exact(w) {
                    for sample in &line[x0..x1] {
                        su += u32::from(sample[1]);
                        sv += u32::from(sample[2]);
                        n += 1;
                    }
                }
                u_row[cx] = ((su + n / 2) / n) as u8;
                v_row[cx] = ((sv + n / 2) / n) as u8;
            }
        });

    if format == PixelFormat::Nv12 {
        output.extend(u_plane.iter().zip(&v_plane).flat_map(|(&u, &v)| [u, v]));
    } else {
        output.extend_from_slice(&u_plane);
        output.extend_from_slice(&v_plane);
    }
    output
}
