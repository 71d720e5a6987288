/*!
    Pixel format and color description types.
*/

/**
    Video pixel formats.

    This is a subset of formats commonly encountered in media pipelines.
    Not all FFmpeg pixel formats are represented.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp (most common video format)
    Yuv420p,
    /// Semi-planar YUV 4:2:0, 12bpp (common hardware decoder output)
    Nv12,
    /// Packed BGRA, 32bpp (common for display on macOS/Windows)
    Bgra,
    /// Packed RGBA, 32bpp (common for display)
    Rgba,
    /// Packed RGB, 24bpp
    Rgb24,
    /// Packed BGR, 24bpp
    Bgr24,
    /// Planar YUV 4:2:2, 16bpp
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp
    Yuv444p,
    /// Planar YUV 4:2:0, 10-bit little-endian in the low bits of each 16-bit sample
    Yuv420p10,
    /// Semi-planar YUV 4:2:0, 10-bit little-endian in the high bits of each 16-bit sample
    P010le,
}

impl PixelFormat {
    /**
        Returns the number of bits per pixel for this format.

        For planar formats, this is the average bits per pixel.
    */
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Yuv420p | Self::Nv12 => 12,
            Self::Yuv420p10 | Self::P010le => 15, // 10 bits * 1.5 planes average
            Self::Yuv422p => 16,
            Self::Rgb24 | Self::Bgr24 | Self::Yuv444p => 24,
            Self::Bgra | Self::Rgba => 32,
        }
    }

    /**
        Returns true if this is a planar format.
    */
    pub const fn is_planar(self) -> bool {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Yuv420p10 => true,
            Self::Nv12 | Self::P010le => true, // semi-planar counts as planar
            Self::Bgra | Self::Rgba | Self::Rgb24 | Self::Bgr24 => false,
        }
    }

    /**
        Returns true if a renderer can display this layout without further
        conversion (32-bit packed with alpha).
    */
    pub const fn is_displayable(self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra)
    }

    /// Number of data planes.
    pub const fn plane_count(self) -> usize {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Yuv420p10 => 3,
            Self::Nv12 | Self::P010le => 2,
            Self::Bgra | Self::Rgba | Self::Rgb24 | Self::Bgr24 => 1,
        }
    }

    /// Bytes used to store one component sample.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::Yuv420p10 | Self::P010le => 2,
            _ => 1,
        }
    }

    /**
        Bytes per pixel for packed formats, `None` for planar ones.
    */
    pub const fn packed_bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Bgra | Self::Rgba => Some(4),
            Self::Rgb24 | Self::Bgr24 => Some(3),
            _ => None,
        }
    }

    /**
        Horizontal and vertical chroma subsampling as log2 shifts.
    */
    pub const fn chroma_shift(self) -> (u32, u32) {
        match self {
            Self::Yuv420p | Self::Nv12 | Self::Yuv420p10 | Self::P010le => (1, 1),
            Self::Yuv422p => (1, 0),
            Self::Yuv444p | Self::Bgra | Self::Rgba | Self::Rgb24 | Self::Bgr24 => (0, 0),
        }
    }

    /**
        Minimum number of bytes one row of `plane` occupies at the given
        frame width. Returns 0 for planes the format does not have.
    */
    pub const fn plane_row_bytes(self, plane: usize, width: u32) -> usize {
        if plane >= self.plane_count() {
            return 0;
        }
        let width = width as usize;
        if let Some(bpp) = self.packed_bytes_per_pixel() {
            return width * bpp;
        }
        if plane == 0 {
            return width * self.bytes_per_sample();
        }
        let (hs, _) = self.chroma_shift();
        let chroma_width = ceil_shift(width, hs);
        match self {
            // interleaved UV
            Self::Nv12 | Self::P010le => 2 * chroma_width * self.bytes_per_sample(),
            _ => chroma_width * self.bytes_per_sample(),
        }
    }

    /**
        Number of rows of `plane` at the given frame height.
    */
    pub const fn plane_rows(self, plane: usize, height: u32) -> usize {
        if plane >= self.plane_count() {
            return 0;
        }
        if plane == 0 {
            return height as usize;
        }
        let (_, vs) = self.chroma_shift();
        ceil_shift(height as usize, vs)
    }

    /**
        Size in bytes of a tightly packed frame (no row padding).
    */
    pub const fn frame_size(self, width: u32, height: u32) -> usize {
        let mut total = 0;
        let mut plane = 0;
        while plane < self.plane_count() {
            total += self.plane_row_bytes(plane, width) * self.plane_rows(plane, height);
            plane += 1;
        }
        total
    }
}

const fn ceil_shift(value: usize, shift: u32) -> usize {
    (value + (1 << shift) - 1) >> shift
}

/**
    Quantization range of YUV samples.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ColorRange {
    /// Studio swing: luma 16-235, chroma 16-240 (MPEG).
    #[default]
    Limited,
    /// Full swing: 0-255 for all components (JPEG).
    Full,
}

/**
    YUV ↔ RGB matrix coefficients.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ColorMatrix {
    /// ITU-R BT.601 (SD content)
    #[default]
    Bt601,
    /// ITU-R BT.709 (HD content)
    Bt709,
}

impl ColorMatrix {
    /**
        The conventional matrix for untagged content of the given height:
        BT.709 for HD and above, BT.601 otherwise.
    */
    pub const fn for_height(height: u32) -> Self {
        if height >= 720 { Self::Bt709 } else { Self::Bt601 }
    }

    /// Returns the (Kr, Kb) luma coefficients.
    pub const fn coefficients(self) -> (f64, f64) {
        match self {
            Self::Bt601 => (0.299, 0.114),
            Self::Bt709 => (0.2126, 0.0722),
        }
    }
}

/**
    Horizontal position of subsampled chroma samples relative to luma.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChromaSiting {
    /// Co-sited with the left luma sample (MPEG-2, H.264 default).
    #[default]
    Left,
    /// Centered between two luma samples (MPEG-1, JPEG).
    Center,
}

/**
    Color description attached to a stream or frame.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorInfo {
    pub range: ColorRange,
    pub matrix: ColorMatrix,
    pub siting: ChromaSiting,
}

impl ColorInfo {
    pub const fn new(range: ColorRange, matrix: ColorMatrix, siting: ChromaSiting) -> Self {
        Self {
            range,
            matrix,
            siting,
        }
    }

    /**
        Defaults for untagged content: limited range, left siting, matrix
        picked from the frame height.
    */
    pub const fn for_height(height: u32) -> Self {
        Self::new(
            ColorRange::Limited,
            ColorMatrix::for_height(height),
            ChromaSiting::Left,
        )
    }

    pub const fn with_range(mut self, range: ColorRange) -> Self {
        self.range = range;
        self
    }
}
