//! Plane views and owned planar YUV frames.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! The stride counts elements between the starts of consecutive rows, so a
//! stride larger than the width represents padded rows. Field views of
//! interlaced material are zero-copy views that keep every other row by
//! doubling the stride.

use crate::util::{DenoiseError, DenoiseResult};

#[cfg(feature = "image-io")]
pub mod io;

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> DenoiseResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> DenoiseResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(DenoiseError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y.checked_mul(self.stride)?.checked_add(x)?;
        self.data.get(idx)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }

    /// Iterates over the rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &'a [T]> + '_ {
        (0..self.height).filter_map(move |y| self.row(y))
    }

    /// Returns the rows of one field: `parity` 0 keeps the even rows, 1 the
    /// odd rows.
    pub fn field(&self, parity: usize) -> DenoiseResult<ImageView<'a, T>> {
        let (offset, height, stride) = field_layout(self.width, self.height, self.stride, parity)?;
        ImageView::new(&self.data[offset..], self.width, height, stride)
    }
}

impl<T: Copy> ImageView<'_, T> {
    /// Copies the visible pixels into a contiguous buffer.
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.width * self.height);
        for row in self.rows() {
            out.extend_from_slice(row);
        }
        out
    }
}

/// Mutable counterpart of [`ImageView`].
pub struct ImageViewMut<'a, T> {
    data: &'a mut [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageViewMut<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a mut [T], width: usize, height: usize) -> DenoiseResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(
        data: &'a mut [T],
        width: usize,
        height: usize,
        stride: usize,
    ) -> DenoiseResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(DenoiseError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns a mutable slice for row `y` with length `width`.
    pub fn row_mut(&mut self, y: usize) -> Option<&mut [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get_mut(start..end)
    }

    /// Narrows the view to one field; see [`ImageView::field`].
    pub fn into_field(self, parity: usize) -> DenoiseResult<ImageViewMut<'a, T>> {
        let (offset, height, stride) = field_layout(self.width, self.height, self.stride, parity)?;
        ImageViewMut::new(&mut self.data[offset..], self.width, height, stride)
    }

    /// Reborrows as a read-only view.
    pub fn as_view(&self) -> ImageView<'_, T> {
        ImageView {
            data: self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }
}

impl<T: Copy> ImageViewMut<'_, T> {
    /// Sets every visible pixel to `value`.
    pub fn fill(&mut self, value: T) {
        for y in 0..self.height {
            if let Some(row) = self.row_mut(y) {
                row.fill(value);
            }
        }
    }
}

fn field_layout(
    width: usize,
    height: usize,
    stride: usize,
    parity: usize,
) -> DenoiseResult<(usize, usize, usize)> {
    if parity > 1 {
        return Err(DenoiseError::InvalidInput("field parity must be 0 or 1"));
    }
    let rows = (height + 1 - parity) / 2;
    if rows == 0 {
        return Err(DenoiseError::InvalidDimensions { width, height });
    }
    Ok((parity * stride, rows, stride * 2))
}

fn required_len(width: usize, height: usize, stride: usize) -> DenoiseResult<usize> {
    if width == 0 || height == 0 {
        return Err(DenoiseError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(DenoiseError::InvalidStride { width, stride });
    }
    let needed = (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(DenoiseError::InvalidDimensions { width, height })?;
    Ok(needed)
}

/// Owned contiguous 8-bit plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Plane {
    /// Creates a plane with every sample set to `fill`.
    pub fn new(width: usize, height: usize, fill: u8) -> DenoiseResult<Self> {
        let len = required_len(width, height, width)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, fill);
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Wraps row-major samples.
    pub fn from_vec(data: Vec<u8>, width: usize, height: usize) -> DenoiseResult<Self> {
        let needed = required_len(width, height, width)?;
        if data.len() != needed {
            return Err(DenoiseError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn view(&self) -> ImageView<'_, u8> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    pub fn view_mut(&mut self) -> ImageViewMut<'_, u8> {
        ImageViewMut {
            data: &mut self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }
}

/// Chroma layout of a planar YUV frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChromaSubsampling {
    /// Luma only.
    Mono,
    /// Chroma halved in both directions.
    #[default]
    Yuv420,
    /// Chroma halved horizontally.
    Yuv422,
    /// Full-resolution chroma.
    Yuv444,
}

impl ChromaSubsampling {
    /// Horizontal and vertical subsampling factors, or `None` for mono.
    pub fn factors(self) -> Option<(usize, usize)> {
        match self {
            ChromaSubsampling::Mono => None,
            ChromaSubsampling::Yuv420 => Some((2, 2)),
            ChromaSubsampling::Yuv422 => Some((2, 1)),
            ChromaSubsampling::Yuv444 => Some((1, 1)),
        }
    }
}

/// Dimensions and chroma layout shared by every frame of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    pub subsampling: ChromaSubsampling,
}

impl FrameGeometry {
    pub fn new(width: usize, height: usize, subsampling: ChromaSubsampling) -> DenoiseResult<Self> {
        required_len(width, height, width)?;
        Ok(Self {
            width,
            height,
            subsampling,
        })
    }

    /// Size of each chroma plane, rounded up, or `None` for mono.
    pub fn chroma_size(&self) -> Option<(usize, usize)> {
        self.subsampling
            .factors()
            .map(|(sx, sy)| (self.width.div_ceil(sx), self.height.div_ceil(sy)))
    }

    /// Bytes in one frame with all planes concatenated.
    pub fn frame_len(&self) -> usize {
        let luma = self.width * self.height;
        match self.chroma_size() {
            Some((cw, ch)) => luma + 2 * cw * ch,
            None => luma,
        }
    }
}

/// Owned planar frame: luma, then Cb and Cr unless the stream is mono.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YuvFrame {
    geometry: FrameGeometry,
    luma: Plane,
    chroma: Option<[Plane; 2]>,
}

impl YuvFrame {
    /// Creates a black frame with neutral chroma.
    pub fn new(geometry: FrameGeometry) -> DenoiseResult<Self> {
        let luma = Plane::new(geometry.width, geometry.height, 16)?;
        let chroma = match geometry.chroma_size() {
            Some((cw, ch)) => Some([Plane::new(cw, ch, 128)?, Plane::new(cw, ch, 128)?]),
            None => None,
        };
        Ok(Self {
            geometry,
            luma,
            chroma,
        })
    }

    /// Assembles a frame from planes that must match `geometry`.
    pub fn from_planes(
        geometry: FrameGeometry,
        luma: Plane,
        chroma: Option<[Plane; 2]>,
    ) -> DenoiseResult<Self> {
        if luma.width != geometry.width || luma.height != geometry.height {
            return Err(DenoiseError::InvalidDimensions {
                width: luma.width,
                height: luma.height,
            });
        }
        match (geometry.chroma_size(), &chroma) {
            (None, None) => {}
            (Some((cw, ch)), Some(planes)) => {
                if let Some(bad) = planes.iter().find(|p| p.width != cw || p.height != ch) {
                    return Err(DenoiseError::InvalidDimensions {
                        width: bad.width,
                        height: bad.height,
                    });
                }
            }
            _ => {
                return Err(DenoiseError::InvalidInput(
                    "chroma planes do not match the chroma subsampling",
                ))
            }
        }
        Ok(Self {
            geometry,
            luma,
            chroma,
        })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn luma(&self) -> &Plane {
        &self.luma
    }

    pub fn luma_mut(&mut self) -> &mut Plane {
        &mut self.luma
    }

    /// The Cb and Cr planes, unless the stream is mono.
    pub fn chroma(&self) -> Option<&[Plane; 2]> {
        self.chroma.as_ref()
    }

    pub fn chroma_mut(&mut self) -> Option<&mut [Plane; 2]> {
        self.chroma.as_mut()
    }

    /// Borrows luma and chroma mutably at the same time.
    pub fn split_mut(&mut self) -> (&mut Plane, Option<&mut [Plane; 2]>) {
        (&mut self.luma, self.chroma.as_mut())
    }

    /// All planes in storage order.
    pub fn planes(&self) -> impl Iterator<Item = &Plane> {
        std::iter::once(&self.luma).chain(self.chroma.iter().flatten())
    }

    pub fn planes_mut(&mut self) -> impl Iterator<Item = &mut Plane> {
        std::iter::once(&mut self.luma).chain(self.chroma.iter_mut().flatten())
    }
}
