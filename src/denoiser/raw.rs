//! Headerless planar frames: luma rows, then Cb rows, then Cr rows.

use crate::image::{FrameGeometry, Plane, YuvFrame};
use crate::util::{DenoiseError, DenoiseResult};
use std::io::{ErrorKind, Read, Write};

/// Reads one frame. Returns `None` at a clean end of stream and an error if
/// the stream ends inside a frame.
pub fn read_raw_frame<R: Read>(
    reader: &mut R,
    geometry: FrameGeometry,
) -> DenoiseResult<Option<YuvFrame>> {
    let len = geometry.frame_len();
    let mut data = Vec::new();
    data.try_reserve_exact(len)?;
    data.resize(len, 0);
    let filled = fill(reader, &mut data)?;
    if filled == 0 {
        return Ok(None);
    }
    if filled < len {
        return Err(DenoiseError::Io {
            reason: format!("truncated frame: expected {len} bytes, got {filled}"),
        });
    }

    let luma_len = geometry.width * geometry.height;
    let chroma = match geometry.chroma_size() {
        Some((cw, ch)) => {
            let plane_len = cw * ch;
            let cb = data[luma_len..luma_len + plane_len].to_vec();
            let cr = data[luma_len + plane_len..].to_vec();
            Some([Plane::from_vec(cb, cw, ch)?, Plane::from_vec(cr, cw, ch)?])
        }
        None => None,
    };
    data.truncate(luma_len);
    let luma = Plane::from_vec(data, geometry.width, geometry.height)?;
    YuvFrame::from_planes(geometry, luma, chroma).map(Some)
}

/// Writes every plane of `frame` in storage order.
pub fn write_raw_frame<W: Write>(writer: &mut W, frame: &YuvFrame) -> DenoiseResult<()> {
    for plane in frame.planes() {
        writer.write_all(plane.as_slice())?;
    }
    Ok(())
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> DenoiseResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::{read_raw_frame, write_raw_frame};
    use crate::image::{ChromaSubsampling, FrameGeometry};
    use crate::util::DenoiseError;
    use std::io::Cursor;

    #[test]
    fn reads_planes_in_order() {
        let geometry = FrameGeometry::new(4, 2, ChromaSubsampling::Yuv420).unwrap();
        let bytes: Vec<u8> = (0..12).collect();
        let mut cursor = Cursor::new(bytes.clone());
        let frame = read_raw_frame(&mut cursor, geometry).unwrap().unwrap();
        assert_eq!(frame.luma().as_slice(), &bytes[..8]);
        let chroma = frame.chroma().unwrap();
        assert_eq!(chroma[0].as_slice(), &[8, 9]);
        assert_eq!(chroma[1].as_slice(), &[10, 11]);
        assert!(read_raw_frame(&mut cursor, geometry).unwrap().is_none());

        let mut out = Vec::new();
        write_raw_frame(&mut out, &frame).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn truncated_frames_are_errors() {
        let geometry = FrameGeometry::new(4, 2, ChromaSubsampling::Mono).unwrap();
        let mut cursor = Cursor::new(vec![1u8; 5]);
        assert!(matches!(
            read_raw_frame(&mut cursor, geometry),
            Err(DenoiseError::Io { .. })
        ));
    }
}
