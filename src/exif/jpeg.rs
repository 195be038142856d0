use crate::error::ExifError;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;

/// Identifier that opens an EXIF APP1 payload
pub const EXIF_PREFIX: &[u8; 6] = b"Exif\0\0";

/// Largest payload a length-prefixed segment can carry
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub marker: u8,
    pub payload: Vec<u8>,
}

impl Segment {
    fn is_exif(&self) -> bool {
        self.marker == APP1 && self.payload.starts_with(EXIF_PREFIX)
    }
}

/// Header segments of a JPEG file plus everything from the first scan on.
///
/// Only the header is rebuilt on write; the scan data is copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegSegments {
    segments: Vec<Segment>,
    tail: Vec<u8>,
}

fn is_standalone(marker: u8) -> bool {
    marker == 0x01 || (0xD0..=0xD7).contains(&marker)
}

impl JpegSegments {
    pub fn parse(data: &[u8]) -> Result<Self, ExifError> {
        if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
            return Err(ExifError::NotJpeg);
        }

        let mut segments = Vec::new();
        let mut pos = 2;

        while pos < data.len() {
            if data[pos] != 0xFF {
                return Err(ExifError::InvalidMarker {
                    marker: data[pos],
                    offset: pos,
                });
            }

            // Markers may be preceded by any number of fill bytes
            let mut marker_pos = pos + 1;
            while marker_pos < data.len() && data[marker_pos] == 0xFF {
                marker_pos += 1;
            }
            let Some(&marker) = data.get(marker_pos) else {
                return Err(ExifError::Truncated {
                    context: "marker",
                    offset: pos,
                });
            };

            if marker == SOS || marker == EOI {
                return Ok(Self {
                    segments,
                    tail: data[pos..].to_vec(),
                });
            }

            if is_standalone(marker) {
                segments.push(Segment {
                    marker,
                    payload: Vec::new(),
                });
                pos = marker_pos + 1;
                continue;
            }

            let length_pos = marker_pos + 1;
            if length_pos + 2 > data.len() {
                return Err(ExifError::Truncated {
                    context: "segment length",
                    offset: length_pos,
                });
            }
            let length = u16::from_be_bytes([data[length_pos], data[length_pos + 1]]) as usize;
            if length < 2 || length_pos + length > data.len() {
                return Err(ExifError::Truncated {
                    context: "segment",
                    offset: length_pos,
                });
            }

            segments.push(Segment {
                marker,
                payload: data[length_pos + 2..length_pos + length].to_vec(),
            });
            pos = length_pos + length;
        }

        Ok(Self {
            segments,
            tail: Vec::new(),
        })
    }

    /// TIFF structure of the first EXIF segment, without the identifier
    pub fn exif(&self) -> Option<&[u8]> {
        self.segments
            .iter()
            .find(|s| s.is_exif())
            .map(|s| &s.payload[EXIF_PREFIX.len()..])
    }

    /// Replace every EXIF segment with one carrying `tiff`.
    ///
    /// The new segment takes the place of the first old one, or follows the
    /// leading APP0 segments when the file had none.
    pub fn set_exif(&mut self, tiff: &[u8]) -> Result<(), ExifError> {
        let size = EXIF_PREFIX.len() + tiff.len();
        if size > MAX_SEGMENT_PAYLOAD {
            return Err(ExifError::SegmentTooLarge { size });
        }

        let position = self
            .segments
            .iter()
            .position(Segment::is_exif)
            .unwrap_or_else(|| {
                self.segments
                    .iter()
                    .take_while(|s| s.marker == APP0)
                    .count()
            });
        self.segments.retain(|s| !s.is_exif());

        let mut payload = Vec::with_capacity(size);
        payload.extend_from_slice(EXIF_PREFIX);
        payload.extend_from_slice(tiff);
        self.segments.insert(
            position.min(self.segments.len()),
            Segment {
                marker: APP1,
                payload,
            },
        );
        Ok(())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn encode(&self) -> Vec<u8> {
        let header_len: usize = self.segments.iter().map(|s| s.payload.len() + 4).sum();
        let mut out = Vec::with_capacity(2 + header_len + self.tail.len());
        out.extend_from_slice(&[0xFF, SOI]);

        for segment in &self.segments {
            out.extend_from_slice(&[0xFF, segment.marker]);
            if is_standalone(segment.marker) {
                continue;
            }
            // Payload size was bounded when the segment was parsed or set
            let length = (segment.payload.len() + 2) as u16;
            out.extend_from_slice(&length.to_be_bytes());
            out.extend_from_slice(&segment.payload);
        }

        out.extend_from_slice(&self.tail);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::jpeg_bytes;

    #[test]
    fn test_parse_and_encode_is_lossless() {
        let data = jpeg_bytes(500);
        let jpeg = JpegSegments::parse(&data).unwrap();

        assert_eq!(jpeg.segments().len(), 2);
        assert_eq!(jpeg.segments()[0].marker, APP0);
        assert!(jpeg.exif().is_none());
        assert_eq!(jpeg.encode(), data);
    }

    #[test]
    fn test_rejects_non_jpeg() {
        assert_eq!(JpegSegments::parse(b"RIFF....").unwrap_err(), ExifError::NotJpeg);
        assert_eq!(JpegSegments::parse(&[]).unwrap_err(), ExifError::NotJpeg);
    }

    #[test]
    fn test_rejects_truncated_segment() {
        let mut data = jpeg_bytes(10);
        data.truncate(12);

        assert!(matches!(
            JpegSegments::parse(&data),
            Err(ExifError::Truncated { .. })
        ));
    }

    #[test]
    fn test_set_exif_inserts_after_app0_and_replaces() {
        let mut jpeg = JpegSegments::parse(&jpeg_bytes(100)).unwrap();

        jpeg.set_exif(b"first").unwrap();
        assert_eq!(jpeg.segments()[1].marker, APP1);
        assert_eq!(jpeg.exif(), Some(&b"first"[..]));

        jpeg.set_exif(b"second").unwrap();
        let exif_segments = jpeg.segments().iter().filter(|s| s.is_exif()).count();
        assert_eq!(exif_segments, 1);
        assert_eq!(jpeg.segments()[1].marker, APP1);
        assert_eq!(jpeg.exif(), Some(&b"second"[..]));

        let reparsed = JpegSegments::parse(&jpeg.encode()).unwrap();
        assert_eq!(reparsed.exif(), Some(&b"second"[..]));
    }

    #[test]
    fn test_set_exif_rejects_oversized_payload() {
        let mut jpeg = JpegSegments::parse(&jpeg_bytes(10)).unwrap();
        let tiff = vec![0u8; 70_000];

        assert!(matches!(
            jpeg.set_exif(&tiff),
            Err(ExifError::SegmentTooLarge { .. })
        ));
    }
}
