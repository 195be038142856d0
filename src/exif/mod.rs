//! Minimal EXIF support for JPEG files: enough to rewrite the UserComment and
//! Software fields while carrying every other tag, sub-IFD and the thumbnail
//! through unchanged.

mod comment;
mod jpeg;
mod tiff;

pub use jpeg::JpegSegments;
pub use tiff::{ByteOrder, Entry, ExifData, Ifd, TAG_SOFTWARE, TAG_USER_COMMENT};

use crate::error::ExifError;
use tracing::{info, warn};

/// Read and decode the UserComment of a JPEG image, if it has one
pub fn read_user_comment(image: &[u8]) -> Result<Option<String>, ExifError> {
    let jpeg = JpegSegments::parse(image)?;
    let Some(tiff) = jpeg.exif() else {
        return Ok(None);
    };

    let exif = ExifData::parse(tiff)?;
    exif.exif
        .get(&TAG_USER_COMMENT)
        .map(|entry| comment::decode(&entry.data, exif.byte_order))
        .transpose()
}

/// Return a copy of `image` whose UserComment holds `text`.
///
/// Existing EXIF content is preserved. When the image has no EXIF segment, or
/// one that cannot be decoded, a fresh structure is created instead.
pub fn write_user_comment(
    image: &[u8],
    text: &str,
    software: Option<&str>,
) -> Result<Vec<u8>, ExifError> {
    let mut jpeg = JpegSegments::parse(image)?;

    let mut exif = match jpeg.exif().map(ExifData::parse) {
        Some(Ok(exif)) => exif,
        Some(Err(e)) => {
            warn!("Existing EXIF data is invalid ({}), creating new structure", e);
            ExifData::default()
        }
        None => {
            info!("No existing EXIF data, creating new structure");
            ExifData::default()
        }
    };

    exif.exif.insert(
        TAG_USER_COMMENT,
        Entry::undefined(comment::encode(text, exif.byte_order)),
    );
    if let Some(software) = software {
        exif.primary.insert(TAG_SOFTWARE, Entry::ascii(software));
    }

    jpeg.set_exif(&exif.serialize())?;
    Ok(jpeg.encode())
}
