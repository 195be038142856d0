use crate::error::ExifError;
use std::collections::BTreeMap;
use tracing::debug;

pub const TAG_STRIP_OFFSETS: u16 = 0x0111;
pub const TAG_SOFTWARE: u16 = 0x0131;
pub const TAG_JPEG_INTERCHANGE_FORMAT: u16 = 0x0201;
pub const TAG_JPEG_INTERCHANGE_FORMAT_LENGTH: u16 = 0x0202;
pub const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
pub const TAG_GPS_IFD_POINTER: u16 = 0x8825;
pub const TAG_USER_COMMENT: u16 = 0x9286;
pub const TAG_INTEROP_IFD_POINTER: u16 = 0xA005;

pub const TYPE_ASCII: u16 = 2;
pub const TYPE_LONG: u16 = 4;
pub const TYPE_UNDEFINED: u16 = 7;

const HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        }
    }

    pub fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }

    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }
}

/// Size in bytes of one value of a TIFF field type
fn type_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

/// One IFD field; `data` holds the raw value bytes in the document's byte order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub field_type: u16,
    pub count: u32,
    pub data: Vec<u8>,
}

impl Entry {
    pub fn undefined(data: Vec<u8>) -> Self {
        Self {
            field_type: TYPE_UNDEFINED,
            count: data.len() as u32,
            data,
        }
    }

    pub fn ascii(text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self {
            field_type: TYPE_ASCII,
            count: data.len() as u32,
            data,
        }
    }

    pub fn long(order: ByteOrder, value: u32) -> Self {
        Self {
            field_type: TYPE_LONG,
            count: 1,
            data: order.u32_bytes(value).to_vec(),
        }
    }

    fn as_u32(&self, order: ByteOrder) -> Option<u32> {
        match (self.field_type, self.data.as_slice()) {
            (TYPE_LONG, [a, b, c, d, ..]) => Some(order.u32([*a, *b, *c, *d])),
            (3, [a, b, ..]) => Some(order.u16([*a, *b]) as u32),
            _ => None,
        }
    }
}

pub type Ifd = BTreeMap<u16, Entry>;

/// Decoded EXIF structure: the IFDs that carry tags plus an optional thumbnail.
///
/// Offsets are not kept; sub-IFD pointers and the thumbnail location are
/// recomputed whenever the structure is serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifData {
    pub byte_order: ByteOrder,
    pub primary: Ifd,
    pub exif: Ifd,
    pub gps: Ifd,
    pub interop: Ifd,
    pub thumbnail_ifd: Ifd,
    pub thumbnail: Option<Vec<u8>>,
}

impl Default for ExifData {
    fn default() -> Self {
        Self::new(ByteOrder::Big)
    }
}

struct Reader<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Reader<'a> {
    fn slice(&self, offset: usize, len: usize, context: &'static str) -> Result<&'a [u8], ExifError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(ExifError::Truncated { context, offset })
    }

    fn u16_at(&self, offset: usize, context: &'static str) -> Result<u16, ExifError> {
        let b = self.slice(offset, 2, context)?;
        Ok(self.order.u16([b[0], b[1]]))
    }

    fn u32_at(&self, offset: usize, context: &'static str) -> Result<u32, ExifError> {
        let b = self.slice(offset, 4, context)?;
        Ok(self.order.u32([b[0], b[1], b[2], b[3]]))
    }

    /// Read the IFD at `offset`, returning its fields and the next-IFD offset
    fn ifd(&self, offset: usize) -> Result<(Ifd, u32), ExifError> {
        let count = self.u16_at(offset, "IFD entry count")? as usize;
        let mut ifd = Ifd::new();

        for index in 0..count {
            let at = offset + 2 + index * ENTRY_LEN;
            let tag = self.u16_at(at, "IFD entry")?;
            let field_type = self.u16_at(at + 2, "IFD entry")?;
            let value_count = self.u32_at(at + 4, "IFD entry")?;

            let Some(size) = type_size(field_type)
                .and_then(|s| s.checked_mul(value_count as usize))
            else {
                debug!("Skipping tag 0x{:04X} with unknown type {}", tag, field_type);
                continue;
            };

            let data = if size <= 4 {
                self.slice(at + 8, size, "IFD value")?
            } else {
                let value_offset = self.u32_at(at + 8, "IFD value offset")? as usize;
                self.slice(value_offset, size, "IFD value")?
            };

            ifd.insert(
                tag,
                Entry {
                    field_type,
                    count: value_count,
                    data: data.to_vec(),
                },
            );
        }

        let next = self.u32_at(offset + 2 + count * ENTRY_LEN, "next IFD offset")?;
        Ok((ifd, next))
    }

    /// Follow a pointer tag out of `parent` into its sub-IFD
    fn sub_ifd(&self, parent: &mut Ifd, pointer_tag: u16) -> Result<Ifd, ExifError> {
        match parent.remove(&pointer_tag).and_then(|e| e.as_u32(self.order)) {
            Some(offset) if offset > 0 => Ok(self.ifd(offset as usize)?.0),
            _ => Ok(Ifd::new()),
        }
    }
}

fn ifd_block_len(ifd: &Ifd) -> usize {
    let overflow: usize = ifd
        .values()
        .filter(|e| e.data.len() > 4)
        .map(|e| e.data.len() + e.data.len() % 2)
        .sum();
    2 + ifd.len() * ENTRY_LEN + 4 + overflow
}

impl ExifData {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            primary: Ifd::new(),
            exif: Ifd::new(),
            gps: Ifd::new(),
            interop: Ifd::new(),
            thumbnail_ifd: Ifd::new(),
            thumbnail: None,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, ExifError> {
        let order = match data.get(0..2) {
            Some(b"II") => ByteOrder::Little,
            Some(b"MM") => ByteOrder::Big,
            _ => return Err(ExifError::InvalidTiffHeader),
        };
        let reader = Reader { data, order };

        if reader.u16_at(2, "TIFF header")? != 42 {
            return Err(ExifError::InvalidTiffHeader);
        }

        let primary_offset = reader.u32_at(4, "TIFF header")? as usize;
        let (mut primary, next) = reader.ifd(primary_offset)?;

        let mut exif = reader.sub_ifd(&mut primary, TAG_EXIF_IFD_POINTER)?;
        let gps = reader.sub_ifd(&mut primary, TAG_GPS_IFD_POINTER)?;
        let interop = reader.sub_ifd(&mut exif, TAG_INTEROP_IFD_POINTER)?;

        let (mut thumbnail_ifd, thumbnail) = if next > 0 && next as usize != primary_offset {
            let (mut ifd1, _) = reader.ifd(next as usize)?;
            if ifd1.contains_key(&TAG_STRIP_OFFSETS) {
                // Strip offsets cannot be relocated, so an uncompressed thumbnail is dropped
                debug!("Dropping strip-based thumbnail IFD");
                ifd1.clear();
            }
            let offset = ifd1
                .remove(&TAG_JPEG_INTERCHANGE_FORMAT)
                .and_then(|e| e.as_u32(order));
            let length = ifd1
                .remove(&TAG_JPEG_INTERCHANGE_FORMAT_LENGTH)
                .and_then(|e| e.as_u32(order));
            let thumbnail = match (offset, length) {
                (Some(offset), Some(length)) if length > 0 => Some(
                    reader
                        .slice(offset as usize, length as usize, "thumbnail")?
                        .to_vec(),
                ),
                _ => None,
            };
            (ifd1, thumbnail)
        } else {
            (Ifd::new(), None)
        };
        // Pointers are meaningless outside the primary and Exif IFDs
        thumbnail_ifd.remove(&TAG_EXIF_IFD_POINTER);
        thumbnail_ifd.remove(&TAG_GPS_IFD_POINTER);

        Ok(Self {
            byte_order: order,
            primary,
            exif,
            gps,
            interop,
            thumbnail_ifd,
            thumbnail,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let order = self.byte_order;
        let mut primary = self.primary.clone();
        let mut exif = self.exif.clone();
        let gps = self.gps.clone();
        let interop = self.interop.clone();
        let mut thumbnail_ifd = self.thumbnail_ifd.clone();

        // Placeholders first so block sizes include the pointer fields
        if !interop.is_empty() {
            exif.insert(TAG_INTEROP_IFD_POINTER, Entry::long(order, 0));
        }
        if !exif.is_empty() {
            primary.insert(TAG_EXIF_IFD_POINTER, Entry::long(order, 0));
        }
        if !gps.is_empty() {
            primary.insert(TAG_GPS_IFD_POINTER, Entry::long(order, 0));
        }
        if let Some(thumbnail) = &self.thumbnail {
            thumbnail_ifd.insert(TAG_JPEG_INTERCHANGE_FORMAT, Entry::long(order, 0));
            thumbnail_ifd.insert(
                TAG_JPEG_INTERCHANGE_FORMAT_LENGTH,
                Entry::long(order, thumbnail.len() as u32),
            );
        }

        let block = |ifd: &Ifd| if ifd.is_empty() { 0 } else { ifd_block_len(ifd) };
        // The primary IFD is always written, even when it holds no fields
        let primary_offset = HEADER_LEN;
        let exif_offset = primary_offset + ifd_block_len(&primary);
        let interop_offset = exif_offset + block(&exif);
        let gps_offset = interop_offset + block(&interop);
        let thumbnail_ifd_offset = gps_offset + block(&gps);
        let thumbnail_offset = thumbnail_ifd_offset + block(&thumbnail_ifd);

        if let Some(entry) = exif.get_mut(&TAG_INTEROP_IFD_POINTER) {
            *entry = Entry::long(order, interop_offset as u32);
        }
        if let Some(entry) = primary.get_mut(&TAG_EXIF_IFD_POINTER) {
            *entry = Entry::long(order, exif_offset as u32);
        }
        if let Some(entry) = primary.get_mut(&TAG_GPS_IFD_POINTER) {
            *entry = Entry::long(order, gps_offset as u32);
        }
        if let Some(entry) = thumbnail_ifd.get_mut(&TAG_JPEG_INTERCHANGE_FORMAT) {
            *entry = Entry::long(order, thumbnail_offset as u32);
        }

        let mut out = Vec::with_capacity(thumbnail_offset + self.thumbnail.as_ref().map_or(0, Vec::len));
        match order {
            ByteOrder::Little => out.extend_from_slice(b"II"),
            ByteOrder::Big => out.extend_from_slice(b"MM"),
        }
        out.extend_from_slice(&order.u16_bytes(42));
        out.extend_from_slice(&order.u32_bytes(primary_offset as u32));

        let next = if thumbnail_ifd.is_empty() {
            0
        } else {
            thumbnail_ifd_offset as u32
        };
        write_ifd(&mut out, order, &primary, next);
        for ifd in [&exif, &interop, &gps, &thumbnail_ifd] {
            if !ifd.is_empty() {
                write_ifd(&mut out, order, ifd, 0);
            }
        }
        if let Some(thumbnail) = &self.thumbnail {
            out.extend_from_slice(thumbnail);
        }

        out
    }
}

fn write_ifd(out: &mut Vec<u8>, order: ByteOrder, ifd: &Ifd, next: u32) {
    let start = out.len();
    let mut data_offset = start + 2 + ifd.len() * ENTRY_LEN + 4;
    let mut overflow = Vec::new();

    out.extend_from_slice(&order.u16_bytes(ifd.len() as u16));
    for (tag, entry) in ifd {
        out.extend_from_slice(&order.u16_bytes(*tag));
        out.extend_from_slice(&order.u16_bytes(entry.field_type));
        out.extend_from_slice(&order.u32_bytes(entry.count));

        if entry.data.len() <= 4 {
            let mut value = [0u8; 4];
            value[..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&value);
        } else {
            out.extend_from_slice(&order.u32_bytes(data_offset as u32));
            overflow.extend_from_slice(&entry.data);
            // Values start on word boundaries
            if entry.data.len() % 2 == 1 {
                overflow.push(0);
            }
            data_offset = start + 2 + ifd.len() * ENTRY_LEN + 4 + overflow.len();
        }
    }
    out.extend_from_slice(&order.u32_bytes(next));
    out.extend_from_slice(&overflow);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document(order: ByteOrder) -> ExifData {
        let mut doc = ExifData::new(order);
        doc.primary.insert(0x010F, Entry::ascii("Acme Optics"));
        doc.primary.insert(TAG_SOFTWARE, Entry::ascii("firmware 1.2"));
        doc.exif.insert(TAG_USER_COMMENT, Entry::undefined(b"ASCII\0\0\0hello".to_vec()));
        doc.exif.insert(0x9000, Entry::undefined(b"0232".to_vec()));
        doc.gps.insert(0x0000, Entry { field_type: 1, count: 4, data: vec![2, 3, 0, 0] });
        doc.interop.insert(0x0001, Entry::ascii("R98"));
        doc.thumbnail_ifd.insert(0x0103, Entry { field_type: 3, count: 1, data: order.u16_bytes(6).to_vec() });
        doc.thumbnail = Some(vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9]);
        doc
    }

    #[test]
    fn test_serialize_then_parse_preserves_structure() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let doc = sample_document(order);
            let parsed = ExifData::parse(&doc.serialize()).unwrap();
            assert_eq!(parsed, doc);
        }
    }

    #[test]
    fn test_empty_document_is_valid_tiff() {
        let bytes = ExifData::default().serialize();

        assert_eq!(&bytes[..4], b"MM\0*");
        let parsed = ExifData::parse(&bytes).unwrap();
        assert!(parsed.primary.is_empty());
        assert!(parsed.exif.is_empty());
        assert!(parsed.thumbnail.is_none());
    }

    #[test]
    fn test_pointer_tags_are_not_kept_as_fields() {
        let doc = sample_document(ByteOrder::Big);
        let parsed = ExifData::parse(&doc.serialize()).unwrap();

        assert!(!parsed.primary.contains_key(&TAG_EXIF_IFD_POINTER));
        assert!(!parsed.primary.contains_key(&TAG_GPS_IFD_POINTER));
        assert!(!parsed.exif.contains_key(&TAG_INTEROP_IFD_POINTER));
        assert!(!parsed.thumbnail_ifd.contains_key(&TAG_JPEG_INTERCHANGE_FORMAT));
    }

    #[test]
    fn test_strip_thumbnail_is_dropped() {
        let order = ByteOrder::Little;
        let mut doc = ExifData::new(order);
        doc.primary.insert(0x010F, Entry::ascii("Acme Optics"));
        doc.thumbnail_ifd.insert(0x0103, Entry { field_type: 3, count: 1, data: order.u16_bytes(1).to_vec() });
        doc.thumbnail_ifd.insert(TAG_STRIP_OFFSETS, Entry::long(order, 8));
        doc.thumbnail_ifd.insert(0x0117, Entry::long(order, 96));

        let parsed = ExifData::parse(&doc.serialize()).unwrap();

        assert!(parsed.thumbnail_ifd.is_empty());
        assert!(parsed.thumbnail.is_none());
        assert_eq!(parsed.primary.get(&0x010F), Some(&Entry::ascii("Acme Optics")));
        // Re-serializing no longer links an IFD1
        let reparsed = ExifData::parse(&parsed.serialize()).unwrap();
        assert!(reparsed.thumbnail_ifd.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        assert_eq!(ExifData::parse(b"XX\0*\0\0\0\x08").unwrap_err(), ExifError::InvalidTiffHeader);
        assert_eq!(ExifData::parse(b"MM\0\x2B\0\0\0\x08").unwrap_err(), ExifError::InvalidTiffHeader);
    }

    #[test]
    fn test_parse_rejects_out_of_range_offsets() {
        let mut bytes = sample_document(ByteOrder::Big).serialize();
        // Point the primary IFD past the end of the buffer
        bytes[4..8].copy_from_slice(&0x0000_FFFFu32.to_be_bytes());

        assert!(matches!(
            ExifData::parse(&bytes),
            Err(ExifError::Truncated { .. })
        ));
    }
}
