use super::tiff::ByteOrder;
use crate::error::ExifError;

const ASCII_PREFIX: &[u8; 8] = b"ASCII\0\0\0";
const UNICODE_PREFIX: &[u8; 8] = b"UNICODE\0";
const UNDEFINED_PREFIX: &[u8; 8] = &[0; 8];

/// Encode text as a UserComment value: UNICODE identifier plus UTF-16 code units
pub fn encode(text: &str, order: ByteOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(UNICODE_PREFIX.len() + text.len() * 2);
    out.extend_from_slice(UNICODE_PREFIX);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&order.u16_bytes(unit));
    }
    out
}

/// Decode a UserComment value written with the ASCII, UNICODE or undefined identifier
pub fn decode(value: &[u8], order: ByteOrder) -> Result<String, ExifError> {
    if value.len() < 8 {
        return Err(ExifError::CommentDecode {
            details: format!("value of {} bytes has no character code", value.len()),
        });
    }
    let (prefix, body) = value.split_at(8);

    let text = if prefix == ASCII_PREFIX || prefix == UNDEFINED_PREFIX {
        String::from_utf8(body.to_vec()).map_err(|e| ExifError::CommentDecode {
            details: e.to_string(),
        })?
    } else if prefix == UNICODE_PREFIX {
        if body.len() % 2 != 0 {
            return Err(ExifError::CommentDecode {
                details: "odd number of bytes in UTF-16 text".to_string(),
            });
        }
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| order.u16([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|e| ExifError::CommentDecode {
            details: e.to_string(),
        })?
    } else {
        return Err(ExifError::UnknownCommentEncoding);
    };

    Ok(text.trim_end_matches('\0').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_round_trip_in_both_orders() {
        let text = r#"{"roll":2.0,"note":"Überprüfung"}"#;
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let encoded = encode(text, order);
            assert!(encoded.starts_with(b"UNICODE\0"));
            assert_eq!(decode(&encoded, order).unwrap(), text);
        }
    }

    #[test]
    fn test_decode_ascii_strips_padding() {
        let value = b"ASCII\0\0\0hello\0\0";
        assert_eq!(decode(value, ByteOrder::Big).unwrap(), "hello");
    }

    #[test]
    fn test_decode_rejects_unknown_and_short_values() {
        assert_eq!(
            decode(b"JIS\0\0\0\0\0abc", ByteOrder::Big).unwrap_err(),
            ExifError::UnknownCommentEncoding
        );
        assert!(decode(b"UNI", ByteOrder::Big).is_err());
        assert!(decode(b"UNICODE\0\x00", ByteOrder::Big).is_err());
    }
}
