//! Stream filters.
//!
//! Content streams written by this crate are either stored raw or
//! Flate-compressed; loaded files may also carry ASCIIHex-encoded streams.
//! Filters are applied in the order listed in `/Filter`.

use super::error::{PDFError, PDFResult};
use super::lexer::is_whitespace;
use super::primitives::{Dict, PDFObject};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Decodes a FlateDecode (zlib/deflate) compressed stream.
///
/// # Example
/// ```
/// use pdf_x_dom::core::decode::{decode_flate, encode_flate};
///
/// let compressed = encode_flate(b"BT ET").unwrap();
/// assert_eq!(decode_flate(&compressed).unwrap(), b"BT ET");
/// ```
pub fn decode_flate(compressed_data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed_data);
    let mut decompressed = Vec::new();

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| PDFError::Generic(format!("FlateDecode error: {}", e)))?;

    Ok(decompressed)
}

/// Compresses `data` for a `/Filter /FlateDecode` stream.
pub fn encode_flate(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PDFError::Generic(format!("FlateDecode error: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| PDFError::Generic(format!("FlateDecode error: {}", e)))
}

/// Decodes ASCIIHexDecode data. Whitespace is skipped, `>` ends the data and
/// an odd trailing digit is padded with 0.
pub fn decode_ascii_hex(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        if is_whitespace(byte) {
            continue;
        }
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => {
                return Err(PDFError::Generic(format!(
                    "ASCIIHexDecode: invalid character 0x{:02x}",
                    byte
                )));
            }
        };
        match high.take() {
            Some(h) => out.push((h << 4) | digit),
            None => high = Some(digit),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

/// Applies a single named filter.
pub fn decode_filter(data: &[u8], filter_name: &str) -> PDFResult<Vec<u8>> {
    match filter_name {
        "FlateDecode" | "Fl" => decode_flate(data),
        "ASCIIHexDecode" | "AHx" => decode_ascii_hex(data),
        filter => Err(PDFError::Generic(format!("Unsupported filter: {}", filter))),
    }
}

/// Decodes stream data according to the `/Filter` entry of its dictionary,
/// which may be a single name or an array of names.
pub fn decode_stream(dict: &Dict, data: &[u8]) -> PDFResult<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None | Some(PDFObject::Null) => return Ok(data.to_vec()),
        Some(PDFObject::Name(name)) => vec![name.as_str()],
        Some(PDFObject::Array(names)) => names.iter().filter_map(PDFObject::as_name).collect(),
        Some(other) => {
            return Err(PDFError::Generic(format!(
                "invalid /Filter entry: {}",
                other.type_name()
            )));
        }
    };

    let mut decoded = data.to_vec();
    for filter in filters {
        decoded = decode_filter(&decoded, filter)?;
    }
    Ok(decoded)
}
