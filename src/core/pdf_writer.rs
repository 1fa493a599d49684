//! Whole-document serializer.
//!
//! The writer produces a fresh file from the object store rather than an
//! incremental update:
//!
//! ```text
//! %PDF-1.7
//! [Every live object, ascending object number]
//! xref
//! 0 N
//! [One entry per object number, free entries for gaps]
//! trailer
//! << /Size N /Root r /Info r >>
//! startxref
//! offset
//! %%EOF
//! ```

use super::error::{PDFError, PDFResult};
use super::primitives::{PDFObject, Ref};
use super::store::ObjectStore;
use std::io::Write;
use tracing::debug;

const HEADER: &[u8] = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n";

fn write_err(e: std::io::Error) -> PDFError {
    PDFError::Io(format!("Failed to write PDF output: {}", e))
}

/// Serializes an [`ObjectStore`] as a complete PDF file.
pub struct PDFWriter;

impl PDFWriter {
    /// Writes every live object of `store` as a new file.
    ///
    /// Objects not yet loaded from a backing file are loaded on the way.
    /// Dictionaries keep their key order; stream `/Length` entries are
    /// rewritten to match the data.
    pub fn write_document(
        store: &ObjectStore,
        root: Ref,
        info: Option<Ref>,
    ) -> PDFResult<Vec<u8>> {
        let mut buffer = HEADER.to_vec();
        let refs = store.refs();
        let mut offsets: Vec<(Ref, usize)> = Vec::with_capacity(refs.len());

        for reference in refs {
            let object = store.get(reference)?;
            offsets.push((reference, buffer.len()));
            write!(buffer, "{} {} obj\n", reference.num, reference.generation).map_err(write_err)?;
            Self::write_object(&mut buffer, &object)?;
            buffer.extend_from_slice(b"\nendobj\n");
        }

        let size = offsets.last().map_or(1, |(r, _)| r.num + 1);
        let xref_offset = buffer.len();
        Self::write_xref_table(&mut buffer, &offsets, size)?;

        buffer.extend_from_slice(b"trailer\n");
        let mut trailer = crate::dict! {
            "Size" => i64::from(size),
            "Root" => root,
        };
        if let Some(info) = info {
            trailer.insert("Info".to_string(), PDFObject::Ref(info));
        }
        Self::write_object(&mut buffer, &PDFObject::Dictionary(trailer))?;
        write!(buffer, "\nstartxref\n{}\n%%EOF\n", xref_offset).map_err(write_err)?;

        debug!(objects = offsets.len(), bytes = buffer.len(), "serialized document");
        Ok(buffer)
    }

    /// Writes a direct object.
    pub fn write_object<W: Write>(buffer: &mut W, obj: &PDFObject) -> PDFResult<()> {
        match obj {
            PDFObject::Null => buffer.write_all(b"null").map_err(write_err)?,
            PDFObject::Boolean(b) => {
                write!(buffer, "{}", if *b { "true" } else { "false" }).map_err(write_err)?
            }
            PDFObject::Number(n) => {
                if !n.is_finite() {
                    return Err(PDFError::Generic(format!(
                        "cannot write non-finite number {}",
                        n
                    )));
                }
                // Integers are written without a decimal point
                let written = if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    write!(buffer, "{}", *n as i64)
                } else {
                    write!(buffer, "{}", n)
                };
                written.map_err(write_err)?
            }
            PDFObject::String(s) => {
                buffer.write_all(b"(").map_err(write_err)?;
                Self::write_escaped_string(buffer, s)?;
                buffer.write_all(b")").map_err(write_err)?;
            }
            PDFObject::HexString(s) => {
                buffer.write_all(b"<").map_err(write_err)?;
                for byte in s {
                    write!(buffer, "{:02X}", byte).map_err(write_err)?;
                }
                buffer.write_all(b">").map_err(write_err)?;
            }
            PDFObject::Name(name) => {
                buffer.write_all(b"/").map_err(write_err)?;
                Self::write_escaped_name(buffer, name)?;
            }
            PDFObject::Array(arr) => {
                buffer.write_all(b"[").map_err(write_err)?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        buffer.write_all(b" ").map_err(write_err)?;
                    }
                    Self::write_object(buffer, item)?;
                }
                buffer.write_all(b"]").map_err(write_err)?;
            }
            PDFObject::Dictionary(dict) => {
                buffer.write_all(b"<<").map_err(write_err)?;
                for (key, value) in dict {
                    buffer.write_all(b" /").map_err(write_err)?;
                    Self::write_escaped_name(buffer, key)?;
                    buffer.write_all(b" ").map_err(write_err)?;
                    Self::write_object(buffer, value)?;
                }
                buffer.write_all(b" >>").map_err(write_err)?;
            }
            PDFObject::Stream { dict, data } => {
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), PDFObject::Number(data.len() as f64));
                Self::write_object(buffer, &PDFObject::Dictionary(dict))?;
                buffer.write_all(b"\nstream\n").map_err(write_err)?;
                buffer.write_all(data).map_err(write_err)?;
                buffer.write_all(b"\nendstream").map_err(write_err)?;
            }
            PDFObject::Ref(r) => write!(buffer, "{} {} R", r.num, r.generation).map_err(write_err)?,
        }
        Ok(())
    }

    /// Backslash-escapes a literal string body.
    fn write_escaped_string<W: Write>(buffer: &mut W, s: &[u8]) -> PDFResult<()> {
        for &byte in s {
            match byte {
                b'(' => buffer.write_all(b"\\(").map_err(write_err)?,
                b')' => buffer.write_all(b"\\)").map_err(write_err)?,
                b'\\' => buffer.write_all(b"\\\\").map_err(write_err)?,
                b'\n' => buffer.write_all(b"\\n").map_err(write_err)?,
                b'\r' => buffer.write_all(b"\\r").map_err(write_err)?,
                b'\t' => buffer.write_all(b"\\t").map_err(write_err)?,
                _ => buffer.write_all(&[byte]).map_err(write_err)?,
            }
        }
        Ok(())
    }

    /// Writes a name body, `#XX`-escaping delimiters and non-regular bytes.
    fn write_escaped_name<W: Write>(buffer: &mut W, name: &str) -> PDFResult<()> {
        for byte in name.bytes() {
            match byte {
                b'/' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'%' | b'#' => {
                    write!(buffer, "#{:02X}", byte).map_err(write_err)?
                }
                0..=b' ' | 0x7F..=0xFF => write!(buffer, "#{:02X}", byte).map_err(write_err)?,
                _ => buffer.write_all(&[byte]).map_err(write_err)?,
            }
        }
        Ok(())
    }

    /// Writes one subsection covering `0..size`; numbers without an object
    /// become free entries.
    fn write_xref_table<W: Write>(
        buffer: &mut W,
        offsets: &[(Ref, usize)],
        size: u32,
    ) -> PDFResult<()> {
        write!(buffer, "xref\n0 {}\n", size).map_err(write_err)?;
        let mut entries = offsets.iter().peekable();
        for num in 0..size {
            match entries.next_if(|(r, _)| r.num == num) {
                Some((r, offset)) => {
                    write!(buffer, "{:010} {:05} n \n", offset, r.generation).map_err(write_err)?
                }
                None if num == 0 => buffer.write_all(b"0000000000 65535 f \n").map_err(write_err)?,
                None => buffer.write_all(b"0000000000 00000 f \n").map_err(write_err)?,
            }
        }
        Ok(())
    }
}
