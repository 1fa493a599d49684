use super::error::{PDFError, PDFResult};
use super::lexer::Lexer;
use super::parser::Parser;
use super::primitives::{Dict, PDFObject, Ref};
use super::stream::Stream;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

/// Size of one `offset generation f|n` line in a classic xref table.
const XREF_ENTRY_WIDTH: usize = 20;

/// Cross-reference table entry.
///
/// Each entry describes where to find an indirect object in the file.
#[derive(Debug, Clone, PartialEq)]
pub enum XRefEntry {
    /// Free entry - object number is available for reuse
    Free { next_free: u64, generation: u32 },

    /// Uncompressed entry - object is stored uncompressed at given offset
    Uncompressed { offset: u64, generation: u32 },
}

impl XRefEntry {
    /// Returns true if this entry is free.
    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }

    /// Returns the generation number for this entry.
    pub fn generation(&self) -> u32 {
        match self {
            XRefEntry::Free { generation, .. } | XRefEntry::Uncompressed { generation, .. } => {
                *generation
            }
        }
    }
}

/// Cross-reference table of a loaded file: the byte-level source the
/// [`ObjectStore`](super::store::ObjectStore) resolves lazily from.
///
/// The table is immutable once parsed; caching is the store's job.
#[derive(Debug)]
pub struct XRef {
    /// The entries in the xref table, indexed by object number
    entries: Vec<Option<XRefEntry>>,

    /// The newest trailer dictionary
    trailer: Dict,

    /// The whole file
    stream: Stream,
}

impl XRef {
    /// Loads the cross-reference chain of a complete file.
    ///
    /// Starts at the section named by `startxref` and follows `/Prev` links;
    /// entries from newer sections win over older ones.
    pub fn load(data: Vec<u8>) -> PDFResult<Self> {
        let startxref = Self::find_startxref(&data)?;
        let stream = Stream::from_bytes(data);

        let mut xref = XRef {
            entries: Vec::new(),
            trailer: Dict::new(),
            stream,
        };

        let mut visited = FxHashSet::default();
        let mut next = Some(startxref);
        let mut newest_trailer = None;

        while let Some(offset) = next.take() {
            if !visited.insert(offset) {
                warn!(offset, "cyclic /Prev chain in cross-reference sections");
                break;
            }
            let trailer = xref.parse_section(offset)?;
            next = trailer.get("Prev").and_then(PDFObject::as_usize);
            if newest_trailer.is_none() {
                newest_trailer = Some(trailer);
            }
        }

        xref.trailer = newest_trailer.unwrap_or_default();
        debug!(entries = xref.entries.len(), "cross-reference table loaded");
        Ok(xref)
    }

    /// Finds the byte offset of the cross-reference table.
    ///
    /// This searches for "startxref" near the end of the file and reads
    /// the offset that follows it.
    pub fn find_startxref(data: &[u8]) -> PDFResult<usize> {
        let search_start = data.len().saturating_sub(1024);
        let search_data = &data[search_start..];

        let keyword = b"startxref";
        let pos = search_data
            .windows(keyword.len())
            .rposition(|window| window == keyword)
            .ok_or_else(|| PDFError::Generic("startxref not found in PDF".to_string()))?;

        let mut offset_start = search_start + pos + keyword.len();
        while offset_start < data.len() && data[offset_start].is_ascii_whitespace() {
            offset_start += 1;
        }
        let mut offset_end = offset_start;
        while offset_end < data.len() && data[offset_end].is_ascii_digit() {
            offset_end += 1;
        }

        std::str::from_utf8(&data[offset_start..offset_end])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| PDFError::syntax(offset_start, "no offset found after startxref"))
    }

    /// Parses one `xref ... trailer << >>` section and returns its trailer.
    fn parse_section(&mut self, offset: usize) -> PDFResult<Dict> {
        let mut parser = Parser::new(Lexer::new(self.stream.sub_stream(offset)?));

        if !parser.peek_command("xref")? {
            return Err(PDFError::Generic(format!(
                "cross-reference streams are not supported (no 'xref' keyword at offset {})",
                offset
            )));
        }
        parser.expect_command("xref")?;

        while !parser.peek_command("trailer")? {
            let header_at = parser.offset();
            let first = usize::try_from(parser.expect_integer()?).unwrap_or(usize::MAX);
            let count = usize::try_from(parser.expect_integer()?).unwrap_or(usize::MAX);

            // Every entry takes exactly XREF_ENTRY_WIDTH bytes, and no object
            // number can exceed the file size
            let file_len = self.stream.bytes().len();
            let remaining = file_len.saturating_sub(parser.offset());
            let needed = first.checked_add(count).filter(|needed| *needed <= file_len);
            let fits = count
                .checked_mul(XREF_ENTRY_WIDTH)
                .is_some_and(|bytes| bytes <= remaining);
            let (Some(needed), true) = (needed, fits) else {
                return Err(PDFError::syntax(
                    header_at,
                    format!("xref subsection {} {} does not fit in the file", first, count),
                ));
            };

            for obj_num in first..needed {
                let entry = Self::read_entry(&mut parser)?;
                if self.entries.len() <= obj_num {
                    self.entries.resize(obj_num + 1, None);
                }
                // Newer sections are read first, so the first entry seen wins
                if self.entries[obj_num].is_none() {
                    self.entries[obj_num] = Some(entry);
                }
            }
        }
        parser.expect_command("trailer")?;

        match parser.parse_object()? {
            PDFObject::Dictionary(dict) => Ok(dict),
            other => Err(PDFError::Generic(format!(
                "expected trailer dictionary, got {}",
                other.type_name()
            ))),
        }
    }

    /// Reads a single `offset generation f|n` entry.
    fn read_entry(parser: &mut Parser<'_>) -> PDFResult<XRefEntry> {
        let offset = parser.expect_integer()?;
        let generation = parser.expect_integer()? as u32;
        if parser.peek_command("n")? {
            parser.expect_command("n")?;
            Ok(XRefEntry::Uncompressed { offset, generation })
        } else {
            parser.expect_command("f")?;
            Ok(XRefEntry::Free {
                next_free: offset,
                generation,
            })
        }
    }

    /// Gets an entry from the xref table.
    pub fn get_entry(&self, obj_num: u32) -> Option<&XRefEntry> {
        self.entries.get(obj_num as usize)?.as_ref()
    }

    /// True if `r` names an in-use entry with a matching generation.
    pub fn contains(&self, r: Ref) -> bool {
        matches!(
            self.get_entry(r.num),
            Some(XRefEntry::Uncompressed { generation, .. }) if *generation == r.generation
        )
    }

    /// Parses the indirect object `r` from the file.
    pub fn fetch(&self, r: Ref) -> PDFResult<PDFObject> {
        let mut pending = FxHashSet::default();
        pending.insert(r);
        self.fetch_inner(r, &pending)
    }

    /// `pending` holds every object whose stream `/Length` is being resolved
    /// further up; a `/Length` pointing back into it is treated as unknown.
    fn fetch_inner(&self, r: Ref, pending: &FxHashSet<Ref>) -> PDFResult<PDFObject> {
        let offset = match self.get_entry(r.num) {
            Some(XRefEntry::Uncompressed { offset, generation }) if *generation == r.generation => {
                *offset as usize
            }
            _ => return Err(PDFError::UnresolvedHandle(r)),
        };

        let resolver = |length_ref: Ref| -> Option<usize> {
            if pending.contains(&length_ref) {
                warn!(reference = %r, length = %length_ref, "cyclic stream /Length reference");
                return None;
            }
            let mut nested = pending.clone();
            nested.insert(length_ref);
            self.fetch_inner(length_ref, &nested)
                .ok()
                .and_then(|obj| obj.as_usize())
        };

        let mut parser =
            Parser::new(Lexer::new(self.stream.sub_stream(offset)?)).with_length_resolver(&resolver);
        parser.parse_indirect_object(r)
    }

    /// All in-use references, in object-number order.
    pub fn live_refs(&self) -> impl Iterator<Item = Ref> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(num, entry)| match entry {
                Some(XRefEntry::Uncompressed { generation, .. }) => {
                    Some(Ref::new(num as u32, *generation))
                }
                _ => None,
            })
    }

    /// Returns the trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// First object number past the table (`/Size`, or the entry count if larger).
    pub fn size(&self) -> u32 {
        let declared = self
            .trailer
            .get("Size")
            .and_then(PDFObject::as_usize)
            .unwrap_or(0);
        declared.max(self.entries.len()) as u32
    }

    /// Returns the number of entries in the xref table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the xref table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
