use super::primitives::Ref;

/// Universal error type for document operations.
///
/// Covers object resolution, page-tree structure, and the byte-level
/// loader/writer. Every variant indicates either a caller precondition
/// violation or a corrupted object graph; nothing here is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PDFError {
    /// The handle's object number (or generation) is unknown to the store
    #[error("unresolved handle {0}")]
    UnresolvedHandle(Ref),

    /// Page position outside the page tree
    #[error("page index {index} out of range (page count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// A node with no parent link was reached before the page-tree root
    #[error("node {0} is not attached to the page tree")]
    UnattachedNode(Ref),

    /// A handle resolved to a record of the wrong shape
    #[error("type mismatch for {reference}: expected {expected}, found {found}")]
    TypeMismatch {
        reference: Ref,
        expected: &'static str,
        found: String,
    },

    /// A node that already has a parent cannot be linked a second time
    #[error("node {0} is already attached to the page tree")]
    AlreadyAttached(Ref),

    /// Structural damage: cycles, depth overflow, broken kid lists
    #[error("corrupt page tree: {0}")]
    CorruptPageTree(String),

    /// End of stream reached unexpectedly
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    /// Invalid stream position
    #[error("invalid position {pos} for stream of length {length}")]
    InvalidPosition { pos: usize, length: usize },

    /// Malformed file syntax
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// Filesystem or writer failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

impl PDFError {
    /// Builds a `Syntax` error.
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        PDFError::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Builds a `TypeMismatch` error.
    pub fn type_mismatch(reference: Ref, expected: &'static str, found: impl Into<String>) -> Self {
        PDFError::TypeMismatch {
            reference,
            expected,
            found: found.into(),
        }
    }
}

impl From<std::io::Error> for PDFError {
    fn from(err: std::io::Error) -> Self {
        PDFError::Io(err.to_string())
    }
}

/// Result type alias for document operations
pub type PDFResult<T> = Result<T, PDFError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PDFError::UnresolvedHandle(Ref::new(7, 0));
        assert_eq!(err.to_string(), "unresolved handle 7 0 R");

        let err = PDFError::IndexOutOfRange { index: 4, count: 2 };
        assert_eq!(err.to_string(), "page index 4 out of range (page count 2)");

        let err = PDFError::type_mismatch(Ref::new(3, 0), "page tree node", "Number");
        assert_eq!(
            err.to_string(),
            "type mismatch for 3 0 R: expected page tree node, found Number"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.pdf");
        let err: PDFError = io.into();
        assert!(matches!(err, PDFError::Io(msg) if msg.contains("missing.pdf")));
    }
}
