use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Indirect object reference in a PDF document.
///
/// PDF objects can be referenced indirectly using object and generation numbers.
/// This is represented in PDF files as "N G R" (e.g., "5 0 R"). A `Ref` is only
/// an identifier; it is resolved to its payload through an
/// [`ObjectStore`](super::store::ObjectStore).
///
/// # Example
/// ```
/// use pdf_x_dom::core::Ref;
///
/// let a = Ref::new(5, 0);
/// let b = Ref { num: 5, generation: 0 };
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "5 0 R");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ref {
    /// Object number
    pub num: u32,

    /// Generation number (0 for new objects)
    pub generation: u32,
}

impl Ref {
    /// Create a new object reference.
    #[inline]
    pub const fn new(num: u32, generation: u32) -> Self {
        Self { num, generation }
    }

    /// Get the object ID as a tuple.
    #[inline]
    pub const fn as_id(self) -> (u32, u32) {
        (self.num, self.generation)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.generation)
    }
}

/// Dictionary payload. Lookup is by key; iteration follows insertion order,
/// which the writer preserves.
pub type Dict = IndexMap<String, PDFObject>;

/// A resolved record shared by every holder of the same handle.
///
/// Mutations through one clone are visible through all others; this is how an
/// attribute set on an ancestor node becomes visible to every descendant.
pub type SharedObject = Rc<RefCell<PDFObject>>;

/// PDF object types as defined in the PDF specification.
///
/// Nested arrays and dictionaries are held inline; anything shared between
/// several records is stored separately and referenced through [`PDFObject::Ref`].
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    /// Null value
    Null,

    /// Boolean value
    Boolean(bool),

    /// Numeric value (integers and reals)
    Number(f64),

    /// String value (from literal strings like (hello))
    String(Vec<u8>),

    /// Hex string value (from hex strings like <48656c6c6f>)
    HexString(Vec<u8>),

    /// Name value (from /Name)
    Name(String),

    /// Array of objects
    Array(Vec<PDFObject>),

    /// Dictionary (key-value pairs)
    Dictionary(Dict),

    /// Stream object (dictionary + binary data)
    Stream { dict: Dict, data: Vec<u8> },

    /// Indirect object reference (like "5 0 R")
    Ref(Ref),
}

impl PDFObject {
    /// Short variant name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            PDFObject::Null => "Null",
            PDFObject::Boolean(_) => "Boolean",
            PDFObject::Number(_) => "Number",
            PDFObject::String(_) => "String",
            PDFObject::HexString(_) => "HexString",
            PDFObject::Name(_) => "Name",
            PDFObject::Array(_) => "Array",
            PDFObject::Dictionary(_) => "Dictionary",
            PDFObject::Stream { .. } => "Stream",
            PDFObject::Ref(_) => "Ref",
        }
    }

    /// Builds a name object.
    pub fn name(name: impl Into<String>) -> Self {
        PDFObject::Name(name.into())
    }

    /// Builds a numeric array, e.g. a rectangle.
    pub fn number_array(values: &[f64]) -> Self {
        PDFObject::Array(values.iter().map(|v| PDFObject::Number(*v)).collect())
    }

    /// Returns true if this object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, PDFObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PDFObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PDFObject::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a non-negative integer, if it is one.
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            PDFObject::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
            _ => None,
        }
    }

    /// Returns the value as an integer, truncating reals.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().map(|n| n as i64)
    }

    /// Returns the name value if this is a Name object.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            PDFObject::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the bytes of a literal or hex string.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            PDFObject::String(data) | PDFObject::HexString(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PDFObject]> {
        match self {
            PDFObject::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<PDFObject>> {
        match self {
            PDFObject::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Returns the dictionary of a Dictionary or the header of a Stream.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            PDFObject::Dictionary(dict) => Some(dict),
            PDFObject::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable access to a Dictionary or a Stream header.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            PDFObject::Dictionary(dict) => Some(dict),
            PDFObject::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<Ref> {
        match self {
            PDFObject::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Looks up `key` if this object carries a dictionary.
    pub fn get(&self, key: &str) -> Option<&PDFObject> {
        self.as_dict().and_then(|dict| dict.get(key))
    }

    /// Returns the `/Type` name of a dictionary or stream.
    pub fn dict_type(&self) -> Option<&str> {
        self.get("Type").and_then(PDFObject::as_name)
    }
}

impl From<Ref> for PDFObject {
    fn from(r: Ref) -> Self {
        PDFObject::Ref(r)
    }
}

impl From<Dict> for PDFObject {
    fn from(dict: Dict) -> Self {
        PDFObject::Dictionary(dict)
    }
}

impl From<f64> for PDFObject {
    fn from(n: f64) -> Self {
        PDFObject::Number(n)
    }
}

impl From<i64> for PDFObject {
    fn from(n: i64) -> Self {
        PDFObject::Number(n as f64)
    }
}

impl From<bool> for PDFObject {
    fn from(b: bool) -> Self {
        PDFObject::Boolean(b)
    }
}

/// Builds a [`Dict`] from `key => value` pairs, keeping the given order.
///
/// ```
/// use pdf_x_dom::{dict, core::PDFObject};
///
/// let d = dict! { "Type" => PDFObject::name("Page"), "Rotate" => 90i64 };
/// assert_eq!(d.keys().collect::<Vec<_>>(), ["Type", "Rotate"]);
/// ```
#[macro_export]
macro_rules! dict {
    () => { $crate::core::Dict::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::core::Dict::new();
        $( d.insert(::std::string::String::from($key), $crate::core::PDFObject::from($value)); )+
        d
    }};
}

/// Normalizes a four-number array into `[min_x, min_y, max_x, max_y]`.
pub fn resolve_rect(value: &PDFObject) -> Option<[f64; 4]> {
    let arr = value.as_array()?;
    if arr.len() < 4 {
        return None;
    }
    let mut vals = [0.0; 4];
    for (slot, item) in vals.iter_mut().zip(arr) {
        *slot = item.as_number()?;
    }
    Some([
        vals[0].min(vals[2]),
        vals[1].min(vals[3]),
        vals[0].max(vals[2]),
        vals[1].max(vals[3]),
    ])
}
