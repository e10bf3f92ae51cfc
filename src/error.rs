use std::fmt;

/// Errors from the path-data and transform-list mini-language scanners.
///
/// Offsets are byte offsets into the attribute text being scanned, so a
/// caller can point a diagnostic at the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    MalformedNumber { token: String, offset: usize },
    UnknownCommand { command: char, offset: usize },
    TruncatedCommand { command: char, offset: usize },
    UnknownFunction { name: String, offset: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedNumber { token, offset } => {
                write!(f, "malformed number {token:?} at byte {offset}")
            }
            ParseError::UnknownCommand { command, offset } => {
                write!(f, "unknown path command {command:?} at byte {offset}")
            }
            ParseError::TruncatedCommand { command, offset } => {
                write!(
                    f,
                    "truncated coordinate group for {command:?} at byte {offset}"
                )
            }
            ParseError::UnknownFunction { name, offset } => {
                write!(f, "unknown transform function {name:?} at byte {offset}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors from the canonical XML decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    UnexpectedEof,
    MismatchedTag { expected: String, found: String },
    MalformedEntity { entity: String, offset: usize },
    UnexpectedCharacter { found: char, offset: usize },
    DuplicateAttribute { name: String },
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlError::UnexpectedEof => write!(f, "unexpected end of document"),
            XmlError::MismatchedTag { expected, found } => {
                write!(f, "mismatched close tag: expected </{expected}>, found </{found}>")
            }
            XmlError::MalformedEntity { entity, offset } => {
                write!(f, "malformed entity {entity:?} at byte {offset}")
            }
            XmlError::UnexpectedCharacter { found, offset } => {
                write!(f, "unexpected character {found:?} at byte {offset}")
            }
            XmlError::DuplicateAttribute { name } => {
                write!(f, "duplicate attribute {name:?}")
            }
        }
    }
}

impl std::error::Error for XmlError {}

/// Errors from shape synthesis and layer-tree construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    MissingAttribute(&'static str),
    DegenerateShape { element: String, detail: String },
    TooDeep(usize),
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::MissingAttribute(name) => {
                write!(f, "missing required attribute {name:?}")
            }
            GeometryError::DegenerateShape { element, detail } => {
                write!(f, "degenerate <{element}>: {detail}")
            }
            GeometryError::TooDeep(depth) => {
                write!(f, "document nesting exceeds depth limit ({depth})")
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Unifying error for the whole pipeline surface.
#[derive(Debug)]
pub enum FlatbedError {
    Parse(ParseError),
    Xml(XmlError),
    Geometry(GeometryError),
}

impl fmt::Display for FlatbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlatbedError::Parse(err) => write!(f, "path data: {err}"),
            FlatbedError::Xml(err) => write!(f, "xml: {err}"),
            FlatbedError::Geometry(err) => write!(f, "geometry: {err}"),
        }
    }
}

impl std::error::Error for FlatbedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlatbedError::Parse(err) => Some(err),
            FlatbedError::Xml(err) => Some(err),
            FlatbedError::Geometry(err) => Some(err),
        }
    }
}

impl From<ParseError> for FlatbedError {
    fn from(value: ParseError) -> Self {
        FlatbedError::Parse(value)
    }
}

impl From<XmlError> for FlatbedError {
    fn from(value: XmlError) -> Self {
        FlatbedError::Xml(value)
    }
}

impl From<GeometryError> for FlatbedError {
    fn from(value: GeometryError) -> Self {
        FlatbedError::Geometry(value)
    }
}
