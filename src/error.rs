//! Error kinds raised by the codec and the drivers.
//!
//! Errors travel as [`eyre::Report`]; callers that need to react to a
//! specific kind use `report.downcast_ref::<TexelError>()`.

/// Errors that can occur while reading or writing texels.
#[derive(Debug)]
pub enum TexelError {
    /// An id does not match the shape the driver expects.
    InvalidId(String),
    /// A project or object does not exist.
    NotFound(String),
    /// A request got a status other than 200/201.
    Http { url: String, status: u16 },
    /// A path is not a recognized translation file.
    UnrecognizedPath(String),
    /// A domain string cannot be decomposed.
    MalformedDomain(String),
    /// File content could not be deserialized.
    Parse { path: String, content: String, cause: String },
    /// A non-object node was found where keys were expected.
    InvalidTree { path: String, keys: Vec<String> },
}

impl TexelError {
    /// Find the texel error behind any number of context layers.
    pub fn find(report: &eyre::Report) -> Option<&TexelError> {
        report.chain().find_map(|cause| cause.downcast_ref::<TexelError>())
    }

    /// Returns true for missing objects, either reported by a driver or by a 404 response.
    pub fn is_not_found(report: &eyre::Report) -> bool {
        report.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<TexelError>(),
                Some(TexelError::NotFound(_)) | Some(TexelError::Http { status: 404, .. })
            )
        })
    }
}

impl std::fmt::Display for TexelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TexelError::InvalidId(id) => write!(f, "can't parse id {:?}", id),
            TexelError::NotFound(what) => write!(f, "not found: {}", what),
            TexelError::Http { url, status } => {
                write!(f, "request to {:?} got a bad status code {}", url, status)
            }
            TexelError::UnrecognizedPath(path) => {
                write!(f, "{:?} is not a recognized translation file path", path)
            }
            TexelError::MalformedDomain(domain) => write!(f, "malformed domain {:?}", domain),
            TexelError::Parse { path, content, cause } => {
                write!(f, "failed to parse {:?} with content {:?}: {}", path, content, cause)
            }
            TexelError::InvalidTree { path, keys } => {
                write!(f, "can't recursively iterate keys of {:?} at path {:?}", path, keys)
            }
        }
    }
}

impl std::error::Error for TexelError {}
