use serde::Serialize;

/// Response metadata that travels alongside the byte buffer.
///
/// Upstream sources fill in whatever they know about the transfer. All
/// fields are optional: an in-memory source may know nothing, a file
/// reader only the length. Decoders receive this unchanged with every
/// buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResponseMetadata {
    /// MIME type announced by the upstream, e.g. `image/x-portable-graymap`.
    pub content_type: Option<String>,

    /// Total size of the resource when known up front.
    pub content_length: Option<u64>,

    /// Transport-level status code, when the upstream has one.
    pub status: Option<u16>,
}

impl ResponseMetadata {
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_content_length(mut self, len: u64) -> Self {
        self.content_length = Some(len);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}
