use bytes::Bytes;

use crate::metadata::ResponseMetadata;

/// One delivery from the upstream data source.
///
/// `buffer` always holds everything received so far for the request, not
/// just the newest chunk: a decoder handed a later event never needs the
/// earlier ones. That is what lets the decode task drop intermediate
/// events under load without losing data.
///
/// ```text
///   partial("P5 4 4 255\n")            is_final = false
///   partial("P5 4 4 255\n" + row 0..1) is_final = false
///   complete(entire file)              is_final = true
/// ```
///
/// Events are immutable once built; `Bytes` makes moving them between the
/// task and the decode workers a reference-count bump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeEvent {
    pub buffer: Bytes,
    pub response_metadata: Option<ResponseMetadata>,
    pub is_final: bool,
}

impl DecodeEvent {
    /// A non-final event: more data is expected.
    pub fn partial(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
            response_metadata: None,
            is_final: false,
        }
    }

    /// The final event: no further buffers follow.
    pub fn complete(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
            response_metadata: None,
            is_final: true,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.response_metadata = Some(metadata);
        self
    }
}
