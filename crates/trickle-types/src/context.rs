use bytes::Bytes;

use crate::event::DecodeEvent;
use crate::metadata::ResponseMetadata;
use crate::request::RequestDescriptor;

/// Everything a decoder factory may look at when deciding whether it can
/// build a decoder yet.
///
/// The task builds one of these from the event that triggered the
/// attempt. Once a factory accepts, the task keeps that context for the
/// rest of its life; later events never rebuild it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeContext {
    pub request: RequestDescriptor,
    pub buffer: Bytes,
    pub is_final: bool,
    pub response_metadata: Option<ResponseMetadata>,
}

impl DecodeContext {
    /// Build a context for `request` from the event being processed.
    pub fn from_event(request: &RequestDescriptor, event: &DecodeEvent) -> Self {
        Self {
            request: request.clone(),
            buffer: event.buffer.clone(),
            is_final: event.is_final,
            response_metadata: event.response_metadata.clone(),
        }
    }

    /// Announced content type, if the upstream provided one.
    pub fn content_type(&self) -> Option<&str> {
        self.response_metadata
            .as_ref()
            .and_then(|m| m.content_type.as_deref())
    }
}
