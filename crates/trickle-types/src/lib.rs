#![warn(clippy::pedantic)]

pub mod context;
pub mod error;
pub mod event;
pub mod metadata;
pub mod outcome;
pub mod request;

pub use context::DecodeContext;
pub use error::{DecodeFailure, TaskError, UpstreamError};
pub use event::DecodeEvent;
pub use metadata::ResponseMetadata;
pub use outcome::Outcome;
pub use request::RequestDescriptor;
