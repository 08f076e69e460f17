use bytes::Bytes;
use trickle_types::{DecodeContext, ResponseMetadata};

/// A stateful decoder bound to one decode task.
///
/// The task creates a decoder at most once and then calls [`decode`]
/// for every buffer it decides to decode. Calls are strictly serialized:
/// the task never has two decodes of its own in flight against the same
/// decoder, so implementations may keep plain mutable state (parsed
/// headers, how many rows were already delivered, scratch buffers)
/// without any locking of their own.
///
/// `decode` runs on a scheduler worker thread, never on the task's own
/// execution context, which is why the decoder must be `Send`.
///
/// ```text
///   decode(buf₀, meta, false) ──▶ Some(preview) | None (not enough yet)
///   decode(buf₁, meta, false) ──▶ …
///   decode(bufₙ, meta, true)  ──▶ Some(full)    | None (task fails)
/// ```
///
/// [`decode`]: Decoder::decode
pub trait Decoder: Send + 'static {
    /// The artifact produced by a successful decode.
    type Output: Send + 'static;

    /// Decode `buffer`, which holds every byte received so far.
    ///
    /// Returning `None` for a non-final buffer means "nothing new to
    /// show yet" and is not an error. Returning `None` for the final
    /// buffer fails the task.
    fn decode(
        &mut self,
        buffer: &Bytes,
        metadata: Option<&ResponseMetadata>,
        is_final: bool,
    ) -> Option<Self::Output>;
}

/// Builds a [`Decoder`] once enough data has arrived to pick one.
///
/// The task consults the factory until it first returns `Some`, then
/// keeps that decoder for the rest of its life. A factory that needs to
/// see a format header before it can decide simply returns `None` until
/// the header is complete.
///
/// Factories are shared between tasks and must not hold per-task state.
pub trait DecoderFactory: Send + Sync + 'static {
    type Decoder: Decoder;

    fn make_decoder(&self, context: &DecodeContext) -> Option<Self::Decoder>;
}

/// Adapts a closure into a [`DecoderFactory`].
///
/// ```rust
/// use trickle_decoder::{FnFactory, PnmDecoder, PnmHeader};
/// use trickle_types::DecodeContext;
///
/// let factory = FnFactory::new(|ctx: &DecodeContext| {
///     PnmHeader::parse(&ctx.buffer).ok().map(PnmDecoder::new)
/// });
/// # let _ = factory;
/// ```
pub struct FnFactory<F>(F);

impl<F> FnFactory<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, D> DecoderFactory for FnFactory<F>
where
    F: Fn(&DecodeContext) -> Option<D> + Send + Sync + 'static,
    D: Decoder,
{
    type Decoder = D;

    fn make_decoder(&self, context: &DecodeContext) -> Option<D> {
        (self.0)(context)
    }
}
