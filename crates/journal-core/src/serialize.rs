//! Serializer gateway.
//!
//! The serializer *registry* — the mapping from a Rust type to a concrete
//! encoder/decoder pair keyed by manifest string — is an external
//! collaborator supplied by the embedding framework. What
//! lives here is the gateway around one such encoder/decoder: normalizing
//! sync and async encoders to a single future at the call site, and the
//! sentinel fallback for metadata that fails to (de)serialize.
//!
//! Akka's serializer extension scopes the current `ActorSystem` around an
//! encode/decode call so location-sensitive serializers (e.g. ones that
//! resolve `ActorRef`s) see the right context. There is no implicit
//! thread-local equivalent in idiomatic Rust; callers that need this pass
//! whatever context their encoder requires as an explicit argument instead
//! (see DESIGN.md).

use std::future::Future;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::MetaPayload;

/// Marker trait for event payload types the gateway can carry. Mirrors the
/// blanket marker trait pattern used for storage payloads across the
/// teacher's storage crates.
pub trait EventPayload: Serialize + DeserializeOwned + Send + Sync {}
impl<T> EventPayload for T where T: Serialize + DeserializeOwned + Send + Sync {}

/// A boxed, owned future, for normalizing async encoders/decoders.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error produced by an encoder or decoder.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Encoding the event payload failed. Propagated unchanged; fails the
    /// whole write call — never swallowed like metadata
    /// errors are.
    #[error("event payload encode failed: {0}")]
    EncodeFailed(String),
    /// Decoding the event payload failed. Propagated; fails the replay
    /// call.
    #[error("event payload decode failed: {0}")]
    DecodeFailed(String),
}

/// The bytes produced by encoding an event payload, plus the identity
/// needed to decode it again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// Serializer id that produced `bytes`.
    pub ser_id: i32,
    /// Serializer manifest for `bytes`.
    pub ser_manifest: String,
}

/// Outcome of an encode or decode call: either already resolved (a
/// synchronous codec) or a future to drive (an asynchronous one). Callers
/// normalize with [`EncodeOutcome::resolve`] without blocking the owning
/// task either way.
pub enum EncodeOutcome {
    /// A synchronous codec already produced its result.
    Ready(Result<EncodedPayload, CodecError>),
    /// An asynchronous codec; await this to get the result.
    Pending(BoxFuture<'static, Result<EncodedPayload, CodecError>>),
}

impl EncodeOutcome {
    /// Normalizes either variant into a future.
    pub async fn resolve(self) -> Result<EncodedPayload, CodecError> {
        match self {
            EncodeOutcome::Ready(r) => r,
            EncodeOutcome::Pending(f) => f.await,
        }
    }
}

/// Outcome of a decode call, mirroring [`EncodeOutcome`].
pub enum DecodeOutcome<P> {
    /// A synchronous codec already produced its result.
    Ready(Result<P, CodecError>),
    /// An asynchronous codec; await this to get the result.
    Pending(BoxFuture<'static, Result<P, CodecError>>),
}

impl<P> DecodeOutcome<P> {
    /// Normalizes either variant into a future.
    pub async fn resolve(self) -> Result<P, CodecError> {
        match self {
            DecodeOutcome::Ready(r) => r,
            DecodeOutcome::Pending(f) => f.await,
        }
    }
}

/// An encoder/decoder pair for one event payload type, supplied by the
/// embedding framework's serializer registry (out of scope here).
pub trait EventCodec<P: EventPayload>: Send + Sync {
    /// Serializer id this codec produces payloads under.
    fn ser_id(&self) -> i32;

    /// Serializer manifest string for `P`.
    fn manifest(&self) -> String;

    /// Encode `event`. May resolve immediately or asynchronously.
    fn encode(&self, event: &P) -> EncodeOutcome;

    /// Decode a payload previously produced by [`EventCodec::encode`].
    fn decode(&self, bytes: &[u8]) -> DecodeOutcome<P>;
}

/// Encodes event metadata, falling back to the sentinel
/// [`MetaPayload::unknown`] on failure rather than failing the event
///. Metadata is serialized independently of the event
/// payload: a metadata encode failure must never surface as a payload
/// encode failure.
pub async fn serialize_meta<M, C>(meta: Option<&M>, codec: &C) -> Option<MetaPayload>
where
    M: EventPayload,
    C: EventCodec<M>,
{
    let meta = meta?;
    match codec.encode(meta).resolve().await {
        Ok(encoded) => Some(MetaPayload {
            bytes: encoded.bytes,
            ser_id: encoded.ser_id,
            ser_manifest: encoded.ser_manifest,
        }),
        Err(_) => Some(MetaPayload::unknown()),
    }
}

/// Decodes event metadata, returning `None` if no metadata is present, or
/// the sentinel value if the stored metadata fails to deserialize
/// — this never fails the surrounding event read.
pub async fn deserialize_meta<M, C>(meta: Option<&MetaPayload>, codec: &C) -> Option<MetaPayload>
where
    M: EventPayload,
    C: EventCodec<M>,
{
    let meta = meta?;
    if meta.is_unknown() {
        return Some(meta.clone());
    }
    match codec.decode(&meta.bytes).resolve().await {
        Ok(_) => Some(meta.clone()),
        Err(_) => Some(MetaPayload::unknown()),
    }
}

/// Column-presence probe cache. The storage schema
/// may or may not have the `meta`, legacy `tag1/tag2/tag3`, or `tags`
/// columns; presence is discovered on first row and cached per process.
/// The cache is advisory — a stale miss merely re-probes, it never fails a
/// read.
#[derive(Debug, Default)]
pub struct ColumnPresenceCache {
    meta: std::sync::OnceLock<bool>,
    legacy_tags: std::sync::OnceLock<bool>,
    tags: std::sync::OnceLock<bool>,
}

impl ColumnPresenceCache {
    /// New, empty cache — nothing probed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached `meta` column presence, probing and caching it
    /// via `probe` on first use.
    pub fn meta_present(&self, probe: impl FnOnce() -> bool) -> bool {
        *self.meta.get_or_init(probe)
    }

    /// Returns the cached legacy `tag1/tag2/tag3` column presence.
    pub fn legacy_tags_present(&self, probe: impl FnOnce() -> bool) -> bool {
        *self.legacy_tags.get_or_init(probe)
    }

    /// Returns the cached `tags` column presence.
    pub fn tags_present(&self, probe: impl FnOnce() -> bool) -> bool {
        *self.tags.get_or_init(probe)
    }

    /// Drops any cached values, forcing the next access to re-probe. The
    /// cache is advisory so this is safe to call at any time, e.g. after
    /// an operator runs a schema migration without restarting the process.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}
