//! Image handling at the ingestion boundary.
//!
//! The boundary's only job is to turn an optional `imageBase64` payload into
//! an opaque URL before the report reaches the engine. Where the bytes
//! actually land is an injected concern; the default sink discards them.

use async_trait::async_trait;
use base64::Engine as _;
use tracing::debug;

use civicpulse_common::CivicError;

/// Destination for uploaded complaint photos. Returns an opaque URL for the
/// stored object, or `None` if the sink keeps nothing.
#[async_trait]
pub trait ImageSink: Send + Sync {
    async fn store(&self, bytes: Vec<u8>) -> Result<Option<String>, CivicError>;
}

/// Default sink: object storage is outside this service, so the decoded
/// bytes are dropped and the complaint carries no image URL.
pub struct NullImageSink;

#[async_trait]
impl ImageSink for NullImageSink {
    async fn store(&self, bytes: Vec<u8>) -> Result<Option<String>, CivicError> {
        debug!(size = bytes.len(), "image accepted and discarded (no sink configured)");
        Ok(None)
    }
}

/// Decode an `imageBase64` payload, tolerating a `data:image/...;base64,`
/// prefix the way the mobile clients send it.
pub fn decode_image_base64(payload: &str) -> Result<Vec<u8>, CivicError> {
    let raw = match payload.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|e| CivicError::Validation(format!("imageBase64 is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_base64() {
        assert_eq!(decode_image_base64("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn strips_data_uri_prefix() {
        let payload = "data:image/jpeg;base64,aGVsbG8=";
        assert_eq!(decode_image_base64(payload).unwrap(), b"hello");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode_image_base64("not base64 at all!!"),
            Err(CivicError::Validation(_))
        ));
    }
}
