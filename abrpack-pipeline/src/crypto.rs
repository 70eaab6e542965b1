//! Key sources and the encryption handler.

use crate::error::{Error, Result};
use crate::handler::{DownstreamSet, HandlerKind, MediaHandler, StreamData};
use abrpack_core::params::{
    DecryptionParams, EncryptedStreamAttributes, EncryptionParams, KeyProvider, ProtectionScheme,
    RawKeyParams,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Expected size of key ids and content keys.
const KEY_SIZE: usize = 16;

/// One resolved encryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    /// 16-byte key id.
    pub key_id: Vec<u8>,
    /// 16-byte content key.
    pub key: Vec<u8>,
    /// IV, possibly empty when the cipher generates one.
    pub iv: Vec<u8>,
}

/// Hands out encryption or decryption keys by DRM label.
pub trait KeySource: Send + Sync {
    /// Resolve the key for a DRM label. The empty label is the default key.
    fn key_for_label(&self, label: &str) -> Result<EncryptionKey>;
}

/// Key source backed by key material supplied directly in the parameters.
pub struct RawKeySource {
    keys: HashMap<String, EncryptionKey>,
}

impl RawKeySource {
    /// Build from raw key parameters. Key ids and keys must be 16 bytes.
    pub fn new(params: &RawKeyParams) -> Result<Self> {
        if params.key_map.is_empty() {
            return Err(Error::InvalidArgument(
                "Raw key provider configured with no keys.".to_string(),
            ));
        }

        let mut keys = HashMap::new();
        for (label, raw) in &params.key_map {
            if raw.key.len() != KEY_SIZE || raw.key_id.len() != KEY_SIZE {
                return Err(Error::InvalidArgument(format!(
                    "Raw key for label '{label}' must have a {KEY_SIZE}-byte key and key id."
                )));
            }
            keys.insert(
                label.clone(),
                EncryptionKey {
                    key_id: raw.key_id.clone(),
                    key: raw.key.clone(),
                    iv: raw.iv.clone(),
                },
            );
        }
        Ok(Self { keys })
    }
}

impl KeySource for RawKeySource {
    fn key_for_label(&self, label: &str) -> Result<EncryptionKey> {
        if let Some(key) = self.keys.get(label) {
            return Ok(key.clone());
        }
        // Fall back to the default key.
        if let Some(key) = self.keys.get("") {
            return Ok(key.clone());
        }
        Err(Error::InvalidArgument(format!(
            "No key configured for DRM label '{label}'."
        )))
    }
}

/// Build the encryption key source for the configured provider.
///
/// Returns `None` when no provider is configured or when the provider's key
/// material is unusable; the caller decides whether that is an error.
pub fn create_encryption_key_source(params: &EncryptionParams) -> Option<Arc<dyn KeySource>> {
    match params.key_provider {
        KeyProvider::None => None,
        KeyProvider::Raw => match RawKeySource::new(&params.raw_key) {
            Ok(source) => Some(Arc::new(source)),
            Err(e) => {
                warn!("Failed to create raw encryption key source: {e}");
                None
            }
        },
        other => {
            warn!("Unsupported encryption key provider: {other:?}");
            None
        }
    }
}

/// Build the decryption key source for the configured provider.
pub fn create_decryption_key_source(params: &DecryptionParams) -> Option<Arc<dyn KeySource>> {
    match params.key_provider {
        KeyProvider::None => None,
        KeyProvider::Raw => match RawKeySource::new(&params.raw_key) {
            Ok(source) => Some(Arc::new(source)),
            Err(e) => {
                warn!("Failed to create raw decryption key source: {e}");
                None
            }
        },
        other => {
            warn!("Unsupported decryption key provider: {other:?}");
            None
        }
    }
}

#[derive(Default)]
struct EncryptionState {
    time_scale: u32,
}

/// Marks samples past the clear lead as encrypted with the key selected by
/// the stream label function.
pub struct EncryptionHandler {
    params: EncryptionParams,
    key_source: Arc<dyn KeySource>,
    downstreams: DownstreamSet,
    state: Mutex<EncryptionState>,
}

impl EncryptionHandler {
    /// Create an encryption handler bound to per-stream parameters and a
    /// key source.
    pub fn new(params: EncryptionParams, key_source: Arc<dyn KeySource>) -> Self {
        Self {
            params,
            key_source,
            downstreams: DownstreamSet::new(),
            state: Mutex::new(EncryptionState::default()),
        }
    }

    /// The protection scheme this handler encrypts with.
    pub fn protection_scheme(&self) -> ProtectionScheme {
        self.params.protection_scheme
    }

    /// The DRM label for a stream's attributes.
    pub fn stream_label(&self, attributes: &EncryptedStreamAttributes) -> String {
        match &self.params.stream_label_func {
            Some(func) => func(attributes),
            None => String::new(),
        }
    }

    /// Resolve the key for a stream's attributes.
    pub fn key_for_attributes(
        &self,
        attributes: &EncryptedStreamAttributes,
    ) -> Result<EncryptionKey> {
        self.key_source.key_for_label(&self.stream_label(attributes))
    }

    fn clear_lead_ticks(&self, time_scale: u32) -> i64 {
        (self.params.clear_lead_in_seconds * f64::from(time_scale)) as i64
    }
}

impl MediaHandler for EncryptionHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Encryptor
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn add_downstream(&self, downstream: Arc<dyn MediaHandler>) -> Result<()> {
        self.downstreams.add(downstream);
        Ok(())
    }

    fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>> {
        self.downstreams.list()
    }

    fn process(&self, data: StreamData) -> Result<()> {
        let data = match data {
            StreamData::StreamInfo(info) => {
                self.state.lock().time_scale = info.time_scale;
                StreamData::StreamInfo(info)
            }
            StreamData::MediaSample(mut sample) => {
                let time_scale = self.state.lock().time_scale;
                if sample.pts >= self.clear_lead_ticks(time_scale.max(1)) {
                    sample.is_encrypted = true;
                }
                StreamData::MediaSample(sample)
            }
            other => other,
        };
        self.downstreams.dispatch(data)
    }

    fn flush(&self) -> Result<()> {
        self.downstreams.flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abrpack_core::params::RawKey;

    fn raw_params(label: &str) -> RawKeyParams {
        let mut key_map = HashMap::new();
        key_map.insert(
            label.to_string(),
            RawKey {
                key_id: vec![1; 16],
                key: vec![2; 16],
                iv: vec![3; 8],
            },
        );
        RawKeyParams { key_map }
    }

    #[test]
    fn test_raw_key_source_lookup() {
        let source = RawKeySource::new(&raw_params("HD")).unwrap();
        let key = source.key_for_label("HD").unwrap();
        assert_eq!(key.key, vec![2; 16]);
        assert!(source.key_for_label("UHD1").is_err());
    }

    #[test]
    fn test_raw_key_source_default_label_fallback() {
        let source = RawKeySource::new(&raw_params("")).unwrap();
        assert!(source.key_for_label("SD").is_ok());
    }

    #[test]
    fn test_raw_key_source_rejects_bad_key_sizes() {
        let mut params = raw_params("");
        params.key_map.get_mut("").unwrap().key = vec![2; 8];
        assert!(RawKeySource::new(&params).is_err());
    }

    #[test]
    fn test_create_key_source_none_provider() {
        assert!(create_encryption_key_source(&EncryptionParams::default()).is_none());
        assert!(create_decryption_key_source(&DecryptionParams::default()).is_none());
    }

    #[test]
    fn test_create_key_source_raw_provider() {
        let params = EncryptionParams {
            key_provider: KeyProvider::Raw,
            raw_key: raw_params(""),
            ..Default::default()
        };
        assert!(create_encryption_key_source(&params).is_some());
    }

    #[test]
    fn test_create_key_source_raw_provider_without_keys() {
        let params = EncryptionParams {
            key_provider: KeyProvider::Raw,
            ..Default::default()
        };
        assert!(create_encryption_key_source(&params).is_none());
    }
}
