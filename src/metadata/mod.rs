use data_encoding::BASE64;
use thiserror::Error;

use crate::types::CredentialMetadata;

pub const DATA_URI_PREFIX: &str = "data:application/json;base64,";

#[derive(Debug, Error)]
pub enum MetadataCodecError {
    #[error("unsupported metadata uri: {0}")]
    UnsupportedUri(String),
    #[error("base64 decode error: {0}")]
    Base64DecodeError(#[from] data_encoding::DecodeError),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub trait MetadataCodec: Send + Sync {
    fn encode(&self, metadata: &CredentialMetadata) -> Result<String, MetadataCodecError>;
    fn decode(&self, uri: &str) -> Result<CredentialMetadata, MetadataCodecError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DataUriCodec;

impl MetadataCodec for DataUriCodec {
    fn encode(&self, metadata: &CredentialMetadata) -> Result<String, MetadataCodecError> {
        // NOTE: canonical JSON, so equal metadata yields an equal uri
        let json = serde_jcs::to_string(metadata)?;
        Ok(format!("{}{}", DATA_URI_PREFIX, BASE64.encode(json.as_bytes())))
    }

    fn decode(&self, uri: &str) -> Result<CredentialMetadata, MetadataCodecError> {
        let encoded = uri
            .strip_prefix(DATA_URI_PREFIX)
            .ok_or_else(|| MetadataCodecError::UnsupportedUri(truncate(uri)))?;
        let json = BASE64.decode(encoded.as_bytes())?;
        Ok(serde_json::from_slice(&json)?)
    }
}

fn truncate(uri: &str) -> String {
    uri.chars().take(48).collect()
}

#[cfg(test)]
pub mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::CredentialStatus;

    fn metadata() -> CredentialMetadata {
        let mut metadata = CredentialMetadata {
            title: Some("Bachelor of Computer Science".to_string()),
            issuer: Some("Tech University".to_string()),
            description: Some("Completed with honors".to_string()),
            issued_at: Some(1_684_108_800_000),
            valid_until: Some(1_842_000_000_000),
            skills: vec!["Programming".to_string(), "Algorithms".to_string()],
            status: Some(CredentialStatus::Pending),
            ..Default::default()
        };
        metadata.extra.insert("honors".to_string(), json!({"level": "summa"}));
        metadata
    }

    #[test]
    pub fn test_encode_then_decode() {
        let codec = DataUriCodec;
        let uri = codec.encode(&metadata()).unwrap();

        assert!(uri.starts_with(DATA_URI_PREFIX));
        assert_eq!(codec.decode(&uri).unwrap(), metadata());
    }

    #[test]
    pub fn test_encode_is_deterministic() {
        let codec = DataUriCodec;

        assert_eq!(codec.encode(&metadata()).unwrap(), codec.encode(&metadata()).unwrap());
    }

    #[test]
    pub fn test_decode_reads_browser_encoded_uri() {
        // btoa(JSON.stringify({title: "Web", skills: ["React"]}))
        let encoded = "eyJ0aXRsZSI6IldlYiIsInNraWxscyI6WyJSZWFjdCJdfQ==";
        let uri = format!("{}{}", DATA_URI_PREFIX, encoded);

        let decoded = DataUriCodec.decode(&uri).unwrap();

        assert_eq!(decoded.title.as_deref(), Some("Web"));
        assert_eq!(decoded.skills, vec!["React".to_string()]);
    }

    #[test]
    pub fn test_decode_rejects_other_schemes() {
        let result = DataUriCodec
            .decode("ipfs://bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi");

        assert!(matches!(result, Err(MetadataCodecError::UnsupportedUri(_))));
    }
}
