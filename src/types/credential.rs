use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{address::Address, amount::Amount, TokenId};

pub const UNTITLED_CREDENTIAL: &str = "Untitled Credential";
pub const UNKNOWN_ISSUER: &str = "Unknown Issuer";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Pending,
    Verified,
    Rejected,
}

impl CredentialStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CredentialStatus::Pending)
    }

    pub fn from_decision(approved: bool) -> Self {
        if approved {
            CredentialStatus::Verified
        } else {
            CredentialStatus::Rejected
        }
    }
}

/// Free-form credential document. Known keys are typed, anything else lands in
/// `extra` and survives a round trip through the metadata codec.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialMetadata {
    #[serde(rename = "title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "issuer", skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    // NOTE: milliseconds since epoch
    #[serde(rename = "issuedAt", skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,

    #[serde(rename = "expirationDate", skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,

    #[serde(rename = "validUntil", skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<i64>,

    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(rename = "skills", default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,

    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub status: Option<CredentialStatus>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "id")]
    pub id: String,

    #[serde(rename = "tokenId")]
    pub token_id: TokenId,

    #[serde(rename = "title")]
    pub title: String,

    #[serde(rename = "issuer")]
    pub issuer: String,

    #[serde(rename = "issuedTo")]
    pub issued_to: Address,

    #[serde(rename = "issuedAt")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "status")]
    pub status: CredentialStatus,

    #[serde(rename = "metadata")]
    pub metadata: CredentialMetadata,
}

impl Credential {
    pub fn from_metadata(
        token_id: TokenId,
        owner: Address,
        metadata: CredentialMetadata,
        status: CredentialStatus,
    ) -> Self {
        let issued_at = metadata
            .issued_at
            .filter(|millis| *millis != 0)
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or_else(Utc::now);
        let or_default = |value: &Option<String>, default: &str| match value.as_deref() {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        };

        Credential {
            id: token_id.to_string(),
            token_id,
            title: or_default(&metadata.title, UNTITLED_CREDENTIAL),
            issuer: or_default(&metadata.issuer, UNKNOWN_ISSUER),
            issued_to: owner,
            issued_at,
            status,
            metadata,
        }
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let contains = |value: &str| value.to_lowercase().contains(&needle);
        contains(self.title.as_str())
            || contains(self.issuer.as_str())
            || self.metadata.description.as_deref().map_or(false, contains)
            || self.metadata.skills.iter().any(|skill| contains(skill.as_str()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    #[serde(rename = "id")]
    pub id: String,

    #[serde(rename = "credentialId")]
    pub credential_id: TokenId,

    #[serde(rename = "requestedBy")]
    pub requested_by: Address,

    #[serde(rename = "requestedAt")]
    pub requested_at: DateTime<Utc>,

    #[serde(rename = "status")]
    pub status: RequestStatus,

    #[serde(rename = "stakedAmount", skip_serializing_if = "Option::is_none")]
    pub staked_amount: Option<Amount>,
}
