use std::fmt;

use serde::{Deserialize, Serialize};

use super::address::Address;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Employer,
    Issuer,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserRole::Student => "student",
            UserRole::Employer => "employer",
            UserRole::Issuer => "issuer",
        };
        f.write_str(name)
    }
}

/// The account bound to a session. `role` is a local classification only and
/// grants nothing on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "address")]
    pub address: Address,

    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "email", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(rename = "role")]
    pub role: UserRole,

    #[serde(rename = "isConnected")]
    pub is_connected: bool,
}

impl Identity {
    pub fn new(address: Address) -> Self {
        Identity { address, name: None, email: None, role: UserRole::default(), is_connected: true }
    }

    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = Some(name);
        }
        if let Some(email) = update.email {
            self.email = Some(email);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(rename = "name", default)]
    pub name: Option<String>,

    #[serde(rename = "email", default)]
    pub email: Option<String>,
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_apply_merges_only_present_fields() {
        let address: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        let mut identity = Identity::new(address);
        identity.apply(ProfileUpdate { name: Some("Ada".to_string()), email: None });
        identity.apply(ProfileUpdate { name: None, email: Some("ada@example.org".to_string()) });

        assert_eq!(identity.name.as_deref(), Some("Ada"));
        assert_eq!(identity.email.as_deref(), Some("ada@example.org"));
        assert_eq!(identity.role, UserRole::Student);
    }

    #[test]
    pub fn test_persisted_shape() {
        let address: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        let mut identity = Identity::new(address);
        identity.role = UserRole::Issuer;

        let json = serde_json::to_value(&identity).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "address": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
                "role": "issuer",
                "isConnected": true,
            })
        );
    }
}
