// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! [Service account keys].
//!
//! [Service account keys]: https://cloud.google.com/iam/docs/keys-create-delete

use crate::build_errors::BuildError;
use crate::signer::rs256::RsaSigner;
use serde::Deserialize;
use std::path::Path;

/// A service account key, as downloaded from the console.
///
/// Only the fields used to mint token assertions are kept.
#[derive(Clone, Deserialize, PartialEq)]
pub struct ServiceAccountKey {
    /// The client email address of the service account.
    /// (e.g., "my-sa@my-project.iam.gserviceaccount.com").
    pub client_email: String,
    /// ID of the service account's private key.
    pub private_key_id: String,
    /// The PEM-encoded private key, in PKCS#8 or PKCS#1 format.
    pub private_key: String,
    /// The project id the service account belongs to.
    #[serde(default)]
    pub project_id: Option<String>,
    /// The endpoint that exchanges assertions for access tokens.
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parses a key from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json).map_err(BuildError::parsing)
    }

    /// Reads and parses a key file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BuildError::loading(format!("{}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Creates an `RS256` signer with the private key, using the key id as
    /// the `kid` header.
    pub fn signer(&self) -> crate::signer::Result<RsaSigner> {
        Ok(RsaSigner::from_pem(&self.private_key)?.with_key_id(&self.private_key_id))
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"[censored]")
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::signer::SigningProvider;
    use crate::signer::rs256::tests::{pkcs8_pem, verify};
    use serde_json::json;

    type TestResult = anyhow::Result<()>;

    pub(crate) fn key_json() -> serde_json::Value {
        json!({
            "type": "service_account",
            "client_email": "test-client-email",
            "private_key_id": "test-private-key-id",
            "private_key": pkcs8_pem(),
            "project_id": "test-project-id",
            "token_uri": "https://test.example.com/token",
            "universe_domain": "test-universe-domain",
        })
    }

    #[test]
    fn from_json() -> TestResult {
        let key = ServiceAccountKey::from_json(&key_json().to_string())?;
        assert_eq!(key.client_email, "test-client-email");
        assert_eq!(key.private_key_id, "test-private-key-id");
        assert_eq!(key.project_id.as_deref(), Some("test-project-id"));
        assert_eq!(
            key.token_uri.as_deref(),
            Some("https://test.example.com/token")
        );
        Ok(())
    }

    #[test]
    fn optional_fields() -> TestResult {
        let mut json = key_json();
        let map = json.as_object_mut().unwrap();
        map.remove("project_id");
        map.remove("token_uri");
        let key = ServiceAccountKey::from_json(&json.to_string())?;
        assert_eq!(key.project_id, None);
        assert_eq!(key.token_uri, None);
        Ok(())
    }

    #[test]
    fn missing_private_key() {
        let mut json = key_json();
        json.as_object_mut().unwrap().remove("private_key");
        let err = ServiceAccountKey::from_json(&json.to_string()).unwrap_err();
        assert!(err.is_parsing(), "{err:?}");
    }

    #[test]
    fn from_file() -> TestResult {
        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        std::fs::write(&path, key_json().to_string())?;
        let key = ServiceAccountKey::from_file(&path)?;
        assert_eq!(key.client_email, "test-client-email");
        Ok(())
    }

    #[test]
    fn from_file_missing() {
        let err = ServiceAccountKey::from_file("/no/such/dir/key.json").unwrap_err();
        assert!(err.is_loading(), "{err:?}");
        assert!(err.to_string().contains("/no/such/dir/key.json"), "{err}");
    }

    #[test]
    fn from_file_malformed() -> TestResult {
        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        std::fs::write(&path, "not json")?;
        let err = ServiceAccountKey::from_file(&path).unwrap_err();
        assert!(err.is_parsing(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn signer() -> TestResult {
        let key = ServiceAccountKey::from_json(&key_json().to_string())?;
        let signer = key.signer()?;
        assert_eq!(signer.key_id(), Some("test-private-key-id"));
        let signature = signer.sign(b"header.claims").await?;
        verify(b"header.claims", &signature).map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(())
    }

    #[test]
    fn signer_invalid_key() -> TestResult {
        let mut json = key_json();
        json["private_key"] = json!("not a pem");
        let key = ServiceAccountKey::from_json(&json.to_string())?;
        let err = key.signer().unwrap_err();
        assert!(err.is_parsing(), "{err:?}");
        Ok(())
    }

    #[test]
    fn debug() -> TestResult {
        let key = ServiceAccountKey::from_json(&key_json().to_string())?;
        let fmt = format!("{key:?}");
        assert!(fmt.contains("test-client-email"), "{fmt}");
        assert!(!fmt.contains("PRIVATE KEY"), "{fmt}");
        assert!(fmt.contains("[censored]"), "{fmt}");
        Ok(())
    }
}
