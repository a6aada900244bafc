//! Client identity and limiter keys.

use std::fmt;

use sha2::{Digest, Sha256};

use super::policy::{RouteClass, normalize_path};

/// Bucket used when the source address or user agent is missing.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Hex digits of the user-agent digest kept in the identity.
const UA_HASH_LEN: usize = 16;

/// Network-level client identity: source address plus a user-agent digest.
///
/// Derived before authentication, so it is only as strong as the headers
/// it is built from. Clients sharing a NAT and a browser build collide, and
/// a client rotating its user agent gets a fresh bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn derive(source_ip: Option<&str>, user_agent: Option<&str>) -> Self {
        let ip = source_ip
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .unwrap_or(UNKNOWN_CLIENT);
        let user_agent = user_agent.unwrap_or(UNKNOWN_CLIENT);

        let mut hasher = Sha256::new();
        hasher.update(user_agent.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        Self(format!("{}:{}", ip, &digest[..UA_HASH_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The (client, endpoint) pair a quota is tracked against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimiterKey {
    client: ClientIdentity,
    endpoint: String,
}

impl LimiterKey {
    /// Classified routes share one window per class; everything else is
    /// tracked per normalised path.
    pub fn new(client: ClientIdentity, class: RouteClass, path: &str) -> Self {
        let endpoint = match class.label() {
            Some(label) => label.to_string(),
            None => normalize_path(path),
        };

        Self { client, endpoint }
    }

    pub fn client(&self) -> &ClientIdentity {
        &self.client
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Key used in the backing store, e.g. `rate_limit:10.0.0.1:ab12..:auth:login`.
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{}:{}:{}", prefix, self.client, self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_deterministic() {
        let a = ClientIdentity::derive(Some("10.0.0.1"), Some("curl/8.4.0"));
        let b = ClientIdentity::derive(Some("10.0.0.1"), Some("curl/8.4.0"));
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("10.0.0.1:"));
        assert_eq!(a.as_str().len(), "10.0.0.1:".len() + UA_HASH_LEN);
    }

    #[test]
    fn test_identity_differs_by_user_agent() {
        let a = ClientIdentity::derive(Some("10.0.0.1"), Some("curl/8.4.0"));
        let b = ClientIdentity::derive(Some("10.0.0.1"), Some("Mozilla/5.0"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_source_falls_back_to_unknown() {
        let id = ClientIdentity::derive(None, Some("curl/8.4.0"));
        assert!(id.as_str().starts_with("unknown:"));

        let blank = ClientIdentity::derive(Some("  "), Some("curl/8.4.0"));
        assert_eq!(id, blank);
    }

    #[test]
    fn test_missing_user_agent_hashes_unknown() {
        let missing = ClientIdentity::derive(Some("10.0.0.1"), None);
        let literal = ClientIdentity::derive(Some("10.0.0.1"), Some("unknown"));
        assert_eq!(missing, literal);
    }

    #[test]
    fn test_limiter_key_uses_class_label() {
        let client = ClientIdentity::derive(Some("10.0.0.1"), None);
        let a = LimiterKey::new(client.clone(), RouteClass::Projects, "/api/v1/projects/");
        let b = LimiterKey::new(client.clone(), RouteClass::Projects, "/api/v1/projects/9");
        assert_eq!(a, b);
        assert_eq!(a.endpoint(), "projects");

        let other = LimiterKey::new(client, RouteClass::Other, "/api/v1/users//me/");
        assert_eq!(other.endpoint(), "/api/v1/users/me");
    }

    #[test]
    fn test_storage_key_format() {
        let client = ClientIdentity::derive(Some("10.0.0.1"), None);
        let key = LimiterKey::new(client.clone(), RouteClass::Login, "/api/v1/auth/login");
        assert_eq!(
            key.storage_key("rate_limit"),
            format!("rate_limit:{}:auth:login", client)
        );
    }
}
