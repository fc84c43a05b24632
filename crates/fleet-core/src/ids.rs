use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque device identifier.
///
/// Clients bring their own id (it is the path segment of the WebSocket URL),
/// so unlike the generated ids below there is no `new()` — only `from_raw`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClientId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generated viewer identifier, `viewer_{uuid}`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(String);

impl ViewerId {
    pub fn new() -> Self {
        Self(format!("viewer_{}", Uuid::now_v7()))
    }

    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation id for an in-flight command, `req_{counter}_{uuid}`.
///
/// The counter comes from a process-wide monotonic sequence and the suffix is
/// a UUID, so two requests can never share an id within a process.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn compose(counter: u64) -> Self {
        Self(format!("req_{counter}_{}", Uuid::now_v7()))
    }

    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_id_has_prefix() {
        let id = ViewerId::new();
        assert!(id.as_str().starts_with("viewer_"), "got: {id}");
    }

    #[test]
    fn viewer_ids_unique() {
        let a = ViewerId::new();
        let b = ViewerId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn request_id_carries_counter() {
        let id = RequestId::compose(42);
        assert!(id.as_str().starts_with("req_42_"), "got: {id}");
    }

    #[test]
    fn request_ids_with_same_counter_still_differ() {
        let a = RequestId::compose(7);
        let b = RequestId::compose(7);
        assert_ne!(a, b);
    }

    #[test]
    fn client_id_roundtrips_raw_string() {
        let id = ClientId::from_raw("cam-basement-01");
        assert_eq!(id.as_str(), "cam-basement-01");
        assert_eq!(id.to_string(), "cam-basement-01");
    }

    #[test]
    fn client_id_serde_transparent() {
        let id = ClientId::from_raw("dev_1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"dev_1\"");
        let back: ClientId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn client_id_from_str() {
        let id: ClientId = "abc".parse().unwrap();
        assert_eq!(id.as_str(), "abc");
    }
}
