// Query Domain Model

use super::error::{DomainError, Result};
use serde::{Serialize, Serializer};
use std::fmt;

/// Maximum payload size accepted at submission (bytes)
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Worker identifier (pool slot index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Connection identity, assigned by the connector for every established connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Bounded request payload (at most MAX_PAYLOAD_LEN bytes)
#[derive(Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Copy `bytes` into a new payload, rejecting anything over the bound.
    ///
    /// Oversized input is an error, never truncated.
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = bytes.as_ref();
        if bytes.len() > MAX_PAYLOAD_LEN {
            return Err(DomainError::PayloadTooLarge {
                len: bytes.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 view for logging
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({:?})", self.to_string_lossy())
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}

/// Identity stamped onto a query by the worker that claims it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionBinding {
    pub session_id: SessionId,
    pub logical_id: WorkerId,
    pub claimed_at: i64, // epoch ms
}

/// Per-request context carried from `submit` to the callback
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    payload: Payload,
    submitted_at: i64, // epoch ms
    binding: Option<SessionBinding>,
    /// Reserved classification tag (unused by dispatch)
    category: u32,
}

impl Query {
    pub fn new(payload: Payload, submitted_at: i64) -> Self {
        Self {
            payload,
            submitted_at,
            binding: None,
            category: 0,
        }
    }

    pub fn with_category(mut self, category: u32) -> Self {
        self.category = category;
        self
    }

    /// Bind the claiming worker's session to this query.
    ///
    /// A query is bound exactly once; a second bind is rejected.
    pub fn bind(&mut self, binding: SessionBinding) -> Result<()> {
        if let Some(existing) = &self.binding {
            return Err(DomainError::AlreadyBound {
                session: existing.session_id.to_string(),
                worker: existing.logical_id.to_string(),
            });
        }
        self.binding = Some(binding);
        Ok(())
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn submitted_at(&self) -> i64 {
        self.submitted_at
    }

    pub fn category(&self) -> u32 {
        self.category
    }

    pub fn binding(&self) -> Option<&SessionBinding> {
        self.binding.as_ref()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.binding.map(|b| b.session_id)
    }

    pub fn logical_id(&self) -> Option<WorkerId> {
        self.binding.map(|b| b.logical_id)
    }

    pub fn claimed_at(&self) -> Option<i64> {
        self.binding.map(|b| b.claimed_at)
    }

    /// Time spent queued, once claimed
    pub fn queued_ms(&self) -> Option<i64> {
        self.claimed_at().map(|c| (c - self.submitted_at).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(session: u64, worker: usize) -> SessionBinding {
        SessionBinding {
            session_id: SessionId(session),
            logical_id: WorkerId(worker),
            claimed_at: 1500,
        }
    }

    #[test]
    fn test_payload_at_bound_is_accepted() {
        let payload = Payload::new(vec![b'a'; MAX_PAYLOAD_LEN]).unwrap();
        assert_eq!(payload.len(), 255);
    }

    #[test]
    fn test_payload_over_bound_is_rejected_not_truncated() {
        let err = Payload::new(vec![b'a'; MAX_PAYLOAD_LEN + 1]).unwrap_err();
        assert_eq!(err, DomainError::PayloadTooLarge { len: 256, max: 255 });
    }

    #[test]
    fn test_unbound_query_has_no_session() {
        let query = Query::new(Payload::new("dune").unwrap(), 1000);
        assert_eq!(query.session_id(), None);
        assert_eq!(query.logical_id(), None);
        assert_eq!(query.claimed_at(), None);
        assert_eq!(query.queued_ms(), None);
        assert_eq!(query.len(), 4);
    }

    #[test]
    fn test_bind_records_claiming_worker() {
        let mut query = Query::new(Payload::new("dune").unwrap(), 1000);
        query.bind(binding(7, 3)).unwrap();

        assert_eq!(query.session_id(), Some(SessionId(7)));
        assert_eq!(query.logical_id(), Some(WorkerId(3)));
        assert_eq!(query.queued_ms(), Some(500));
    }

    #[test]
    fn test_second_bind_is_rejected() {
        let mut query = Query::new(Payload::new("dune").unwrap(), 1000);
        query.bind(binding(7, 3)).unwrap();

        let result = query.bind(binding(8, 4));
        assert!(matches!(result, Err(DomainError::AlreadyBound { .. })));
        assert_eq!(query.session_id(), Some(SessionId(7)));
    }

    #[test]
    fn test_query_serializes_payload_as_text() {
        let query = Query::new(Payload::new("emma").unwrap(), 42).with_category(2);
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["payload"], "emma");
        assert_eq!(value["category"], 2);
        assert!(value["binding"].is_null());
    }
}
