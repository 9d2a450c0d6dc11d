//! Grain and timer identity.

use std::any::type_name;
use std::fmt;
use uuid::Uuid;

/// Unique grain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrainId {
    id: Uuid,
}

impl GrainId {
    /// Create new grain ID
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Create from UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self { id }
    }

    /// Get UUID
    pub fn uuid(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for GrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grain-{}", self.id.simple())
    }
}

impl Default for GrainId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of one recurring timer within a grain.
///
/// Caller-named timers use [`TimerId::new`]. Command timers derive their id
/// from the command's static type, so "is a recurring dispatch of `C` already
/// active" can be answered without tracking a separate string id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerId(String);

impl TimerId {
    /// Caller-named timer id
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derived id for a command timer of type `C`.
    ///
    /// Deterministic over the command's type identity, which gives the
    /// at-most-one-command-timer-per-type invariant for free.
    pub fn for_command<C: 'static>() -> Self {
        Self(format!("command:{}", type_name::<C>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimerId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TimerId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PollPrices;
    struct FlushLedger;

    #[test]
    fn test_grain_id_unique() {
        let id1 = GrainId::new();
        let id2 = GrainId::new();

        assert_ne!(id1, id2);
        assert_ne!(id1.uuid(), id2.uuid());
    }

    #[test]
    fn test_grain_id_display() {
        let id = GrainId::new();
        let display = format!("{}", id);
        assert!(display.starts_with("grain-"));
    }

    #[test]
    fn test_command_timer_id_deterministic() {
        assert_eq!(TimerId::for_command::<PollPrices>(), TimerId::for_command::<PollPrices>());
        assert_ne!(TimerId::for_command::<PollPrices>(), TimerId::for_command::<FlushLedger>());
    }

    #[test]
    fn test_command_timer_id_names_type() {
        let id = TimerId::for_command::<PollPrices>();
        assert!(id.as_str().starts_with("command:"));
        assert!(id.as_str().contains("PollPrices"));
    }

    #[test]
    fn test_timer_id_from_str() {
        let id: TimerId = "heartbeat".into();
        assert_eq!(id, TimerId::new("heartbeat"));
        assert_eq!(id.to_string(), "heartbeat");
    }
}
