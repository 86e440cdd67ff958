use serde::{Deserialize, Serialize};

/// A session as reported by any backend.
///
/// Snapshots are rebuilt on every poll and never mutated after the
/// parser hands them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session name, unique per backend
    pub name: String,
    /// Server process id, when the backend reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Number of attached clients
    pub clients: u32,
    /// Directory the session was started in
    pub started_in: String,
    /// Attached somewhere, or the caller's own session
    pub active: bool,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pid: None,
            clients: 0,
            started_in: "~".to_string(),
            active: false,
        }
    }

    /// Derive `active` from the client count and the caller's current session.
    pub fn resolve_active(mut self, current: Option<&str>) -> Self {
        self.active = self.clients > 0 || current == Some(self.name.as_str());
        self
    }
}
