use serde::{Deserialize, Serialize};

/// Reply to a trigger delivery. `routed` is false when the event was dropped
/// because it could not be attributed to the pairing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventAck {
    pub routed: bool,
    pub attempted: usize,
    pub delivered: usize,
    pub pruned: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
