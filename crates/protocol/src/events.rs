use serde::{Deserialize, Serialize};

use crate::types::Side;

/// Named points in a copy at which a progress notification is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStage {
    PrepareEnter,
    PrepareExit,
    OverwriteDestination,
    TurlResolved,
    ChecksumEnter,
    ChecksumExit,
    FinalizeEnter,
    FinalizeExit,
}

/// Progress notification. Purely informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub side: Side,
    pub stage: EventStage,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl TransferEvent {
    pub fn new(side: Side, stage: EventStage, description: impl Into<String>) -> Self {
        Self {
            side,
            stage,
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_description_omitted() {
        let e = TransferEvent::new(Side::None, EventStage::PrepareEnter, "");
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"side":"none","stage":"prepare_enter"}"#);
    }
}
