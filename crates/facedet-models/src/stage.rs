//! Request pipeline stages.
//!
//! A request moves strictly forward:
//!
//! `Received -> Decoded -> Detected -> Annotated -> Encoded -> Done`
//!
//! `Failed` is reachable from every non-terminal stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Decoded,
    Detected,
    Annotated,
    Encoded,
    Done,
    Failed,
}

impl PipelineStage {
    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Decoded => "decoded",
            PipelineStage::Detected => "detected",
            PipelineStage::Annotated => "annotated",
            PipelineStage::Encoded => "encoded",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }

    /// The stage that follows on success, `None` for terminal stages.
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Received => Some(PipelineStage::Decoded),
            PipelineStage::Decoded => Some(PipelineStage::Detected),
            PipelineStage::Detected => Some(PipelineStage::Annotated),
            PipelineStage::Annotated => Some(PipelineStage::Encoded),
            PipelineStage::Encoded => Some(PipelineStage::Done),
            PipelineStage::Done | PipelineStage::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }

    /// Returns true if `to` is a legal transition from this stage.
    pub fn can_transition_to(&self, to: PipelineStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == PipelineStage::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_chain() {
        let mut stage = PipelineStage::Received;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(stage.can_transition_to(next));
            stage = next;
            seen.push(stage);
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(stage, PipelineStage::Done);
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        for stage in [
            PipelineStage::Received,
            PipelineStage::Decoded,
            PipelineStage::Detected,
            PipelineStage::Annotated,
            PipelineStage::Encoded,
        ] {
            assert!(stage.can_transition_to(PipelineStage::Failed));
        }
        assert!(!PipelineStage::Done.can_transition_to(PipelineStage::Failed));
        assert!(!PipelineStage::Failed.can_transition_to(PipelineStage::Failed));
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!PipelineStage::Received.can_transition_to(PipelineStage::Detected));
        assert!(!PipelineStage::Annotated.can_transition_to(PipelineStage::Decoded));
    }
}
