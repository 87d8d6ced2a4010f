//! Scheduling and interview stages.
//!
//! Both coordinate people rather than data. They move through the full
//! status lifecycle but their payload never affects the score.

use super::{names, simulate_work, Stage, StageContext};
use crate::core::StageResult;
use crate::errors::StageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Payload of a coordination stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationRecord {
    /// What the stage coordinated.
    pub activity: String,
    /// Always false: coordination output is informational.
    pub score_affecting: bool,
}

/// A placeholder stage for founder meetings.
#[derive(Debug, Clone)]
pub struct CoordinationStage {
    name: &'static str,
    activity: &'static str,
    latency: Duration,
}

impl CoordinationStage {
    /// Creates the meeting scheduling stage.
    #[must_use]
    pub const fn scheduling(latency: Duration) -> Self {
        Self {
            name: names::SCHEDULING,
            activity: "founder meeting scheduled",
            latency,
        }
    }

    /// Creates the founder interview stage.
    #[must_use]
    pub const fn interview(latency: Duration) -> Self {
        Self {
            name: names::INTERVIEW,
            activity: "founder interview recorded",
            latency,
        }
    }
}

#[async_trait]
impl Stage for CoordinationStage {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(50);
        simulate_work(self.latency).await;

        ctx.output(&CoordinationRecord {
            activity: self.activity.to_string(),
            score_affecting: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(CoordinationStage::scheduling(Duration::ZERO).name(), "scheduling");
        assert_eq!(CoordinationStage::interview(Duration::ZERO).name(), "interview");
    }
}
