use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::telemetry::{AttemptRecord, SearchStage};

/// Immutable event envelope published while an artifact is produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub id: Uuid,
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Progress {
        percent: u8,
        stage: Option<SearchStage>,
    },
    Attempt(AttemptRecord),
    Finished {
        met_budget: bool,
        size_bytes: usize,
    },
}

impl PipelineEvent {
    pub fn new(generation: u64, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn progress(generation: u64, percent: u8, stage: Option<SearchStage>) -> Self {
        Self::new(
            generation,
            EventPayload::Progress {
                percent: percent.min(100),
                stage,
            },
        )
    }
}
