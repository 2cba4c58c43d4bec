//! Analysis job and its state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use linchpin_common::{LinchpinError, Result, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Stage1Running,
    Stage1Done,
    Stage2Running,
    Stage2Done,
    Stage3Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending       => "pending",
            JobState::Stage1Running => "stage1_running",
            JobState::Stage1Done    => "stage1_done",
            JobState::Stage2Running => "stage2_running",
            JobState::Stage2Done    => "stage2_done",
            JobState::Stage3Running => "stage3_running",
            JobState::Completed     => "completed",
            JobState::Failed        => "failed",
            JobState::Cancelled     => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            JobState::Stage1Running | JobState::Stage2Running | JobState::Stage3Running
        )
    }

    /// Forward edges of the happy path, `failed` from a running state and
    /// `cancelled` from an idle, non-terminal state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Pending, Stage1Running)
            | (Stage1Running, Stage1Done)
            | (Stage1Done, Stage2Running)
            | (Stage2Running, Stage2Done)
            | (Stage2Done, Stage3Running)
            | (Stage3Running, Completed) => true,
            (s, Failed) => s.is_running(),
            (s, Cancelled) => !s.is_running() && !s.is_terminal(),
            _ => false,
        }
    }

    /// The stage a running state belongs to.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            JobState::Stage1Running | JobState::Stage1Done => Some(Stage::Differential),
            JobState::Stage2Running | JobState::Stage2Done => Some(Stage::Network),
            JobState::Stage3Running => Some(Stage::Linchpin),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stage whose failure ended the job.
    pub failed_stage: Option<Stage>,
    /// The failing stage's error, verbatim.
    pub error: Option<String>,
}

impl AnalysisJob {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: JobState::Pending,
            created_at: now,
            updated_at: now,
            failed_stage: None,
            error: None,
        }
    }

    pub fn transition(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(LinchpinError::InvalidTransition {
                from: self.state.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move a running job to `failed`, recording the stage and error.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        let stage = self.state.stage();
        self.transition(JobState::Failed)?;
        self.failed_stage = stage;
        self.error = Some(error.into());
        Ok(())
    }
}

impl Default for AnalysisJob {
    fn default() -> Self {
        Self::new()
    }
}
