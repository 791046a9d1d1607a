use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::ContextState;

/// One entry of a context's state history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub state: ContextState,
    pub entered_at: DateTime<Utc>,
    /// Time spent in WORK, set on the record that left WORK
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_duration: Option<Duration>,
}

/// Append-only, ordered history of visited states
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateHistory {
    records: Vec<HistoryRecord>,
}

impl StateHistory {
    pub fn starting_at(state: ContextState) -> Self {
        let mut history = Self::default();
        history.record(state);
        history
    }

    /// Append `state`; when leaving WORK the time spent there is recorded alongside.
    pub fn record(&mut self, state: ContextState) -> &HistoryRecord {
        let now = Utc::now();
        let work_duration = match self.records.last() {
            Some(last) if last.state == ContextState::Work && state != ContextState::Work => {
                (now - last.entered_at).to_std().ok()
            }
            _ => None,
        };

        self.records.push(HistoryRecord {
            state,
            entered_at: now,
            work_duration,
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn states(&self) -> Vec<ContextState> {
        self.records.iter().map(|r| r.state).collect()
    }

    pub fn last_state(&self) -> Option<ContextState> {
        self.records.last().map(|r| r.state)
    }

    /// State recorded right before the latest one
    pub fn previous_state(&self) -> Option<ContextState> {
        self.records
            .len()
            .checked_sub(2)
            .map(|index| self.records[index].state)
    }

    /// The context is in a WORK phase that was entered from DONE
    pub fn is_compensating(&self) -> bool {
        self.last_state() == Some(ContextState::Work)
            && self.previous_state() == Some(ContextState::Done)
    }

    pub fn has_visited(&self, state: ContextState) -> bool {
        self.records.iter().any(|r| r.state == state)
    }

    /// Consecutive (previous, current) pairs recorded after the first `skip` entries
    pub fn transitions_since(&self, skip: usize) -> Vec<(ContextState, ContextState)> {
        (skip.max(1)..self.records.len())
            .map(|i| (self.records[i - 1].state, self.records[i].state))
            .collect()
    }

    /// Total time spent in WORK across forward and compensation phases
    pub fn total_work_duration(&self) -> Duration {
        self.records.iter().filter_map(|r| r.work_duration).sum()
    }
}
