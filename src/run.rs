//! The transient per-trigger aggregate and its state machine.
//!
//! ```text
//! idle ──▶ locating ──▶ retrieving ──▶ assembling ──▶ done
//!   └──────────┴─────────────┴──────────────┴──────▶ failed
//! ```
//!
//! A [`PipelineRun`] is created when a trigger fires, mutated only by the
//! orchestrator between suspension points, and dropped once the artifact is
//! produced or the run fails.

use crate::asset::{Asset, Payload, RetrievalResult};
use crate::error::{ExtractError, RetrievalError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which artifact a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Compressed archive with one entry per asset.
    Archive,
    /// Paginated document with one page per asset.
    Document,
}

impl RunMode {
    pub fn mime_type(&self) -> &'static str {
        match self {
            RunMode::Archive => "application/zip",
            RunMode::Document => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            RunMode::Archive => "zip",
            RunMode::Document => "pdf",
        }
    }
}

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Locating,
    Retrieving,
    Assembling,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Whether `self → next` is an edge of the state machine.
    pub fn can_advance_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle, Locating) | (Locating, Retrieving) | (Retrieving, Assembling) => true,
            (Assembling, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Locating => "locating",
            RunState::Retrieving => "retrieving",
            RunState::Assembling => "assembling",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One end-to-end execution from trigger to artifact or failure.
#[derive(Debug)]
pub struct PipelineRun {
    mode: RunMode,
    state: RunState,
    assets: Vec<Asset>,
    results: BTreeMap<usize, RetrievalResult>,
    completed: usize,
}

impl PipelineRun {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            state: RunState::Idle,
            assets: Vec::new(),
            results: BTreeMap::new(),
            completed: 0,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Move to `next`, rejecting edges the state machine does not have.
    pub fn advance(&mut self, next: RunState) -> Result<(), ExtractError> {
        if !self.state.can_advance_to(next) {
            return Err(ExtractError::Internal(format!(
                "illegal run transition {} → {}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Install the located assets. Only legal while locating.
    pub fn set_assets(&mut self, assets: Vec<Asset>) -> Result<(), ExtractError> {
        if self.state != RunState::Locating {
            return Err(ExtractError::Internal(format!(
                "assets installed while {}",
                self.state
            )));
        }
        self.assets = assets;
        Ok(())
    }

    /// Record the outcome for `ordinal` and return the new completed count.
    ///
    /// A second result for the same ordinal is ignored; results are immutable
    /// once recorded.
    pub fn record(&mut self, ordinal: usize, result: RetrievalResult) -> usize {
        if !self.results.contains_key(&ordinal) {
            self.results.insert(ordinal, result);
            self.completed += 1;
        }
        self.completed
    }

    /// Successful payloads in ordinal order, whatever order they completed in.
    pub fn successes(&self) -> Vec<(&Asset, &Payload)> {
        self.assets
            .iter()
            .filter_map(|a| match self.results.get(&a.ordinal) {
                Some(Ok(p)) => Some((a, p)),
                _ => None,
            })
            .collect()
    }

    /// Failed retrievals in ordinal order.
    pub fn failures(&self) -> Vec<(usize, RetrievalError)> {
        self.results
            .iter()
            .filter_map(|(ordinal, r)| r.as_ref().err().map(|e| (*ordinal, e.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::PayloadSource;
    use url::Url;

    fn asset(n: usize) -> Asset {
        Asset::new(
            n,
            Url::parse(&format!("https://cdn.example.com/{n}.png")).unwrap(),
            "png",
        )
    }

    fn payload(tag: u8) -> Payload {
        Payload::new(vec![tag], "image/png", PayloadSource::Network)
    }

    fn retrieving_run(n: usize) -> PipelineRun {
        let mut run = PipelineRun::new(RunMode::Archive);
        run.advance(RunState::Locating).unwrap();
        run.set_assets((1..=n).map(asset).collect()).unwrap();
        run.advance(RunState::Retrieving).unwrap();
        run
    }

    #[test]
    fn happy_path_transitions() {
        let mut run = retrieving_run(1);
        run.advance(RunState::Assembling).unwrap();
        run.advance(RunState::Done).unwrap();
        assert!(run.state().is_terminal());
    }

    #[test]
    fn failed_is_absorbing() {
        let mut run = PipelineRun::new(RunMode::Document);
        run.advance(RunState::Locating).unwrap();
        run.advance(RunState::Failed).unwrap();
        assert!(run.advance(RunState::Retrieving).is_err());
        assert!(run.advance(RunState::Failed).is_err());
    }

    #[test]
    fn cannot_skip_phases() {
        let mut run = PipelineRun::new(RunMode::Archive);
        assert!(run.advance(RunState::Retrieving).is_err());
        assert_eq!(run.state(), RunState::Idle);
    }

    #[test]
    fn successes_are_ordinal_ordered() {
        let mut run = retrieving_run(3);
        assert_eq!(run.record(3, Ok(payload(3))), 1);
        assert_eq!(run.record(2, Err(RetrievalError::network("reset"))), 2);
        assert_eq!(run.record(1, Ok(payload(1))), 3);

        let names: Vec<_> = run.successes().iter().map(|(a, _)| a.ordinal).collect();
        assert_eq!(names, vec![1, 3]);
        assert_eq!(run.failures().len(), 1);
        assert_eq!(run.failures()[0].0, 2);
    }

    #[test]
    fn duplicate_record_is_ignored() {
        let mut run = retrieving_run(2);
        run.record(1, Ok(payload(1)));
        assert_eq!(run.record(1, Err(RetrievalError::network("late"))), 1);
        assert_eq!(run.successes().len(), 1);
    }
}
