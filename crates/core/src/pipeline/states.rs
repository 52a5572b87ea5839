use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::errors::StageName;
use crate::schema::pages::PageType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "page_type")]
pub enum RunState {
    #[default]
    Idle,
    Parsing,
    Strategizing,
    Authoring(PageType),
    Complete,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// The stage that runs while the pipeline is in this state.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            Self::Parsing => Some(StageName::Parse),
            Self::Strategizing => Some(StageName::Strategize),
            Self::Authoring(page_type) => Some(StageName::Author(*page_type)),
            Self::Idle | Self::Complete | Self::Failed => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Parsing => f.write_str("parsing"),
            Self::Strategizing => f.write_str("strategizing"),
            Self::Authoring(page_type) => write!(f, "authoring({page_type})"),
            Self::Complete => f.write_str("complete"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEvent {
    Started,
    ProductValidated,
    StrategyReady,
    PageAuthored(PageType),
    StageFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub from: RunState,
    pub to: RunState,
    pub event: RunEvent,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid run transition from {state} using event {event:?}")]
pub struct RunTransitionError {
    pub state: RunState,
    pub event: RunEvent,
}

/// The pipeline state machine. Authoring runs in the fixed order of [`PageType::ALL`].
pub fn transition(current: RunState, event: RunEvent) -> Result<RunState, RunTransitionError> {
    use RunEvent::{PageAuthored, ProductValidated, StageFailed, Started, StrategyReady};
    use RunState::{Authoring, Complete, Failed, Idle, Parsing, Strategizing};

    let next = match (current, event) {
        (Idle, Started) => Parsing,
        (Parsing, ProductValidated) => Strategizing,
        (Strategizing, StrategyReady) => Authoring(PageType::ProductPage),
        (Authoring(active), PageAuthored(authored)) if active == authored => {
            authored.next().map(Authoring).unwrap_or(Complete)
        }
        (state, StageFailed) if !state.is_terminal() => Failed,
        (state, event) => return Err(RunTransitionError { state, event }),
    };

    Ok(next)
}

/// Tracks the current state and the ordered history of a single run.
#[derive(Clone, Debug, Default)]
pub struct RunTracker {
    state: RunState,
    transitions: Vec<StateTransition>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<StateTransition> {
        self.transitions
    }

    pub fn apply(&mut self, event: RunEvent) -> Result<RunState, RunTransitionError> {
        let next = transition(self.state, event)?;
        self.transitions.push(StateTransition { from: self.state, to: next, event, at: Utc::now() });
        self.state = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::{transition, RunEvent, RunState, RunTracker};
    use crate::schema::pages::PageType;

    #[test]
    fn happy_path_visits_every_stage_in_order() {
        let mut tracker = RunTracker::new();
        tracker.apply(RunEvent::Started).expect("start");
        tracker.apply(RunEvent::ProductValidated).expect("parsed");
        tracker.apply(RunEvent::StrategyReady).expect("strategy");
        for page_type in PageType::ALL {
            tracker.apply(RunEvent::PageAuthored(page_type)).expect("authored");
        }

        let visited: Vec<String> =
            tracker.transitions().iter().map(|step| step.to.to_string()).collect();
        assert_eq!(
            visited,
            vec![
                "parsing",
                "strategizing",
                "authoring(product_page)",
                "authoring(faq_page)",
                "authoring(comparison_page)",
                "complete",
            ]
        );
        assert_eq!(tracker.state(), RunState::Complete);
    }

    #[test]
    fn failure_is_reachable_from_any_active_state() {
        for state in [
            RunState::Idle,
            RunState::Parsing,
            RunState::Strategizing,
            RunState::Authoring(PageType::FaqPage),
        ] {
            assert_eq!(transition(state, RunEvent::StageFailed), Ok(RunState::Failed));
        }
    }

    #[test]
    fn terminal_states_reject_further_events() {
        assert!(transition(RunState::Complete, RunEvent::StageFailed).is_err());
        assert!(transition(RunState::Failed, RunEvent::Started).is_err());
    }

    #[test]
    fn authoring_out_of_order_is_rejected() {
        let error = transition(
            RunState::Authoring(PageType::ProductPage),
            RunEvent::PageAuthored(PageType::ComparisonPage),
        )
        .expect_err("out of order");

        assert_eq!(error.state, RunState::Authoring(PageType::ProductPage));
    }

    #[test]
    fn parsing_cannot_skip_to_authoring() {
        assert!(transition(RunState::Parsing, RunEvent::StrategyReady).is_err());
    }
}
