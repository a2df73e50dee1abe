use std::fmt;

use serde::{Deserialize, Serialize};

/// States of one orchestration.
///
/// Each run flows through: IDLE → UPLOADING → SUBMITTING → POLLING → FETCHING → DONE,
/// or jumps straight to DONE when a stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Idle,
    Uploading,
    Submitting,
    Polling,
    Fetching,
    Done,
}

impl State {
    /// The pipeline stage that runs while in this state.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            State::Uploading => Some(Stage::Upload),
            State::Submitting => Some(Stage::Submit),
            State::Polling => Some(Stage::Poll),
            State::Fetching => Some(Stage::Fetch),
            State::Idle | State::Done => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "IDLE"),
            State::Uploading => write!(f, "UPLOADING"),
            State::Submitting => write!(f, "SUBMITTING"),
            State::Polling => write!(f, "POLLING"),
            State::Fetching => write!(f, "FETCHING"),
            State::Done => write!(f, "DONE"),
        }
    }
}

/// The component a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Upload,
    Submit,
    Poll,
    Fetch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Upload => write!(f, "upload"),
            Stage::Submit => write!(f, "submit"),
            Stage::Poll => write!(f, "poll"),
            Stage::Fetch => write!(f, "fetch"),
        }
    }
}

/// Result of the work done in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure,
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Advance to the next state.
    Next(State),
    /// The run reached DONE. `failed_stage` is `None` on success.
    Complete { failed_stage: Option<Stage> },
}

/// Position of a single orchestration in the state machine.
#[derive(Debug, Clone)]
pub struct Run {
    pub state: State,
    pub state_history: Vec<State>,
    pub failed_stage: Option<Stage>,
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}

impl Run {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            state_history: Vec::new(),
            failed_stage: None,
        }
    }

    /// Every state visited so far, including the current one.
    pub fn transitions(&self) -> Vec<State> {
        let mut all = self.state_history.clone();
        all.push(self.state);
        all
    }
}

/// Drives a [`Run`] through the state machine.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the next transition for `run` given the outcome of
    /// its current state.
    ///
    /// Success advances one state. Failure of any stage goes directly to
    /// `Done`, skipping the remaining stages. `Done` is terminal and repeats
    /// its completion.
    pub fn next(run: &mut Run, outcome: StepOutcome) -> Transition {
        if run.state == State::Done {
            return Transition::Complete {
                failed_stage: run.failed_stage,
            };
        }

        let transition = match outcome {
            StepOutcome::Success => match run.state {
                State::Idle => Transition::Next(State::Uploading),
                State::Uploading => Transition::Next(State::Submitting),
                State::Submitting => Transition::Next(State::Polling),
                State::Polling => Transition::Next(State::Fetching),
                State::Fetching | State::Done => Transition::Complete { failed_stage: None },
            },
            StepOutcome::Failure => Transition::Complete {
                failed_stage: Some(run.state.stage().unwrap_or(Stage::Upload)),
            },
        };

        run.state_history.push(run.state);
        match &transition {
            Transition::Next(next_state) => run.state = *next_state,
            Transition::Complete { failed_stage } => {
                run.state = State::Done;
                run.failed_stage = *failed_stage;
            }
        }

        transition
    }
}
