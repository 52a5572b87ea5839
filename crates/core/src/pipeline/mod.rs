pub mod sequencer;
pub mod states;

pub use sequencer::{
    CancelHandle, FaqPolicy, FaqPolicyMode, PipelineSequencer, PipelineStages, RunReport,
    SequencerOptions,
};
pub use states::{transition, RunEvent, RunState, RunTracker, RunTransitionError, StateTransition};
