mod artifact;
mod choice;
mod countdown;
mod guidelines;
mod plan;
mod verbal;
mod writing;

pub use {
    artifact::{
        AnswerOption, ChoiceAnswer, ParseAnswerError, PhaseSubmission, VerbalRecording, WritingResponse,
    },
    choice::ChoiceStep,
    countdown::Countdown,
    guidelines::GuidelinesStep,
    plan::PhasePlan,
    verbal::{VerbalStage, VerbalStep},
    writing::{WritingStep, WritingTask},
};
