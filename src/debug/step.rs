use serde::{ Serialize, Serializer };
use std::fmt;

/// Stages of a chat request, in the order a successful run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Initializing,
    FetchingProduct,
    StreamStarted,
    GettingContext,
    FormattingHistory,
    CreatingPrompt,
    GeneratingResponse,
    Completed,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Initializing => "initializing",
            Step::FetchingProduct => "fetching_product",
            Step::StreamStarted => "stream_started",
            Step::GettingContext => "getting_context",
            Step::FormattingHistory => "formatting_history",
            Step::CreatingPrompt => "creating_prompt",
            Step::GeneratingResponse => "generating_response",
            Step::Completed => "completed",
        }
    }

    pub fn can_advance_to(&self, next: Step) -> bool {
        use Step::*;
        matches!(
            (*self, next),
            (Initializing, FetchingProduct) |
                (Initializing, StreamStarted) |
                (FetchingProduct, StreamStarted) |
                (StreamStarted, GettingContext) |
                (GettingContext, FormattingHistory) |
                (FormattingHistory, CreatingPrompt) |
                (CreatingPrompt, GeneratingResponse) |
                (GeneratingResponse, Completed)
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `execution_step` as it appears on the wire: the step name, or `<step>_error`
/// once the step has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStep {
    Active(Step),
    Failed(Step),
}

impl ExecutionStep {
    pub fn step(&self) -> Step {
        match self {
            ExecutionStep::Active(s) | ExecutionStep::Failed(s) => *s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStep::Failed(_) | ExecutionStep::Active(Step::Completed))
    }
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStep::Active(s) => write!(f, "{}", s),
            ExecutionStep::Failed(s) => write!(f, "{}_error", s),
        }
    }
}

impl Serialize for ExecutionStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
