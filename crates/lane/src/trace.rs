//! Error-trace levels (§4.4 "Error trace levels").

/// How much stack-frame detail to capture when a lane body errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorTraceLevel {
    /// No error handler; only the raw error value is preserved.
    #[default]
    Minimal,
    /// Capture each frame as a flat `"source:line"` string.
    Basic,
    /// Capture each frame as a structured record.
    Extended,
}

/// One stack frame, captured at the `Extended` trace level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub source: String,
    pub current_line: i64,
    pub name: Option<String>,
    pub name_what: Option<String>,
    pub what: Option<String>,
}

/// The trace attached to an errored lane outcome, shaped by the lane's
/// configured [`ErrorTraceLevel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorTrace {
    None,
    Basic(Vec<String>),
    Extended(Vec<StackFrame>),
}

impl ErrorTrace {
    pub fn for_level(level: ErrorTraceLevel) -> Self {
        match level {
            ErrorTraceLevel::Minimal => Self::None,
            ErrorTraceLevel::Basic => Self::Basic(Vec::new()),
            ErrorTraceLevel::Extended => Self::Extended(Vec::new()),
        }
    }

    pub fn push_frame(&mut self, source: &str, line: i64) {
        match self {
            Self::Basic(frames) => frames.push(format!("{source}:{line}")),
            Self::Extended(frames) => frames.push(StackFrame {
                source: source.to_string(),
                current_line: line,
                name: None,
                name_what: None,
                what: None,
            }),
            Self::None => {}
        }
    }
}
