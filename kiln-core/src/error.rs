use crate::buffer::BufferId;
use crate::op::LoadOp;
use core::fmt::{Display, Formatter};

/// Enumeration representing the various errors that can occur within kiln.
#[derive(Debug, thiserror::Error)]
pub enum KilnError {
    /// Schedule contains a stateful step and can not be split
    #[error(transparent)]
    Purity(#[from] PurityError),
    /// Execution engine failed while running one of the phases
    #[error("{phase} execution failed, {source}")]
    Exec {
        /// Phase in which the engine failed
        phase: Phase,
        /// Error returned by the engine
        #[source]
        source: ExecError,
    },
    /// Invalid shapes for operation
    #[error("{0}")]
    ShapeError(Box<str>),
    /// Buffer or name that does not exist in the graph
    #[error("unknown buffer {0}")]
    UnknownBuffer(Box<str>),
    /// Error parsing model file or config
    #[error("parse error {0}")]
    ParseError(Box<str>),
    /// Error from file operations
    #[error("IO {0}")]
    IOError(#[from] std::io::Error),
}

impl KilnError {
    /// Shape error, records the location where it was raised
    #[track_caller]
    #[must_use]
    pub fn shape_error(e: Box<str>) -> Self {
        let location = std::panic::Location::caller();
        Self::ShapeError(format!("{e}, {}:{}:{}", location.file(), location.line(), location.column()).into())
    }

    /// Parse error
    #[must_use]
    pub fn parse_error(e: Box<str>) -> Self {
        Self::ParseError(e)
    }

    /// Wraps engine error with the phase it happened in
    #[must_use]
    pub const fn exec(phase: Phase, source: ExecError) -> Self {
        Self::Exec { phase, source }
    }
}

impl From<serde_json::Error> for KilnError {
    fn from(value: serde_json::Error) -> Self {
        Self::ParseError(value.to_string().into())
    }
}

/// Schedule contains a step with a [LoadOp], so it can't be compiled ahead of time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("has load ops, can't compile ahead of time: step {position} is {op:?} writing {output}")]
pub struct PurityError {
    /// Position of the offending step in the schedule
    pub position: usize,
    /// Output buffer of the offending step
    pub output: BufferId,
    /// The stateful op
    pub op: LoadOp,
}

/// Execution phase in which an engine error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Execution of the input independent group
    Static,
    /// Execution of the input dependent group
    Dynamic,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Phase::Static => "static",
            Phase::Dynamic => "dynamic",
        })
    }
}

/// Error returned by execution engines
#[derive(Debug, thiserror::Error)]
#[error("{status:?}: {context}")]
pub struct ExecError {
    /// What went wrong
    pub status: ErrorStatus,
    /// Step whose execution failed, if the failure is tied to a step
    pub step: Option<BufferId>,
    /// Human readable details
    pub context: Box<str>,
}

impl ExecError {
    /// New error tied to the step writing `step`
    #[must_use]
    pub fn at(status: ErrorStatus, step: BufferId, context: impl Into<Box<str>>) -> Self {
        Self { status, step: Some(step), context: context.into() }
    }
}

/// Kind of engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    /// Step reads a buffer the engine does not hold
    MissingBuffer,
    /// Buffer data does not match the shape of the step
    ShapeMismatch,
    /// Engine can not execute this op
    Unsupported,
    /// Failed to launch or finish the kernel
    KernelLaunch,
}
