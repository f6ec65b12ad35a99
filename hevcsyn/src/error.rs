use std::fmt;

use thiserror::Error;

use crate::tree::Component;

pub type Result<T> = std::result::Result<T, EncodeError>;

/// Syntax paths the encoder refuses to emit rather than guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    InterPrediction,
    InterSlice,
    PartitionMode,
    TransformSkip,
    CuQpDelta,
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            Unsupported::InterPrediction => "inter prediction signalling",
            Unsupported::InterSlice => "P/B slice coding-unit syntax",
            Unsupported::PartitionMode => "partition mode other than 2Nx2N/NxN",
            Unsupported::TransformSkip => "transform_skip_flag signalling",
            Unsupported::CuQpDelta => "cu_qp_delta signalling",
        };
        f.write_str(what)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("unimplemented syntax path: {0}")]
    Unimplemented(Unsupported),

    #[error(
        "cbf set for {component:?} {size}x{size} block but all coefficients are zero",
        size = 1u32 << .log2_size
    )]
    MissingLastCoefficient { component: Component, log2_size: u8 },

    #[error(
        "{element} at ({x},{y}) log2 size {log2_size} forced to {forced}, tree says {actual}"
    )]
    ForcedSplitMismatch {
        element: &'static str,
        x: u32,
        y: u32,
        log2_size: u8,
        forced: bool,
        actual: bool,
    },

    #[error("malformed decision tree: {0}")]
    MalformedTree(&'static str),

    #[error("{element} value {value} outside its legal range")]
    OutOfRange { element: &'static str, value: i64 },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

impl EncodeError {
    pub(crate) fn out_of_range(element: &'static str, value: impl Into<i64>) -> Self {
        EncodeError::OutOfRange {
            element,
            value: value.into(),
        }
    }
}
