//! Error taxonomy (spec §7).
//!
//! Every fallible operation in the crate returns [`DisasmError`]. Decode-time
//! failures that the trace engine can recover from (a miss, an overlap, an
//! invalid branch target) are not necessarily fatal to the caller — the
//! engine logs them via `tracing` and notifies listeners rather than
//! propagating them past a single work item; see [`crate::engine`].

use crate::Address;

/// The error type returned by fallible operations across the crate.
#[derive(Debug, thiserror::Error)]
pub enum DisasmError {
    /// A read advanced past the bytes made available by the [`Image`](crate::image::Image).
    #[error("end of image reached while reading")]
    EndOfImage,

    /// No opcode in the decode tree matched the byte stream at `address`.
    #[error("no opcode matched at {address:#x}")]
    DecodeMiss { address: Address },

    /// A new decoding would cover an address already claimed by a different entity.
    #[error("decoding at {address:#x} overlaps an existing entity")]
    Overlap { address: Address },

    /// A branch or data reference points outside the image.
    #[error("address {address:#x} is not a valid image address")]
    InvalidAddress { address: Address },

    /// A malformed operand tripped the decoder mid-instruction.
    #[error("decode exception at {address:#x}: {reason}")]
    DecodeException { address: Address, reason: String },

    /// Data analysis failed for the bytes at `address`.
    #[error("data analysis failed at {address:#x}: {reason}")]
    DataAnalyzeFailure { address: Address, reason: String },

    /// `start` was called while the worker was already running.
    #[error("the trace engine is already running")]
    AlreadyRunning,

    /// `stop` or `reanalyze` was called while no worker was running.
    #[error("the trace engine is not running")]
    NotRunning,
}

/// A convenience alias for a `Result` whose error is always [`DisasmError`].
pub type Result<T> = std::result::Result<T, DisasmError>;
