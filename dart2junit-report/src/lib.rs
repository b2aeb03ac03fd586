// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Convert the Dart test runner's machine-readable JSON reporter output into
//! a JUnit XML report.
//!
//! The conversion is a batch pipeline: decode the event stream, build the
//! suite/group/test tree, propagate counts and end times to every ancestor,
//! resolve timing against the stream origin, and render the result. See
//! [`JunitReport`] for the entry point.
//!
//! Only the 0.x reporter protocol family is supported. A corrupt stream is
//! fatal; interleaved non-JSON console noise is not.

mod aggregate;
mod errors;
mod events;
mod report;
mod serialize;
mod tree;

pub use aggregate::{finalize_timings, propagate_counts};
pub use errors::{ConvertError, DecodeError};
pub use events::{
    EventKind, FieldMap, GroupPayload, RunEvent, SuitePayload, TestPayload, TestResult,
    decode_lines,
};
pub use report::JunitReport;
pub use tree::{
    Counts, ErrorRecord, Node, NodeId, NodeKind, TestState, TestStatus, TestTree, Timing,
};
