// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Convert `dart test --reporter json` output into a JUnit XML report.
//!
//! This crate is the command-line surface; the conversion itself lives in
//! [`dart2junit_report`].

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod input;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
