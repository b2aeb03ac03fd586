// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use dart2junit_report::ConvertError;
use owo_colors::{OwoColorize, Stream};
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Exit codes produced by dart2junit.
pub mod exit_codes {
    /// The reporter stream could not be converted into a report.
    pub const CONVERT_FAILED: i32 = 1;
    /// An input source could not be read.
    pub const READ_FAILED: i32 = 2;
}

// The #[error()] strings are placeholders -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes them.

/// An error that aborts the conversion. Reported to stderr with a
/// diagnostic; no partial report is emitted.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("failed to open input file")]
    InputOpen {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("failed to read input")]
    InputRead {
        #[source]
        err: std::io::Error,
    },

    #[error(transparent)]
    Convert {
        #[from]
        err: ConvertError,
    },
}

impl ExpectedError {
    /// The process exit code to return for this error.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::InputOpen { .. } | Self::InputRead { .. } => exit_codes::READ_FAILED,
            Self::Convert { .. } => exit_codes::CONVERT_FAILED,
        }
    }

    /// Displays this error to stderr, along with its cause chain.
    pub fn display_to_stderr(&self) {
        let mut next_error = match &self {
            Self::InputOpen { path, err } => {
                tracing::error!(
                    "failed to open `{}`",
                    path.if_supports_color(Stream::Stderr, |x| x.bold())
                );
                Some(err as &dyn Error)
            }
            Self::InputRead { err } => {
                tracing::error!("failed to read input");
                Some(err as &dyn Error)
            }
            Self::Convert { err } => {
                tracing::error!("{err}");
                err.source()
            }
        };

        while let Some(err) = next_error {
            tracing::error!("  caused by: {err}");
            next_error = err.source();
        }
    }
}
