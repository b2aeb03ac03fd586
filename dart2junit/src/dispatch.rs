// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::Result,
    input,
    output::OutputOpts,
};
use clap::Parser;
use dart2junit_report::JunitReport;
use std::io;

/// Convert `dart test --reporter json` output into a JUnit XML report.
///
/// Reads newline-delimited reporter events from standard input or a log
/// file and writes a single XML document to standard output. When reading
/// from a file, the file's creation time is used as the stream origin;
/// otherwise the current wall-clock time is.
#[derive(Debug, Parser)]
#[command(version, styles = crate::output::clap_styles::style())]
pub struct Dart2JunitApp {
    /// Reporter log file; `-` or no argument reads standard input
    #[arg(value_name = "FILE")]
    inputs: Vec<String>,

    #[command(flatten)]
    output: OutputOpts,
}

impl Dart2JunitApp {
    /// Installs the stderr logger. Must run before [`exec`](Self::exec).
    pub fn init_output(&self) {
        self.output.init();
    }

    /// Executes the conversion.
    pub fn exec(self) -> Result<()> {
        if self.inputs.len() > 1 {
            // Extra arguments are almost certainly a mistake, but every
            // named input is still consumed, in order.
            tracing::warn!(
                "usage: dart2junit [-|FILE]; got {} arguments, reading them all in sequence",
                self.inputs.len(),
            );
        }
        let sources = input::resolve_sources(&self.inputs);
        let origin = input::stream_origin(&sources)?;
        let lines = input::read_lines(&sources)?;
        tracing::debug!("read {} lines", lines.len());

        let report = JunitReport::from_lines(lines, origin)?;

        let stdout = io::stdout().lock();
        report.serialize(stdout)?;
        Ok(())
    }
}
