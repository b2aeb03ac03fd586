// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line acquisition and stream-origin derivation.

use crate::errors::{ExpectedError, Result};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use std::io::{self, BufRead, BufReader};

/// A single line source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum InputSource {
    /// Standard input.
    Stdin,
    /// A reporter log file.
    File(Utf8PathBuf),
}

impl InputSource {
    fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(Utf8PathBuf::from(arg))
        }
    }
}

/// Resolves positional arguments into line sources. No arguments means
/// standard input; `-` names standard input explicitly.
pub(crate) fn resolve_sources(args: &[String]) -> Vec<InputSource> {
    if args.is_empty() {
        vec![InputSource::Stdin]
    } else {
        args.iter().map(|arg| InputSource::from_arg(arg)).collect()
    }
}

/// Derives the stream origin (the absolute time treated as time zero) from
/// the first source: a file's creation time, or the current wall clock for
/// standard input.
pub(crate) fn stream_origin(sources: &[InputSource]) -> Result<DateTime<Utc>> {
    match sources.first() {
        Some(InputSource::File(path)) => {
            let metadata =
                fs_err::metadata(path.as_std_path()).map_err(|err| ExpectedError::InputOpen {
                    path: path.clone(),
                    err,
                })?;
            // Not every filesystem reports a birth time; fall back to the
            // modification time there.
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map_err(|err| ExpectedError::InputRead { err })?;
            Ok(created.into())
        }
        Some(InputSource::Stdin) | None => Ok(Utc::now()),
    }
}

/// Reads every source in order into one concatenated line sequence.
pub(crate) fn read_lines(sources: &[InputSource]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for source in sources {
        match source {
            InputSource::Stdin => collect_lines(io::stdin().lock(), &mut lines)?,
            InputSource::File(path) => {
                let file = fs_err::File::open(path.as_std_path()).map_err(|err| {
                    ExpectedError::InputOpen {
                        path: path.clone(),
                        err,
                    }
                })?;
                collect_lines(BufReader::new(file), &mut lines)?;
            }
        }
    }
    Ok(lines)
}

fn collect_lines(reader: impl BufRead, lines: &mut Vec<String>) -> Result<()> {
    for line in reader.lines() {
        lines.push(line.map_err(|err| ExpectedError::InputRead { err })?);
    }
    Ok(())
}
