// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The top-level conversion entry point.

use crate::{
    aggregate,
    errors::{ConvertError, DecodeError},
    events::{RunEvent, decode_lines},
    serialize::serialize_tree,
    tree::TestTree,
};
use chrono::{DateTime, Utc};
use std::io;

/// A finalized JUnit report, ready to serialize.
///
/// Built by draining a complete reporter stream: the full event sequence is
/// consumed into a tree, then counts and end times are propagated bottom-up,
/// then timing is resolved against the stream origin. There is no streaming
/// mode; aggregates are only known once every test has reported its final
/// outcome.
#[derive(Clone, Debug)]
pub struct JunitReport {
    tree: TestTree,
}

impl JunitReport {
    /// Converts raw reporter lines into a finalized report.
    ///
    /// `origin` is the absolute timestamp treated as time zero; every event
    /// time offset is resolved against it.
    pub fn from_lines<I>(lines: I, origin: DateTime<Utc>) -> Result<Self, ConvertError>
    where
        I: IntoIterator<Item = String>,
    {
        Self::from_events(decode_lines(lines), origin)
    }

    /// Converts an already-decoded event sequence into a finalized report.
    pub fn from_events<I>(events: I, origin: DateTime<Utc>) -> Result<Self, ConvertError>
    where
        I: IntoIterator<Item = Result<RunEvent, DecodeError>>,
    {
        let mut tree = TestTree::build(events)?;
        aggregate::propagate_counts(&mut tree)?;
        aggregate::finalize_timings(&mut tree, origin);
        Ok(Self { tree })
    }

    /// The finalized tree backing this report.
    pub fn tree(&self) -> &TestTree {
        &self.tree
    }

    /// Serializes this report to the given writer.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), ConvertError> {
        serialize_tree(&self.tree, writer)
    }

    /// Serializes this report to a string.
    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self) -> Result<String, ConvertError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
