// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoding of the Dart test runner's JSON reporter stream.
//!
//! The reporter emits one JSON object per line, interleaved with arbitrary
//! console noise (download progress bars, upgrade banners and the like).
//! Lines that do not parse as a JSON object are dropped here; objects that
//! parse but do not match the shape declared by their `type` tag indicate a
//! broken producer and surface as [`DecodeError`]s.
//!
//! Protocol reference: <https://github.com/dart-lang/test/blob/master/pkgs/test/doc/json_reporter.md>

use crate::errors::DecodeError;
use serde::Deserialize;
use serde_json::Value;

/// Payload fields that are not consumed while building the report tree.
///
/// Whatever is left in these maps after processing is exactly what ends up in
/// a node's `properties` block, so no reporter-supplied information is lost.
pub type FieldMap = serde_json::Map<String, Value>;

/// A single event from the reporter stream.
#[derive(Clone, Debug, Deserialize)]
pub struct RunEvent {
    /// Milliseconds since the stream origin.
    pub time: u64,

    /// The kind of event this is.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The kind of reporter event, discriminated by the `type` field.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    /// The first event of a run; declares the reporter protocol version.
    Start {
        /// The protocol version, as `"major.minor"`. Only the 0.x family is
        /// supported.
        #[serde(rename = "protocolVersion")]
        protocol_version: String,

        /// Remaining fields (e.g. `pid`), kept for the root properties block.
        #[serde(flatten)]
        rest: FieldMap,
    },

    /// A test suite (one per test source file) was loaded.
    Suite {
        /// The suite description.
        suite: SuitePayload,
    },

    /// A group was opened within a suite.
    Group {
        /// The group description.
        group: GroupPayload,
    },

    /// A test case began running.
    TestStart {
        /// The test description.
        test: TestPayload,
    },

    /// A test printed a message.
    Print {
        /// The id of the test that printed.
        #[serde(rename = "testID")]
        test_id: u64,

        /// The message payload, kept verbatim for the `messages` property.
        #[serde(flatten)]
        rest: FieldMap,
    },

    /// A test produced an error or assertion failure.
    Error {
        /// The id of the test that errored.
        #[serde(rename = "testID")]
        test_id: u64,

        /// The error message.
        #[serde(rename = "error")]
        message: String,

        /// The stack trace, rendered verbatim in the report.
        #[serde(rename = "stackTrace")]
        stack_trace: String,

        /// True for assertion failures, false for unexpected errors.
        #[serde(rename = "isFailure")]
        is_failure: bool,
    },

    /// A test finished running.
    TestDone {
        /// The id of the test that finished.
        #[serde(rename = "testID")]
        test_id: u64,

        /// The declared outcome.
        result: TestResult,

        /// True if the test was skipped.
        skipped: bool,

        /// True for hidden tests (e.g. loading virtual tests).
        hidden: bool,
    },

    /// The run finished.
    Done {
        /// Whether the run succeeded overall. Null when the run was canceled.
        #[serde(default)]
        success: Option<bool>,
    },

    /// Any event kind this tool does not consume (`allSuites`, `debug`, new
    /// protocol additions). Valid, and ignored.
    #[serde(other)]
    Unknown,
}

/// The outcome declared by a `testDone` event.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    /// All expectations passed.
    Success,
    /// An expectation failed.
    Failure,
    /// An unexpected error occurred.
    Error,
}

/// The `suite` object of a suite event.
#[derive(Clone, Debug, Deserialize)]
pub struct SuitePayload {
    /// The suite id, unique within the run.
    pub id: u64,

    /// The path of the test source file; becomes the suite name.
    pub path: String,

    /// Remaining fields (e.g. `platform`), kept for the properties block.
    #[serde(flatten)]
    pub rest: FieldMap,
}

/// The `group` object of a group event.
#[derive(Clone, Debug, Deserialize)]
pub struct GroupPayload {
    /// The group id, unique within the run.
    pub id: u64,

    /// The id of the suite this group belongs to.
    #[serde(rename = "suiteID")]
    pub suite_id: u64,

    /// The id of the enclosing group. Absent or null for root-level groups;
    /// `0` is a real id, not an absence marker.
    #[serde(rename = "parentID", default)]
    pub parent_id: Option<u64>,

    /// The group name.
    pub name: String,

    /// Reporter-declared test count. Unreliable; dropped.
    #[serde(rename = "testCount", default)]
    pub test_count: Option<Value>,

    /// Deprecated metadata object. Dropped.
    #[serde(default)]
    pub metadata: Option<Value>,

    /// Remaining fields (line, column, url), kept for the properties block.
    #[serde(flatten)]
    pub rest: FieldMap,
}

/// The `test` object of a testStart event.
#[derive(Clone, Debug, Deserialize)]
pub struct TestPayload {
    /// The test id, unique within the run.
    pub id: u64,

    /// The test name.
    pub name: String,

    /// The id of the suite this test belongs to.
    #[serde(rename = "suiteID")]
    pub suite_id: u64,

    /// The ids of the enclosing groups, outermost first. The test attaches
    /// under the last one, or directly under the suite when empty.
    #[serde(rename = "groupIDs", default)]
    pub group_ids: Vec<u64>,

    /// Deprecated metadata object. Dropped.
    #[serde(default)]
    pub metadata: Option<Value>,

    /// Remaining fields (line, column, url), kept for the properties block.
    #[serde(flatten)]
    pub rest: FieldMap,
}

/// Decodes raw reporter lines into a lazy sequence of events.
///
/// Lines that do not parse as JSON, or parse to something other than an
/// object, are silently dropped: real logs interleave reporter output with
/// progress indicators and banners. A JSON object that does not match its
/// declared event shape yields a [`DecodeError`] (a broken producer is fatal,
/// noise is not). No ordering is imposed beyond source order.
pub fn decode_lines<I>(lines: I) -> impl Iterator<Item = Result<RunEvent, DecodeError>>
where
    I: IntoIterator<Item = String>,
{
    lines.into_iter().filter_map(|line| {
        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => return None,
        };
        if !value.is_object() {
            return None;
        }
        Some(serde_json::from_value(value).map_err(DecodeError::new))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn decode_all(input: &str) -> Vec<Result<RunEvent, DecodeError>> {
        decode_lines(input.lines().map(String::from)).collect()
    }

    #[test]
    fn test_noise_lines_are_dropped() {
        let input = indoc! {r#"
              % Total    % Received % Xferd  Average Speed
            100  219M  100  219M    0     0  53.9M      0  0:00:04
            Downloading Material fonts...                  1,174ms
            [1, 2, 3]
            42
            "just a string"
            {"type":"start","protocolVersion":"0.1.2","pid":12345,"time":0}
            {"type":"suite","suite":{"id":0,"platform":"vm","path":"a_test.dart"},"time":1}
            {"type":"fakeEvent","time":2}
        "#};

        let events: Vec<_> = decode_all(input)
            .into_iter()
            .collect::<Result<_, _>>()
            .expect("all object lines decode");
        assert_eq!(events.len(), 3, "only the three JSON objects survive");
        assert!(matches!(events[0].kind, EventKind::Start { .. }));
        assert!(matches!(events[1].kind, EventKind::Suite { .. }));
        assert!(matches!(events[2].kind, EventKind::Unknown));
        assert_eq!(events[2].time, 2);
    }

    #[test]
    fn test_leftover_fields_are_captured() {
        let input = r#"{"type":"suite","suite":{"id":3,"platform":"chrome","path":"b_test.dart"},"time":7}"#;
        let events = decode_all(input);
        let event = events[0].as_ref().expect("decodes");
        let EventKind::Suite { suite } = &event.kind else {
            panic!("expected a suite event, got {event:?}");
        };
        assert_eq!(suite.id, 3);
        assert_eq!(suite.path, "b_test.dart");
        assert_eq!(suite.rest["platform"], Value::from("chrome"));
    }

    #[test]
    fn test_group_parent_zero_is_not_absent() {
        let with_zero = r#"{"type":"group","group":{"id":5,"suiteID":1,"parentID":0,"name":"g"},"time":4}"#;
        let with_null = r#"{"type":"group","group":{"id":5,"suiteID":1,"parentID":null,"name":"g"},"time":4}"#;
        let without = r#"{"type":"group","group":{"id":5,"suiteID":1,"name":"g"},"time":4}"#;

        let parent_of = |line: &str| {
            let events = decode_all(line);
            let event = events[0].as_ref().expect("decodes").clone();
            let EventKind::Group { group } = event.kind else {
                panic!("expected a group event");
            };
            group.parent_id
        };

        assert_eq!(parent_of(with_zero), Some(0));
        assert_eq!(parent_of(with_null), None);
        assert_eq!(parent_of(without), None);
    }

    #[test]
    fn test_malformed_event_object_is_an_error() {
        // An error event with no stack trace comes from a broken producer.
        let input = r#"{"type":"error","testID":1,"time":9}"#;
        let events = decode_all(input);
        assert!(events[0].is_err());
    }

    #[test]
    fn test_done_success_may_be_null() {
        let input = r#"{"type":"done","success":null,"time":100}"#;
        let events = decode_all(input);
        let event = events[0].as_ref().expect("decodes");
        assert!(matches!(event.kind, EventKind::Done { success: None }));
    }
}
