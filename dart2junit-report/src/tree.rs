// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The report tree and the builder that populates it from the event stream.
//!
//! The tree is an arena: nodes are stored in an id-keyed map, with a separate
//! map from id to ordered child ids. Nodes never hold references to each
//! other, and every lookup by id fails loudly rather than assuming the
//! protocol's ordering guarantees hold.

use crate::{
    errors::{ConvertError, DecodeError},
    events::{EventKind, FieldMap, GroupPayload, RunEvent, SuitePayload, TestPayload, TestResult},
};
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::{collections::HashMap, fmt};

pub(crate) static ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Identifies a node in the report tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// The synthetic top-level aggregate. Never appears in the event stream.
    Root,

    /// A suite, group, or test id assigned by the reporter. Ids are unique
    /// within a run, across all three kinds.
    Event(u64),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Root => write!(f, "<root>"),
            NodeId::Event(id) => write!(f, "{id}"),
        }
    }
}

/// The final status of a test case.
///
/// The derived order is the severity order: a status may only ever be
/// upgraded to a value at least as severe as its current one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TestStatus {
    /// No testDone event has been seen yet.
    Unknown,
    /// The test passed.
    Success,
    /// An expectation failed.
    Failure,
    /// An unexpected error occurred.
    Error,
}

impl From<TestResult> for TestStatus {
    fn from(result: TestResult) -> Self {
        match result {
            TestResult::Success => TestStatus::Success,
            TestResult::Failure => TestStatus::Failure,
            TestResult::Error => TestStatus::Error,
        }
    }
}

/// Aggregate counters carried by every container node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    /// Number of test cases anywhere below this node.
    pub tests: usize,
    /// Number of those whose final status is [`TestStatus::Error`].
    pub errors: usize,
    /// Number of those whose final status is [`TestStatus::Failure`].
    pub failures: usize,
}

/// An error recorded against a test case, rendered as a `failure` or `error`
/// child element.
#[derive(Clone, Debug)]
pub struct ErrorRecord {
    /// The error message.
    pub message: String,
    /// The stack trace, rendered as a verbatim text block.
    pub stack_trace: String,
    /// True for assertion failures (`failure` elements), false for
    /// unexpected errors (`error` elements).
    pub is_failure: bool,
}

/// State accumulated for a single test case.
#[derive(Clone, Debug)]
pub struct TestState {
    /// The declared test name.
    pub name: String,
    /// The reconciled status. Set by testDone; upgradable by later errors.
    pub status: TestStatus,
    /// Errors in arrival order.
    pub errors: Vec<ErrorRecord>,
    /// Print payloads in arrival order, serialized together into the
    /// `messages` property.
    pub messages: Vec<FieldMap>,
    /// True if the test was skipped. Recorded by the done event.
    pub skipped: Option<bool>,
    /// True for hidden tests. Recorded by the done event.
    pub hidden: Option<bool>,
}

/// What a node is, and the per-kind state it carries.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// The synthetic top-level aggregate.
    Root(Counts),
    /// One test source file.
    Suite {
        /// The declared source path.
        name: String,
        /// Aggregated counters.
        counts: Counts,
    },
    /// A nested logical grouping of tests.
    Group {
        /// The declared group name.
        name: String,
        /// Aggregated counters.
        counts: Counts,
    },
    /// A leaf test case.
    Test(TestState),
}

/// Timing attributes computed by the finalization pass.
#[derive(Copy, Clone, Debug)]
pub struct Timing {
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) duration_ms: i64,
}

impl Timing {
    /// The absolute start time, ISO-8601 at second precision, UTC.
    pub fn timestamp(&self) -> String {
        self.timestamp.format(ISO8601_FORMAT).to_string()
    }

    /// The duration in seconds, with three decimal places.
    pub fn time(&self) -> String {
        format!("{:.3}", self.duration_ms as f64 / 1000.0)
    }
}

/// A node of the report tree.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) kind: NodeKind,
    /// Start offset in ms since the stream origin, from the creating event.
    pub(crate) start_ms: u64,
    /// Latest end offset contributed by any event or descendant, in ms.
    pub(crate) end_ms: u64,
    /// Event fields not consumed by the builder; drained into `properties`
    /// during finalization.
    pub(crate) unprocessed: FieldMap,
    /// Rendered property pairs, in insertion order.
    pub(crate) properties: IndexMap<String, String>,
    pub(crate) timing: Option<Timing>,
}

impl Node {
    fn new(kind: NodeKind, start_ms: u64, unprocessed: FieldMap) -> Self {
        Self {
            kind,
            start_ms,
            end_ms: 0,
            unprocessed,
            properties: IndexMap::new(),
            timing: None,
        }
    }

    /// Returns the node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the declared name: the path for suites, the name for groups
    /// and tests, and `None` for the root.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Root(_) => None,
            NodeKind::Suite { name, .. } | NodeKind::Group { name, .. } => Some(name),
            NodeKind::Test(state) => Some(&state.name),
        }
    }

    /// Returns the aggregated counters, or `None` for test cases.
    pub fn counts(&self) -> Option<&Counts> {
        match &self.kind {
            NodeKind::Root(counts)
            | NodeKind::Suite { counts, .. }
            | NodeKind::Group { counts, .. } => Some(counts),
            NodeKind::Test(_) => None,
        }
    }

    pub(crate) fn counts_mut(&mut self) -> Option<&mut Counts> {
        match &mut self.kind {
            NodeKind::Root(counts)
            | NodeKind::Suite { counts, .. }
            | NodeKind::Group { counts, .. } => Some(counts),
            NodeKind::Test(_) => None,
        }
    }

    /// Returns true for nodes that may hold children.
    pub fn is_container(&self) -> bool {
        !matches!(self.kind, NodeKind::Test(_))
    }

    /// Start offset in ms since the stream origin.
    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    /// Latest end offset in ms since the stream origin. After aggregation
    /// this is at least the end offset of every descendant.
    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    /// The rendered properties, in insertion order.
    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    /// Timing attributes; present once finalization has run.
    pub fn timing(&self) -> Option<&Timing> {
        self.timing.as_ref()
    }

    pub(crate) fn update_end_time(&mut self, end_ms: u64) {
        self.end_ms = self.end_ms.max(end_ms);
    }

    /// Computes timing attributes against the stream origin and drains the
    /// remaining unconsumed event fields into the properties bag.
    pub(crate) fn finalize(&mut self, origin: DateTime<Utc>) {
        let timestamp = origin + TimeDelta::milliseconds(self.start_ms as i64);
        let duration_ms = self.end_ms as i64 - self.start_ms as i64;
        self.timing = Some(Timing {
            timestamp,
            duration_ms,
        });

        let Node {
            kind,
            unprocessed,
            properties,
            ..
        } = self;
        if let NodeKind::Test(state) = kind {
            if let Some(hidden) = state.hidden {
                properties.insert("hidden".to_owned(), hidden.to_string());
            }
            if let Some(skipped) = state.skipped {
                properties.insert("skipped".to_owned(), skipped.to_string());
            }
        }
        for (key, value) in std::mem::take(unprocessed) {
            if value.is_null() {
                continue;
            }
            properties.insert(key, display_value(&value));
        }
    }
}

/// Textual form of a leftover field value for the properties block.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The report tree: an id-keyed arena of nodes plus an id-keyed map of
/// ordered children.
///
/// Children are kept in first-seen insertion order and never reordered.
/// Only the root, suites, and groups have children; test cases are leaves.
#[derive(Clone, Debug, Default)]
pub struct TestTree {
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) children: HashMap<NodeId, Vec<NodeId>>,
}

impl TestTree {
    /// Builds the tree from a decoded event sequence in a single forward
    /// pass, one event at a time, with no lookahead.
    pub fn build<I>(events: I) -> Result<Self, ConvertError>
    where
        I: IntoIterator<Item = Result<RunEvent, DecodeError>>,
    {
        let mut tree = TestTree::default();
        for event in events {
            tree.apply(event?)?;
        }
        if !tree.nodes.contains_key(&NodeId::Root) {
            return Err(ConvertError::MissingStartEvent);
        }
        Ok(tree)
    }

    fn apply(&mut self, event: RunEvent) -> Result<(), ConvertError> {
        let RunEvent { time, kind } = event;
        match kind {
            EventKind::Start {
                protocol_version,
                rest,
            } => self.start_run(time, &protocol_version, rest),
            EventKind::Suite { suite } => self.add_suite(time, suite),
            EventKind::Group { group } => self.add_group(time, group),
            EventKind::TestStart { test } => self.add_test(time, test),
            EventKind::Print { test_id, rest } => self.record_message(test_id, time, rest),
            EventKind::Error {
                test_id,
                message,
                stack_trace,
                is_failure,
            } => self.record_error(test_id, time, message, stack_trace, is_failure),
            EventKind::TestDone {
                test_id,
                result,
                skipped,
                hidden,
            } => self.record_done(test_id, time, result, skipped, hidden),
            // The done event carries nothing the aggregation passes don't
            // already derive, and unknown kinds are valid noise.
            EventKind::Done { .. } | EventKind::Unknown => Ok(()),
        }
    }

    fn start_run(
        &mut self,
        time: u64,
        protocol_version: &str,
        rest: FieldMap,
    ) -> Result<(), ConvertError> {
        if !protocol_version.starts_with("0.") {
            return Err(ConvertError::UnsupportedProtocol {
                version: protocol_version.to_owned(),
            });
        }
        self.nodes.insert(
            NodeId::Root,
            Node::new(NodeKind::Root(Counts::default()), time, rest),
        );
        Ok(())
    }

    fn add_suite(&mut self, time: u64, payload: SuitePayload) -> Result<(), ConvertError> {
        let SuitePayload { id, path, rest } = payload;
        let node = Node::new(
            NodeKind::Suite {
                name: path,
                counts: Counts::default(),
            },
            time,
            rest,
        );
        self.attach(NodeId::Root, id, node)
    }

    fn add_group(&mut self, time: u64, payload: GroupPayload) -> Result<(), ConvertError> {
        let GroupPayload {
            id,
            suite_id,
            parent_id,
            name,
            // Reporter-supplied test counts are unreliable and metadata is
            // deprecated; both are dropped rather than re-emitted.
            test_count: _,
            metadata: _,
            rest,
        } = payload;
        // An explicit parentID of 0 is a real group id; only null/absent
        // means "attach directly under the suite".
        let parent = match parent_id {
            Some(parent) => NodeId::Event(parent),
            None => NodeId::Event(suite_id),
        };
        let node = Node::new(
            NodeKind::Group {
                name,
                counts: Counts::default(),
            },
            time,
            rest,
        );
        self.attach(parent, id, node)
    }

    fn add_test(&mut self, time: u64, payload: TestPayload) -> Result<(), ConvertError> {
        let TestPayload {
            id,
            name,
            suite_id,
            group_ids,
            metadata: _,
            rest,
        } = payload;
        let parent = match group_ids.last() {
            Some(&group) => NodeId::Event(group),
            None => NodeId::Event(suite_id),
        };
        let node = Node::new(
            NodeKind::Test(TestState {
                name,
                status: TestStatus::Unknown,
                errors: Vec::new(),
                messages: Vec::new(),
                skipped: None,
                hidden: None,
            }),
            time,
            rest,
        );
        self.attach(parent, id, node)
    }

    fn attach(&mut self, parent: NodeId, id: u64, node: Node) -> Result<(), ConvertError> {
        match self.nodes.get(&parent) {
            None if parent == NodeId::Root => return Err(ConvertError::MissingStartEvent),
            None => {
                return Err(ConvertError::UnknownParent { parent, child: id });
            }
            Some(parent_node) if !parent_node.is_container() => {
                return Err(ConvertError::InvalidParent { parent });
            }
            Some(_) => {}
        }
        self.children.entry(parent).or_default().push(NodeId::Event(id));
        self.nodes.insert(NodeId::Event(id), node);
        Ok(())
    }

    fn record_message(
        &mut self,
        test_id: u64,
        time: u64,
        rest: FieldMap,
    ) -> Result<(), ConvertError> {
        let (state, _) = self.test_state_mut(test_id)?;
        let mut record = rest;
        record.insert("time".to_owned(), Value::from(time));
        state.messages.push(record);
        Ok(())
    }

    fn record_error(
        &mut self,
        test_id: u64,
        time: u64,
        message: String,
        stack_trace: String,
        is_failure: bool,
    ) -> Result<(), ConvertError> {
        let (state, end_ms) = self.test_state_mut(test_id)?;
        state.errors.push(ErrorRecord {
            message,
            stack_trace,
            is_failure,
        });
        // If the test already finished, a late error upgrades the status to
        // the maximum severity of the two. Before the done event, the error
        // is only recorded: the done event's own result is authoritative.
        if state.status != TestStatus::Unknown {
            let severity = if is_failure {
                TestStatus::Failure
            } else {
                TestStatus::Error
            };
            state.status = state.status.max(severity);
            *end_ms = (*end_ms).max(time);
        }
        Ok(())
    }

    fn record_done(
        &mut self,
        test_id: u64,
        time: u64,
        result: TestResult,
        skipped: bool,
        hidden: bool,
    ) -> Result<(), ConvertError> {
        let (state, end_ms) = self.test_state_mut(test_id)?;
        // Unconditional overwrite: the done event's result wins over any
        // status implied by errors that arrived first.
        state.status = TestStatus::from(result);
        state.hidden = Some(hidden);
        state.skipped = Some(skipped);
        *end_ms = (*end_ms).max(time);
        Ok(())
    }

    /// Looks up the test case created by a preceding testStart event,
    /// splitting the borrow across the fields in-test events touch.
    fn test_state_mut(&mut self, id: u64) -> Result<(&mut TestState, &mut u64), ConvertError> {
        let node = self
            .nodes
            .get_mut(&NodeId::Event(id))
            .ok_or(ConvertError::UnknownTestId { id })?;
        let Node { kind, end_ms, .. } = node;
        let NodeKind::Test(state) = kind else {
            return Err(ConvertError::UnknownTestId { id });
        };
        Ok((state, end_ms))
    }

    /// Returns the node with the given id, failing loudly if it is absent.
    pub fn node(&self, id: NodeId) -> Result<&Node, ConvertError> {
        self.nodes.get(&id).ok_or(ConvertError::UnknownNode { id })
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ConvertError> {
        self.nodes
            .get_mut(&id)
            .ok_or(ConvertError::UnknownNode { id })
    }

    /// The ordered children of a node. Nodes without children yield an empty
    /// slice.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All node ids in pre-order, children in insertion order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![NodeId::Root];
        while let Some(id) = stack.pop() {
            if !self.nodes.contains_key(&id) {
                continue;
            }
            order.push(id);
            for &child in self.children(id).iter().rev() {
                stack.push(child);
            }
        }
        order
    }
}
