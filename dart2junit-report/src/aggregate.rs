// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregation passes over the completed tree.
//!
//! Counts and end times are only known once every leaf has reported its
//! terminal outcome, so both passes run after the builder has drained the
//! whole event stream.

use crate::{
    errors::ConvertError,
    tree::{NodeId, NodeKind, TestStatus, TestTree},
};
use chrono::{DateTime, Utc};

enum Step {
    Enter(NodeId),
    Leave,
}

/// Propagates each test case's outcome and end time to every ancestor.
///
/// A single pre-order traversal that carries the full ancestor chain: for
/// every test case, each ancestor from the root down to its immediate parent
/// gains one `tests`, an `errors` or `failures` increment matching the final
/// status, and an end time at least the test's. The walk is iterative with
/// an explicit stack, so arbitrarily deep group nesting cannot overflow the
/// call stack.
pub fn propagate_counts(tree: &mut TestTree) -> Result<(), ConvertError> {
    let mut stack = vec![Step::Enter(NodeId::Root)];
    let mut ancestors: Vec<NodeId> = Vec::new();

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(id) => {
                let node = tree.node(id)?;
                if let NodeKind::Test(state) = node.kind() {
                    let status = state.status;
                    let end_ms = node.end_ms();
                    for &ancestor in &ancestors {
                        let parent = tree.node_mut(ancestor)?;
                        parent.update_end_time(end_ms);
                        let Some(counts) = parent.counts_mut() else {
                            return Err(ConvertError::InvalidParent { parent: ancestor });
                        };
                        counts.tests += 1;
                        match status {
                            TestStatus::Error => counts.errors += 1,
                            TestStatus::Failure => counts.failures += 1,
                            TestStatus::Unknown | TestStatus::Success => {}
                        }
                    }
                }

                stack.push(Step::Leave);
                for &child in tree.children(id).iter().rev() {
                    stack.push(Step::Enter(child));
                }
                ancestors.push(id);
            }
            Step::Leave => {
                ancestors.pop();
            }
        }
    }
    Ok(())
}

/// Finalizes timing and metadata on every node, exactly once each.
///
/// Resolves each node's start offset against the stream origin, computes its
/// duration from the propagated end time, and drains any still-unconsumed
/// event fields into the properties bag. Nodes are independent here, so the
/// visit order is arbitrary.
pub fn finalize_timings(tree: &mut TestTree, origin: DateTime<Utc>) {
    for node in tree.nodes.values_mut() {
        node.finalize(origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::DecodeError,
        events::{EventKind, FieldMap, GroupPayload, RunEvent, SuitePayload, TestPayload, TestResult},
    };
    use chrono::TimeZone;
    use serde_json::Value;

    fn event(time: u64, kind: EventKind) -> Result<RunEvent, DecodeError> {
        Ok(RunEvent { time, kind })
    }

    fn fixture_tree() -> TestTree {
        // suite 0 > group 1 > tests 2 (failure), 3 (error); test 4 directly
        // under the suite (success).
        TestTree::build([
            event(
                0,
                EventKind::Start {
                    protocol_version: "0.1.2".to_owned(),
                    rest: FieldMap::new(),
                },
            ),
            event(
                10,
                EventKind::Suite {
                    suite: SuitePayload {
                        id: 0,
                        path: "a_test.dart".to_owned(),
                        rest: FieldMap::new(),
                    },
                },
            ),
            event(
                20,
                EventKind::Group {
                    group: GroupPayload {
                        id: 1,
                        suite_id: 0,
                        parent_id: None,
                        name: "g".to_owned(),
                        test_count: None,
                        metadata: None,
                        rest: FieldMap::new(),
                    },
                },
            ),
            event(30, test_start(2, &[1])),
            event(40, test_start(3, &[1])),
            event(50, test_start(4, &[])),
            event(60, done(2, TestResult::Failure)),
            event(70, done(3, TestResult::Error)),
            event(80, done(4, TestResult::Success)),
        ])
        .unwrap()
    }

    fn test_start(id: u64, group_ids: &[u64]) -> EventKind {
        EventKind::TestStart {
            test: TestPayload {
                id,
                name: format!("test-{id}"),
                suite_id: 0,
                group_ids: group_ids.to_vec(),
                metadata: None,
                rest: FieldMap::new(),
            },
        }
    }

    fn done(test_id: u64, result: TestResult) -> EventKind {
        EventKind::TestDone {
            test_id,
            result,
            skipped: false,
            hidden: false,
        }
    }

    fn counts_of(tree: &TestTree, id: NodeId) -> (usize, usize, usize) {
        let counts = tree.node(id).unwrap().counts().unwrap();
        (counts.tests, counts.errors, counts.failures)
    }

    #[test]
    fn test_counts_reach_every_ancestor() {
        let mut tree = fixture_tree();
        propagate_counts(&mut tree).unwrap();

        assert_eq!(counts_of(&tree, NodeId::Root), (3, 1, 1));
        assert_eq!(counts_of(&tree, NodeId::Event(0)), (3, 1, 1));
        assert_eq!(counts_of(&tree, NodeId::Event(1)), (2, 1, 1));
    }

    #[test]
    fn test_end_times_propagate_upward() {
        let mut tree = fixture_tree();
        propagate_counts(&mut tree).unwrap();

        // group 1 ends with its slowest test; the suite and root also see
        // test 4's later end.
        assert_eq!(tree.node(NodeId::Event(1)).unwrap().end_ms(), 70);
        assert_eq!(tree.node(NodeId::Event(0)).unwrap().end_ms(), 80);
        assert_eq!(tree.node(NodeId::Root).unwrap().end_ms(), 80);
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        // 4000 nested groups with a single test at the bottom. The explicit
        // ancestor stack keeps this off the call stack.
        let depth: u64 = 4000;
        let mut events = vec![
            event(
                0,
                EventKind::Start {
                    protocol_version: "0.1".to_owned(),
                    rest: FieldMap::new(),
                },
            ),
            event(
                1,
                EventKind::Suite {
                    suite: SuitePayload {
                        id: 1,
                        path: "deep_test.dart".to_owned(),
                        rest: FieldMap::new(),
                    },
                },
            ),
        ];
        for id in 2..depth {
            let parent_id = if id == 2 { None } else { Some(id - 1) };
            events.push(event(
                id,
                EventKind::Group {
                    group: GroupPayload {
                        id,
                        suite_id: 1,
                        parent_id,
                        name: format!("group-{id}"),
                        test_count: None,
                        metadata: None,
                        rest: FieldMap::new(),
                    },
                },
            ));
        }
        events.push(event(depth, test_start(depth, &[depth - 1])));
        events.push(event(depth + 1, done(depth, TestResult::Success)));

        let mut tree = TestTree::build(events).unwrap();
        propagate_counts(&mut tree).unwrap();

        assert_eq!(counts_of(&tree, NodeId::Root), (1, 0, 0));
        assert_eq!(counts_of(&tree, NodeId::Event(depth - 1)), (1, 0, 0));
    }

    #[test]
    fn test_timing_finalization() {
        let mut tree = fixture_tree();
        propagate_counts(&mut tree).unwrap();
        let origin = Utc.with_ymd_and_hms(2022, 3, 14, 9, 26, 53).unwrap();
        finalize_timings(&mut tree, origin);

        let root = tree.node(NodeId::Root).unwrap();
        let timing = root.timing().unwrap();
        assert_eq!(timing.timestamp(), "2022-03-14T09:26:53Z");
        assert_eq!(timing.time(), "0.080");

        // suite starts 10ms in, ends at 80ms.
        let suite = tree.node(NodeId::Event(0)).unwrap();
        assert_eq!(suite.timing().unwrap().time(), "0.070");
        // sub-second start offsets truncate to the same whole second.
        assert_eq!(
            suite.timing().unwrap().timestamp(),
            "2022-03-14T09:26:53Z"
        );
    }

    #[test]
    fn test_finalization_drains_leftover_fields() {
        let mut rest = FieldMap::new();
        rest.insert("platform".to_owned(), Value::from("vm"));
        rest.insert("line".to_owned(), Value::from(12));
        rest.insert("skipReason".to_owned(), Value::Null);

        let mut tree = TestTree::build([
            event(
                0,
                EventKind::Start {
                    protocol_version: "0.1".to_owned(),
                    rest: FieldMap::new(),
                },
            ),
            event(
                5,
                EventKind::Suite {
                    suite: SuitePayload {
                        id: 0,
                        path: "a_test.dart".to_owned(),
                        rest,
                    },
                },
            ),
        ])
        .unwrap();
        finalize_timings(&mut tree, Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap());

        let suite = tree.node(NodeId::Event(0)).unwrap();
        let properties: Vec<_> = suite
            .properties()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        // null values are dropped, everything else is stringified in order.
        assert_eq!(properties, &[("platform", "vm"), ("line", "12")]);
    }
}
