// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while converting a reporter stream.

use crate::tree::NodeId;
use thiserror::Error;

/// An error that occurs while decoding a reporter event object.
///
/// Only returned for lines that parse as a JSON object but do not match the
/// shape declared by their `type` tag; non-JSON noise lines are skipped
/// silently instead.
#[derive(Debug, Error)]
#[error("malformed reporter event object")]
pub struct DecodeError {
    #[source]
    inner: serde_json::Error,
}

impl DecodeError {
    pub(crate) fn new(inner: serde_json::Error) -> Self {
        Self { inner }
    }
}

/// An error that occurs while converting a reporter stream into a JUnit
/// report.
///
/// There is no partial-output mode: any of these aborts the conversion.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// The start event declared a protocol version outside the 0.x family.
    #[error("unsupported JSON reporter protocol version `{version}` (only 0.x is supported)")]
    UnsupportedProtocol {
        /// The declared version.
        version: String,
    },

    /// The stream finished without a start event, so there is no root to
    /// aggregate under.
    #[error("event stream contained no start event")]
    MissingStartEvent,

    /// A JSON object line did not match its declared event shape.
    #[error(transparent)]
    MalformedEvent(#[from] DecodeError),

    /// A print/error/testDone event referenced a test id with no preceding
    /// testStart event.
    #[error("event references unknown test id {id}")]
    UnknownTestId {
        /// The test id named by the event.
        id: u64,
    },

    /// A suite/group/test declared a parent that has not been created. The
    /// protocol guarantees parents precede their children, so this is a
    /// broken producer.
    #[error("node {child} arrived before its declared parent {parent}")]
    UnknownParent {
        /// The declared parent id.
        parent: NodeId,
        /// The id of the node that could not be attached.
        child: u64,
    },

    /// A node declared a test case as its parent.
    #[error("node {parent} is a test case and cannot hold children")]
    InvalidParent {
        /// The declared parent id.
        parent: NodeId,
    },

    /// A node id present in the children map had no node. Internal
    /// consistency violation.
    #[error("node {id} is missing from the tree")]
    UnknownNode {
        /// The missing id.
        id: NodeId,
    },

    /// Captured print messages could not be encoded into the `messages`
    /// property.
    #[error("failed to encode captured print messages")]
    EncodeMessages {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The XML writer failed.
    #[error("error serializing JUnit report")]
    Serialize {
        /// The underlying XML error.
        #[from]
        source: quick_xml::Error,
    },
}
