// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a finalized tree as a JUnit XML document.

use crate::{
    errors::ConvertError,
    tree::{Counts, ErrorRecord, Node, NodeId, NodeKind, TestState, TestTree},
};
use quick_xml::{
    Writer,
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, Event},
};
use std::io;

static TESTSUITES_TAG: &str = "testsuites";
static TESTSUITE_TAG: &str = "testsuite";
static TESTCASE_TAG: &str = "testcase";
static PROPERTIES_TAG: &str = "properties";
static PROPERTY_TAG: &str = "property";
static FAILURE_TAG: &str = "failure";
static ERROR_TAG: &str = "error";

pub(crate) fn serialize_tree(tree: &TestTree, writer: impl io::Write) -> Result<(), ConvertError> {
    let mut writer = Writer::new_with_indent(writer, b' ', 4);

    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    writer.write_event(Event::Decl(decl))?;

    serialize_node(tree, NodeId::Root, &mut writer)?;
    writer.write_event(Event::Eof)?;

    // Add a trailing newline.
    writer.write_indent()?;
    Ok(())
}

fn serialize_node(
    tree: &TestTree,
    id: NodeId,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), ConvertError> {
    let node = tree.node(id)?;
    match node.kind() {
        NodeKind::Root(counts) => {
            serialize_container(tree, id, node, None, counts, TESTSUITES_TAG, writer)
        }
        NodeKind::Suite { name, counts } | NodeKind::Group { name, counts } => {
            serialize_container(tree, id, node, Some(name), counts, TESTSUITE_TAG, writer)
        }
        NodeKind::Test(state) => serialize_testcase(node, state, writer),
    }
}

fn serialize_container(
    tree: &TestTree,
    id: NodeId,
    node: &Node,
    name: Option<&str>,
    counts: &Counts,
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), ConvertError> {
    let mut tag = BytesStart::new(tag_name);
    if let Some(name) = name {
        tag.push_attribute(("name", name));
    }
    tag.extend_attributes([
        ("tests", counts.tests.to_string().as_str()),
        ("errors", counts.errors.to_string().as_str()),
        ("failures", counts.failures.to_string().as_str()),
    ]);
    push_timing_attrs(&mut tag, node);
    writer.write_event(Event::Start(tag))?;

    if !node.properties().is_empty() {
        serialize_properties(node, None, writer)?;
    }

    for &child in tree.children(id) {
        serialize_node(tree, child, writer)?;
    }

    serialize_end_tag(tag_name, writer)?;
    Ok(())
}

fn serialize_testcase(
    node: &Node,
    state: &TestState,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), ConvertError> {
    let mut tag = BytesStart::new(TESTCASE_TAG);
    tag.push_attribute(("name", state.name.as_str()));
    push_timing_attrs(&mut tag, node);
    writer.write_event(Event::Start(tag))?;

    // All captured print payloads are folded into a single synthetic
    // `messages` property, in arrival order.
    let messages = if state.messages.is_empty() {
        None
    } else {
        let encoded = serde_json::to_string(&state.messages)
            .map_err(|source| ConvertError::EncodeMessages { source })?;
        Some(encoded)
    };
    if !node.properties().is_empty() || messages.is_some() {
        serialize_properties(node, messages.as_deref(), writer)?;
    }

    for error in &state.errors {
        serialize_error(error, writer)?;
    }

    serialize_end_tag(TESTCASE_TAG, writer)?;
    Ok(())
}

fn serialize_properties(
    node: &Node,
    messages: Option<&str>,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), ConvertError> {
    let tag = BytesStart::new(PROPERTIES_TAG);
    writer.write_event(Event::Start(tag))?;
    for (name, value) in node.properties() {
        serialize_property(name, value, writer)?;
    }
    if let Some(messages) = messages {
        serialize_property("messages", messages, writer)?;
    }
    serialize_end_tag(PROPERTIES_TAG, writer)?;
    Ok(())
}

fn serialize_property(
    name: &str,
    value: &str,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), ConvertError> {
    let mut tag = BytesStart::new(PROPERTY_TAG);
    tag.extend_attributes([("name", name), ("value", value)]);
    writer.write_event(Event::Empty(tag))?;
    Ok(())
}

fn serialize_error(
    record: &ErrorRecord,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), ConvertError> {
    let tag_name = if record.is_failure {
        FAILURE_TAG
    } else {
        ERROR_TAG
    };
    let mut tag = BytesStart::new(tag_name);
    tag.push_attribute(("message", record.message.as_str()));
    writer.write_event(Event::Start(tag))?;
    writer.write_event(Event::CData(BytesCData::new(record.stack_trace.as_str())))?;
    serialize_end_tag(tag_name, writer)?;
    Ok(())
}

fn push_timing_attrs(tag: &mut BytesStart<'_>, node: &Node) {
    if let Some(timing) = node.timing() {
        tag.push_attribute(("timestamp", timing.timestamp().as_str()));
        tag.push_attribute(("time", timing.time().as_str()));
    }
}

fn serialize_end_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), ConvertError> {
    writer.write_event(Event::End(BytesEnd::new(tag_name)))?;
    Ok(())
}
