//! Reading and writing graphs in the `dependency_graph` text format.
//!
//! The format is a restricted graphviz digraph. Everything that matters is
//! carried in the `NodeInBase64` attribute, a base64 MessagePack encoding of
//! the whole node record; the remaining attributes are human-readable aids
//! for rendering and debugging. Node identifiers in the text are transient:
//! the reader assigns fresh ids.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::GraphError;
use crate::graph::PackageGraph;
use crate::node::PkgNode;

const NODE_PAYLOAD_KEY: &str = "NodeInBase64";
const SRPM_KEY: &str = "SRPM";
const FILL_COLOR_KEY: &str = "fillcolor";
const STYLE_KEY: &str = "style";

impl PackageGraph {
    /// Copy the graph by writing it to a buffer and reading it back. Node
    /// ids are reassigned; everything else round-trips.
    pub fn deep_copy(&self) -> Result<PackageGraph, GraphError> {
        let mut buffer = Vec::new();
        write_dot(self, &mut buffer)?;
        read_dot(buffer.as_slice())
    }
}

pub fn write_dot<W: Write>(graph: &PackageGraph, mut writer: W) -> Result<(), GraphError> {
    writeln!(writer, "digraph dependency_graph {{")?;
    for node in graph.nodes() {
        let payload = encode_node(node)?;
        writeln!(
            writer,
            "\t{} [{NODE_PAYLOAD_KEY}=\"{payload}\", {SRPM_KEY}=\"{}\", {FILL_COLOR_KEY}=\"{}\", {STYLE_KEY}=\"filled\"];",
            node.id,
            escape(&node.srpm_path),
            node.fill_color(),
        )?;
    }
    for (from, to) in graph.edges() {
        writeln!(writer, "\t{from} -> {to};")?;
    }
    writeln!(writer, "}}")?;
    Ok(())
}

pub fn read_dot<R: BufRead>(reader: R) -> Result<PackageGraph, GraphError> {
    let mut graph = PackageGraph::new();
    let mut ids = HashMap::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let number = number + 1;
        let statement = line.trim().trim_end_matches(';');
        if statement.is_empty() || statement == "}" || statement.starts_with("digraph") {
            continue;
        }

        let (head, attributes) = match statement.find('[') {
            Some(open) => {
                let close = statement.rfind(']').ok_or_else(|| GraphError::ParseGraph {
                    line: number,
                    message: "unterminated attribute list".to_owned(),
                })?;
                (
                    statement[..open].trim(),
                    Some(&statement[open + 1..close]),
                )
            }
            None => (statement, None),
        };

        if let Some((from, to)) = head.split_once("->") {
            let from = resolve(&mut graph, &mut ids, from.trim());
            let to = resolve(&mut graph, &mut ids, to.trim());
            graph.add_edge(from, to)?;
            continue;
        }
        let identifier = head;
        if identifier.is_empty() {
            return Err(GraphError::ParseGraph {
                line: number,
                message: "missing node identifier".to_owned(),
            });
        }
        let id = resolve(&mut graph, &mut ids, identifier);
        let Some(attributes) = attributes else {
            continue;
        };
        for (key, value) in parse_attributes(attributes, number)? {
            match key.as_str() {
                NODE_PAYLOAD_KEY => {
                    let decoded = decode_node(&value)?;
                    if let Some(node) = graph.node_mut(id) {
                        let assigned = node.id;
                        *node = decoded;
                        node.id = assigned;
                    }
                }
                SRPM_KEY | FILL_COLOR_KEY | STYLE_KEY => {}
                unknown => {
                    tracing::warn!("Ignoring unknown attribute {unknown} on node {identifier}");
                }
            }
        }
    }
    Ok(graph)
}

pub fn write_dot_file(graph: &PackageGraph, path: impl AsRef<Path>) -> Result<(), GraphError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_dot(graph, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn read_dot_file(path: impl AsRef<Path>) -> Result<PackageGraph, GraphError> {
    read_dot(BufReader::new(File::open(path)?))
}

/// Id for a textual identifier, inserting a placeholder node on first
/// sight. The placeholder is overwritten once the payload attribute is
/// decoded.
fn resolve(graph: &mut PackageGraph, ids: &mut HashMap<String, u64>, identifier: &str) -> u64 {
    if let Some(&id) = ids.get(identifier) {
        return id;
    }
    let id = graph.insert_node(PkgNode::new_meta());
    ids.insert(identifier.to_owned(), id);
    id
}

fn encode_node(node: &PkgNode) -> Result<String, GraphError> {
    let bytes = rmp_serde::to_vec_named(node).map_err(|source| GraphError::EncodeNode {
        name: node.friendly_name(),
        source,
    })?;
    Ok(BASE64.encode(bytes))
}

fn decode_node(payload: &str) -> Result<PkgNode, GraphError> {
    let bytes = BASE64
        .decode(payload)
        .map_err(|err| GraphError::DecodeNode {
            reason: err.to_string(),
        })?;
    rmp_serde::from_slice(&bytes).map_err(|err| GraphError::DecodeNode {
        reason: err.to_string(),
    })
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Parse `key="value", key=value, ...`, unescaping quoted values.
fn parse_attributes(input: &str, line: usize) -> Result<Vec<(String, String)>, GraphError> {
    let mut attributes = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            return Ok(attributes);
        }

        let mut key = String::new();
        while matches!(chars.peek(), Some(c) if *c != '=' && !c.is_whitespace()) {
            key.push(chars.next().unwrap_or_default());
        }
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(GraphError::ParseGraph {
                line,
                message: format!("attribute {key} has no value"),
            });
        }
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(GraphError::ParseGraph {
                    line,
                    message: format!("unterminated quoted value for {key}"),
                });
            }
        } else {
            while matches!(chars.peek(), Some(c) if *c != ',' && !c.is_whitespace()) {
                value.push(chars.next().unwrap_or_default());
            }
        }
        attributes.push((key, value));
    }
}
