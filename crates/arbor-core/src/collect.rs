//! Post-order tree collector: flattens a parse tree into write-ready arrays

use crate::identity::{shape_hash, span_key};
use crate::model::{NodeProps, ParseNode};

/// A parent→child edge in collector-local indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEdge {
    pub parent: usize,
    pub child: usize,
    pub child_order: usize,
}

/// A node's byte span, in collector-local indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOccurrence {
    pub node: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// Flat description of one parsed tree, in post-order.
///
/// Children always precede their parent in `nodes`, and a parent's edges
/// carry `child_order` 0..N-1 in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedTree {
    pub nodes: Vec<NodeProps>,
    pub edges: Vec<TreeEdge>,
    pub occurrences: Vec<TreeOccurrence>,
}

struct Frame<'a> {
    node: &'a ParseNode,
    next_child: usize,
    child_indices: Vec<usize>,
    child_hashes: Vec<String>,
}

impl<'a> Frame<'a> {
    fn new(node: &'a ParseNode) -> Self {
        Frame {
            node,
            next_child: 0,
            child_indices: Vec::with_capacity(node.children.len()),
            child_hashes: Vec::with_capacity(node.children.len()),
        }
    }
}

/// Traverse `root` post-order and produce the flat arrays of one ingest.
///
/// Pure: no I/O, no global state. Malformed byte ranges hash over an empty
/// slice instead of rejecting the tree. Iterative with an explicit work
/// stack so pathologically deep trees cannot overflow the call stack.
pub fn collect_tree(root: &ParseNode, file_uuid: &str, source: &[u8]) -> CollectedTree {
    let mut out = CollectedTree::default();
    let mut finished: Option<(usize, String)> = None;
    let mut stack = vec![Frame::new(root)];

    while let Some(mut frame) = stack.pop() {
        if let Some((index, hash)) = finished.take() {
            frame.child_indices.push(index);
            frame.child_hashes.push(hash);
        }

        if frame.next_child < frame.node.children.len() {
            let child = &frame.node.children[frame.next_child];
            frame.next_child += 1;
            stack.push(frame);
            stack.push(Frame::new(child));
            continue;
        }

        let node = frame.node;
        let slice = source.get(node.start_byte..node.end_byte).unwrap_or(&[]);
        let hash = shape_hash(&node.kind, slice, &frame.child_hashes);
        let index = out.nodes.len();

        out.nodes.push(NodeProps {
            file_uuid: file_uuid.to_string(),
            kind: node.kind.clone(),
            start_byte: node.start_byte,
            end_byte: node.end_byte,
            start_row: node.start_point.row,
            start_col: node.start_point.column,
            end_row: node.end_point.row,
            end_col: node.end_point.column,
            span_key: span_key(file_uuid, &node.kind, node.start_byte, node.end_byte),
            shape_hash: hash.clone(),
        });
        for (order, child) in frame.child_indices.iter().enumerate() {
            out.edges.push(TreeEdge {
                parent: index,
                child: *child,
                child_order: order,
            });
        }
        out.occurrences.push(TreeOccurrence {
            node: index,
            start_byte: node.start_byte,
            end_byte: node.end_byte,
        });

        finished = Some((index, hash));
    }

    out
}
