//! Worker-thread pool for tree-sitter parsers
//!
//! Parsers are stateful and pinned to dedicated threads; requests flow over a
//! channel and come back as the core's duck-typed [`ParseNode`] tree, so the
//! rest of the pipeline never touches tree-sitter types.

use std::sync::{Arc, Mutex, mpsc};

use tree_sitter::Parser;

use arbor_core::{GraphError, Language, ParseNode, Point, Result};

use crate::grammar;

struct WorkerRequest {
    language: Language,
    source: Vec<u8>,
    response: mpsc::Sender<Result<ParseNode>>,
}

/// Thread-safe pool of tree-sitter parsers.
#[derive(Clone)]
pub struct ParserPool {
    sender: mpsc::Sender<WorkerRequest>,
}

impl ParserPool {
    /// Create a pool with the given number of worker threads.
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerRequest>();
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..num_workers {
            let receiver = Arc::clone(&receiver);
            std::thread::spawn(move || Self::worker_thread(worker_id, receiver));
        }

        Self { sender }
    }

    fn worker_thread(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<WorkerRequest>>>) {
        tracing::debug!("parser worker {} started", worker_id);

        let mut parser = Parser::new();

        loop {
            let request = {
                let Ok(receiver) = receiver.lock() else {
                    break;
                };
                match receiver.recv() {
                    Ok(request) => request,
                    Err(_) => {
                        tracing::debug!("parser worker {} shutting down", worker_id);
                        break;
                    }
                }
            };

            let result = Self::parse_with(&mut parser, request.language, &request.source);
            if request.response.send(result).is_err() {
                tracing::warn!("parse result dropped; caller went away");
            }
        }
    }

    fn parse_with(parser: &mut Parser, language: Language, source: &[u8]) -> Result<ParseNode> {
        parser
            .set_language(&grammar(language))
            .map_err(|e| GraphError::Backend(format!("failed to set language: {e}")))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| GraphError::Backend("parser produced no tree".to_string()))?;
        Ok(convert(tree.root_node()))
    }

    /// Parse on a pool worker, blocking the calling thread until done.
    pub fn parse_blocking(&self, language: Language, source: Vec<u8>) -> Result<ParseNode> {
        let (response, result) = mpsc::channel();
        self.sender
            .send(WorkerRequest {
                language,
                source,
                response,
            })
            .map_err(|_| GraphError::Backend("parser pool is shut down".to_string()))?;
        result
            .recv()
            .map_err(|_| GraphError::Backend("parser worker died".to_string()))?
    }
}

/// Convert a tree-sitter node (and its subtree) into the uniform tree shape.
fn convert(node: tree_sitter::Node<'_>) -> ParseNode {
    let mut cursor = node.walk();
    let children = node.children(&mut cursor).map(convert).collect();
    ParseNode {
        kind: node.kind().to_string(),
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_point: Point {
            row: node.start_position().row,
            column: node.start_position().column,
        },
        end_point: Point {
            row: node.end_position().row,
            column: node.end_position().column,
        },
        children,
    }
}

/// Pool sized to the machine, with at least two workers.
pub fn create_parser_pool() -> ParserPool {
    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get().max(2))
        .unwrap_or(2);
    ParserPool::new(num_workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_python_module() {
        let pool = create_parser_pool();
        let root = pool
            .parse_blocking(Language::Python, b"x = 1\n".to_vec())
            .unwrap();
        assert_eq!(root.kind, "module");
        assert_eq!(root.start_byte, 0);
        assert_eq!(root.end_byte, 6);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].kind, "expression_statement");
    }

    #[test]
    fn parse_rust_source_file() {
        let pool = create_parser_pool();
        let source = b"fn main() {\n    println!(\"hi\");\n}\n".to_vec();
        let root = pool.parse_blocking(Language::Rust, source).unwrap();
        assert_eq!(root.kind, "source_file");
        assert!(!root.children.is_empty());
    }

    #[test]
    fn parse_typescript_program() {
        let pool = create_parser_pool();
        let source = b"class A { m() { return 1; } }\n".to_vec();
        let root = pool.parse_blocking(Language::TypeScript, source).unwrap();
        assert_eq!(root.kind, "program");
    }

    #[test]
    fn children_keep_source_order() {
        let pool = create_parser_pool();
        let root = pool
            .parse_blocking(Language::Python, b"a = 1\nb = 2\n".to_vec())
            .unwrap();
        assert_eq!(root.children.len(), 2);
        assert!(root.children[0].start_byte < root.children[1].start_byte);
    }
}
