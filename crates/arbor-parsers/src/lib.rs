//! Tree-sitter frontends behind the core's parser port

pub mod pool;

pub use pool::{ParserPool, create_parser_pool};

use arbor_core::{Language, ParseNode, Result, TreeParser};

/// The tree-sitter grammar for a supported language.
pub(crate) fn grammar(language: Language) -> tree_sitter::Language {
    match language {
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

/// [`TreeParser`] implementation backed by the worker-thread pool.
pub struct SyntaxParser {
    pool: ParserPool,
}

impl SyntaxParser {
    pub fn new(pool: ParserPool) -> Self {
        SyntaxParser { pool }
    }
}

impl Default for SyntaxParser {
    fn default() -> Self {
        SyntaxParser::new(create_parser_pool())
    }
}

impl TreeParser for SyntaxParser {
    fn parse(&self, language: Language, source: &[u8]) -> Result<ParseNode> {
        self.pool.parse_blocking(language, source.to_vec())
    }
}
