//! Language registry: alias normalization and file-extension detection

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Languages the parser stack ships grammars for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Go,
    Java,
    JavaScript,
    Python,
    Rust,
    Tsx,
    TypeScript,
}

pub const ALL_LANGUAGES: [Language; 9] = [
    Language::C,
    Language::Cpp,
    Language::Go,
    Language::Java,
    Language::JavaScript,
    Language::Python,
    Language::Rust,
    Language::Tsx,
    Language::TypeScript,
];

impl Language {
    /// Canonical lowercase name, as stored on FileVersion vertices.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Go => "go",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Tsx => "tsx",
            Language::TypeScript => "typescript",
        }
    }

    /// Conventional extension used when materializing inline code.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Language::C => ".c",
            Language::Cpp => ".cpp",
            Language::Go => ".go",
            Language::Java => ".java",
            Language::JavaScript => ".js",
            Language::Python => ".py",
            Language::Rust => ".rs",
            Language::Tsx => ".tsx",
            Language::TypeScript => ".ts",
        }
    }

    /// Normalize a user-supplied language name or alias.
    pub fn from_alias(name: &str) -> Result<Self> {
        let normalized = name.trim().to_lowercase();
        match normalized.as_str() {
            "c" => Ok(Language::C),
            "cpp" | "c++" | "cc" | "cxx" => Ok(Language::Cpp),
            "go" | "golang" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            "javascript" | "js" => Ok(Language::JavaScript),
            "python" | "py" => Ok(Language::Python),
            "rust" | "rs" => Ok(Language::Rust),
            "tsx" => Ok(Language::Tsx),
            "typescript" | "ts" => Ok(Language::TypeScript),
            _ => Err(GraphError::InvalidInput(format!(
                "unsupported language '{}'; supported: {}",
                name,
                supported_names().join(", ")
            ))),
        }
    }

    /// Detect the language from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "c" | "h" => Ok(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Ok(Language::Cpp),
            "go" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            "js" | "jsx" | "mjs" | "cjs" => Ok(Language::JavaScript),
            "py" | "pyi" => Ok(Language::Python),
            "rs" => Ok(Language::Rust),
            "tsx" => Ok(Language::Tsx),
            "ts" => Ok(Language::TypeScript),
            _ => Err(GraphError::InvalidInput(format!(
                "unsupported file extension: {:?}",
                path.extension().unwrap_or_default()
            ))),
        }
    }

    /// Resolve an optional explicit language against an optional path.
    pub fn resolve(language: Option<&str>, path: Option<&Path>) -> Result<Self> {
        if let Some(name) = language {
            return Self::from_alias(name);
        }
        if let Some(path) = path {
            return Self::from_path(path);
        }
        Err(GraphError::InvalidInput(
            "language must be provided when no file path is available".to_string(),
        ))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn supported_names() -> Vec<&'static str> {
    ALL_LANGUAGES.iter().map(|l| l.as_str()).collect()
}
