//! Built-in tools and the registry that advertises them.
//!
//! Tools are plain functions: typed input in, text or [`ToolError`] out.
//! The protocol engine only advertises them during `initialize`; the
//! `review` command is the one caller of [`ToolRegistry::call`].

pub mod read_file;
pub mod scan_code;

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ToolError;

pub use read_file::{FileReader, ReadFileInput};
pub use scan_code::{CodeScanner, ScanCodeInput, ScanReport};

/// Name of the file reading tool.
pub const READ_FILE: &str = "readFile";

/// Name of the pattern scanning tool.
pub const SCAN_CODE: &str = "scanCode";

/// A tool definition as advertised in the `initialize` result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Fixed set of tools, in advertisement order.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    definitions: IndexMap<String, ToolDefinition>,
    reader: FileReader,
    scanner: CodeScanner,
}

impl ToolRegistry {
    /// Builds the registry. `project_root` anchors relative `readFile` paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the scanner rules fail to compile.
    pub fn new(project_root: Option<PathBuf>) -> Result<Self, ToolError> {
        let definitions = builtin_definitions()
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect();

        Ok(Self {
            definitions,
            reader: FileReader::new(project_root),
            scanner: CodeScanner::new()?,
        })
    }

    /// All tool definitions, in advertisement order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.definitions.values()
    }

    /// Looks up a single definition.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.get(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// True if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Reads a file through the `readFile` tool.
    ///
    /// # Errors
    ///
    /// See [`FileReader::read`].
    pub fn read_file(&self, path: &str) -> Result<String, ToolError> {
        self.reader.read(path)
    }

    /// Scans source text through the `scanCode` tool.
    #[must_use]
    pub fn scan_code(&self, code: &str) -> ScanReport {
        self.scanner.scan(code)
    }

    /// Invokes a tool by name with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for unregistered names,
    /// [`ToolError::InvalidArguments`] if `arguments` does not match the
    /// tool's input schema, or the tool's own error.
    pub fn call(&self, name: &str, arguments: &Value) -> Result<String, ToolError> {
        match name {
            READ_FILE => {
                let input: ReadFileInput = parse_arguments(name, arguments)?;
                self.read_file(&input.path)
            }
            SCAN_CODE => {
                let input: ScanCodeInput = parse_arguments(name, arguments)?;
                Ok(self.scan_code(&input.code).to_string())
            }
            _ => Err(ToolError::UnknownTool {
                name: name.to_string(),
            }),
        }
    }
}

fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, ToolError> {
    T::deserialize(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

fn builtin_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: READ_FILE.to_string(),
            description: "Reads text content from a local file path relative to the project \
                          root. Returns file contents or an error message if the file cannot \
                          be read."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "The file path relative to the project root"
                    }
                },
                "required": ["path"]
            }),
        },
        ToolDefinition {
            name: SCAN_CODE.to_string(),
            description: "Scans code for basic style violations like TODOs, print statements, \
                          or hardcoded secrets. Returns a formatted list of warnings or 'No \
                          issues found.'"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "The source code content to scan"
                    }
                },
                "required": ["code"]
            }),
        },
    ]
}
