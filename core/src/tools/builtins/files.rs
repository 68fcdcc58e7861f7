//! File reading tool.

use crate::tools::registry::ToolEntry;
use crate::tools::registry::ToolSpec;
use agentrun_protocol::AccessLevel;
use agentrun_protocol::JsonSchema;
use agentrun_protocol::ToolResult;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
}

pub fn read_file_tool() -> ToolEntry {
    let spec = ToolSpec {
        name: "read_file".to_string(),
        description: "Read a file from disk and return its contents as text.".to_string(),
        parameters: serde_json::to_value(JsonSchema::object(vec![(
            "path",
            JsonSchema::string("Path of the file to read"),
            true,
        )]))
        .unwrap_or_default(),
    };
    ToolEntry::simple(spec, AccessLevel::Read, |args| async move {
        Ok(read_file(args))
    })
}

fn read_file(args: Value) -> ToolResult {
    let args: ReadFileArgs = match serde_json::from_value(args) {
        Ok(args) => args,
        Err(e) => return ToolResult::error(format!("invalid read_file arguments: {e}")),
    };
    match std::fs::read_to_string(&args.path) {
        Ok(content) => ToolResult::ok(content),
        Err(e) => ToolResult::error(format!("cannot read `{}`: {e}", args.path)),
    }
}
