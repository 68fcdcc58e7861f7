//! Builtin tools registered into every process.

pub mod calc;
pub mod control;
pub mod files;

pub use calc::calc_tool;
pub use control::fork_tool;
pub use control::goto_tool;
pub use control::ForkArgs;
pub use control::FORK_TOOL;
pub use control::GOTO_TOOL;
pub use files::read_file_tool;

use crate::tools::registry::ToolEntry;
use crate::tools::registry::ToolSpec;
use agentrun_protocol::AccessLevel;
use agentrun_protocol::JsonSchema;
use agentrun_protocol::ToolResult;

/// Enumerates the registered tools. Built last, closed over the final
/// catalog, since the registry is immutable once the process starts.
pub fn list_tools_tool(catalog: Vec<(String, String)>) -> ToolEntry {
    let spec = ToolSpec {
        name: "list_tools".to_string(),
        description: "List every available tool with its description.".to_string(),
        parameters: serde_json::to_value(JsonSchema::empty_object()).unwrap_or_default(),
    };
    ToolEntry::simple(spec, AccessLevel::Read, move |_args| {
        let listing = catalog
            .iter()
            .map(|(name, description)| format!("- {name}: {description}"))
            .collect::<Vec<_>>()
            .join("\n");
        async move { Ok(ToolResult::ok(format!("Available tools:\n{listing}"))) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::ToolHandlerKind;

    #[tokio::test]
    async fn list_tools_renders_catalog() {
        let entry = list_tools_tool(vec![
            ("calc".to_string(), "math".to_string()),
            ("read_fd".to_string(), "paging".to_string()),
        ]);
        let handler = match entry.handler {
            ToolHandlerKind::Simple(f) => f,
            _ => unreachable!(),
        };
        let result = handler(serde_json::json!({})).await.unwrap();
        assert!(result.text().contains("- calc: math"));
        assert!(result.text().contains("- read_fd: paging"));
    }
}
