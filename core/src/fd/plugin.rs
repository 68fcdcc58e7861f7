//! The file-descriptor plugin: threshold interception plus the tools
//! that make descriptors readable and exportable from the conversation.

use crate::fd::manager::ExportMode;
use crate::fd::manager::FdConfig;
use crate::fd::manager::FdManager;
use crate::fd::manager::ReadMode;
use crate::fd::manager::ReadOutput;
use crate::fd::manager::ReadRequest;
use agentrun_hooks::Capability;
use agentrun_hooks::Plugin;
use agentrun_hooks::ProvidedTool;
use agentrun_protocol::AccessLevel;
use agentrun_protocol::JsonSchema;
use agentrun_protocol::ToolResult;
use agentrun_protocol::ToolResultContent;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Owns the [`FdManager`] and hooks it into the conversation: oversized
/// tool results and user inputs are swapped for descriptor summaries,
/// and the `read_fd` / `fd_to_file` tools are contributed at setup time.
pub struct FdPlugin {
    manager: Arc<FdManager>,
}

impl FdPlugin {
    pub fn new(config: FdConfig) -> Self {
        Self {
            manager: Arc::new(FdManager::new(config)),
        }
    }

    pub fn manager(&self) -> Arc<FdManager> {
        Arc::clone(&self.manager)
    }
}

#[async_trait]
impl Plugin for FdPlugin {
    fn name(&self) -> &str {
        "file_descriptors"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::ToolResultHook,
            Capability::UserInputHook,
            Capability::ProvideTools,
        ]
    }

    fn fork(&self) -> Arc<dyn Plugin> {
        // Reference-class entries are copied into the branch; volatile
        // handles stay with the parent.
        Arc::new(Self {
            manager: Arc::new(self.manager.fork_references()),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn hook_tool_result(
        &self,
        tool_name: &str,
        result: &ToolResult,
    ) -> Result<Option<ToolResult>> {
        let text = result.text();
        let threshold = self.manager.config().max_direct_output_chars;
        if text.chars().count() <= threshold {
            return Ok(None);
        }
        debug!(tool = tool_name, chars = text.chars().count(), "storing oversized tool output");
        let summary = self.manager.create(&text);
        Ok(Some(ToolResult {
            content: ToolResultContent::Text(summary),
            is_error: result.is_error,
            abort_execution: result.abort_execution,
        }))
    }

    async fn hook_user_input(&self, text: &str) -> Result<Option<String>> {
        let threshold = self.manager.config().max_input_chars;
        if text.chars().count() <= threshold {
            return Ok(None);
        }
        debug!(chars = text.chars().count(), "storing oversized user input");
        let summary = self.manager.create_reference(text);
        Ok(Some(format!(
            "{summary}\nThis message was large, so it was stored in the descriptor above. \
             Use read_fd to page through the full content."
        )))
    }

    fn provide_tools(&self) -> Vec<ProvidedTool> {
        vec![read_fd_tool(&self.manager), fd_to_file_tool(&self.manager)]
    }
}

#[derive(Debug, Deserialize)]
struct ReadFdArgs {
    fd: String,
    #[serde(default)]
    read_all: bool,
    #[serde(default)]
    mode: ReadMode,
    #[serde(default)]
    start: Option<usize>,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    extract_to_new: bool,
}

fn read_fd_tool(manager: &Arc<FdManager>) -> ProvidedTool {
    let manager = Arc::clone(manager);
    ProvidedTool {
        name: "read_fd".to_string(),
        description: "Read content from a file descriptor created for oversized output. \
                      Supports page, line and char addressing; page and line numbers are \
                      1-based, char offsets 0-based. Set read_all to fetch everything, or \
                      extract_to_new to carve the slice into a fresh descriptor."
            .to_string(),
        parameters: JsonSchema::object(vec![
            ("fd", JsonSchema::string("Descriptor handle, e.g. fd:1"), true),
            (
                "read_all",
                JsonSchema::boolean("Return the entire content, ignoring positioning"),
                false,
            ),
            (
                "mode",
                JsonSchema::string("Addressing mode: page, line or char (default page)"),
                false,
            ),
            (
                "start",
                JsonSchema::integer("1-based page/line number, or 0-based char offset"),
                false,
            ),
            (
                "count",
                JsonSchema::integer("Number of pages/lines/chars to read (default 1)"),
                false,
            ),
            (
                "extract_to_new",
                JsonSchema::boolean("Store the slice under a new descriptor instead of returning it"),
                false,
            ),
        ]),
        access: AccessLevel::Read,
        handler: Arc::new(move |args: Value| {
            let manager = Arc::clone(&manager);
            Box::pin(async move { handle_read_fd(&manager, args) })
        }),
    }
}

fn handle_read_fd(manager: &FdManager, args: Value) -> ToolResult {
    let args: ReadFdArgs = match serde_json::from_value(args) {
        Ok(args) => args,
        Err(e) => return ToolResult::error(format!("invalid read_fd arguments: {e}")),
    };
    let request = ReadRequest {
        mode: args.mode,
        start: args.start,
        count: args.count,
        read_all: args.read_all,
        extract_to_new: args.extract_to_new,
    };
    match manager.read(&args.fd, &request) {
        Ok(ReadOutput::Content {
            fd,
            content,
            mode,
            lines,
            pages,
            continued,
            truncated,
        }) => {
            let mode = match mode {
                ReadMode::Page => "page",
                ReadMode::Line => "line",
                ReadMode::Char => "char",
            };
            let pages_attr = pages
                .map(|(a, b)| format!(" pages=\"{a}-{b}\""))
                .unwrap_or_default();
            ToolResult::ok(format!(
                "<fd_content fd=\"{fd}\" mode=\"{mode}\"{pages_attr} lines=\"{}-{}\" \
                 continued=\"{continued}\" truncated=\"{truncated}\">\n{content}\n</fd_content>",
                lines.0, lines.1,
            ))
        }
        Ok(ReadOutput::Extracted {
            source_fd,
            new_fd,
            chars,
        }) => ToolResult::ok(format!(
            "<fd_extracted source=\"{source_fd}\" new_fd=\"{new_fd}\" chars=\"{chars}\"/>"
        )),
        Err(e) => ToolResult::error(e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct FdToFileArgs {
    fd: String,
    file_path: String,
    #[serde(default)]
    mode: ExportMode,
    #[serde(default = "default_true")]
    create: bool,
    #[serde(default = "default_true")]
    exist_ok: bool,
}

fn default_true() -> bool {
    true
}

fn fd_to_file_tool(manager: &Arc<FdManager>) -> ProvidedTool {
    let manager = Arc::clone(manager);
    ProvidedTool {
        name: "fd_to_file".to_string(),
        description: "Write a file descriptor's content to a file on disk. `create` governs \
                      whether a missing file is acceptable, `exist_ok` whether an existing \
                      one is; mode is write or append."
            .to_string(),
        parameters: JsonSchema::object(vec![
            ("fd", JsonSchema::string("Descriptor handle, e.g. fd:1"), true),
            ("file_path", JsonSchema::string("Destination path"), true),
            (
                "mode",
                JsonSchema::string("write (default) or append"),
                false,
            ),
            (
                "create",
                JsonSchema::boolean("Allow creating the file if missing (default true)"),
                false,
            ),
            (
                "exist_ok",
                JsonSchema::boolean("Allow overwriting an existing file (default true)"),
                false,
            ),
        ]),
        access: AccessLevel::Write,
        handler: Arc::new(move |args: Value| {
            let manager = Arc::clone(&manager);
            Box::pin(async move { handle_fd_to_file(&manager, args) })
        }),
    }
}

fn handle_fd_to_file(manager: &FdManager, args: Value) -> ToolResult {
    let args: FdToFileArgs = match serde_json::from_value(args) {
        Ok(args) => args,
        Err(e) => return ToolResult::error(format!("invalid fd_to_file arguments: {e}")),
    };
    let path = PathBuf::from(&args.file_path);
    match manager.export_to_file(&args.fd, &path, args.mode, args.create, args.exist_ok) {
        Ok(status) => ToolResult::ok(format!(
            "<fd_export fd=\"{}\" path=\"{}\" bytes=\"{}\"/>",
            status.fd, status.path, status.bytes_written,
        )),
        Err(e) => ToolResult::error(e.to_string()),
    }
}
