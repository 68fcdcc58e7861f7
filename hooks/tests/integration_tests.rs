//! Cross-event integration tests for the plugin runner.

use agentrun_hooks::Capability;
use agentrun_hooks::EventRunner;
use agentrun_hooks::Plugin;
use agentrun_hooks::ProvidedTool;
use agentrun_hooks::ToolCallAdjustment;
use agentrun_protocol::AccessLevel;
use agentrun_protocol::JsonSchema;
use agentrun_protocol::ToolResult;
use anyhow::Result;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::sync::Mutex;

/// A plugin exercising several capabilities at once, with a log of what
/// it saw.
struct RecordingPlugin {
    tag: &'static str,
    log: Mutex<Vec<String>>,
}

impl RecordingPlugin {
    fn new(tag: &'static str) -> Arc<Self> {
        Arc::new(Self {
            tag,
            log: Mutex::new(Vec::new()),
        })
    }

    fn note(&self, event: &str) {
        self.log.lock().unwrap().push(event.to_string());
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        self.tag
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::UserInputHook,
            Capability::SystemPromptHook,
            Capability::ToolCallHook,
            Capability::ToolResultHook,
            Capability::ProvideTools,
            Capability::ToolStart,
            Capability::ToolEnd,
            Capability::RunEnd,
        ]
    }

    fn fork(&self) -> Arc<dyn Plugin> {
        RecordingPlugin::new(self.tag)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn hook_user_input(&self, text: &str) -> Result<Option<String>> {
        self.note("user_input");
        Ok(Some(format!("{text}+{}", self.tag)))
    }

    async fn hook_system_prompt(&self, prompt: &str) -> Result<Option<String>> {
        self.note("system_prompt");
        Ok(Some(format!("{prompt} [{}]", self.tag)))
    }

    async fn hook_tool_call(
        &self,
        _tool_name: &str,
        arguments: &Value,
    ) -> Result<Option<ToolCallAdjustment>> {
        self.note("tool_call");
        let mut args = arguments.clone();
        args[self.tag] = serde_json::json!(true);
        Ok(Some(ToolCallAdjustment::rewrite_arguments(args)))
    }

    async fn hook_tool_result(
        &self,
        _tool_name: &str,
        result: &ToolResult,
    ) -> Result<Option<ToolResult>> {
        self.note("tool_result");
        Ok(Some(ToolResult::ok(format!(
            "{}|{}",
            result.text(),
            self.tag
        ))))
    }

    fn provide_tools(&self) -> Vec<ProvidedTool> {
        let tag = self.tag;
        vec![ProvidedTool {
            name: format!("tool_from_{tag}"),
            description: format!("contributed by {tag}"),
            parameters: JsonSchema::empty_object(),
            access: AccessLevel::Read,
            handler: Arc::new(move |_args| Box::pin(async move { ToolResult::ok(tag) })),
        }]
    }

    async fn on_tool_start(&self, _tool_name: &str, _arguments: &Value) -> Result<()> {
        self.note("tool_start");
        Ok(())
    }

    async fn on_tool_end(&self, _tool_name: &str, _result: &ToolResult) -> Result<()> {
        self.note("tool_end");
        Ok(())
    }
}

#[tokio::test]
async fn behavioral_pipelines_fold_in_registration_order() {
    let first = RecordingPlugin::new("a");
    let second = RecordingPlugin::new("b");
    let runner = EventRunner::new(vec![first, second]);

    assert_eq!(runner.user_input("x".to_string()).await.unwrap(), "x+a+b");
    assert_eq!(
        runner.system_prompt("base".to_string()).await.unwrap(),
        "base [a] [b]"
    );

    let decision = runner
        .tool_call("calc".to_string(), serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(decision.arguments["a"], serde_json::json!(true));
    assert_eq!(decision.arguments["b"], serde_json::json!(true));
    assert!(decision.skip.is_none());

    let result = runner
        .tool_result("calc", ToolResult::ok("r"))
        .await
        .unwrap();
    assert_eq!(result.text(), "r|a|b");
}

#[tokio::test]
async fn provided_tools_are_unioned_across_plugins() {
    let runner = EventRunner::new(vec![RecordingPlugin::new("a"), RecordingPlugin::new("b")]);
    let tools = runner.provide_tools();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["tool_from_a", "tool_from_b"]);

    let result = (tools[0].handler)(serde_json::json!({})).await;
    assert_eq!(result.text(), "a");
}

#[tokio::test]
async fn callbacks_reach_every_subscriber() {
    let first = RecordingPlugin::new("a");
    let first_handle = Arc::clone(&first);
    let second = RecordingPlugin::new("b");
    let second_handle = Arc::clone(&second);
    let runner = EventRunner::new(vec![first, second]);

    runner.tool_start("t", &serde_json::json!({})).await;
    runner.tool_end("t", &ToolResult::ok("done")).await;

    for handle in [first_handle, second_handle] {
        let log = handle.log.lock().unwrap().clone();
        assert!(log.contains(&"tool_start".to_string()));
        assert!(log.contains(&"tool_end".to_string()));
    }
}

#[tokio::test]
async fn undeclared_capabilities_are_never_dispatched() {
    struct Undeclared {
        hits: Mutex<u32>,
    }

    #[async_trait]
    impl Plugin for Undeclared {
        fn name(&self) -> &str {
            "undeclared"
        }

        // Declares nothing, overrides something anyway.
        fn capabilities(&self) -> &'static [Capability] {
            &[]
        }

        fn fork(&self) -> Arc<dyn Plugin> {
            Arc::new(Undeclared {
                hits: Mutex::new(0),
            })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn hook_user_input(&self, _text: &str) -> Result<Option<String>> {
            *self.hits.lock().unwrap() += 1;
            Ok(Some("tampered".to_string()))
        }
    }

    let plugin = Arc::new(Undeclared {
        hits: Mutex::new(0),
    });
    let handle = Arc::clone(&plugin);
    let runner = EventRunner::new(vec![plugin]);

    let out = runner.user_input("untouched".to_string()).await.unwrap();
    assert_eq!(out, "untouched");
    assert_eq!(*handle.hits.lock().unwrap(), 0);
}
