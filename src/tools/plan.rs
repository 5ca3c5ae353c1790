//! 规划类工具：propose_plan（项目计划，文件标记 PLANNED）与 ask_user_for_clarification（向用户提问）
//!
//! 这两个工具不触碰工作区，只把模型的结构化输出渲染成聊天消息。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{FileStatus, FileUpdate, Sender};
use crate::tools::registry::parse_args;
use crate::tools::{schema_value, Tool, ToolFailure, ToolOutput};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlannedFile {
    pub filename: String,
    pub description: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProposePlanArgs {
    pub project_name: String,
    pub language: String,
    pub description: String,
    #[serde(default)]
    pub files: Vec<PlannedFile>,
    /// 实施步骤，按顺序
    #[serde(default)]
    pub steps: Vec<String>,
}

pub struct ProposePlanTool;

#[async_trait]
impl Tool for ProposePlanTool {
    fn name(&self) -> &str {
        "propose_plan"
    }

    fn description(&self) -> &str {
        "Propose a structured plan for the requested project: the files to create, \
         their purpose, and a step-by-step approach."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<ProposePlanArgs>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolFailure> {
        let plan: ProposePlanArgs = parse_args(self.name(), args)?;
        tracing::info!(project = %plan.project_name, files = plan.files.len(), "propose_plan");

        let mut output = ToolOutput::new(format!(
            "Plan for {} ({}) recorded: {} files, {} steps",
            plan.project_name,
            plan.language,
            plan.files.len(),
            plan.steps.len()
        ))
        .with_chat(
            Sender::Ai,
            format!(
                "I've analyzed your request and created a plan for the {} project:",
                plan.project_name
            ),
        )
        .with_chat(Sender::Ai, format!("**Project Description**: {}", plan.description));

        if !plan.files.is_empty() {
            output = output.with_chat(Sender::Ai, "**Files to create**:");
            for file in &plan.files {
                output = output
                    .with_chat(Sender::Ai, format!("- {}: {}", file.filename, file.description))
                    .with_file(
                        FileUpdate::new(&file.filename, FileStatus::Planned)
                            .with_description(&file.description),
                    );
            }
        }
        if !plan.steps.is_empty() {
            output = output.with_chat(Sender::Ai, "**Implementation Steps**:");
            for (i, step) in plan.steps.iter().enumerate() {
                output = output.with_chat(Sender::Ai, format!("{}. {}", i + 1, step));
            }
        }

        Ok(output
            .with_chat(
                Sender::Ai,
                "Does this plan look good? Approve it or tell me what to adjust.",
            )
            .with_status("AI has proposed a plan. Please review and respond."))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClarificationArgs {
    /// 需要澄清的背景
    pub context: String,
    #[serde(default)]
    pub questions: Vec<String>,
}

pub struct AskClarificationTool;

#[async_trait]
impl Tool for AskClarificationTool {
    fn name(&self) -> &str {
        "ask_user_for_clarification"
    }

    fn description(&self) -> &str {
        "Ask the user follow-up questions when the request is ambiguous."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<ClarificationArgs>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolFailure> {
        let args: ClarificationArgs = parse_args(self.name(), args)?;
        let mut output = ToolOutput::new(format!(
            "Asked the user {} question(s)",
            args.questions.len()
        ))
        .with_chat(Sender::Ai, "I need some more information before I continue:")
        .with_chat(Sender::Ai, args.context);
        for question in &args.questions {
            output = output.with_chat(Sender::Ai, format!("- {}", question));
        }
        Ok(output.with_status("AI needs clarification. Please answer the questions."))
    }
}
