//! 代码上下文：为用户 prompt 附加当前文件、光标附近代码与相关文件
//!
//! ContextProvider 是编排器的可选协作者；WorkspaceContextProvider 直接从工作区读取文件，
//! 按 ContextOptions 的上限截取片段并渲染成 "Relevant code context" 段落。

use std::sync::Arc;

use thiserror::Error;

use crate::core::WorkspaceError;
use crate::tools::Workspace;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("Context unavailable: {0}")]
    Unavailable(String),
}

/// 编辑器焦点：当前文件、光标（1 起始行号）、选中文本、打开的文件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextRequest {
    pub file_path: String,
    pub line: usize,
    pub column: usize,
    pub selection: String,
    pub visible_files: Vec<String>,
}

impl ContextRequest {
    pub fn at(file_path: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file_path: file_path.into(),
            line,
            column,
            ..Self::default()
        }
    }

    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = selection.into();
        self
    }

    pub fn with_visible_files(mut self, files: Vec<String>) -> Self {
        self.visible_files = files;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub max_snippets: usize,
    pub max_snippet_lines: usize,
    pub max_related_files: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_snippets: 5,
            max_snippet_lines: 40,
            max_related_files: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnippet {
    pub file_path: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeContext {
    pub current_file: String,
    pub cursor_line: usize,
    pub cursor_column: usize,
    pub selected_text: String,
    pub visible_files: Vec<String>,
    pub snippets: Vec<ContextSnippet>,
    pub related_files: Vec<String>,
}

impl CodeContext {
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty() && self.selected_text.is_empty() && self.related_files.is_empty()
    }
}

/// 上下文协作者
pub trait ContextProvider: Send + Sync {
    fn get_context(
        &self,
        request: &ContextRequest,
        options: &ContextOptions,
    ) -> Result<CodeContext, ContextError>;

    fn generate_contextual_prompt(
        &self,
        prompt: &str,
        context: &CodeContext,
        options: &ContextOptions,
    ) -> Result<String, ContextError>;
}

/// 基于工作区文件的上下文提供者
pub struct WorkspaceContextProvider {
    workspace: Arc<dyn Workspace>,
}

impl WorkspaceContextProvider {
    pub fn new(workspace: Arc<dyn Workspace>) -> Self {
        Self { workspace }
    }

    /// 以 center 为中心截取至多 max_lines 行；center 为 0 时从文件开头截取
    fn snippet(
        &self,
        file_path: &str,
        center: usize,
        max_lines: usize,
    ) -> Result<Option<ContextSnippet>, ContextError> {
        let content = self.workspace.read_file(file_path)?;
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() || max_lines == 0 {
            return Ok(None);
        }
        let start = if center == 0 {
            0
        } else {
            center
                .min(lines.len())
                .saturating_sub(1)
                .saturating_sub(max_lines / 2)
        };
        let end = (start + max_lines).min(lines.len());
        Ok(Some(ContextSnippet {
            file_path: file_path.to_string(),
            content: lines[start..end].join("\n"),
            start_line: start + 1,
            end_line: end,
        }))
    }
}

impl ContextProvider for WorkspaceContextProvider {
    fn get_context(
        &self,
        request: &ContextRequest,
        options: &ContextOptions,
    ) -> Result<CodeContext, ContextError> {
        let mut context = CodeContext {
            current_file: request.file_path.clone(),
            cursor_line: request.line,
            cursor_column: request.column,
            selected_text: request.selection.clone(),
            visible_files: request.visible_files.clone(),
            ..CodeContext::default()
        };

        if !request.file_path.is_empty() {
            if let Some(s) =
                self.snippet(&request.file_path, request.line.max(1), options.max_snippet_lines)?
            {
                context.snippets.push(s);
            }
        }
        for file in &request.visible_files {
            if context.snippets.len() >= options.max_snippets {
                break;
            }
            if *file == request.file_path {
                continue;
            }
            // 打开的文件可能尚未落盘
            match self.snippet(file, 0, options.max_snippet_lines) {
                Ok(Some(s)) => context.snippets.push(s),
                Ok(None) => {}
                Err(e) => tracing::debug!(file = %file, error = %e, "skip visible file"),
            }
        }

        context.related_files = self
            .workspace
            .list_files()?
            .into_iter()
            .filter(|f| *f != request.file_path)
            .take(options.max_related_files)
            .collect();
        Ok(context)
    }

    fn generate_contextual_prompt(
        &self,
        prompt: &str,
        context: &CodeContext,
        _options: &ContextOptions,
    ) -> Result<String, ContextError> {
        if context.is_empty() {
            return Ok(prompt.to_string());
        }
        let mut out = format!("{}\n\n## Relevant code context\n", prompt);
        if !context.current_file.is_empty() {
            out.push_str(&format!(
                "Current file: {} (line {}, column {})\n",
                context.current_file, context.cursor_line, context.cursor_column
            ));
        }
        if !context.selected_text.is_empty() {
            out.push_str(&format!("Selected text:\n```\n{}\n```\n", context.selected_text));
        }
        for snippet in &context.snippets {
            out.push_str(&format!(
                "### {} (lines {}-{})\n```\n{}\n```\n",
                snippet.file_path, snippet.start_line, snippet.end_line, snippet.content
            ));
        }
        if !context.related_files.is_empty() {
            out.push_str(&format!(
                "Other project files: {}\n",
                context.related_files.join(", ")
            ));
        }
        Ok(out)
    }
}
