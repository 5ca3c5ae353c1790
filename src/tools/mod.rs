//! 工具箱：工作区、工具注册表与执行器、内置工具（写 / 读 / 列文件、计划、澄清）

pub mod executor;
pub mod plan;
pub mod read_file;
pub mod registry;
pub mod schema;
pub mod workspace;
pub mod write_file;

use std::sync::Arc;

pub use executor::ToolExecutor;
pub use plan::{AskClarificationTool, ProposePlanTool};
pub use read_file::{ListFilesTool, ReadFileTool};
pub use registry::{Tool, ToolFailure, ToolOutput, ToolRegistry};
pub use schema::schema_value;
pub use workspace::{FsWorkspace, Workspace};
pub use write_file::{WriteFileTool, WRITE_FILE_TOOL};

/// 默认工具集：所有内置工具都绑定到同一个工作区
pub fn default_registry(workspace: Arc<dyn Workspace>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ProposePlanTool);
    registry.register(AskClarificationTool);
    registry.register(WriteFileTool::new(workspace.clone()));
    registry.register(ReadFileTool::new(workspace.clone()));
    registry.register(ListFilesTool::new(workspace));
    registry
}
