//! 工作区（生成代码的落盘目录）
//!
//! Workspace trait 是编排器写文件时依赖的外部协作者；FsWorkspace 绑定根目录，
//! 只接受根目录下的相对路径（拒绝绝对路径与 `..`，并按规范化后的真实路径拦截
//! 指向根目录之外的符号链接），写入时自动创建父目录。

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::core::WorkspaceError;

/// 工作区协作者
pub trait Workspace: Send + Sync {
    fn write_file(&self, name: &str, content: &str) -> Result<(), WorkspaceError>;

    fn file_exists(&self, name: &str) -> bool;

    fn read_file(&self, name: &str) -> Result<String, WorkspaceError>;

    /// 相对路径列表（`/` 分隔，已排序）
    fn list_files(&self) -> Result<Vec<String>, WorkspaceError>;
}

/// 基于本地目录的工作区
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root_dir: PathBuf,
}

impl FsWorkspace {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 校验相对路径并拼到根目录下
    pub fn resolve(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        let trimmed = name.trim().trim_start_matches("./");
        if trimmed.is_empty() {
            return Err(WorkspaceError::PathEscape(name.to_string()));
        }
        let path = Path::new(trimmed);
        let escapes = path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || path.is_absolute() {
            return Err(WorkspaceError::PathEscape(name.to_string()));
        }
        let full = self.root_dir.join(path);
        if !self.stays_inside(&full) {
            return Err(WorkspaceError::PathEscape(name.to_string()));
        }
        Ok(full)
    }

    /// 取根目录内最深的已存在祖先，规范化后必须仍在根目录下
    fn stays_inside(&self, full: &Path) -> bool {
        let root_canon = self
            .root_dir
            .canonicalize()
            .unwrap_or_else(|_| self.root_dir.clone());
        let existing = full
            .ancestors()
            .take_while(|p| p.starts_with(&self.root_dir))
            .find(|p| p.symlink_metadata().is_ok());
        match existing {
            Some(ancestor) => match ancestor.canonicalize() {
                Ok(canonical) => canonical.starts_with(&root_canon),
                // 悬空链接等无法解析的路径
                Err(_) => false,
            },
            None => true,
        }
    }
}

impl Workspace for FsWorkspace {
    fn write_file(&self, name: &str, content: &str) -> Result<(), WorkspaceError> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WorkspaceError::io(name, e))?;
        }
        std::fs::write(&path, content).map_err(|e| WorkspaceError::io(name, e))?;
        tracing::debug!(file = %name, bytes = content.len(), "workspace write");
        Ok(())
    }

    fn file_exists(&self, name: &str) -> bool {
        self.resolve(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn read_file(&self, name: &str) -> Result<String, WorkspaceError> {
        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(WorkspaceError::NotFound(name.to_string()));
        }
        std::fs::read_to_string(&path).map_err(|e| WorkspaceError::io(name, e))
    }

    fn list_files(&self) -> Result<Vec<String>, WorkspaceError> {
        if !self.root_dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root_dir)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            let entry = entry.map_err(|e| WorkspaceError::Io {
                path: self.root_dir.display().to_string(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root_dir) {
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(parts.join("/"));
            }
        }
        files.sort();
        Ok(files)
    }
}
