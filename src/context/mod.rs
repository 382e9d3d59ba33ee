// Workspace snapshot assembled fresh for every user message.

pub mod tree;
pub mod vcs;

use std::fmt;
use std::fs;
use std::time::SystemTime;

use tracing::debug;

use crate::workspace::Workspace;
use vcs::VcsProbe;

pub const MAX_OPEN_FILES: usize = 5;
pub const PREVIEW_LINES: usize = 50;
pub const MAX_RECENT_FILES: usize = 10;

#[derive(Debug, Clone)]
pub struct Section {
    pub title: &'static str,
    pub body: String,
}

/// Ordered, labelled sections of workspace state. Absent sections are skipped.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceSnapshot {
    pub sections: Vec<Section>,
}

impl WorkspaceSnapshot {
    fn push(&mut self, title: &'static str, body: Option<String>) {
        if let Some(body) = body {
            self.sections.push(Section { title, body });
        }
    }

    #[cfg(test)]
    pub fn section(&self, title: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.body.as_str())
    }
}

impl fmt::Display for WorkspaceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "=== {} ===", section.title)?;
            writeln!(f, "{}", section.body)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

pub const FOLDERS: &str = "WORKSPACE FOLDERS";
pub const OPEN_FILES: &str = "OPEN FILES";
pub const ACTIVE_FILE: &str = "CURRENTLY ACTIVE FILE";
pub const FILE_STRUCTURE: &str = "WORKSPACE FILE STRUCTURE";
pub const GIT_STATUS: &str = "GIT STATUS";
pub const RECENT_FILES: &str = "RECENTLY MODIFIED FILES";

pub struct ContextAggregator<'a> {
    workspace: &'a dyn Workspace,
    vcs: &'a dyn VcsProbe,
}

impl<'a> ContextAggregator<'a> {
    pub fn new(workspace: &'a dyn Workspace, vcs: &'a dyn VcsProbe) -> Self {
        Self { workspace, vcs }
    }

    pub async fn gather(&self) -> WorkspaceSnapshot {
        let mut snapshot = WorkspaceSnapshot::default();
        snapshot.push(FOLDERS, self.folders());
        snapshot.push(OPEN_FILES, self.open_files());
        snapshot.push(ACTIVE_FILE, self.active_file());
        snapshot.push(FILE_STRUCTURE, self.file_structure());
        snapshot.push(GIT_STATUS, self.git_status().await);
        snapshot.push(RECENT_FILES, self.recent_files());

        debug!(
            "Gathered {} context sections: {:?}",
            snapshot.sections.len(),
            snapshot.sections.iter().map(|s| s.title).collect::<Vec<_>>()
        );
        snapshot
    }

    fn folders(&self) -> Option<String> {
        let folders = self.workspace.folders();
        if folders.is_empty() {
            return None;
        }
        let lines: Vec<String> = folders
            .iter()
            .enumerate()
            .map(|(i, f)| format!("Folder {}: {} ({})", i + 1, f.name, f.path.display()))
            .collect();
        Some(lines.join("\n"))
    }

    fn open_files(&self) -> Option<String> {
        let mut lines = Vec::new();
        for doc in self.workspace.text_documents().iter().take(MAX_OPEN_FILES) {
            if doc.is_untitled {
                lines.push(format!("[Untitled] - Language: {}", doc.language_id));
                continue;
            }
            if let Some(error) = &doc.load_error {
                lines.push(format!("File: {}", doc.file_name()));
                lines.push(format!("Path: {}", doc.path.display()));
                lines.push(format!("Error: {}", error));
                lines.push(String::new());
                continue;
            }
            let line_count = doc.line_count();
            let preview_lines = PREVIEW_LINES.min(line_count);
            lines.push(format!("File: {}", doc.file_name()));
            lines.push(format!("Path: {}", doc.path.display()));
            lines.push(format!("Language: {}", doc.language_id));
            lines.push(format!("Lines: {}", line_count));
            lines.push(format!("Preview (first {} lines):", preview_lines));
            lines.push("```".to_string());
            lines.push(doc.preview(preview_lines));
            lines.push("```".to_string());
            lines.push(String::new());
        }

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    fn active_file(&self) -> Option<String> {
        let editor = self.workspace.active_editor()?;
        let doc = &editor.document;
        let mut lines = vec![
            format!("File: {}", doc.file_name()),
            format!("Path: {}", doc.path.display()),
        ];
        if let Some(error) = &doc.load_error {
            lines.push(format!("Error: {}", error));
            return Some(lines.join("\n"));
        }
        lines.push(format!("Language: {}", doc.language_id));
        lines.push(format!("Line count: {}", doc.line_count()));

        if let Some((selection, text)) = editor.selected_lines() {
            lines.push(format!(
                "Selected lines: {}-{}",
                selection.start_line + 1,
                selection.end_line + 1
            ));
            // Line numbers alone still tell the generator where the cursor is
            if !text.trim().is_empty() {
                lines.push(format!("Selected text:\n{}", text));
            }
        }
        Some(lines.join("\n"))
    }

    fn file_structure(&self) -> Option<String> {
        let folders = self.workspace.folders();
        let folder = folders.first()?;
        let mut lines = vec![format!("Root: {}", folder.name)];
        let tree = tree::render_tree(&folder.path);
        if !tree.is_empty() {
            lines.push(tree);
        }
        Some(lines.join("\n"))
    }

    async fn git_status(&self) -> Option<String> {
        let folders = self.workspace.folders();
        let folder = folders.first()?;
        Some(vcs::describe(self.vcs, &folder.path).await)
    }

    fn recent_files(&self) -> Option<String> {
        if self.workspace.folders().is_empty() {
            return None;
        }

        let mut docs: Vec<(SystemTime, _)> = self
            .workspace
            .text_documents()
            .into_iter()
            .filter(|doc| !doc.is_untitled)
            .filter_map(|doc| {
                let modified = fs::metadata(&doc.path).and_then(|m| m.modified()).ok()?;
                Some((modified, doc))
            })
            .collect();
        docs.sort_by(|a, b| b.0.cmp(&a.0));

        let lines: Vec<String> = docs
            .iter()
            .take(MAX_RECENT_FILES)
            .map(|(_, doc)| format!("- {} ({})", doc.file_name(), doc.path.display()))
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::vcs::testing::FakeProbe;
    use super::*;
    use crate::protocol::LineSelection;
    use crate::workspace::LocalWorkspace;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn probe() -> FakeProbe {
        FakeProbe {
            branch: Some("main".to_string()),
            status: Some(String::new()),
            remote: None,
        }
    }

    #[tokio::test]
    async fn test_empty_workspace_has_no_sections() {
        let workspace = LocalWorkspace::new(vec![]);
        let probe = probe();
        let snapshot = ContextAggregator::new(&workspace, &probe).gather().await;
        assert!(snapshot.sections.is_empty());
        assert_eq!(snapshot.to_string(), "");
    }

    #[tokio::test]
    async fn test_sections_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("main.rs"), "fn main() {}\n").unwrap();

        let mut workspace = LocalWorkspace::new(vec![root.to_path_buf()]);
        workspace.set_active_editor(Path::new("main.rs"), None).unwrap();

        let probe = probe();
        let snapshot = ContextAggregator::new(&workspace, &probe).gather().await;
        let titles: Vec<&str> = snapshot.sections.iter().map(|s| s.title).collect();
        assert_eq!(
            titles,
            vec![FOLDERS, OPEN_FILES, ACTIVE_FILE, FILE_STRUCTURE, GIT_STATUS, RECENT_FILES]
        );

        let text = snapshot.to_string();
        assert!(text.starts_with("=== WORKSPACE FOLDERS ===\nFolder 1: "));
        assert!(text.contains("\n\n=== OPEN FILES ===\n"));
        assert_eq!(snapshot.section(GIT_STATUS), Some(vcs::NOT_A_REPOSITORY));
        assert!(snapshot
            .section(FILE_STRUCTURE)
            .unwrap()
            .contains("📄 main.rs (13 B)"));
    }

    #[tokio::test]
    async fn test_open_files_limited_and_previewed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut workspace = LocalWorkspace::new(vec![root.to_path_buf()]);

        let long: String = (1..=80).map(|i| format!("line {}\n", i)).collect();
        fs::write(root.join("long.txt"), &long).unwrap();
        workspace.open_document(Path::new("long.txt"), None).unwrap();
        for i in 0..6 {
            let name = format!("f{}.txt", i);
            fs::write(root.join(&name), "x").unwrap();
            workspace.open_document(Path::new(&name), None).unwrap();
        }

        let probe = probe();
        let snapshot = ContextAggregator::new(&workspace, &probe).gather().await;
        let open = snapshot.section(OPEN_FILES).unwrap();

        assert_eq!(open.matches("File: ").count(), MAX_OPEN_FILES);
        assert!(open.contains("Lines: 81"));
        assert!(open.contains("Preview (first 50 lines):"));
        assert!(open.contains("line 50\n```"));
        assert!(!open.contains("line 51"));
        assert!(!open.contains("f4.txt"));
    }

    #[tokio::test]
    async fn test_untitled_documents() {
        let temp_dir = TempDir::new().unwrap();
        let mut workspace = LocalWorkspace::new(vec![temp_dir.path().to_path_buf()]);
        workspace.open_untitled("python", "print(1)");

        let probe = probe();
        let snapshot = ContextAggregator::new(&workspace, &probe).gather().await;
        assert_eq!(
            snapshot.section(OPEN_FILES),
            Some("[Untitled] - Language: python")
        );
        assert!(snapshot.section(RECENT_FILES).is_none());
    }

    #[tokio::test]
    async fn test_active_file_selection() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("lib.rs"), "a\nb\nc\nd\n").unwrap();

        let mut workspace = LocalWorkspace::new(vec![root.to_path_buf()]);
        workspace
            .set_active_editor(
                Path::new("lib.rs"),
                Some(LineSelection { start_line: 1, end_line: 2 }),
            )
            .unwrap();

        let probe = probe();
        let snapshot = ContextAggregator::new(&workspace, &probe).gather().await;
        let active = snapshot.section(ACTIVE_FILE).unwrap();
        assert!(active.contains("Language: rust"));
        assert!(active.contains("Line count: 5"));
        assert!(active.ends_with("Selected lines: 2-3\nSelected text:\nb\nc"));

        workspace.set_active_editor(Path::new("lib.rs"), None).unwrap();
        let snapshot = ContextAggregator::new(&workspace, &probe).gather().await;
        assert!(!snapshot.section(ACTIVE_FILE).unwrap().contains("Selected"));
    }

    #[tokio::test]
    async fn test_blank_selection_keeps_line_numbers() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("lib.rs"), "a\n\n   \nd\n").unwrap();

        let mut workspace = LocalWorkspace::new(vec![root.to_path_buf()]);
        workspace
            .set_active_editor(
                Path::new("lib.rs"),
                Some(LineSelection { start_line: 1, end_line: 2 }),
            )
            .unwrap();

        let probe = probe();
        let snapshot = ContextAggregator::new(&workspace, &probe).gather().await;
        let active = snapshot.section(ACTIVE_FILE).unwrap();
        assert!(active.ends_with("Selected lines: 2-3"));
        assert!(!active.contains("Selected text:"));
    }

    #[tokio::test]
    async fn test_snapshot_reflects_changes_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "old contents").unwrap();

        let mut workspace = LocalWorkspace::new(vec![root.to_path_buf()]);
        workspace.set_active_editor(Path::new("a.txt"), None).unwrap();
        let probe = probe();
        let before = ContextAggregator::new(&workspace, &probe).gather().await;
        assert!(before.section(OPEN_FILES).unwrap().contains("old contents"));

        fs::write(root.join("a.txt"), "new contents\nand more").unwrap();

        let after = ContextAggregator::new(&workspace, &probe).gather().await;
        let open = after.section(OPEN_FILES).unwrap();
        assert!(open.contains("Lines: 2"));
        assert!(open.contains("```\nnew contents\nand more\n```"));
        assert!(!open.contains("old contents"));
        assert!(after.section(ACTIVE_FILE).unwrap().contains("Line count: 2"));
    }

    #[tokio::test]
    async fn test_unreadable_document_becomes_inline_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("gone.rs"), "fn x() {}").unwrap();
        fs::write(root.join("kept.rs"), "fn y() {}").unwrap();

        let mut workspace = LocalWorkspace::new(vec![root.to_path_buf()]);
        workspace.set_active_editor(Path::new("gone.rs"), None).unwrap();
        workspace.open_document(Path::new("kept.rs"), None).unwrap();
        fs::remove_file(root.join("gone.rs")).unwrap();

        let probe = probe();
        let snapshot = ContextAggregator::new(&workspace, &probe).gather().await;
        let open = snapshot.section(OPEN_FILES).unwrap();
        assert!(open.starts_with("File: gone.rs\nPath: "));
        assert!(open.contains("\nError: "));
        assert!(open.contains("File: kept.rs"));
        assert!(open.contains("fn y() {}"));

        let active = snapshot.section(ACTIVE_FILE).unwrap();
        assert!(active.contains("\nError: "));
        assert!(!active.contains("Line count"));
    }

    #[tokio::test]
    async fn test_recent_files_sorted_by_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut workspace = LocalWorkspace::new(vec![root.to_path_buf()]);

        fs::write(root.join("older.txt"), "1").unwrap();
        workspace.open_document(Path::new("older.txt"), None).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        fs::write(root.join("newer.txt"), "2").unwrap();
        workspace.open_document(Path::new("newer.txt"), None).unwrap();

        let probe = probe();
        let snapshot = ContextAggregator::new(&workspace, &probe).gather().await;
        let recent: Vec<&str> = snapshot.section(RECENT_FILES).unwrap().lines().collect();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].starts_with("- newer.txt ("));
        assert!(recent[1].starts_with("- older.txt ("));
    }
}
