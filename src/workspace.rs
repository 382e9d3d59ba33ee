use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::protocol::LineSelection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolder {
    pub name: String,
    pub path: PathBuf,
}

impl WorkspaceFolder {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

#[derive(Debug, Clone)]
pub struct TextDocument {
    pub path: PathBuf,
    pub language_id: String,
    pub text: String,
    pub is_untitled: bool,
    /// Set when the file behind the document could not be re-read
    pub load_error: Option<String>,
}

impl TextDocument {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Editors count a trailing newline as opening one more (empty) line.
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    pub fn preview(&self, max_lines: usize) -> String {
        self.text.split('\n').take(max_lines).collect::<Vec<_>>().join("\n")
    }

    /// Text covered by a selection, or `None` when the range is out of bounds.
    pub fn lines_text(&self, selection: &LineSelection) -> Option<String> {
        if selection.start_line > selection.end_line || selection.end_line >= self.line_count() {
            return None;
        }
        let lines: Vec<&str> = self.text.split('\n').collect();
        Some(lines[selection.start_line..=selection.end_line].join("\n"))
    }
}

#[derive(Debug, Clone)]
pub struct ActiveEditor {
    pub document: TextDocument,
    pub selection: Option<LineSelection>,
}

impl ActiveEditor {
    /// The selection together with the text it covers, when it lies inside the document.
    pub fn selected_lines(&self) -> Option<(LineSelection, String)> {
        let selection = self.selection?;
        let text = self.document.lines_text(&selection)?;
        Some((selection, text))
    }
}

/// Editor state and document operations a panel needs from its host.
pub trait Workspace: Send {
    fn folders(&self) -> Vec<WorkspaceFolder>;

    /// Open documents in the order they were opened.
    fn text_documents(&self) -> Vec<TextDocument>;

    fn active_editor(&self) -> Option<ActiveEditor>;

    /// Replace the entire content of `path`. `Ok(false)` means the host refused the edit.
    fn replace_document(&mut self, path: &Path, content: &str) -> Result<bool>;

    fn show_document(&mut self, path: &Path) -> Result<()>;
}

/// A workspace backed directly by the local filesystem.
pub struct LocalWorkspace {
    folders: Vec<WorkspaceFolder>,
    documents: Vec<TextDocument>,
    active: Option<(PathBuf, Option<LineSelection>)>,
}

impl LocalWorkspace {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            folders: roots.into_iter().map(WorkspaceFolder::new).collect(),
            documents: Vec::new(),
            active: None,
        }
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        match self.folders.first() {
            Some(folder) => Ok(folder.path.join(path)),
            None => Ok(std::env::current_dir()?.join(path)),
        }
    }

    /// Open (or refresh) a document. Relative paths are taken from the first root.
    pub fn open_document(&mut self, path: &Path, language_id: Option<String>) -> Result<()> {
        let path = self.absolute(path)?;
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let language_id = language_id.unwrap_or_else(|| language_for(&path).to_string());

        if let Some(doc) = self.documents.iter_mut().find(|d| d.path == path) {
            doc.text = text;
            doc.language_id = language_id;
        } else {
            debug!("Opened document {}", path.display());
            self.documents.push(TextDocument {
                path,
                language_id,
                text,
                is_untitled: false,
                load_error: None,
            });
        }
        Ok(())
    }

    pub fn open_untitled(&mut self, language_id: &str, text: &str) {
        let n = self.documents.iter().filter(|d| d.is_untitled).count() + 1;
        self.documents.push(TextDocument {
            path: PathBuf::from(format!("Untitled-{}", n)),
            language_id: language_id.to_string(),
            text: text.to_string(),
            is_untitled: true,
            load_error: None,
        });
    }

    pub fn close_document(&mut self, path: &Path) -> Result<bool> {
        let path = self.absolute(path)?;
        let before = self.documents.len();
        self.documents.retain(|d| d.path != path);
        if matches!(&self.active, Some((active, _)) if *active == path) {
            self.active = None;
        }
        Ok(self.documents.len() != before)
    }

    pub fn set_active_editor(&mut self, path: &Path, selection: Option<LineSelection>) -> Result<()> {
        let path = self.absolute(path)?;
        if !self.documents.iter().any(|d| d.path == path) {
            self.open_document(&path, None)?;
        }
        self.active = Some((path, selection));
        Ok(())
    }

    /// Documents backed by a file are re-read on every call, so a snapshot
    /// never shows text from before a checkout or an outside edit.
    fn current(&self, doc: &TextDocument) -> TextDocument {
        let mut doc = doc.clone();
        if doc.is_untitled {
            return doc;
        }
        match fs::read_to_string(&doc.path) {
            Ok(text) => doc.text = text,
            Err(e) => {
                debug!("Failed to re-read {}: {}", doc.path.display(), e);
                doc.text.clear();
                doc.load_error = Some(e.to_string());
            }
        }
        doc
    }
}

impl Workspace for LocalWorkspace {
    fn folders(&self) -> Vec<WorkspaceFolder> {
        self.folders.clone()
    }

    fn text_documents(&self) -> Vec<TextDocument> {
        self.documents.iter().map(|doc| self.current(doc)).collect()
    }

    fn active_editor(&self) -> Option<ActiveEditor> {
        let (path, selection) = self.active.as_ref()?;
        let document = self.current(self.documents.iter().find(|d| &d.path == path)?);
        Some(ActiveEditor {
            document,
            selection: *selection,
        })
    }

    fn replace_document(&mut self, path: &Path, content: &str) -> Result<bool> {
        if path.is_dir() {
            return Ok(false);
        }

        // Write through symlinks: the link stays, the file it points at changes
        let target = if path.exists() {
            fs::canonicalize(path)
                .with_context(|| format!("Failed to resolve {}", path.display()))?
        } else {
            path.to_path_buf()
        };

        let dir = target
            .parent()
            .ok_or_else(|| anyhow::anyhow!("No parent directory for {}", target.display()))?;
        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to stage edit in {}", dir.display()))?;
        staged
            .write_all(content.as_bytes())
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        // Temp files are created 0600; keep whatever the target had
        if let Ok(metadata) = fs::metadata(&target) {
            staged
                .as_file()
                .set_permissions(metadata.permissions())
                .with_context(|| format!("Failed to copy permissions of {}", target.display()))?;
        }

        staged
            .persist(&target)
            .map_err(|e| anyhow::anyhow!("Failed to write file '{}': {}", target.display(), e.error))?;
        debug!("Replaced {}", target.display());
        Ok(true)
    }

    fn show_document(&mut self, path: &Path) -> Result<()> {
        self.set_active_editor(path, None)?;
        info!("Showing {}", path.display());
        Ok(())
    }
}

pub fn language_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "rs" => "rust",
        "ts" => "typescript",
        "tsx" => "typescriptreact",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "sh" | "bash" => "shellscript",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        "html" => "html",
        "css" => "css",
        _ => "plaintext",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_line_count_and_preview() {
        let doc = TextDocument {
            path: PathBuf::from("/p/a.txt"),
            language_id: "plaintext".to_string(),
            text: "one\ntwo\nthree\n".to_string(),
            is_untitled: false,
            load_error: None,
        };
        assert_eq!(doc.line_count(), 4);
        assert_eq!(doc.preview(2), "one\ntwo");
        assert_eq!(doc.file_name(), "a.txt");
    }

    #[test]
    fn test_selected_lines() {
        let doc = TextDocument {
            path: PathBuf::from("/p/a.rs"),
            language_id: "rust".to_string(),
            text: "fn a() {}\n\nfn b() {}".to_string(),
            is_untitled: false,
            load_error: None,
        };
        let editor = ActiveEditor {
            document: doc.clone(),
            selection: Some(LineSelection { start_line: 0, end_line: 0 }),
        };
        assert_eq!(
            editor.selected_lines(),
            Some((LineSelection { start_line: 0, end_line: 0 }, "fn a() {}".to_string()))
        );

        // A blank line is still a selection; callers decide whether to show its text
        let blank = ActiveEditor {
            document: doc.clone(),
            selection: Some(LineSelection { start_line: 1, end_line: 1 }),
        };
        assert_eq!(
            blank.selected_lines(),
            Some((LineSelection { start_line: 1, end_line: 1 }, String::new()))
        );

        let out_of_range = ActiveEditor {
            document: doc,
            selection: Some(LineSelection { start_line: 1, end_line: 9 }),
        };
        assert_eq!(out_of_range.selected_lines(), None);
    }

    #[test]
    fn test_documents_are_reread_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, "old contents").unwrap();

        let mut workspace = LocalWorkspace::new(vec![temp_dir.path().to_path_buf()]);
        workspace.set_active_editor(Path::new("a.txt"), None).unwrap();

        // Changed behind the workspace's back, e.g. by a checkout
        fs::write(&path, "new contents\nsecond line").unwrap();

        let docs = workspace.text_documents();
        assert_eq!(docs[0].text, "new contents\nsecond line");
        assert_eq!(docs[0].line_count(), 2);
        assert_eq!(
            workspace.active_editor().unwrap().document.text,
            "new contents\nsecond line"
        );
    }

    #[test]
    fn test_vanished_file_reports_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gone.txt");
        fs::write(&path, "here for now").unwrap();

        let mut workspace = LocalWorkspace::new(vec![temp_dir.path().to_path_buf()]);
        workspace.open_document(&path, None).unwrap();
        workspace.open_untitled("markdown", "# notes");
        fs::remove_file(&path).unwrap();

        let docs = workspace.text_documents();
        assert!(docs[0].load_error.is_some());
        assert!(docs[0].text.is_empty());
        assert!(docs[1].load_error.is_none());
        assert_eq!(docs[1].text, "# notes");
    }

    #[test]
    fn test_open_and_close_documents() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let mut workspace = LocalWorkspace::new(vec![temp_dir.path().to_path_buf()]);
        workspace.open_document(Path::new("main.rs"), None).unwrap();
        workspace.set_active_editor(Path::new("main.rs"), None).unwrap();

        let docs = workspace.text_documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].language_id, "rust");
        assert_eq!(docs[0].path, temp_dir.path().join("main.rs"));
        assert!(workspace.active_editor().is_some());

        assert!(workspace.close_document(Path::new("main.rs")).unwrap());
        assert!(workspace.text_documents().is_empty());
        assert!(workspace.active_editor().is_none());
    }

    #[test]
    fn test_replace_document_overwrites_whole_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.md");
        fs::write(&path, "old line 1\nold line 2\n").unwrap();

        let mut workspace = LocalWorkspace::new(vec![temp_dir.path().to_path_buf()]);
        workspace.open_document(&path, None).unwrap();

        assert!(workspace.replace_document(&path, "fresh").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh");
        assert_eq!(workspace.text_documents()[0].text, "fresh");
    }

    #[test]
    fn test_replace_document_refuses_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut workspace = LocalWorkspace::new(vec![temp_dir.path().to_path_buf()]);
        assert!(!workspace.replace_document(temp_dir.path(), "x").unwrap());
    }

    #[test]
    fn test_language_for() {
        assert_eq!(language_for(Path::new("a.ts")), "typescript");
        assert_eq!(language_for(Path::new("Makefile")), "plaintext");
    }
}
