use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use glob::Pattern;
use tracing::debug;

pub const MAX_DEPTH: usize = 3;
pub const ROOT_ENTRY_CAP: usize = 50;
pub const NESTED_ENTRY_CAP: usize = 20;

const IGNORED_NAMES: &[&str] = &[
    "node_modules",
    ".git",
    ".vscode",
    "dist",
    "out",
    "build",
    ".next",
    ".cache",
    "coverage",
    ".DS_Store",
    ".env",
    ".env.local",
];

const IGNORED_GLOBS: &[&str] = &["*.log"];

fn ignored_patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        IGNORED_GLOBS
            .iter()
            .filter_map(|g| Pattern::new(g).ok())
            .collect()
    })
}

pub fn should_ignore(name: &str) -> bool {
    IGNORED_NAMES.contains(&name) || ignored_patterns().iter().any(|p| p.matches(name))
}

pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

struct Entry {
    name: String,
    is_dir: bool,
}

/// Render the directory tree under `root` as indented lines.
///
/// Directories sort before files, then by name. Each directory lists at most
/// `ROOT_ENTRY_CAP` (top level) or `NESTED_ENTRY_CAP` entries; the overflow is
/// summarised by a `... (<n> more entries)` line. Ignored names are dropped
/// wherever they appear but still count towards the cap.
pub fn render_tree(root: &Path) -> String {
    let mut lines = Vec::new();
    walk(root, 0, &mut lines);
    lines.join("\n")
}

fn walk(dir: &Path, depth: usize, lines: &mut Vec<String>) {
    if depth >= MAX_DEPTH {
        return;
    }
    let indent = "  ".repeat(depth);

    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            debug!("Failed to read {}: {}", dir.display(), e);
            lines.push(format!("{}Error: {}", indent, e));
            return;
        }
    };

    let mut entries = Vec::new();
    for entry in read {
        match entry {
            Ok(entry) => entries.push(Entry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: entry.file_type().map(|t| t.is_dir()).unwrap_or(false),
            }),
            Err(e) => lines.push(format!("{}Error: {}", indent, e)),
        }
    }

    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    let cap = if depth == 0 { ROOT_ENTRY_CAP } else { NESTED_ENTRY_CAP };

    for entry in entries.iter().take(cap) {
        if should_ignore(&entry.name) {
            continue;
        }
        let full_path = dir.join(&entry.name);

        if entry.is_dir {
            lines.push(format!("{}📁 {}/", indent, entry.name));
            if depth + 1 < MAX_DEPTH {
                walk(&full_path, depth + 1, lines);
            }
        } else {
            match fs::metadata(&full_path) {
                Ok(meta) => lines.push(format!(
                    "{}📄 {} ({})",
                    indent,
                    entry.name,
                    format_file_size(meta.len())
                )),
                Err(e) => lines.push(format!("{}Error: {}", indent, e)),
            }
        }
    }

    if entries.len() > cap {
        lines.push(format!("{}... ({} more entries)", indent, entries.len() - cap));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }

    #[test]
    fn test_should_ignore() {
        assert!(should_ignore("node_modules"));
        assert!(should_ignore(".git"));
        assert!(should_ignore("npm-debug.log"));
        assert!(should_ignore(".env.local"));
        assert!(!should_ignore("catalog"));
        assert!(!should_ignore("src"));
        assert!(!should_ignore(".gitignore"));
    }

    #[test]
    fn test_dirs_sort_before_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("b.txt"), "hi").unwrap();
        fs::write(root.join("a.txt"), "").unwrap();
        fs::create_dir(root.join("zeta")).unwrap();
        fs::create_dir(root.join("alpha")).unwrap();

        let tree = render_tree(root);
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(
            lines,
            vec!["📁 alpha/", "📁 zeta/", "📄 a.txt (0 B)", "📄 b.txt (2 B)"]
        );
    }

    #[test]
    fn test_ignored_entries_absent_at_any_depth() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("src/.git")).unwrap();
        fs::create_dir_all(root.join("src/nested/node_modules")).unwrap();
        fs::write(root.join("src/nested/trace.log"), "x").unwrap();
        fs::write(root.join("src/lib.rs"), "x").unwrap();

        let tree = render_tree(root);
        assert!(!tree.contains("node_modules"));
        assert!(!tree.contains(".git"));
        assert!(!tree.contains("trace.log"));
        assert!(tree.contains("  📁 nested/"));
        assert!(tree.contains("  📄 lib.rs (1 B)"));
    }

    #[test]
    fn test_depth_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b/c/d")).unwrap();
        fs::write(root.join("a/b/c/deep.txt"), "x").unwrap();

        let tree = render_tree(root);
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines, vec!["📁 a/", "  📁 b/", "    📁 c/"]);
    }

    #[test]
    fn test_root_cap_marker() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for i in 0..(ROOT_ENTRY_CAP + 7) {
            fs::write(root.join(format!("file{:03}.txt", i)), "").unwrap();
        }

        let tree = render_tree(root);
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines.len(), ROOT_ENTRY_CAP + 1);
        assert_eq!(lines[ROOT_ENTRY_CAP], "... (7 more entries)");
        assert!(!tree.contains("file050.txt"));
    }

    #[test]
    fn test_nested_cap_marker_is_indented() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("many")).unwrap();
        for i in 0..(NESTED_ENTRY_CAP + 3) {
            fs::write(root.join("many").join(format!("f{:02}", i)), "").unwrap();
        }

        let tree = render_tree(root);
        let file_lines = tree.lines().filter(|l| l.starts_with("  📄")).count();
        assert_eq!(file_lines, NESTED_ENTRY_CAP);
        assert!(tree.ends_with("  ... (3 more entries)"));
    }

    #[test]
    fn test_ignored_entries_count_towards_cap() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("pkg")).unwrap();
        fs::create_dir(root.join("pkg/node_modules")).unwrap();
        for i in 0..NESTED_ENTRY_CAP {
            fs::write(root.join("pkg").join(format!("f{:02}", i)), "").unwrap();
        }

        let tree = render_tree(root);
        let file_lines = tree.lines().filter(|l| l.starts_with("  📄")).count();
        assert_eq!(file_lines, NESTED_ENTRY_CAP - 1);
        assert!(tree.ends_with("  ... (1 more entries)"));
    }

    #[test]
    fn test_unreadable_root_reports_inline_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone");
        let tree = render_tree(&missing);
        assert!(tree.starts_with("Error: "));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_keeps_siblings() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("locked")).unwrap();
        fs::write(root.join("locked/secret.txt"), "x").unwrap();
        fs::create_dir(root.join("open")).unwrap();
        fs::write(root.join("open/lib.rs"), "x").unwrap();
        fs::write(root.join("z.txt"), "hi").unwrap();

        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Permission bits don't stop a privileged user
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let tree = render_tree(root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "📁 locked/");
        assert!(lines[1].starts_with("  Error: "));
        assert_eq!(&lines[2..], ["📁 open/", "  📄 lib.rs (1 B)", "📄 z.txt (2 B)"]);
        assert!(!tree.contains("secret.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_link_reports_inline_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("src")).unwrap();
        fs::write(root.join("src/a.rs"), "x").unwrap();
        std::os::unix::fs::symlink(root.join("nowhere"), root.join("src/b.rs")).unwrap();

        let tree = render_tree(root);
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "📁 src/");
        assert_eq!(lines[1], "  📄 a.rs (1 B)");
        assert!(lines[2].starts_with("  Error: "));
    }
}
