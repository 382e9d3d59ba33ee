use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;

/// Which kind of answer a panel asks the generator for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Analyse the request against the workspace snapshot; may propose edits.
    Workspace,
    /// Turn the request into Git commands only.
    Git,
}

impl Default for PromptMode {
    fn default() -> Self {
        PromptMode::Workspace
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkspacePromptConfig {
    /// Must contain `{context}` and `{message}`
    pub template: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitPromptConfig {
    /// Must contain `{message}`
    pub template: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptsConfig {
    pub workspace: WorkspacePromptConfig,
    pub git: GitPromptConfig,
}

const WORKSPACE_TEMPLATE: &str = r#"You are analyzing a code workspace. Here is the current workspace context:

{context}

User request: {message}

Analyze the request in the context of the workspace and provide a detailed, helpful response. Consider the workspace structure, open files, and current state when answering.

If you suggest any commands (git, npm, shell commands, etc.), format them in code blocks with ```bash or ```sh tags so they can be easily executed.

If you need to fix or modify code in a file, format it as:
```file:path/to/file.ext
[complete new file content here]
```

This will allow the user to directly apply the fix to the file. Always include the entire file content, not just the changed lines."#;

const GIT_TEMPLATE: &str = "Convert the following request to Git commands: {message}";

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspacePromptConfig {
                template: WORKSPACE_TEMPLATE.to_string(),
            },
            git: GitPromptConfig {
                template: GIT_TEMPLATE.to_string(),
            },
        }
    }
}

impl PromptsConfig {
    pub fn load() -> Result<Self> {
        // Current directory first, then one level up for runs from target/
        let config_paths = ["prompts.toml", "../prompts.toml"];

        for path in &config_paths {
            if let Ok(content) = fs::read_to_string(path) {
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse prompts.toml from {}", path));
            }
        }

        Ok(Self::default())
    }

    pub fn compose(&self, mode: PromptMode, message: &str, context: &str) -> String {
        match mode {
            PromptMode::Workspace => fill(
                &self.workspace.template,
                &[("{context}", context), ("{message}", message)],
            ),
            PromptMode::Git => fill(&self.git.template, &[("{message}", message)]),
        }
    }
}

/// Substitute placeholders in one left-to-right pass, so placeholder-looking
/// text inside a substituted value is left alone.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|pos| (pos, *key, *value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, key, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + key.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}
