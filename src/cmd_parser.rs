use regex::Regex;

/// Pull Git/shell commands out of a command-mode response.
///
/// A line qualifies when, trimmed, it starts with `git ` or `$`; a leading `$`
/// and the whitespace after it are dropped. When nothing qualifies the whole
/// response comes back as the single entry, so callers never see an empty list.
pub fn extract_commands(response: &str) -> Vec<String> {
    let commands: Vec<String> = response
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("git ") || line.starts_with('$'))
        .map(strip_prompt)
        .collect();

    if commands.is_empty() {
        vec![response.to_string()]
    } else {
        commands
    }
}

fn strip_prompt(line: &str) -> String {
    match line.strip_prefix('$') {
        Some(rest) => rest.trim_start().to_string(),
        None => line.to_string(),
    }
}

fn shell_fence() -> Regex {
    Regex::new(r"^```(?:bash|sh|shell|console)\s*$").unwrap()
}

pub fn contains_command_blocks(response: &str) -> bool {
    let fence = shell_fence();
    response.lines().any(|line| fence.is_match(line.trim()))
}

/// Commands from fenced ```bash / ```sh blocks, one per non-empty, non-comment line.
///
/// An unterminated block runs to the end of the text.
pub fn parse_command_blocks(response: &str) -> Vec<String> {
    let fence = shell_fence();
    let mut commands = Vec::new();
    let mut in_block = false;

    for line in response.lines() {
        let trimmed = line.trim();
        if in_block {
            if trimmed == "```" {
                in_block = false;
            } else if !trimmed.is_empty() && !trimmed.starts_with('#') {
                commands.push(strip_prompt(trimmed));
            }
        } else if fence.is_match(trimmed) {
            in_block = true;
        }
    }

    commands
}
