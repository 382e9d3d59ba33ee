use std::ops::Range;

use crate::protocol::FileEditProposal;

const FILE_FENCE: &str = "```file:";
const CLOSE_FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBlock {
    pub proposal: FileEditProposal,
    /// Byte span of the whole fenced block, fences included
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Response text with every edit block cut out
    pub display: String,
    pub edits: Vec<FileEditProposal>,
}

/// Find every ```` ```file:<path> ```` block in one forward pass.
///
/// The path runs from the tag to the end of the opening line; the body runs to
/// the next ```` ``` ````. Blocks with an empty path or no closing fence are not
/// edits and stay in the text.
pub fn scan_edit_blocks(response: &str) -> Vec<EditBlock> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(offset) = response[pos..].find(FILE_FENCE) {
        let open = pos + offset;
        let path_start = open + FILE_FENCE.len();

        let Some(newline) = response[path_start..].find('\n') else {
            break;
        };
        let path_end = path_start + newline;
        let file_path = response[path_start..path_end].trim();
        if file_path.is_empty() {
            pos = path_start;
            continue;
        }

        let body_start = path_end + 1;
        let Some(close) = response[body_start..].find(CLOSE_FENCE) else {
            break;
        };
        let body_end = body_start + close;
        let block_end = body_end + CLOSE_FENCE.len();

        blocks.push(EditBlock {
            proposal: FileEditProposal {
                file_path: file_path.to_string(),
                content: response[body_start..body_end].trim().to_string(),
            },
            span: open..block_end,
        });
        pos = block_end;
    }

    blocks
}

/// Cut the given (sorted, non-overlapping) spans out of `text`.
pub fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

pub fn parse_file_edits(response: &str) -> ParsedResponse {
    let blocks = scan_edit_blocks(response);
    let spans: Vec<Range<usize>> = blocks.iter().map(|b| b.span.clone()).collect();
    ParsedResponse {
        display: remove_spans(response, &spans),
        edits: blocks.into_iter().map(|b| b.proposal).collect(),
    }
}

#[cfg(test)]
pub fn contains_edit_blocks(response: &str) -> bool {
    !scan_edit_blocks(response).is_empty()
}
