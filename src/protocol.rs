// Messages exchanged between a panel and the UI attached to it.
//
// Every message travels as `{"type": "...", "value": ...}` with camelCase tags.

use serde::{Deserialize, Serialize};

/// A proposed whole-file replacement extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEditProposal {
    /// Relative to a workspace root, or absolute
    pub file_path: String,
    /// Entire new contents of the file
    pub content: String,
}

/// 0-based, inclusive line range of an editor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSelection {
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDocumentRequest {
    pub path: String,
    #[serde(default)]
    pub language_id: Option<String>,
}

/// An unsaved buffer with no file behind it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UntitledDocumentRequest {
    pub language_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEditorRequest {
    pub path: String,
    #[serde(default)]
    pub selection: Option<LineSelection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum InboundMessage {
    UserMessage(String),
    InsertCommand(String),
    ApplyEdit(FileEditProposal),
    RejectEdit,
    Attach,
    OpenDocument(OpenDocumentRequest),
    OpenUntitled(UntitledDocumentRequest),
    CloseDocument(String),
    SetActiveEditor(ActiveEditorRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AiResponse {
    Commands {
        message: String,
        commands: Vec<String>,
    },
    Analysis {
        message: String,
        analysis: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        commands: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        edits: Vec<FileEditProposal>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditApplied {
    pub file_path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum OutboundMessage {
    AiResponse(AiResponse),
    EditApplied(EditApplied),
}

impl InboundMessage {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        serde_json::from_str(line).map_err(|e| anyhow::anyhow!("Invalid message '{}': {}", line, e))
    }
}

impl OutboundMessage {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
