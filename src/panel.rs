use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::cmd_parser;
use crate::context::vcs::{GitProbe, VcsProbe};
use crate::context::{ContextAggregator, WorkspaceSnapshot};
use crate::edit_parser;
use crate::editor::{ApplyOutcome, Confirm, EditApplicator, TtyConfirm};
use crate::error::GenerateError;
use crate::llm::Generator;
use crate::prompts::{PromptMode, PromptsConfig};
use crate::protocol::{AiResponse, EditApplied, FileEditProposal, InboundMessage, OutboundMessage};
use crate::workspace::LocalWorkspace;

/// Where outbound messages go once a UI is attached.
pub trait MessageSink: Send {
    fn post(&mut self, message: &OutboundMessage) -> Result<()>;
}

/// One JSON document per line on stdout.
pub struct StdoutSink;

impl MessageSink for StdoutSink {
    fn post(&mut self, message: &OutboundMessage) -> Result<()> {
        let line = message.to_json()?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(line.as_bytes())?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
        debug!("Sent: {}", line);
        Ok(())
    }
}

/// Hands messages to an in-process UI.
pub struct ChannelSink(pub UnboundedSender<OutboundMessage>);

impl MessageSink for ChannelSink {
    fn post(&mut self, message: &OutboundMessage) -> Result<()> {
        self.0
            .send(message.clone())
            .map_err(|_| anyhow::anyhow!("UI channel closed"))
    }
}

/// Side channel for user-facing notices that are not part of the conversation.
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}

/// Receives commands the user chose to insert. Commands are never executed.
pub trait Terminal: Send {
    fn send_text(&mut self, text: &str) -> Result<()>;
}

/// Writes to the controlling terminal, falling back to stderr.
pub struct TtyTerminal {
    name: String,
}

impl TtyTerminal {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Terminal for TtyTerminal {
    fn send_text(&mut self, text: &str) -> Result<()> {
        let line = format!("[{}] $ {}\n", self.name, text);
        match OpenOptions::new().write(true).open("/dev/tty") {
            Ok(mut tty) => tty.write_all(line.as_bytes())?,
            Err(_) => std::io::stderr().write_all(line.as_bytes())?,
        }
        Ok(())
    }
}

/// One conversation surface: owns the workspace view, the generator and the
/// queue of messages waiting for a UI.
///
/// Methods take `&mut self`, so a panel can only work on one request at a time.
pub struct Panel {
    mode: PromptMode,
    prompts: PromptsConfig,
    generator: Box<dyn Generator>,
    vcs: Box<dyn VcsProbe>,
    workspace: LocalWorkspace,
    applicator: EditApplicator,
    terminal: Box<dyn Terminal>,
    notifier: Box<dyn Notifier>,
    sink: Option<Box<dyn MessageSink>>,
    pending: VecDeque<OutboundMessage>,
}

impl Panel {
    pub fn new(mode: PromptMode, generator: Box<dyn Generator>, workspace: LocalWorkspace) -> Self {
        Self {
            mode,
            prompts: PromptsConfig::default(),
            generator,
            vcs: Box::new(GitProbe),
            workspace,
            applicator: EditApplicator::new(Box::new(TtyConfirm)),
            terminal: Box::new(TtyTerminal::new("Workspace")),
            notifier: Box::new(LogNotifier),
            sink: None,
            pending: VecDeque::new(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptsConfig) -> Self {
        self.prompts = prompts;
        self
    }

    #[cfg(test)]
    pub fn with_vcs(mut self, vcs: Box<dyn VcsProbe>) -> Self {
        self.vcs = vcs;
        self
    }

    pub fn with_confirm(mut self, confirm: Box<dyn Confirm>) -> Self {
        self.applicator = EditApplicator::new(confirm);
        self
    }

    pub fn with_terminal(mut self, terminal: Box<dyn Terminal>) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PromptMode) {
        self.mode = mode;
    }

    #[cfg(test)]
    pub fn workspace(&self) -> &LocalWorkspace {
        &self.workspace
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Connect a UI and flush everything queued for it, oldest first.
    pub fn attach(&mut self, mut sink: Box<dyn MessageSink>) {
        let queued = self.pending.len();
        while let Some(message) = self.pending.pop_front() {
            if let Err(e) = sink.post(&message) {
                error!("Failed to deliver queued message: {:#}", e);
            }
        }
        if queued > 0 {
            info!("Delivered {} queued message(s)", queued);
        }
        self.sink = Some(sink);
    }

    fn send(&mut self, message: OutboundMessage) {
        match self.sink.as_mut() {
            Some(sink) => {
                if let Err(e) = sink.post(&message) {
                    error!("Failed to deliver message: {:#}", e);
                }
            }
            None => {
                self.pending.push_back(message);
                debug!("UI not attached, {} message(s) queued", self.pending.len());
            }
        }
    }

    pub async fn handle_message(&mut self, message: InboundMessage) -> Result<()> {
        match message {
            InboundMessage::UserMessage(text) => self.handle_user_message(&text).await,
            InboundMessage::InsertCommand(command) => self.insert_command(&command),
            InboundMessage::ApplyEdit(proposal) => self.apply_edit(proposal),
            InboundMessage::RejectEdit => debug!("Edit dismissed by the UI"),
            // The serve loop attaches a sink before dispatching
            InboundMessage::Attach => {}
            InboundMessage::OpenDocument(request) => {
                self.workspace
                    .open_document(Path::new(&request.path), request.language_id)?;
            }
            InboundMessage::OpenUntitled(request) => {
                self.workspace
                    .open_untitled(&request.language_id, &request.text);
            }
            InboundMessage::CloseDocument(path) => {
                if !self.workspace.close_document(Path::new(&path))? {
                    debug!("{} was not open", path);
                }
            }
            InboundMessage::SetActiveEditor(request) => {
                self.workspace
                    .set_active_editor(Path::new(&request.path), request.selection)?;
            }
        }
        Ok(())
    }

    /// Run one generation round and post the result (or a synthetic error result).
    pub async fn handle_user_message(&mut self, message: &str) {
        let what = match self.mode {
            PromptMode::Git => "Git commands",
            PromptMode::Workspace => "workspace analysis",
        };
        info!("Generating {} for: {}", what, message);

        let response = match self.respond(message).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error generating {}: {:#}", what, e);
                self.notifier
                    .error(&format!("Error generating {}: {}", what, e));
                self.failure_response(message, &e)
            }
        };
        self.send(OutboundMessage::AiResponse(response));
    }

    pub async fn gather_context(&self) -> WorkspaceSnapshot {
        ContextAggregator::new(&self.workspace, self.vcs.as_ref())
            .gather()
            .await
    }

    async fn respond(&self, message: &str) -> Result<AiResponse> {
        match self.mode {
            PromptMode::Git => {
                let prompt = self.prompts.compose(PromptMode::Git, message, "");
                let text = self.generate(&prompt).await?;
                Ok(AiResponse::Commands {
                    message: message.to_string(),
                    commands: cmd_parser::extract_commands(&text),
                })
            }
            PromptMode::Workspace => {
                // Fresh snapshot every time
                let context = self.gather_context().await.to_string();
                let prompt = self
                    .prompts
                    .compose(PromptMode::Workspace, message, &context);
                let text = self.generate(&prompt).await?;

                // Edit blocks come out first so their bodies never read as commands
                let parsed = edit_parser::parse_file_edits(&text);
                let commands = if cmd_parser::contains_command_blocks(&parsed.display) {
                    cmd_parser::parse_command_blocks(&parsed.display)
                } else {
                    Vec::new()
                };
                debug!(
                    "Response carried {} edit(s) and {} command(s)",
                    parsed.edits.len(),
                    commands.len()
                );
                Ok(AiResponse::Analysis {
                    message: message.to_string(),
                    analysis: parsed.display,
                    commands,
                    edits: parsed.edits,
                })
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Sending {} byte prompt to {}", prompt.len(), self.generator.name());
        let text = self.generator.generate(prompt).await?;
        if text.trim().is_empty() {
            return Err(GenerateError::EmptyResponse(self.generator.name().to_string()).into());
        }
        Ok(text)
    }

    fn failure_response(&self, message: &str, error: &anyhow::Error) -> AiResponse {
        let text = format!("Error: {}", error);
        match self.mode {
            PromptMode::Git => AiResponse::Commands {
                message: message.to_string(),
                commands: vec![text],
            },
            PromptMode::Workspace => AiResponse::Analysis {
                message: message.to_string(),
                analysis: text,
                commands: Vec::new(),
                edits: Vec::new(),
            },
        }
    }

    pub fn insert_command(&mut self, command: &str) {
        if let Err(e) = self.terminal.send_text(command) {
            warn!("Terminal rejected command: {:#}", e);
            self.notifier
                .error(&format!("Could not insert command: {}", e));
        }
    }

    pub fn apply_edit(&mut self, proposal: FileEditProposal) {
        match self.applicator.apply(&mut self.workspace, &proposal) {
            Ok(ApplyOutcome::Applied { .. }) => {
                let name = Path::new(&proposal.file_path)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| proposal.file_path.clone());
                self.notifier
                    .info(&format!("Successfully applied changes to {}", name));
                self.send(OutboundMessage::EditApplied(EditApplied {
                    file_path: proposal.file_path,
                    success: true,
                    error: None,
                }));
            }
            // Declined creation is silent
            Ok(ApplyOutcome::Declined) => {}
            Err(e) => {
                warn!("Edit to {} failed: {}", proposal.file_path, e);
                self.notifier.error(&format!("Error applying edit: {}", e));
                self.send(OutboundMessage::EditApplied(EditApplied {
                    file_path: proposal.file_path,
                    success: false,
                    error: Some(e.to_string()),
                }));
            }
        }
    }
}
