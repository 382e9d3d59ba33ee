use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ConfirmCreate;
use crate::error::EditError;
use crate::protocol::FileEditProposal;
use crate::workspace::{Workspace, WorkspaceFolder};

/// Yes/no question put to the user before creating a file.
pub trait Confirm: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Answers every question the same way.
pub struct FixedConfirm(pub bool);

impl Confirm for FixedConfirm {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

/// Asks on the controlling terminal, so it works while stdin/stdout carry the protocol.
pub struct TtyConfirm;

impl Confirm for TtyConfirm {
    fn confirm(&self, message: &str) -> bool {
        match ask_tty(message) {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Could not ask for confirmation, treating as 'no': {}", e);
                false
            }
        }
    }
}

fn ask_tty(message: &str) -> std::io::Result<bool> {
    let mut tty = OpenOptions::new().read(true).write(true).open("/dev/tty")?;
    write!(tty, "{} [y/N] ", message)?;
    tty.flush()?;

    let mut answer = String::new();
    BufReader::new(tty).read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn confirm_for(policy: ConfirmCreate) -> Box<dyn Confirm> {
    match policy {
        ConfirmCreate::Prompt => Box::new(TtyConfirm),
        ConfirmCreate::Always => Box::new(FixedConfirm(true)),
        ConfirmCreate::Never => Box::new(FixedConfirm(false)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { path: PathBuf },
    /// The user chose not to create a missing file; nothing was touched.
    Declined,
}

/// Where an edit for `file_path` lands.
///
/// Absolute paths are used as-is. Relative paths go to the first root that
/// already has the file, otherwise under the first root.
pub fn resolve_target(folders: &[WorkspaceFolder], file_path: &str) -> Result<PathBuf, EditError> {
    let first = folders.first().ok_or(EditError::NoWorkspace)?;

    let path = Path::new(file_path);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    for folder in folders {
        let candidate = folder.path.join(path);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Ok(first.path.join(path))
}

pub struct EditApplicator {
    confirm: Box<dyn Confirm>,
}

impl EditApplicator {
    pub fn new(confirm: Box<dyn Confirm>) -> Self {
        Self { confirm }
    }

    /// Replace the whole target file with the proposal's content.
    pub fn apply(
        &self,
        workspace: &mut dyn Workspace,
        proposal: &FileEditProposal,
    ) -> Result<ApplyOutcome, EditError> {
        let target = resolve_target(&workspace.folders(), &proposal.file_path)?;
        debug!("Resolved {} to {}", proposal.file_path, target.display());

        if !target.exists() {
            let question = format!(
                "File {} does not exist. Do you want to create it?",
                proposal.file_path
            );
            if !self.confirm.confirm(&question) {
                info!("Creation of {} declined", target.display());
                return Ok(ApplyOutcome::Declined);
            }

            if let Some(parent) = target.parent() {
                if !parent.exists() {
                    fs::create_dir_all(parent).map_err(|source| EditError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
            }
        }

        if !workspace.replace_document(&target, &proposal.content)? {
            return Err(EditError::Rejected);
        }
        info!("Applied edit to {}", target.display());

        if let Err(e) = workspace.show_document(&target) {
            warn!("Could not open {}: {:#}", target.display(), e);
        }

        Ok(ApplyOutcome::Applied { path: target })
    }
}
