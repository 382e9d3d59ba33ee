// Interactive terminal UI on top of a panel.

use std::io::{self, Write};

use anyhow::Result;
use colored::*;
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use termimad::MadSkin;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::panel::{ChannelSink, Notifier, Panel};
use crate::prompts::PromptMode;
use crate::protocol::{
    ActiveEditorRequest, AiResponse, FileEditProposal, InboundMessage, LineSelection,
    OpenDocumentRequest, OutboundMessage,
};
use crate::thinking;

const HEADER_WIDTH: usize = 60;

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn info(&self, message: &str) {
        println!("{}", message.green());
    }

    fn error(&self, message: &str) {
        eprintln!("{}", message.red());
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub async fn run_chat(mut panel: Panel) -> Result<()> {
    let (tx, mut rx) = unbounded_channel();
    panel.attach(Box::new(ChannelSink(tx)));

    println!("{}", "═".repeat(HEADER_WIDTH).bright_blue());
    println!("{}", "natural-git - ask about your workspace".bright_white().bold());
    println!("{}", "═".repeat(HEADER_WIDTH).bright_blue());
    print_mode(panel.mode());
    println!("{} Type '/help' for available commands", "💡".yellow());
    println!();

    let skin = MadSkin::default();
    let mut line_editor = Reedline::create();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("natural-git".to_string()),
        DefaultPromptSegment::Empty,
    );

    loop {
        let input = match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => buffer,
            Signal::CtrlC | Signal::CtrlD => break,
        };
        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('/') {
            match handle_command(trimmed, &mut panel).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => eprintln!("{} {:#}", "Command error:".red(), e),
            }
            continue;
        }

        let indicator = thinking::show_thinking(panel.mode());
        panel.handle_user_message(trimmed).await;
        indicator.finish();

        if let Err(e) = render_responses(&mut panel, &mut rx, &skin).await {
            eprintln!("{} {:#}", "Error:".red(), e);
        }
        println!();
    }

    println!("exiting natural-git");
    Ok(())
}

fn print_mode(mode: PromptMode) {
    let label = match mode {
        PromptMode::Workspace => "workspace analysis",
        PromptMode::Git => "Git command generation",
    };
    println!("{} {}", "Mode:".dimmed(), label.cyan());
}

fn print_help() {
    println!("{}", "Commands:".bright_white().bold());
    println!("  /open <path>                 add a document to the open files");
    println!("  /close <path>                close a document");
    println!("  /active <path> [start-end]   make a document active, optionally selecting lines");
    println!("  /context                     show the workspace snapshot");
    println!("  /mode <workspace|git>        switch prompt mode");
    println!("  /quit                        exit");
}

async fn handle_command(input: &str, panel: &mut Panel) -> Result<Flow> {
    let (command, arg) = match input.split_once(' ') {
        Some((command, arg)) => (command, arg.trim()),
        None => (input, ""),
    };

    match command {
        "/quit" | "/exit" => return Ok(Flow::Quit),
        "/help" => print_help(),
        // Document commands go through the same path a UI message takes
        "/open" if !arg.is_empty() => {
            panel
                .handle_message(InboundMessage::OpenDocument(OpenDocumentRequest {
                    path: arg.to_string(),
                    language_id: None,
                }))
                .await?;
            println!("{} {}", "Opened:".green(), arg);
        }
        "/close" if !arg.is_empty() => {
            panel
                .handle_message(InboundMessage::CloseDocument(arg.to_string()))
                .await?;
            println!("{} {}", "Closed:".green(), arg);
        }
        "/active" if !arg.is_empty() => {
            let (path, selection) = parse_active_arg(arg)?;
            panel
                .handle_message(InboundMessage::SetActiveEditor(ActiveEditorRequest {
                    path: path.to_string(),
                    selection,
                }))
                .await?;
            println!("{} {}", "Active:".green(), path);
        }
        "/context" => {
            let snapshot = panel.gather_context().await;
            println!("{}", snapshot);
        }
        "/mode" => {
            let mode = match arg.to_lowercase().as_str() {
                "workspace" => PromptMode::Workspace,
                "git" => PromptMode::Git,
                _ => return Err(anyhow::anyhow!("Usage: /mode <workspace|git>")),
            };
            panel.set_mode(mode);
            print_mode(mode);
        }
        "/open" | "/close" | "/active" => {
            println!("Usage: {} <path>", command);
        }
        _ => println!("Unknown command: {}", command),
    }
    Ok(Flow::Continue)
}

/// `path` or `path 3-7` (1-based, inclusive).
fn parse_active_arg(arg: &str) -> Result<(&str, Option<LineSelection>)> {
    let Some((path, range)) = arg.rsplit_once(' ') else {
        return Ok((arg, None));
    };
    let Some((start, end)) = range.split_once('-') else {
        return Ok((arg, None));
    };
    let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) else {
        return Ok((arg, None));
    };
    if start == 0 || end < start {
        return Err(anyhow::anyhow!("Invalid line range: {}", range));
    }
    Ok((
        path.trim(),
        Some(LineSelection {
            start_line: start - 1,
            end_line: end - 1,
        }),
    ))
}

async fn render_responses(
    panel: &mut Panel,
    rx: &mut UnboundedReceiver<OutboundMessage>,
    skin: &MadSkin,
) -> Result<()> {
    while let Ok(message) = rx.try_recv() {
        match message {
            OutboundMessage::AiResponse(AiResponse::Commands { message, commands }) => {
                println!("{} \"{}\"", "Here are the Git commands for:".bright_yellow(), message);
                offer_commands(panel, &commands)?;
            }
            OutboundMessage::AiResponse(AiResponse::Analysis {
                analysis,
                commands,
                edits,
                ..
            }) => {
                skin.print_text(&analysis);
                for edit in edits {
                    review_edit(panel, edit).await?;
                }
                offer_commands(panel, &commands)?;
            }
            OutboundMessage::EditApplied(result) => {
                if result.success {
                    println!("{} {}", "Applied:".green(), result.file_path);
                } else {
                    println!(
                        "{} {} - {}",
                        "Failed:".red(),
                        result.file_path,
                        result.error.unwrap_or_default()
                    );
                }
            }
        }
    }
    Ok(())
}

async fn review_edit(panel: &mut Panel, edit: FileEditProposal) -> Result<()> {
    println!("{}", "─".repeat(40).dimmed());
    println!("{}", edit.file_path.bright_white().bold());
    println!("{}", "─".repeat(40).dimmed());
    for line in edit.content.lines() {
        println!("  {}", line.green());
    }
    println!("{}", "─".repeat(40).dimmed());

    let message = if ask_yes_no("Apply this edit?")? {
        InboundMessage::ApplyEdit(edit)
    } else {
        println!("{} {}", "Skipped:".dimmed(), edit.file_path);
        InboundMessage::RejectEdit
    };
    panel.handle_message(message).await
}

fn offer_commands(panel: &mut Panel, commands: &[String]) -> Result<()> {
    if commands.is_empty() {
        return Ok(());
    }
    for (i, command) in commands.iter().enumerate() {
        println!("  {} {}", format!("[{}]", i + 1).dimmed(), command.bright_cyan());
    }

    print!("{} ", "Insert a command into the terminal? (number, Enter to skip):".bright_white());
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;

    match answer.trim().parse::<usize>() {
        Ok(n) if n >= 1 && n <= commands.len() => panel.insert_command(&commands[n - 1]),
        Ok(_) => println!("No such command"),
        Err(_) => {}
    }
    Ok(())
}

fn ask_yes_no(question: &str) -> Result<bool> {
    loop {
        print!("{} {} ", question.bright_white(), "(y/n):".dimmed());
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "" => return Ok(false),
            _ => println!("Please enter 'y' (yes) or 'n' (no)"),
        }
    }
}
