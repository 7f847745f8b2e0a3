use clap::Parser;
use std::path::PathBuf;

/// Your friendly IT administrator, on the command line.
#[derive(Debug, Parser)]
#[command(name = "ask", version)]
pub struct Cli {
    /// Question to ask; piped stdin is attached as context.
    pub prompt: Vec<String>,

    /// Print system information.
    #[arg(short, long)]
    pub system: bool,

    /// Print the last message.
    #[arg(short, long)]
    pub last: bool,

    /// List recent answers with their ordinals.
    #[arg(short = 'H', long)]
    pub history: bool,

    /// Print one answer from the history by ordinal (0 = most recent).
    #[arg(short, long, value_name = "ORDINAL")]
    pub get: Option<usize>,

    /// Clear the message history.
    #[arg(short, long)]
    pub clear: bool,

    /// Output raw text instead of rendered markdown.
    #[arg(short, long)]
    pub raw: bool,

    /// Model to use for this question.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Switch this conversation to the stronger model.
    #[arg(short, long)]
    pub escalate: bool,

    /// Debug mode: run the first script and ask for help with the files.
    #[arg(short, long, num_args = 1.., value_name = "FILE")]
    pub debug: Vec<PathBuf>,

    /// Extra note about the script for debug mode.
    #[arg(short, long = "query-about-script", value_name = "NOTE", requires = "debug")]
    pub query_about_script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Clear,
    ShowSystem,
    ShowLast,
    ShowHistory,
    Get(usize),
    Debug {
        files: Vec<PathBuf>,
        note: Option<String>,
    },
    Ask {
        words: String,
        escalate: bool,
    },
}

impl Cli {
    /// The one thing this invocation does; informational flags win over
    /// asking, in a fixed order.
    pub fn action(&self) -> Action {
        if self.clear {
            Action::Clear
        } else if self.system {
            Action::ShowSystem
        } else if self.last {
            Action::ShowLast
        } else if self.history {
            Action::ShowHistory
        } else if let Some(ordinal) = self.get {
            Action::Get(ordinal)
        } else if !self.debug.is_empty() {
            Action::Debug {
                files: self.debug.clone(),
                note: self.query_about_script.clone(),
            }
        } else {
            Action::Ask {
                words: self.prompt.join(" "),
                escalate: self.escalate,
            }
        }
    }
}
