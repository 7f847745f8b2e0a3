use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("no query provided; pass a question as arguments or pipe it on stdin")]
    Empty,
}

const SYSTEM_PROMPT_TEMPLATE: &str = "You are a helpful IT admin. You are a frontline worker at your company.
You are helping a new programmer.
They use Python and Linux. They are experienced with Python programming but don't know much about how to do the following:
- package scripts into proper applications
- use git and GitHub
- set up a development environment
- use things like Docker, virtual environments, or networking tools
- write shell scripts
- use a terminal effectively
- the linux filesystem or basic linux commands (beyond ls, mkdir, cd, mv, etc.)
Your answers should be very short and to the point.
Only provide a solution to the user's problem.
Do not introduce yourself or provide emotional support.
If a code snippet is all that the user needs, just provide the code snippet.

Here are details about the user's hardware, OS, and software:

<system_detail>
{system_info}
</system_detail>";

pub const DEBUG_SYSTEM_PROMPT: &str = "You are an experienced software engineer, and are helping a junior programmer debug their code. They are using Python and Linux.

You will be provided with the user's code. This may be a single script, or a set of scripts. The first script is the script they're trying to run; the rest are helper scripts that the first script may depend on.

You will also be given the terminal output of the code (both stdout and stderr).

Your goal is to help the user debug their code. You can ask for more information if needed.";

pub const ESCALATION_NOTICE: &str = "The user has escalated this conversation to a more capable model. \
Re-read the conversation so far, correct any earlier mistakes, and answer with extra care.";

/// Builds the outbound user turn: query, then context, then the append block.
pub fn assemble(query: &str, context: &str, append: &str) -> Result<String, PromptError> {
    let context_block = (!context.trim().is_empty())
        .then(|| format!("<context>\n{}\n</context>", context.trim()));

    let combined = [Some(query.trim()), context_block.as_deref(), Some(append.trim())]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let combined = combined.trim();
    if combined.is_empty() {
        return Err(PromptError::Empty);
    }
    Ok(combined.to_string())
}

pub fn render_system_prompt(system_info: &str) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{system_info}", system_info.trim())
}

/// One source file handed to debug mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

pub fn render_debug_prompt(files: &[SourceFile], script_output: &str, note: Option<&str>) -> String {
    let mut prompt = String::from("Here is the user's code:\n<user_code>\n");
    for file in files {
        prompt.push_str(&format!("<{0}>\n{1}\n</{0}>\n", file.name, file.content.trim_end()));
    }
    prompt.push_str("</user_code>\n\n");
    prompt.push_str("And here is the output of the first script that they are trying to debug:\n");
    prompt.push_str(&format!("<script_output>\n{}\n</script_output>", script_output.trim()));

    if let Some(note) = note.map(str::trim).filter(|note| !note.is_empty()) {
        prompt.push_str(&format!(
            "\nThe user has added this custom note:\n<user_query>{note}</user_query>"
        ));
    }
    prompt
}
