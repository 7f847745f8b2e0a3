use std::io::IsTerminal;

const RULE_WIDTH: usize = 80;

/// Terminal skin for model answers.
pub fn make_skin() -> termimad::MadSkin {
    use termimad::crossterm::style::Color;
    let mut skin = termimad::MadSkin::default_dark();
    skin.headers[0].set_fg(Color::White);
    skin.headers[1].set_fg(Color::White);
    skin.bold.set_fg(Color::White);
    skin.inline_code.set_fg(Color::Cyan);
    skin.code_block.set_fg(Color::Cyan);
    skin
}

/// Prints `content` verbatim when `raw`, otherwise as rendered markdown
/// framed by horizontal rules.
pub fn print_response(content: &str, raw: bool) {
    if raw || !std::io::stdout().is_terminal() {
        println!("{}", content.trim_end());
        return;
    }

    let skin = make_skin();
    print!("{}", skin.term_text(&framed(content)));
}

fn framed(content: &str) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    format!("{rule}\n{}\n\n{rule}\n", content.trim())
}
