//! Directive tokenizer.
//!
//! Command-line arguments and directive files both become a flat list of
//! tokens. Commas separate tokens; inside double quotes spaces and commas are
//! literal and the quotes themselves are dropped.

use std::path::Path;

use crate::error::ConvertResult;

// Stand-ins for quoted separators while splitting.
const QUOTED_SPACE: char = '\u{1}';
const QUOTED_COMMA: char = '\u{2}';

/// Split one line into tokens.
///
/// With `split_on_space` the line is also split on whitespace, as directive
/// file lines are. Command-line arguments keep their spaces because the shell
/// already split them.
pub fn split_line(line: &str, split_on_space: bool) -> Vec<String> {
    let mut marked = String::with_capacity(line.len());
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ' ' | '\t' if in_quotes => marked.push(QUOTED_SPACE),
            ',' if in_quotes => marked.push(QUOTED_COMMA),
            '\t' => marked.push(' '),
            c => marked.push(c),
        }
    }

    marked
        .split(|c: char| c == ',' || (split_on_space && c == ' '))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .chars()
                .map(|c| match c {
                    QUOTED_SPACE => ' ',
                    QUOTED_COMMA => ',',
                    c => c,
                })
                .collect()
        })
        .collect()
}

/// Normalize raw command-line arguments.
pub fn expand_arguments<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tokens = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        if arg.contains(',') || arg.contains('"') {
            tokens.extend(split_line(arg, false));
        } else if !arg.is_empty() {
            tokens.push(arg.to_string());
        }
    }
    tokens
}

/// Tokenize the contents of a directive file.
pub fn tokenize_directives(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| split_line(line, true))
        .collect()
}

/// Read and tokenize a directive file.
pub fn read_directive_file(path: &Path) -> ConvertResult<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    log::debug!("Read directives from {}", path.display());
    Ok(tokenize_directives(&content))
}
