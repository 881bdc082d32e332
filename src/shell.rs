//! Shell command lexing and parsing for the policy engine.
//!
//! A command line is looked at in two ways:
//!
//! - **Lexically**, with quoting-aware word splitting ([`leading_token`]). This
//!   is what the denylist is checked against: `"rm" -rf x` and `rm -rf x` both
//!   lead with `rm`.
//! - **Structurally**, as a list of simple commands joined by pipes, `&&`,
//!   `||` and `;` ([`simple_commands`]). This is used only when compound
//!   inspection is enabled, so that `make && sudo make install` is caught.
//!
//! # Structural limits
//!
//! The structural parser understands simple commands, pipelines, logical
//! operators, sequences, quoting, escapes, globs, tildes and redirections
//! (redirections are dropped). Parameter expansion and command substitution
//! are kept as an opaque `$` word; their contents are not inspected.
//! Compound commands (`if`, `for`, `while`, `case`, subshells, brace groups)
//! and function definitions are skipped: they contribute no commands, and the
//! rest of the line is still collected.
//!
//! # Example
//!
//! ```
//! use hostgate::shell::{leading_token, simple_commands};
//!
//! assert_eq!(leading_token("'git' status").unwrap().as_deref(), Some("git"));
//! assert_eq!(leading_token("   ").unwrap(), None);
//!
//! let names: Vec<_> = simple_commands("find . | grep foo && echo done")
//!     .unwrap()
//!     .into_iter()
//!     .map(|cmd| cmd.name)
//!     .collect();
//! assert_eq!(names, vec!["find", "grep", "echo"]);
//! ```

use conch_parser::ast;
use conch_parser::lexer::Lexer;
use conch_parser::parse::DefaultParser;
use tracing::debug;

/// Stand-in for a word whose value is only known at run time.
const OPAQUE_WORD: &str = "$";

/// One command of a (possibly compound) command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The command name (e.g., "git", "sudo").
    pub name: String,
    /// The arguments following the command name.
    pub args: Vec<String>,
}

/// Why a command line could not be lexed or parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    /// Word splitting failed, e.g. an unterminated quote.
    #[error("cannot split command into words: {0}")]
    Lex(String),
    #[error("syntax error: {0}")]
    Syntax(String),
}

/// Splits `input` into words using shell quoting rules and returns the first.
///
/// Returns `Ok(None)` when the input holds no words at all.
pub fn leading_token(input: &str) -> Result<Option<String>, ParseError> {
    let words = shell_words::split(input).map_err(|e| ParseError::Lex(e.to_string()))?;
    Ok(words.into_iter().next())
}

/// Parses `input` and returns every simple command it contains, in order.
///
/// Pipelines, `&&`, `||`, `&` and `;` are flattened; the result for
/// `a | b && c; d` is `[a, b, c, d]`. Commands made only of variable
/// assignments or redirections contribute nothing, and neither do compound
/// commands or function definitions.
pub fn simple_commands(input: &str) -> Result<Vec<ParsedCommand>, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = DefaultParser::new(Lexer::new(trimmed.chars()));
    let mut commands = Vec::new();
    loop {
        match parser.complete_command() {
            Ok(Some(ast::TopLevelCommand(cmd))) => collect_command(&cmd, &mut commands),
            Ok(None) => break,
            Err(e) => return Err(ParseError::Syntax(format!("{:?}", e))),
        }
    }
    Ok(commands)
}

fn collect_command(cmd: &ast::DefaultCommand, out: &mut Vec<ParsedCommand>) {
    let (ast::Command::Job(list) | ast::Command::List(list)) = cmd;

    collect_listable(&list.first, out);
    for and_or in &list.rest {
        let (ast::AndOr::And(next) | ast::AndOr::Or(next)) = and_or;
        collect_listable(next, out);
    }
}

fn collect_listable(cmd: &ast::DefaultListableCommand, out: &mut Vec<ParsedCommand>) {
    match cmd {
        ast::ListableCommand::Single(pipeable) => collect_pipeable(pipeable, out),
        ast::ListableCommand::Pipe(_, stages) => {
            for stage in stages {
                collect_pipeable(stage, out);
            }
        }
    }
}

fn collect_pipeable(cmd: &ast::DefaultPipeableCommand, out: &mut Vec<ParsedCommand>) {
    match cmd {
        ast::PipeableCommand::Simple(simple) => out.extend(convert_simple(simple)),
        ast::PipeableCommand::Compound(_) => debug!("skipping compound command"),
        ast::PipeableCommand::FunctionDef(name, _) => {
            debug!(name = %name, "skipping function definition")
        }
    }
}

fn convert_simple(cmd: &ast::DefaultSimpleCommand) -> Option<ParsedCommand> {
    let mut words = cmd.redirects_or_cmd_words.iter().filter_map(|item| match item {
        ast::RedirectOrCmdWord::CmdWord(ast::TopLevelWord(word)) => Some(render_complex(word)),
        ast::RedirectOrCmdWord::Redirect(_) => None,
    });

    let name = words.next()?;
    Some(ParsedCommand {
        name,
        args: words.collect(),
    })
}

fn render_complex(word: &ast::DefaultComplexWord) -> String {
    match word {
        ast::ComplexWord::Single(w) => render_word(w),
        ast::ComplexWord::Concat(parts) => parts.iter().map(render_word).collect(),
    }
}

fn render_word(word: &ast::DefaultWord) -> String {
    match word {
        ast::Word::Simple(simple) => render_simple(simple).into_owned(),
        ast::Word::DoubleQuoted(parts) => parts.iter().map(|p| render_simple(p)).collect(),
        ast::Word::SingleQuoted(s) => s.clone(),
    }
}

fn render_simple(word: &ast::DefaultSimpleWord) -> std::borrow::Cow<'_, str> {
    use std::borrow::Cow;

    match word {
        ast::SimpleWord::Literal(s) | ast::SimpleWord::Escaped(s) => Cow::Borrowed(s.as_str()),
        ast::SimpleWord::Colon => Cow::Borrowed(":"),
        ast::SimpleWord::Tilde => Cow::Borrowed("~"),
        ast::SimpleWord::SquareOpen => Cow::Borrowed("["),
        ast::SimpleWord::SquareClose => Cow::Borrowed("]"),
        ast::SimpleWord::Question => Cow::Borrowed("?"),
        ast::SimpleWord::Star => Cow::Borrowed("*"),
        ast::SimpleWord::Subst(_) | ast::SimpleWord::Param(_) => Cow::Borrowed(OPAQUE_WORD),
    }
}
