use std::io::{BufRead, Write};
use std::rc::Rc;

use loom_actions::Action;
use loom_base::Config;
use loom_context::Context;
use loom_scheduler::{Progress, RootQuestionSession};
use tracing::warn;

/// One line of the REPL grammar, SPEC_FULL.md §6.2.
enum Command {
    Scratch(String),
    AskSubquestion(String),
    Reply(String),
    Unlock(String),
    Exit,
    Blank,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Blank);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match verb {
        "exit" => Ok(Command::Exit),
        "scratch" => Ok(Command::Scratch(rest.to_string())),
        "ask" => Ok(Command::AskSubquestion(rest.to_string())),
        "reply" => Ok(Command::Reply(rest.to_string())),
        "unlock" => Ok(Command::Unlock(rest.to_string())),
        other => Err(format!(
            "unrecognized command {other:?}, expected one of: scratch, ask, reply, unlock, exit"
        )),
    }
}

/// Prompts for a root question on `input` if `question` is `None`, then
/// reads one command per line until `exit` or the root answer is fully
/// unlocked. Holds no state across calls; everything lives in the
/// `RootQuestionSession` built here.
pub fn run<R: BufRead, W: Write>(
    question: Option<String>,
    config: Config,
    mut input: R,
    mut output: W,
) -> loom_base::Result<()> {
    let question_text = match question {
        Some(text) => text,
        None => {
            write!(output, "question? ").ok();
            output.flush().ok();
            let mut line = String::new();
            input.read_line(&mut line)?;
            line.trim().to_string()
        }
    };

    let (mut session, root) = RootQuestionSession::ask(&question_text, config)?;
    writeln!(output, "{}", root.display()).ok();
    let mut current = root;

    let mut line = String::new();
    loop {
        write!(output, "> ").ok();
        output.flush().ok();
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                writeln!(output, "{message}").ok();
                continue;
            }
        };

        let action = match command {
            Command::Blank => continue,
            Command::Exit => break,
            Command::Scratch(text) => Action::Scratch(text),
            Command::AskSubquestion(text) => Action::AskSubquestion(text),
            Command::Reply(text) => Action::Reply(text),
            Command::Unlock(name) => Action::Unlock(name),
        };

        match advance(&mut session, &current, action) {
            Ok(Some(next)) => current = next,
            Ok(None) => {
                writeln!(output, "{}", session.format_root_answer().unwrap()).ok();
                break;
            }
            Err(e) => {
                warn!(target: "loom", error = %e, "action rejected");
                writeln!(output, "error: {e}").ok();
            }
        }
        writeln!(output, "{}", current.display()).ok();
    }

    Ok(())
}

/// Resolves one action and returns the context to print and act on next,
/// or `None` once the root answer is complete.
fn advance(
    session: &mut RootQuestionSession,
    current: &Rc<Context>,
    action: Action,
) -> loom_base::Result<Option<Rc<Context>>> {
    match session.act(current, action)? {
        Progress::Active(ctx) => Ok(Some(ctx)),
        Progress::Complete(_) => Ok(None),
    }
}
