//! Interactive shell
//!
//! A synchronous read-eval loop over the reasoner. Each command runs to
//! completion (including its cycle loop) before the next prompt. Input
//! that is not a recognized command is routed to the chat translator when
//! one is available.

use std::io::{self, BufRead, Write};

use crate::chat::ChatClient;
use crate::engine::Engine;
use crate::parser::parse_clauses;

/// What the loop should do after a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellOutcome {
    Continue,
    Quit,
}

const HELP: &str = "Commands:\n\
  help [cmd]            show help\n\
  run <clauses>         execute clauses, then run to a fixed point\n\
  retract ID ATTR VAL   withdraw one retractable justification\n\
  explain ID ATTR VAL   show why a fact is in working memory\n\
  clear                 drop all facts (rules and declarations persist)\n\
  quit | exit | bye     leave the shell\n\
Anything else is sent to the chat translator when OPENAI_API_KEY is set.";

fn help_for(command: &str) -> &'static str {
    match command {
        "run" => "run <clauses> - parse and execute clauses, e.g. `run (duck is-a bird)`,\n\
                  then drive the rule cycle to a fixed point and defuzzify.",
        "retract" => "retract ID ATTR VAL - withdraw one axiomatic or defuzzification\n\
                      justification from the fact; the fact disappears when none remain.",
        "explain" => "explain ID ATTR VAL - print the justification tree for a fact.",
        "clear" => "clear - drop all facts and justifications. Rules, strata, schemas\n\
                    and fuzzy declarations persist.",
        "help" => "help [cmd] - this text, or details for one command.",
        "quit" | "exit" | "bye" => "quit - leave the shell.",
        _ => HELP,
    }
}

/// Run the interactive loop over stdin.
pub fn run_shell(engine: &mut Engine, mut chat: ChatClient) -> io::Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut buffer = String::new();
    loop {
        print!("tenet> ");
        io::stdout().flush()?;
        buffer.clear();
        if input.read_line(&mut buffer)? == 0 {
            println!();
            return Ok(());
        }
        let line = std::mem::take(&mut buffer);
        if handle_line(engine, &mut chat, line.trim(), &mut input) == ShellOutcome::Quit {
            return Ok(());
        }
    }
}

/// Dispatch a single shell line. `confirm_input` supplies the answer to
/// the one-time chat confirmation prompt.
pub fn handle_line(
    engine: &mut Engine,
    chat: &mut ChatClient,
    line: &str,
    confirm_input: &mut dyn BufRead,
) -> ShellOutcome {
    let line = line.trim();
    if line.is_empty() {
        return ShellOutcome::Continue;
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (line, ""),
    };

    match command {
        "quit" | "exit" | "bye" => return ShellOutcome::Quit,
        "help" => {
            if rest.is_empty() {
                println!("{}", HELP);
            } else {
                println!("{}", help_for(rest));
            }
        }
        "clear" => {
            engine.clear();
            println!("Working memory cleared.");
        }
        "retract" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let [id, attr, val] = args.as_slice() else {
                println!("usage: retract ID ATTR VAL");
                return ShellOutcome::Continue;
            };
            if let Err(err) = engine.retract(id, attr, val) {
                eprintln!("tenet: warning: {}", err.message);
            }
        }
        "explain" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let [id, attr, val] = args.as_slice() else {
                println!("usage: explain ID ATTR VAL");
                return ShellOutcome::Continue;
            };
            match engine.explain(id, attr, val) {
                Some(tree) => print!("{}", tree),
                None => println!("({} {} {}) is not in working memory.", id, attr, val),
            }
        }
        "run" => execute_clause_text(engine, rest),
        _ => chat_translate(engine, chat, line, confirm_input),
    }
    ShellOutcome::Continue
}

/// Parse and execute clause text, then stabilize. Interactive parse errors
/// warn instead of terminating.
fn execute_clause_text(engine: &mut Engine, text: &str) {
    let clauses = match parse_clauses(text) {
        Ok(clauses) => clauses,
        Err(err) => {
            eprintln!("tenet: warning: {}", err);
            return;
        }
    };
    for clause in clauses {
        if let Err(err) = engine.execute_clause(clause) {
            eprintln!("tenet: warning: {}", err.message);
            if err.is_fatal() {
                return;
            }
        }
    }
    engine.run();
    engine.defuzzify_and_cascade();
}

fn chat_translate(
    engine: &mut Engine,
    chat: &mut ChatClient,
    prompt: &str,
    confirm_input: &mut dyn BufRead,
) {
    if !chat.is_available() {
        println!("Chat is unavailable. Set OPENAI_API_KEY to enable free-form prompts.");
        return;
    }
    if chat.needs_confirmation() {
        print!(
            "Send free-form prompts to OpenAI ({})? [y/N] ",
            chat.model()
        );
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if confirm_input.read_line(&mut answer).is_err()
            || !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
        {
            chat.disable();
            println!("Chat disabled for this session.");
            return;
        }
        chat.confirm();
    }
    match chat.translate(prompt) {
        Ok(clauses) => {
            println!("{}", clauses.trim());
            execute_clause_text(engine, &clauses);
        }
        Err(err) => {
            eprintln!("tenet: warning: {}; disabling chat", err.message);
            chat.disable();
        }
    }
}
