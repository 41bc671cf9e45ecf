use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;
use tipchat_core::filters::audience_options_matching;
use tipchat_core::{parse_answer, AnalysisTab, ChatBackend, ChatSession, FilterKind, Progress};
use tracing::{debug, info};

use crate::commands::{parse_command, Command, FilterTarget};
use crate::logging::log_info;
use crate::output::{
    print_answer_footer, print_assistant_prefix, print_citation, print_examples,
    print_followups, print_help, print_request_error, print_settings,
    print_supporting_content, print_thought_steps, StreamPrinter,
};

fn new_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn flush_stdout() {
    flush_output(&mut io::stdout());
}

/// Flush streamed text, logging a failure
fn flush_output<W: Write>(out: &mut W) -> bool {
    match out.flush() {
        Ok(()) => true,
        Err(e) => {
            debug!("Failed to flush stdout: {}", e);
            false
        }
    }
}

/// Prints a request as it progresses: spinner until the first text, then the text itself
fn render_progress<B: ChatBackend>(
    session: &ChatSession<B>,
    progress: &Progress,
    spinner: &ProgressBar,
    printer: &mut StreamPrinter,
) {
    let is_streaming = match progress {
        Progress::Updated => true,
        Progress::Done => false,
        _ => return,
    };
    let Some(turn) = session.conversation().visible().last().copied() else {
        return;
    };
    let first = !printer.has_printed();
    if let Some(chunk) = printer.next_chunk(turn.answer.text(), is_streaming) {
        if !spinner.is_finished() {
            spinner.finish_and_clear();
        }
        if first {
            print_assistant_prefix();
        }
        print!("{}", chunk);
        flush_stdout();
    }
}

/// Ask one question and print the answer as it arrives
async fn ask_and_print<B: ChatBackend>(
    session: &mut ChatSession<B>,
    question: &str,
    interactive: bool,
) -> Progress {
    let spinner = new_spinner("Searching tip sheets...");
    let mut printer = StreamPrinter::new();

    let outcome = session
        .ask(question, |session, progress| {
            render_progress(session, progress, &spinner, &mut printer)
        })
        .await;
    spinner.finish_and_clear();
    finish_turn(session, &outcome, &printer, interactive);
    outcome
}

async fn retry_and_print<B: ChatBackend>(session: &mut ChatSession<B>) {
    let spinner = new_spinner("Retrying...");
    let mut printer = StreamPrinter::new();

    let outcome = session
        .retry(|session, progress| render_progress(session, progress, &spinner, &mut printer))
        .await;
    spinner.finish_and_clear();
    match outcome {
        Some(outcome) => finish_turn(session, &outcome, &printer, true),
        None => println!("{}", "Nothing to retry yet.".yellow()),
    }
}

fn finish_turn<B: ChatBackend>(
    session: &ChatSession<B>,
    outcome: &Progress,
    printer: &StreamPrinter,
    interactive: bool,
) {
    match outcome {
        Progress::Done => {
            if printer.has_printed() {
                println!();
            }
            let turns = session.conversation().turns();
            if let Some(turn) = turns.last() {
                print_answer_footer(&turn.answer, turns.len() - 1);
            }
        }
        Progress::Failed => {
            if printer.has_printed() {
                println!();
            }
            if let (Some(error), true) = (session.last_error(), interactive) {
                print_request_error(error);
            }
        }
        _ => debug!(?outcome, "Request ended without an answer"),
    }
}

/// Runs a single query mode, asking one question and displaying the answer
pub async fn run_single_query<B: ChatBackend>(
    session: &mut ChatSession<B>,
    prompt: String,
) -> Result<()> {
    info!("Running single query: {}", prompt);
    match ask_and_print(session, &prompt, false).await {
        Progress::Failed => {
            let message = session
                .last_error()
                .map(|e| e.user_message())
                .unwrap_or_default();
            Err(anyhow::anyhow!(message)).context("Failed to get an answer")
        }
        _ => Ok(()),
    }
}

/// Runs an interactive chat session
pub async fn run_interactive_chat<B: ChatBackend>(session: &mut ChatSession<B>) -> Result<()> {
    println!("Starting interactive chat session.");
    println!("Type /help for commands, 'exit' or 'quit' to end the session.");
    println!();
    print_examples();

    loop {
        // Prompt for user input
        print!("{}: ", "You".green().bold());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        let read = io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;
        if read == 0 {
            println!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let command = match parse_command(input) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e.to_string().yellow());
                continue;
            }
        };

        if command == Command::Exit {
            println!("Exiting chat session.");
            break;
        }
        handle_command(session, command).await;
        println!(); // Add spacing between interactions
    }

    Ok(())
}

async fn handle_command<B: ChatBackend>(session: &mut ChatSession<B>, command: Command) {
    debug!(?command, "Handling command");
    match command {
        Command::Ask(question) => {
            ask_and_print(session, &question, true).await;
        }
        Command::Retry => retry_and_print(session).await,
        Command::Clear => {
            session.clear();
            log_info("Conversation cleared.");
            print_examples();
        }
        Command::Help => print_help(),
        Command::Settings => print_settings(
            &session.filters,
            session.stream(),
            session.backend_config(),
        ),
        Command::Citation { turn, number } => show_citation(session, turn, number),
        Command::Thoughts(turn) => match session.toggle_tab(AnalysisTab::Thought, turn) {
            Ok(()) if session.selection().is_open() => {
                if let Ok(turn) = session.turn(turn) {
                    print_thought_steps(&turn.answer.thought_steps(), turn.answer.context.thoughts());
                }
            }
            Ok(()) => log_info("Thought process closed."),
            Err(e) => println!("{}", e.to_string().yellow()),
        },
        Command::Support(turn) => {
            match session.toggle_tab(AnalysisTab::SupportingContent, turn) {
                Ok(()) if session.selection().is_open() => {
                    if let Ok(turn) = session.turn(turn) {
                        print_supporting_content(&turn.answer.supporting_content());
                    }
                }
                Ok(()) => log_info("Supporting content closed."),
                Err(e) => println!("{}", e.to_string().yellow()),
            }
        }
        Command::Followups(turn) => match session.followup_questions(turn) {
            Ok(questions) => print_followups(&questions),
            Err(e) => println!("{}", e.to_string().yellow()),
        },
        Command::Filter { kind, target } => {
            match target {
                FilterTarget::All => session.filters.set_all(kind, true),
                FilterTarget::None => session.filters.set_all(kind, false),
                FilterTarget::Key(key) => {
                    if let Err(e) = session.filters.toggle(kind, &key) {
                        println!("{}", e.to_string().yellow());
                        return;
                    }
                    let state = if session.filters.is_checked(kind, &key) {
                        "checked"
                    } else {
                        "unchecked"
                    };
                    log_info(&format!("{} '{}' {}", kind.name(), key, state));
                    return;
                }
            }
            log_info(&format!("Updated {} filter.", kind.name()));
        }
        Command::AudienceSearch(term) => {
            for option in audience_options_matching(&term) {
                let mark = if session.filters.is_checked(FilterKind::Audience, option.key) {
                    "[x]"
                } else {
                    "[ ]"
                };
                println!("  {} {}", mark, option.text);
            }
        }
        Command::Top(raw) => {
            session.filters.set_top(&raw);
            log_info(&format!("Retrieving {} documents.", session.filters.top));
        }
        Command::Mode(mode) => {
            session.filters.retrieval_mode = mode;
            log_info(&format!("Retrieval mode set to {}.", mode));
        }
        Command::Stream(stream) => {
            session.set_stream(stream);
            log_info(&format!("Streaming {}.", if stream { "on" } else { "off" }));
        }
        Command::SuggestFollowups(on) => {
            session.filters.suggest_followup_questions = on;
            log_info(&format!("Follow-up questions {}.", if on { "on" } else { "off" }));
        }
        Command::Images(on) => {
            if !session.backend_config().show_image_options {
                println!("{}", "This backend does not support image input.".yellow());
                return;
            }
            session.filters.use_images = on;
            log_info(&format!("Image input {}.", if on { "on" } else { "off" }));
        }
        Command::Exit => {}
    }
}

fn show_citation<B: ChatBackend>(session: &mut ChatSession<B>, turn: usize, number: usize) {
    let reference = match session.turn(turn) {
        Ok(t) => parse_answer_citation(t.answer.text(), number),
        Err(e) => {
            println!("{}", e.to_string().yellow());
            return;
        }
    };
    let Some(reference) = reference else {
        println!("{}", format!("Turn {} has no citation {}.", turn + 1, number).yellow());
        return;
    };
    if let Err(e) = session.show_citation(&reference, turn) {
        println!("{}", e.to_string().yellow());
        return;
    }
    if !session.selection().is_open() {
        log_info("Citation closed.");
        return;
    }
    if let Ok(t) = session.turn(turn) {
        print_citation(&reference, &t.answer.supporting_content());
    }
}

fn parse_answer_citation(text: &str, number: usize) -> Option<String> {
    parse_answer(text, false)
        .citation(number)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_flush_output_reports_failure() {
        assert!(!flush_output(&mut BrokenPipe));
        assert!(flush_output(&mut Vec::<u8>::new()));
    }

    #[test]
    fn test_citation_lookup_is_one_based() {
        let text = "Sign in Orders [orders.pdf#page=2] then cosign [cosign.pdf].";
        assert_eq!(parse_answer_citation(text, 2).as_deref(), Some("cosign.pdf"));
        assert_eq!(parse_answer_citation(text, 3), None);
    }
}
