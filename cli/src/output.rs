use colored::*;
use serde_json::Value;
use tipchat_core::filters::{FilterKind, FilterState};
use tipchat_core::{parse_answer, Answer, BackendConfig, ChatError, ThoughtStep};

/// Shown on an empty conversation
pub const EXAMPLE_QUESTIONS: &[&str] = &[
    "How do I cosign an order placed by a resident?",
    "What is new for nurses in the 2024 Winter upgrade?",
    "How do I add a diagnosis to the problem list?",
];

/// Tracks how much of a streaming answer has been written to the terminal
#[derive(Debug, Default)]
pub struct StreamPrinter {
    printed: String,
}

impl StreamPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The part of `text` not printed yet, with citations shown as `[n]`.
    ///
    /// Markup that is still being typed is held back until it closes.
    pub fn next_chunk(&mut self, text: &str, is_streaming: bool) -> Option<String> {
        let rendered = parse_answer(text, is_streaming).plain_text();
        // Trailing whitespace may belong to markup that gets cut later
        let rendered = rendered.trim_end().to_string();
        let chunk = rendered.strip_prefix(self.printed.as_str())?;
        if chunk.is_empty() {
            return None;
        }
        let chunk = chunk.to_string();
        self.printed = rendered;
        Some(chunk)
    }

    pub fn has_printed(&self) -> bool {
        !self.printed.is_empty()
    }
}

pub fn print_assistant_prefix() {
    print!("{}: ", "Assistant".blue().bold());
}

/// Citations and follow-up questions listed under an answer
pub fn print_answer_footer(answer: &Answer, turn: usize) {
    let parsed = parse_answer(answer.text(), false);
    if !parsed.citations.is_empty() {
        println!("{}", "Citations:".cyan());
        for (i, citation) in parsed.citations.iter().enumerate() {
            println!("  {} {}", format!("[{}]", i + 1).bold(), citation);
        }
    }

    let followups = answer
        .context
        .followup_questions()
        .unwrap_or(parsed.followup_questions);
    if !followups.is_empty() {
        println!("{}", "Follow-up questions:".cyan());
        for question in followups {
            println!("  - {}", question.italic());
        }
    }
    println!(
        "{}",
        format!(
            "(turn {}: /thoughts {0}, /support {0}, /citation {0} <n>)",
            turn + 1
        )
        .dimmed()
    );
}

pub fn print_request_error(error: &ChatError) {
    eprintln!("{} {}", "Error:".red().bold(), error.user_message());
    eprintln!("{}", "Type /retry to ask again.".dimmed());
}

pub fn print_citation(reference: &str, supporting: &[String]) {
    println!("{} {}", "Citation:".cyan().bold(), reference);
    let page = reference.split('#').next().unwrap_or(reference);
    let matching: Vec<&String> = supporting.iter().filter(|s| s.starts_with(page)).collect();
    if matching.is_empty() {
        println!("  {}", "No retrieved content for this source.".dimmed());
    }
    for content in matching {
        println!("  {}", content);
    }
}

pub fn print_thought_steps(steps: &[ThoughtStep], raw: Option<&Value>) {
    println!("{}", "Thought process:".cyan().bold());
    if steps.is_empty() {
        match raw {
            Some(value) => println!("{}", describe_value(value)),
            None => println!("  {}", "No thought process recorded.".dimmed()),
        }
        return;
    }
    for (i, step) in steps.iter().enumerate() {
        println!("{} {}", format!("{}.", i + 1).bold(), step.title);
        println!("{}", indent(&describe_value(&step.description)));
        if let Some(props) = &step.props {
            println!("{}", indent(&describe_value(props)).dimmed());
        }
    }
}

pub fn print_supporting_content(supporting: &[String]) {
    println!("{}", "Supporting content:".cyan().bold());
    if supporting.is_empty() {
        println!("  {}", "No supporting content.".dimmed());
    }
    for content in supporting {
        println!("  - {}", content);
    }
}

pub fn print_followups(questions: &[String]) {
    if questions.is_empty() {
        println!("{}", "No follow-up questions for this turn.".dimmed());
    }
    for (i, question) in questions.iter().enumerate() {
        println!("  {} {}", format!("{}.", i + 1).bold(), question);
    }
}

pub fn print_examples() {
    println!("{}", "Ask anything or try an example:".yellow().bold());
    for example in EXAMPLE_QUESTIONS {
        println!("  - {}", example);
    }
    println!();
}

pub fn print_settings(filters: &FilterState, stream: bool, backend: BackendConfig) {
    println!("{}", "Settings:".yellow().bold());
    println!("  retrieve count:       {}", filters.top);
    println!("  retrieval mode:       {}", filters.retrieval_mode);
    println!("  semantic ranker:      {}", on_off(filters.semantic_ranker));
    println!("  semantic captions:    {}", on_off(filters.semantic_captions));
    println!(
        "  follow-up questions:  {}",
        on_off(filters.suggest_followup_questions)
    );
    println!("  stream answers:       {}", on_off(stream));
    if backend.show_image_options {
        println!("  use images:           {}", on_off(filters.use_images));
    }
    for kind in [FilterKind::Category, FilterKind::Version, FilterKind::Audience] {
        let options = kind.options();
        let checked = options
            .iter()
            .filter(|o| filters.is_checked(kind, o.key))
            .count();
        println!("  {:<21} {}/{} checked", format!("{}:", kind.name()), checked, options.len());
        for option in options.iter().filter(|o| !filters.is_checked(kind, o.key)) {
            println!("    {} {}", "[ ]".dimmed(), option.text.dimmed());
        }
    }
}

/// Show usage instructions when no prompt or action is provided
pub fn print_usage_instructions() {
    println!("{}", "Usage:".yellow().bold());
    println!("  {}", "tipchat \"your question\"".green().bold());
    println!("    Ask a single question");
    println!();
    println!("  {}", "tipchat -i".green().bold());
    println!("    Start an interactive chat session");
    println!();
    println!("{}", "Options:".cyan());
    println!("  --backend-url <URL>  Chat backend to use");
    println!("  --token <TOKEN>      Bearer token for the backend");
    println!("  --no-stream          Wait for complete answers");
    println!("  --config <PATH>      Configuration file");
    println!("  --help               Show this help message");
    println!();
}

pub fn print_help() {
    println!("{}", "Commands:".yellow().bold());
    let commands = [
        ("/clear", "Start a new conversation"),
        ("/retry", "Ask the last question again"),
        ("/citation <turn> <n>", "Show citation n of a turn"),
        ("/thoughts <turn>", "Show the thought process of a turn"),
        ("/support <turn>", "Show the supporting content of a turn"),
        ("/followups <turn>", "List follow-up questions of a turn"),
        ("/category <key|all|none>", "Toggle a document category"),
        ("/version <key|all|none>", "Toggle a version"),
        ("/audience <key|all|none>", "Toggle an audience"),
        ("/audience-search <term>", "Find audience options"),
        ("/top <n>", "Number of documents to retrieve"),
        ("/mode <hybrid|vectors|text>", "Retrieval mode"),
        ("/stream on|off", "Stream answers"),
        ("/followups on|off", "Ask for follow-up questions"),
        ("/images on|off", "Send page images (if the backend supports it)"),
        ("/settings", "Show current settings"),
        ("exit | quit", "Leave"),
    ];
    for (command, description) in commands {
        println!("  {:<30} {}", command.green(), description);
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_printer_emits_only_new_text() {
        let mut printer = StreamPrinter::new();
        assert_eq!(printer.next_chunk("Open the ", true), Some("Open the".to_string()));
        assert_eq!(printer.next_chunk("Open the chart [ch", true), Some(" chart".to_string()));
        assert_eq!(
            printer.next_chunk("Open the chart [chart.pdf].", true),
            Some(" [1].".to_string())
        );
        assert_eq!(printer.next_chunk("Open the chart [chart.pdf].", true), None);
        assert!(printer.has_printed());
    }

    #[test]
    fn test_stream_printer_holds_back_followups() {
        let mut printer = StreamPrinter::new();
        printer.next_chunk("Done.", true);
        assert_eq!(printer.next_chunk("Done. <<What", true), None);
        assert_eq!(printer.next_chunk("Done. <<What next?>>", false), None);
    }

    #[test]
    fn test_describe_value() {
        assert_eq!(describe_value(&Value::String("plain".to_string())), "plain");
        assert_eq!(
            indent(&describe_value(&serde_json::json!({"k": 1}))),
            "    {\n      \"k\": 1\n    }"
        );
    }
}
