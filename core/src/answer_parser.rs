//! Splits answer text into prose and numbered citation references.
//!
//! Citations are written by the model as `[sourcepage]`; follow-up questions
//! as `<<question>>`.

/// A piece of rendered answer text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    /// `number` is 1-based and shared by repeated references to one source
    Citation { number: usize, reference: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAnswer {
    pub fragments: Vec<Fragment>,
    /// Distinct citations in first-seen order
    pub citations: Vec<String>,
    pub followup_questions: Vec<String>,
}

impl ParsedAnswer {
    /// Answer text with citations replaced by `[n]` markers
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => out.push_str(text),
                Fragment::Citation { number, .. } => out.push_str(&format!("[{}]", number)),
            }
        }
        out
    }

    pub fn citation(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.citations.get(i))
            .map(String::as_str)
    }
}

/// Parse answer text.
///
/// While `is_streaming`, a citation or follow-up question that has been opened
/// but not yet closed is cut off so half-typed markup is never shown.
pub fn parse_answer(answer: &str, is_streaming: bool) -> ParsedAnswer {
    let (text, followup_questions) = extract_followups(answer);
    let mut text = text.trim().to_string();

    if is_streaming {
        if let Some(open) = text.rfind("<<") {
            text.truncate(open);
        }
        if let Some(open) = text.rfind(['[', ']']) {
            if text[open..].starts_with('[') {
                text.truncate(open);
            }
        }
    }

    let mut fragments = Vec::new();
    let mut citations: Vec<String> = Vec::new();
    let mut pending = String::new();
    let mut rest = text.as_str();

    while let Some(start) = rest.find('[') {
        let after = &rest[start + 1..];
        match after.find(']') {
            Some(end) if end > 0 => {
                pending.push_str(&rest[..start]);
                if !pending.is_empty() {
                    fragments.push(Fragment::Text(std::mem::take(&mut pending)));
                }
                let reference = after[..end].to_string();
                let number = match citations.iter().position(|c| *c == reference) {
                    Some(i) => i + 1,
                    None => {
                        citations.push(reference.clone());
                        citations.len()
                    }
                };
                fragments.push(Fragment::Citation { number, reference });
                rest = &after[end + 1..];
            }
            _ => {
                pending.push_str(&rest[..start + 1]);
                rest = after;
            }
        }
    }
    pending.push_str(rest);
    if !pending.is_empty() {
        fragments.push(Fragment::Text(pending));
    }

    ParsedAnswer {
        fragments,
        citations,
        followup_questions,
    }
}

fn extract_followups(text: &str) -> (String, Vec<String>) {
    let mut out = String::new();
    let mut questions = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("<<") {
        let after = &rest[start + 2..];
        match after.find('>') {
            Some(end) if end > 0 && after[end..].starts_with(">>") => {
                out.push_str(&rest[..start]);
                questions.push(after[..end].to_string());
                rest = &after[end + 2..];
            }
            _ => {
                out.push_str(&rest[..start + 2]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    (out, questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citations_numbered_in_first_seen_order() {
        let parsed = parse_answer(
            "Sign the order [orders.pdf#page=2]. Cosign later [cosign.pdf] or now [orders.pdf#page=2].",
            false,
        );
        assert_eq!(parsed.citations, vec!["orders.pdf#page=2", "cosign.pdf"]);
        assert_eq!(
            parsed.plain_text(),
            "Sign the order [1]. Cosign later [2] or now [1]."
        );
        assert_eq!(parsed.citation(2), Some("cosign.pdf"));
        assert_eq!(parsed.citation(0), None);
        assert_eq!(parsed.citation(3), None);
    }

    #[test]
    fn test_followups_extracted() {
        let parsed = parse_answer(
            "Use the Orders activity.\n<<How do I cosign?>> <<Can I pend orders?>>",
            false,
        );
        assert_eq!(
            parsed.followup_questions,
            vec!["How do I cosign?", "Can I pend orders?"]
        );
        assert_eq!(parsed.plain_text(), "Use the Orders activity.");
    }

    #[test]
    fn test_streaming_hides_partial_markup() {
        let parsed = parse_answer("Open the chart [chart.p", true);
        assert_eq!(parsed.plain_text(), "Open the chart ");
        assert!(parsed.citations.is_empty());

        let parsed = parse_answer("Done [a.pdf]. <<How do", true);
        assert_eq!(parsed.plain_text(), "Done [1]. ");

        // Closed citations are kept while streaming
        let parsed = parse_answer("Done [a.pdf]", true);
        assert_eq!(parsed.citations, vec!["a.pdf"]);

        // Not streaming: an open bracket is plain text
        let parsed = parse_answer("Open the chart [chart.p", false);
        assert_eq!(parsed.plain_text(), "Open the chart [chart.p");
    }

    #[test]
    fn test_empty_brackets_are_text() {
        let parsed = parse_answer("Press [] then [F5].", false);
        assert_eq!(parsed.citations, vec!["F5"]);
        assert_eq!(parsed.plain_text(), "Press [] then [1].");
    }
}
