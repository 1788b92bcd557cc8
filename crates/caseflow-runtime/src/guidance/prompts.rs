//! Extraction prompts for guidance population.
//!
//! The generator is a constrained summarizer, not an advisor: it trims
//! reference material down to what bears on one case and must not add
//! opinions or conclusions of its own. The framing matters for keeping the
//! cached text citable.

use crate::providers::ChatMessage;

use super::CaseFacts;

/// System prompt for the reference-extraction call.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are an extraction assistant for a labour-relations case-management system.

You will receive reference material (legal and employment-reference text) and
the facts of one grievance case. Produce the subset of the reference material
that is relevant to this case.

## Rules
1. Keep roughly the 20-30% most relevant material; discard the rest
2. Preserve section headers and citations exactly as written
3. Copy text verbatim; do not paraphrase, summarize, or reorder sections
4. Do not add advice, opinions, predictions, or conclusions
5. If a passage is only partly relevant, keep the whole passage
6. Output only the extracted text, with no preamble or commentary

The output will be cached and shown to union representatives as reference
material, so fidelity to the source matters more than brevity.
"#;

/// Build the message pair for one extraction call.
pub fn extraction_request(facts: &CaseFacts, reference: &str) -> Vec<ChatMessage> {
    let articles = if facts.violated_articles.is_empty() {
        "none cited".to_string()
    } else {
        facts.violated_articles.join("; ")
    };

    let mut prompt = format!(
        "## Case Facts\n\nStatement: {}\n\nViolated articles: {}\n",
        facts.statement, articles
    );
    if let Some(desired) = &facts.settlement_desired {
        prompt.push_str(&format!("\nSettlement desired: {}\n", desired));
    }
    prompt.push_str(&format!("\n## Reference Material\n\n{}", reference));

    vec![
        ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> CaseFacts {
        CaseFacts {
            statement: "Suspended three days without a prior warning".into(),
            violated_articles: vec!["Article 9.1".into(), "Article 9.4".into()],
            settlement_desired: Some("Rescind suspension".into()),
        }
    }

    #[test]
    fn test_system_prompt_constrains_extraction() {
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("20-30%"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("citations"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("Do not add advice"));
    }

    #[test]
    fn test_request_carries_facts_and_reference() {
        let messages = extraction_request(&facts(), "Article 9: Discipline ...");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("Suspended three days"));
        assert!(messages[1].content.contains("Article 9.1; Article 9.4"));
        assert!(messages[1].content.contains("Rescind suspension"));
        assert!(messages[1].content.contains("Article 9: Discipline"));
    }

    #[test]
    fn test_request_without_articles_or_remedy() {
        let bare = CaseFacts {
            statement: "Statement".into(),
            violated_articles: vec![],
            settlement_desired: None,
        };
        let messages = extraction_request(&bare, "Reference");
        assert!(messages[1].content.contains("none cited"));
        assert!(!messages[1].content.contains("Settlement desired"));
    }
}
