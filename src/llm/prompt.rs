//! Prompt construction for generation requests.
//!
//! Builds the system prompt with database schema context and maps session
//! history onto chat messages.

use crate::db::Schema;
use crate::llm::types::Message;
use crate::session::{ConversationMessage, Role as HistoryRole};

/// System prompt template for the SQL assistant.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a SQL assistant. Translate user questions into a single SQL statement for the database described below.

{schema}
INSTRUCTIONS:
- Use only tables and columns from the schema
- Quote identifiers marked [quote this identifier] with the database's identifier quote character
- Use appropriate JOINs based on foreign keys
- Limit results to 100 rows unless the user specifies otherwise
- If the question cannot be answered with the schema, do not write SQL; ask a short follow-up question instead

OUTPUT FORMAT:
Return the SQL statement wrapped in a ```sql code block, followed by one sentence of explanation.
End with a line `Confidence: <number between 0 and 1>`."#;

/// Builds the system prompt with the database schema injected.
pub fn build_system_prompt(schema: &Schema) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{schema}", &schema.format_for_llm())
}

/// Builds the message list for one generation request.
///
/// The system prompt comes first, then the usable part of `history`, then
/// the question.
pub fn build_messages(
    question: &str,
    schema: &Schema,
    history: &[ConversationMessage],
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(build_system_prompt(schema)));
    messages.extend(history.iter().filter_map(|entry| {
        let text = entry.prompt_text()?;
        Some(match entry.role {
            HistoryRole::User => Message::user(text),
            HistoryRole::Assistant => Message::assistant(text),
        })
    }));
    messages.push(Message::user(question));
    messages
}
