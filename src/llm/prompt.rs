use super::{ChatMessage, CompletionRequest};

pub const SYSTEM_PROMPT: &str = r#"You are a mortgage broker's assistant. You help a broker pick the most suitable bank for a client's loan scenario.

RULES:
1. Base every statement on the context sections provided. Do not invent bank policies, rates or thresholds.
2. When the context does not cover the question, say so plainly.
3. Point out credit issues from the checklist that apply to the scenario.
4. When recommending a bank, name it and explain which policies decided it.
5. Keep answers concise. Use **bold** for bank names and key figures."#;

/// Prior user utterances in the current chat session, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    utterances: Vec<String>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    /// Utterances joined by newlines, in original order.
    pub fn joined(&self) -> String {
        self.utterances.join("\n")
    }
}

impl<S: Into<String>> FromIterator<S> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            utterances: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Build the user prompt: context blocks verbatim, then history, then the
/// query last.
pub fn build_prompt(request: &CompletionRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str("<CONTEXT>\n");
    prompt.push_str(&request.context);
    prompt.push_str("\n</CONTEXT>\n\n");

    for block in request.additional_context.iter().filter(|b| !b.trim().is_empty()) {
        prompt.push_str("<CONTEXT>\n");
        prompt.push_str(block);
        prompt.push_str("\n</CONTEXT>\n\n");
    }

    if !request.history.is_empty() {
        prompt.push_str("<PREVIOUS_CLIENT_MESSAGES>\n");
        prompt.push_str(&request.history.joined());
        prompt.push_str("\n</PREVIOUS_CLIENT_MESSAGES>\n\n");
    }

    prompt.push_str(&format!("Question: {}\n\n", request.query));
    prompt.push_str("Answer using ONLY the context above.");
    prompt
}

pub fn build_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_prompt(request)),
    ]
}

/// Offline stand-in used when no API key is configured.
pub fn mock_response(request: &CompletionRequest) -> String {
    let preview: String = request.context.chars().take(100).collect();
    format!(
        "Mock response for query: \"{}\". In a real implementation, this would use the context: \"{}...\" to provide relevant answers.",
        request.query, preview
    )
}
