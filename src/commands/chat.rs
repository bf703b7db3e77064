use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::context::ContextSource;
use crate::llm::{CompletionBackend, ConversationHistory};
use crate::markdown;

pub const GREETING: &str = "Hello! I'm your mortgage policy assistant. Describe your client's scenario or ask about any bank's policies and I'll help you find the best fit.";

pub const APOLOGY: &str =
    "I apologize, but I encountered an error while processing your request. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Local>,
}

impl Message {
    fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            content: content.into(),
            sender,
            timestamp: Local::now(),
        }
    }

    /// Content with the markdown subset rendered to HTML.
    pub fn html(&self) -> String {
        markdown::to_html(&self.content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Blank,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Answered,
    /// The provider or the context store failed; the apology was appended.
    Apologized,
    Rejected(Rejection),
}

/// Notifications for the view layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A message was appended at `index`; the view should scroll to it.
    MessageAppended { index: usize, message: Message },
    StateChanged(TurnState),
}

type Listener = Box<dyn Fn(&SessionEvent) + Send + Sync>;

struct SessionState {
    messages: Vec<Message>,
    turn: TurnState,
    input: String,
}

/// One ephemeral chat session.
///
/// The message log is append-only and starts with a single greeting from
/// the bot. At most one turn is in flight: a submit while a response is
/// pending is rejected, so replies land in submission order.
pub struct ChatSession {
    backend: Arc<dyn CompletionBackend>,
    context: ContextSource,
    state: Mutex<SessionState>,
    listener: Option<Listener>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn CompletionBackend>, context: ContextSource) -> Self {
        Self {
            backend,
            context,
            state: Mutex::new(SessionState {
                messages: vec![Message::new(Sender::Bot, GREETING)],
                turn: TurnState::Idle,
                input: String::new(),
            }),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    // The log is only ever appended to, so a panic elsewhere cannot leave
    // it half-written.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: Vec<SessionEvent>) {
        if let Some(listener) = &self.listener {
            for event in &events {
                listener(event);
            }
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn turn_state(&self) -> TurnState {
        self.lock().turn
    }

    pub fn input(&self) -> String {
        self.lock().input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.lock().input = text.into();
    }

    /// Submit whatever is in the input buffer.
    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = self.input();
        self.submit(&text).await
    }

    /// Run one turn: append `text` as a user message, ask the completion
    /// backend, append its answer (or the apology) as a bot message.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Rejected(Rejection::Blank);
        }

        let (history, events) = {
            let mut state = self.lock();
            if state.turn == TurnState::AwaitingResponse {
                tracing::debug!("Submit rejected: a response is still pending");
                return SubmitOutcome::Rejected(Rejection::Busy);
            }

            let history: ConversationHistory = state
                .messages
                .iter()
                .filter(|m| m.sender == Sender::User)
                .map(|m| m.content.clone())
                .collect();

            let message = Message::new(Sender::User, text);
            state.messages.push(message.clone());
            state.input.clear();
            state.turn = TurnState::AwaitingResponse;

            let events = vec![
                SessionEvent::MessageAppended {
                    index: state.messages.len() - 1,
                    message,
                },
                SessionEvent::StateChanged(TurnState::AwaitingResponse),
            ];
            (history, events)
        };
        self.emit(events);

        let (content, outcome) = match self.context.build_request(text, history) {
            Ok(request) => match self.backend.generate_chat_response(&request).await {
                Ok(answer) => (answer, SubmitOutcome::Answered),
                Err(e) => {
                    tracing::error!(error = %e, "Chat completion failed");
                    (APOLOGY.to_string(), SubmitOutcome::Apologized)
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to gather policy context");
                (APOLOGY.to_string(), SubmitOutcome::Apologized)
            }
        };

        let events = {
            let mut state = self.lock();
            let message = Message::new(Sender::Bot, content);
            state.messages.push(message.clone());
            state.turn = TurnState::Idle;
            vec![
                SessionEvent::MessageAppended {
                    index: state.messages.len() - 1,
                    message,
                },
                SessionEvent::StateChanged(TurnState::Idle),
            ]
        };
        self.emit(events);

        outcome
    }
}
