//! Conversational intake controller.
//!
//! A small per-session state machine. Each session is **gathering** while
//! the user has sent fewer than `intake_turns` messages and **ready** from
//! then on; there is no terminal state and no reset beyond starting a new
//! session id. In the ready state every turn carries a suggestions
//! attachment produced by matching the space-joined user turns against the
//! corpus at a looser similarity threshold than the one-shot API, since
//! conversational text is noisier and a narrow threshold would starve
//! results.

use std::sync::Arc;

use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::models::{StoryMatch, TurnRole};
use crate::reply::ReplyProvider;
use crate::service::MatchService;
use crate::session::SessionStore;

/// Fixed instruction for the reply service. The service contract, not
/// reimplemented logic: it forbids advice and diagnosis and caps reply
/// length.
pub const INTAKE_SYSTEM_PROMPT: &str = "\
You are a compassionate listener helping someone put what they are going \
through into words.

Your role:
1. Listen and acknowledge their feelings.
2. Ask gentle clarifying questions to understand their situation.
3. Help them express their feelings clearly.

You do NOT give advice or solutions, act as a therapist or counselor, or \
make diagnoses or judgments.

Keep responses brief, two to three sentences, and warm. Focus on \
understanding, not fixing.";

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: String,
    pub reply: String,
    /// True once the session has gathered enough user turns for matching.
    pub ready_for_suggestions: bool,
    /// Attached (possibly empty) when ready; omitted when the suggestion
    /// step failed or the session is still gathering.
    pub suggestions: Option<Vec<StoryMatch>>,
}

/// Per-session orchestration of reply + suggestion matching.
pub struct ChatController {
    service: Arc<MatchService>,
    sessions: Arc<dyn SessionStore>,
    replies: Arc<dyn ReplyProvider>,
    config: ChatConfig,
}

impl ChatController {
    pub fn new(
        service: Arc<MatchService>,
        sessions: Arc<dyn SessionStore>,
        replies: Arc<dyn ReplyProvider>,
        config: ChatConfig,
    ) -> Self {
        Self {
            service,
            sessions,
            replies,
            config,
        }
    }

    /// Create the session if absent. Idempotent.
    pub async fn start(&self, session_id: &str) {
        self.sessions.open(session_id).await;
    }

    /// Append a user message, fetch the assistant reply, and attach
    /// suggestions once the intake threshold is reached.
    ///
    /// The session lock is held for the whole turn, so concurrent sends to
    /// one session serialize while other sessions proceed untouched. A
    /// reply-service failure fails the turn (`ChatServiceUnavailable`); a
    /// suggestion-matching failure is logged and swallowed so it never
    /// blocks the conversational reply itself.
    pub async fn send(&self, session_id: &str, message: &str) -> Result<ChatOutcome> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("message must not be empty".to_string()));
        }
        if message.chars().count() > self.config.max_message_chars {
            return Err(Error::InvalidInput(format!(
                "message exceeds {} characters",
                self.config.max_message_chars
            )));
        }

        let handle = self.sessions.open(session_id).await;
        let mut session = handle.lock().await;

        session.append(TurnRole::User, trimmed);

        let reply = self
            .replies
            .reply(INTAKE_SYSTEM_PROMPT, session.turns())
            .await?;

        session.append(TurnRole::Assistant, reply.clone());

        let ready_for_suggestions = session.user_turn_count() >= self.config.intake_turns;
        let suggestions = if ready_for_suggestions {
            self.suggest(&session.combined_user_text()).await
        } else {
            None
        };

        Ok(ChatOutcome {
            session_id: session_id.to_string(),
            reply,
            ready_for_suggestions,
            suggestions,
        })
    }

    /// Best-effort suggestion matching over the combined user text.
    ///
    /// Long conversations can push the joined text past the match API's
    /// size bound; the query is clamped so suggestions keep flowing instead
    /// of tripping the input validation forever.
    async fn suggest(&self, combined_user_text: &str) -> Option<Vec<StoryMatch>> {
        let max_chars = self.service.max_query_chars();
        let clamped: String = combined_user_text.chars().take(max_chars).collect();
        match self
            .service
            .match_stories(
                &clamped,
                self.config.suggestion_top_k,
                self.config.suggestion_min_similarity,
            )
            .await
        {
            Ok(outcome) => Some(outcome.matches),
            Err(error) => {
                tracing::warn!(%error, "suggestion matching failed, returning reply without suggestions");
                None
            }
        }
    }
}
