use parley_llm::PromptMessage;

use crate::error::Result;
use crate::models::{Turn, TurnState};
use crate::store::ChatStore;

/// Earlier turns considered when rebuilding a conversation
pub const CONTEXT_TURN_LIMIT: usize = 200;

impl ChatStore {
    /// Conversation leading up to a turn, ready for the completion gateway
    ///
    /// Earlier turns contribute their current version as a user/assistant
    /// pair; turns still awaiting a reply are skipped. The target turn adds
    /// its current user message last. Only the most recent
    /// [`CONTEXT_TURN_LIMIT`] turns up to the target are read.
    pub async fn prompt_history(
        &self,
        user_id: &str,
        thread_id: &str,
        turn_id: &str,
    ) -> Result<(Turn, Vec<PromptMessage>)> {
        let target = self.get_turn(user_id, thread_id, turn_id).await?;
        let turns = self
            .client
            .list_turns_until(user_id, thread_id, target.created_at, CONTEXT_TURN_LIMIT + 1)
            .await?;

        let mut messages = Vec::new();
        for turn in turns
            .iter()
            .take_while(|t| t.id != target.id)
        {
            if turn.state() != TurnState::Complete {
                continue;
            }
            messages.push(PromptMessage::user(turn.user_content.clone()));
            if let Some(reply) = &turn.assistant_content {
                messages.push(PromptMessage::assistant(reply.clone()));
            }
        }
        messages.push(PromptMessage::user(target.user_content.clone()));

        Ok((target, messages))
    }
}
