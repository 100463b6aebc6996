//! One chat thread: the visible message list, the conversation list, and
//! the send flow that keeps them consistent with the server.

use crate::api::models::Conversation;
use crate::api::{ApiError, ChatApi};
use crate::core::cache::ConversationCache;
use crate::core::message::{parse_timestamp, ChatMessage, Sender};
use std::sync::Arc;
use tracing::{debug, warn};

/// The optimistic half of a send: the user's message is already on screen
/// and must be either confirmed with a reply or taken back.
#[must_use = "a pending send must be committed or rolled back"]
#[derive(Debug)]
pub struct PendingSend {
    index: usize,
    message_id: String,
}

impl PendingSend {
    pub fn begin(messages: &mut Vec<ChatMessage>, message: ChatMessage) -> Self {
        let pending = Self {
            index: messages.len(),
            message_id: message.id.clone(),
        };
        messages.push(message);
        pending
    }

    pub fn commit(self, messages: &mut Vec<ChatMessage>, reply: ChatMessage) {
        messages.push(reply);
    }

    /// Remove the optimistic message again. A list that no longer holds it
    /// at its original position is left untouched.
    pub fn rollback(self, messages: &mut Vec<ChatMessage>) {
        if messages
            .get(self.index)
            .is_some_and(|message| message.id == self.message_id)
        {
            messages.remove(self.index);
        }
    }
}

pub struct ChatSession<A: ChatApi> {
    api: Arc<A>,
    cache: ConversationCache,
    messages: Vec<ChatMessage>,
    conversations: Vec<Conversation>,
    current_conversation_id: Option<i64>,
    is_typing: bool,
    is_loading: bool,
    error: Option<String>,
    local_ids: u64,
}

impl<A: ChatApi> ChatSession<A> {
    pub fn new(api: Arc<A>, cache: ConversationCache) -> Self {
        Self {
            api,
            cache,
            messages: Vec::new(),
            conversations: Vec::new(),
            current_conversation_id: None,
            is_typing: false,
            is_loading: false,
            error: None,
            local_ids: 0,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn current_conversation_id(&self) -> Option<i64> {
        self.current_conversation_id
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn next_local_id(&mut self) -> String {
        self.local_ids += 1;
        format!("local-{}", self.local_ids)
    }

    /// Send `text` into the current conversation, or start a new one when
    /// none is active. Blank input is ignored.
    ///
    /// The user's message is shown before the request goes out. On failure
    /// it is removed again and the error is both recorded and returned.
    pub async fn send_message(&mut self, text: &str) -> Result<(), ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        self.error = None;
        self.is_typing = true;

        let local_id = self.next_local_id();
        let pending = PendingSend::begin(
            &mut self.messages,
            ChatMessage::new(local_id, text, Sender::User),
        );

        let sent_into = self.current_conversation_id;
        let result = self.api.send_message(text, sent_into).await;
        self.is_typing = false;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "failed to send message");
                pending.rollback(&mut self.messages);
                self.error = Some(err.message().to_string());
                return Err(err);
            }
        };

        let reply_id = self.next_local_id();
        let reply = ChatMessage {
            id: reply_id,
            text: response.content,
            sender: Sender::Assistant,
            timestamp: response.timestamp.as_deref().and_then(parse_timestamp),
        };
        pending.commit(&mut self.messages, reply);

        if let Some(conversation_id) = response.conversation_id {
            self.cache.invalidate(conversation_id);
            if sent_into.is_none() {
                debug!(conversation_id, "server opened a new conversation");
                self.current_conversation_id = Some(conversation_id);
                // A failed reload is recorded but does not undo the send.
                let _ = self.load_conversations().await;
            }
        }

        Ok(())
    }

    pub async fn load_conversations(&mut self) -> Result<(), ApiError> {
        self.is_loading = true;
        let result = self.api.list_conversations().await;
        self.is_loading = false;

        match result {
            Ok(conversations) => {
                self.conversations = conversations;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to load conversations");
                self.error = Some(err.message().to_string());
                Err(err)
            }
        }
    }

    /// Show the history of `conversation_id`, from the local cache when it
    /// holds a usable copy and from the server otherwise.
    pub async fn load_messages(&mut self, conversation_id: i64) -> Result<(), ApiError> {
        if let Some(cached) = self.cache.read(conversation_id) {
            debug!(conversation_id, "serving messages from cache");
            self.messages = cached;
            self.current_conversation_id = Some(conversation_id);
            return Ok(());
        }

        self.is_loading = true;
        let result = self.api.fetch_messages(conversation_id).await;
        self.is_loading = false;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(conversation_id, error = %err, "failed to load messages");
                self.error = Some(err.message().to_string());
                return Err(err);
            }
        };

        if let Err(err) = self.cache.write(conversation_id, &response.messages) {
            warn!(conversation_id, error = %err, "could not cache messages");
        }

        self.messages = response
            .messages
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| ChatMessage::from_raw(conversation_id, index, raw))
            .collect();
        self.current_conversation_id = Some(conversation_id);
        Ok(())
    }

    pub fn start_new_conversation(&mut self) {
        self.messages.clear();
        self.current_conversation_id = None;
        self.error = None;
    }
}
