//! Prompt formatting
//!
//! Renders a [`Conversation`] into the linear prompt the engine continues.
//! The tag vocabulary here is the same one the stop-tag detector watches for,
//! so the two must change together.

use crate::types::message::{Conversation, Role};

pub const SYSTEM_OPEN: &str = "<system>";
pub const SYSTEM_CLOSE: &str = "</system>";
pub const HUMAN_PREFIX: &str = "<human>: ";
pub const ASSISTANT_PREFIX: &str = "<assistant>: ";

/// Formats `conversation` as a tagged transcript ending with an open assistant turn.
///
/// Only the first system message is rendered, as a `<system>` block at the top
/// (and only when it has content). Later system messages are dropped.
pub fn format_prompt(conversation: &Conversation) -> String {
    let mut prompt = String::new();

    if let Some(system) = conversation.system_prompt().filter(|s| !s.is_empty()) {
        prompt.push_str(SYSTEM_OPEN);
        prompt.push('\n');
        prompt.push_str(system);
        prompt.push('\n');
        prompt.push_str(SYSTEM_CLOSE);
        prompt.push_str("\n\n");
    }

    for message in conversation.messages() {
        let prefix = match message.role {
            Role::System => continue,
            Role::User => HUMAN_PREFIX,
            Role::Assistant => ASSISTANT_PREFIX,
        };
        prompt.push_str(prefix);
        prompt.push_str(&message.content);
        prompt.push('\n');
    }

    prompt.push_str(ASSISTANT_PREFIX);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::message::Message;

    fn conversation(messages: &[(Role, &str)]) -> Conversation {
        Conversation::new(
            messages
                .iter()
                .map(|(role, content)| Message::new(*role, *content))
                .collect(),
        )
    }

    #[test]
    fn test_full_transcript() {
        let conv = conversation(&[
            (Role::System, "S"),
            (Role::User, "A"),
            (Role::Assistant, "B"),
            (Role::User, "C"),
        ]);

        assert_eq!(
            format_prompt(&conv),
            "<system>\nS\n</system>\n\n<human>: A\n<assistant>: B\n<human>: C\n<assistant>: "
        );
    }

    #[test]
    fn test_later_system_messages_dropped() {
        let conv = conversation(&[
            (Role::System, "S"),
            (Role::User, "A"),
            (Role::System, "ignored"),
        ]);

        let prompt = format_prompt(&conv);
        assert_eq!(prompt, "<system>\nS\n</system>\n\n<human>: A\n<assistant>: ");
        assert!(!prompt.contains("ignored"));
    }

    #[test]
    fn test_system_message_after_user_still_leads() {
        let conv = conversation(&[(Role::User, "A"), (Role::System, "S")]);
        assert_eq!(
            format_prompt(&conv),
            "<system>\nS\n</system>\n\n<human>: A\n<assistant>: "
        );
    }

    #[test]
    fn test_no_system_message() {
        let conv = conversation(&[(Role::User, "Hello")]);
        assert_eq!(format_prompt(&conv), "<human>: Hello\n<assistant>: ");
    }

    #[test]
    fn test_empty_system_message_omitted() {
        let conv = conversation(&[(Role::System, ""), (Role::User, "Hi")]);
        assert_eq!(format_prompt(&conv), "<human>: Hi\n<assistant>: ");
    }

    #[test]
    fn test_deterministic() {
        let conv = conversation(&[(Role::User, "x"), (Role::Assistant, "y")]);
        assert_eq!(format_prompt(&conv), format_prompt(&conv));
    }
}
