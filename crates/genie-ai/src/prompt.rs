//! Text composition for user turns and backend payloads.

use crate::Message;

/// Build the text of a user turn.
///
/// `inline_system` is set when the backend rejects the system role and this
/// is the first turn of the session.
pub fn user_turn(prompt: &str, context: Option<&str>, inline_system: Option<&str>) -> String {
    let mut text = String::new();
    if let Some(system) = inline_system.filter(|s| !s.trim().is_empty()) {
        text.push_str("<SystemPrompt>");
        text.push_str(system);
        text.push_str("</SystemPrompt>\n");
    }
    text.push_str("<UserPrompt>");
    text.push_str(prompt);
    text.push_str("</UserPrompt>");
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        text.push_str("\n<EditorContext>\n");
        text.push_str(context);
        text.push_str("\n</EditorContext>");
    }
    text
}

/// Message text as sent to a backend, with attachments appended as
/// `File: {path}` blocks.
pub fn render_content(message: &Message) -> String {
    if message.attachments.is_empty() {
        return message.content.clone();
    }
    let mut out = message.content.clone();
    for attachment in &message.attachments {
        out.push_str("\n\nFile: ");
        out.push_str(&attachment.path);
        out.push('\n');
        out.push_str(&attachment.excerpt);
    }
    out
}
