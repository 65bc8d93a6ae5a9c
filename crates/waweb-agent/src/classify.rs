//! Recognises special commands before anything reaches the model.

/// Reply sent after a token has been stored.
pub const TOKEN_CONFIRMATION: &str =
    "Your GitHub token has been saved for this chat. You can now ask me to work with your repositories.";

/// What the history records in place of a submitted token.
pub const REDACTED_TOKEN_TURN: &str = "TOKEN: [redacted]";

const TOKEN_PREFIX: &str = "token:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// `TOKEN: <value>`; the value is stored and never sent upstream.
    TokenSubmission { token: String },
    Ordinary(String),
}

/// Classify an inbound message.
///
/// A token submission is `TOKEN:` (any ASCII case), optional whitespace and a
/// single non-empty token without inner whitespace. Anything else, including
/// `TOKEN:` with nothing after it, is ordinary text.
pub fn classify(text: &str) -> Classified {
    let trimmed = text.trim();
    let prefix_len = TOKEN_PREFIX.len();
    let has_prefix = trimmed
        .get(..prefix_len)
        .is_some_and(|p| p.eq_ignore_ascii_case(TOKEN_PREFIX));

    if has_prefix {
        let value = trimmed[prefix_len..].trim();
        if !value.is_empty() && !value.chars().any(char::is_whitespace) {
            return Classified::TokenSubmission {
                token: value.to_string(),
            };
        }
    }
    Classified::Ordinary(text.to_string())
}
