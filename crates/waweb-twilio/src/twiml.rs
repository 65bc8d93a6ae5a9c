//! Minimal TwiML rendering for webhook responses.

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Render a `<Response>` with one `<Message>` per entry.
/// No entries gives an empty acknowledgement.
pub fn twiml_response(messages: &[String]) -> String {
    if messages.is_empty() {
        return format!("{XML_DECL}<Response/>");
    }
    let mut out = format!("{XML_DECL}<Response>");
    for msg in messages {
        out.push_str("<Message>");
        out.push_str(&escape_xml(msg));
        out.push_str("</Message>");
    }
    out.push_str("</Response>");
    out
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
