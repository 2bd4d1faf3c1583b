//! Telegram HTML rendering.

use crossrelay_traits::{FormattingSpan, SpanKind};

pub fn escape_html_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_html_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn open_tag(span: &FormattingSpan) -> Option<String> {
    let tag = match span.kind {
        SpanKind::Bold => "<b>".to_string(),
        SpanKind::Italic => "<i>".to_string(),
        SpanKind::Underline => "<u>".to_string(),
        SpanKind::Strikethrough => "<s>".to_string(),
        SpanKind::Code => "<code>".to_string(),
        SpanKind::Pre => match span.language.as_deref().filter(|lang| !lang.is_empty()) {
            Some(lang) => format!("<pre><code class=\"language-{}\">", escape_html_attr(lang)),
            None => "<pre>".to_string(),
        },
        SpanKind::TextLink => {
            let url = span.url.as_deref()?;
            format!("<a href=\"{}\">", escape_html_attr(url))
        }
        SpanKind::Url
        | SpanKind::Mention
        | SpanKind::Hashtag
        | SpanKind::BotCommand
        | SpanKind::Other => return None,
    };
    Some(tag)
}

fn close_tag(span: &FormattingSpan) -> Option<&'static str> {
    match span.kind {
        SpanKind::Bold => Some("</b>"),
        SpanKind::Italic => Some("</i>"),
        SpanKind::Underline => Some("</u>"),
        SpanKind::Strikethrough => Some("</s>"),
        SpanKind::Code => Some("</code>"),
        SpanKind::Pre if span.language.as_deref().is_some_and(|lang| !lang.is_empty()) => {
            Some("</code></pre>")
        }
        SpanKind::Pre => Some("</pre>"),
        SpanKind::TextLink if span.url.is_some() => Some("</a>"),
        _ => None,
    }
}

/// Escape `text` and wrap it in `spans`, outermost first.
pub fn wrap(text: &str, spans: &[FormattingSpan]) -> String {
    let mut out = String::new();
    for span in spans {
        if let Some(tag) = open_tag(span) {
            out.push_str(&tag);
        }
    }
    out.push_str(&escape_html_text(text));
    for span in spans.iter().rev() {
        if let Some(tag) = close_tag(span) {
            out.push_str(tag);
        }
    }
    out
}
