//! Notification text for alerts.

use crate::models::{Alert, ChannelKind, Envelope};
use serde::Serialize;

/// Token used in deep links when the image reference cannot be parsed
pub const FALLBACK_TOKEN: &str = "unknown";

const SUBJECT: &str = "Weapon Detected!";
const TRUNCATION_MARKER: &str = "...";

/// Longest stem accepted as a correlation token
pub const MAX_TOKEN_CHARS: usize = 64;

/// Structured view of a stored image reference: `base/stem.extension`
///
/// Accepts bare storage paths (`media/uploads/9f1c.jpg`) as well as URLs,
/// in which case scheme, query and fragment are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub base_path: String,
    pub stem: String,
    pub extension: String,
}

impl ImageRef {
    /// Parse a reference, returning `None` for anything malformed
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.split(|c: char| c == '?' || c == '#').next().unwrap_or_default();
        let path = match raw.split_once("://") {
            Some((_, rest)) => rest,
            None => raw,
        };

        let (base_path, file_name) = path.rsplit_once('/')?;
        let (stem, extension) = file_name.rsplit_once('.')?;

        let valid_stem = stem.chars().count() <= MAX_TOKEN_CHARS
            && stem.chars().any(|c| c.is_ascii_alphanumeric())
            && stem
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        let valid_extension =
            !extension.is_empty() && extension.chars().all(|c| c.is_ascii_alphanumeric());

        if !valid_stem || !valid_extension {
            return None;
        }

        Some(Self {
            base_path: base_path.to_string(),
            stem: stem.to_string(),
            extension: extension.to_string(),
        })
    }

    /// Correlation token for `raw`, falling back to [`FALLBACK_TOKEN`]
    pub fn token(raw: &str) -> String {
        match Self::parse(raw) {
            Some(image) => image.stem,
            None => {
                tracing::debug!(image_ref = %raw, "Unparseable image reference, using fallback token");
                FALLBACK_TOKEN.to_string()
            }
        }
    }
}

/// Subject and bodies for one notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedMessage {
    pub subject: String,
    pub text_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}

impl ComposedMessage {
    pub fn into_envelope(self, to: impl Into<String>) -> Envelope {
        Envelope {
            to: to.into(),
            subject: self.subject,
            text_body: self.text_body,
            html_body: self.html_body,
        }
    }
}

/// Builds notification text from alert attributes
#[derive(Debug, Clone)]
pub struct MessageComposer {
    link_base_url: String,
    sms_max_chars: usize,
}

impl MessageComposer {
    pub fn new(link_base_url: impl Into<String>, sms_max_chars: usize) -> Self {
        let link_base_url = link_base_url.into().trim_end_matches('/').to_string();
        Self {
            link_base_url,
            sms_max_chars,
        }
    }

    /// Deep link to the alert detail view
    pub fn alert_link(&self, alert: &Alert) -> String {
        format!("{}/alert/{}", self.link_base_url, ImageRef::token(&alert.image_ref))
    }

    /// Compose for the given channel
    pub fn compose_for(&self, alert: &Alert, channel: ChannelKind) -> ComposedMessage {
        match channel {
            ChannelKind::Email => self.compose(alert),
            ChannelKind::Sms => self.compose_sms(alert),
        }
    }

    /// Full message with plain text and HTML bodies
    pub fn compose(&self, alert: &Alert) -> ComposedMessage {
        let link = self.alert_link(alert);

        ComposedMessage {
            subject: SUBJECT.to_string(),
            text_body: self.build_plain_text(alert, &link),
            html_body: Some(self.build_html(alert, &link)),
        }
    }

    /// Short plain-text message bounded by the SMS budget
    ///
    /// The link leads the body. When the link itself would not fit, the
    /// fallback token is linked instead so truncation never cuts a link.
    pub fn compose_sms(&self, alert: &Alert) -> ComposedMessage {
        let mut body = format!("{} View alert at {}", SUBJECT, self.alert_link(alert));
        if body.chars().count() > self.sms_max_chars {
            body = format!(
                "{} View alert at {}/alert/{}",
                SUBJECT, self.link_base_url, FALLBACK_TOKEN
            );
        }
        if alert.has_location() {
            body.push_str("\nLocation: ");
            body.push_str(alert.location.trim());
        }

        ComposedMessage {
            subject: SUBJECT.to_string(),
            text_body: truncate_chars(&body, self.sms_max_chars),
            html_body: None,
        }
    }

    fn build_plain_text(&self, alert: &Alert, link: &str) -> String {
        let location = if alert.has_location() {
            alert.location.trim()
        } else {
            "Not provided"
        };

        format!(
            r#"{} View alert at {}

Location: {}
Detected at: {}
Alert ID: {}

---
Weapon Detection System
This is an automated message, please do not reply.
"#,
            SUBJECT,
            link,
            location,
            alert.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            alert.id,
        )
    }

    fn build_html(&self, alert: &Alert, link: &str) -> String {
        let location = if alert.has_location() {
            escape_html(alert.location.trim())
        } else {
            "Not provided".to_string()
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif;
            line-height: 1.6;
            color: #333;
            max-width: 600px;
            margin: 0 auto;
            padding: 20px;
        }}
        .header {{
            background-color: #d00000;
            color: white;
            padding: 20px;
            border-radius: 8px;
            font-size: 24px;
            font-weight: bold;
        }}
        .details {{
            background-color: #f8f9fa;
            padding: 15px;
            border-radius: 8px;
            margin-top: 20px;
        }}
        .button {{
            display: inline-block;
            background-color: #0077b6;
            color: white;
            padding: 10px 16px;
            border-radius: 4px;
            text-decoration: none;
        }}
        .footer {{
            margin-top: 30px;
            font-size: 12px;
            color: #6c757d;
            text-align: center;
        }}
    </style>
</head>
<body>
    <div class="header">{}</div>
    <div class="details">
        <p><strong>Location:</strong> {}</p>
        <p><strong>Detected at:</strong> {}</p>
        <p><strong>Alert ID:</strong> {}</p>
        <p><a class="button" href="{}">View alert</a></p>
    </div>
    <div class="footer">
        This notification was sent by <strong>Weapon Detection System</strong>
    </div>
</body>
</html>
"#,
            SUBJECT,
            location,
            alert.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            alert.id,
            link,
        )
    }
}

/// Cut `text` to at most `max` characters, marking the cut with `...`
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let keep = max.saturating_sub(TRUNCATION_MARKER.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer() -> MessageComposer {
        MessageComposer::new("https://weapondetectionsystem.onrender.com/", 160)
    }

    fn alert(image_ref: &str, location: &str) -> Alert {
        Alert::new(image_ref, "alice@example.com", location, "user-1")
    }

    #[test]
    fn test_image_ref_parse() {
        let image = ImageRef::parse("media/uploads/9f1c2b7e-aa01.jpg").unwrap();
        assert_eq!(image.base_path, "media/uploads");
        assert_eq!(image.stem, "9f1c2b7e-aa01");
        assert_eq!(image.extension, "jpg");

        let image =
            ImageRef::parse("https://bucket.s3.amazonaws.com/media/abc123.png?X-Amz-Expires=3600")
                .unwrap();
        assert_eq!(image.stem, "abc123");
        assert_eq!(image.extension, "png");

        // only the last dot separates the extension
        let image = ImageRef::parse("media/uploads/9f1c....jpg").unwrap();
        assert_eq!(image.stem, "9f1c...");
    }

    #[test]
    fn test_image_ref_malformed() {
        for raw in [
            "",
            "   ",
            "media/uploads/9f1c",
            "9f1c.jpg",
            "media/uploads/.jpg",
            "media/uploads/....jpg",
            "media/uploads/9f1c.",
            "media/uploads/",
            "media/up loads/we ird.jpg",
            "https://host.example.com",
        ] {
            assert!(ImageRef::parse(raw).is_none(), "{:?}", raw);
            assert_eq!(ImageRef::token(raw), FALLBACK_TOKEN);
        }
    }

    #[test]
    fn test_compose_email_link() {
        let alert = alert("media/uploads/9f1c2b7e.jpg", "Quito");
        let message = composer().compose(&alert);

        assert_eq!(message.subject, "Weapon Detected!");
        assert!(message
            .text_body
            .contains("https://weapondetectionsystem.onrender.com/alert/9f1c2b7e"));
        assert!(message.text_body.contains("Location: Quito"));
        assert!(message.text_body.contains(&alert.id.to_string()));
        let html = message.html_body.unwrap();
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("/alert/9f1c2b7e"));
    }

    #[test]
    fn test_compose_malformed_ref_never_panics() {
        for raw in ["", "no-extension", "nopath.jpg"] {
            let message = composer().compose(&alert(raw, ""));
            assert!(message.text_body.contains("/alert/unknown"));
            assert!(message.text_body.contains("Location: Not provided"));
        }
    }

    #[test]
    fn test_compose_sms_within_budget() {
        let long_location = "Av. Amazonas y Naciones Unidas, ".repeat(20);
        let alert = alert("media/uploads/9f1c2b7e.jpg", &long_location);
        let message = composer().compose_sms(&alert);

        assert!(message.html_body.is_none());
        assert!(message.text_body.chars().count() <= 160);
        assert!(message.text_body.ends_with("..."));
        assert!(message.text_body.contains("/alert/9f1c2b7e"));
    }

    #[test]
    fn test_compose_sms_short_message_untouched() {
        let alert = alert("media/uploads/9f1c.jpg", "");
        let message = composer().compose_sms(&alert);
        assert_eq!(
            message.text_body,
            "Weapon Detected! View alert at https://weapondetectionsystem.onrender.com/alert/9f1c"
        );
    }

    #[test]
    fn test_overlong_stem_falls_back() {
        let stem = "a".repeat(MAX_TOKEN_CHARS + 1);
        let raw = format!("media/uploads/{}.jpg", stem);
        assert!(ImageRef::parse(&raw).is_none());
        assert_eq!(ImageRef::token(&raw), FALLBACK_TOKEN);

        let stem = "b".repeat(MAX_TOKEN_CHARS);
        let raw = format!("media/uploads/{}.jpg", stem);
        assert_eq!(ImageRef::token(&raw), stem);
    }

    #[test]
    fn test_compose_sms_keeps_link_whole() {
        // the longest accepted stem does not fit a 100 char budget
        let composer = MessageComposer::new("https://weapondetectionsystem.onrender.com", 100);
        let raw = format!("media/uploads/{}.jpg", "c".repeat(MAX_TOKEN_CHARS));
        let message = composer.compose_sms(&alert(&raw, "Quito"));

        assert!(message.text_body.chars().count() <= 100);
        assert!(message
            .text_body
            .contains("https://weapondetectionsystem.onrender.com/alert/unknown"));
        assert!(!message.text_body.contains("ccc"));
    }

    #[test]
    fn test_truncate_multibyte() {
        let text = "ñandú ".repeat(10);
        let truncated = truncate_chars(&text, 12);
        assert_eq!(truncated.chars().count(), 12);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_html_escapes_location() {
        let alert = alert("media/a1.jpg", "<script>x</script>");
        let html = composer().compose(&alert).html_body.unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>x"));
    }
}
