//! The header block printed above each message body.

use mail_parser::{Address, Message};

/// Line printed under the header fields.
pub const SEPARATOR: &str = "====================================\n\n\n\n";

/// Presentation headers of one message. Absent fields stay empty and are
/// left out when rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    /// `Date:` in RFC 822 form.
    pub date: String,
    /// Bare `From:` addresses joined by `,`.
    pub from: String,
    /// Bare `To:` addresses joined by `,`.
    pub to: String,
    /// Bare `Cc:` addresses joined by `,`.
    pub cc: String,
    /// Decoded `Subject:`.
    pub subject: String,
}

impl HeaderBlock {
    /// Captures the presentation headers of a parsed message.
    #[must_use]
    pub fn from_message(message: &Message<'_>) -> Self {
        Self {
            date: message.date().map(|d| d.to_rfc822()).unwrap_or_default(),
            from: join_addresses(message.from()),
            to: join_addresses(message.to()),
            cc: join_addresses(message.cc()),
            subject: message.subject().unwrap_or_default().to_string(),
        }
    }

    /// Renders the block as plain text, separator included.
    #[must_use]
    pub fn render_text(&self) -> String {
        let fields = [
            ("Date:\t\t", &self.date),
            ("From:\t\t", &self.from),
            ("To:\t\t", &self.to),
            ("Cc:\t\t", &self.cc),
            ("Subject:\t", &self.subject),
        ];

        let mut out = String::new();
        for (label, value) in fields {
            if !value.is_empty() {
                out.push_str(label);
                out.push_str(value);
                out.push('\n');
            }
        }
        out.push_str(SEPARATOR);
        out
    }

    /// Renders the block for an HTML body: escaped and kept preformatted so
    /// the converter lays it out like the text version.
    #[must_use]
    pub fn render_html(&self) -> String {
        format!(
            "<pre>{}</pre>\n",
            html_escape::encode_text(&self.render_text())
        )
    }
}

fn join_addresses(address: Option<&Address<'_>>) -> String {
    let Some(address) = address else {
        return String::new();
    };

    let bare: Vec<&str> = match address {
        Address::List(list) => list.iter().filter_map(|addr| addr.address()).collect(),
        Address::Group(groups) => groups
            .iter()
            .flat_map(|group| group.addresses.iter())
            .filter_map(|addr| addr.address())
            .collect(),
    };
    bare.join(",")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mail_parser::MessageParser;

    use super::*;

    #[test]
    fn test_absent_fields_are_omitted() {
        let raw = b"From: a@x.com\r\nSubject: Test\r\n\r\nhello\r\n";
        let message = MessageParser::default().parse(raw).unwrap();
        let block = HeaderBlock::from_message(&message);

        assert_eq!(
            block.render_text(),
            format!("From:\t\ta@x.com\nSubject:\tTest\n{SEPARATOR}")
        );
    }

    #[test]
    fn test_addresses_are_bare_and_comma_joined() {
        let raw = b"From: Alice <a@x.com>\r\n\
To: Bob <b@y.com>, c@z.com\r\n\
Cc: Team: d@x.com, e@x.com;\r\n\
\r\n\
body\r\n";
        let message = MessageParser::default().parse(raw).unwrap();
        let block = HeaderBlock::from_message(&message);

        assert_eq!(block.from, "a@x.com");
        assert_eq!(block.to, "b@y.com,c@z.com");
        assert_eq!(block.cc, "d@x.com,e@x.com");
    }

    #[test]
    fn test_date_is_rendered() {
        let raw = b"Date: Tue, 1 Jul 2003 10:52:37 +0200\r\nFrom: a@x.com\r\n\r\nhi\r\n";
        let message = MessageParser::default().parse(raw).unwrap();
        let block = HeaderBlock::from_message(&message);

        assert!(block.render_text().starts_with("Date:\t\t"));
        assert!(block.date.contains("2003"));
    }

    #[test]
    fn test_html_rendering_escapes() {
        let block = HeaderBlock {
            from: "a@x.com".into(),
            subject: "<b>bold</b> & more".into(),
            ..HeaderBlock::default()
        };

        let html = block.render_html();
        assert!(html.starts_with("<pre>From:"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt; &amp; more"));
        assert!(html.ends_with("</pre>\n"));
    }

    #[test]
    fn test_empty_block_is_separator_only() {
        assert_eq!(HeaderBlock::default().render_text(), SEPARATOR);
    }
}
