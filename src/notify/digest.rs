use crate::models::Article;

const TEXT_WIDTH: usize = 80;

/// A rendered notification, ready for a [`Mailer`](super::Mailer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn render_digest(articles: &[Article], content_chars: usize) -> Digest {
    let subject = match articles.len() {
        1 => "RSS digest: 1 new article".to_string(),
        n => format!("RSS digest: {} new articles", n),
    };

    let mut text = String::new();
    let mut html = String::from("<html><body>\n");

    for article in articles {
        let title = display_title(article);
        let published = article.published_at.format("%Y-%m-%d %H:%M UTC");
        let snippet = article
            .content
            .as_deref()
            .map(|content| snippet(content, content_chars))
            .filter(|s| !s.is_empty());

        text.push_str(&format!("* {}\n  {}\n  {}\n", title, article.link, published));
        if let Some(snippet) = &snippet {
            text.push_str(&format!("  {}\n", snippet.replace('\n', "\n  ")));
        }
        text.push('\n');

        html.push_str(&format!(
            "<h3><a href=\"{}\">{}</a></h3>\n<p><small>{}</small></p>\n",
            escape_html(&article.link),
            escape_html(title),
            published
        ));
        if let Some(snippet) = &snippet {
            html.push_str(&format!("<p>{}</p>\n", escape_html(snippet)));
        }
    }
    html.push_str("</body></html>\n");

    Digest {
        subject,
        text,
        html,
    }
}

fn display_title(article: &Article) -> &str {
    if article.title.is_empty() {
        "(untitled)"
    } else {
        &article.title
    }
}

/// Plain text of an HTML fragment, cut to `max_chars`.
fn snippet(content: &str, max_chars: usize) -> String {
    let text = html2text::from_read(content.as_bytes(), TEXT_WIDTH)
        .unwrap_or_else(|_| content.to_string());
    let cleaned = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }
    let mut cut: String = cleaned.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(title: &str, content: Option<&str>) -> Article {
        Article {
            id: 1,
            feed_id: 1,
            title: title.to_string(),
            link: "http://a.test/post?a=1&b=2".to_string(),
            fingerprint: String::new(),
            content: content.map(str::to_string),
            published_at: Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 0).unwrap(),
            sent: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn subject_counts_articles() {
        assert_eq!(
            render_digest(&[article("X", None)], 50).subject,
            "RSS digest: 1 new article"
        );
        assert_eq!(
            render_digest(&[article("X", None), article("Y", None)], 50).subject,
            "RSS digest: 2 new articles"
        );
    }

    #[test]
    fn text_body_lists_title_link_and_date() {
        let digest = render_digest(&[article("Rust 2.0 <released>", Some("<p>Big news</p>"))], 50);

        assert!(digest.text.contains("* Rust 2.0 <released>"));
        assert!(digest.text.contains("http://a.test/post?a=1&b=2"));
        assert!(digest.text.contains("2026-02-03 04:05 UTC"));
        assert!(digest.text.contains("Big news"));
        assert!(!digest.text.contains("<p>"));
    }

    #[test]
    fn html_body_is_escaped() {
        let digest = render_digest(&[article("A & <B>", None)], 50);

        assert!(digest.html.contains("A &amp; &lt;B&gt;"));
        assert!(digest.html.contains("href=\"http://a.test/post?a=1&amp;b=2\""));
    }

    #[test]
    fn long_content_is_truncated() {
        let long = "word ".repeat(200);
        let digest = render_digest(&[article("X", Some(&long))], 20);

        assert!(digest.text.contains('…'));
        assert!(digest.text.len() < long.len());
    }

    #[test]
    fn empty_title_gets_placeholder() {
        let digest = render_digest(&[article("", None)], 20);
        assert!(digest.text.contains("(untitled)"));
    }
}
