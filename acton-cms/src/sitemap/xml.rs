//! `urlset` document rendering

use chrono::{DateTime, SecondsFormat, Utc};
use std::borrow::Cow;
use std::fmt::{self, Write};

/// Sitemap namespace
pub const NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// How often a URL is expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFrequency {
    /// Site root
    Daily,
    /// Posts and terms
    Weekly,
    /// Pages
    Monthly,
}

impl ChangeFrequency {
    /// Protocol value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// One `<url>` element
#[derive(Debug, Clone, PartialEq)]
pub struct UrlEntry {
    /// Absolute URL
    pub loc: String,
    /// Last modification
    pub lastmod: Option<DateTime<Utc>>,
    /// Change frequency hint
    pub changefreq: ChangeFrequency,
    /// Priority between 0.0 and 1.0
    pub priority: f32,
}

impl UrlEntry {
    /// Entry for the site root
    #[must_use]
    pub fn root(base_url: &str) -> Self {
        Self {
            loc: format!("{}/", base_url.trim_end_matches('/')),
            lastmod: None,
            changefreq: ChangeFrequency::Daily,
            priority: 1.0,
        }
    }
}

/// Render entries as a sitemap document
#[must_use]
pub fn render_urlset(entries: &[UrlEntry]) -> String {
    let mut out = String::with_capacity(128 + entries.len() * 160);
    // Writing into a String cannot fail
    let _ = write_urlset(&mut out, entries);
    out
}

/// Write entries as a sitemap document into any formatter sink
///
/// # Errors
///
/// Returns the sink's error.
pub fn write_urlset(out: &mut impl Write, entries: &[UrlEntry]) -> fmt::Result {
    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(out, "<urlset xmlns=\"{NAMESPACE}\">")?;
    for entry in entries {
        writeln!(out, "  <url>")?;
        writeln!(out, "    <loc>{}</loc>", escape(&entry.loc))?;
        if let Some(lastmod) = entry.lastmod {
            writeln!(
                out,
                "    <lastmod>{}</lastmod>",
                lastmod.to_rfc3339_opts(SecondsFormat::Secs, true)
            )?;
        }
        writeln!(out, "    <changefreq>{}</changefreq>", entry.changefreq.as_str())?;
        writeln!(out, "    <priority>{:.1}</priority>", entry.priority)?;
        writeln!(out, "  </url>")?;
    }
    writeln!(out, "</urlset>")
}

/// Escape XML text content
#[must_use]
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_root_only_document() {
        let doc = render_urlset(&[UrlEntry::root("https://example.com/")]);
        assert_eq!(
            doc,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n  \
             <url>\n    <loc>https://example.com/</loc>\n    \
             <changefreq>daily</changefreq>\n    <priority>1.0</priority>\n  </url>\n\
             </urlset>\n"
        );
    }

    #[test]
    fn test_lastmod_and_escaping() {
        let entry = UrlEntry {
            loc: "https://example.com/search?a=1&b=2".into(),
            lastmod: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            changefreq: ChangeFrequency::Weekly,
            priority: 0.6,
        };
        let doc = render_urlset(&[entry]);
        assert!(doc.contains("<loc>https://example.com/search?a=1&amp;b=2</loc>"));
        assert!(doc.contains("<lastmod>2024-03-01T12:00:00Z</lastmod>"));
        assert!(doc.contains("<priority>0.6</priority>"));
    }

    #[test]
    fn test_escape_borrows_clean_text() {
        assert!(matches!(escape("plain"), Cow::Borrowed("plain")));
        assert_eq!(escape("<a & 'b'>"), "&lt;a &amp; &apos;b&apos;&gt;");
    }

    /// Sink that accepts a fixed number of bytes, then fails
    struct Budget(usize, String);

    impl Write for Budget {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if s.len() > self.0 {
                return Err(fmt::Error);
            }
            self.0 -= s.len();
            self.1.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn test_write_urlset_matches_render_and_propagates_sink_errors() {
        let entries = [
            UrlEntry::root("https://example.com"),
            UrlEntry {
                loc: "https://example.com/about".into(),
                lastmod: None,
                changefreq: ChangeFrequency::Monthly,
                priority: 0.8,
            },
        ];
        let rendered = render_urlset(&entries);

        let mut roomy = Budget(usize::MAX, String::new());
        write_urlset(&mut roomy, &entries).unwrap();
        assert_eq!(roomy.1, rendered);
        assert_eq!(rendered.matches("<url>").count(), 2);
        assert!(rendered.ends_with("</urlset>\n"));

        let mut tight = Budget(60, String::new());
        assert!(write_urlset(&mut tight, &entries).is_err());
        assert!(rendered.starts_with(&tight.1));
    }
}
