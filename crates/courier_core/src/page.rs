/// Compose the self-contained XHTML document the pages endpoint expects:
/// doctype, a head carrying the title and the `created` timestamp, and the
/// already-sanitized fragment as the body.
///
/// `created_utc` is a preformatted RFC-3339 string so callers control the
/// clock; the body is embedded verbatim.
pub fn build_page_document(title: &str, created_utc: &str, body_html: &str) -> String {
    let safe_title = escape_text(title);
    format!(
        concat!(
            "<!DOCTYPE html>",
            "<html lang=\"en\">",
            "<head>",
            "<title>{title}</title>",
            "<meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\" />",
            "<meta name=\"created\" content=\"{created}\" />",
            "</head>",
            "<body>{body}</body>",
            "</html>"
        ),
        title = safe_title,
        created = created_utc,
        body = body_html,
    )
}

/// Minimal text escaping for embedding untrusted strings in markup.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
