use courier_engine::{sanitize, sanitize_with_base};
use pretty_assertions::assert_eq;
use url::Url;

#[test]
fn strips_scripting_and_chrome_elements() {
    let html = "<p>keep</p><script>alert(1)</script><nav>menu</nav><footer>fine print</footer>";
    assert_eq!(sanitize(html), "<p>keep</p>");
}

#[test]
fn drops_elements_flagged_by_class_or_id() {
    let html = "<div class=\"sidebar\">x</div><div id=\"comments\">y</div>\
                <div class=\"share-buttons\">z</div><p>keep</p>";
    assert_eq!(sanitize(html), "<p>keep</p>");
}

#[test]
fn ad_tokens_need_word_boundaries() {
    let html = "<div class=\"ad-slot\">sold</div><div class=\"read-more\"><p>keep</p></div>";
    assert_eq!(sanitize(html), "<div><p>keep</p></div>");
}

#[test]
fn unwraps_anchors_keeping_their_text() {
    let html = "<p>read <a href=\"https://example.com\">this article</a> now</p>";
    assert_eq!(sanitize(html), "<p>read this article now</p>");
}

#[test]
fn strips_presentation_attributes_but_keeps_resources() {
    let html = "<p style=\"color:red\" class=\"big\" onclick=\"x()\">text</p>\
                <img src=\"https://example.com/a.png\" alt=\"pic\" width=\"10\" />";
    assert_eq!(
        sanitize(html),
        "<p>text</p><img src=\"https://example.com/a.png\" alt=\"pic\" />"
    );
}

#[test]
fn collapses_paragraphs_with_no_visible_content() {
    let html = "<p>   </p><p><span></span></p><p>real</p>";
    assert_eq!(sanitize(html), "<p>real</p>");
}

#[test]
fn keeps_paragraphs_that_carry_only_an_image() {
    let html = "<p><img src=\"https://example.com/a.png\" /></p>";
    assert_eq!(
        sanitize(html),
        "<p><img src=\"https://example.com/a.png\" /></p>"
    );
}

#[test]
fn resolves_relative_image_sources_against_the_base() {
    let base = Url::parse("https://example.com/articles/post.html").unwrap();
    let html = "<img src=\"../images/pic.png\" />";
    assert_eq!(
        sanitize_with_base(html, Some(&base)),
        "<img src=\"https://example.com/images/pic.png\" />"
    );
}

#[test]
fn leaves_absolute_and_data_sources_alone() {
    let base = Url::parse("https://example.com/").unwrap();
    let html =
        "<img src=\"https://cdn.example.net/x.png\" /><img src=\"data:image/png;base64,AAAA\" />";
    assert_eq!(sanitize_with_base(html, Some(&base)), html);
}

#[test]
fn comments_and_doctypes_disappear() {
    let html = "<!-- tracking --><p>visible</p>";
    assert_eq!(sanitize(html), "<p>visible</p>");
}

#[test]
fn sanitization_is_idempotent() {
    let html = "<div class=\"post\"><p>one <a href=\"/x\">link</a></p><script>x</script>\
                <p></p><img src=\"/rel.png\" alt=\"&amp; more\" /></div>";
    let once = sanitize(html);
    assert_eq!(sanitize(&once), once);

    let base = Url::parse("https://example.com/a/b").unwrap();
    let resolved = sanitize_with_base(html, Some(&base));
    assert_eq!(sanitize(&resolved), resolved);
}

#[test]
fn malformed_markup_never_panics() {
    let html = "<p>unclosed <div><b>nested</p></div></b> tail";
    let out = sanitize(html);
    assert!(out.contains("unclosed"));
    assert!(out.contains("tail"));
    assert_eq!(sanitize(&out), out);
}

#[test]
fn text_entities_stay_escaped() {
    let html = "<p>fish &amp; chips &lt;small&gt;</p>";
    assert_eq!(sanitize(html), "<p>fish &amp; chips &lt;small&gt;</p>");
}
