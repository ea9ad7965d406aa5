//! Dual-pass renderer for assistant answer text.
//!
//! Answer text mixes two syntaxes: generic markdown the formatter should
//! handle, and domain product references (`[name](product:ID)` or
//! `[name](/product/ID)`) that must become interactive, non-navigating
//! elements instead of plain hyperlinks. Running the formatter directly over
//! product references would mangle them (they look like relative URLs), so
//! rendering is done in two passes: product references are lifted out into
//! formatter-safe placeholder tokens first, the formatter runs over the rest,
//! and the tokens are swapped for product elements afterwards. External
//! hyperlinks are then tagged to open in a new browsing context.

use std::sync::LazyLock;

use pulldown_cmark::{Parser, html};
use regex::Regex;
use url::Url;

/// Product reference link forms: `[text](product:ID)` and `[text](/product/ID)`.
static PRODUCT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\((?:product:|/product/)([^)\s]+)\)").expect("valid regex")
});

/// Bare or already-bracketed http(s) URLs. The bare form stops at `)` so a
/// URL used as a markdown link destination keeps its closing paren.
static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<https?://[^\s<>]+>|https?://[^\s<>)]+").expect("valid regex")
});

/// Formatter-generated anchors with absolute http(s) destinations. Trailing
/// attributes (a `title` from markdown) are captured and kept.
static EXTERNAL_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="(https?://[^"]*)"([^>]*)>"#).expect("valid regex"));

/// One extracted product reference, scoped to a single render pass.
#[derive(Debug)]
struct ProductRef {
    token: String,
    display: String,
    product_id: String,
}

/// Renders raw answer text to safe, link-aware HTML.
///
/// Pure function of its input; the placeholder map lives and dies within
/// one call.
pub fn render_markup(raw: &str) -> String {
    // A nonce that happens to occur in the input would corrupt the swap-back
    let mut nonce = uuid::Uuid::new_v4().simple().to_string();
    while raw.contains(&nonce) {
        nonce = uuid::Uuid::new_v4().simple().to_string();
    }

    // Both pre-passes are text-level rewrites; code spans and fenced blocks
    // must keep their literal content
    let mut refs = Vec::new();
    let text = transform_outside_code(raw, |segment| {
        let lifted = extract_product_refs(segment, &nonce, &mut refs);
        autolink_bare_urls(&lifted)
    });

    let mut markup = String::with_capacity(text.len() * 2);
    html::push_html(&mut markup, Parser::new(&text));

    for product in &refs {
        let element = format!(
            r##"<a href="#" class="product-link" data-product-id="{}">{}</a>"##,
            escape_html(&product.product_id),
            escape_html(&product.display),
        );
        markup = markup.replace(&product.token, &element);
    }

    mark_external_links(&markup)
}

/// Lifts product references out of one text segment, left to right,
/// non-overlapping. Tokens are alphanumeric so the formatter passes them
/// through as plain text; indices continue across segments.
fn extract_product_refs(segment: &str, nonce: &str, refs: &mut Vec<ProductRef>) -> String {
    PRODUCT_LINK
        .replace_all(segment, |caps: &regex::Captures<'_>| {
            let token = format!("shopref{}x{}", nonce, refs.len());
            refs.push(ProductRef {
                token: token.clone(),
                display: caps[1].to_string(),
                product_id: caps[2].to_string(),
            });
            token
        })
        .into_owned()
}

/// Applies `transform` to the stretches of `text` outside inline code spans
/// and fenced code blocks, copying code regions through verbatim.
///
/// Inline spans open with a backtick run and close at the next run of the
/// same length; an unclosed run is literal text. A line starting with three
/// backticks opens a fence that runs to the next such line (or end of
/// input).
fn transform_outside_code<F>(text: &str, mut transform: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut plain_start = 0;
    let mut i = 0;
    let mut at_line_start = true;

    while i < text.len() {
        let rest = &text[i..];

        if at_line_start && rest.starts_with("```") {
            out.push_str(&transform(&text[plain_start..i]));
            let block_end = match rest[3..].find("\n```") {
                Some(pos) => {
                    let close = i + 3 + pos + 4;
                    match text[close..].find('\n') {
                        Some(nl) => close + nl + 1,
                        None => text.len(),
                    }
                }
                None => text.len(),
            };
            out.push_str(&text[i..block_end]);
            i = block_end;
            plain_start = i;
            continue;
        }

        if rest.starts_with('`') {
            let run = rest.chars().take_while(|&c| c == '`').count();
            if let Some(close) = find_closing_run(&rest[run..], run) {
                out.push_str(&transform(&text[plain_start..i]));
                let span_end = i + run + close + run;
                out.push_str(&text[i..span_end]);
                i = span_end;
                plain_start = i;
            } else {
                i += run;
            }
            at_line_start = false;
            continue;
        }

        at_line_start = rest.starts_with('\n');
        i += rest.chars().next().map_or(1, char::len_utf8);
    }

    out.push_str(&transform(&text[plain_start..]));
    out
}

/// Finds the offset of a backtick run of exactly `len` in `text`, skipping
/// longer runs.
fn find_closing_run(text: &str, len: usize) -> Option<usize> {
    let delim = "`".repeat(len);
    let mut from = 0;
    loop {
        let pos = from + text[from..].find(&delim)?;
        let tail = &text[pos + len..];
        if tail.starts_with('`') {
            let extra = tail.chars().take_while(|&c| c == '`').count();
            from = pos + len + extra;
        } else {
            return Some(pos);
        }
    }
}

/// Angle-brackets bare http(s) URLs so the formatter autolinks them.
/// URLs already written as autolinks are left alone.
fn autolink_bare_urls(text: &str) -> String {
    BARE_URL
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let m = &caps[0];
            if m.starts_with('<') {
                m.to_string()
            } else {
                format!("<{m}>")
            }
        })
        .into_owned()
}

/// Tags absolute external anchors to open in a new browsing context,
/// distinguishing them from product references.
fn mark_external_links(markup: &str) -> String {
    EXTERNAL_ANCHOR
        .replace_all(markup, |caps: &regex::Captures<'_>| {
            let href = &caps[1];
            let attrs = &caps[2];
            // The formatter entity-escapes hrefs; undo that for validation only
            if Url::parse(&href.replace("&amp;", "&")).is_ok() {
                format!(
                    r#"<a href="{href}"{attrs} target="_blank" rel="noopener noreferrer" class="external-link">"#
                )
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
