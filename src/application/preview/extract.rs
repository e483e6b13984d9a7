//! Best-effort extraction of style and script blocks from a source document.
//!
//! Matching is regex based and tolerant: unclosed blocks are skipped, nothing
//! here can fail. The same patterns drive both extraction and the body view so
//! the body view never contains a block the extractor would recognise.

use once_cell::sync::Lazy;
use regex::Regex;

static STYLE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>(.*?)</style\s*>").expect("style block pattern is valid")
});

static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("script block pattern is valid")
});

static SCRIPT_OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<script\b[^>]*>").expect("script open tag pattern is valid"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:^|\s)([^\s=/"'>]+)(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+))?"#)
        .expect("attribute pattern is valid")
});

/// Concatenated contents of every closed `<style>` block, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedStyle(String);

impl ExtractedStyle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Concatenated contents of every closed inline `<script>` block, in document
/// order. Blocks that reference an external source are never included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedScript(String);

impl ExtractedScript {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of the extraction phase of one render cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub style: ExtractedStyle,
    pub script: ExtractedScript,
    /// The document with every script block removed.
    pub body: String,
}

pub fn extract(document: &str) -> Extraction {
    let body = strip_scripts(document);
    Extraction {
        style: extract_styles(&body),
        script: extract_scripts(document),
        body,
    }
}

pub fn extract_styles(document: &str) -> ExtractedStyle {
    let styles: Vec<&str> = STYLE_BLOCK
        .captures_iter(document)
        .filter_map(|captures| captures.get(1))
        .map(|content| content.as_str())
        .collect();
    ExtractedStyle(styles.join("\n"))
}

pub fn extract_scripts(document: &str) -> ExtractedScript {
    let scripts: Vec<&str> = SCRIPT_BLOCK
        .captures_iter(document)
        .filter(|captures| !declares_source(captures.get(1).map_or("", |m| m.as_str())))
        .filter_map(|captures| captures.get(2))
        .map(|content| content.as_str())
        .collect();
    ExtractedScript(scripts.join("\n"))
}

/// Whether an open tag's attribute list names a `src` attribute. Attribute
/// values are skipped, so `src` mentioned inside a quoted value does not count.
fn declares_source(attributes: &str) -> bool {
    ATTRIBUTE
        .captures_iter(attributes)
        .filter_map(|captures| captures.get(1))
        .any(|name| name.as_str().eq_ignore_ascii_case("src"))
}

/// Remove every script block. An unclosed `<script>` swallows the rest of the
/// document the way a browser parser would, so it is cut together with
/// everything after it.
pub fn strip_scripts(document: &str) -> String {
    let mut body = document.to_string();
    // Removing one block can splice the text around it into a new one.
    while SCRIPT_BLOCK.is_match(&body) {
        body = SCRIPT_BLOCK.replace_all(&body, "").into_owned();
    }
    if let Some(dangling) = SCRIPT_OPEN_TAG.find(&body) {
        body.truncate(dangling.start());
    }
    body
}

/// Number of script blocks (closed or dangling) present in `document`.
pub fn count_script_blocks(document: &str) -> usize {
    SCRIPT_OPEN_TAG.find_iter(document).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_styles_scripts_and_body_view() {
        let document =
            "<style>body{color:red}</style><p>hi</p><script>document.title='x'</script>";
        let extraction = extract(document);

        assert_eq!(extraction.style.as_str(), "body{color:red}");
        assert_eq!(extraction.script.as_str(), "document.title='x'");
        assert_eq!(extraction.body, "<style>body{color:red}</style><p>hi</p>");
    }

    #[test]
    fn styles_are_joined_in_document_order() {
        let document = "<STYLE>a{}</STYLE><div></div><style media=\"print\">b{}</style>\
                        <Style>c{}</Style >";
        assert_eq!(extract_styles(document).as_str(), "a{}\nb{}\nc{}");
    }

    #[test]
    fn zero_blocks_yield_empty_extractions() {
        let extraction = extract("<main><h1>Plain</h1></main>");
        assert!(extraction.style.is_empty());
        assert!(extraction.script.is_empty());
        assert_eq!(extraction.body, "<main><h1>Plain</h1></main>");
    }

    #[test]
    fn external_scripts_are_dropped_entirely() {
        let document = concat!(
            "<script src=\"http://x/a.js\"></script>console.log(1)",
            "<script>let a = 1;</script>",
            "<SCRIPT type=\"module\" SRC='b.js'>ignored()</SCRIPT>",
            "<script>img.src = 'x.png';</script>",
        );
        assert_eq!(
            extract_scripts(document).as_str(),
            "let a = 1;\nimg.src = 'x.png';"
        );
    }

    #[test]
    fn only_external_script_yields_nothing() {
        let extraction = extract("<script src=\"http://x/a.js\"></script>console.log(1)");
        assert!(extraction.script.is_empty());
        assert_eq!(extraction.body, "console.log(1)");
    }

    #[test]
    fn data_src_attribute_is_not_an_external_source() {
        let document = "<script data-src=\"x\">run()</script>";
        assert_eq!(extract_scripts(document).as_str(), "run()");
    }

    #[test]
    fn src_inside_an_attribute_value_is_not_an_external_source() {
        let document = concat!(
            "<script data-note=\"loads src later\">run()</script>",
            "<script title='src=x.js'>walk()</script>",
            "<script type=module src=app.js></script>",
            "<script defer\tSrc = \"b.js\">skipped()</script>",
        );
        assert_eq!(extract_scripts(document).as_str(), "run()\nwalk()");
    }

    #[test]
    fn unclosed_style_is_ignored() {
        let document = "<style>a{}</style><style>never closed";
        assert_eq!(extract_styles(document).as_str(), "a{}");
    }

    #[test]
    fn unclosed_script_is_cut_from_body_and_not_extracted() {
        let document = "<p>before</p><script>ok()</script><p>mid</p><script>broken(";
        let extraction = extract(document);

        assert_eq!(extraction.script.as_str(), "ok()");
        assert_eq!(extraction.body, "<p>before</p><p>mid</p>");
    }

    #[test]
    fn body_view_never_contains_script_blocks() {
        let documents = [
            "<script>a()</script>",
            "<div><script type=\"text/javascript\">\nb()\n</script ></div>",
            "<SCRIPT>c()</SCRIPT><script src=x.js></script><script>",
            "<scr<script></script>ipt>d()</script>",
            "text only",
        ];

        for document in documents {
            let body = strip_scripts(document);
            assert_eq!(count_script_blocks(&body), 0, "body view of {document:?}");
        }
    }

    #[test]
    fn style_text_inside_scripts_is_not_extracted() {
        let document = "<script>const css = '<style>x{}</style>';</script><style>y{}</style>";
        assert_eq!(extract(document).style.as_str(), "y{}");
    }
}
