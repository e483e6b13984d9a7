use askama::Template;

/// The self-contained document mounted into a preview sandbox. `style`,
/// `body` and `script` are user content and are emitted verbatim; `script`
/// and `endpoint` must already be JavaScript literals.
#[derive(Template)]
#[template(path = "preview/document.html")]
pub struct PreviewDocumentTemplate<'a> {
    pub title: &'a str,
    pub style: &'a str,
    pub body: &'a str,
    pub generation: u64,
    pub endpoint: &'a str,
    pub script: &'a str,
}
