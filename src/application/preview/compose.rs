use askama::Template;

use crate::presentation::preview::PreviewDocumentTemplate;

use super::{
    extract::Extraction,
    surface::ComposedDocument,
    types::{Generation, RenderError},
};

pub const PREVIEW_TITLE: &str = "CodeVerse Preview";

/// Assemble the self-contained document mounted into the sandbox: baseline
/// styles, the user's styles, the body view, and the runtime script that runs
/// the user's code under an error guard and reports back.
pub fn compose(
    extraction: &Extraction,
    generation: Generation,
    bridge_endpoint: Option<&str>,
) -> Result<ComposedDocument, RenderError> {
    let script = script_literal(extraction.script.as_str())?;
    let endpoint = match bridge_endpoint {
        Some(endpoint) => script_literal(endpoint)?,
        None => "null".to_string(),
    };

    let template = PreviewDocumentTemplate {
        title: PREVIEW_TITLE,
        style: extraction.style.as_str(),
        body: &extraction.body,
        generation: generation.get(),
        endpoint: &endpoint,
        script: &script,
    };

    let html = template
        .render()
        .map_err(|err| RenderError::composition(err.to_string()))?;

    Ok(ComposedDocument::new(generation, html))
}

/// Encode `source` as a JavaScript string literal that is safe to place
/// inside an inline `<script>` element.
fn script_literal(source: &str) -> Result<String, RenderError> {
    let literal = serde_json::to_string(source)
        .map_err(|err| RenderError::composition(format!("failed to encode script: {err}")))?;
    Ok(literal.replace("</", "<\\/").replace("<!--", "<\\!--"))
}
