use std::sync::Arc;

use axum::response::Html;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// Seam to the templating engine. Handlers hand over a template name and a
/// JSON context; what comes back is the finished HTML page.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> anyhow::Result<String>;
}

/// Development renderer: emits a bare HTML page with the context dumped in a
/// <pre> block, so the app is usable end to end before real templates exist.
pub struct PageRenderer;

impl TemplateRenderer for PageRenderer {
    fn render(&self, template: &str, context: &Value) -> anyhow::Result<String> {
        let body = serde_json::to_string_pretty(context)?;
        Ok(format!(
            "<!doctype html>\n<html>\n<head><title>{title}</title></head>\n\
             <body>\n<h1>{title}</h1>\n<pre>{body}</pre>\n</body>\n</html>\n",
            title = escape_html(template),
            body = escape_html(&body),
        ))
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

pub fn render_page(
    renderer: &Arc<dyn TemplateRenderer>,
    template: &str,
    context: &Value,
) -> Result<Html<String>, AppError> {
    let html = renderer
        .render(template, context)
        .map_err(AppError::Internal)?;
    Ok(Html(html))
}

/// Renders the custom not-found page with a 404 status. Used both by the
/// router fallback and by handlers that map wrong-owner lookups to 404.
pub fn render_not_found(state: &AppState) -> axum::response::Response {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    let context = serde_json::json!({});
    match render_page(&state.renderer, "error/not_found.html", &context) {
        Ok(html) => (StatusCode::NOT_FOUND, html).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
    }

    #[test]
    fn page_renderer_includes_template_name_and_context() {
        let html = PageRenderer
            .render(
                "appointment/index.html",
                &serde_json::json!({ "title": "Important Meeting" }),
            )
            .expect("render should succeed");
        assert!(html.contains("appointment/index.html"));
        assert!(html.contains("Important Meeting"));
    }
}
