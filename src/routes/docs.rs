//! Doc pages for API routes.

use crate::state::FlatRoute;
use crate::tree::RouteNode;

/// Everything a renderer gets for one doc route.
#[derive(Debug)]
pub struct DocPage<'a> {
    /// API path the page documents.
    pub path: &'a str,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    /// Rendered doc component, if the route has one.
    pub content: Option<String>,
    pub routes: &'a [RouteNode<FlatRoute>],
}

pub trait DocRenderer: Send + Sync {
    fn render(&self, page: &DocPage<'_>) -> String;
}

/// Minimal HTML: a route index beside the page content.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainDocRenderer;

impl DocRenderer for PlainDocRenderer {
    fn render(&self, page: &DocPage<'_>) -> String {
        let title = page.title.unwrap_or(page.path);
        let mut html = format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body><nav><ul>",
            escape(title)
        );
        for node in page.routes {
            node.walk(&mut |route, depth| {
                html.push_str(&format!(
                    "<li data-depth=\"{}\"><code>{}</code> {}</li>",
                    depth,
                    escape(&route.value.methods.join(" ")),
                    escape(&route.path)
                ));
            });
        }
        html.push_str("</ul></nav><main>");
        html.push_str(&format!("<h1>{}</h1>", escape(title)));
        if let Some(description) = page.description {
            html.push_str(&format!("<p>{}</p>", escape(description)));
        }
        if let Some(content) = &page.content {
            html.push_str(content);
        }
        html.push_str("</main></body></html>");
        html
    }
}

pub fn escape(text: &str) -> String {
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
