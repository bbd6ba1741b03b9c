//! Login page renderer.

use crate::auth::AuthWidget;
use crate::render::{escape_html, Language};
use crate::session::Secret;

/// Hidden form field naming the widget a submission is for.
pub const WIDGET_FIELD: &str = "widget";

/// Fills the digit boxes of numeric fields into their hidden input on submit.
const NUMERIC_SCRIPT: &str = r#"document.addEventListener("submit",function(e){e.target.querySelectorAll('input[data-custom-type="numeric"]').forEach(function(h){var d=h.parentElement.querySelectorAll('input[data-custom-type="numeric-digit"]');h.value=Array.prototype.map.call(d,function(x){return x.value}).join("")})});"#;

const STYLE: &str = "body{font-family:sans-serif;background:#f4f4f6;display:flex;justify-content:center;padding-top:10vh}\
main{background:#fff;padding:2rem;border-radius:8px;min-width:18rem;box-shadow:0 1px 4px rgba(0,0,0,.15)}\
.input-field{display:flex;flex-direction:column;margin-bottom:1rem}\
.input-field-numeric-digits{display:flex;gap:.25rem}\
.input-field-numeric-digits input{width:2rem;text-align:center}\
.error{color:#b00020;margin-bottom:1rem}";

/// What the proxy asks a renderer to draw.
pub struct LoginPage<'a> {
    /// Endpoint display name.
    pub title: &'a str,
    pub widget: &'a dyn AuthWidget,
    /// Other widgets the endpoint enables.
    pub alternatives: Vec<&'a dyn AuthWidget>,
    pub error: Option<&'a str>,
    pub secret: &'a Secret,
}

/// Produces the HTML document for an unauthenticated client.
pub trait PageRenderer: Send + Sync {
    fn render_login_page(&self, page: &LoginPage<'_>) -> String;
}

/// Self-contained page with inline style and script.
#[derive(Debug, Clone)]
pub struct LoginPageRenderer {
    language: Language,
}

impl LoginPageRenderer {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

impl Default for LoginPageRenderer {
    fn default() -> Self {
        Self::new(Language::english())
    }
}

impl PageRenderer for LoginPageRenderer {
    fn render_login_page(&self, page: &LoginPage<'_>) -> String {
        let lang = &self.language;
        let title = escape_html(page.title);
        let error = page
            .error
            .map(|e| format!(r#"<p class="error">{}</p>"#, escape_html(e)))
            .unwrap_or_default();
        let widget_name = escape_html(page.widget.name());
        let widget_html = page.widget.render(lang, page.secret);
        let submit = escape_html(lang.label("submit"));

        let alternatives = if page.alternatives.is_empty() {
            String::new()
        } else {
            let links: String = page
                .alternatives
                .iter()
                .map(|w| {
                    format!(
                        r#"<li><a href="?{WIDGET_FIELD}={}">{}</a></li>"#,
                        escape_html(w.name()),
                        escape_html(lang.label(&w.method_label()))
                    )
                })
                .collect();
            format!(
                r#"<nav><p>{}</p><ul>{links}</ul></nav>"#,
                escape_html(lang.label("other_methods"))
            )
        };

        format!(
            r#"<!DOCTYPE html><html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width, initial-scale=1"><title>{title}</title><style>{STYLE}</style></head><body><main><h1>{title}</h1>{error}<form method="post" action="/"><input type="hidden" name="{WIDGET_FIELD}" value="{widget_name}">{widget_html}<button type="submit">{submit}</button></form>{alternatives}</main><script>{NUMERIC_SCRIPT}</script></body></html>"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::widgets::{PasswordWidget, TotpWidget};

    fn render(error: Option<&str>) -> String {
        let secret = Secret::new("page-secret").unwrap();
        let totp = TotpWidget::default();
        let password = PasswordWidget;
        LoginPageRenderer::default().render_login_page(&LoginPage {
            title: "Grafana <internal>",
            widget: &totp,
            alternatives: vec![&password as &dyn AuthWidget],
            error,
            secret: &secret,
        })
    }

    #[test]
    fn page_contains_form_for_active_widget() {
        let html = render(None);
        assert!(html.contains("<title>Grafana &lt;internal&gt;</title>"));
        assert!(html.contains(r#"name="widget" value="totp""#));
        assert!(html.contains(r#"name="csrf""#));
        assert!(html.contains(r#"name="code""#));
        assert!(!html.contains(r#"class="error""#));
    }

    #[test]
    fn alternatives_are_listed() {
        let html = render(None);
        assert!(html.contains(r#"href="?widget=password""#));
        assert!(html.contains("Use a password"));
    }

    #[test]
    fn error_banner_is_escaped() {
        let html = render(Some("Incorrect <data>"));
        assert!(html.contains(r#"<p class="error">Incorrect &lt;data&gt;</p>"#));
    }
}
