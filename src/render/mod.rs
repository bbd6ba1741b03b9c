//! Login page rendering.
//!
//! # Data Flow
//! ```text
//! proxy (unauthenticated request)
//!     → LoginPage { endpoint, active widget, alternatives, error }
//!     → PageRenderer::render_login_page
//!         → AuthWidget::render (fields + hidden CSRF token)
//!     → Response::html
//! ```
//!
//! # Design Decisions
//! - Rendering sits behind the [`PageRenderer`] trait; the built-in
//!   [`LoginPageRenderer`] is a plain, self-contained page
//! - Every dynamic string goes through [`escape_html`]

pub mod language;
pub mod page;

pub use language::Language;
pub use page::{LoginPage, LoginPageRenderer, PageRenderer, WIDGET_FIELD};

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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
