//! Embedded static resources.
//!
//! - `build` - HTML wrapper written next to every compiled page
//! - `init` - files scaffolded by `typage init`
//!
//! # Usage
//!
//! ```ignore
//! use embed::build::{PAGE_HTML, PageVars};
//!
//! let html = PAGE_HTML.render(&PageVars {
//!     title: page.title(),
//!     artifact: artifact_file_name(),
//! });
//! ```

mod template;

pub use template::{Template, TemplateVars};

/// Escape text for HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub mod build {
    use super::{Template, TemplateVars, escape_html};

    /// Variables for page.html.
    pub struct PageVars {
        pub title: String,
        /// Artifact path relative to the HTML file
        pub artifact: String,
    }

    impl TemplateVars for PageVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__TITLE__", &escape_html(&self.title))
                .replace("__ARTIFACT__", &escape_html(&self.artifact))
        }
    }

    /// HTML entry point embedding a compiled page.
    pub const PAGE_HTML: Template<PageVars> =
        Template::new(include_str!("build/page.html"));
}

pub mod init {
    use super::{Template, TemplateVars};

    pub const CONFIG_TOML: &str = include_str!("init/typage.toml");
    pub const LAYOUT_TYP: &str = include_str!("init/layout.typ");

    /// Variables for home.typ.
    pub struct HomeVars {
        pub title: String,
    }

    impl TemplateVars for HomeVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__TITLE__", &self.title)
        }
    }

    pub const HOME_TYP: Template<HomeVars> = Template::new(include_str!("init/home.typ"));
}
