use regex::Regex;

/// Configuration for HTML preprocessing
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Whether to remove script tags
    pub remove_scripts: bool,
    /// Whether to remove style tags
    pub remove_styles: bool,
    /// Whether to remove noscript tags
    pub remove_noscript: bool,
    /// Whether to remove template tags
    pub remove_templates: bool,
    /// Whether to remove iframe tags
    pub remove_iframes: bool,
    /// Whether to remove elements hidden with inline styles.
    ///
    /// Off by default: mode tabs used as presence markers are often hidden.
    pub remove_hidden: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            remove_scripts: true,
            remove_styles: true,
            remove_noscript: true,
            remove_templates: true,
            remove_iframes: true,
            remove_hidden: false,
        }
    }
}

/// Preprocess a page snapshot by removing elements that never carry answer content
pub fn preprocess_html(html: &str, config: &PreprocessConfig) -> String {
    let mut processed = remove_unwanted_tags(html, config);

    if config.remove_hidden {
        processed = remove_hidden_elements(&processed);
    }

    processed
}

/// Remove script, style, noscript, template and iframe tags from HTML
fn remove_unwanted_tags(html: &str, config: &PreprocessConfig) -> String {
    let tags = [
        ("script", config.remove_scripts),
        ("style", config.remove_styles),
        ("noscript", config.remove_noscript),
        ("template", config.remove_templates),
        ("iframe", config.remove_iframes),
    ];

    let handlers = tags
        .into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(tag, _)| {
            lol_html::element!(tag, |el| {
                el.remove();
                Ok(())
            })
        })
        .collect::<Vec<_>>();

    if handlers.is_empty() {
        return html.to_string();
    }

    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings { element_content_handlers: handlers, ..Default::default() },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    match rewriter.write(html.as_bytes()) {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    match rewriter.end() {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    if output.is_empty() { html.to_string() } else { output }
}

/// Remove elements with display:none or visibility:hidden styles
fn remove_hidden_elements(html: &str) -> String {
    let Ok(hidden_pattern) = Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)") else {
        return html.to_string();
    };

    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("*", |el| {
                if let Some(style) = el.get_attribute("style")
                    && hidden_pattern.is_match(&style)
                {
                    el.remove();
                }
                Ok(())
            })],
            ..Default::default()
        },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    match rewriter.write(html.as_bytes()) {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    match rewriter.end() {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    if output.is_empty() { html.to_string() } else { output }
}
