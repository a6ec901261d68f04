//! Style Scoping
//!
//! [`CssPrefixer`] rewrites a stylesheet so every selector is scoped under a component class.
//! The stylesheet is parsed with lightningcss, top-level style rules get the scope class
//! prepended to each selector, and the rule tree is printed back minified.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::traits::ToCss;
use sha2::{Digest, Sha256};

/// Prefix letter so a derived id is always a legal class token.
pub const SCOPE_ID_PREFIX: char = 'w';
const SCOPE_HASH_LENGTH: usize = 7;

/// Content-derived scope id: 8 characters, stable for identical style text.
pub fn scope_hash(style_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(style_text.as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(hasher.finalize()).to_lowercase();
    let mut id = String::with_capacity(SCOPE_HASH_LENGTH + 1);
    id.push(SCOPE_ID_PREFIX);
    id.extend(encoded.chars().take(SCOPE_HASH_LENGTH));
    id
}

#[derive(Debug, Clone)]
pub struct CssPrefixer {
    prefix: String,
}

impl CssPrefixer {
    pub fn new(scope_id: &str) -> Self {
        Self {
            prefix: format!(".{}", scope_id),
        }
    }

    /// Parse `css` and return it scoped and minified. Parse failures are returned as messages.
    pub fn process(&self, css: &str) -> Result<String, String> {
        let sheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("invalid stylesheet: {}", e))?;
        self.process_rules(&sheet.rules)
    }

    fn process_rules(&self, rules: &CssRuleList<'_>) -> Result<String, String> {
        let mut out = String::new();
        for rule in rules.0.iter() {
            match rule {
                CssRule::Style(style) => {
                    let printed = print(rule)?;
                    let selectors = print(&style.selectors)?;
                    let block = printed
                        .strip_prefix(selectors.as_str())
                        .ok_or_else(|| format!("cannot scope rule `{}`", printed))?;
                    let scoped = style
                        .selectors
                        .0
                        .iter()
                        .map(|selector| print(selector).map(|text| self.prefix_selector(&text)))
                        .collect::<Result<Vec<_>, _>>()?;
                    out.push_str(&scoped.join(","));
                    out.push_str(block);
                }
                CssRule::Media(group) => out.push_str(&self.process_group(rule, &group.rules)?),
                CssRule::Supports(group) => out.push_str(&self.process_group(rule, &group.rules)?),
                CssRule::LayerBlock(group) => {
                    out.push_str(&self.process_group(rule, &group.rules)?)
                }
                CssRule::Container(group) => {
                    out.push_str(&self.process_group(rule, &group.rules)?)
                }
                CssRule::MozDocument(group) => {
                    out.push_str(&self.process_group(rule, &group.rules)?)
                }
                // Keyframes, font faces, imports and the rest are printed as parsed
                _ => out.push_str(&print(rule)?),
            }
        }
        Ok(out)
    }

    /// Re-emit a grouping at-rule around its scoped contents.
    fn process_group(&self, rule: &CssRule<'_>, inner: &CssRuleList<'_>) -> Result<String, String> {
        let printed = print(rule)?;
        let contents = print(inner)?;
        let scoped = self.process_rules(inner)?;
        if printed == contents {
            // `@media all` and friends print as their bare contents
            return Ok(scoped);
        }
        let prelude = printed
            .strip_suffix(&format!("{{{}}}", contents))
            .ok_or_else(|| format!("cannot scope at-rule `{}`", printed))?;
        Ok(format!("{}{{{}}}", prelude, scoped))
    }

    /// Scope one printed selector. `:host` and `:host(...)` become the scope class itself;
    /// `:host-context(...)` and selectors already under this scope are left alone.
    fn prefix_selector(&self, selector: &str) -> String {
        if self.is_already_prefixed(selector) || selector.starts_with(":host-context") {
            return selector.to_string();
        }

        if let Some(after_host) = selector.strip_prefix(":host") {
            if after_host.starts_with('(') {
                let close = find_closing_paren(after_host).unwrap_or(after_host.len());
                let inner = after_host.get(1..close).unwrap_or("").trim();
                let remainder = after_host.get(close + 1..).unwrap_or("");
                return format!("{}{}{}", self.prefix, inner, remainder);
            }
            return format!("{}{}", self.prefix, after_host);
        }

        format!("{} {}", self.prefix, selector)
    }

    fn is_already_prefixed(&self, selector: &str) -> bool {
        match selector.strip_prefix(self.prefix.as_str()) {
            Some(rest) => !rest
                .chars()
                .next()
                .map(|c| c.is_alphanumeric() || c == '-' || c == '_')
                .unwrap_or(false),
            None => false,
        }
    }
}

fn print<T: ToCss>(value: &T) -> Result<String, String> {
    value
        .to_css_string(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| format!("cannot print stylesheet: {}", e))
}

/// Index of the `)` closing the `(` at the start of `text`, skipping quoted strings.
fn find_closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}
