//! Expert-tier command templates.
//!
//! A template is a shell-style argument string. It is split into tokens
//! first (shlex rules), then every `{name}` placeholder inside a token is
//! replaced by its value. Values are never re-split or re-scanned, so paths
//! with spaces or braces stay a single literal token.

use super::types::{CommandBuilder, CommandVector};
use crate::engine::error::EngineError;
use regex::Regex;
use std::sync::LazyLock;

/// The closed set of placeholders a template may use.
pub const PLACEHOLDERS: &[&str] = &[
    "input",
    "output",
    "render_device",
    "width",
    "height",
    "bitrate",
    "duration",
    "codec",
];

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("invalid placeholder regex"));

/// Values substituted into a template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateVars {
    pub input: String,
    pub output: String,
    pub render_device: String,
    pub width: u32,
    pub height: u32,
    pub bitrate: String,
    pub duration: f64,
    /// Chosen encoder name, e.g. `hevc_vaapi`
    pub codec: String,
}

impl TemplateVars {
    fn lookup(&self, name: &str) -> Option<String> {
        Some(match name {
            "input" => self.input.clone(),
            "output" => self.output.clone(),
            "render_device" => self.render_device.clone(),
            "width" => self.width.to_string(),
            "height" => self.height.to_string(),
            "bitrate" => self.bitrate.clone(),
            "duration" => format_duration(self.duration),
            "codec" => self.codec.clone(),
            _ => return None,
        })
    }
}

fn format_duration(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{:.3}", secs)
    }
}

/// Tokenize and check a template without substituting anything.
pub fn parse_template(template: &str) -> Result<Vec<String>, EngineError> {
    if template.trim().is_empty() {
        return Err(EngineError::ConfigurationError(
            "expert template is empty".to_string(),
        ));
    }

    let tokens = shlex::split(template).ok_or_else(|| {
        EngineError::ConfigurationError(
            "expert template could not be parsed (unbalanced quotes?)".to_string(),
        )
    })?;

    if tokens.is_empty() {
        return Err(EngineError::ConfigurationError(
            "expert template is empty".to_string(),
        ));
    }

    for token in &tokens {
        for cap in PLACEHOLDER_RE.captures_iter(token) {
            let name = &cap[1];
            if !PLACEHOLDERS.contains(&name) {
                return Err(EngineError::ConfigurationError(format!(
                    "unknown template placeholder {{{}}}; allowed: {}",
                    name,
                    PLACEHOLDERS
                        .iter()
                        .map(|p| format!("{{{}}}", p))
                        .collect::<Vec<_>>()
                        .join(" ")
                )));
            }
        }
    }

    Ok(tokens)
}

/// Build the full command vector from a template.
///
/// A template that starts with an option (`-...`) gets `ffmpeg` prepended.
pub fn build_from_template(
    template: &str,
    vars: &TemplateVars,
) -> Result<CommandVector, EngineError> {
    let tokens = parse_template(template)?;

    let mut out = Vec::with_capacity(tokens.len() + 1);
    if tokens.first().is_some_and(|t| t.starts_with('-')) {
        out.push("ffmpeg".to_string());
    }

    for token in tokens {
        let replaced = PLACEHOLDER_RE.replace_all(&token, |cap: &regex::Captures| {
            // parse_template already rejected unknown names
            vars.lookup(&cap[1]).unwrap_or_default()
        });
        out.push(replaced.into_owned());
    }

    Ok(CommandBuilder::from_tokens(out))
}
