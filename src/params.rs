//! Query-string contract for the embedded companion surface.
//!
//! `?sootyId=...` selects the state key shared with the main window,
//! `maxSize` caps the rendered scale, `shape`/`color` override the appearance
//! for companion-only rendering, and `debug` enables verbose logging.
//! Parsing is pure and never fails: anything malformed falls back to defaults.

use crate::state::{Appearance, Shape, is_valid_color};

#[derive(Clone, Debug, PartialEq)]
pub struct EmbedParams {
    pub sooty_id: Option<String>,
    /// Clamped to [0.1, 1]; non-numeric input falls back to 1.
    pub max_size: f64,
    /// Only set when both shape and color are present and valid.
    pub appearance_override: Option<Appearance>,
    pub debug: bool,
}

impl Default for EmbedParams {
    fn default() -> Self {
        Self { sooty_id: None, max_size: 1.0, appearance_override: None, debug: false }
    }
}

pub fn parse_query(query: &str) -> EmbedParams {
    let mut params = EmbedParams::default();
    let mut shape: Option<String> = None;
    let mut color: Option<String> = None;

    for pair in query.trim_start_matches('?').split('&') {
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, percent_decode(v)),
            None => (pair, String::new()),
        };
        match key {
            "sootyId" if !value.is_empty() => params.sooty_id = Some(value),
            "maxSize" => {
                if let Ok(n) = value.parse::<f64>() {
                    if n.is_finite() {
                        params.max_size = n.clamp(0.1, 1.0);
                    }
                }
            }
            "shape" => shape = Some(value),
            "color" => color = Some(value),
            "debug" => params.debug = value.is_empty() || value == "1" || value == "true",
            _ => {}
        }
    }

    if let (Some(shape), Some(color)) = (shape, color) {
        if let Some(shape) = Shape::parse(&shape) {
            if is_valid_color(&color) {
                params.appearance_override = Some(Appearance { shape, color });
            }
        }
    }
    params
}

/// Minimal application/x-www-form-urlencoded decoding: `+` as space, `%XX`
/// byte escapes. Invalid escapes pass through untouched.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(b) = decoded {
                    out.push(b);
                    i += 3;
                    continue;
                }
                out.push(b'%');
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}
