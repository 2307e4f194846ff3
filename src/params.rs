//! Tool parameters: schema, values, and validation into wire fields.
//!
//! A tool descriptor declares its parameters as [`ParamSpec`]s. Callers supply
//! a [`ToolParameters`] map; [`resolve`] checks it against the schema, applies
//! defaults and serialises every value to the string form the backend expects
//! (`"true"`/`"false"` for flags, comma-separated integers for page orders,
//! `#RRGGBB` for colours).

use crate::error::ToolkitError;
use crate::pipeline::input::{InputFile, InputKind};
use std::collections::BTreeMap;

/// Type and range of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Free text; must not be blank when supplied.
    Text,
    /// Integer in `min..=max`.
    Integer { min: i64, max: i64 },
    /// Float in `min..=max`.
    Number { min: f64, max: f64 },
    Flag,
    /// `#RGB` or `#RRGGBB`; normalised to upper-case `#RRGGBB`.
    Color,
    /// A permutation of `0..n` page indices.
    PageOrder,
    /// One of a fixed set of lower-case choices.
    Choice(&'static [&'static str]),
    /// An extra file of the given kind (e.g. a watermark image).
    Attachment(InputKind),
}

/// Declaration of one tool parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Name used by callers (`ToolParameters` keys, CLI `--param name=…`).
    pub name: &'static str,
    /// Multipart field name. `None` for parameters consumed locally.
    pub wire_name: Option<&'static str>,
    pub kind: ParamKind,
    pub required: bool,
    /// Applied when the caller omits an optional parameter.
    pub default: Option<&'static str>,
    /// `(param, value)`: resolved only while `param` resolves to `value`.
    /// Declared after the parameter it depends on.
    pub when: Option<(&'static str, &'static str)>,
}

impl ParamSpec {
    pub const fn required(name: &'static str, wire: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            wire_name: Some(wire),
            kind,
            required: true,
            default: None,
            when: None,
        }
    }

    pub const fn optional(
        name: &'static str,
        wire: &'static str,
        kind: ParamKind,
        default: &'static str,
    ) -> Self {
        Self {
            name,
            wire_name: Some(wire),
            kind,
            required: false,
            default: Some(default),
            when: None,
        }
    }

    pub const fn local(name: &'static str, kind: ParamKind, default: &'static str) -> Self {
        Self {
            name,
            wire_name: None,
            kind,
            required: false,
            default: Some(default),
            when: None,
        }
    }

    /// Optional parameter with no default; omitted from the request when
    /// the caller leaves it out.
    pub const fn unset(name: &'static str, wire: Option<&'static str>, kind: ParamKind) -> Self {
        Self {
            name,
            wire_name: wire,
            kind,
            required: false,
            default: None,
            when: None,
        }
    }

    /// Only resolve this parameter while `param` resolves to `value`.
    pub const fn only_when(mut self, param: &'static str, value: &'static str) -> Self {
        self.when = Some((param, value));
        self
    }
}

/// A caller-supplied parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Flag(bool),
    PageOrder(Vec<usize>),
    Attachment(InputFile),
}

impl ParamValue {
    /// Parse a raw string (CLI `--param k=v`) according to `kind`.
    pub fn parse(kind: ParamKind, raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match kind {
            ParamKind::Text | ParamKind::Color | ParamKind::Choice(_) => {
                Ok(ParamValue::Text(raw.to_string()))
            }
            ParamKind::Integer { .. } => raw
                .parse::<i64>()
                .map(ParamValue::Integer)
                .map_err(|_| format!("'{raw}' is not an integer")),
            ParamKind::Number { .. } => raw
                .parse::<f64>()
                .map(ParamValue::Number)
                .map_err(|_| format!("'{raw}' is not a number")),
            ParamKind::Flag => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(ParamValue::Flag(true)),
                "false" | "no" | "0" | "off" => Ok(ParamValue::Flag(false)),
                _ => Err(format!("'{raw}' is not a boolean")),
            },
            ParamKind::PageOrder => parse_page_order(raw).map(ParamValue::PageOrder),
            ParamKind::Attachment(_) => {
                Err("attachments must be supplied as files, not text".to_string())
            }
        }
    }
}

/// Parse `"0,8,7"` into page indices.
pub fn parse_page_order(raw: &str) -> Result<Vec<usize>, String> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|p| {
            p.trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid page index '{}'", p.trim()))
        })
        .collect()
}

/// Serialise page indices as the backend's comma-separated list.
pub fn format_page_order(order: &[usize]) -> String {
    order
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// `true` when `order` contains every index in `0..order.len()` exactly once.
pub fn is_permutation(order: &[usize]) -> bool {
    let mut seen = vec![false; order.len()];
    for &i in order {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

/// Parameters supplied for one run, keyed by [`ParamSpec::name`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolParameters {
    values: BTreeMap<String, ParamValue>,
}

impl ToolParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, ParamValue::Text(value.into()))
    }

    pub fn with_integer(self, name: impl Into<String>, value: i64) -> Self {
        self.with(name, ParamValue::Integer(value))
    }

    pub fn with_number(self, name: impl Into<String>, value: f64) -> Self {
        self.with(name, ParamValue::Number(value))
    }

    pub fn with_flag(self, name: impl Into<String>, value: bool) -> Self {
        self.with(name, ParamValue::Flag(value))
    }

    pub fn with_page_order(self, name: impl Into<String>, order: Vec<usize>) -> Self {
        self.with(name, ParamValue::PageOrder(order))
    }

    pub fn with_attachment(self, name: impl Into<String>, file: InputFile) -> Self {
        self.with(name, ParamValue::Attachment(file))
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Parameters after validation, in the shape the pipeline consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParams {
    /// `(wire name, value)` text fields, in schema order.
    pub fields: Vec<(&'static str, String)>,
    /// `(wire name, file)` extra multipart files.
    pub attachments: Vec<(&'static str, InputFile)>,
    /// Normalised values of every parameter, keyed by name (wired or not).
    pub values: BTreeMap<&'static str, String>,
    /// Page order, when the schema declares one.
    pub page_order: Option<Vec<usize>>,
}

impl ResolvedParams {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Validate `params` against `specs`, apply defaults and serialise.
pub fn resolve(
    specs: &[ParamSpec],
    params: &ToolParameters,
) -> Result<ResolvedParams, ToolkitError> {
    for name in params.names() {
        if !specs.iter().any(|s| s.name == name) {
            return Err(ToolkitError::Validation(format!(
                "Unknown parameter '{name}'."
            )));
        }
    }

    let mut out = ResolvedParams::default();
    for spec in specs {
        if let Some((param, value)) = spec.when {
            if out.value(param) != Some(value) {
                continue;
            }
        }
        let value = match params.get(spec.name) {
            Some(v) => v.clone(),
            None => match spec.default {
                Some(raw) => ParamValue::parse(spec.kind, raw).map_err(|e| {
                    ToolkitError::Internal(format!("bad default for '{}': {e}", spec.name))
                })?,
                None if spec.required => {
                    return Err(ToolkitError::Validation(format!(
                        "Missing required parameter '{}'.",
                        spec.name
                    )));
                }
                None => continue,
            },
        };

        match (spec.kind, value) {
            (ParamKind::Attachment(kind), ParamValue::Attachment(file)) => {
                if !kind.matches(&file) {
                    return Err(ToolkitError::Validation(format!(
                        "'{}' must be {}, got '{}'.",
                        spec.name,
                        kind.describe(),
                        file.name
                    )));
                }
                out.values.insert(spec.name, file.name.clone());
                if let Some(wire) = spec.wire_name {
                    out.attachments.push((wire, file));
                }
            }
            (kind, value) => {
                let text = normalise(spec.name, kind, value, &mut out.page_order)?;
                if let Some(wire) = spec.wire_name {
                    out.fields.push((wire, text.clone()));
                }
                out.values.insert(spec.name, text);
            }
        }
    }
    Ok(out)
}

fn normalise(
    name: &str,
    kind: ParamKind,
    value: ParamValue,
    page_order: &mut Option<Vec<usize>>,
) -> Result<String, ToolkitError> {
    let invalid = |why: String| ToolkitError::Validation(format!("Parameter '{name}': {why}."));
    match (kind, value) {
        (ParamKind::Text, ParamValue::Text(s)) => {
            if s.trim().is_empty() {
                Err(invalid("must not be empty".into()))
            } else {
                Ok(s)
            }
        }
        (ParamKind::Integer { min, max }, ParamValue::Integer(n)) => {
            if n < min || n > max {
                Err(invalid(format!("must be between {min} and {max}, got {n}")))
            } else {
                Ok(n.to_string())
            }
        }
        (ParamKind::Number { min, max }, ParamValue::Integer(n)) => {
            normalise(
                name,
                ParamKind::Number { min, max },
                ParamValue::Number(n as f64),
                page_order,
            )
        }
        (ParamKind::Number { min, max }, ParamValue::Number(x)) => {
            if !x.is_finite() || x < min || x > max {
                Err(invalid(format!("must be between {min} and {max}, got {x}")))
            } else {
                Ok(x.to_string())
            }
        }
        (ParamKind::Flag, ParamValue::Flag(b)) => Ok(b.to_string()),
        (ParamKind::Color, ParamValue::Text(s)) => {
            normalise_color(&s).ok_or_else(|| invalid(format!("'{s}' is not a #RRGGBB colour")))
        }
        (ParamKind::PageOrder, ParamValue::PageOrder(order)) => {
            if order.is_empty() {
                return Err(invalid("must list at least one page".into()));
            }
            if !is_permutation(&order) {
                return Err(invalid("must contain every page exactly once".into()));
            }
            let text = format_page_order(&order);
            *page_order = Some(order);
            Ok(text)
        }
        (ParamKind::Choice(choices), ParamValue::Text(s)) => {
            let lower = s.trim().to_ascii_lowercase();
            if choices.contains(&lower.as_str()) {
                Ok(lower)
            } else {
                Err(invalid(format!("must be one of {}", choices.join(", "))))
            }
        }
        (kind, _) => Err(invalid(format!("expected {}", describe_kind(kind)))),
    }
}

fn describe_kind(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Text => "text",
        ParamKind::Integer { .. } => "an integer",
        ParamKind::Number { .. } => "a number",
        ParamKind::Flag => "true or false",
        ParamKind::Color => "a colour",
        ParamKind::PageOrder => "a page order",
        ParamKind::Choice(_) => "a choice",
        ParamKind::Attachment(_) => "a file",
    }
}

/// `#abc` / `#AABBCC` / `aabbcc` → `#AABBCC`.
fn normalise_color(raw: &str) -> Option<String> {
    let hex = raw.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let full = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_string(),
        _ => return None,
    };
    Some(format!("#{}", full.to_ascii_uppercase()))
}
