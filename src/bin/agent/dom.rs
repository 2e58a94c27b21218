use anyhow::{Context, Result, bail};
use plan_engine::ElementSummary;
use serde_json::Value;

/// Called with `this` bound to one element. Returns `null` for elements the
/// user cannot see, otherwise a JSON string `{tag, text, attributes}`.
/// Text and attribute values are capped at 200 chars.
pub const DESCRIBE_JS: &str = r#"
function () {
  const el = this;
  if (el.offsetParent === null && el.tagName !== 'BODY' && el.tagName !== 'HTML') {
    const fixed = getComputedStyle(el).position === 'fixed';
    if (!fixed) return null;
  }
  const s = getComputedStyle(el);
  if (s.display === 'none' || s.visibility === 'hidden' || s.opacity === '0') return null;
  const r = el.getBoundingClientRect();
  if (r.width === 0 && r.height === 0) return null;

  const attributes = {};
  for (const a of el.attributes) {
    if (a.name === 'style' || a.name.startsWith('on')) continue;
    attributes[a.name] = a.value.slice(0, 200);
  }
  const text = (el.innerText || el.value || '').trim().replace(/\s+/g, ' ').slice(0, 200);
  return JSON.stringify({ tag: el.tagName.toLowerCase(), text, attributes });
}
"#;

/// Empties an input before typing so new text replaces the old value.
pub const CLEAR_VALUE_JS: &str = "function () { if ('value' in this) { this.value = ''; } }";

/// Decode what [`DESCRIBE_JS`] handed back through the DevTools protocol.
pub fn parse_summary(value: Option<Value>) -> Result<Option<ElementSummary>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => serde_json::from_str(&raw)
            .map(Some)
            .context("element description is not valid JSON"),
        Some(other) => bail!("unexpected element description: {other}"),
    }
}
