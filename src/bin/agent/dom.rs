use anyhow::{Result, anyhow};
use headless_chrome::Tab;
use serde_json::Value;
use std::sync::Arc;

use crate::types::DOM_SNAPSHOT_MAX_CHARS;

/// Attribute used to address elements handed out as `ElementHandle`s.
pub const HANDLE_ATTR: &str = "data-cart-eid";

/// JavaScript injected into the page to produce a simplified DOM for the LLM.
///
/// Interactive elements get sequential `data-eid` IDs; leaf text nodes are
/// emitted as quoted lines so prices and item titles stay visible.
const SNAPSHOT_JS: &str = r#"
(() => {
  const SKIP = new Set(['SCRIPT','STYLE','NOSCRIPT','SVG','LINK']);
  let id = 0;
  const lines = [];
  const seen = new Set();

  function isVisible(el) {
    if (el.offsetParent === null && el.tagName !== 'BODY' && el.tagName !== 'HTML') return false;
    const s = getComputedStyle(el);
    return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0';
  }

  function walk(node, depth) {
    if (depth > 15) return;
    for (const child of node.children) {
      if (SKIP.has(child.tagName) || !isVisible(child)) continue;
      const tag = child.tagName.toLowerCase();

      if (['a','button','input','textarea','select'].includes(tag)) {
        const eid = '[e' + (id++) + ']';
        child.setAttribute('data-eid', eid);
        const label = (child.textContent || child.value || '').trim().slice(0, 60);
        let desc = eid + ' ' + tag;
        if (tag === 'input' || tag === 'textarea') {
          desc += ' type=' + (child.type || 'text');
          if (child.name) desc += ' name=' + child.name;
          if (child.placeholder) desc += ' placeholder="' + child.placeholder + '"';
        }
        if (label) desc += ' "' + label + '"';
        if (!seen.has(desc)) { seen.add(desc); lines.push(desc); }
      } else if (child.children.length === 0) {
        const text = (child.textContent || '').trim();
        if (text.length > 2 && text.length < 200 && !seen.has(text)) {
          seen.add(text);
          lines.push('  "' + text.slice(0, 100) + '"');
        }
      }
      walk(child, depth + 1);
    }
  }

  walk(document.body, 0);
  return lines.join('\n');
})()
"#;

/// Shared helpers prepended to every lookup script.
const LOOKUP_PRELUDE: &str = r#"
const ATTR = 'data-cart-eid';
const visible = el => {
  const s = getComputedStyle(el);
  return (el.offsetParent !== null || s.position === 'fixed')
    && s.display !== 'none' && s.visibility !== 'hidden';
};
const tag = el => {
  let eid = el.getAttribute(ATTR);
  if (!eid) {
    window.__cartEid = (window.__cartEid || 0) + 1;
    eid = 'h' + window.__cartEid;
    el.setAttribute(ATTR, eid);
  }
  return eid;
};
const byHandle = eid => document.querySelector('[' + ATTR + '="' + eid + '"]');
"#;

fn evaluate(tab: &Arc<Tab>, body: &str) -> Result<Value> {
    let script = format!("(() => {{{LOOKUP_PRELUDE}\n{body}\n}})()");
    let result = tab.evaluate(&script, false)?;
    Ok(result.value.unwrap_or(Value::Null))
}

fn literal(text: &str) -> Result<String> {
    Ok(serde_json::to_string(text)?)
}

/// Selector addressing a previously tagged element.
pub fn handle_selector(token: &str) -> String {
    format!("[{HANDLE_ATTR}=\"{token}\"]")
}

/// Tag and return the first visible element matching `selector`.
pub fn tag_first(tab: &Arc<Tab>, selector: &str) -> Result<Option<String>> {
    let body = format!(
        "for (const el of document.querySelectorAll({})) {{ if (visible(el)) return tag(el); }} return null;",
        literal(selector)?
    );
    Ok(evaluate(tab, &body)?.as_str().map(String::from))
}

/// Tag and return every visible element matching `selector`.
pub fn tag_all(tab: &Arc<Tab>, selector: &str) -> Result<Vec<String>> {
    let body = format!(
        "return [...document.querySelectorAll({})].filter(visible).map(tag).join('\\n');",
        literal(selector)?
    );
    let joined = evaluate(tab, &body)?;
    Ok(joined
        .as_str()
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Tag and return the first element matching `selector` inside `scope`.
pub fn tag_within(tab: &Arc<Tab>, scope: &str, selector: &str) -> Result<Option<String>> {
    let body = format!(
        "const root = byHandle({}); if (!root) return null; const el = root.querySelector({}); return el ? tag(el) : null;",
        literal(scope)?,
        literal(selector)?
    );
    Ok(evaluate(tab, &body)?.as_str().map(String::from))
}

pub fn inner_text(tab: &Arc<Tab>, token: &str) -> Result<String> {
    let body = format!(
        "const el = byHandle({}); return el ? (el.innerText || el.textContent || '') : null;",
        literal(token)?
    );
    evaluate(tab, &body)?
        .as_str()
        .map(String::from)
        .ok_or_else(|| anyhow!("element {token} is no longer attached"))
}

pub fn clear_value(tab: &Arc<Tab>, token: &str) -> Result<()> {
    let body = format!(
        "const el = byHandle({}); if (el && 'value' in el) el.value = ''; return null;",
        literal(token)?
    );
    evaluate(tab, &body)?;
    Ok(())
}

/// Capture a simplified DOM snapshot from the current page.
pub fn capture_dom_snapshot(tab: &Arc<Tab>) -> Result<String> {
    let result = tab.evaluate(SNAPSHOT_JS, false)?;
    let raw = result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default();
    Ok(truncate(raw, DOM_SNAPSHOT_MAX_CHARS))
}

fn truncate(raw: String, max: usize) -> String {
    let total = raw.chars().count();
    if total <= max {
        return raw;
    }
    let kept: String = raw.chars().take(max).collect();
    format!("{kept}\n... [truncated, {total} total chars]")
}

/// Get the current page URL.
pub fn get_current_url(tab: &Arc<Tab>) -> Result<String> {
    let result = tab.evaluate("window.location.href", false)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "unknown".to_string()))
}

/// Get the current page title.
pub fn get_page_title(tab: &Arc<Tab>) -> Result<String> {
    let result = tab.evaluate("document.title", false)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "untitled".to_string()))
}
