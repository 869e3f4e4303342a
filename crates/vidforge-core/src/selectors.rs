//! Element-matching policy, kept as configuration data rather than control
//! flow. The remote application renders unstable class names and reorders
//! option lists, so every match is by visible text or icon glyph; the
//! concrete strings live in `SelectorStrategy` and the functions below
//! compile them into page expressions for `PageDriver::evaluate`.

use serde::{Deserialize, Serialize};

/// The matching rules for one deployment of the target application.
/// Defaults reproduce the labels the production UI renders (Turkish
/// locale).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorStrategy {
    /// Visible label of the settings control.
    pub settings_label: String,
    /// Visible label on the model combobox inside settings.
    pub model_menu_label: String,
    /// Visible text of the model variant to select.
    pub model_option: String,
    /// Placeholder attribute on the prompt textarea.
    pub prompt_placeholder: String,
    /// Icon glyph inside the submit control.
    pub submit_glyph: String,
    /// Icon glyph inside a result's download control.
    pub download_glyph: String,
    /// Visible text of the download-quality menu entry.
    pub quality_option: String,
    /// Phrase the page shows when generation failed remotely.
    pub failure_phrase: String,
}

impl Default for SelectorStrategy {
    fn default() -> Self {
        Self {
            settings_label: "Ayarlar".to_string(),
            model_menu_label: "Model".to_string(),
            model_option: "Veo 3 - Fast (Text to Video)".to_string(),
            prompt_placeholder: "Metin içeren bir video üretin…".to_string(),
            submit_glyph: "arrow_forward".to_string(),
            download_glyph: "download".to_string(),
            quality_option: "Orijinal boyut (720p)".to_string(),
            failure_phrase: "Video Üretilemedi".to_string(),
        }
    }
}

impl SelectorStrategy {
    /// CSS selector for the prompt input surface.
    pub fn prompt_selector(&self) -> String {
        format!("textarea[placeholder={}]", literal(&self.prompt_placeholder))
    }
}

/// Click the button whose descendant span carries exactly `label`.
pub fn click_button_with_span_text(label: &str) -> String {
    let label_lit = literal(label);
    format!(
        r#"(() => {{
  const label = {label_lit};
  const buttons = Array.from(document.querySelectorAll('button'));
  const target = buttons.find(btn =>
    Array.from(btn.querySelectorAll('span')).some(span => span.textContent === label));
  if (!target) return false;
  target.click();
  return true;
}})()"#
    )
}

/// Click the combobox button whose descendant span carries exactly `label`.
pub fn click_combobox_with_span_text(label: &str) -> String {
    let label_lit = literal(label);
    format!(
        r#"(() => {{
  const label = {label_lit};
  const boxes = Array.from(document.querySelectorAll('button[role="combobox"]'));
  const target = boxes.find(box =>
    Array.from(box.querySelectorAll('span')).some(span => span.textContent === label));
  if (!target) return false;
  target.click();
  return true;
}})()"#
    )
}

/// True once any option element of an open menu has rendered.
pub fn menu_rendered_probe() -> String {
    r#"document.querySelector('[role="menuitemradio"], [data-radix-collection-item]') !== null"#
        .to_string()
}

/// Click the first rendered option whose text contains `wanted`. Matching
/// is by content, never by position: rendering order is not stable.
pub fn click_option_containing(wanted: &str) -> String {
    let wanted_lit = literal(wanted);
    format!(
        r#"(() => {{
  const wanted = {wanted_lit};
  const items = Array.from(document.querySelectorAll(
    '[role="menuitemradio"], [role="option"], [data-radix-collection-item]'));
  const target = items.find(el => el.textContent && el.textContent.includes(wanted));
  if (!target) return false;
  target.click();
  return true;
}})()"#
    )
}

/// Click the first menu item whose text contains `wanted`.
pub fn click_menuitem_containing(wanted: &str) -> String {
    let wanted_lit = literal(wanted);
    format!(
        r#"(() => {{
  const wanted = {wanted_lit};
  const items = Array.from(document.querySelectorAll('[role="menuitem"]'));
  const target = items.find(el => el.textContent && el.textContent.includes(wanted));
  if (!target) return false;
  target.click();
  return true;
}})()"#
    )
}

/// Click the first button containing an icon element whose glyph name is
/// `glyph`. Newest results render first, so "first" targets the latest
/// result's control.
pub fn click_button_with_glyph(glyph: &str) -> String {
    let glyph_lit = literal(glyph);
    format!(
        r#"(() => {{
  const glyph = {glyph_lit};
  const buttons = Array.from(document.querySelectorAll('button'));
  const matches = buttons.filter(btn =>
    Array.from(btn.querySelectorAll('i')).some(icon => icon.textContent === glyph));
  if (matches.length === 0) return false;
  matches[0].click();
  return true;
}})()"#
    )
}

/// True when the page body contains `phrase` anywhere in its text.
pub fn page_contains_text(phrase: &str) -> String {
    let phrase_lit = literal(phrase);
    format!(
        r#"(() => {{
  const phrase = {phrase_lit};
  return !!document.body && document.body.innerText.includes(phrase);
}})()"#
    )
}

/// True when some result button's whitespace-normalized text equals
/// `prompt` exactly. Disambiguates the fresh result from older entries in
/// a list that grows over time.
pub fn result_with_exact_text(prompt: &str) -> String {
    let normalized = normalize_whitespace(prompt);
    let prompt_lit = literal(&normalized);
    format!(
        r#"(() => {{
  const wanted = {prompt_lit};
  const normalize = text => text.replace(/\s+/g, ' ').trim();
  const buttons = Array.from(document.querySelectorAll('button'));
  return buttons.some(btn => normalize(btn.textContent || '') === wanted);
}})()"#
    )
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Encode a Rust string as a JavaScript string literal.
fn literal(text: &str) -> String {
    serde_json::to_string(text).expect("string serialization is infallible")
}
