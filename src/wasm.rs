use wasm_bindgen::prelude::*;

use crate::Job;

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Lay out a JSON job and return its page map as a JS object.
#[wasm_bindgen]
pub fn paginate(json: &str) -> Result<JsValue, JsValue> {
    let prepared = Job::from_json(json).map_err(to_js)?.prepare();
    serde_wasm_bindgen::to_value(&prepared.page_map).map_err(to_js)
}

/// Diagnostics for a JSON job.
#[wasm_bindgen]
pub fn diagnose(json: &str) -> Result<JsValue, JsValue> {
    let prepared = Job::from_json(json).map_err(to_js)?.prepare();
    serde_wasm_bindgen::to_value(&prepared.diagnostics).map_err(to_js)
}

#[wasm_bindgen]
pub fn render_preview(json: &str) -> Result<String, JsValue> {
    let prepared = Job::from_json(json).map_err(to_js)?.prepare();
    Ok(prepared.render_preview(&Default::default()).0)
}

#[wasm_bindgen]
pub fn render_pdf(json: &str) -> Result<Vec<u8>, JsValue> {
    crate::render_pdf_json(json).map_err(to_js)
}
