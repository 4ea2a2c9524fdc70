pub mod component;
pub mod element;
pub mod optional_value;
pub mod primitive;
pub mod schema;
pub mod structure;
pub mod tag;

pub use element::SchemaElement;
pub use primitive::{Primitive, ValidationError};
pub use schema::{ParseError, Schema, SchemaOptions};
pub use structure::{Count, Level, Row, RowKind, Structure};
pub use tag::Tag;

use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Parse a grammar and regenerate its canonical text
#[wasm_bindgen(js_name = "grammarRoundTrip")]
pub fn round_trip(source: &str) -> Result<String, String> {
    let schema = Schema::load_str(source).map_err(|e| e.to_string())?;
    Ok(schema.to_text())
}

/// Validate a value against a PRIMITIVE of the grammar.
///
/// Returns the definition of the alternative that matched, or an empty
/// string for `NULL`.
#[wasm_bindgen(js_name = "validatePrimitive")]
pub fn validate_primitive(source: &str, primitive: &str, value: &str) -> Result<String, String> {
    let schema = Schema::load_str(source).map_err(|e| e.to_string())?;
    let target = schema
        .primitive(primitive)
        .ok_or_else(|| format!("Unknown primitive: {}", primitive))?;
    let matched = target
        .validate_detailed(value, &schema)
        .map_err(|e| e.to_string())?;
    Ok(matched
        .map(|ov| ov.definition().to_string())
        .unwrap_or_default())
}
