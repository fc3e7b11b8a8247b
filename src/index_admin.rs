use serde_json::Value;
use tracing::info;

use crate::{error::Result, transport::Transport};

/// Deep-merge `overrides` into `base`.
///
/// Objects merge key by key, recursively; any other override value
/// (arrays included) replaces the base value wholesale. A null override
/// leaves the base untouched.
pub fn merge_settings(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (_, Value::Null) => base.clone(),
        (Value::Object(base), Value::Object(overrides)) => {
            let mut merged = base.clone();
            for (key, value) in overrides {
                let next = match merged.get(key) {
                    Some(existing) => merge_settings(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overrides) => overrides.clone(),
    }
}

/// Create `name` with the default settings merged under `overrides`.
///
/// No existence check is made: creating an index that already exists
/// surfaces the engine's own error.
pub fn create_index<T: Transport + ?Sized>(
    transport: &T,
    name: &str,
    defaults: &Value,
    overrides: &Value,
) -> Result<Value> {
    let mut settings = merge_settings(defaults, overrides);
    if settings.is_null() {
        settings = Value::Object(Default::default());
    }
    let response = transport.create_index(name, &settings)?;
    info!(index = name, "created index");
    Ok(response)
}

pub fn delete_index<T: Transport + ?Sized>(
    transport: &T,
    name: &str,
) -> Result<Value> {
    let response = transport.delete_index(name)?;
    info!(index = name, "deleted index");
    Ok(response)
}
