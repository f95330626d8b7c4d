//! Instruction batches on disk: JSON in the array-of-tagged-tuples wire
//! format, converted into engine [`Value`]s.

use std::path::Path;

use anyhow::Context;
use resona_core::Value;

/// Converts a JSON value into the engine's dynamic value type.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            Value::Array(items.iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
    }
}

/// Loads a wire batch from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading batch file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing batch file {}", path.display()))?;
    Ok(json_to_value(&json))
}

/// Parses a `name=path` sample mapping argument.
pub fn parse_sample_spec(spec: &str) -> anyhow::Result<(String, String)> {
    spec.split_once('=')
        .map(|(name, path)| (name.to_string(), path.to_string()))
        .ok_or_else(|| anyhow::anyhow!("expected name=path, got `{spec}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_shapes() {
        let json: serde_json::Value = serde_json::from_str(
            r#"[[0, 1, "const"], [3, 1, "value", 6.5], [4, [2]], [5]]"#,
        )
        .unwrap();
        let value = json_to_value(&json);
        let batch = value.as_array().unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(
            batch[1].as_array().unwrap()[3],
            Value::Number(6.5)
        );
    }

    #[test]
    fn test_parse_sample_spec() {
        assert_eq!(
            parse_sample_spec("kick=drums/kick.wav").unwrap(),
            ("kick".to_string(), "drums/kick.wav".to_string())
        );
        assert!(parse_sample_spec("nope").is_err());
    }
}
