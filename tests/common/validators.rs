//! Response validation
//!
//! Checks that a serialized `RecognitionResponse` is structurally correct and
//! internally consistent without needing golden output files.

#![allow(dead_code)]

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    pub fn error(&mut self, msg: String) {
        self.errors.push(msg);
        self.valid = false;
    }

    pub fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }
}

/// Validate a recognition response
pub fn validate_recognition(output: &Value) -> ValidationResult {
    let mut result = ValidationResult::default();

    let Some(obj) = output.as_object() else {
        result.error("Recognition output must be an object".to_string());
        return result;
    };

    let entries = match obj.get("entries").and_then(Value::as_array) {
        Some(arr) => arr,
        None => {
            result.error("Missing entries array".to_string());
            return result;
        }
    };

    if entries.len() > 3 {
        result.error(format!("At most 3 entries allowed, got {}", entries.len()));
    }

    match obj.get("food_count").and_then(Value::as_u64) {
        Some(count) if count as usize == entries.len() => {}
        Some(count) => result.error(format!(
            "food_count {} does not match {} entries",
            count,
            entries.len()
        )),
        None => result.error("Missing food_count".to_string()),
    }

    match obj.get("produced_by").and_then(Value::as_str) {
        Some("real") => {}
        Some("dummy") => result.warn("Dummy result".to_string()),
        Some(other) => result.error(format!("Unknown produced_by: {}", other)),
        None => result.error("Missing produced_by".to_string()),
    }

    let mut sum = 0u64;
    for (i, entry) in entries.iter().enumerate() {
        let Some(entry) = entry.as_object() else {
            result.error(format!("Entry {} must be an object", i));
            continue;
        };

        match entry.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => {}
            _ => result.error(format!("Entry {}: missing or empty name", i)),
        }

        let calories = entry.get("calories");
        match calories {
            Some(Value::Null) => {}
            Some(v) => match v.as_u64() {
                Some(kcal) => sum += kcal,
                None => result.error(format!("Entry {}: calories must be a non-negative integer", i)),
            },
            None => result.error(format!("Entry {}: missing calories", i)),
        }

        match entry.get("source").and_then(Value::as_str) {
            Some("table") | Some("model") => {
                if calories.map_or(true, Value::is_null) {
                    result.error(format!("Entry {}: resolved source with null calories", i));
                }
            }
            Some("none") => {
                if !calories.map_or(true, Value::is_null) {
                    result.error(format!("Entry {}: source none with calories", i));
                }
            }
            _ => result.error(format!("Entry {}: missing or unknown source", i)),
        }
    }

    match obj.get("total_calories").and_then(Value::as_u64) {
        Some(total) if total == sum => {}
        Some(total) => result.error(format!(
            "total_calories {} does not equal entry sum {}",
            total, sum
        )),
        None => result.error("Missing total_calories".to_string()),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_consistent_response() {
        let output = json!({
            "food_count": 2,
            "entries": [
                {"name": "rice", "calories": 310, "source": "table"},
                {"name": "mystery", "calories": null, "source": "none"}
            ],
            "total_calories": 310,
            "produced_by": "real"
        });
        let result = validate_recognition(&output);
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn test_validate_bad_total() {
        let output = json!({
            "food_count": 1,
            "entries": [{"name": "rice", "calories": 310, "source": "table"}],
            "total_calories": 300,
            "produced_by": "real"
        });
        assert!(!validate_recognition(&output).valid);
    }
}
