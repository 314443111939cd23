//! Cosine similarity for application-side vector search.

use serde_json::Value;

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths, empty vectors, or a zero-magnitude
/// operand.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Parses a stored embedding.
///
/// Accepts a JSON array of numbers or a string holding one (SQLite keeps
/// vectors as TEXT). Anything else is treated as "no embedding".
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_embedding(value: &Value) -> Option<Vec<f32>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<_>>>()
            .filter(|v| !v.is_empty()),
        Value::String(text) => serde_json::from_str::<Value>(text)
            .ok()
            .filter(Value::is_array)
            .as_ref()
            .and_then(parse_embedding),
        _ => None,
    }
}

/// Encodes an embedding as a JSON array.
#[must_use]
pub fn embedding_to_value(embedding: &[f32]) -> Value {
    Value::Array(
        embedding
            .iter()
            .map(|f| Value::from(f64::from(*f)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_vectors() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_magnitude_guard() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_length_mismatch_guard() {
        assert!(cosine_similarity(&[1.0], &[1.0, 1.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[], &[]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_embedding_forms() {
        assert_eq!(parse_embedding(&json!([0.5, 1])), Some(vec![0.5, 1.0]));
        assert_eq!(parse_embedding(&json!("[0.25, 2]")), Some(vec![0.25, 2.0]));
        assert_eq!(parse_embedding(&json!([])), None);
        assert_eq!(parse_embedding(&json!(["x"])), None);
        assert_eq!(parse_embedding(&json!(null)), None);
        assert_eq!(parse_embedding(&json!("not json")), None);
    }
}
