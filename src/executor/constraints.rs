//! Key constraint checks for JQLDB

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::storage::{Row, Value};

/// Check primary and unique keys over a full row set
///
/// Two rows may not share an equal primary-key tuple unless some column of
/// the tuple is NULL. Two rows may not share an equal unique-key value unless
/// it is empty (NULL, `""` or `[]`).
pub fn validate_uniqueness<'a>(
    rows: impl IntoIterator<Item = &'a Row>,
    primary_keys: &[String],
    unique_keys: &[String],
) -> Result<()> {
    let rows: Vec<&Row> = rows.into_iter().collect();

    if !primary_keys.is_empty() {
        let mut seen: HashSet<Vec<&Value>> = HashSet::new();
        for row in &rows {
            let tuple: Vec<&Value> = primary_keys
                .iter()
                .map(|key| row.get(key).unwrap_or(&Value::Null))
                .collect();
            if tuple.iter().any(|v| v.is_null()) {
                continue;
            }
            if let Some(duplicate) = seen.replace(tuple) {
                return Err(Error::DuplicateKey {
                    kind: "primary",
                    key: primary_keys.join(", "),
                    values: join_values(&duplicate),
                });
            }
        }
    }

    for key in unique_keys {
        let mut seen: HashSet<&Value> = HashSet::new();
        for row in &rows {
            let value = match row.get(key) {
                Some(v) if !v.is_empty() => v,
                _ => continue,
            };
            if !seen.insert(value) {
                return Err(Error::DuplicateKey {
                    kind: "unique",
                    key: key.clone(),
                    values: value.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn join_values(values: &[&Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_primary_key_tuple() {
        let rows = vec![
            row(&[("a", Value::Integer(1)), ("b", Value::from("x"))]),
            row(&[("a", Value::Integer(1)), ("b", Value::from("y"))]),
        ];
        validate_uniqueness(&rows, &keys(&["a", "b"]), &[]).unwrap();

        let err = validate_uniqueness(&rows, &keys(&["a"]), &[]).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { kind: "primary", .. }));
        assert_eq!(
            err.to_string(),
            "Constraint error: duplicate value(s) (1) for primary key (a)"
        );
    }

    #[test]
    fn test_partial_primary_key_ignored() {
        let rows = vec![
            row(&[("a", Value::Integer(1)), ("b", Value::Null)]),
            row(&[("a", Value::Integer(1)), ("b", Value::Null)]),
        ];
        validate_uniqueness(&rows, &keys(&["a", "b"]), &[]).unwrap();
    }

    #[test]
    fn test_unique_key_skips_empty() {
        let rows = vec![
            row(&[("email", Value::from(""))]),
            row(&[("email", Value::from(""))]),
            row(&[("email", Value::Null)]),
            row(&[("email", Value::Null)]),
            row(&[("email", Value::from("a@b.c"))]),
        ];
        validate_uniqueness(&rows, &[], &keys(&["email"])).unwrap();

        let mut rows = rows;
        rows.push(row(&[("email", Value::from("a@b.c"))]));
        let err = validate_uniqueness(&rows, &[], &keys(&["email"])).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { kind: "unique", ref key, .. } if key == "email"));
    }
}
