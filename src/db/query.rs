//! Named-parameter query building.
//!
//! SQL is written with `:name` placeholders and values are bound by name.
//! [`Query::build`] turns the placeholders into positional `?` parameters in
//! order of appearance. Placeholders inside quoted strings or identifiers and
//! `::type` casts are left alone.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::IsletError;

/// SQL with named bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    sql: String,
    bindings: BTreeMap<String, Value>,
}

/// SQL with positional `?` parameters, ready for a driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltQuery {
    /// SQL text
    pub sql: String,
    /// Parameter values in placeholder order
    pub params: Vec<Value>,
}

impl Query {
    /// Start a query from SQL text.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: BTreeMap::new(),
        }
    }

    /// Bind `value` to placeholder `:name`.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// The SQL as written.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Replace placeholders with positional parameters.
    ///
    /// # Errors
    ///
    /// [`IsletError::MissingParameter`] for the first placeholder with no binding.
    pub fn build(&self) -> Result<BuiltQuery, IsletError> {
        let bytes = self.sql.as_bytes();
        let mut sql = String::with_capacity(self.sql.len());
        let mut params = Vec::new();
        let mut quote: Option<u8> = None;
        let mut i = 0;
        let mut copied = 0;

        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if matches!(b, b'\'' | b'"' | b'`') => quote = Some(b),
                None if b == b':' && bytes.get(i + 1) == Some(&b':') => i += 1,
                None if b == b':' && bytes.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_') => {
                    let start = i + 1;
                    let mut end = start;
                    while bytes.get(end).is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_') {
                        end += 1;
                    }
                    let name = &self.sql[start..end];
                    let value = self.bindings.get(name).ok_or_else(|| IsletError::MissingParameter {
                        name: name.to_string(),
                        sql: self.sql.clone(),
                    })?;
                    sql.push_str(&self.sql[copied..i]);
                    sql.push('?');
                    params.push(value.clone());
                    copied = end;
                    i = end;
                    continue;
                }
                None => {}
            }
            i += 1;
        }
        sql.push_str(&self.sql[copied..]);

        Ok(BuiltQuery {
            sql,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_to_positional() {
        let built = Query::new("SELECT * FROM users WHERE id = :id AND org = :org OR id = :id")
            .bind("id", 7)
            .bind("org", "acme")
            .build()
            .unwrap();
        assert_eq!(built.sql, "SELECT * FROM users WHERE id = ? AND org = ? OR id = ?");
        assert_eq!(built.params, vec![json!(7), json!("acme"), json!(7)]);
    }

    #[test]
    fn test_missing_parameter() {
        let err = Query::new("DELETE FROM t WHERE a = :a AND b = :b").bind("a", 1).build().unwrap_err();
        match err {
            IsletError::MissingParameter { name, sql } => {
                assert_eq!(name, "b");
                assert!(sql.starts_with("DELETE"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_quotes_and_casts_are_not_placeholders() {
        let built = Query::new("SELECT ':skip', \"a:b\", created::date FROM t WHERE x = :x")
            .bind("x", true)
            .build()
            .unwrap();
        assert_eq!(built.sql, "SELECT ':skip', \"a:b\", created::date FROM t WHERE x = ?");
        assert_eq!(built.params, vec![json!(true)]);
    }
}
