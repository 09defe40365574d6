//! Text renderers shared by query builders.
//!
//! Values are inserted verbatim between single quotes. Nothing is escaped, so
//! a value containing `'` produces broken SQL; use [`placeholder_list`] with
//! bound parameters when values are not trusted.

use simpledb_core::Value;

/// Render `(c1,c2,...) VALUES ('v1','v2',...)`.
///
/// ```
/// use simpledb_query::render::value_list;
///
/// let pairs = vec![
///     ("id".to_string(), "1".to_string()),
///     ("name".to_string(), "bob".to_string()),
/// ];
/// assert_eq!(value_list(&pairs), "(id,name) VALUES ('1','bob')");
/// assert_eq!(value_list(&[]), "() VALUES ()");
/// ```
pub fn value_list(pairs: &[(String, String)]) -> String {
    let columns: Vec<&str> = pairs.iter().map(|(c, _)| c.as_str()).collect();
    let values: Vec<String> = pairs.iter().map(|(_, v)| format!("'{}'", v)).collect();
    format!("({}) VALUES ({})", columns.join(","), values.join(","))
}

/// Render `c1='v1'<sep>c2='v2'`. Zero pairs render an empty string.
pub fn assignment_list(pairs: &[(String, String)], separator: &str) -> String {
    pairs
        .iter()
        .map(|(c, v)| format!("{}='{}'", c, v))
        .collect::<Vec<_>>()
        .join(separator)
}

/// [`assignment_list`] joined by `,`.
pub fn assignment_list_default(pairs: &[(String, String)]) -> String {
    assignment_list(pairs, ",")
}

/// Render `(c1,c2) VALUES (?,?)` and return the values as text parameters.
pub fn placeholder_list(pairs: &[(String, String)]) -> (String, Vec<Value>) {
    let columns: Vec<&str> = pairs.iter().map(|(c, _)| c.as_str()).collect();
    let marks = vec!["?"; pairs.len()];
    let params = pairs.iter().map(|(_, v)| Value::Text(v.clone())).collect();
    (
        format!("({}) VALUES ({})", columns.join(","), marks.join(",")),
        params,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(c, v)| ((*c).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn assignment_list_with_separator() {
        let p = pairs(&[("a", "1"), ("b", "x y")]);
        assert_eq!(assignment_list(&p, " AND "), "a='1' AND b='x y'");
        assert_eq!(assignment_list_default(&p), "a='1',b='x y'");
        assert_eq!(assignment_list_default(&[]), "");
    }

    #[test]
    fn values_are_not_escaped() {
        let p = pairs(&[("name", "o'neil")]);
        assert_eq!(value_list(&p), "(name) VALUES ('o'neil')");
    }

    #[test]
    fn placeholders_bind_text() {
        let (sql, params) = placeholder_list(&pairs(&[("a", "1"), ("b", "o'neil")]));
        assert_eq!(sql, "(a,b) VALUES (?,?)");
        assert_eq!(
            params,
            vec![Value::Text("1".into()), Value::Text("o'neil".into())]
        );

        let (sql, params) = placeholder_list(&[]);
        assert_eq!(sql, "() VALUES ()");
        assert!(params.is_empty());
    }
}
