//! Standard SQL builders for the common commands.
//!
//! Each function has the builder signature `(table, pairs) -> sql` and can be
//! registered directly with [`BuilderRegistry::register`](crate::BuilderRegistry::register).
//! [`update`] can reject its pairs and goes through
//! [`BuilderRegistry::register_fallible`](crate::BuilderRegistry::register_fallible).

use crate::render::{assignment_list, assignment_list_default, value_list};
use simpledb_core::error::{QueryError, QueryErrorKind};
use simpledb_core::{Error, Result};

/// `SELECT * FROM t`, filtered by every pair joined with `AND`.
pub fn select(table: &str, pairs: &[(String, String)]) -> String {
    with_where(format!("SELECT * FROM {}", table), pairs)
}

/// `INSERT INTO t (cols) VALUES (vals)`.
pub fn insert(table: &str, pairs: &[(String, String)]) -> String {
    format!("INSERT INTO {} {}", table, value_list(pairs))
}

/// `UPDATE t SET ... WHERE key`.
///
/// The first pair identifies the row, the remaining pairs are assigned.
/// Fewer than two pairs leave nothing to assign and are rejected.
pub fn update(table: &str, pairs: &[(String, String)]) -> Result<String> {
    match pairs.split_first() {
        Some((key, rest)) if !rest.is_empty() => Ok(format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            assignment_list_default(rest),
            assignment_list(std::slice::from_ref(key), "")
        )),
        _ => Err(Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: None,
            message: format!(
                "UPDATE on {} needs a key pair and at least one assignment, got {} pair(s)",
                table,
                pairs.len()
            ),
            source: None,
        })),
    }
}

/// `DELETE FROM t`, filtered by every pair joined with `AND`.
pub fn delete(table: &str, pairs: &[(String, String)]) -> String {
    with_where(format!("DELETE FROM {}", table), pairs)
}

fn with_where(mut sql: String, pairs: &[(String, String)]) -> String {
    if !pairs.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&assignment_list(pairs, " AND "));
    }
    sql
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
    fn select_and_delete_filters() {
        assert_eq!(select("users", &[]), "SELECT * FROM users");
        assert_eq!(
            select("users", &pairs(&[("id", "1"), ("name", "a")])),
            "SELECT * FROM users WHERE id='1' AND name='a'"
        );
        assert_eq!(delete("users", &[]), "DELETE FROM users");
        assert_eq!(
            delete("users", &pairs(&[("id", "7")])),
            "DELETE FROM users WHERE id='7'"
        );
    }

    #[test]
    fn insert_uses_value_list() {
        assert_eq!(
            insert("users", &pairs(&[("id", "1"), ("name", "a")])),
            "INSERT INTO users (id,name) VALUES ('1','a')"
        );
    }

    #[test]
    fn update_keys_on_first_pair() {
        assert_eq!(
            update("users", &pairs(&[("id", "1"), ("name", "b"), ("age", "3")])).unwrap(),
            "UPDATE users SET name='b',age='3' WHERE id='1'"
        );
        assert_eq!(
            update("users", &pairs(&[("id", "1"), ("name", "b")])).unwrap(),
            "UPDATE users SET name='b' WHERE id='1'"
        );
    }

    #[test]
    fn update_without_assignments_is_rejected() {
        for given in [pairs(&[("id", "1")]), Vec::new()] {
            match update("t", &given) {
                Err(Error::Query(e)) => {
                    assert_eq!(e.kind, QueryErrorKind::Syntax);
                    assert!(e.message.contains("at least one assignment"), "{}", e.message);
                }
                other => panic!("expected query error for {given:?}, got {other:?}"),
            }
        }
    }
}
