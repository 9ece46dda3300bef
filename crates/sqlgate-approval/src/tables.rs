//! Best-effort extraction of the tables a statement touches.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static TABLE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:FROM|JOIN|UPDATE|INSERT\s+INTO|DELETE\s+FROM)\s+(\w+)")
        .expect("invalid regex")
});

/// Table names following `FROM`, `JOIN`, `UPDATE`, `INSERT INTO` or
/// `DELETE FROM`, deduplicated and sorted.
///
/// Purely lexical: quoted identifiers, schema-qualified names and
/// sub-selects are not understood.
///
/// # Example
///
/// ```
/// use sqlgate_approval::affected_tables;
///
/// let tables = affected_tables(
///     "SELECT e.name FROM employees e JOIN departments d ON e.dept_id = d.id;",
/// );
/// assert_eq!(tables, vec!["departments", "employees"]);
/// ```
#[must_use]
pub fn affected_tables(sql: &str) -> Vec<String> {
    TABLE_REFERENCE
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_table() {
        assert_eq!(
            affected_tables("UPDATE patients SET status = 'ok' WHERE id = 1;"),
            vec!["patients"]
        );
    }

    #[test]
    fn test_insert_and_delete() {
        assert_eq!(
            affected_tables("insert into orders (id) values (1);"),
            vec!["orders"]
        );
        assert_eq!(
            affected_tables("DELETE FROM  carts WHERE id = 2;"),
            vec!["carts"]
        );
    }

    #[test]
    fn test_deduplicates() {
        let sql = "SELECT * FROM a JOIN b ON a.id = b.id WHERE a.id IN (SELECT id FROM a);";
        assert_eq!(affected_tables(sql), vec!["a", "b"]);
    }

    #[test]
    fn test_no_tables() {
        assert!(affected_tables("SELECT 1;").is_empty());
    }
}
