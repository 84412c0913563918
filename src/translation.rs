use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

/// Marker that introduces a named parameter unless the pool is configured otherwise.
pub const DEFAULT_PARAM_MARKER: char = '?';

static DEFAULT_PATTERN: LazyLock<Regex> = LazyLock::new(|| build_pattern(DEFAULT_PARAM_MARKER));

/// Target placeholder style for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style numbered placeholders like `$1`.
    Postgres,
    /// SQLite-style anonymous placeholders `?`.
    Sqlite,
}

/// A query rewritten to positional placeholders, plus the parameter names in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedQuery {
    pub sql: String,
    /// One entry per placeholder in `sql`, left to right. Duplicates are kept.
    pub names: Vec<String>,
}

/// Whether a statement reads rows or mutates state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Mutation,
}

impl StatementKind {
    /// Classify by the first word of the statement: `select` (any case) is a read.
    ///
    /// Leading comments are not skipped, so `/* c */ select 1` classifies as a mutation.
    #[must_use]
    pub fn classify(sql: &str) -> Self {
        let first = sql
            .trim_start()
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .next()
            .unwrap_or_default();
        if first.eq_ignore_ascii_case("select") {
            StatementKind::Read
        } else {
            StatementKind::Mutation
        }
    }
}

/// Rewrites named-parameter SQL for one backend. Built once per pool.
#[derive(Debug, Clone)]
pub struct NamedQueryTranslator {
    marker: char,
    style: PlaceholderStyle,
    pattern: Regex,
}

impl NamedQueryTranslator {
    #[must_use]
    pub fn new(marker: char, style: PlaceholderStyle) -> Self {
        let pattern = if marker == DEFAULT_PARAM_MARKER {
            DEFAULT_PATTERN.clone()
        } else {
            build_pattern(marker)
        };
        Self {
            marker,
            style,
            pattern,
        }
    }

    #[must_use]
    pub fn marker(&self) -> char {
        self.marker
    }

    #[must_use]
    pub fn style(&self) -> PlaceholderStyle {
        self.style
    }

    #[must_use]
    pub fn translate(&self, query: &str) -> TranslatedQuery {
        rewrite(&self.pattern, self.marker, self.style, query)
    }
}

/// Translate `query`, replacing every `marker` + identifier run with a positional placeholder.
///
/// The query is trimmed first. A query without named tokens comes back unchanged with an empty
/// name list.
///
/// ```rust
/// use sql_scope::translation::{translate_named, PlaceholderStyle};
///
/// let t = translate_named(
///     "insert into sample(name, password) values (?name, ?password)",
///     '?',
///     PlaceholderStyle::Postgres,
/// );
/// assert_eq!(t.sql, "insert into sample(name, password) values ($1, $2)");
/// assert_eq!(t.names, vec!["name", "password"]);
/// ```
#[must_use]
pub fn translate_named(query: &str, marker: char, style: PlaceholderStyle) -> TranslatedQuery {
    if marker == DEFAULT_PARAM_MARKER {
        rewrite(&DEFAULT_PATTERN, marker, style, query)
    } else {
        rewrite(&build_pattern(marker), marker, style, query)
    }
}

fn build_pattern(marker: char) -> Regex {
    let escaped = regex::escape(marker.encode_utf8(&mut [0u8; 4]));
    // An escaped single character followed by a fixed class always compiles.
    Regex::new(&format!("{escaped}[A-Za-z0-9_]+")).unwrap_or_else(|_| unreachable!())
}

fn rewrite(pattern: &Regex, marker: char, style: PlaceholderStyle, query: &str) -> TranslatedQuery {
    let query = query.trim();
    let mut names = Vec::new();
    let mut sql = String::with_capacity(query.len());
    let mut last = 0;

    for found in pattern.find_iter(query) {
        sql.push_str(&query[last..found.start()]);
        names.push(found.as_str()[marker.len_utf8()..].to_string());
        match style {
            PlaceholderStyle::Sqlite => sql.push('?'),
            PlaceholderStyle::Postgres => {
                let _ = write!(sql, "${}", names.len());
            }
        }
        last = found.end();
    }
    sql.push_str(&query[last..]);

    TranslatedQuery { sql, names }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_named_to_sqlite() {
        let t = translate_named(
            "insert into sample(name, password) values (?name, ?password)",
            '?',
            PlaceholderStyle::Sqlite,
        );
        assert_eq!(t.sql, "insert into sample(name, password) values (?, ?)");
        assert_eq!(t.names, vec!["name", "password"]);
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let t = translate_named(
            "select * from t where a = ?x or b = ?y or c = ?x",
            '?',
            PlaceholderStyle::Postgres,
        );
        assert_eq!(t.sql, "select * from t where a = $1 or b = $2 or c = $3");
        assert_eq!(t.names, vec!["x", "y", "x"]);
    }

    #[test]
    fn no_tokens_leaves_query_untouched() {
        let t = translate_named("select count(*) as count from sample", '?', PlaceholderStyle::Sqlite);
        assert_eq!(t.sql, "select count(*) as count from sample");
        assert!(t.names.is_empty());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let t = translate_named("  \n select ?a \n", '?', PlaceholderStyle::Sqlite);
        assert_eq!(t.sql, "select ?");
        assert_eq!(t.names, vec!["a"]);
    }

    #[test]
    fn token_is_a_maximal_identifier_run() {
        let t = translate_named("update t set v = ?new_value_2+1", '?', PlaceholderStyle::Sqlite);
        assert_eq!(t.sql, "update t set v = ?+1");
        assert_eq!(t.names, vec!["new_value_2"]);
    }

    #[test]
    fn bare_marker_is_not_a_token() {
        let t = translate_named("select ? , ?a", '?', PlaceholderStyle::Sqlite);
        assert_eq!(t.sql, "select ? , ?");
        assert_eq!(t.names, vec!["a"]);
    }

    #[test]
    fn custom_marker() {
        let translator = NamedQueryTranslator::new(':', PlaceholderStyle::Postgres);
        let t = translator.translate("delete from t where id = :id and owner = :owner");
        assert_eq!(t.sql, "delete from t where id = $1 and owner = $2");
        assert_eq!(t.names, vec!["id", "owner"]);
        assert_eq!(translator.marker(), ':');
    }

    #[test]
    fn regex_metacharacter_marker_is_escaped() {
        let t = translate_named("select * from t where a = $a", '$', PlaceholderStyle::Sqlite);
        assert_eq!(t.sql, "select * from t where a = ?");
        assert_eq!(t.names, vec!["a"]);
    }

    #[test]
    fn name_count_matches_placeholder_count() {
        let queries = [
            "select 1",
            "select ?a",
            "insert into t values (?a, ?b, ?a, ?c)",
            "update t set x = ?x where y in (?y1, ?y2)",
        ];
        for q in queries {
            let t = translate_named(q, '?', PlaceholderStyle::Sqlite);
            assert_eq!(t.sql.matches('?').count(), t.names.len(), "query: {q}");
        }
    }

    #[test]
    fn classifies_first_word() {
        assert_eq!(StatementKind::classify("SELECT 1"), StatementKind::Read);
        assert_eq!(StatementKind::classify("  select*from t"), StatementKind::Read);
        assert_eq!(StatementKind::classify("Select\n1"), StatementKind::Read);
        assert_eq!(StatementKind::classify("insert into t values (1)"), StatementKind::Mutation);
        assert_eq!(StatementKind::classify("selection_fn()"), StatementKind::Mutation);
        assert_eq!(StatementKind::classify("set x = 1"), StatementKind::Mutation);
        assert_eq!(StatementKind::classify(""), StatementKind::Mutation);
    }
}
