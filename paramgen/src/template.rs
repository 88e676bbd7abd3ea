// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! Candidate extraction templates.
//!
//! Every query type ships a SQL template `pg-{query}.sql`. Templates refer to
//! the bucket through named parameters which are bound to typed SQL literals
//! before the statement reaches the engine:
//!
//! | Parameter            | Bound to                                 |
//! |----------------------|------------------------------------------|
//! | `:date_limit_filter` | `DATE 'YYYY-MM-DD'` of the bucket limit  |
//! | `:date_limit_long`   | bucket limit in epoch milliseconds (UTC) |
//! | `:date_start_filter` | `DATE 'YYYY-MM-DD'` of the period start  |
//! | `:date_start_long`   | period start in epoch milliseconds (UTC) |
//!
//! Postgres style casts (`::BIGINT`) and string literals are left untouched.
//! Any other `:name` is rejected so that a typo never reaches the engine as
//! an unresolved column.

use crate::catalog::query::QueryType;
use crate::config::DATE_FORMAT;
use crate::error::{ParamgenError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns midnight (UTC) of `date` in epoch milliseconds.
pub fn epoch_millis(date: NaiveDate) -> i64 {
    NaiveDateTime::new(date, NaiveTime::MIN)
        .and_utc()
        .timestamp_millis()
}

/// The values a template is bound with for one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryParameters {
    /// Upper bound of the current bucket.
    pub date_limit: NaiveDate,
    /// Lower bound of the whole observation period.
    pub date_start: NaiveDate,
}

impl QueryParameters {
    /// Creates the parameters of one bucket.
    pub fn new(date_limit: NaiveDate, date_start: NaiveDate) -> Self {
        QueryParameters {
            date_limit,
            date_start,
        }
    }

    /// `date_limit` as a SQL date literal.
    pub fn date_limit_filter(&self) -> String {
        date_literal(self.date_limit)
    }

    /// `date_limit` in epoch milliseconds.
    pub fn date_limit_long(&self) -> i64 {
        epoch_millis(self.date_limit)
    }

    /// `date_start` as a SQL date literal.
    pub fn date_start_filter(&self) -> String {
        date_literal(self.date_start)
    }

    /// `date_start` in epoch milliseconds.
    pub fn date_start_long(&self) -> i64 {
        epoch_millis(self.date_start)
    }

    fn literal(&self, name: &str) -> Option<String> {
        match name {
            "date_limit_filter" => Some(self.date_limit_filter()),
            "date_limit_long" => Some(self.date_limit_long().to_string()),
            "date_start_filter" => Some(self.date_start_filter()),
            "date_start_long" => Some(self.date_start_long().to_string()),
            _ => None,
        }
    }
}

fn date_literal(date: NaiveDate) -> String {
    format!("DATE '{}'", date.format(DATE_FORMAT))
}

/// A named candidate extraction query with unbound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    name: String,
    sql:  String,
}

impl QueryTemplate {
    /// Creates a template from its SQL text.
    pub fn new<T: Into<String>>(name: T, sql: T) -> Self {
        QueryTemplate {
            name: name.into(),
            sql:  sql.into(),
        }
    }

    /// Reads a template file.
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let sql = fs::read_to_string(path).map_err(|e| {
            ParamgenError::Template(format!(
                "cannot read template {} for Q{}: {}",
                path.display(),
                name,
                e
            ))
        })?;
        Ok(QueryTemplate::new(name.to_owned(), sql))
    }

    /// The query type name the template belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unbound SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Substitutes every parameter with its literal. String literals, quoted
    /// identifiers and comments are copied through untouched. A trailing `;`
    /// is dropped so the result can be nested as a sub-query.
    pub fn bind(&self, params: &QueryParameters) -> Result<String> {
        let sql = self.sql.trim().trim_end_matches(';');
        let chars: Vec<char> = sql.chars().collect();
        let mut bound = String::with_capacity(sql.len() + 32);
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            let skipped = match (c, next) {
                ('\'', _) => Some(skip_past(&chars, i + 1, "'")),
                ('"', _) => Some(skip_past(&chars, i + 1, "\"")),
                ('-', Some('-')) => Some(skip_past(&chars, i + 2, "\n")),
                ('/', Some('*')) => Some(skip_past(&chars, i + 2, "*/")),
                // `::` is a cast.
                (':', Some(':')) => Some(i + 2),
                _ => None,
            };
            if let Some(end) = skipped {
                bound.extend(&chars[i..end]);
                i = end;
                continue;
            }
            if c != ':' {
                bound.push(c);
                i += 1;
                continue;
            }

            let start = i + 1;
            let mut end = start;
            if end < chars.len() && (chars[end].is_ascii_alphabetic() || chars[end] == '_') {
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
            }
            if end == start {
                bound.push(c);
                i += 1;
                continue;
            }
            let name: String = chars[start..end].iter().collect();
            let literal = params.literal(&name).ok_or_else(|| {
                ParamgenError::Template(format!(
                    "unknown parameter :{} in the template of Q{}",
                    name, self.name
                ))
            })?;
            bound.push_str(&literal);
            i = end;
        }

        Ok(bound)
    }
}

/// Index just past the first `terminator` at or after `from`, or the end of
/// the text when it never closes.
fn skip_past(chars: &[char], from: usize, terminator: &str) -> usize {
    let terminator: Vec<char> = terminator.chars().collect();
    let mut i = from;
    while i + terminator.len() <= chars.len() {
        if chars[i..i + terminator.len()] == terminator[..] {
            return i + terminator.len();
        }
        i += 1;
    }
    chars.len()
}

/// The directory holding the `pg-{query}.sql` templates.
#[derive(Debug, Clone)]
pub struct TemplateDirectory {
    dir: PathBuf,
}

impl TemplateDirectory {
    /// Creates a template directory.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        TemplateDirectory { dir: dir.into() }
    }

    /// Path of the template of `query`.
    pub fn path(&self, query: &QueryType) -> PathBuf {
        self.dir.join(query.template_file())
    }

    /// Loads the template of `query`.
    pub fn template(&self, query: &QueryType) -> Result<QueryTemplate> {
        QueryTemplate::load(query.name, &self.path(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> QueryParameters {
        QueryParameters::new(
            NaiveDate::from_ymd_opt(2012, 11, 29).unwrap(),
            NaiveDate::from_ymd_opt(2012, 11, 28).unwrap(),
        )
    }

    #[test]
    fn both_representations_are_bound() -> Result<()> {
        let template = QueryTemplate::new(
            "6",
            "SELECT \"personId\", :date_start_filter AS \"useFrom\", :date_limit_filter AS \"useUntil\" \
             FROM personNumFriends WHERE \"creationDate\" < :date_limit_long \
             AND \"deletionDate\" > :date_start_long;",
        );
        let sql = template.bind(&params())?;
        assert_eq!(
            "SELECT \"personId\", DATE '2012-11-28' AS \"useFrom\", DATE '2012-11-29' AS \"useUntil\" \
             FROM personNumFriends WHERE \"creationDate\" < 1354147200000 \
             AND \"deletionDate\" > 1354060800000",
            sql
        );
        Ok(())
    }

    #[test]
    fn epoch_is_utc_midnight() {
        let p = params();
        assert_eq!(1354060800000, p.date_start_long());
        assert_eq!(p.date_start_long() + 86_400_000, p.date_limit_long());
    }

    #[test]
    fn casts_and_strings_are_left_alone() -> Result<()> {
        let template = QueryTemplate::new(
            "7",
            "SELECT x::BIGINT, '12:30:00' AS t, ':date_limit_long' AS s FROM t WHERE a = :date_limit_long",
        );
        assert_eq!(
            "SELECT x::BIGINT, '12:30:00' AS t, ':date_limit_long' AS s FROM t WHERE a = 1354147200000",
            template.bind(&params())?
        );
        Ok(())
    }

    #[test]
    fn comments_and_quoted_identifiers_are_left_alone() -> Result<()> {
        let template = QueryTemplate::new(
            "6",
            "-- each person's interests\n\
             /* note:see docs, it's :date_start_long */ \
             SELECT \"a:b\" FROM t WHERE d < :date_limit_long -- until:then\n\
             AND e > :date_start_long",
        );
        assert_eq!(
            "-- each person's interests\n\
             /* note:see docs, it's :date_start_long */ \
             SELECT \"a:b\" FROM t WHERE d < 1354147200000 -- until:then\n\
             AND e > 1354060800000",
            template.bind(&params())?
        );
        Ok(())
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let template = QueryTemplate::new("1", "SELECT * FROM t WHERE d < :date_limit");
        match template.bind(&params()) {
            Err(ParamgenError::Template(msg)) => assert!(msg.contains(":date_limit in")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn missing_template_file() {
        let dir = TemplateDirectory::new("/no/such/paramgen-queries");
        let query = crate::catalog::query::lookup("1").unwrap();
        assert!(dir.path(query).ends_with("pg-1.sql"));
        assert!(matches!(dir.template(query), Err(ParamgenError::Template(_))));
    }
}
