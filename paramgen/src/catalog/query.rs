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

//! Query types of the Interactive workload.
//!
//! Each query type names its extraction template and the logical key that
//! identifies "the same parameter" across buckets. The key drives the
//! deduplication of the accumulated relation.

/// How the parameters of a query type are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Extracted in every bucket, deduplicated and exported.
    Interactive,
    /// Extracted once at the start of the period and registered as a relation
    /// that the interactive templates can join against.
    LateBound,
    /// Extracted once at the start of the period and exported as is. Used to
    /// run the short reads by hand.
    ShortLookup,
}

/// A benchmark parameter category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryType {
    /// Query identifier, e.g. `3a`.
    pub name: &'static str,
    /// How the parameters are produced.
    pub kind: QueryKind,
    /// Logical key columns.
    pub key:  &'static [&'static str],
}

impl QueryType {
    const fn interactive(name: &'static str, key: &'static [&'static str]) -> Self {
        QueryType {
            name,
            kind: QueryKind::Interactive,
            key,
        }
    }

    /// Name of the relation the parameters are accumulated in.
    pub fn relation_name(&self) -> String {
        format!("Q_{}", self.name)
    }

    /// File name of the extraction template.
    pub fn template_file(&self) -> String {
        format!("pg-{}.sql", self.name)
    }

    /// File name of the exported parameters.
    pub fn output_file(&self, prefix: &str) -> String {
        format!("{}-{}.parquet", prefix, self.name)
    }
}

const PERSON: &[&str] = &["personId"];
const PERSON_PAIR: &[&str] = &["person1Id", "person2Id"];
const TRIP: &[&str] = &[
    "personId",
    "countryXName",
    "countryYName",
    "startDate",
    "durationDays",
];

/// Every query type, in extraction order.
pub static QUERY_TYPES: &[QueryType] = &[
    QueryType {
        name: "13b",
        kind: QueryKind::LateBound,
        key:  PERSON_PAIR,
    },
    QueryType {
        name: "14b",
        kind: QueryKind::LateBound,
        key:  PERSON_PAIR,
    },
    QueryType::interactive("1", &["personId", "firstName"]),
    QueryType::interactive("2", &["personId", "maxDate"]),
    QueryType::interactive("3a", TRIP),
    QueryType::interactive("3b", TRIP),
    QueryType::interactive("4", &["personId", "startDate", "durationDays"]),
    QueryType::interactive("5", &["personId", "minDate"]),
    QueryType::interactive("6", &["personId", "tagName"]),
    QueryType::interactive("7", PERSON),
    QueryType::interactive("8", PERSON),
    QueryType::interactive("9", &["personId", "maxDate"]),
    QueryType::interactive("10", &["personId", "month"]),
    QueryType::interactive("11", &["personId", "countryName", "workFromYear"]),
    QueryType::interactive("12", &["personId", "tagClassName"]),
    QueryType::interactive("13a", PERSON_PAIR),
    QueryType::interactive("14a", PERSON_PAIR),
    QueryType {
        name: "personId",
        kind: QueryKind::ShortLookup,
        key:  PERSON,
    },
    QueryType {
        name: "messageId",
        kind: QueryKind::ShortLookup,
        key:  &["messageId"],
    },
];

/// Returns the query types of one kind, in extraction order.
pub fn of_kind(kind: QueryKind) -> impl Iterator<Item = &'static QueryType> {
    QUERY_TYPES.iter().filter(move |q| q.kind == kind)
}

/// Looks a query type up by name.
pub fn lookup(name: &str) -> Option<&'static QueryType> {
    QUERY_TYPES.iter().find(|q| q.name == name)
}
