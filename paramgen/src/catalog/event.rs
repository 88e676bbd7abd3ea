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

//! Update event types and the parent entities their dependent time is
//! derived from.
//!
//! The dependent time of an event is the latest creation date among the
//! entities the event refers to: a comment depends on its creator, its parent
//! post or comment; a forum membership depends on the forum and the person.
//! Events of a type without a [`DependencyMapping`] get the configured
//! sentinel instead.

use crate::error::{ParamgenError, Result};

/// Whether an event file holds inserts or deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Events read from the `inserts` directory.
    Insert,
    /// Events read from the `deletes` directory.
    Delete,
}

impl Operation {
    /// Both operations, in processing order.
    pub const ALL: [Operation; 2] = [Operation::Insert, Operation::Delete];

    /// Sub-directory of the update event directory.
    pub fn directory(&self) -> &'static str {
        match self {
            Operation::Insert => "inserts",
            Operation::Delete => "deletes",
        }
    }

    /// Suffix appended to the file stem to form the event type name.
    pub fn suffix(&self) -> &'static str {
        match self {
            Operation::Insert => "_Insert",
            Operation::Delete => "_Delete",
        }
    }

    /// The primary date column of the events.
    pub fn date_column(&self) -> &'static str {
        match self {
            Operation::Insert => "creationDate",
            Operation::Delete => "deletionDate",
        }
    }
}

/// One parent entity an event depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    /// Parent entity, bound as the `{entity}_View` view.
    pub entity:        &'static str,
    /// Event-side foreign key.
    pub event_column:  &'static str,
    /// Parent-side column the foreign key is matched against.
    pub entity_column: &'static str,
    /// Parent date column the dependent time is taken from.
    pub date_column:   &'static str,
}

const fn on(entity: &'static str, event_column: &'static str) -> Dependency {
    Dependency {
        entity,
        event_column,
        entity_column: "id",
        date_column: "creationDate",
    }
}

/// How the dependent time of an event type is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyMapping {
    /// Parent entities, one join each.
    pub dependencies:  &'static [Dependency],
    /// Event columns that identify the row a resolved time belongs to. Rows
    /// only share parents when they agree on all of them. When empty, every
    /// row stands on its own.
    pub match_columns: &'static [&'static str],
}

/// An update event type, e.g. `Comment_Insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventType {
    /// File stem of the event file, e.g. `Forum_hasMember_Person`.
    pub entity:    &'static str,
    /// Insert or delete.
    pub operation: Operation,
    /// Columns read from the event file, in output order.
    pub columns:   &'static [&'static str],
    /// Parent entities, if the type carries a dependent time.
    pub mapping:   Option<DependencyMapping>,
}

impl EventType {
    /// The event type name, e.g. `Comment_Insert`.
    pub fn name(&self) -> String {
        format!("{}{}", self.entity, self.operation.suffix())
    }

    /// The primary date column.
    pub fn date_column(&self) -> &'static str {
        self.operation.date_column()
    }
}

const fn insert(
    entity: &'static str,
    columns: &'static [&'static str],
    dependencies: &'static [Dependency],
    match_columns: &'static [&'static str],
) -> EventType {
    EventType {
        entity,
        operation: Operation::Insert,
        columns,
        mapping: Some(DependencyMapping {
            dependencies,
            match_columns,
        }),
    }
}

const fn delete(
    entity: &'static str,
    columns: &'static [&'static str],
    dependencies: &'static [Dependency],
    match_columns: &'static [&'static str],
) -> EventType {
    EventType {
        entity,
        operation: Operation::Delete,
        columns,
        mapping: Some(DependencyMapping {
            dependencies,
            match_columns,
        }),
    }
}

/// Every update event type.
pub static EVENT_TYPES: &[EventType] = &[
    EventType {
        entity:    "Person",
        operation: Operation::Insert,
        columns:   &[
            "creationDate",
            "id",
            "firstName",
            "lastName",
            "gender",
            "birthday",
            "locationIP",
            "browserUsed",
            "LocationCityId",
            "language",
            "email",
        ],
        mapping:   None,
    },
    insert(
        "Person_hasInterest_Tag",
        &["creationDate", "PersonId", "TagId"],
        &[on("Person", "PersonId")],
        &["PersonId", "TagId"],
    ),
    insert(
        "Person_studyAt_University",
        &["creationDate", "PersonId", "UniversityId", "classYear"],
        &[on("Person", "PersonId")],
        &["PersonId", "UniversityId"],
    ),
    insert(
        "Person_workAt_Company",
        &["creationDate", "PersonId", "CompanyId", "workFrom"],
        &[on("Person", "PersonId")],
        &["PersonId", "CompanyId"],
    ),
    insert(
        "Person_knows_Person",
        &["creationDate", "Person1Id", "Person2Id"],
        &[on("Person", "Person1Id"), on("Person", "Person2Id")],
        &["Person1Id", "Person2Id"],
    ),
    insert(
        "Person_likes_Post",
        &["creationDate", "PersonId", "PostId"],
        &[on("Person", "PersonId"), on("Post", "PostId")],
        &["PersonId", "PostId"],
    ),
    insert(
        "Person_likes_Comment",
        &["creationDate", "PersonId", "CommentId"],
        &[on("Person", "PersonId"), on("Comment", "CommentId")],
        &["PersonId", "CommentId"],
    ),
    insert(
        "Forum",
        &["creationDate", "id", "title", "ModeratorPersonId"],
        &[on("Person", "ModeratorPersonId")],
        &["id"],
    ),
    insert(
        "Forum_hasMember_Person",
        &["creationDate", "ForumId", "PersonId"],
        &[on("Forum", "ForumId"), on("Person", "PersonId")],
        &["ForumId", "PersonId"],
    ),
    insert(
        "Forum_hasTag_Tag",
        &["creationDate", "ForumId", "TagId"],
        &[on("Forum", "ForumId")],
        &["ForumId", "TagId"],
    ),
    insert(
        "Post",
        &[
            "creationDate",
            "id",
            "imageFile",
            "locationIP",
            "browserUsed",
            "language",
            "content",
            "length",
            "CreatorPersonId",
            "ContainerForumId",
            "LocationCountryId",
        ],
        &[on("Person", "CreatorPersonId"), on("Forum", "ContainerForumId")],
        &["id"],
    ),
    insert(
        "Post_hasTag_Tag",
        &["creationDate", "PostId", "TagId"],
        &[on("Post", "PostId")],
        &["PostId", "TagId"],
    ),
    insert(
        "Comment",
        &[
            "creationDate",
            "id",
            "locationIP",
            "browserUsed",
            "content",
            "length",
            "CreatorPersonId",
            "LocationCountryId",
            "ParentPostId",
            "ParentCommentId",
        ],
        &[
            on("Person", "CreatorPersonId"),
            on("Post", "ParentPostId"),
            on("Comment", "ParentCommentId"),
        ],
        &["id"],
    ),
    insert(
        "Comment_hasTag_Tag",
        &["creationDate", "CommentId", "TagId"],
        &[on("Comment", "CommentId")],
        &["CommentId", "TagId"],
    ),
    delete(
        "Person",
        &["deletionDate", "id"],
        &[on("Person", "id")],
        &["id"],
    ),
    delete(
        "Person_knows_Person",
        &["deletionDate", "Person1Id", "Person2Id"],
        &[on("Person", "Person1Id"), on("Person", "Person2Id")],
        &["Person1Id", "Person2Id"],
    ),
    delete("Forum", &["deletionDate", "id"], &[on("Forum", "id")], &["id"]),
    delete(
        "Forum_hasMember_Person",
        &["deletionDate", "ForumId", "PersonId"],
        &[on("Forum", "ForumId"), on("Person", "PersonId")],
        &["ForumId", "PersonId"],
    ),
    delete(
        "Person_likes_Post",
        &["deletionDate", "PersonId", "PostId"],
        &[on("Person", "PersonId"), on("Post", "PostId")],
        &["PersonId", "PostId"],
    ),
    delete(
        "Person_likes_Comment",
        &["deletionDate", "PersonId", "CommentId"],
        &[on("Person", "PersonId"), on("Comment", "CommentId")],
        &["PersonId", "CommentId"],
    ),
    delete("Post", &["deletionDate", "id"], &[on("Post", "id")], &["id"]),
    delete("Comment", &["deletionDate", "id"], &[on("Comment", "id")], &["id"]),
];

/// Looks an event type up by name, e.g. `Forum_hasMember_Person_Delete`.
pub fn lookup(name: &str) -> Option<&'static EventType> {
    EVENT_TYPES.iter().find(|e| e.name() == name)
}

/// Resolves the event type of a file `{stem}.parquet` found in the directory
/// of `operation`.
pub fn from_file_stem(stem: &str, operation: Operation) -> Result<&'static EventType> {
    EVENT_TYPES
        .iter()
        .find(|e| e.entity == stem && e.operation == operation)
        .ok_or_else(|| ParamgenError::UnknownEventType(format!("{}{}", stem, operation.suffix())))
}
