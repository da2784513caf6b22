//! Query specifications and the per-entity query builder.
//!
//! Building a query is pure and total. A caller without an identity (or a
//! lookup without a token) gets `None`, which the subscription layer treats as
//! "do not subscribe".

mod eval;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Role;

/// Collection names in the document store.
pub mod collections {
    pub const ANNOUNCEMENTS: &str = "announcements";
    pub const COURSES: &str = "courses";
    pub const MESSAGES: &str = "messages";
    pub const DOCUMENTS: &str = "documents";
}

/// Comparison applied by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOp {
    /// Field equals the value
    Eq,
    /// Field is an array containing the value
    ArrayContains,
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Deterministic description of a remote query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub collection: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl QuerySpec {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::ArrayContains,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// Which courses a caller sees, derived from their role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseVisibility {
    /// Courses listing the caller in `enrolledStudentIds`
    Enrolled,
    /// Courses whose `teacherId` is the caller
    Teaching,
    /// Every course; callers without a recognized role get this
    Unfiltered,
}

/// Builds the query for each hook family.
pub struct QueryBuilder;

impl QueryBuilder {
    /// Announcements, newest first, bounded.
    pub fn announcements(max_results: usize) -> QuerySpec {
        QuerySpec::collection(collections::ANNOUNCEMENTS)
            .order_by("createdAt", Direction::Desc)
            .limit(Some(max_results))
    }

    pub fn course_visibility(role: Option<Role>) -> CourseVisibility {
        match role {
            Some(Role::Student) | Some(Role::Parent) => CourseVisibility::Enrolled,
            Some(Role::Teacher) => CourseVisibility::Teaching,
            None => CourseVisibility::Unfiltered,
        }
    }

    /// Courses visible to `identity` under `role`.
    pub fn courses(identity: Option<&str>, role: Option<Role>) -> Option<QuerySpec> {
        let identity = present(identity)?;
        let spec = QuerySpec::collection(collections::COURSES);

        Some(match Self::course_visibility(role) {
            CourseVisibility::Enrolled => spec.where_array_contains("enrolledStudentIds", identity),
            CourseVisibility::Teaching => spec.where_eq("teacherId", identity),
            CourseVisibility::Unfiltered => {
                tracing::warn!(
                    identity = %identity,
                    "No recognized role for course query; subscribing to all courses"
                );
                spec
            }
        })
    }

    /// Messages of one conversation in display order, oldest first.
    ///
    /// `limit` keeps the first messages of the conversation, not the latest;
    /// a view that pages backwards from the newest message passes no limit.
    pub fn messages(conversation_id: Option<&str>, limit: Option<usize>) -> Option<QuerySpec> {
        let conversation_id = present(conversation_id)?;
        Some(
            QuerySpec::collection(collections::MESSAGES)
                .where_eq("conversationId", conversation_id)
                .order_by("createdAt", Direction::Asc)
                .limit(limit),
        )
    }

    /// The single document shared under `token`.
    pub fn public_document(token: Option<&str>) -> Option<QuerySpec> {
        let token = present(token)?;
        Some(
            QuerySpec::collection(collections::DOCUMENTS)
                .where_eq("publicToken", token)
                .limit(Some(1)),
        )
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_announcements_spec() {
        let spec = QueryBuilder::announcements(10);
        assert_eq!(spec.collection, "announcements");
        assert!(spec.filters.is_empty());
        assert_eq!(
            spec.order_by,
            Some(OrderBy {
                field: "createdAt".to_string(),
                direction: Direction::Desc
            })
        );
        assert_eq!(spec.limit, Some(10));
    }

    #[test]
    fn test_student_and_parent_filter_by_enrolment() {
        for role in [Role::Student, Role::Parent] {
            let spec = QueryBuilder::courses(Some("u1"), Some(role)).unwrap();
            assert_eq!(
                spec.filters,
                vec![Filter {
                    field: "enrolledStudentIds".to_string(),
                    op: FilterOp::ArrayContains,
                    value: json!("u1"),
                }]
            );
        }
    }

    #[test]
    fn test_teacher_filters_by_teacher_id() {
        let spec = QueryBuilder::courses(Some("u1"), Some(Role::Teacher)).unwrap();
        assert_eq!(
            spec.filters,
            vec![Filter {
                field: "teacherId".to_string(),
                op: FilterOp::Eq,
                value: json!("u1"),
            }]
        );
    }

    #[test]
    fn test_missing_role_is_unfiltered() {
        let spec = QueryBuilder::courses(Some("u1"), None).unwrap();
        assert!(spec.filters.is_empty());
        assert_eq!(
            QueryBuilder::course_visibility(None),
            CourseVisibility::Unfiltered
        );
    }

    #[test]
    fn test_missing_identity_does_not_subscribe() {
        assert!(QueryBuilder::courses(None, Some(Role::Student)).is_none());
        assert!(QueryBuilder::courses(Some("  "), Some(Role::Teacher)).is_none());
        assert!(QueryBuilder::messages(None, None).is_none());
        assert!(QueryBuilder::public_document(Some("")).is_none());
    }

    #[test]
    fn test_public_document_is_single_lookup() {
        let spec = QueryBuilder::public_document(Some("abc123")).unwrap();
        assert_eq!(spec.collection, "documents");
        assert_eq!(spec.limit, Some(1));
        assert_eq!(spec.filters[0].value, json!("abc123"));
    }

    #[test]
    fn test_spec_is_deterministic() {
        assert_eq!(
            QueryBuilder::messages(Some("c1"), Some(50)),
            QueryBuilder::messages(Some("c1"), Some(50))
        );
        assert_ne!(
            QueryBuilder::messages(Some("c1"), Some(50)),
            QueryBuilder::messages(Some("c2"), Some(50))
        );
    }
}
