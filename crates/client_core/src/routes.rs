//! Decoding of `/api/...` paths into endpoints.
//!
//! The table below is the complete set of paths that can be served without a
//! server. A path that matches none of it is left for the network.

use std::{fmt, str::FromStr};

use shared::protocol::Endpoint;
use thiserror::Error;
use url::Url;

const LOCAL_ORIGIN: &str = "http://localhost/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unsupported http method `{0}`")]
pub struct UnsupportedMethod(pub String);

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UnsupportedMethod(raw.to_string())),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(value: Method) -> Self {
        match value {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Matcher for a single path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Literal(&'static str),
    /// A decimal record id, captured.
    Id,
    Any,
}

enum SegmentMatch {
    Plain,
    Captured(i64),
}

impl Segment {
    fn match_raw(self, raw: &str) -> Option<SegmentMatch> {
        match self {
            Self::Literal(expected) => (raw == expected).then_some(SegmentMatch::Plain),
            Self::Id => raw.parse::<i64>().ok().map(SegmentMatch::Captured),
            Self::Any => Some(SegmentMatch::Plain),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub method: Method,
    pub pattern: &'static [Segment],
    pub endpoint: Endpoint,
}

use Segment::{Id, Literal};

const STUDENTS: &[Segment] = &[Literal("api"), Literal("students")];
const STUDENT_SEARCH: &[Segment] = &[Literal("api"), Literal("students"), Literal("search")];
const STUDENT_IMPORT: &[Segment] = &[Literal("api"), Literal("students"), Literal("import")];
const STUDENT: &[Segment] = &[Literal("api"), Literal("students"), Id];
const STUDENT_TRANSFERS: &[Segment] = &[
    Literal("api"),
    Literal("students"),
    Id,
    Literal("transfer-requests"),
];
const GROUPS: &[Segment] = &[Literal("api"), Literal("groups")];
const GROUP: &[Segment] = &[Literal("api"), Literal("groups"), Id];
const TRANSFER_REQUESTS: &[Segment] = &[Literal("api"), Literal("transfer-requests")];

/// Ordered route table; the first matching entry wins.
pub const ROUTES: &[Route] = &[
    Route { method: Method::Get, pattern: STUDENTS, endpoint: Endpoint::ListStudents },
    Route { method: Method::Post, pattern: STUDENTS, endpoint: Endpoint::CreateStudent },
    Route { method: Method::Get, pattern: STUDENT_SEARCH, endpoint: Endpoint::SearchStudents },
    Route { method: Method::Post, pattern: STUDENT_IMPORT, endpoint: Endpoint::ImportStudents },
    Route { method: Method::Get, pattern: STUDENT, endpoint: Endpoint::GetStudent },
    Route { method: Method::Patch, pattern: STUDENT, endpoint: Endpoint::UpdateStudent },
    Route { method: Method::Delete, pattern: STUDENT, endpoint: Endpoint::DeleteStudent },
    Route {
        method: Method::Get,
        pattern: STUDENT_TRANSFERS,
        endpoint: Endpoint::ListStudentTransferRequests,
    },
    Route { method: Method::Get, pattern: GROUPS, endpoint: Endpoint::ListGroups },
    Route { method: Method::Post, pattern: GROUPS, endpoint: Endpoint::CreateGroup },
    Route { method: Method::Delete, pattern: GROUP, endpoint: Endpoint::DeleteGroup },
    Route {
        method: Method::Post,
        pattern: TRANSFER_REQUESTS,
        endpoint: Endpoint::CreateTransferRequest,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub endpoint: Endpoint,
    pub id: Option<i64>,
    pub query: Vec<(String, String)>,
}

impl RouteMatch {
    /// First value of `key`; empty values count as absent.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// Matches `pattern` against already split segments, returning the captured id
/// if any.
pub fn match_pattern(pattern: &[Segment], segments: &[&str]) -> Option<Option<i64>> {
    if pattern.len() != segments.len() {
        return None;
    }
    let mut id = None;
    for (matcher, raw) in pattern.iter().zip(segments) {
        match matcher.match_raw(raw)? {
            SegmentMatch::Plain => {}
            SegmentMatch::Captured(value) => id = Some(value),
        }
    }
    Some(id)
}

pub fn decode(method: Method, path: &str) -> Option<RouteMatch> {
    let url = Url::parse(LOCAL_ORIGIN).ok()?.join(path).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    ROUTES
        .iter()
        .filter(|route| route.method == method)
        .find_map(|route| {
            match_pattern(route.pattern, &segments).map(|id| RouteMatch {
                endpoint: route.endpoint,
                id,
                query: url.query_pairs().into_owned().collect(),
            })
        })
}

#[cfg(test)]
#[path = "tests/routes_tests.rs"]
mod tests;
