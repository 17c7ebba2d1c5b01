// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route classification: which requests need proof of identity.
//!
//! Rules are plain data, `(method, kind, pattern, access)`, evaluated by one
//! matcher. When several rules match, the most specific one decides:
//!
//! 1. match kind: `exact` > `pattern` > `prefix`
//! 2. longer literal pattern
//! 3. a concrete method over `ANY`
//!
//! A tie between a public and a protected rule is protected, and a request no
//! rule matches is protected. With only public rules in the table this is the
//! same as "public if any rule matches".

use std::borrow::Cow;
use std::path::Path;

use axum::http::Method;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

/// HTTP method constraint of a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MethodFilter {
    #[default]
    Any,
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl MethodFilter {
    pub fn matches(&self, method: &Method) -> bool {
        let expected = match self {
            MethodFilter::Any => return true,
            MethodFilter::Get => Method::GET,
            MethodFilter::Head => Method::HEAD,
            MethodFilter::Post => Method::POST,
            MethodFilter::Put => Method::PUT,
            MethodFilter::Patch => Method::PATCH,
            MethodFilter::Delete => Method::DELETE,
            MethodFilter::Options => Method::OPTIONS,
        };
        *method == expected
    }
}

/// How a rule's pattern is compared with the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Whole path equals the pattern
    Exact,
    /// Same number of segments; one `*` segment matches any single non-empty segment
    Pattern,
    /// Pattern is the path or a whole-segment ancestor of it
    Prefix,
}

impl MatchKind {
    fn rank(self) -> u8 {
        match self {
            MatchKind::Exact => 3,
            MatchKind::Pattern => 2,
            MatchKind::Prefix => 1,
        }
    }
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Protected,
}

/// Route rule errors. Any of them aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },
    #[error("failed to read route rules from {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse route rules: {0}")]
    Parse(String),
}

/// One classification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    #[serde(default)]
    pub method: MethodFilter,
    pub kind: MatchKind,
    pub pattern: Cow<'static, str>,
    pub access: Access,
}

/// The consolidated rule set of the edge.
pub static CANONICAL_RULES: [RouteRule; 8] = [
    // credential issuance (login, registration, social login)
    RouteRule::public(MethodFilter::Any, MatchKind::Prefix, "/api/auth"),
    // profile by username
    RouteRule::public(MethodFilter::Get, MatchKind::Pattern, "/api/users/*"),
    // ...except the caller's own profile, which the pattern above would swallow
    RouteRule::protected(MethodFilter::Get, MatchKind::Exact, "/api/users/me"),
    RouteRule::public(MethodFilter::Get, MatchKind::Pattern, "/api/users/*/basic-info"),
    // recipe listings, details, comments
    RouteRule::public(MethodFilter::Get, MatchKind::Prefix, "/api/recipes"),
    RouteRule::public(MethodFilter::Any, MatchKind::Prefix, "/actuator"),
    RouteRule::public(MethodFilter::Get, MatchKind::Prefix, "/docs"),
    RouteRule::public(MethodFilter::Get, MatchKind::Exact, "/api-doc/openapi.json"),
];

impl RouteRule {
    pub const fn public(method: MethodFilter, kind: MatchKind, pattern: &'static str) -> Self {
        Self {
            method,
            kind,
            pattern: Cow::Borrowed(pattern),
            access: Access::Public,
        }
    }

    pub const fn protected(method: MethodFilter, kind: MatchKind, pattern: &'static str) -> Self {
        Self {
            method,
            kind,
            pattern: Cow::Borrowed(pattern),
            access: Access::Protected,
        }
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        let invalid = |reason| RuleError::InvalidPattern {
            pattern: self.pattern.to_string(),
            reason,
        };

        let pattern = self.pattern.as_ref();
        if !pattern.starts_with('/') {
            return Err(invalid("must start with `/`"));
        }
        if pattern == "/" {
            return Ok(());
        }
        if pattern.ends_with('/') || pattern.contains("//") {
            return Err(invalid("must not contain empty segments"));
        }
        if pattern.contains(['?', '#']) {
            return Err(invalid("must not contain a query or fragment"));
        }
        if pattern.contains([';', '%', '\\']) {
            return Err(invalid("must be written in decoded, parameter-free form"));
        }

        let wildcards = pattern.split('/').filter(|segment| *segment == "*").count();
        let stray_star = pattern
            .split('/')
            .any(|segment| segment != "*" && segment.contains('*'));
        if stray_star {
            return Err(invalid("`*` must be a whole segment"));
        }

        match (self.kind, wildcards) {
            (MatchKind::Pattern, 1) => Ok(()),
            (MatchKind::Pattern, _) => Err(invalid("pattern rules need exactly one `*` segment")),
            (_, 0) => Ok(()),
            (_, _) => Err(invalid("only pattern rules may contain `*`")),
        }
    }

    /// Whether this rule applies to a normalized request path.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        if !self.method.matches(method) {
            return false;
        }

        let pattern = self.pattern.as_ref();
        match self.kind {
            MatchKind::Exact => path == pattern,
            MatchKind::Prefix => {
                pattern == "/"
                    || path
                        .strip_prefix(pattern)
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            }
            MatchKind::Pattern => {
                let mut expected = pattern.split('/');
                let mut actual = path.split('/');
                loop {
                    match (expected.next(), actual.next()) {
                        (None, None) => return true,
                        (Some("*"), Some(segment)) if !segment.is_empty() => {}
                        (Some(want), Some(got)) if want == got => {}
                        _ => return false,
                    }
                }
            }
        }
    }

    fn specificity(&self) -> (u8, usize, bool) {
        let literal = self.pattern.len() - self.pattern.matches('*').count();
        (
            self.kind.rank(),
            literal,
            self.method != MethodFilter::Any,
        )
    }
}

/// Load additional rules from a JSON array file.
pub fn load_rules(path: &Path) -> Result<Vec<RouteRule>, RuleError> {
    let raw = std::fs::read_to_string(path).map_err(|e| RuleError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let rules: Vec<RouteRule> =
        serde_json::from_str(&raw).map_err(|e| RuleError::Parse(e.to_string()))?;
    for rule in &rules {
        rule.validate()?;
    }
    Ok(rules)
}

/// Decides whether a request is public or protected.
///
/// Pure and immutable after construction.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    rules: Vec<RouteRule>,
}

impl RouteClassifier {
    pub fn new(rules: Vec<RouteRule>) -> Result<Self, RuleError> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self { rules })
    }

    /// The canonical table only.
    pub fn canonical() -> Self {
        Self {
            rules: CANONICAL_RULES.to_vec(),
        }
    }

    /// The canonical table followed by deployment-specific rules.
    pub fn with_extra(extra: Vec<RouteRule>) -> Result<Self, RuleError> {
        let mut rules = CANONICAL_RULES.to_vec();
        rules.extend(extra);
        Self::new(rules)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn classify(&self, method: &Method, path: &str) -> Access {
        let mut decision: Option<((u8, usize, bool), Access)> = None;

        for rule in self.rules.iter().filter(|rule| rule.matches(method, path)) {
            let specificity = rule.specificity();
            decision = match decision {
                Some((best, access)) if best > specificity => Some((best, access)),
                Some((best, Access::Protected)) if best == specificity => {
                    Some((best, Access::Protected))
                }
                _ => Some((specificity, rule.access)),
            };
        }

        decision.map_or(Access::Protected, |(_, access)| access)
    }

    pub fn is_public(&self, method: &Method, path: &str) -> bool {
        self.classify(method, path) == Access::Public
    }
}

/// Characters re-encoded when a decoded segment is written back into a path.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b';')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A request path with no single canonical reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path segment is not valid UTF-8 once decoded")]
    InvalidUtf8,
    #[error("path segment decodes to a reserved character")]
    AmbiguousSegment,
}

/// Canonical form of a request path, as the services behind the edge read it.
///
/// Drops the query, `;` parameters of each segment, empty and `.` segments and
/// any trailing slash; resolves `..` without climbing above the root. Segments
/// are percent-decoded before any of that and re-encoded afterwards, so
/// `/api/users/%6De;x=1` and `/api/users/me` are the same path. A segment that
/// decodes to `/`, `\`, `%` or a control character is refused.
pub fn normalize_path(path: &str) -> Result<String, PathError> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let mut segments: Vec<Cow<'_, str>> = Vec::new();

    for raw in path.split('/') {
        let raw = raw.split(';').next().unwrap_or("");
        let segment = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|_| PathError::InvalidUtf8)?;
        if segment.contains(['/', '\\', '%']) || segment.chars().any(char::is_control) {
            return Err(PathError::AmbiguousSegment);
        }

        if segment == ".." {
            segments.pop();
        } else if !segment.is_empty() && segment != "." {
            segments.push(segment);
        }
    }

    let mut normalized = String::with_capacity(path.len().max(1));
    for segment in &segments {
        normalized.push('/');
        normalized.extend(utf8_percent_encode(segment, SEGMENT));
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    Ok(normalized)
}
