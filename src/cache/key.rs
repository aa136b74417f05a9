//! Cache key construction and parameter normalization.
//!
//! Keys are deterministic functions of (resource type, normalized query
//! parameters). Normalization fixes the segment order and substitutes
//! canonical defaults for absent optional parameters, so two requests for
//! the same logical result always land on the same key and distinct
//! requests never collide.

use serde::{Deserialize, Serialize};

/// Key namespace prefix shared by every entry this layer writes.
pub const KEY_PREFIX: &str = "reel";

/// Canonical time window substituted when a request omits one.
pub const DEFAULT_WINDOW: &str = "7d";

/// Canonical resource segment for queries not scoped to a single resource.
pub const DEFAULT_RESOURCE: &str = "all";

/// The closed set of cacheable derived-query types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Per-user dashboard rollup.
    Dashboard,
    /// Platform-wide trending ranking.
    Trending,
    /// Aggregated analytics report.
    Analytics,
    /// Per-video view/watch statistics.
    VideoStats,
    /// Audience engagement breakdown.
    EngagementReport,
}

impl ResourceType {
    /// All known types, for stats sweeps and the optimizer loop.
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Dashboard,
        ResourceType::Trending,
        ResourceType::Analytics,
        ResourceType::VideoStats,
        ResourceType::EngagementReport,
    ];

    /// Stable key-segment name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Dashboard => "dashboard",
            ResourceType::Trending => "trending",
            ResourceType::Analytics => "analytics",
            ResourceType::VideoStats => "video_stats",
            ResourceType::EngagementReport => "engagement",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller roles the policy table distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Viewer,
    Filmmaker,
    Admin,
}

impl std::fmt::Display for CallerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallerRole::Viewer => f.write_str("viewer"),
            CallerRole::Filmmaker => f.write_str("filmmaker"),
            CallerRole::Admin => f.write_str("admin"),
        }
    }
}

/// Identifying parameters of one cacheable query.
///
/// `resource_id` and `window` are optional at the call site; normalization
/// fills in canonical defaults before key construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Owning caller (user id), e.g. "user-42".
    pub owner_id: String,

    /// Specific resource (video id), if the query is scoped to one.
    #[serde(default)]
    pub resource_id: Option<String>,

    /// Time window, e.g. "24h", "7d", "30d".
    #[serde(default)]
    pub window: Option<String>,
}

impl QueryParams {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            resource_id: None,
            window: None,
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_window(mut self, window: impl Into<String>) -> Self {
        self.window = Some(window.into());
        self
    }
}

/// Escape the delimiter and pattern metacharacters inside one key segment.
///
/// Ids are platform-generated and normally contain neither, but encoding
/// them keeps the segment split unambiguous: an owner of `a:b` can never
/// collide with (owner `a`, resource `b`), and an id containing `*` cannot
/// widen a deletion pattern.
fn encode_segment(segment: &str) -> std::borrow::Cow<'_, str> {
    if !segment.contains([':', '*', '%']) {
        return std::borrow::Cow::Borrowed(segment);
    }
    let mut out = String::with_capacity(segment.len() + 4);
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3a"),
            '*' => out.push_str("%2a"),
            c => out.push(c),
        }
    }
    std::borrow::Cow::Owned(out)
}

/// Compute the cache key for (type, params).
///
/// Layout: `reel:{type}:{owner}:{resource}:{window}` with fixed segment
/// order and defaults substituted for absent optionals. Pure and
/// deterministic; distinct normalized tuples yield distinct keys because
/// every segment is position-fixed, `:`-delimited, and escaped.
pub fn cache_key(resource_type: ResourceType, params: &QueryParams) -> String {
    let resource = params.resource_id.as_deref().unwrap_or(DEFAULT_RESOURCE);
    let window = params.window.as_deref().unwrap_or(DEFAULT_WINDOW);
    format!(
        "{KEY_PREFIX}:{}:{}:{}:{}",
        resource_type.as_str(),
        encode_segment(&params.owner_id),
        encode_segment(resource),
        encode_segment(window)
    )
}

/// Pattern matching every key of one type.
pub fn type_pattern(resource_type: ResourceType) -> String {
    format!("{KEY_PREFIX}:{}:*", resource_type.as_str())
}

/// Pattern matching every key owned by one caller, across all types.
pub fn owner_pattern(owner_id: &str) -> String {
    format!("{KEY_PREFIX}:*:{}:*", encode_segment(owner_id))
}
