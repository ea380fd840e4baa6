use crate::config::{ContentFilterRule, MarkerRedirect, NamingOverride, PolicyConfig};
use crate::error::{Result, UnlockError};
use regex::Regex;

/// Filename predicate applied to documents of one platform before matching.
pub trait ContentFilter: Send + Sync {
    fn accepts(&self, filename: &str) -> bool;
    fn describe(&self) -> String;
}

pub struct RequireSubstring(pub String);

impl ContentFilter for RequireSubstring {
    fn accepts(&self, filename: &str) -> bool {
        filename.contains(&self.0)
    }

    fn describe(&self) -> String {
        format!("name must contain '{}'", self.0)
    }
}

pub struct ExcludeSubstring(pub String);

impl ContentFilter for ExcludeSubstring {
    fn accepts(&self, filename: &str) -> bool {
        !filename.contains(&self.0)
    }

    fn describe(&self) -> String {
        format!("name must not contain '{}'", self.0)
    }
}

pub struct PatternFilter(pub Regex);

impl ContentFilter for PatternFilter {
    fn accepts(&self, filename: &str) -> bool {
        self.0.is_match(filename)
    }

    fn describe(&self) -> String {
        format!("name must match /{}/", self.0.as_str())
    }
}

/// Platform carve-outs consulted by matching, naming and the batch filter step.
#[derive(Default)]
pub struct PolicyTable {
    marker_redirects: Vec<MarkerRedirect>,
    naming_overrides: Vec<NamingOverride>,
    content_filters: Vec<(String, Box<dyn ContentFilter>)>,
}

impl std::fmt::Debug for PolicyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyTable")
            .field("marker_redirects", &self.marker_redirects)
            .field("naming_overrides", &self.naming_overrides)
            .field(
                "content_filters",
                &self
                    .content_filters
                    .iter()
                    .map(|(platform, filter)| format!("{}: {}", platform, filter.describe()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PolicyConfig) -> Result<Self> {
        let mut table = Self {
            marker_redirects: config.marker_redirects.clone(),
            naming_overrides: config.naming_overrides.clone(),
            content_filters: Vec::with_capacity(config.content_filters.len()),
        };

        for rule in &config.content_filters {
            table
                .content_filters
                .push((rule.platform.clone(), build_filter(rule)?));
        }

        Ok(table)
    }

    pub fn with_marker_redirect<M: Into<String>, P: Into<String>>(mut self, marker: M, platform: P) -> Self {
        self.marker_redirects.push(MarkerRedirect {
            marker: marker.into(),
            platform: platform.into(),
        });
        self
    }

    pub fn with_naming_override<P: Into<String>, S: Into<String>>(mut self, platform: P, prefix: S) -> Self {
        self.naming_overrides.push(NamingOverride {
            platform: platform.into(),
            prefix: prefix.into(),
        });
        self
    }

    pub fn with_content_filter<P: Into<String>>(mut self, platform: P, filter: Box<dyn ContentFilter>) -> Self {
        self.content_filters.push((platform.into(), filter));
        self
    }

    /// Platform forced by the first listed marker found in `filename`.
    pub fn redirect_for(&self, filename: &str) -> Option<&str> {
        self.marker_redirects
            .iter()
            .find(|redirect| !redirect.marker.is_empty() && filename.contains(&redirect.marker))
            .map(|redirect| redirect.platform.as_str())
    }

    pub fn naming_prefix(&self, platform: &str) -> Option<&str> {
        self.naming_overrides
            .iter()
            .find(|o| o.platform == platform)
            .map(|o| o.prefix.as_str())
    }

    /// Reason the first failing filter of `platform` gives for rejecting `filename`.
    pub fn rejection_reason(&self, platform: &str, filename: &str) -> Option<String> {
        self.content_filters
            .iter()
            .filter(|(p, _)| p == platform)
            .find(|(_, filter)| !filter.accepts(filename))
            .map(|(_, filter)| filter.describe())
    }

    pub fn is_empty(&self) -> bool {
        self.marker_redirects.is_empty()
            && self.naming_overrides.is_empty()
            && self.content_filters.is_empty()
    }
}

fn build_filter(rule: &ContentFilterRule) -> Result<Box<dyn ContentFilter>> {
    match (&rule.require, &rule.exclude, &rule.pattern) {
        (Some(require), None, None) => Ok(Box::new(RequireSubstring(require.clone()))),
        (None, Some(exclude), None) => Ok(Box::new(ExcludeSubstring(exclude.clone()))),
        (None, None, Some(pattern)) => {
            let regex = Regex::new(pattern).map_err(|e| UnlockError::Config {
                message: format!("Invalid content filter pattern '{}': {}", pattern, e),
            })?;
            Ok(Box::new(PatternFilter(regex)))
        }
        _ => Err(UnlockError::Config {
            message: format!(
                "Content filter for '{}' must set exactly one of require, exclude, pattern",
                rule.platform
            ),
        }),
    }
}
