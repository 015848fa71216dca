//! Trigger matching.
//!
//! Decides whether a source post should be reposted and which auto-response,
//! if any, a reply should get. Everything here is pure: no I/O and no state
//! beyond the [`TriggerConfig`] snapshot passed in.
//!
//! Matching is a case-insensitive, unanchored substring test. Keywords are
//! lower-cased once when the configuration is built, and empty keywords are
//! rejected at that point so they can never match every text.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

/// A configuration entry that was empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("empty {kind} in trigger configuration")]
pub struct EmptyKeyword {
    /// Which list the entry came from (`tag`, `keyword`, `response keyword`).
    pub kind: &'static str,
}

/// A non-empty, lower-cased match term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyword {
    /// The term as configured, used as the search query.
    original: String,
    /// The lower-cased term used for matching.
    needle: String,
}

impl Keyword {
    /// Builds a keyword, rejecting empty or whitespace-only input.
    pub fn parse(raw: &str, kind: &'static str) -> Result<Self, EmptyKeyword> {
        if raw.trim().is_empty() {
            return Err(EmptyKeyword { kind });
        }
        Ok(Keyword {
            original: raw.to_string(),
            needle: raw.to_lowercase(),
        })
    }

    /// The keyword as written in the configuration.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Returns true if this keyword occurs in `lowered_text`.
    ///
    /// The caller must pass text that is already lower-cased.
    fn occurs_in(&self, lowered_text: &str) -> bool {
        lowered_text.contains(self.needle.as_str())
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Immutable trigger rules for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerConfig {
    tags: Vec<Keyword>,
    keywords: Vec<Keyword>,
    responses: Vec<(Keyword, String)>,
    default_response: Option<String>,
    max_reposts_per_cycle: usize,
    preset_comment: Option<String>,
}

impl TriggerConfig {
    /// Creates an empty configuration that never matches and never responds.
    pub fn new(max_reposts_per_cycle: usize) -> Self {
        TriggerConfig {
            tags: Vec::new(),
            keywords: Vec::new(),
            responses: Vec::new(),
            default_response: None,
            max_reposts_per_cycle,
            preset_comment: None,
        }
    }

    /// Builds a configuration from raw lists, validating every entry.
    ///
    /// `responses` keeps its iteration order: the first matching keyword wins.
    pub fn from_parts(
        tags: &[String],
        keywords: &[String],
        responses: &IndexMap<String, String>,
        default_response: Option<String>,
        max_reposts_per_cycle: usize,
        preset_comment: Option<String>,
    ) -> Result<Self, EmptyKeyword> {
        let mut config = TriggerConfig::new(max_reposts_per_cycle)
            .with_default_response(default_response)
            .with_preset_comment(preset_comment);
        for tag in tags {
            config = config.with_tag(tag)?;
        }
        for keyword in keywords {
            config = config.with_keyword(keyword)?;
        }
        for (keyword, response) in responses {
            config = config.with_response(keyword, response)?;
        }
        Ok(config)
    }

    /// Adds a search tag.
    pub fn with_tag(mut self, tag: &str) -> Result<Self, EmptyKeyword> {
        self.tags.push(Keyword::parse(tag, "tag")?);
        Ok(self)
    }

    /// Adds a search keyword.
    pub fn with_keyword(mut self, keyword: &str) -> Result<Self, EmptyKeyword> {
        self.keywords.push(Keyword::parse(keyword, "keyword")?);
        Ok(self)
    }

    /// Binds an auto-response to a keyword, after any existing bindings.
    pub fn with_response(
        mut self,
        keyword: &str,
        response: impl Into<String>,
    ) -> Result<Self, EmptyKeyword> {
        self.responses
            .push((Keyword::parse(keyword, "response keyword")?, response.into()));
        Ok(self)
    }

    /// Sets the response used when no keyword matches. Blank text disables it.
    pub fn with_default_response(mut self, response: Option<String>) -> Self {
        self.default_response = response.filter(|r| !r.trim().is_empty());
        self
    }

    /// Sets the comment posted under each repost. Blank text disables it.
    pub fn with_preset_comment(mut self, comment: Option<String>) -> Self {
        self.preset_comment = comment.filter(|c| !c.trim().is_empty());
        self
    }

    /// Search queries for the repost pass: tags first, then keywords.
    pub fn search_queries(&self) -> impl Iterator<Item = &Keyword> {
        self.tags.iter().chain(self.keywords.iter())
    }

    pub fn max_reposts_per_cycle(&self) -> usize {
        self.max_reposts_per_cycle
    }

    pub fn preset_comment(&self) -> Option<&str> {
        self.preset_comment.as_deref()
    }

    pub fn default_response(&self) -> Option<&str> {
        self.default_response.as_deref()
    }
}

/// Returns true if any configured tag or keyword occurs in `text`.
pub fn should_act_on_source(text: &str, config: &TriggerConfig) -> bool {
    if text.is_empty() {
        return false;
    }
    let lowered = text.to_lowercase();
    config.search_queries().any(|k| k.occurs_in(&lowered))
}

/// Picks the auto-response for `text`.
///
/// The first keyword (in configured order) found in the text selects its bound
/// response. Otherwise the default response is used; `None` means do not respond.
pub fn classify_reply<'a>(text: &str, config: &'a TriggerConfig) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    config
        .responses
        .iter()
        .find(|(keyword, _)| keyword.occurs_in(&lowered))
        .map(|(_, response)| response.as_str())
        .or_else(|| config.default_response())
}
