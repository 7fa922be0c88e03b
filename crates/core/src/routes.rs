//! Request classification.
//!
//! A [`RouteTable`] is an ordered list of rules. The first rule whose
//! matcher accepts the request path picks the strategy; requests no rule
//! matches use stale-while-revalidate. Requests for another origin are
//! never routed through the cache.

use serde::{Deserialize, Serialize};
use url::Url;

/// How a request reconciles cache and network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::NetworkFirst => "network_first",
            Strategy::CacheFirst => "cache_first",
            Strategy::StaleWhileRevalidate => "stale_while_revalidate",
        }
    }
}

/// Result of classifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Forward to the network untouched; no cache read or write.
    Bypass,
    Cached(Strategy),
}

/// Path predicate of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Path contains the pattern anywhere.
    Contains(String),
    /// Path ends with the pattern (file extension tables).
    Suffix(String),
}

impl Matcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Contains(pattern) => path.contains(pattern.as_str()),
            Matcher::Suffix(pattern) => path.ends_with(pattern.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub strategy: Strategy,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    origin: Url,
    rules: Vec<Rule>,
    fallback: Strategy,
}

impl RouteTable {
    /// Empty table for `origin`; everything same-origin falls through to
    /// stale-while-revalidate until rules are added.
    pub fn new(origin: Url) -> Self {
        Self { origin, rules: Vec::new(), fallback: Strategy::StaleWhileRevalidate }
    }

    /// The usual two-table layout: substring patterns for dynamic paths
    /// (network-first) checked before suffix patterns for static assets
    /// (cache-first).
    pub fn from_patterns<N, C>(origin: Url, network_first: N, cache_first: C) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let mut table = Self::new(origin);
        for pattern in network_first {
            table.push(Matcher::Contains(pattern.into()), Strategy::NetworkFirst);
        }
        for pattern in cache_first {
            table.push(Matcher::Suffix(pattern.into()), Strategy::CacheFirst);
        }
        table
    }

    /// Append a rule; it is consulted after every existing rule.
    pub fn push(&mut self, matcher: Matcher, strategy: Strategy) {
        self.rules.push(Rule { matcher, strategy });
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    pub fn classify(&self, url: &Url) -> Route {
        if !self.is_same_origin(url) {
            return Route::Bypass;
        }

        let path = url.path();
        let strategy = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map_or(self.fallback, |rule| rule.strategy);

        Route::Cached(strategy)
    }
}
