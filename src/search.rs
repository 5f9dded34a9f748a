use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Fuzzy,
    Weighted,
    Regex,
    Substring,
}

#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub title: &'a str,
    pub url: &'a str,
}

pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Score each candidate against `query`, returning `(index, score)` for
    /// the ones that match. Higher scores rank first.
    fn rank(&self, query: &str, candidates: &[Candidate<'_>], search_urls: bool) -> Vec<(usize, i64)>;
}

pub fn strategy_for(search_type: SearchType) -> Box<dyn SearchStrategy> {
    match search_type {
        SearchType::Fuzzy => Box::new(FuzzySearch::default()),
        SearchType::Weighted => Box::new(WeightedSearch::default()),
        SearchType::Regex => Box::new(RegexSearch),
        SearchType::Substring => Box::new(SubstringSearch),
    }
}

/// Sort ranked matches by descending score, keeping input order on ties.
pub fn sort_ranked(mut ranked: Vec<(usize, i64)>) -> Vec<(usize, i64)> {
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

#[derive(Default)]
pub struct FuzzySearch {
    matcher: SkimMatcherV2,
}

impl SearchStrategy for FuzzySearch {
    fn name(&self) -> &str {
        "fuzzy"
    }

    fn rank(&self, query: &str, candidates: &[Candidate<'_>], search_urls: bool) -> Vec<(usize, i64)> {
        candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                let title = self.matcher.fuzzy_match(c.title, query);
                let url = if search_urls {
                    self.matcher.fuzzy_match(c.url, query)
                } else {
                    None
                };
                title.max(url).map(|s| (i, s))
            })
            .collect()
    }
}

const TITLE_WEIGHT: i64 = 3;
const URL_WEIGHT: i64 = 1;

/// Fuzzy matching where title hits outweigh URL hits.
#[derive(Default)]
pub struct WeightedSearch {
    matcher: SkimMatcherV2,
}

impl SearchStrategy for WeightedSearch {
    fn name(&self) -> &str {
        "weighted"
    }

    fn rank(&self, query: &str, candidates: &[Candidate<'_>], search_urls: bool) -> Vec<(usize, i64)> {
        candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                let title = self.matcher.fuzzy_match(c.title, query);
                let url = if search_urls {
                    self.matcher.fuzzy_match(c.url, query)
                } else {
                    None
                };
                if title.is_none() && url.is_none() {
                    return None;
                }
                let score = title.unwrap_or(0) * TITLE_WEIGHT + url.unwrap_or(0) * URL_WEIGHT;
                Some((i, score))
            })
            .collect()
    }
}

/// Case-insensitive regular expression. An invalid pattern matches nothing.
pub struct RegexSearch;

impl SearchStrategy for RegexSearch {
    fn name(&self) -> &str {
        "regex"
    }

    fn rank(&self, query: &str, candidates: &[Candidate<'_>], search_urls: bool) -> Vec<(usize, i64)> {
        let re = match RegexBuilder::new(query).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                tracing::debug!("invalid search pattern {query:?}: {e}");
                return Vec::new();
            }
        };
        candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                if re.is_match(c.title) {
                    Some((i, 2))
                } else if search_urls && re.is_match(c.url) {
                    Some((i, 1))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Case-insensitive substring match; earlier hits score higher.
pub struct SubstringSearch;

impl SearchStrategy for SubstringSearch {
    fn name(&self) -> &str {
        "substring"
    }

    fn rank(&self, query: &str, candidates: &[Candidate<'_>], search_urls: bool) -> Vec<(usize, i64)> {
        let needle = query.to_lowercase();
        candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                let title = c.title.to_lowercase().find(&needle).map(|p| 2000 - p.min(1000) as i64);
                let url = if search_urls {
                    c.url.to_lowercase().find(&needle).map(|p| 1000 - p.min(1000) as i64)
                } else {
                    None
                };
                title.max(url).map(|s| (i, s))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<Candidate<'static>> {
        vec![
            Candidate {
                title: "Example Domain",
                url: "http://example.com",
            },
            Candidate {
                title: "Rust Programming Language",
                url: "https://www.rust-lang.org",
            },
        ]
    }

    #[test]
    fn substring_prefers_title_hits() {
        let ranked = sort_ranked(SubstringSearch.rank("rust", &candidates(), true));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, 1);
        assert!(ranked[0].1 > 1000);
    }

    #[test]
    fn url_matching_can_be_disabled() {
        let c = candidates();
        assert_eq!(SubstringSearch.rank("rust-lang", &c, true).len(), 1);
        assert!(SubstringSearch.rank("rust-lang", &c, false).is_empty());
    }

    #[test]
    fn invalid_regex_matches_nothing() {
        assert!(RegexSearch.rank("(unclosed", &candidates(), true).is_empty());
        assert_eq!(RegexSearch.rank("^exa", &candidates(), true).len(), 1);
    }
}
