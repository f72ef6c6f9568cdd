//! Topic input parsing and heading suggestions from search titles.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::SearchClient;

/// Split `"Topic: first; second; third"` into the topic and its headings.
///
/// Without a `:` the whole input is the topic and no headings are returned.
pub fn parse_topic_input(raw: &str) -> (String, Vec<String>) {
    match raw.split_once(':') {
        Some((topic, rest)) => {
            let headings = rest
                .split(';')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
            (topic.trim().to_string(), headings)
        }
        None => (raw.trim().to_string(), Vec::new()),
    }
}

/// Suggest up to `count` headings for `topic` from search result titles.
///
/// Titles that merely restate the topic are skipped. A failing search
/// yields no suggestions.
pub async fn suggest_headings(
    search: &dyn SearchClient,
    topic: &str,
    count: usize,
) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }

    let hits = match search.search(topic, count * 2).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(topic, error = %e, "heading suggestion search failed");
            return Vec::new();
        }
    };

    let topic_lower = topic.trim().to_lowercase();
    let mut seen = HashSet::new();
    let headings: Vec<String> = hits
        .into_iter()
        .map(|hit| hit.title.trim().to_string())
        .filter(|title| !title.is_empty())
        .filter(|title| topic_lower.is_empty() || !title.to_lowercase().contains(&topic_lower))
        .filter(|title| seen.insert(title.to_lowercase()))
        .take(count)
        .collect();

    info!(topic, suggested = headings.len(), "headings suggested");
    headings
}

#[cfg(test)]
mod tests {
    use super::*;
    use articleforge_shared::{ArticleForgeError, Result, SearchHit};

    struct FixedSearch(Vec<&'static str>);

    #[async_trait::async_trait]
    impl SearchClient for FixedSearch {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>> {
            Ok(self
                .0
                .iter()
                .take(limit)
                .map(|t| SearchHit {
                    title: t.to_string(),
                    url: "https://example.com".into(),
                })
                .collect())
        }
    }

    struct DownSearch;

    #[async_trait::async_trait]
    impl SearchClient for DownSearch {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            Err(ArticleForgeError::Retrieval("unreachable".into()))
        }
    }

    #[test]
    fn parse_topic_with_headings() {
        let (topic, headings) = parse_topic_input("Coffee brewing: History;  Methods ; ;Gear");
        assert_eq!(topic, "Coffee brewing");
        assert_eq!(headings, vec!["History", "Methods", "Gear"]);
    }

    #[test]
    fn parse_topic_without_colon() {
        let (topic, headings) = parse_topic_input("  Coffee brewing  ");
        assert_eq!(topic, "Coffee brewing");
        assert!(headings.is_empty());
    }

    #[test]
    fn parse_topic_keeps_later_colons_in_headings() {
        let (topic, headings) = parse_topic_input("Tea: Origins: China; Today");
        assert_eq!(topic, "Tea");
        assert_eq!(headings, vec!["Origins: China", "Today"]);
    }

    #[tokio::test]
    async fn suggestions_skip_topic_titles_and_duplicates() {
        let search = FixedSearch(vec![
            "Coffee Brewing Guide",
            "Grind size explained",
            "Water temperature",
            "grind size explained",
            "",
            "Cold brew basics",
        ]);
        let headings = suggest_headings(&search, "coffee brewing", 3).await;
        assert_eq!(
            headings,
            vec!["Grind size explained", "Water temperature", "Cold brew basics"]
        );
    }

    #[tokio::test]
    async fn suggestions_degrade_on_search_failure() {
        let headings = suggest_headings(&DownSearch, "coffee", 5).await;
        assert!(headings.is_empty());
    }
}
