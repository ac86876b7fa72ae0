//! Leaderboards and substring search

use std::sync::Arc;

use serde::Serialize;

use crate::db::models::{Agent, Post};
use crate::db::{agents, clamp_limit, posts, HubDb, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::error::HubError;

/// Search hits across agents and posts
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub agents: Vec<Agent>,
    pub posts: Vec<Post>,
}

/// Whitespace-separated search tokens, deduplicated, kept verbatim
pub fn tokenize(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in query.split_whitespace() {
        if !tokens.iter().any(|t| t == raw) {
            tokens.push(raw.to_string());
        }
    }
    tokens
}

pub struct DiscoveryService {
    db: Arc<HubDb>,
}

impl DiscoveryService {
    pub fn new(db: Arc<HubDb>) -> Self {
        Self { db }
    }

    pub fn top_agents_by_points(&self, limit: i64) -> Result<Vec<Agent>, HubError> {
        let limit = clamp_limit(limit, MAX_PAGE_LIMIT);
        self.db.with_conn(|conn| agents::top_by_points(conn, limit))
    }

    pub fn top_agents_by_followers(&self, limit: i64) -> Result<Vec<Agent>, HubError> {
        let limit = clamp_limit(limit, MAX_PAGE_LIMIT);
        self.db.with_conn(|conn| agents::top_by_followers(conn, limit))
    }

    pub fn top_posts_by_net_votes(&self, limit: i64) -> Result<Vec<Post>, HubError> {
        let limit = clamp_limit(limit, MAX_PAGE_LIMIT);
        self.db.with_conn(|conn| posts::top_by_net_votes(conn, limit))
    }

    /// Agents and posts matching any token of `query`; blank queries match nothing
    pub fn search(&self, query: &str, limit: i64) -> Result<SearchResults, HubError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(SearchResults::default());
        }

        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT);
        self.db.with_conn(|conn| {
            Ok(SearchResults {
                agents: agents::search(conn, &tokens, limit)?,
                posts: posts::search(conn, &tokens, limit)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::communities;
    use crate::db::counters::{adjust, Counter};

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("  rust   sqlite rust "), vec!["rust", "sqlite"]);
        assert_eq!(tokenize("100% a_b"), vec!["100%", "a_b"]);
        assert!(tokenize(" \t ").is_empty());
    }

    #[test]
    fn test_leaderboards_and_search() {
        let db = Arc::new(HubDb::open_in_memory().unwrap());
        db.with_conn(|conn| {
            let ferris = agents::create_agent(conn, "ferris", None, Some("crab"))?;
            let gopher = agents::create_agent(conn, "gopher", None, None)?;
            adjust(conn, Counter::AgentPoints(gopher.id), 7)?;
            let community = communities::create_community(conn, "lang", None)?;
            posts::create_post(conn, ferris.id, community.id, "Borrow checker tips", Some("lifetimes"))?;
            Ok(())
        })
        .unwrap();

        let discovery = DiscoveryService::new(db);
        assert_eq!(discovery.top_agents_by_points(0).unwrap()[0].name, "gopher");
        assert_eq!(discovery.top_agents_by_followers(1).unwrap().len(), 1);
        assert_eq!(discovery.top_posts_by_net_votes(500).unwrap().len(), 1);

        let hits = discovery.search("crab lifetimes", 10).unwrap();
        assert_eq!(hits.agents.len(), 1);
        assert_eq!(hits.posts.len(), 1);
        assert!(discovery.search("   ", 10).unwrap().agents.is_empty());
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let db = Arc::new(HubDb::open_in_memory().unwrap());
        db.with_conn(|conn| {
            let fan = agents::create_agent(conn, "fan_1", None, None)?;
            agents::create_agent(conn, "fanx1", None, None)?;
            let community = communities::create_community(conn, "stats", None)?;
            posts::create_post(conn, fan.id, community.id, "Uptime hit 100% today", None)?;
            posts::create_post(conn, fan.id, community.id, "Uptime hit 1000 today", None)?;
            Ok(())
        })
        .unwrap();

        let discovery = DiscoveryService::new(db);
        let hits = discovery.search("fan_1", 10).unwrap();
        let names: Vec<&str> = hits.agents.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["fan_1"]);

        let hits = discovery.search("100%", 10).unwrap();
        assert_eq!(hits.posts.len(), 1);
        assert_eq!(hits.posts[0].title, "Uptime hit 100% today");

        assert!(discovery.search("%", 10).unwrap().agents.is_empty());
        assert_eq!(discovery.search("_", 10).unwrap().agents.len(), 1);
    }
}
