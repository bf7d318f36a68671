use reqwest::Client;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::error::ChatError;

/// Maximum number of matches returned by `PostCache::search`.
pub const SEARCH_LIMIT: usize = 5;

/// One blog post as listed in the feed. Fields are copied verbatim.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PostSummary {
    pub title: String,
    pub link: String,
    pub description: String,
    pub content: String,
}

/// Posts loaded once per session. Owned by the session, never shared globally.
#[derive(Debug, Clone, Default)]
pub struct PostCache {
    posts: Vec<PostSummary>,
}

impl PostCache {
    pub fn new() -> Self {
        Self { posts: Vec::new() }
    }

    pub fn from_posts(posts: Vec<PostSummary>) -> Self {
        Self { posts }
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn get_all_posts(&self) -> &[PostSummary] {
        &self.posts
    }

    /// Case-insensitive substring match over title, description and content.
    pub fn search(&self, query: &str) -> Vec<&PostSummary> {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return Vec::new();
        }

        self.posts
            .iter()
            .filter(|post| {
                post.title.to_lowercase().contains(&query_lower)
                    || post.description.to_lowercase().contains(&query_lower)
                    || post.content.to_lowercase().contains(&query_lower)
            })
            .take(SEARCH_LIMIT)
            .collect()
    }
}

/// Fetches the feed from a URL or a local file.
#[derive(Clone)]
pub struct FeedLoader {
    client: Client,
    location: String,
}

impl FeedLoader {
    pub fn new(location: &str) -> Self {
        Self {
            client: Client::new(),
            location: location.to_string(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Load the feed, degrading to an empty cache on any failure.
    pub async fn load(&self) -> PostCache {
        match self.try_load().await {
            Ok(posts) => {
                info!(location = %self.location, count = posts.len(), "loaded blog posts");
                PostCache::from_posts(posts)
            }
            Err(e) => {
                warn!(location = %self.location, error = %e, "failed to load blog posts");
                PostCache::new()
            }
        }
    }

    pub async fn try_load(&self) -> Result<Vec<PostSummary>, ChatError> {
        let xml = if is_remote(&self.location) {
            self.fetch().await?
        } else {
            tokio::fs::read_to_string(&self.location)
                .await
                .map_err(|e| ChatError::FeedLoad(format!("{}: {}", self.location, e)))?
        };

        parse_feed(&xml)
    }

    async fn fetch(&self) -> Result<String, ChatError> {
        let response = self
            .client
            .get(&self.location)
            .send()
            .await
            .map_err(|e| ChatError::FeedLoad(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::FeedLoad(format!(
                "feed request failed with status: {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ChatError::FeedLoad(e.to_string()))
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Parse an RSS-style (`<item>`) or Hexo search (`<entry>`) document.
pub fn parse_feed(xml: &str) -> Result<Vec<PostSummary>, ChatError> {
    let doc = Document::parse(xml).map_err(|e| ChatError::FeedLoad(e.to_string()))?;

    let posts = doc
        .descendants()
        .filter(|n| n.is_element() && matches!(n.tag_name().name(), "item" | "entry"))
        .map(|item| {
            let mut link = child_text(item, "link");
            if link.is_empty() {
                link = child_attr(item, "link", "href");
            }
            if link.is_empty() {
                link = child_text(item, "url");
            }

            PostSummary {
                title: child_text(item, "title"),
                link,
                description: child_text(item, "description"),
                content: child_text(item, "content"),
            }
        })
        .collect();

    Ok(posts)
}

fn find_child<'a, 'input>(item: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    item.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// Text content of the first child named `name`, including nested text and CDATA.
fn child_text(item: Node, name: &str) -> String {
    find_child(item, name)
        .map(|child| {
            child
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn child_attr(item: Node, name: &str, attr: &str) -> String {
    find_child(item, name)
        .and_then(|child| child.attribute(attr))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0">
  <channel>
    <title>JasmineRain's blog</title>
    <item>
      <title>红黑树详解</title>
      <link>/2023/01/rbtree/</link>
      <description>平衡二叉树</description>
      <content><![CDATA[<p>旋转与着色</p>]]></content>
    </item>
    <item>
      <title>B+ Tree in InnoDB</title>
      <link>/2023/02/bplus/</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_items() {
        let posts = parse_feed(RSS).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "红黑树详解");
        assert_eq!(posts[0].link, "/2023/01/rbtree/");
        assert_eq!(posts[0].content, "<p>旋转与着色</p>");
        assert_eq!(posts[1].description, "");
        assert_eq!(posts[1].content, "");
    }

    #[test]
    fn parses_hexo_search_entries() {
        let xml = r#"<?xml version="1.0"?>
<search>
  <entry>
    <title>Paxos</title>
    <link href="/2022/paxos/"/>
    <url>/2022/paxos/index.html</url>
    <content type="html">consensus</content>
  </entry>
  <entry>
    <title>Raft</title>
    <url>/2022/raft/</url>
  </entry>
</search>"#;
        let posts = parse_feed(xml).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].link, "/2022/paxos/");
        assert_eq!(posts[0].content, "consensus");
        assert_eq!(posts[1].link, "/2022/raft/");
    }

    #[test]
    fn malformed_feed_is_a_feed_error() {
        assert!(matches!(parse_feed("<rss><item>"), Err(ChatError::FeedLoad(_))));
    }

    fn sample_cache() -> PostCache {
        let posts = (0..30)
            .map(|i| PostSummary {
                title: format!("Post {}", i),
                link: format!("/p/{}/", i),
                description: if i % 2 == 0 { "Rust notes".to_string() } else { String::new() },
                content: String::new(),
            })
            .collect();
        PostCache::from_posts(posts)
    }

    #[test]
    fn search_is_case_insensitive_and_capped() {
        let cache = sample_cache();
        let hits = cache.search("RUST");
        assert_eq!(hits.len(), SEARCH_LIMIT);
        assert_eq!(hits[0].title, "Post 0");
        assert_eq!(hits[1].title, "Post 2");
    }

    #[test]
    fn search_covers_posts_beyond_the_prompt_window() {
        let cache = sample_cache();
        let hits = cache.search("post 29");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].link, "/p/29/");
    }

    #[test]
    fn empty_query_or_cache_finds_nothing() {
        assert!(sample_cache().search("  ").is_empty());
        assert!(PostCache::new().search("rust").is_empty());
    }

    #[tokio::test]
    async fn loads_feed_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search.xml")
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(RSS)
            .create_async()
            .await;

        let loader = FeedLoader::new(&format!("{}/search.xml", server.url()));
        let cache = loader.load().await;
        assert_eq!(cache.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_fetch_degrades_to_empty_cache() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search.xml")
            .with_status(404)
            .create_async()
            .await;

        let loader = FeedLoader::new(&format!("{}/search.xml", server.url()));
        assert!(matches!(loader.try_load().await, Err(ChatError::FeedLoad(_))));
        assert!(loader.load().await.is_empty());
    }

    #[tokio::test]
    async fn loads_feed_from_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.xml");
        std::fs::write(&path, RSS).unwrap();

        let loader = FeedLoader::new(path.to_str().unwrap());
        assert_eq!(loader.load().await.len(), 2);

        let missing = FeedLoader::new(dir.path().join("missing.xml").to_str().unwrap());
        assert!(missing.load().await.is_empty());
    }
}
