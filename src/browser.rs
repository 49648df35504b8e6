//! Browser collaborator seam
//!
//! The crate never touches the DOM itself. Page reading, selector handling,
//! and tab messaging live behind [`Browser`]; the loop only needs the trait
//! plus a [`PageContext`] refreshed at the top of every iteration so that a
//! navigation in one turn is reflected in the next permission check.

use async_trait::async_trait;

/// The active execution context for tool calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub tab_id: u32,
    pub url: String,
    /// Registrable host used for policy lookups (lowercased)
    pub site: String,
}

impl PageContext {
    pub fn new(tab_id: u32, url: impl Into<String>) -> Self {
        let url = url.into();
        let site = site_of(&url);
        Self { tab_id, url, site }
    }
}

/// Extract the policy-lookup site from a URL.
///
/// Falls back to an empty string for unparseable or hostless URLs; an empty
/// site never matches a trust record, so the decision engine degrades to the
/// global defaults.
pub fn site_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Page-action substrate implemented by the host (extension messaging,
/// CDP bridge, test double). Every method is a potentially slow cross-context
/// round trip and is awaited to completion by the executor.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Current tab and site, refreshed before each permission decision
    async fn context(&self) -> anyhow::Result<PageContext>;

    async fn navigate(&self, url: &str) -> anyhow::Result<String>;
    async fn go_back(&self) -> anyhow::Result<String>;
    async fn read_page(&self) -> anyhow::Result<String>;
    async fn find_elements(&self, selector: &str) -> anyhow::Result<String>;
    async fn click(&self, selector: &str) -> anyhow::Result<String>;
    async fn fill(&self, selector: &str, text: &str) -> anyhow::Result<String>;
    async fn select_option(&self, selector: &str, value: &str) -> anyhow::Result<String>;
    async fn submit(&self, selector: &str) -> anyhow::Result<String>;
    async fn search(&self, query: &str) -> anyhow::Result<String>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_of_extracts_lowercased_host() {
        assert_eq!(site_of("https://Shop.Example.COM/cart?x=1"), "shop.example.com");
        assert_eq!(site_of("http://localhost:8080/"), "localhost");
    }

    #[test]
    fn site_of_degrades_to_empty() {
        assert_eq!(site_of("not a url"), "");
        assert_eq!(site_of("about:blank"), "");
    }
}
