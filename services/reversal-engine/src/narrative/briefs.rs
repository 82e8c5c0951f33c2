//! Narrative briefs from the external collaborator
//!
//! The collaborator takes a category and a headline list and returns up to
//! three ranked briefs. The engine consumes them as opaque display strings
//! and performs no scoring on them.

use crate::models::NarrativeBrief;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const MAX_BRIEFS: usize = 3;

#[async_trait::async_trait]
pub trait NarrativeBriefSource: Send + Sync {
    /// Up to `MAX_BRIEFS` briefs ranked by importance, highest first
    async fn briefs(&self, category: &str, headlines: &[String])
        -> anyhow::Result<Vec<NarrativeBrief>>;
}

/// HTTP collaborator client
#[derive(Clone)]
pub struct HttpBriefSource {
    client: Client,
    url: String,
}

impl HttpBriefSource {
    pub fn new(url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, url }
    }
}

#[async_trait::async_trait]
impl NarrativeBriefSource for HttpBriefSource {
    async fn briefs(
        &self,
        category: &str,
        headlines: &[String],
    ) -> anyhow::Result<Vec<NarrativeBrief>> {
        let payload = serde_json::json!({
            "category": category,
            "headlines": headlines,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Brief service failed: {} - {}", status, body));
        }

        let briefs: Vec<BriefDto> = response.json().await?;
        debug!("Received {} briefs from collaborator", briefs.len());

        Ok(rank(briefs.into_iter().map(BriefDto::into_brief).collect()))
    }
}

/// Fallback source when no collaborator is configured; passes headlines
/// through as unranked briefs so the display layer always has something
pub struct StaticBriefSource;

#[async_trait::async_trait]
impl NarrativeBriefSource for StaticBriefSource {
    async fn briefs(
        &self,
        _category: &str,
        headlines: &[String],
    ) -> anyhow::Result<Vec<NarrativeBrief>> {
        let briefs = headlines
            .iter()
            .enumerate()
            .map(|(i, headline)| NarrativeBrief {
                headline: headline.clone(),
                url: String::new(),
                analysis: "No collaborator configured; headline passed through.".to_string(),
                importance: (MAX_BRIEFS.saturating_sub(i)) as u32,
            })
            .collect();
        Ok(rank(briefs))
    }
}

/// Sort by importance descending and keep the top `MAX_BRIEFS`
fn rank(mut briefs: Vec<NarrativeBrief>) -> Vec<NarrativeBrief> {
    briefs.sort_by(|a, b| b.importance.cmp(&a.importance));
    briefs.truncate(MAX_BRIEFS);
    briefs
}

#[derive(Debug, Deserialize)]
struct BriefDto {
    headline: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    importance: u32,
}

impl BriefDto {
    fn into_brief(self) -> NarrativeBrief {
        NarrativeBrief {
            headline: self.headline,
            url: self.url,
            analysis: self.analysis,
            importance: self.importance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief(headline: &str, importance: u32) -> NarrativeBrief {
        NarrativeBrief {
            headline: headline.to_string(),
            url: String::new(),
            analysis: String::new(),
            importance,
        }
    }

    #[test]
    fn rank_orders_by_importance_and_truncates() {
        let ranked = rank(vec![
            brief("low", 1),
            brief("top", 9),
            brief("mid", 5),
            brief("cut", 0),
        ]);
        assert_eq!(ranked.len(), MAX_BRIEFS);
        assert_eq!(ranked[0].headline, "top");
        assert_eq!(ranked[1].headline, "mid");
        assert_eq!(ranked[2].headline, "low");
    }

    #[tokio::test]
    async fn static_source_passes_headlines_through_capped() {
        let headlines: Vec<String> = (0..5).map(|i| format!("headline {}", i)).collect();
        let briefs = StaticBriefSource
            .briefs("macro-reversal", &headlines)
            .await
            .unwrap();
        assert_eq!(briefs.len(), MAX_BRIEFS);
        assert_eq!(briefs[0].headline, "headline 0");
    }
}
