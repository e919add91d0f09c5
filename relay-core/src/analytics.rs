// Read-only YouTube Data API lookups for the popup's analytics panel.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Pull the `v` query parameter out of a watch URL.
pub fn video_id_from_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ItemList<T> {
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    channel_id: String,
}

#[derive(Deserialize, Default)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    #[serde(default)]
    statistics: VideoStatistics,
    snippet: VideoSnippet,
    #[serde(default)]
    content_details: ContentDetails,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    view_count: Option<String>,
    video_count: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChannelSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct ChannelItem {
    #[serde(default)]
    statistics: ChannelStatistics,
    #[serde(default)]
    snippet: ChannelSnippet,
}

/// Channel and video figures for one watch page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsReport {
    pub channel_name: String,
    pub channel_description: String,
    pub subscriber_count: Option<String>,
    pub total_views: Option<String>,
    pub total_videos: Option<String>,
    pub video_title: String,
    pub video_views: Option<String>,
    pub video_likes: Option<String>,
    pub video_comments: Option<String>,
    pub video_duration: Option<String>,
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("n/a")
}

impl fmt::Display for AnalyticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Channel Name: {}", self.channel_name)?;
        writeln!(f, "Channel Description: {}", self.channel_description)?;
        writeln!(f, "Subscriber Count: {}", or_na(&self.subscriber_count))?;
        writeln!(f, "Total Views: {}", or_na(&self.total_views))?;
        writeln!(f, "Total Videos: {}", or_na(&self.total_videos))?;
        writeln!(f)?;
        writeln!(f, "Video Title: {}", self.video_title)?;
        writeln!(f, "Video View Count: {}", or_na(&self.video_views))?;
        writeln!(f, "Video Like Count: {}", or_na(&self.video_likes))?;
        writeln!(f, "Video Comment Count: {}", or_na(&self.video_comments))?;
        write!(f, "Video Duration: {}", or_na(&self.video_duration))
    }
}

pub struct AnalyticsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnalyticsClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn list<T: DeserializeOwned>(
        &self,
        resource: &str,
        part: &str,
        id: &str,
    ) -> Result<Vec<T>> {
        let resp = self
            .client
            .get(format!("{}/{}", self.base_url, resource))
            .query(&[("part", part), ("id", id), ("key", self.api_key.as_str())])
            .send()
            .await
            .context(format!("Failed to call {} API", resource))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error = resp.text().await.unwrap_or_else(|_| "Unknown".to_string());
            anyhow::bail!("{} API failed ({}): {}", resource, status, error);
        }

        let list: ItemList<T> = resp
            .json()
            .await
            .context(format!("Failed to parse {} response", resource))?;
        Ok(list.items)
    }

    pub async fn fetch_report(&self, video_url: &str) -> Result<AnalyticsReport> {
        let video_id = video_id_from_url(video_url)
            .ok_or_else(|| anyhow::anyhow!("No video ID found in the URL"))?;

        tracing::debug!("Fetching analytics for video {}", video_id);

        let video: VideoItem = self
            .list("videos", "statistics,snippet,contentDetails", &video_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No video data found"))?;

        let channel: ChannelItem = self
            .list(
                "channels",
                "statistics,snippet,brandingSettings,contentDetails",
                &video.snippet.channel_id,
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No channel data found"))?;

        Ok(AnalyticsReport {
            channel_name: channel.snippet.title,
            channel_description: channel.snippet.description,
            subscriber_count: channel.statistics.subscriber_count,
            total_views: channel.statistics.view_count,
            total_videos: channel.statistics.video_count,
            video_title: video.snippet.title,
            video_views: video.statistics.view_count,
            video_likes: video.statistics.like_count,
            video_comments: video.statistics.comment_count,
            video_duration: video.content_details.duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_from_watch_url() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?v=abc123&t=42s"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_video_id_missing() {
        assert_eq!(video_id_from_url("https://www.youtube.com/feed"), None);
        assert_eq!(video_id_from_url("https://www.youtube.com/watch?v="), None);
        assert_eq!(video_id_from_url("not a url"), None);
    }

    #[test]
    fn test_report_summary_marks_hidden_counts() {
        let report = AnalyticsReport {
            channel_name: "Chan".into(),
            channel_description: "About".into(),
            subscriber_count: None,
            total_views: Some("1000".into()),
            total_videos: Some("12".into()),
            video_title: "Title".into(),
            video_views: Some("50".into()),
            video_likes: None,
            video_comments: Some("3".into()),
            video_duration: Some("PT4M13S".into()),
        };
        let text = report.to_string();

        assert!(text.contains("Channel Name: Chan"));
        assert!(text.contains("Subscriber Count: n/a"));
        assert!(text.contains("Video Like Count: n/a"));
        assert!(text.ends_with("Video Duration: PT4M13S"));
    }
}
