//! Reference Integration — folds external reference material (video metadata,
//! transcripts) into the run's context before the part loop starts.
//!
//! Every failure here is a warning, never a run failure: bad URLs are skipped,
//! failed analyses are discarded, and if nothing survives the run proceeds
//! with no reference context.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::generation::prompts::{
    ANALYSIS_SEPARATOR, REFERENCES_HEADER, REFERENCE_ANALYSIS_PROMPT, REFERENCE_COMBINATION_PROMPT,
};
use crate::llm_client::GenerationClient;

/// Marker that extractors put at the start of a failure text.
pub const ERROR_MARKER: &str = "Error";

/// Turns a reference URL into plain text.
///
/// Extractors report failures in-band: any returned text starting with
/// [`ERROR_MARKER`] is a failure for that URL. [`extract_references`] converts
/// that into a tagged [`ExtractError`] at the boundary.
#[async_trait]
pub trait ReferenceExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("reference '{url}' skipped: {reason}")]
pub struct ExtractError {
    pub url: String,
    pub reason: String,
}

/// Classifies one extractor output.
pub fn classify_extraction(url: &str, text: String) -> Result<String, ExtractError> {
    if text.starts_with(ERROR_MARKER) {
        Err(ExtractError {
            url: url.to_string(),
            reason: text,
        })
    } else if text.trim().is_empty() {
        Err(ExtractError {
            url: url.to_string(),
            reason: "no content".to_string(),
        })
    } else {
        Ok(text)
    }
}

/// Runs the extractor over every URL in order, keeping only successes.
pub async fn extract_references(extractor: &dyn ReferenceExtractor, urls: &[String]) -> Vec<String> {
    let mut texts = Vec::with_capacity(urls.len());
    for url in urls {
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        match classify_extraction(url, extractor.extract(url).await) {
            Ok(text) => texts.push(text),
            Err(e) => warn!("{e}"),
        }
    }
    texts
}

/// Analyses each reference, then combines the analyses into one block.
/// Returns an empty string when there is nothing usable.
pub async fn integrate_references(
    client: &GenerationClient,
    topic: &str,
    references: &[String],
) -> String {
    if references.is_empty() {
        return String::new();
    }

    let mut analyses = Vec::with_capacity(references.len());
    for (idx, content) in references.iter().enumerate() {
        let prompt = REFERENCE_ANALYSIS_PROMPT.replace("{content}", content);
        match client.generate(&prompt).await {
            Ok(analysis) => analyses.push(analysis),
            Err(e) => warn!("Reference {} analysis failed, skipping: {}", idx + 1, e),
        }
    }

    if analyses.is_empty() {
        warn!("No reference analyses succeeded; continuing without references");
        return String::new();
    }

    let prompt = REFERENCE_COMBINATION_PROMPT
        .replace("{topic}", topic)
        .replace("{analyses}", &analyses.join(ANALYSIS_SEPARATOR));

    match client.generate(&prompt).await {
        Ok(block) => {
            info!(
                "Integrated {}/{} references",
                analyses.len(),
                references.len()
            );
            block
        }
        Err(e) => {
            warn!("Reference combination failed; continuing without references: {e}");
            String::new()
        }
    }
}

/// Appends an integrated reference block to the caller's context.
pub fn merge_context(context: &str, references: &str) -> String {
    match (context.trim().is_empty(), references.trim().is_empty()) {
        (_, true) => context.to_string(),
        (true, false) => references.to_string(),
        (false, false) => format!("{context}\n\n{REFERENCES_HEADER}\n{references}"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// YouTube extractor
// ────────────────────────────────────────────────────────────────────────────

const YOUTUBE_OEMBED_URL: &str = "https://www.youtube.com/oembed";
const YOUTUBE_WATCH_URL: &str = "https://www.youtube.com/watch";

fn video_id_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/)([A-Za-z0-9_-]{6,})",
            r"youtube\.com/embed/([A-Za-z0-9_-]{6,})",
            r"youtube\.com/v/([A-Za-z0-9_-]{6,})",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn caption_text_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)<text[^>]*>(.*?)</text>").ok())
        .as_ref()
}

/// Extracts the video id from the common YouTube URL shapes.
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_patterns()
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: String,
    author_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    #[serde(default)]
    language_code: String,
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_english(&self) -> bool {
        self.language_code == "en" || self.language_code.starts_with("en-")
    }

    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// What the watch page's embedded player data says about a video.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WatchPage {
    pub description: Option<String>,
    /// English caption track; uploaded captions win over generated ones.
    pub caption_url: Option<String>,
}

/// Decodes the JSON value that follows `key` in an HTML page.
fn json_after<T: DeserializeOwned>(html: &str, key: &str) -> Option<T> {
    let start = html.find(key)? + key.len();
    serde_json::Deserializer::from_str(&html[start..])
        .into_iter::<T>()
        .next()?
        .ok()
}

pub fn parse_watch_page(html: &str) -> WatchPage {
    let description = json_after::<String>(html, "\"shortDescription\":")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let tracks = json_after::<Vec<CaptionTrack>>(html, "\"captionTracks\":").unwrap_or_default();
    let caption_url = tracks
        .iter()
        .find(|t| t.is_english() && !t.is_generated())
        .or_else(|| tracks.iter().find(|t| t.is_english()))
        .map(|t| t.base_url.clone());

    WatchPage {
        description,
        caption_url,
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Flattens a timedtext caption document into one line of plain text.
pub fn parse_timedtext(xml: &str) -> String {
    let Some(pattern) = caption_text_pattern() else {
        return String::new();
    };
    pattern
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()).split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fetches public video content: oEmbed metadata (title, channel), then the
/// description and English transcript from the watch page.
///
/// Only the metadata is required. A watch page or caption track that cannot
/// be loaded leaves the result with whatever was already gathered.
#[derive(Clone)]
pub struct YoutubeExtractor {
    client: Client,
    oembed_url: String,
    watch_url: String,
}

impl YoutubeExtractor {
    pub fn new() -> Self {
        Self::with_endpoints(YOUTUBE_OEMBED_URL, YOUTUBE_WATCH_URL)
    }

    pub fn with_endpoints(oembed_url: impl Into<String>, watch_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .expect("Failed to build HTTP client"),
            oembed_url: oembed_url.into(),
            watch_url: watch_url.into(),
        }
    }

    async fn fetch(&self, video_id: &str) -> Result<String, reqwest::Error> {
        let canonical_url = format!("{YOUTUBE_WATCH_URL}?v={video_id}");
        let meta: OEmbedResponse = self
            .client
            .get(&self.oembed_url)
            .query(&[("url", canonical_url.as_str()), ("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut content = format!("Title: {}", meta.title);
        if let Some(author) = meta.author_name {
            content.push_str(&format!("\nChannel: {author}"));
        }

        match self.fetch_watch_page(video_id).await {
            Ok(page) => {
                if let Some(description) = page.description {
                    content.push_str(&format!("\nDescription: {description}"));
                }
                match page.caption_url {
                    Some(url) => match self.fetch_transcript(&url).await {
                        Ok(transcript) if !transcript.is_empty() => {
                            content.push_str(&format!("\nTranscript: {transcript}"));
                        }
                        Ok(_) => warn!("Caption track for {video_id} is empty"),
                        Err(e) => warn!("Failed to fetch captions for {video_id}: {e}"),
                    },
                    None => debug!("No English captions for {video_id}"),
                }
            }
            Err(e) => warn!("Failed to load watch page for {video_id}; using metadata only: {e}"),
        }

        content.push_str(&format!("\nSource: {canonical_url}"));
        Ok(content)
    }

    async fn fetch_watch_page(&self, video_id: &str) -> Result<WatchPage, reqwest::Error> {
        let html = self
            .client
            .get(&self.watch_url)
            .query(&[("v", video_id), ("hl", "en")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_watch_page(&html))
    }

    async fn fetch_transcript(&self, caption_url: &str) -> Result<String, reqwest::Error> {
        let xml = self
            .client
            .get(caption_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_timedtext(&xml))
    }
}

impl Default for YoutubeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferenceExtractor for YoutubeExtractor {
    async fn extract(&self, url: &str) -> String {
        let Some(video_id) = extract_video_id(url) else {
            return format!("{ERROR_MARKER}: Invalid or inaccessible YouTube URL");
        };
        match self.fetch(&video_id).await {
            Ok(content) => content,
            Err(e) => format!("{ERROR_MARKER} getting video content: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::llm_client::testing::{client_for, server_error, ScriptedModel};

    struct MapExtractor(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl ReferenceExtractor for MapExtractor {
        async fn extract(&self, url: &str) -> String {
            self.0
                .get(url)
                .map(|s| s.to_string())
                .unwrap_or_else(|| "Error: Invalid URL".to_string())
        }
    }

    #[test]
    fn test_error_marker_is_a_failure() {
        let err = classify_extraction("u", "Error: Invalid URL".into()).unwrap_err();
        assert_eq!(err.reason, "Error: Invalid URL");
        assert!(classify_extraction("u", "Title: ok".into()).is_ok());
        assert!(classify_extraction("u", "   ".into()).is_err());
    }

    #[tokio::test]
    async fn test_extract_skips_failed_urls_and_keeps_order() {
        let extractor = MapExtractor(HashMap::from([
            ("https://a", "Title: A"),
            ("https://c", "Title: C"),
        ]));
        let urls = vec![
            "https://a".to_string(),
            "https://bad".to_string(),
            "  ".to_string(),
            "https://c".to_string(),
        ];
        let texts = extract_references(&extractor, &urls).await;
        assert_eq!(texts, vec!["Title: A", "Title: C"]);
    }

    #[tokio::test]
    async fn test_all_invalid_urls_yield_nothing() {
        let extractor = MapExtractor(HashMap::new());
        let texts = extract_references(&extractor, &["https://x".to_string()]).await;
        assert!(texts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_references_means_no_calls() {
        let model = Arc::new(ScriptedModel::always("unused"));
        let block = integrate_references(&client_for(model.clone()), "topic", &[]).await;
        assert!(block.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_analysis_per_reference_then_one_combination() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok("analysis A".into()),
            Ok("analysis B".into()),
            Ok("combined block".into()),
        ]));
        let refs = vec!["Title: A".to_string(), "Title: B".to_string()];
        let block = integrate_references(&client_for(model.clone()), "qubits", &refs).await;

        assert_eq!(block, "combined block");
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("Title: A"));
        assert!(prompts[1].contains("Title: B"));
        assert!(prompts[2].contains("analysis A\n\n---\n\nanalysis B"));
        assert!(prompts[2].contains("\"qubits\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_analysis_is_discarded() {
        // First reference fails on all three attempts; second succeeds.
        let model = Arc::new(ScriptedModel::new(vec![
            server_error(),
            server_error(),
            server_error(),
            Ok("analysis B".into()),
            Ok("combined".into()),
        ]));
        let refs = vec!["A".to_string(), "B".to_string()];
        let block = integrate_references(&client_for(model.clone()), "t", &refs).await;
        assert_eq!(block, "combined");
        let last = model.prompts().pop().unwrap();
        assert!(last.contains("analysis B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_analyses_failing_returns_empty() {
        let model = Arc::new(ScriptedModel::new(vec![
            server_error(),
            server_error(),
            server_error(),
        ]));
        let block = integrate_references(&client_for(model.clone()), "t", &["A".to_string()]).await;
        assert!(block.is_empty());
        assert_eq!(model.calls(), 3, "no combination call without analyses");
    }

    #[test]
    fn test_merge_context() {
        assert_eq!(merge_context("", ""), "");
        assert_eq!(merge_context("ctx", ""), "ctx");
        assert_eq!(merge_context("", "refs"), "refs");
        assert_eq!(
            merge_context("ctx", "refs"),
            "ctx\n\n--- Additional References ---\nrefs"
        );
    }

    #[test]
    fn test_extract_video_id_shapes() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=10").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://youtube.com/v/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(extract_video_id("https://vimeo.com/12345678"), None);
    }

    #[tokio::test]
    async fn test_youtube_extractor_rejects_non_youtube_url_with_marker() {
        let text = YoutubeExtractor::new().extract("not a url").await;
        assert!(text.starts_with(ERROR_MARKER));
    }

    #[test]
    fn test_watch_page_prefers_uploaded_english_captions() {
        let player = serde_json::json!({
            "videoDetails": {"shortDescription": "  How qubits hold state.\nPart 1 of 3. "},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"baseUrl": "https://captions/fr", "languageCode": "fr"},
                {"baseUrl": "https://captions/en-asr", "languageCode": "en", "kind": "asr"},
                {"baseUrl": "https://captions/en-gb", "languageCode": "en-GB"}
            ]}}
        });
        let html = format!("<script>var ytInitialPlayerResponse = {player};</script>");

        let page = parse_watch_page(&html);
        assert_eq!(
            page.description.as_deref(),
            Some("How qubits hold state.\nPart 1 of 3.")
        );
        assert_eq!(page.caption_url.as_deref(), Some("https://captions/en-gb"));
    }

    #[test]
    fn test_watch_page_falls_back_to_generated_captions() {
        let html = r#"{"captionTracks":[{"baseUrl":"https://captions/de","languageCode":"de"},
            {"baseUrl":"https://captions/en?lang=en\u0026kind=asr","languageCode":"en","kind":"asr"}],"x":1}"#;
        let page = parse_watch_page(html);
        assert_eq!(page.description, None);
        assert_eq!(
            page.caption_url.as_deref(),
            Some("https://captions/en?lang=en&kind=asr")
        );
    }

    #[test]
    fn test_watch_page_without_player_data() {
        assert_eq!(parse_watch_page("<html>consent wall</html>"), WatchPage::default());
        let no_english = r#""captionTracks":[{"baseUrl":"https://captions/ja","languageCode":"ja"}]"#;
        assert_eq!(parse_watch_page(no_english).caption_url, None);
    }

    #[test]
    fn test_timedtext_is_flattened_and_decoded() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
            <text start="0" dur="2.1">Qubits are &amp;#39;both&amp;#39;
            states</text><text start="2.1" dur="1">   </text>
            <text start="3" dur="1">at once &amp;amp; more &lt;sic&gt;</text></transcript>"#;
        assert_eq!(
            parse_timedtext(xml),
            "Qubits are 'both' states at once &amp; more <sic>"
        );
        assert_eq!(parse_timedtext("<transcript></transcript>"), "");
    }

    mod youtube_site {
        use axum::{response::Html, routing::get, Json, Router};
        use serde_json::{json, Value};
        use tokio::net::TcpListener;

        use super::*;

        const VIDEO_URL: &str = "https://youtu.be/qubit123456";

        async fn bind() -> (TcpListener, String) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            (listener, base)
        }

        fn serve(listener: TcpListener, app: Router) {
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
        }

        fn oembed() -> Router {
            Router::new().route(
                "/oembed",
                get(|| async {
                    Json(json!({"title": "Qubits Explained", "author_name": "Physics Lab"}))
                }),
            )
        }

        fn watch_page(player: Value) -> Router {
            let html = format!("<html><script>var ytInitialPlayerResponse = {player};</script></html>");
            Router::new().route(
                "/watch",
                get(move || {
                    let html = html.clone();
                    async move { Html(html) }
                }),
            )
        }

        fn extractor(base: &str) -> YoutubeExtractor {
            YoutubeExtractor::with_endpoints(format!("{base}/oembed"), format!("{base}/watch"))
        }

        #[tokio::test]
        async fn test_metadata_description_and_transcript() {
            let (listener, base) = bind().await;
            let player = json!({
                "videoDetails": {"shortDescription": "A short tour of superposition."},
                "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                    {"baseUrl": format!("{base}/timedtext?lang=en"), "languageCode": "en"}
                ]}}
            });
            let app = oembed().merge(watch_page(player)).route(
                "/timedtext",
                get(|| async {
                    r#"<transcript><text start="0" dur="1">Hello &amp; welcome.</text><text start="1" dur="1">Today: qubits.</text></transcript>"#
                }),
            );
            serve(listener, app);

            let text = extractor(&base).extract(VIDEO_URL).await;
            assert_eq!(
                text,
                "Title: Qubits Explained\n\
                 Channel: Physics Lab\n\
                 Description: A short tour of superposition.\n\
                 Transcript: Hello & welcome. Today: qubits.\n\
                 Source: https://www.youtube.com/watch?v=qubit123456"
            );
        }

        #[tokio::test]
        async fn test_video_without_captions_keeps_description() {
            let (listener, base) = bind().await;
            let player = json!({"videoDetails": {"shortDescription": "No captions here."}});
            serve(listener, oembed().merge(watch_page(player)));

            let text = extractor(&base).extract(VIDEO_URL).await;
            assert!(!text.starts_with(ERROR_MARKER), "{text}");
            assert!(text.contains("Description: No captions here."));
            assert!(!text.contains("Transcript:"));
        }

        #[tokio::test]
        async fn test_unreachable_watch_page_and_captions_degrade_to_metadata() {
            let (listener, base) = bind().await;
            serve(listener, oembed());
            let text = extractor(&base).extract(VIDEO_URL).await;
            assert_eq!(
                text,
                "Title: Qubits Explained\nChannel: Physics Lab\nSource: https://www.youtube.com/watch?v=qubit123456"
            );

            let (listener, base) = bind().await;
            let player = json!({"captionTracks": [
                {"baseUrl": format!("{base}/missing-captions"), "languageCode": "en"}
            ]});
            serve(listener, oembed().merge(watch_page(player)));
            let text = extractor(&base).extract(VIDEO_URL).await;
            assert!(text.starts_with("Title: Qubits Explained"));
            assert!(!text.contains("Transcript:"));
        }

        #[tokio::test]
        async fn test_oembed_failure_is_reported_with_marker() {
            let (listener, base) = bind().await;
            serve(listener, watch_page(json!({})));

            let text = extractor(&base).extract(VIDEO_URL).await;
            assert!(text.starts_with(ERROR_MARKER), "{text}");
        }
    }
}
