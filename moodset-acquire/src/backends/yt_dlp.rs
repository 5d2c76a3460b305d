//! yt-dlp backed search and media access
//!
//! Search and metadata come from the `yt-dlp` command-line tool in JSON mode.
//! The audio payload itself is streamed from the selected format URL with
//! reqwest.

use super::{run_tool, ToolError};
use crate::types::{
    AudioStream, FetchError, MediaBackend, MediaInfo, SearchBackend, SearchError, SearchHit,
    TrackSource,
};
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const USER_AGENT: &str = concat!("moodset/", env!("CARGO_PKG_VERSION"));

/// `--dump-single-json` output for a flat search playlist
#[derive(Debug, Deserialize)]
struct SearchPlaylist {
    #[serde(default)]
    entries: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
}

/// `--dump-single-json` output for a single video
#[derive(Debug, Deserialize)]
struct VideoInfo {
    id: String,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct FormatInfo {
    url: Option<String>,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    abr: Option<f64>,
    protocol: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

impl FormatInfo {
    fn is_audio_only(&self) -> bool {
        let no_video = self.vcodec.as_deref() == Some("none");
        let has_audio = self.acodec.as_deref().map_or(true, |c| c != "none");
        no_video && has_audio && self.is_direct() && self.url.is_some() && self.ext.is_some()
    }

    /// Plain HTTP(S) file, not a segmented manifest (m3u8, DASH)
    fn is_direct(&self) -> bool {
        match self.protocol.as_deref() {
            None => true,
            Some(protocol) => protocol.eq_ignore_ascii_case("http") || protocol.eq_ignore_ascii_case("https"),
        }
    }
}

/// yt-dlp client
pub struct YtDlpBackend {
    program: PathBuf,
    client: reqwest::Client,
    tool_timeout: Duration,
    download_timeout: Duration,
    preferred_container: Option<String>,
}

impl YtDlpBackend {
    /// Create a new backend
    ///
    /// `request_timeout` bounds connection setup; `download_timeout` bounds
    /// each whole download.
    pub fn new(
        program: impl Into<PathBuf>,
        request_timeout: Duration,
        download_timeout: Duration,
        tool_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            program: program.into(),
            client,
            tool_timeout,
            download_timeout,
            preferred_container: None,
        })
    }

    /// Prefer formats in this container when several audio-only streams exist
    pub fn with_preferred_container(mut self, container: Option<String>) -> Self {
        self.preferred_container = container.map(|c| c.to_ascii_lowercase());
        self
    }

    async fn stream_to_file(&self, stream: &AudioStream, destination: &Path) -> Result<u64, FetchError> {
        let mut request = self.client.get(&stream.url);
        for (name, value) in &stream.http_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(
                status.as_u16(),
                status.canonical_reason().unwrap_or("").to_string(),
            ));
        }

        let expected = response.content_length();
        let mut file = tokio::fs::File::create(destination).await?;
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = expected {
            if written != expected {
                return Err(FetchError::IncompleteDownload(format!(
                    "received {} of {} bytes",
                    written, expected
                )));
            }
        }

        Ok(written)
    }
}

#[async_trait::async_trait]
impl SearchBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let target = format!("ytsearch{}:{}", limit, query);
        debug!(query, limit, "Searching");

        let stdout = run_tool(
            &self.program,
            ["--flat-playlist", "--dump-single-json", "--no-warnings", target.as_str()],
            self.tool_timeout,
        )
        .await
        .map_err(|e| match e {
            ToolError::Timeout { secs, .. } => SearchError::Timeout(secs),
            other => SearchError::Tool(other.to_string()),
        })?;

        let hits = parse_search_output(&stdout, limit)?;
        if hits.is_empty() {
            return Err(SearchError::NoResults);
        }
        Ok(hits)
    }
}

#[async_trait::async_trait]
impl MediaBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn lookup(&self, link: &str) -> Result<MediaInfo, FetchError> {
        debug!(link, "Probing metadata");

        let stdout = run_tool(
            &self.program,
            ["--dump-single-json", "--no-playlist", "--no-warnings", link],
            self.tool_timeout,
        )
        .await
        .map_err(|e| match e {
            ToolError::Timeout { secs, .. } => FetchError::Timeout(secs),
            other => FetchError::Tool(other.to_string()),
        })?;

        parse_media_info(link, &stdout, self.preferred_container.as_deref())
    }

    async fn download(&self, stream: &AudioStream, destination: &Path) -> Result<u64, FetchError> {
        match tokio::time::timeout(self.download_timeout, self.stream_to_file(stream, destination)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.download_timeout.as_secs())),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(0)
    } else if let Some(status) = e.status() {
        FetchError::Http(status.as_u16(), e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

/// Turn flat-playlist JSON into ranked hits (at most `limit`)
fn parse_search_output(stdout: &[u8], limit: usize) -> Result<Vec<SearchHit>, SearchError> {
    let playlist: SearchPlaylist =
        serde_json::from_slice(stdout).map_err(|e| SearchError::Parse(e.to_string()))?;

    Ok(playlist
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry
                .webpage_url
                .or(entry.url)
                .or_else(|| entry.id.map(|id| format!("https://www.youtube.com/watch?v={}", id)))?;
            Some(SearchHit {
                link,
                duration_secs: entry.duration.filter(|d| d.is_finite() && *d >= 0.0),
                title: entry.title,
            })
        })
        .take(limit)
        .collect())
}

/// Turn single-video JSON into a source + best audio-only stream
fn parse_media_info(
    link: &str,
    stdout: &[u8],
    preferred_container: Option<&str>,
) -> Result<MediaInfo, FetchError> {
    let info: VideoInfo =
        serde_json::from_slice(stdout).map_err(|e| FetchError::Parse(e.to_string()))?;

    let duration_secs = info.duration.filter(|d| d.is_finite() && *d >= 0.0);
    let source = TrackSource::new(link, &info.id, duration_secs)
        .ok_or_else(|| FetchError::Parse(format!("unusable media id '{}'", info.id)))?;

    let format = select_audio_format(&info.formats, preferred_container).ok_or(FetchError::NoAudioStream)?;

    let stream = AudioStream {
        url: format.url.clone().unwrap_or_default(),
        container: format.ext.clone().unwrap_or_default().to_ascii_lowercase(),
        bitrate_kbps: format.abr,
        http_headers: format.http_headers.clone(),
    };

    Ok(MediaInfo { source, stream })
}

/// Audio-only format in the preferred container if any, then by highest bitrate
fn select_audio_format<'a>(
    formats: &'a [FormatInfo],
    preferred_container: Option<&str>,
) -> Option<&'a FormatInfo> {
    let preferred = |f: &FormatInfo| match (preferred_container, f.ext.as_deref()) {
        (Some(want), Some(ext)) => want.eq_ignore_ascii_case(ext),
        _ => false,
    };

    formats.iter().filter(|f| f.is_audio_only()).max_by(|a, b| {
        preferred(a).cmp(&preferred(b)).then(
            a.abr
                .unwrap_or(0.0)
                .partial_cmp(&b.abr.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::source_resolver::select_trusted;
    use crate::workflow::orchestrator::validate_duration;
    use moodset_common::config::TargetLength;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::TempDir;

    const VIDEO_JSON: &str = r#"{
        "id": "abc123XYZ_-",
        "duration": 215.4,
        "formats": [
            {"format_id": "139", "url": "https://cdn/139", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.5", "abr": 48.0},
            {"format_id": "140", "url": "https://cdn/140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5},
            {"format_id": "251", "url": "https://cdn/251", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 135.2,
             "http_headers": {"User-Agent": "Mozilla/5.0"}},
            {"format_id": "18", "url": "https://cdn/18", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a.40.2", "abr": 256.0}
        ]
    }"#;

    fn backend() -> YtDlpBackend {
        YtDlpBackend::new(
            "yt-dlp",
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_search_output() {
        let json = r#"{"entries": [
            {"id": "a1", "url": "https://www.youtube.com/watch?v=a1", "title": "One", "duration": 700.0},
            {"id": "b2", "title": "Two", "duration": 499.6},
            {"id": "c3", "title": "Live", "duration": null}
        ]}"#;

        let hits = parse_search_output(json.as_bytes(), 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].link, "https://www.youtube.com/watch?v=a1");
        assert_eq!(hits[0].duration_secs, Some(700.0));
        assert_eq!(hits[1].link, "https://www.youtube.com/watch?v=b2");
        assert_eq!(hits[1].duration_secs, Some(499.6));
    }

    #[test]
    fn test_parse_search_garbage() {
        assert!(matches!(
            parse_search_output(b"not json", 2),
            Err(SearchError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_media_info_picks_best_audio_only() {
        let info = parse_media_info("https://youtu.be/abc", VIDEO_JSON.as_bytes(), None).unwrap();
        assert_eq!(info.source.identifier, "abc123XYZ_-");
        assert_eq!(info.source.duration_secs, Some(215.4));
        assert_eq!(info.stream.url, "https://cdn/251");
        assert_eq!(info.stream.container, "webm");
        assert_eq!(info.stream.http_headers.get("User-Agent").map(String::as_str), Some("Mozilla/5.0"));
    }

    #[test]
    fn test_preferred_container_wins() {
        let info = parse_media_info("https://youtu.be/abc", VIDEO_JSON.as_bytes(), Some("m4a")).unwrap();
        assert_eq!(info.stream.url, "https://cdn/140");
        assert_eq!(info.stream.container, "m4a");
    }

    #[test]
    fn test_manifest_formats_never_selected() {
        let json = r#"{"id": "m", "duration": 200.0, "formats": [
            {"format_id": "140", "url": "https://cdn/140", "ext": "m4a", "protocol": "https",
             "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5},
            {"format_id": "234", "url": "https://manifest/234.m3u8", "ext": "mp4", "protocol": "m3u8_native",
             "vcodec": "none", "acodec": "mp4a.40.2", "abr": 192.0},
            {"format_id": "dash", "url": "https://manifest/dash.mpd", "ext": "m4a", "protocol": "http_dash_segments",
             "vcodec": "none", "acodec": "mp4a.40.2", "abr": 256.0}
        ]}"#;

        let info = parse_media_info("https://youtu.be/m", json.as_bytes(), None).unwrap();
        assert_eq!(info.stream.url, "https://cdn/140");
    }

    #[test]
    fn test_only_manifest_formats_is_no_audio_stream() {
        let json = r#"{"id": "m", "duration": 200.0, "formats": [
            {"url": "https://manifest/234.m3u8", "ext": "mp4", "protocol": "m3u8_native",
             "vcodec": "none", "acodec": "mp4a.40.2", "abr": 192.0}
        ]}"#;
        assert!(matches!(
            parse_media_info("https://youtu.be/m", json.as_bytes(), None),
            Err(FetchError::NoAudioStream)
        ));
    }

    #[test]
    fn test_fractional_durations_kept_for_gate_and_cutoff() {
        let json = r#"{"id": "short", "duration": 119.5, "formats": [
            {"url": "https://cdn/1", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 128.0}
        ]}"#;
        let info = parse_media_info("https://youtu.be/short", json.as_bytes(), None).unwrap();
        assert_eq!(info.source.duration_secs, Some(119.5));
        assert!(validate_duration(&info.source.link, info.source.duration_secs, TargetLength::Seconds(120)).is_err());

        let json = r#"{"entries": [
            {"id": "a", "duration": 600.4},
            {"id": "b", "duration": 601.0}
        ]}"#;
        let hits = parse_search_output(json.as_bytes(), 2).unwrap();
        assert_eq!(hits[0].duration_secs, Some(600.4));
        assert!(select_trusted(&hits, 600).is_none());
    }

    #[test]
    fn test_no_audio_only_stream() {
        let json = r#"{"id": "v", "duration": 10, "formats": [
            {"url": "https://cdn/18", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a.40.2"}
        ]}"#;
        assert!(matches!(
            parse_media_info("https://youtu.be/v", json.as_bytes(), None),
            Err(FetchError::NoAudioStream)
        ));
    }

    fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(&response);
            }
        });
        format!("http://{}/audio", addr)
    }

    fn stream_for(url: String) -> AudioStream {
        AudioStream {
            url,
            container: "webm".to_string(),
            bitrate_kbps: None,
            http_headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let body = b"0123456789abcdef";
        let mut response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes();
        response.extend_from_slice(body);
        let url = serve_once(response);

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("x.webm.part");

        let written = backend().download(&stream_for(url), &dest).await.unwrap();
        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let url = serve_once(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n".to_vec());

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("x.webm.part");

        let result = backend().download(&stream_for(url), &dest).await;
        match result {
            Err(e @ FetchError::Http(403, _)) => assert!(!e.is_retryable()),
            other => panic!("expected HTTP 403, got {:?}", other),
        }
    }
}
