use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use tracing::debug;

use crate::llm::describe_reqwest;
use crate::{ScoutError, ToolError, truncate_chars};

/// Bodies beyond this many bytes are cut before text extraction.
const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Raw response of a page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// HTTP GET collaborator used by `web_scrape`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ToolError>;
}

/// `reqwest`-backed fetcher with a browser-like user agent.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ScoutError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|err| {
                ScoutError::InvalidConfiguration(format!("http client init failed: {err}"))
            })?;
        Ok(Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes.max(1);
        self
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ToolError> {
        let mut response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|err| ToolError::Fetch(format!("{url}: {}", describe_reqwest(&err))))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Fetch(format!("{url}: HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| ToolError::Fetch(format!("{url}: {}", describe_reqwest(&err))))?
        {
            let room = self.max_body_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(url = %url, max_body_bytes = self.max_body_bytes, "response body cut at size limit");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            url: url.to_string(),
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

pub(crate) async fn web_scrape(
    fetcher: &dyn PageFetcher,
    url: &str,
    max_chars: usize,
) -> Result<String, ToolError> {
    let parsed = Url::parse(url)
        .map_err(|err| ToolError::InvalidArguments(format!("invalid URL {url:?}: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ToolError::InvalidArguments(format!(
            "unsupported URL scheme {:?}; only http and https are allowed",
            parsed.scheme()
        )));
    }

    let page = fetcher.fetch(parsed.as_str()).await?;

    if let Some(content_type) = &page.content_type {
        if !is_textual(content_type) {
            return Err(ToolError::Parse(format!(
                "{url} returned non-text content ({content_type})"
            )));
        }
    }

    let looks_like_markup = page
        .content_type
        .as_deref()
        .map(|ct| ct.contains("html") || ct.contains("xml"))
        .unwrap_or_else(|| page.body.trim_start().starts_with('<'));

    let text = if looks_like_markup {
        extract_text(&page.body)
    } else {
        normalize_lines(&page.body)
    };

    if text.is_empty() {
        return Err(ToolError::Parse(format!("no readable text found at {url}")));
    }

    let original = text.chars().count();
    let text = truncate_chars(&text, max_chars);
    if original > max_chars {
        debug!(url = %url, original, max_chars, "truncated scraped content");
    }

    Ok(format!("Content from {url}:\n{text}"))
}

fn is_textual(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.starts_with("text/")
        || ct.contains("html")
        || ct.contains("xml")
        || ct.contains("json")
        || ct.contains("javascript")
}

static DROP_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|svg|template)\b[^>]*>.*?</(script|style|noscript|svg|template)\s*>")
        .expect("invalid block regex")
});
static COMMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("invalid comment regex"));
static BREAKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/tr|/h[1-6]|/section|/article|/header|/footer|/title)\b[^>]*>")
        .expect("invalid break regex")
});
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("invalid tag regex"));
static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("invalid entity regex"));

/// Strip markup from an HTML document, keeping one line per text block.
pub fn extract_text(html: &str) -> String {
    let html = DROP_BLOCKS.replace_all(html, " ");
    let html = COMMENTS.replace_all(&html, " ");
    let html = BREAKS.replace_all(&html, "\n");
    let text = TAGS.replace_all(&html, " ");
    let text = decode_entities(&text);
    normalize_lines(&text)
}

fn decode_entities(text: &str) -> String {
    let text = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFetcher(Result<FetchedPage, ToolError>);

    #[async_trait]
    impl PageFetcher for FixedFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchedPage, ToolError> {
            self.0.clone()
        }
    }

    fn html_page(body: &str) -> FixedFetcher {
        FixedFetcher(Ok(FetchedPage {
            url: "https://example.com/".into(),
            content_type: Some("text/html; charset=utf-8".into()),
            body: body.into(),
        }))
    }

    #[test]
    fn extract_text_drops_scripts_styles_and_tags() {
        let html = r#"<html><head><title>Paris</title><style>p { color: red }</style>
            <script type="text/javascript">var x = "<b>hidden</b>";</script></head>
            <body><!-- nav --><h1>Paris</h1><p>Capital of&nbsp;France &amp; more.</p>
            <p>Caf&#233; &#x263A;</p></body></html>"#;
        let text = extract_text(html);
        assert!(!text.contains("color"));
        assert!(!text.contains("hidden"));
        assert!(!text.contains("nav"));
        assert!(text.contains("Capital of France & more."));
        assert!(text.contains("Café ☺"));
        assert!(text.lines().all(|line| !line.trim().is_empty()));
    }

    #[tokio::test]
    async fn scrape_prefixes_and_truncates() {
        let body = format!("<p>{}</p>", "a".repeat(100));
        let text = web_scrape(&html_page(&body), "https://example.com/", 10)
            .await
            .unwrap();
        assert_eq!(text, "Content from https://example.com/:\naaaaaaaaaa...");
    }

    #[tokio::test]
    async fn scrape_rejects_non_http_schemes() {
        let err = web_scrape(&html_page("<p>x</p>"), "file:///etc/passwd", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = web_scrape(&html_page("<p>x</p>"), "not a url", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn scrape_reports_parse_errors() {
        let binary = FixedFetcher(Ok(FetchedPage {
            url: "https://example.com/doc.pdf".into(),
            content_type: Some("application/pdf".into()),
            body: "%PDF-1.7".into(),
        }));
        let err = web_scrape(&binary, "https://example.com/doc.pdf", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Parse(_)));

        let empty = html_page("<html><script>only()</script></html>");
        let err = web_scrape(&empty, "https://example.com/", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Parse(_)));
    }

    #[tokio::test]
    async fn fetch_errors_pass_through() {
        let failing = FixedFetcher(Err(ToolError::Fetch("https://example.com/: HTTP 404".into())));
        let err = web_scrape(&failing, "https://example.com/", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Fetch(_)));
    }

    /// Serves one HTTP response with a `size`-byte HTML body on a local port.
    fn serve_large_page(size: usize) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {size}\r\nConnection: close\r\n\r\n"
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&vec![b'a'; size]);
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn oversized_bodies_are_cut_at_the_byte_limit() {
        let url = serve_large_page(100_000);
        let fetcher = HttpFetcher::new(Duration::from_secs(5), "scout-test")
            .unwrap()
            .with_max_body_bytes(1024);

        let page = fetcher.fetch(&url).await.unwrap();
        assert_eq!(page.content_type.as_deref(), Some("text/html"));
        assert_eq!(page.body.len(), 1024);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_error() {
        let fetcher = HttpFetcher::new(Duration::from_secs(2), "scout-test").unwrap();
        let err = web_scrape(&fetcher, "http://127.0.0.1:9/", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Fetch(_)), "got {err:?}");
    }
}
