use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::{ConnectError, WriteError};
use crate::point::Point;

#[derive(Clone)]
pub struct InfluxConfig {
    pub url: String,

    pub token: String,

    pub org: String,

    pub bucket: String,

    /// Applied to every HTTP request, including health checks.
    pub timeout: Duration,

    pub ready_attempts: u32,

    pub ready_interval: Duration,
}

impl fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("timeout", &self.timeout)
            .field("ready_attempts", &self.ready_attempts)
            .field("ready_interval", &self.ready_interval)
            .finish()
    }
}

/// Destination for built points.
pub trait PointSink {
    fn write(&self, point: &Point) -> impl Future<Output = Result<(), WriteError>>;
}

/// Writes points to a single InfluxDB v2 bucket over HTTP.
pub struct InfluxClient {
    http: Client,
    base_url: String,
    health_url: Url,
    write_url: Url,
    auth_header: String,
    ready_attempts: u32,
    ready_interval: Duration,
}

impl InfluxClient {
    pub fn new(config: InfluxConfig) -> Result<Self, ConnectError> {
        let base_url = config.url.trim_end_matches('/').to_owned();

        let invalid_url = |e: &dyn fmt::Display| ConnectError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        };

        let health_url =
            Url::parse(&format!("{base_url}/health")).map_err(|e| invalid_url(&e))?;
        let write_url = Url::parse_with_params(
            &format!("{base_url}/api/v2/write"),
            &[
                ("org", config.org.as_str()),
                ("bucket", config.bucket.as_str()),
                ("precision", "ns"),
            ],
        )
        .map_err(|e| invalid_url(&e))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ConnectError::HttpClient)?;

        Ok(Self {
            http,
            base_url,
            health_url,
            write_url,
            auth_header: format!("Token {}", config.token),
            ready_attempts: config.ready_attempts.max(1),
            ready_interval: config.ready_interval,
        })
    }

    /// Polls `/health` until InfluxDB answers with a success status.
    pub async fn wait_until_ready(&self) -> Result<(), ConnectError> {
        for attempt in 1..=self.ready_attempts {
            match self.http.get(self.health_url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(attempt, url = %self.base_url, "InfluxDB is ready");
                    return Ok(());
                }
                Ok(resp) => {
                    debug!(attempt, status = %resp.status(), "InfluxDB not ready yet");
                }
                Err(err) => {
                    debug!(attempt, "InfluxDB not reachable yet: {err}");
                }
            }

            if attempt < self.ready_attempts {
                sleep(self.ready_interval).await;
            }
        }

        Err(ConnectError::StoreUnavailable {
            url: self.base_url.clone(),
            attempts: self.ready_attempts,
        })
    }
}

impl PointSink for InfluxClient {
    async fn write(&self, point: &Point) -> Result<(), WriteError> {
        let resp = self
            .http
            .post(self.write_url.clone())
            .header(AUTHORIZATION, &self.auth_header)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(point.to_line_protocol())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(WriteError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;
    use crate::sensor::FieldValue;

    /// Accepts one connection, hands back the raw request and answers with
    /// `response`, or never answers when it is `None`.
    async fn serve_once(response: Option<&'static str>) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let _ = tx.send(request);

            match response {
                Some(response) => {
                    socket.write_all(response.as_bytes()).await.unwrap();
                    socket.shutdown().await.unwrap();
                }
                None => sleep(Duration::from_secs(30)).await,
            }
        });

        (url, rx)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }

        String::from_utf8(buf).unwrap()
    }

    fn sample_point() -> Point {
        Point::new("room_temp")
            .tag("location", "room1")
            .field("room1_temp_degF", FieldValue::Float(68.0))
    }

    fn config(url: &str) -> InfluxConfig {
        InfluxConfig {
            url: url.to_owned(),
            token: "secret-token".to_owned(),
            org: "home".to_owned(),
            bucket: "sensors & plants".to_owned(),
            timeout: Duration::from_millis(500),
            ready_attempts: 2,
            ready_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_urls_are_derived_from_base() {
        let client = InfluxClient::new(config("http://influxdb:8086/")).unwrap();

        assert_eq!(client.health_url.as_str(), "http://influxdb:8086/health");
        assert_eq!(client.write_url.path(), "/api/v2/write");

        let query: Vec<(String, String)> = client
            .write_url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            query,
            vec![
                ("org".to_owned(), "home".to_owned()),
                ("bucket".to_owned(), "sensors & plants".to_owned()),
                ("precision".to_owned(), "ns".to_owned()),
            ]
        );
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let err = InfluxClient::new(config("not a url")).err().unwrap();
        assert!(matches!(err, ConnectError::InvalidUrl { .. }));
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", config("http://localhost:8086"));
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_wait_until_ready_gives_up_on_unreachable_store() {
        let client = InfluxClient::new(config("http://127.0.0.1:1")).unwrap();

        let err = client.wait_until_ready().await.unwrap_err();
        match err {
            ConnectError::StoreUnavailable { url, attempts } => {
                assert_eq!(url, "http://127.0.0.1:1");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_sends_token_and_line_protocol() {
        let (url, request) = serve_once(Some(
            "HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n",
        ))
        .await;
        let client = InfluxClient::new(config(&url)).unwrap();

        client.write(&sample_point()).await.unwrap();

        let request = request.await.unwrap();
        let (head, body) = request.split_once("\r\n\r\n").unwrap();
        let head = head.to_ascii_lowercase();
        assert!(head.starts_with("post /api/v2/write?org=home&bucket="), "{head}");
        assert!(head.contains("precision=ns"), "{head}");
        assert!(head.contains("\r\nauthorization: token secret-token"), "{head}");
        assert!(head.contains("content-type: text/plain; charset=utf-8"), "{head}");
        assert_eq!(body, "room_temp,location=room1 room1_temp_degF=68");
    }

    #[tokio::test]
    async fn test_write_maps_error_status_to_rejected() {
        let (url, _request) = serve_once(Some(
            "HTTP/1.1 401 Unauthorized\r\ncontent-length: 12\r\nconnection: close\r\n\r\nunauthorized",
        ))
        .await;
        let client = InfluxClient::new(config(&url)).unwrap();

        let err = client.write(&sample_point()).await.unwrap_err();
        match err {
            WriteError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_times_out_on_stalled_store() {
        let (url, _request) = serve_once(None).await;
        let client = InfluxClient::new(config(&url)).unwrap();

        let err = client.write(&sample_point()).await.unwrap_err();
        assert!(matches!(err, WriteError::Timeout(_)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_wait_until_ready_accepts_healthy_store() {
        let (url, request) = serve_once(Some(
            "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
        ))
        .await;
        let client = InfluxClient::new(config(&url)).unwrap();

        client.wait_until_ready().await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("GET /health "), "{request}");
    }
}
