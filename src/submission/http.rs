//! HTTP transport for the submission service

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::{Error, ServerResult, SubmissionRequest, Submitter};
use crate::config::ClientConfig;

/// Submits results to the backend over HTTP
#[derive(Clone, Debug)]
pub struct HttpSubmitter {
    client: Client,
    base: Url,
    config: ClientConfig,
}

impl HttpSubmitter {
    /// Builds a submitter for `config`
    ///
    /// # Errors
    ///
    /// * `Error::InvalidUrl` if the base URL does not parse or cannot have
    ///   path segments appended
    /// * `Error::Http` if the HTTP client cannot be constructed
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let base =
            Url::parse(&config.base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidUrl(config.base_url));
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// Endpoint a quiz's answers are posted to
    ///
    /// The quiz id is appended as a single percent-encoded path segment.
    pub fn endpoint(&self, quiz_id: &str) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["quizzes", quiz_id, "submit"]);
        }
        url
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, request: &SubmissionRequest) -> Result<ServerResult, Error> {
        let mut builder = self
            .client
            .post(self.endpoint(&request.quiz_id))
            .json(request);
        if let Some(token) = &self.config.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status().as_u16()));
        }

        Ok(response.json::<ServerResult>().await?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        sync::oneshot,
    };

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            quiz_id: "quiz-1".to_string(),
            answers: vec![],
        }
    }

    /// Reads one request, headers and body, and returns it as text
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&request).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        line.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&request).into_owned()
    }

    /// Serves `response` to the first connection and reports the request
    async fn serve_once(response: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (sent, received) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            sent.send(request).ok();
        });

        (format!("http://{addr}/v1"), received)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let submitter = HttpSubmitter::new(ClientConfig::new("https://api.example.com/v1/")).unwrap();
        assert_eq!(
            submitter.endpoint("quiz-7").as_str(),
            "https://api.example.com/v1/quizzes/quiz-7/submit"
        );
    }

    #[test]
    fn test_endpoint_encodes_quiz_id_as_one_segment() {
        let submitter = HttpSubmitter::new(ClientConfig::new("https://api.x/v1")).unwrap();
        let url = submitter.endpoint("../admin?x=1#");

        assert_eq!(url.host_str(), Some("api.x"));
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], "v1");
        assert_eq!(segments[1], "quizzes");
        assert_eq!(segments[3], "submit");
        assert!(!segments[2].contains('/'));
        assert!(!segments[2].contains('?'));
        assert!(!segments[2].contains('#'));
    }

    #[test]
    fn test_unusable_base_url_is_rejected() {
        assert!(matches!(
            HttpSubmitter::new(ClientConfig::new("not a url")),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpSubmitter::new(ClientConfig::new("mailto:quiz@example.com")),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        let submitter = HttpSubmitter::new(
            ClientConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let error = submitter.submit(&request()).await.unwrap_err();

        assert!(matches!(error, Error::Http(_) | Error::Timeout));
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let (base, _) = serve_once(http_response("500 Internal Server Error", "")).await;
        let submitter = HttpSubmitter::new(ClientConfig::new(base)).unwrap();

        assert_eq!(
            submitter.submit(&request()).await,
            Err(Error::HttpStatus(500))
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_decode_error() {
        let (base, _) = serve_once(http_response("200 OK", r#"{"unexpected":1}"#)).await;
        let submitter = HttpSubmitter::new(ClientConfig::new(base)).unwrap();

        assert!(matches!(
            submitter.submit(&request()).await,
            Err(Error::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_accepted_submission() {
        let body = r#"{"totalQuestions":3,"correctCount":2,"score":20,"percentage":66.7,"completedAt":"2026-01-02T03:04:05Z","submissionId":"sub-9"}"#;
        let (base, received) = serve_once(http_response("200 OK", body)).await;
        let submitter = HttpSubmitter::new(ClientConfig::new(base).with_token("secret")).unwrap();

        let result = submitter.submit(&request()).await.unwrap();
        assert_eq!(result.correct_count, 2);
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.submission_id, "sub-9");

        let sent = received.await.unwrap();
        assert!(sent.starts_with("POST /v1/quizzes/quiz-1/submit "));
        assert!(sent.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(sent.contains(r#""quizId":"quiz-1""#));
    }
}
