use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use missionflow_core::api::{
    GenerationBackend, RemoteError, StreamRequest, StructuredRequest, TextStream,
};

use super::sse::{extract_textish, BodyDecoder, Decoded};

const BODY_PREVIEW_LIMIT: usize = 512;

/// Generation endpoint reached over HTTP.
///
/// Streaming calls accept SSE (`data:` lines, `data: [DONE]` terminator) or a
/// plain chunked text body.
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGenerationBackend {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response, RemoteError> {
        let mut req = self.client.post(&self.endpoint).json(payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(request_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body: String = body.trim_end().chars().take(BODY_PREVIEW_LIMIT).collect();
            tracing::debug!(status = status.as_u16(), endpoint = %self.endpoint, "non-2xx response");
            return Err(RemoteError::from_message(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(resp)
    }
}

/// Connection-level failures are worth retrying; anything else is reported
/// as-is and classified by its message.
fn request_error(err: reqwest::Error) -> RemoteError {
    if err.is_connect() || err.is_timeout() {
        RemoteError::Transient(format!("service unavailable: {err}"))
    } else {
        RemoteError::from_message(format!("request failed: {err}"))
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn stream(&self, request: &StreamRequest) -> Result<TextStream, RemoteError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": true,
        });
        let resp = self.post(&payload).await?;

        let stream = async_stream::stream! {
            let mut body = resp.bytes_stream();
            let mut decoder = BodyDecoder::default();
            while let Some(chunk) = body.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(RemoteError::from_message(format!("stream read failed: {e}")));
                        return;
                    }
                };
                for piece in decoder.push(&bytes) {
                    match piece {
                        Decoded::Text(t) => yield Ok(t),
                        Decoded::Error(m) => {
                            yield Err(RemoteError::from_message(m));
                            return;
                        }
                        Decoded::Done => return,
                    }
                }
            }
            for piece in decoder.finish() {
                match piece {
                    Decoded::Text(t) => yield Ok(t),
                    Decoded::Error(m) => {
                        yield Err(RemoteError::from_message(m));
                        return;
                    }
                    Decoded::Done => return,
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn generate(&self, request: &StructuredRequest) -> Result<String, RemoteError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "system": request.system,
            "schema": request.schema,
            "stream": false,
        });
        let resp = self.post(&payload).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| RemoteError::from_message(format!("read failed: {e}")))?;

        // Try to interpret JSON responses, otherwise treat as plain text.
        let text = match serde_json::from_slice::<Value>(&body) {
            Ok(v) => extract_textish(&v).unwrap_or_else(|| v.to_string()),
            Err(_) => String::from_utf8_lossy(&body).to_string(),
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    fn stream_request(prompt: &str) -> StreamRequest {
        StreamRequest {
            model: "m1".to_string(),
            prompt: prompt.to_string(),
        }
    }

    async fn drain(stream: TextStream) -> Result<Vec<String>, RemoteError> {
        stream.try_collect().await
    }

    #[tokio::test]
    async fn streams_sse_fragments_until_done() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/generate")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({
                "model": "m1",
                "prompt": "hello",
                "stream": true,
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: {\"text\": \"Hel\"}\n\n\
                 data: {\"choices\": [{\"delta\": {\"content\": \"lo\"}}]}\n\n\
                 data: [DONE]\n\n\
                 data: {\"text\": \"ignored\"}\n\n",
            )
            .create_async()
            .await;

        let backend = HttpGenerationBackend::new(
            format!("{}/v1/generate", server.url()),
            Some("secret".to_string()),
        )
        .unwrap();
        let stream = backend.stream(&stream_request("hello")).await.unwrap();
        assert_eq!(drain(stream).await.unwrap(), vec!["Hel", "lo"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn plain_body_is_streamed_raw() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("just text\nacross lines")
            .create_async()
            .await;

        let backend = HttpGenerationBackend::new(server.url(), None).unwrap();
        let stream = backend.stream(&stream_request("p")).await.unwrap();
        let text = drain(stream).await.unwrap().concat();
        assert_eq!(text, "just text\nacross lines");
    }

    #[tokio::test]
    async fn non_success_status_is_classified() {
        let mut server = mockito::Server::new_async().await;
        let _unavailable = server
            .mock("POST", "/busy")
            .with_status(503)
            .with_body("try later")
            .create_async()
            .await;
        let _forbidden = server
            .mock("POST", "/denied")
            .with_status(403)
            .with_body("no access")
            .create_async()
            .await;

        let busy = HttpGenerationBackend::new(format!("{}/busy", server.url()), None).unwrap();
        let err = busy.stream(&stream_request("p")).await.err().unwrap();
        assert_eq!(err, RemoteError::Transient("HTTP 503: try later".to_string()));
        assert!(err.is_retryable());

        let denied = HttpGenerationBackend::new(format!("{}/denied", server.url()), None).unwrap();
        let err = denied.stream(&stream_request("p")).await.err().unwrap();
        assert_eq!(err, RemoteError::Fatal("HTTP 403: no access".to_string()));
    }

    #[tokio::test]
    async fn error_event_mid_stream_ends_with_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                "data: {\"text\": \"partial\"}\n\ndata: {\"error\": {\"message\": \"model overloaded\"}}\n\n",
            )
            .create_async()
            .await;

        let backend = HttpGenerationBackend::new(server.url(), None).unwrap();
        let stream = backend.stream(&stream_request("p")).await.unwrap();
        let items: Vec<Result<String, RemoteError>> = stream.collect().await;
        assert_eq!(
            items,
            vec![
                Ok("partial".to_string()),
                Err(RemoteError::Transient("model overloaded".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn generate_extracts_text_and_sends_schema() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "system": "be brief",
                "schema": {"type": "object"},
                "stream": false,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"content": "{\"ok\": true}"}}]}"#)
            .create_async()
            .await;

        let backend = HttpGenerationBackend::new(server.url(), None).unwrap();
        let text = backend
            .generate(&StructuredRequest {
                model: "m1".to_string(),
                prompt: "p".to_string(),
                system: Some("be brief".to_string()),
                schema: Some(json!({"type": "object"})),
            })
            .await
            .unwrap();
        assert_eq!(text, r#"{"ok": true}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transient() {
        // Port 9 (discard) is not expected to accept connections.
        let backend = HttpGenerationBackend::new("http://127.0.0.1:9/", None).unwrap();
        let err = backend.stream(&stream_request("p")).await.err().unwrap();
        assert!(err.is_retryable(), "{err:?}");
    }
}
