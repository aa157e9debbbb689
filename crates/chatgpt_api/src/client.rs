use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};

use chat_transport::{ConversationReply, ConversationRequest, Cookie, TokenUsage, TransportKind};

use crate::auth::{session_from_body, Session};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::headers::{authorized_headers, base_headers, conversation_headers, into_header_map};
use crate::payload::ConversationPayload;
use crate::sentinel::{attach_proof, requirements_from_body, Requirements};
use crate::sse::{SnapshotAccumulator, SseStreamParser};
use crate::url::{auth_session_url, conversation_url, requirements_url};

/// Direct backend-api client for the fast transport.
///
/// The chain is strictly sequential: authenticate, negotiate
/// requirements, solve the challenge when flagged, then stream the
/// conversation. Every call returns a typed failure instead of retrying;
/// fallback policy belongs to the orchestrator.
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(ApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Exchange the cookie set for a bearer credential. No retry: a
    /// failure means the cookies must be re-derived externally.
    pub async fn authenticate(&self, cookies: &[Cookie]) -> Result<Session, ApiError> {
        let endpoint = auth_session_url(&self.config.base_url);
        log::debug!("auth: GET {endpoint}");
        let headers = into_header_map(base_headers(&self.config, cookies))?;
        let response = self
            .http
            .get(endpoint)
            .headers(headers)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|error| self.map_transport_error(error))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(error_for_status(status, &body));
        }
        let session = session_from_body(&body)?;
        log::debug!(
            "auth: got access token ({} chars)",
            session.access_token.len()
        );
        Ok(session)
    }

    /// Fetch the per-request permission slip from the sentinel endpoint.
    /// Returns the requirements token plus any embedded challenge; the
    /// proof is attached separately.
    pub async fn negotiate(
        &self,
        session: &Session,
        cookies: &[Cookie],
    ) -> Result<Requirements, ApiError> {
        let endpoint = requirements_url(&self.config.base_url);
        log::debug!("sentinel: POST {endpoint}");
        let headers = into_header_map(authorized_headers(
            &self.config,
            cookies,
            &session.access_token,
        ))?;
        let response = self
            .http
            .post(endpoint)
            .headers(headers)
            .json(&serde_json::json!({}))
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|error| self.map_transport_error(error))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(error_for_status(status, &body));
        }
        let requirements = requirements_from_body(&body)?;
        log::debug!(
            "sentinel: persona={:?} pow_required={}",
            requirements.persona,
            requirements
                .challenge
                .as_ref()
                .is_some_and(|challenge| challenge.required)
        );
        Ok(requirements)
    }

    /// Negotiate and, when flagged, solve the proof-of-work challenge.
    ///
    /// The solver is CPU-bound and synchronous; it blocks the fast path
    /// until it finds a solution or exhausts its ceiling.
    pub async fn prepare_requirements(
        &self,
        session: &Session,
        cookies: &[Cookie],
    ) -> Result<Requirements, ApiError> {
        let requirements = self.negotiate(session, cookies).await?;
        Ok(attach_proof(
            requirements,
            &self.config.user_agent,
            self.config.pow_max_iterations,
        ))
    }

    /// Post the conversation request and consume its event stream.
    pub async fn converse(
        &self,
        session: &Session,
        requirements: Option<&Requirements>,
        cookies: &[Cookie],
        request: &ConversationRequest,
        model_slug: &str,
        timeout: Duration,
    ) -> Result<ConversationReply, ApiError> {
        let started = Instant::now();
        let endpoint = conversation_url(&self.config.base_url);
        log::debug!(
            "conversation: POST model={model_slug}, prompt={} chars",
            request.prompt.len()
        );

        let payload = ConversationPayload::new(
            &request.prompt,
            model_slug,
            request.conversation_id.as_deref(),
            request.parent_message_id.as_deref(),
        );
        let headers = into_header_map(conversation_headers(
            &self.config,
            cookies,
            &session.access_token,
            requirements,
        ))?;
        // The deadline covers the whole exchange, header wait included: a
        // server that accepts the connection and stalls before responding
        // must still surface as a timeout.
        let mut parser = SseStreamParser::default();
        let mut accumulator = SnapshotAccumulator::default();
        let drained = tokio::time::timeout(timeout, async {
            let response = self
                .http
                .post(endpoint)
                .headers(headers)
                .json(&payload)
                .send()
                .await
                .map_err(|error| self.map_transport_error(error))?;

            // Status policy runs before any stream consumption.
            let status = response.status();
            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                return Err(match status {
                    StatusCode::UNAUTHORIZED => ApiError::AuthExpired,
                    StatusCode::FORBIDDEN => ApiError::ChallengeRejected(ApiError::excerpt(&body)),
                    StatusCode::TOO_MANY_REQUESTS => {
                        ApiError::RateLimited("wait before trying again".to_string())
                    }
                    other => ApiError::Status(other.as_u16(), ApiError::excerpt(&body)),
                });
            }

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(ApiError::from)?;
                for event in parser.feed(&chunk) {
                    accumulator.apply(event).map_err(ApiError::Upstream)?;
                    if accumulator.done {
                        return Ok(());
                    }
                }
            }
            Ok(())
        })
        .await;

        let truncated = match drained {
            Ok(Ok(())) => false,
            Ok(Err(error)) => return Err(error),
            Err(_elapsed) => {
                if accumulator.text.is_empty() {
                    return Err(ApiError::Timeout(timeout.as_secs()));
                }
                log::warn!("conversation: timed out with partial text; returning truncated reply");
                true
            }
        };

        reply_from_accumulator(
            &request.prompt,
            accumulator,
            request.conversation_id.as_deref(),
            started.elapsed().as_secs(),
            truncated,
        )
    }

    /// Full fast-path chain: authenticate, prepare requirements, converse.
    pub async fn send_prompt(
        &self,
        cookies: &[Cookie],
        request: &ConversationRequest,
        model_slug: &str,
        timeout: Duration,
    ) -> Result<ConversationReply, ApiError> {
        let session = self.authenticate(cookies).await?;
        let requirements = self.prepare_requirements(&session, cookies).await?;
        self.converse(
            &session,
            Some(&requirements),
            cookies,
            request,
            model_slug,
            timeout,
        )
        .await
    }

    fn map_transport_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.config.request_timeout.as_secs())
        } else if error.is_connect() {
            ApiError::Connection(error.to_string())
        } else {
            ApiError::Request(error)
        }
    }
}

fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::AuthExpired,
        StatusCode::TOO_MANY_REQUESTS => {
            ApiError::RateLimited("wait before trying again".to_string())
        }
        other => ApiError::Status(other.as_u16(), ApiError::excerpt(body)),
    }
}

/// Assemble the normalized reply from the drained stream state.
fn reply_from_accumulator(
    prompt: &str,
    accumulator: SnapshotAccumulator,
    requested_conversation_id: Option<&str>,
    total_time_seconds: u64,
    truncated: bool,
) -> Result<ConversationReply, ApiError> {
    if accumulator.text.is_empty() {
        return Err(ApiError::EmptyResponse);
    }

    let conversation_id = requested_conversation_id
        .map(ToString::to_string)
        .or(accumulator.conversation_id);
    let tokens = TokenUsage::estimate(prompt, &accumulator.text);

    Ok(ConversationReply {
        text: accumulator.text,
        conversation_id,
        thinking_time_seconds: accumulator.thinking_seconds.filter(|seconds| *seconds > 0),
        total_time_seconds,
        tokens,
        transport: TransportKind::Api,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use chat_transport::TransportKind;

    use super::{error_for_status, reply_from_accumulator};
    use crate::error::ApiError;
    use crate::sse::{SnapshotAccumulator, SseStreamParser};

    fn drain(body: &str) -> SnapshotAccumulator {
        let mut accumulator = SnapshotAccumulator::default();
        for event in SseStreamParser::parse_all(body) {
            accumulator
                .apply(event)
                .expect("fixture frames should not abort");
        }
        accumulator
    }

    #[test]
    fn single_frame_stream_assembles_the_expected_reply() {
        let accumulator = drain(concat!(
            "data: {\"message\":{\"content\":{\"parts\":[\"4\"]}}}\n",
            "data: [DONE]\n",
        ));
        assert!(accumulator.done);

        let reply = reply_from_accumulator("2+2", accumulator, None, 1, false)
            .expect("non-empty stream should succeed");
        assert_eq!(reply.text, "4");
        assert_eq!(reply.tokens.prompt, 1);
        assert_eq!(reply.tokens.response, 1);
        assert_eq!(reply.tokens.total, 2);
        assert_eq!(reply.transport, TransportKind::Api);
        assert!(!reply.truncated);
        assert_eq!(reply.thinking_time_seconds, None);
    }

    #[test]
    fn empty_completed_stream_is_empty_response() {
        let accumulator = drain("data: [DONE]\n");
        let error = reply_from_accumulator("2+2", accumulator, None, 1, false)
            .expect_err("empty stream must fail");
        assert!(matches!(error, ApiError::EmptyResponse));
    }

    #[test]
    fn truncated_partial_text_is_a_flagged_success() {
        let accumulator = drain("data: {\"message\":{\"content\":{\"parts\":[\"partial an\"]}}}\n");
        assert!(!accumulator.done);

        let reply = reply_from_accumulator("q", accumulator, None, 30, true)
            .expect("partial text should still succeed");
        assert_eq!(reply.text, "partial an");
        assert!(reply.truncated);
    }

    #[test]
    fn requested_conversation_id_wins_over_streamed_one() {
        let accumulator = drain(concat!(
            "data: {\"conversation_id\":\"conv-new\",\"message\":{\"content\":{\"parts\":[\"x\"]}}}\n",
            "data: [DONE]\n",
        ));
        let reply = reply_from_accumulator("q", accumulator, Some("conv-requested"), 1, false)
            .expect("should succeed");
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-requested"));
    }

    #[test]
    fn streamed_conversation_id_used_for_fresh_threads() {
        let accumulator = drain(concat!(
            "data: {\"conversation_id\":\"conv-new\",\"message\":{\"content\":{\"parts\":[\"x\"]}}}\n",
            "data: [DONE]\n",
        ));
        let reply = reply_from_accumulator("q", accumulator, None, 1, false)
            .expect("should succeed");
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-new"));
    }

    #[test]
    fn non_success_statuses_map_to_typed_failures() {
        assert!(matches!(
            error_for_status(reqwest::StatusCode::UNAUTHORIZED, ""),
            ApiError::AuthExpired
        ));
        assert!(matches!(
            error_for_status(reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited(_)
        ));
        assert!(matches!(
            error_for_status(reqwest::StatusCode::BAD_GATEWAY, "upstream sad"),
            ApiError::Status(502, _)
        ));
    }
}
