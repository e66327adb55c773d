//! Completion endpoint candidates.
//!
//! The portal exposes its completion logic under several paths whose
//! availability differs per deployment. Each candidate pairs a URL with a
//! payload encoding; the orchestrator tries them by ascending priority.

use portico_core::{Attachment, Session};
use portico_fetch::{FetchError, HttpMethod, PortalRequest, RequestBody};
use serde_json::{Map, Value, json};

use super::descriptor::PortalEndpoints;

/// Header carrying the CSRF token.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

// ============================================================================
// Completion Request
// ============================================================================

/// Everything a candidate needs to build its request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// User prompt.
    pub message: &'a str,
    /// Optional file.
    pub file: Option<&'a Attachment>,
    /// Authenticated session.
    pub session: &'a Session,
    /// CSRF token from the form page.
    pub csrf_token: Option<&'a str>,
    /// API key, configured or discovered.
    pub api_key: Option<&'a str>,
    /// Form to run.
    pub form_id: &'a str,
}

impl CompletionRequest<'_> {
    /// Rejects blank prompts and form ids.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.message.trim().is_empty() {
            return Err(FetchError::Validation("message is empty".to_string()));
        }
        if self.form_id.trim().is_empty() {
            return Err(FetchError::Validation("form id is empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Payload Encoding
// ============================================================================

/// How a candidate encodes the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// Form fields plus the file as a data URI.
    FormUpload,
    /// Form fields; the API key also goes in the query string.
    FormSubmit,
    /// JSON body for the execute endpoint.
    JsonExecute,
    /// JSON body for the versioned run endpoint.
    JsonRun,
}

impl PayloadEncoding {
    /// Short name used in operation keys.
    pub fn slug(self) -> &'static str {
        match self {
            Self::FormUpload => "upload",
            Self::FormSubmit => "submit",
            Self::JsonExecute => "execute",
            Self::JsonRun => "run",
        }
    }

    /// Builds the request body.
    pub fn build(self, request: &CompletionRequest<'_>) -> RequestBody {
        match self {
            Self::FormUpload => RequestBody::Form(upload_fields(request)),
            Self::FormSubmit => RequestBody::Form(submit_fields(request)),
            Self::JsonExecute => RequestBody::Json(execute_body(request)),
            Self::JsonRun => RequestBody::Json(run_body(request)),
        }
    }
}

fn field(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

fn upload_fields(request: &CompletionRequest<'_>) -> Vec<(String, String)> {
    let mut fields = vec![
        field("id", request.form_id),
        field("prompt", request.message),
        field("question", request.message),
    ];
    if let Some(file) = request.file {
        fields.push(field("fileName", &file.file_name));
        fields.push(field("fileType", &file.mime_type));
        fields.push(field("file", &file.to_data_uri()));
    }
    if let Some(token) = request.csrf_token {
        fields.push(field("_token", token));
    }
    fields
}

fn submit_fields(request: &CompletionRequest<'_>) -> Vec<(String, String)> {
    let mut fields = vec![field("id", request.form_id), field("input", request.message)];
    if let Some(file) = request.file {
        fields.push(field("fileName", &file.file_name));
        fields.push(field("file", &file.to_data_uri()));
    }
    if let Some(token) = request.csrf_token {
        fields.push(field("_token", token));
    }
    if let Some(key) = request.api_key {
        fields.push(field("apikey", key));
    }
    fields
}

fn file_json(file: &Attachment) -> Value {
    json!({
        "name": file.file_name,
        "mimeType": file.mime_type,
        "data": file.to_data_uri(),
    })
}

fn execute_body(request: &CompletionRequest<'_>) -> Value {
    let mut body = Map::new();
    body.insert("formId".into(), json!(request.form_id));
    body.insert("input".into(), json!(request.message));
    if let Some(file) = request.file {
        body.insert("file".into(), file_json(file));
    }
    if let Some(token) = request.csrf_token {
        body.insert("_token".into(), json!(token));
    }
    Value::Object(body)
}

fn run_body(request: &CompletionRequest<'_>) -> Value {
    let attachments: Vec<Value> = request.file.map(file_json).into_iter().collect();
    json!({
        "inputs": { "prompt": request.message },
        "attachments": attachments,
        "stream": false,
    })
}

// ============================================================================
// Candidate Endpoint
// ============================================================================

/// One completion endpoint to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEndpoint {
    /// Lower runs first.
    pub priority: u32,
    /// Absolute URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Body encoding.
    pub payload: PayloadEncoding,
    /// Human-readable description for logs and replies.
    pub description: &'static str,
    /// Attempts granted by the retry engine.
    pub retry_attempts: u32,
    /// Breaker key.
    pub operation_key: String,
}

impl CandidateEndpoint {
    /// Builds the HTTP request for this candidate.
    pub fn to_request(&self, request: &CompletionRequest<'_>) -> PortalRequest {
        let mut out = PortalRequest::post(self.url.as_str())
            .cookie_header(&request.session.cookie_header)
            .header("Accept", "application/json, text/plain, */*")
            .header("X-Requested-With", "XMLHttpRequest");
        out.method = self.method;
        if let Some(token) = request.csrf_token {
            out = out.header(CSRF_HEADER, token);
        }
        if let Some(key) = request.api_key {
            out = out.header(API_KEY_HEADER, key);
        }
        out.body = self.payload.build(request);
        out
    }

    /// Returns the `Content-Type` this candidate sends.
    pub fn content_type(&self) -> &'static str {
        match self.payload {
            PayloadEncoding::FormUpload | PayloadEncoding::FormSubmit => {
                "application/x-www-form-urlencoded"
            }
            PayloadEncoding::JsonExecute | PayloadEncoding::JsonRun => "application/json",
        }
    }
}

/// Builds the four candidates in priority order.
pub fn build_candidates(
    endpoints: &PortalEndpoints,
    request: &CompletionRequest<'_>,
    retry_attempts: u32,
) -> Result<Vec<CandidateEndpoint>, FetchError> {
    let host = endpoints.host();
    let candidate = |priority, url, payload: PayloadEncoding, description| CandidateEndpoint {
        priority,
        url,
        method: HttpMethod::Post,
        payload,
        description,
        retry_attempts,
        operation_key: format!("portal.complete.{}:{host}", payload.slug()),
    };

    let mut candidates = vec![
        candidate(
            1,
            endpoints.upload_url(request.form_id)?,
            PayloadEncoding::FormUpload,
            "form upload",
        ),
        candidate(
            2,
            endpoints.submit_url(request.form_id, request.api_key)?,
            PayloadEncoding::FormSubmit,
            "form submit with API key",
        ),
        candidate(
            3,
            endpoints.execute_url()?,
            PayloadEncoding::JsonExecute,
            "JSON form execute",
        ),
        candidate(
            4,
            endpoints.run_url(request.form_id)?,
            PayloadEncoding::JsonRun,
            "JSON v1 form run",
        ),
    ];
    candidates.sort_by_key(|c| c.priority);
    Ok(candidates)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::descriptor::PortalProfile;

    fn session() -> Session {
        Session::new("JSESSIONID=s; tenantUuid=t", "alice", chrono::Utc::now())
    }

    fn endpoints() -> PortalEndpoints {
        PortalProfile::default().endpoints("https://h.test").unwrap()
    }

    #[test]
    fn test_candidates_in_priority_order() {
        let session = session();
        let file = Attachment::new("a.txt", "text/plain", b"hi".to_vec());
        let request = CompletionRequest {
            message: "hello",
            file: Some(&file),
            session: &session,
            csrf_token: Some("tok"),
            api_key: Some("key"),
            form_id: "7",
        };

        let candidates = build_candidates(&endpoints(), &request, 2).unwrap();
        let priorities: Vec<u32> = candidates.iter().map(|c| c.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4]);
        assert!(candidates[1].url.ends_with("submit?id=7&apikey=key"));
        assert_eq!(candidates[2].operation_key, "portal.complete.execute:h.test");
        assert!(candidates.iter().all(|c| c.retry_attempts == 2));
    }

    #[test]
    fn test_upload_request() {
        let session = session();
        let file = Attachment::new("a.txt", "text/plain", b"hi".to_vec());
        let request = CompletionRequest {
            message: "hello",
            file: Some(&file),
            session: &session,
            csrf_token: Some("tok"),
            api_key: None,
            form_id: "7",
        };
        let candidates = build_candidates(&endpoints(), &request, 1).unwrap();
        let http = candidates[0].to_request(&request);

        assert_eq!(http.method, HttpMethod::Post);
        assert_eq!(http.header_value("Cookie"), Some("JSESSIONID=s; tenantUuid=t"));
        assert_eq!(http.header_value(CSRF_HEADER), Some("tok"));
        assert_eq!(http.header_value(API_KEY_HEADER), None);
        assert_eq!(http.body.form_field("prompt"), Some("hello"));
        assert_eq!(http.body.form_field("_token"), Some("tok"));
        assert_eq!(http.body.form_field("file"), Some("data:text/plain;base64,aGk="));
        assert_eq!(http.body.content_type(), Some(candidates[0].content_type()));
    }

    #[test]
    fn test_json_bodies() {
        let session = session();
        let request = CompletionRequest {
            message: "hello",
            file: None,
            session: &session,
            csrf_token: None,
            api_key: Some("key"),
            form_id: "7",
        };

        match PayloadEncoding::JsonExecute.build(&request) {
            RequestBody::Json(v) => {
                assert_eq!(v["formId"], "7");
                assert_eq!(v["input"], "hello");
                assert!(v.get("_token").is_none());
            }
            other => panic!("unexpected body {other:?}"),
        }
        match PayloadEncoding::JsonRun.build(&request) {
            RequestBody::Json(v) => {
                assert_eq!(v["inputs"]["prompt"], "hello");
                assert_eq!(v["attachments"], json!([]));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_validate() {
        let session = session();
        let mut request = CompletionRequest {
            message: "  ",
            file: None,
            session: &session,
            csrf_token: None,
            api_key: None,
            form_id: "7",
        };
        assert!(matches!(request.validate(), Err(FetchError::Validation(_))));
        request.message = "hi";
        request.form_id = "";
        assert!(matches!(request.validate(), Err(FetchError::Validation(_))));
    }
}
