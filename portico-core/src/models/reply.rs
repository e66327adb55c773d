//! Attachments and completion replies.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// A file sent along with a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name.
    pub file_name: String,
    /// MIME type, e.g. `application/pdf`.
    pub mime_type: String,
    /// Raw file contents.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment.
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Encodes the file as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Text extracted from one completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiReply {
    /// The extracted answer.
    pub text: String,
    /// Description of the candidate endpoint that answered.
    pub source_endpoint_description: String,
    /// Wall time of the whole completion call, in milliseconds.
    pub latency_ms: u64,
}

/// Reply handed back to the chat surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// The answer text.
    pub reply: String,
    /// Label shown next to the answer.
    pub model_label: String,
}
