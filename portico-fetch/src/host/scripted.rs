//! Scripted in-memory transport.
//!
//! Rules match on method and a URL substring; the longest matching
//! substring wins, so `/portal/form` shadows `/portal`.
//! Each rule replays its responses in order and keeps repeating the last
//! one. Unmatched requests get a 404. Every request is recorded.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::http::{HttpMethod, HttpTransport, PortalRequest, PortalResponse};
use crate::error::HttpError;

type Reply = Result<PortalResponse, String>;

#[derive(Debug)]
struct Rule {
    method: HttpMethod,
    url_contains: String,
    replies: VecDeque<Reply>,
}

/// Transport that answers from a script instead of the network.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    rules: Mutex<Vec<Rule>>,
    log: Mutex<Vec<PortalRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    fn rules(&self) -> MutexGuard<'_, Vec<Rule>> {
        self.rules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self) -> MutexGuard<'_, Vec<PortalRequest>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, method: HttpMethod, url_contains: &str, reply: Reply) {
        let mut rules = self.rules();
        if let Some(rule) = rules
            .iter_mut()
            .find(|r| r.method == method && r.url_contains == url_contains)
        {
            rule.replies.push_back(reply);
        } else {
            rules.push(Rule {
                method,
                url_contains: url_contains.to_string(),
                replies: VecDeque::from([reply]),
            });
        }
    }

    /// Queues a response for GETs whose URL contains `url_contains`.
    pub fn on_get(&self, url_contains: &str, response: PortalResponse) -> &Self {
        self.push(HttpMethod::Get, url_contains, Ok(response));
        self
    }

    /// Queues a response for POSTs whose URL contains `url_contains`.
    pub fn on_post(&self, url_contains: &str, response: PortalResponse) -> &Self {
        self.push(HttpMethod::Post, url_contains, Ok(response));
        self
    }

    /// Queues a connection failure.
    pub fn fail(&self, method: HttpMethod, url_contains: &str, message: &str) -> &Self {
        self.push(method, url_contains, Err(message.to_string()));
        self
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<PortalRequest> {
        self.log().clone()
    }

    /// Counts requests with the given method whose URL contains `url_contains`.
    pub fn count(&self, method: HttpMethod, url_contains: &str) -> usize {
        self.log()
            .iter()
            .filter(|r| r.method == method && r.url.contains(url_contains))
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: PortalRequest) -> Result<PortalResponse, HttpError> {
        let reply = {
            let mut rules = self.rules();
            rules
                .iter_mut()
                .filter(|r| r.method == request.method && request.url.contains(&r.url_contains))
                .max_by_key(|r| r.url_contains.len())
                .and_then(|rule| {
                    if rule.replies.len() > 1 {
                        rule.replies.pop_front()
                    } else {
                        rule.replies.front().cloned()
                    }
                })
        };
        self.log().push(request);

        match reply {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(HttpError::Transport(message)),
            None => Ok(PortalResponse::new(404).with_body("not scripted")),
        }
    }
}
