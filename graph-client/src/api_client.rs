use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::config::Config;
use crate::credentials::AccessToken;
use crate::error::{classify, ErrorContext, ErrorKind, GraphError, Operation};
use crate::object::{Attachment, Connection, GraphObject, ObjectBatch};
use crate::retry::RetryPolicy;

/// API client for a REST-style social graph service
///
/// Reads are GET requests, writes are form-encoded POSTs. The access token is
/// attached to every request as the `access_token` parameter.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    access_token: Option<AccessToken>,
    retry: RetryPolicy,
}

impl GraphClient {
    /// Create a client acting on behalf of `access_token`
    pub fn new(config: &Config, access_token: AccessToken) -> Result<Self> {
        Self::build(config, Some(access_token))
    }

    /// Create a client without credentials; only public reads succeed
    pub fn anonymous(config: &Config) -> Result<Self> {
        Self::build(config, None)
    }

    fn build(config: &Config, access_token: Option<AccessToken>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            retry: config.retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Fetch a single object by identifier or alias (e.g. "me")
    pub async fn fetch_object(&self, identifier: &str) -> Result<GraphObject, GraphError> {
        let op = Operation::FetchObject;
        let path = object_path(op, identifier, &[identifier])?;
        let body = self.get(op, identifier, &path, Vec::new()).await?;
        decode_object(op, identifier, &body)
    }

    /// Fetch several objects in one request
    ///
    /// Identifiers that are malformed, unknown or not visible to this client
    /// are reported in [`ObjectBatch::failures`] rather than failing the
    /// whole call. Transient failures still propagate.
    pub async fn fetch_objects<I, S>(&self, identifiers: I) -> Result<ObjectBatch, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let op = Operation::FetchObjects;
        let (ids, invalid): (BTreeSet<String>, BTreeSet<String>) = identifiers
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .partition(|id| !id.is_empty() && !id.contains(','));

        let mut batch = if ids.is_empty() {
            ObjectBatch::default()
        } else {
            self.fetch_batch(op, ids).await?
        };

        for id in invalid {
            let err = GraphError::validation(op, &id, "identifier cannot be empty or contain ','");
            batch.failures.insert(id, err);
        }
        Ok(batch)
    }

    async fn fetch_batch(&self, op: Operation, ids: BTreeSet<String>) -> Result<ObjectBatch, GraphError> {
        let joined = ids.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        match self.get(op, &joined, "", vec![("ids", joined.clone())]).await {
            Ok(body) => split_batch(op, &joined, ids, &body),
            // The service rejects the whole batch when any alias is unknown or private
            Err(err) if err.is_not_found() || err.is_auth() => {
                tracing::debug!(
                    "Batch fetch of [{}] failed ({:?}), fetching individually",
                    joined,
                    err.kind()
                );
                Ok(self.fetch_individually(ids).await)
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_individually(&self, ids: BTreeSet<String>) -> ObjectBatch {
        let mut batch = ObjectBatch::default();
        for id in ids {
            match self.fetch_object(&id).await {
                Ok(object) => {
                    batch.objects.insert(id, object);
                }
                Err(err) => {
                    batch.failures.insert(id, err);
                }
            }
        }
        batch
    }

    /// Fetch a named connection of an object, e.g. ("lukeshepard", "likes")
    pub async fn fetch_connection(
        &self,
        identifier: &str,
        relation: &str,
    ) -> Result<Connection, GraphError> {
        let op = Operation::FetchConnection;
        let target = format!("{}/{}", identifier, relation);
        let path = object_path(op, &target, &[identifier, relation])?;
        let body = self.get(op, &target, &path, Vec::new()).await?;
        decode_connection(op, &target, &body)
    }

    /// Post a message to the authenticated user's feed
    pub async fn publish_post(
        &self,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<GraphObject, GraphError> {
        self.publish_post_to("me", message, attachment).await
    }

    /// Post a message to the feed of `profile_id`
    pub async fn publish_post_to(
        &self,
        profile_id: &str,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<GraphObject, GraphError> {
        let op = Operation::PublishPost;
        let target = format!("{}/feed", profile_id);
        let path = object_path(op, &target, &[profile_id, "feed"])?;

        if message.trim().is_empty() {
            return Err(GraphError::validation(op, &target, "message cannot be empty"));
        }

        let mut params = vec![("message", message.to_string())];
        if let Some(attachment) = attachment {
            if let Some(key) = attachment.reserved_key() {
                return Err(GraphError::validation(
                    op,
                    &target,
                    format!("attachment may not set reserved field '{}'", key),
                ));
            }
            params.extend(attachment.iter().map(|(k, v)| (k, v.to_string())));
        }

        let body = self.post(op, &target, &path, params).await?;
        decode_created(op, &target, &body)
    }

    /// Comment on an existing object
    pub async fn publish_comment(&self, target_id: &str, text: &str) -> Result<GraphObject, GraphError> {
        let op = Operation::PublishComment;
        let path = object_path(op, target_id, &[target_id, "comments"])?;

        if text.trim().is_empty() {
            return Err(GraphError::validation(op, target_id, "comment text cannot be empty"));
        }

        let body = self
            .post(op, target_id, &path, vec![("message", text.to_string())])
            .await?;
        decode_created(op, target_id, &body)
    }

    /// Like an object. Liking an already-liked object succeeds.
    pub async fn publish_like(&self, target_id: &str) -> Result<bool, GraphError> {
        let op = Operation::PublishLike;
        let path = object_path(op, target_id, &[target_id, "likes"])?;
        let body = self.post(op, target_id, &path, Vec::new()).await?;
        decode_bool(op, target_id, &body)
    }

    /// Delete an object. Deleting twice fails with a not-found error.
    pub async fn delete_object(&self, identifier: &str) -> Result<bool, GraphError> {
        let op = Operation::DeleteObject;
        let path = object_path(op, identifier, &[identifier])?;
        let body = self
            .post(op, identifier, &path, vec![("method", "delete".to_string())])
            .await?;
        decode_bool(op, identifier, &body)
    }

    /// Search the graph; `kind` narrows results (e.g. "page", "user")
    pub async fn search(&self, query: &str, kind: Option<&str>) -> Result<Connection, GraphError> {
        let op = Operation::Search;
        if query.trim().is_empty() {
            return Err(GraphError::validation(op, query, "search query cannot be empty"));
        }

        let mut params = vec![("q", query.to_string())];
        if let Some(kind) = kind {
            params.push(("type", kind.to_string()));
        }

        let body = self.get(op, query, "search", params).await?;
        decode_connection(op, query, &body)
    }

    /// Follow the `paging.next` link of a connection, if any
    pub async fn next_page(&self, connection: &Connection) -> Result<Option<Connection>, GraphError> {
        let op = Operation::NextPage;
        let Some(next) = connection.next_page_url() else {
            return Ok(None);
        };
        let target = strip_query(next);

        let url = Url::parse(next)
            .map_err(|e| GraphError::validation(op, target, format!("invalid paging URL: {}", e)))?;
        let base = Url::parse(&self.base_url)
            .map_err(|e| GraphError::validation(op, target, format!("invalid base URL: {}", e)))?;
        if url.origin() != base.origin() {
            return Err(GraphError::validation(
                op,
                target,
                "paging URL points outside the configured graph host",
            ));
        }

        let has_token = url.query_pairs().any(|(key, _)| key == "access_token");
        let body = self
            .send(op, target, Method::GET, url.as_str(), Vec::new(), !has_token)
            .await?;
        decode_connection(op, target, &body).map(Some)
    }

    async fn get(
        &self,
        op: Operation,
        target: &str,
        path: &str,
        params: Vec<(&str, String)>,
    ) -> Result<String, GraphError> {
        let url = format!("{}/{}", self.base_url, path);
        self.send(op, target, Method::GET, &url, params, true).await
    }

    async fn post(
        &self,
        op: Operation,
        target: &str,
        path: &str,
        params: Vec<(&str, String)>,
    ) -> Result<String, GraphError> {
        if self.access_token.is_none() {
            return Err(GraphError::missing_token(op, target));
        }
        let url = format!("{}/{}", self.base_url, path);
        self.send(op, target, Method::POST, &url, params, true).await
    }

    /// Issue one logical request, replaying transient transport failures
    /// within the retry bound. Writes are only replayed when the request
    /// never reached the server.
    async fn send(
        &self,
        op: Operation,
        target: &str,
        method: Method,
        url: &str,
        mut params: Vec<(&str, String)>,
        attach_token: bool,
    ) -> Result<String, GraphError> {
        if attach_token {
            if let Some(token) = &self.access_token {
                params.push(("access_token", token.expose().to_string()));
            }
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            tracing::debug!(
                operation = %op,
                attempt = attempt,
                "{} {}",
                method,
                strip_query(url)
            );

            let request = self.client.request(method.clone(), url);
            let request = if method == Method::GET {
                request.query(&params)
            } else {
                request.form(&params)
            };

            let (kind, status, message, replayable) = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.text().await {
                        Ok(body) if status.is_success() => return Ok(body),
                        Ok(body) => {
                            let (kind, message) = classify(status, &body);
                            (kind, Some(status), message, !op.is_write())
                        }
                        Err(e) => (
                            ErrorKind::Transient,
                            Some(status),
                            format!("failed to read response body: {}", e.without_url()),
                            !op.is_write(),
                        ),
                    }
                }
                Err(e) => transport_failure(op, e),
            };

            if kind == ErrorKind::Transient && replayable && self.retry.allows_retry_after(attempt) {
                tracing::warn!(
                    operation = %op,
                    target = %target,
                    attempt = attempt,
                    "Transient failure, retrying in {:?}: {}",
                    self.retry.delay_before_retry(attempt),
                    message
                );
                self.retry.wait(attempt).await;
                continue;
            }

            let context = ErrorContext {
                operation: op,
                target: target.to_string(),
                status: status.map(|s| s.as_u16()),
            };
            return Err(match kind {
                ErrorKind::Transient => GraphError::Transient {
                    context,
                    attempts: attempt,
                    message,
                },
                other => GraphError::of_kind(other, context, message),
            });
        }
    }
}

/// Classify an error raised before any response arrived
fn transport_failure(
    op: Operation,
    err: reqwest::Error,
) -> (ErrorKind, Option<StatusCode>, String, bool) {
    let replayable = if op.is_write() {
        err.is_connect()
    } else {
        err.is_connect() || err.is_timeout() || err.is_request()
    };
    let kind = if err.is_builder() {
        ErrorKind::Validation
    } else {
        ErrorKind::Transient
    };
    (kind, err.status(), err.without_url().to_string(), replayable)
}

/// Percent-encode each segment and join them into a request path
fn object_path(op: Operation, target: &str, segments: &[&str]) -> Result<String, GraphError> {
    if segments.iter().any(|segment| segment.trim().is_empty()) {
        return Err(GraphError::validation(op, target, "identifier cannot be empty"));
    }
    Ok(segments
        .iter()
        .map(|segment| urlencoding::encode(segment.trim()).into_owned())
        .collect::<Vec<_>>()
        .join("/"))
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn parse_json(op: Operation, target: &str, body: &str) -> Result<Value, GraphError> {
    serde_json::from_str(body).map_err(|e| GraphError::Unexpected {
        context: ErrorContext::new(op, target),
        message: format!("response is not valid JSON: {}", e),
    })
}

fn unexpected(op: Operation, target: &str, message: impl Into<String>) -> GraphError {
    GraphError::Unexpected {
        context: ErrorContext::new(op, target),
        message: message.into(),
    }
}

fn not_found(op: Operation, target: &str) -> GraphError {
    GraphError::NotFound {
        context: ErrorContext::new(op, target),
        message: "the service returned false for this identifier".to_string(),
    }
}

fn decode_object(op: Operation, target: &str, body: &str) -> Result<GraphObject, GraphError> {
    match parse_json(op, target, body)? {
        Value::Object(fields) => Ok(GraphObject::new(fields)),
        Value::Bool(false) => Err(not_found(op, target)),
        other => Err(unexpected(op, target, format!("expected an object, got {}", other))),
    }
}

fn decode_created(op: Operation, target: &str, body: &str) -> Result<GraphObject, GraphError> {
    let object = decode_object(op, target, body)?;
    if object.id().is_none() {
        return Err(unexpected(op, target, "created object has no id"));
    }
    Ok(object)
}

fn decode_connection(op: Operation, target: &str, body: &str) -> Result<Connection, GraphError> {
    match parse_json(op, target, body)? {
        value @ Value::Object(_) => serde_json::from_value(value)
            .map_err(|e| unexpected(op, target, format!("malformed connection: {}", e))),
        Value::Bool(false) => Err(not_found(op, target)),
        other => Err(unexpected(op, target, format!("expected a connection, got {}", other))),
    }
}

fn decode_bool(op: Operation, target: &str, body: &str) -> Result<bool, GraphError> {
    match parse_json(op, target, body)? {
        Value::Bool(flag) => Ok(flag),
        Value::Object(fields) => fields
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| unexpected(op, target, "response has no success flag")),
        other => Err(unexpected(op, target, format!("expected a boolean, got {}", other))),
    }
}

fn split_batch(
    op: Operation,
    target: &str,
    ids: BTreeSet<String>,
    body: &str,
) -> Result<ObjectBatch, GraphError> {
    let Value::Object(mut entries) = parse_json(op, target, body)? else {
        return Err(unexpected(op, target, "expected an object keyed by identifier"));
    };

    let mut batch = ObjectBatch::default();
    for id in ids {
        match entries.remove(&id) {
            Some(Value::Object(fields)) => {
                batch.objects.insert(id, GraphObject::new(fields));
            }
            Some(Value::Bool(false)) | Some(Value::Null) | None => {
                let err = GraphError::NotFound {
                    context: ErrorContext::new(op, id.as_str()),
                    message: "identifier missing from batch response".to_string(),
                };
                batch.failures.insert(id, err);
            }
            Some(other) => {
                let err = unexpected(op, &id, format!("expected an object, got {}", other));
                batch.failures.insert(id, err);
            }
        }
    }
    Ok(batch)
}
