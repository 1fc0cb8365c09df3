//! In-memory stand-in for the graph service, served through wiremock.

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use graph_client::{AccessToken, Config, GraphClient, RetryPolicy};

pub const TOKEN: &str = "test-access-token";
pub const ME: &str = "500";

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Map<String, Value>>,
    likes: BTreeMap<String, BTreeSet<String>>,
    next_id: u64,
}

/// Stateful fake: posts, comments, likes and deletes persist between requests
#[derive(Clone)]
pub struct FakeGraph {
    state: Arc<Mutex<State>>,
}

impl FakeGraph {
    pub fn seeded() -> Self {
        let mut state = State {
            next_id: 1000,
            ..State::default()
        };
        let seed = [
            json!({"id": ME, "name": "Test User", "updated_time": "2010-05-01T12:00:00+0000"}),
            json!({"id": "4", "username": "koppel", "name": "Alex Koppel", "updated_time": "2010-04-29T20:12:24+0000"}),
            json!({"id": "114961875194024", "username": "contextoptional", "name": "Context Optional", "category": "Internet"}),
            json!({"id": "5", "username": "naitik", "name": "Naitik Shah"}),
            json!({"id": "6", "username": "lukeshepard", "name": "Luke Shepard"}),
            json!({"id": "20531316728", "username": "facebook", "name": "Facebook"}),
        ];
        for object in seed {
            if let Value::Object(fields) = object {
                let id = fields["id"].as_str().unwrap().to_string();
                if let Some(alias) = fields.get("username").and_then(Value::as_str) {
                    state.objects.insert(alias.to_string(), fields.clone());
                }
                state.objects.insert(id, fields);
            }
        }
        state
            .likes
            .insert("6".to_string(), ["20531316728".to_string()].into_iter().collect());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn mount(&self, server: &MockServer) {
        Mock::given(any())
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().unwrap().objects.contains_key(id)
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }
}

fn graph_error(status: u16, code: i64, kind: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"message": message, "type": kind, "code": code}
    }))
}

fn missing(id: &str) -> ResponseTemplate {
    graph_error(
        400,
        100,
        "GraphMethodException",
        &format!("Unsupported get request. Object with ID '{}' does not exist", id),
    )
}

fn params(request: &Request) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = request.url.query_pairs().into_owned().collect();
    if let Ok(form) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&request.body) {
        params.extend(form);
    }
    params
}

impl Respond for FakeGraph {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let params = params(request);
        let segments: Vec<String> = request
            .url
            .path()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::decode(s).unwrap().into_owned())
            .collect();
        let is_get = request.method.as_str() == "GET";

        match params.get("access_token").map(String::as_str) {
            Some(TOKEN) => {}
            Some(_) => return graph_error(400, 190, "OAuthException", "Error validating access token"),
            None if !is_get => {
                return graph_error(400, 2500, "OAuthException", "An active access token must be used")
            }
            None if segments.first().map(String::as_str) == Some("me") => {
                return graph_error(400, 2500, "OAuthException", "An active access token must be used")
            }
            None => {}
        }

        let mut state = self.state.lock().unwrap();
        let resolve = |id: &str| if id == "me" { ME.to_string() } else { id.to_string() };

        match (is_get, segments.as_slice()) {
            (true, []) => {
                let ids = params.get("ids").cloned().unwrap_or_default();
                let mut found = Map::new();
                for id in ids.split(',') {
                    match state.objects.get(id) {
                        Some(object) => {
                            found.insert(id.to_string(), Value::Object(object.clone()));
                        }
                        None => {
                            return graph_error(
                                400,
                                803,
                                "OAuthException",
                                "(#803) Some of the aliases you requested do not exist",
                            )
                        }
                    }
                }
                ResponseTemplate::new(200).set_body_json(Value::Object(found))
            }
            (true, [search]) if search == "search" => {
                let query = params.get("q").cloned().unwrap_or_default().to_lowercase();
                let mut seen = BTreeSet::new();
                let data: Vec<Value> = state
                    .objects
                    .values()
                    .filter(|o| {
                        o.get("name")
                            .and_then(Value::as_str)
                            .map(|n| n.to_lowercase().contains(&query))
                            .unwrap_or(false)
                    })
                    .filter(|o| seen.insert(o["id"].as_str().unwrap_or_default().to_string()))
                    .map(|o| json!({"id": o["id"], "name": o["name"]}))
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
            }
            (true, [id]) => match state.objects.get(&resolve(id.as_str())) {
                Some(object) => ResponseTemplate::new(200).set_body_json(Value::Object(object.clone())),
                None => missing(id),
            },
            (true, [id, relation]) => {
                let id = resolve(id.as_str());
                let Some(object) = state.objects.get(&id) else {
                    return missing(&id);
                };
                let owner = object["id"].as_str().unwrap_or_default().to_string();
                match relation.as_str() {
                    "likes" => {
                        let data: Vec<Value> = state
                            .likes
                            .get(&owner)
                            .map(|liked| liked.iter().map(|id| json!({"id": id})).collect())
                            .unwrap_or_default();
                        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
                    }
                    // Pages with no public feed answer with an explicit null
                    "feed" => ResponseTemplate::new(200).set_body_json(json!({ "data": null })),
                    _ => graph_error(
                        400,
                        2500,
                        "OAuthException",
                        "Unknown path components: relation does not exist",
                    ),
                }
            }
            (false, [id]) if params.get("method").map(String::as_str) == Some("delete") => {
                match state.objects.remove(id) {
                    Some(_) => ResponseTemplate::new(200).set_body_string("true"),
                    None => missing(id),
                }
            }
            (false, [profile, feed]) if feed == "feed" => {
                let profile = resolve(profile.as_str());
                state.next_id += 1;
                let id = format!("{}_{}", profile, state.next_id);
                let mut post = Map::new();
                post.insert("id".into(), json!(id));
                for (key, value) in &params {
                    if key != "access_token" {
                        post.insert(key.clone(), json!(value));
                    }
                }
                state.objects.insert(id.clone(), post);
                ResponseTemplate::new(200).set_body_json(json!({ "id": id }))
            }
            (false, [target, comments]) if comments == "comments" => {
                if !state.objects.contains_key(target) {
                    return missing(target);
                }
                state.next_id += 1;
                let id = format!("{}_{}", target, state.next_id);
                let comment = json!({
                    "id": id,
                    "message": params.get("message").cloned().unwrap_or_default(),
                    "from": {"id": ME, "name": "Test User"}
                });
                if let Value::Object(fields) = comment {
                    state.objects.insert(id.clone(), fields);
                }
                ResponseTemplate::new(200).set_body_json(json!({ "id": id }))
            }
            (false, [target, likes]) if likes == "likes" => {
                if !state.objects.contains_key(target) {
                    return missing(target);
                }
                state
                    .likes
                    .entry(target.clone())
                    .or_default()
                    .insert(ME.to_string());
                ResponseTemplate::new(200).set_body_string("true")
            }
            _ => graph_error(400, 100, "OAuthException", "Unsupported request"),
        }
    }
}

/// Config pointed at `server` with fast retries
pub fn config(server: &MockServer) -> Config {
    let mut config = Config::for_base_url(server.uri());
    config.request_timeout = Duration::from_secs(5);
    config.retry = RetryPolicy {
        max_retries: 2,
        backoff_step: Duration::from_millis(10),
    };
    config
}

pub fn authed_client(server: &MockServer) -> GraphClient {
    GraphClient::new(&config(server), AccessToken::new(TOKEN).unwrap()).unwrap()
}

pub fn anonymous_client(server: &MockServer) -> GraphClient {
    GraphClient::anonymous(&config(server)).unwrap()
}

/// Mock server backed by a freshly seeded fake graph
pub async fn fake_graph() -> (MockServer, FakeGraph) {
    let server = MockServer::start().await;
    let graph = FakeGraph::seeded();
    graph.mount(&server).await;
    (server, graph)
}
