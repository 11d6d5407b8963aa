//! In-memory API server for tests.
//!
//! Implements [`Transport`] over a map of collections, speaking just
//! enough of the product's wire dialect for the helper layer: expanded
//! reads, filters, collection and entity actions, task stubs with a
//! queued → running → finished lifecycle, and `RecordNotFound` error
//! envelopes.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use serde_json::{json, Map, Value};

use crate::rest::client::{Auth, Method, RestRequest, RestResponse, Transport};
use crate::result::MiradorResult;

/// Entry point URL the mock answers under
pub const ENTRY: &str = "https://mock/api";

#[derive(Debug, Default)]
struct MockState {
    collections: BTreeMap<String, Vec<Map<String, Value>>>,
    options: HashMap<String, Value>,
    task_actions: HashSet<(String, String)>,
    task_polls: HashMap<String, u32>,
    next_id: u64,
}

/// The mock server; hand an `Rc` of it to [`crate::rest::RestClient`]
/// as its transport.
#[derive(Debug, Default)]
pub struct MockServer {
    state: RefCell<MockState>,
    /// Polls a task spends before reaching `finished`
    pub task_poll_count: u32,
    /// Terminal status handed to finished tasks
    pub task_status: &'static str,
    /// Older API versions answer collection-level deletes of missing
    /// resources with `success=false` instead of a 404
    pub lenient_collection_delete: bool,
}

impl MockServer {
    /// An empty server with ok-finishing tasks
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MockState {
                next_id: 1,
                ..MockState::default()
            }),
            task_poll_count: 2,
            task_status: "ok",
            lenient_collection_delete: false,
        }
    }

    /// Client wiring helper: the entry point to pair with this server
    #[must_use]
    pub fn entry_point() -> &'static str {
        ENTRY
    }

    /// Seed an entity, returning its id
    pub fn seed(&self, collection: &str, mut attributes: Map<String, Value>) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        attributes.insert("id".to_string(), json!(id));
        attributes.insert(
            "href".to_string(),
            json!(format!("{ENTRY}/{collection}/{id}")),
        );
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(attributes);
        id
    }

    /// Declare the OPTIONS metadata for a collection
    pub fn set_options(&self, collection: &str, options: Value) {
        self.state
            .borrow_mut()
            .options
            .insert(collection.to_string(), options);
    }

    /// Make `(collection, action)` respond with a task stub
    pub fn task_mode(&self, collection: &str, action: &str) {
        self.state
            .borrow_mut()
            .task_actions
            .insert((collection.to_string(), action.to_string()));
    }

    /// Current entity count in a collection
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.state
            .borrow()
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn not_found(url: &str) -> RestResponse {
        RestResponse {
            status: 404,
            body: json!({"error": {
                "kind": "not_found",
                "klass": "ActiveRecord::RecordNotFound",
                "message": format!("Couldn't find resource at {url}"),
            }}),
        }
    }

    fn bad_request(message: &str) -> RestResponse {
        RestResponse {
            status: 400,
            body: json!({"error": {
                "kind": "bad_request",
                "klass": "Api::BadRequestError",
                "message": message,
            }}),
        }
    }

    fn ok(body: Value) -> RestResponse {
        RestResponse { status: 200, body }
    }

    fn entity_body(entity: &Map<String, Value>, attributes: Option<&str>) -> Value {
        match attributes {
            None => Value::Object(entity.clone()),
            Some(requested) => {
                let mut out = Map::new();
                for key in ["id", "href"] {
                    if let Some(value) = entity.get(key) {
                        out.insert(key.to_string(), value.clone());
                    }
                }
                for name in requested.split(',') {
                    if let Some(value) = entity.get(name) {
                        out.insert(name.to_string(), value.clone());
                    }
                }
                Value::Object(out)
            }
        }
    }

    fn handle_get(&self, path: &[&str], query: &HashMap<String, String>, url: &str) -> RestResponse {
        let mut state = self.state.borrow_mut();
        match path {
            [] => {
                let names: Vec<&String> = state.collections.keys().collect();
                Self::ok(json!({"collections": names}))
            }
            [collection] => {
                let entities = state
                    .collections
                    .get(*collection)
                    .cloned()
                    .unwrap_or_default();
                let filtered: Vec<&Map<String, Value>> = match query.get("filter[]") {
                    Some(filter) => {
                        let Some((field, pattern)) = parse_filter(filter) else {
                            return Self::bad_request("malformed filter");
                        };
                        entities
                            .iter()
                            .filter(|e| matches_filter(e, &field, &pattern))
                            .collect()
                    }
                    None => entities.iter().collect(),
                };
                if query.contains_key("expand") {
                    let resources: Vec<Value> =
                        filtered.iter().map(|e| Value::Object((*e).clone())).collect();
                    Self::ok(json!({"count": resources.len(), "resources": resources}))
                } else {
                    let resources: Vec<Value> = filtered
                        .iter()
                        .filter_map(|e| e.get("href").cloned())
                        .map(|href| json!({"href": href}))
                        .collect();
                    Self::ok(json!({"count": resources.len(), "resources": resources}))
                }
            }
            [collection, id] => {
                if *collection == "tasks" {
                    Self::advance_task(&mut state, id, self.task_poll_count, self.task_status);
                }
                match find_entity(&state, collection, id) {
                    Some(entity) => {
                        Self::ok(Self::entity_body(&entity, query.get("attributes").map(String::as_str)))
                    }
                    None => Self::not_found(url),
                }
            }
            [collection, id, subcollection] => {
                let Some(entity) = find_entity(&state, collection, id) else {
                    return Self::not_found(url);
                };
                // Subcollection entries are stored as an attribute list
                // of member ids referencing a top-level collection.
                let member_ids: Vec<String> = entity
                    .get(*subcollection)
                    .and_then(Value::as_array)
                    .map(|items| items.iter().map(id_text).collect())
                    .unwrap_or_default();
                let resources: Vec<Value> = member_ids
                    .iter()
                    .filter_map(|member| find_entity(&state, subcollection, member))
                    .map(|e| {
                        if query.contains_key("expand") {
                            Value::Object(e)
                        } else {
                            json!({"id": e.get("id"), "href": e.get("href")})
                        }
                    })
                    .collect();
                Self::ok(json!({"count": resources.len(), "resources": resources}))
            }
            _ => Self::not_found(url),
        }
    }

    fn advance_task(state: &mut MockState, id: &str, poll_count: u32, status: &str) {
        let polls = state.task_polls.entry(id.to_string()).or_insert(poll_count);
        let remaining = *polls;
        if remaining > 0 {
            *polls = remaining - 1;
        }
        if let Some(tasks) = state.collections.get_mut("tasks") {
            if let Some(task) = tasks.iter_mut().find(|t| id_matches(t, id)) {
                let (task_state, task_status) = match remaining {
                    0 => ("finished", status),
                    1 => ("running", ""),
                    _ => ("queued", ""),
                };
                task.insert("state".to_string(), json!(task_state));
                task.insert("status".to_string(), json!(task_status));
            }
        }
    }

    fn handle_post(&self, path: &[&str], body: &Value, url: &str) -> RestResponse {
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match path {
            [collection] => self.collection_action(collection, &action, body, url),
            [collection, id] => self.entity_action(collection, id, &action, body, url),
            [collection, id, subcollection] => {
                self.subcollection_action(collection, id, subcollection, &action, body, url)
            }
            _ => Self::not_found(url),
        }
    }

    fn collection_action(
        &self,
        collection: &str,
        action: &str,
        body: &Value,
        url: &str,
    ) -> RestResponse {
        let resources = body
            .get("resources")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        match action {
            "create" => {
                let mut results = Vec::new();
                for resource in &resources {
                    let Value::Object(attributes) = resource else {
                        return Self::bad_request("create resource must be an object");
                    };
                    let id = self.seed(collection, attributes.clone());
                    let entity = {
                        let state = self.state.borrow();
                        find_entity(&state, collection, &id.to_string()).expect("just seeded")
                    };
                    results.push(self.action_result(collection, action, Value::Object(entity)));
                }
                Self::ok(json!({"results": results}))
            }
            "delete" => {
                let mut results = Vec::new();
                for resource in &resources {
                    let id = resource
                        .get("href")
                        .and_then(Value::as_str)
                        .and_then(|href| href.rsplit('/').next())
                        .unwrap_or_default()
                        .to_string();
                    let existed = remove_entity(&mut self.state.borrow_mut(), collection, &id);
                    if !existed {
                        if self.lenient_collection_delete {
                            results.push(json!({
                                "success": false,
                                "message": format!("{collection} id: {id} not found"),
                            }));
                            continue;
                        }
                        return Self::not_found(url);
                    }
                    results.push(json!({
                        "success": true,
                        "message": format!("{collection} id: {id} deleting"),
                    }));
                }
                Self::ok(json!({"results": results}))
            }
            _ => Self::bad_request(&format!("Unsupported Action {action} for the {collection}")),
        }
    }

    fn entity_action(
        &self,
        collection: &str,
        id: &str,
        action: &str,
        body: &Value,
        url: &str,
    ) -> RestResponse {
        match action {
            "delete" => {
                if remove_entity(&mut self.state.borrow_mut(), collection, id) {
                    let result =
                        self.action_result(collection, action, json!({
                            "success": true,
                            "message": format!("{collection} id: {id} deleting"),
                        }));
                    Self::ok(result)
                } else {
                    Self::not_found(url)
                }
            }
            "edit" => {
                let mut state = self.state.borrow_mut();
                let Some(entities) = state.collections.get_mut(collection) else {
                    return Self::not_found(url);
                };
                let Some(entity) = entities.iter_mut().find(|e| id_matches(e, id)) else {
                    return Self::not_found(url);
                };
                if let Some(Value::Object(updates)) = body.get("resource") {
                    for (key, value) in updates {
                        entity.insert(key.clone(), value.clone());
                    }
                }
                Self::ok(Value::Object(entity.clone()))
            }
            "set_ownership" => {
                if find_entity(&self.state.borrow(), collection, id).is_some() {
                    Self::ok(json!({"success": true, "message": "Ownership updated"}))
                } else {
                    Self::not_found(url)
                }
            }
            _ => Self::bad_request(&format!("Unsupported Action {action} for {collection}/{id}")),
        }
    }

    fn subcollection_action(
        &self,
        collection: &str,
        id: &str,
        subcollection: &str,
        action: &str,
        body: &Value,
        url: &str,
    ) -> RestResponse {
        let member_ids: Vec<Value> = body
            .get("resources")
            .and_then(Value::as_array)
            .map(|resources| {
                resources
                    .iter()
                    .filter_map(|r| r.get("href").and_then(Value::as_str))
                    .filter_map(|href| href.rsplit('/').next())
                    .filter_map(|last| last.parse::<u64>().ok())
                    .map(|id| json!(id))
                    .collect()
            })
            .unwrap_or_default();
        let mut state = self.state.borrow_mut();
        let Some(entities) = state.collections.get_mut(collection) else {
            return Self::not_found(url);
        };
        let Some(entity) = entities.iter_mut().find(|e| id_matches(e, id)) else {
            return Self::not_found(url);
        };
        let members = entity
            .entry(subcollection.to_string())
            .or_insert_with(|| json!([]));
        let Some(current) = members.as_array_mut() else {
            return Self::bad_request("subcollection attribute is not a list");
        };
        match action {
            "assign" => {
                for member in member_ids {
                    if !current.contains(&member) {
                        current.push(member);
                    }
                }
            }
            "unassign" => {
                current.retain(|member| !member_ids.contains(member));
            }
            _ => {
                return Self::bad_request(&format!(
                    "Unsupported Action {action} for {collection}/{id}/{subcollection}"
                ))
            }
        }
        let results: Vec<Value> = member_ids_results(current);
        Self::ok(json!({"results": results}))
    }

    /// Wrap an action result in a task stub when the action is in task
    /// mode.
    fn action_result(&self, collection: &str, action: &str, plain: Value) -> Value {
        let is_task = self
            .state
            .borrow()
            .task_actions
            .contains(&(collection.to_string(), action.to_string()));
        if !is_task {
            return plain;
        }
        let task_id = self.seed(
            "tasks",
            json!({"name": format!("{collection} {action}"), "state": "queued", "status": ""})
                .as_object()
                .expect("object literal")
                .clone(),
        );
        json!({
            "success": true,
            "message": format!("{action} initiated"),
            "task_id": task_id.to_string(),
            "task_href": format!("{ENTRY}/tasks/{task_id}"),
        })
    }

    fn handle_delete(&self, path: &[&str], url: &str) -> RestResponse {
        match path {
            [collection, id] => {
                if remove_entity(&mut self.state.borrow_mut(), collection, id) {
                    RestResponse {
                        status: 204,
                        body: Value::Null,
                    }
                } else {
                    Self::not_found(url)
                }
            }
            _ => Self::not_found(url),
        }
    }

    fn handle_options(&self, path: &[&str]) -> RestResponse {
        let defaults = json!({
            "virtual_attributes": [],
            "relationships": [],
            "subcollections": [],
            "data": {},
        });
        match path {
            [collection] => {
                let state = self.state.borrow();
                Self::ok(state.options.get(*collection).cloned().unwrap_or(defaults))
            }
            _ => Self::ok(defaults),
        }
    }
}

impl Transport for MockServer {
    fn send(&self, request: &RestRequest, _auth: &Auth) -> MiradorResult<RestResponse> {
        let stripped = request.url.strip_prefix(ENTRY).unwrap_or(&request.url);
        let (path_text, query_text) = stripped.split_once('?').unwrap_or((stripped, ""));
        let path: Vec<&str> = path_text.split('/').filter(|s| !s.is_empty()).collect();
        let query = parse_query(query_text);
        let body = request.body.clone().unwrap_or(Value::Null);
        Ok(match request.method {
            Method::Get => self.handle_get(&path, &query, &request.url),
            Method::Post => self.handle_post(&path, &body, &request.url),
            Method::Delete => self.handle_delete(&path, &request.url),
            Method::Options => self.handle_options(&path),
        })
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// `field='value'` with optional `%` substring markers
fn parse_filter(filter: &str) -> Option<(String, String)> {
    let (field, raw) = filter.split_once('=')?;
    let value = raw.trim_matches('\'');
    Some((field.to_string(), value.to_string()))
}

fn matches_filter(entity: &Map<String, Value>, field: &str, pattern: &str) -> bool {
    let actual = entity.get(field).map(id_text).unwrap_or_default();
    if let Some(sub) = pattern.strip_prefix('%').and_then(|p| p.strip_suffix('%')) {
        actual.contains(sub)
    } else {
        actual == pattern
    }
}

fn find_entity(state: &MockState, collection: &str, id: &str) -> Option<Map<String, Value>> {
    state
        .collections
        .get(collection)?
        .iter()
        .find(|e| id_matches(e, id))
        .cloned()
}

fn remove_entity(state: &mut MockState, collection: &str, id: &str) -> bool {
    let Some(entities) = state.collections.get_mut(collection) else {
        return false;
    };
    let before = entities.len();
    entities.retain(|e| !id_matches(e, id));
    entities.len() != before
}

fn id_matches(entity: &Map<String, Value>, id: &str) -> bool {
    entity.get("id").map(id_text).as_deref() == Some(id)
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn member_ids_results(current: &[Value]) -> Vec<Value> {
    current
        .iter()
        .map(|member| json!({"success": true, "tag_id": member}))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::rest::client::RestClient;

    fn client_over(server: Rc<MockServer>) -> Rc<RestClient> {
        Rc::new(RestClient::new(
            MockServer::entry_point(),
            Auth::Basic {
                user: "admin".to_string(),
                password: "smartvm".to_string(),
            },
            server,
        ))
    }

    #[test]
    fn test_seed_and_get() {
        let server = Rc::new(MockServer::new());
        let id = server.seed("vms", json!({"name": "vm-a"}).as_object().unwrap().clone());
        let client = client_over(Rc::clone(&server));
        let response = client.get(&format!("vms/{id}")).unwrap();
        assert_eq!(response.body["name"], json!("vm-a"));
    }

    #[test]
    fn test_missing_entity_is_404_record_not_found() {
        let server = Rc::new(MockServer::new());
        let client = client_over(server);
        let err = client.get("vms/99").unwrap_err();
        assert!(err.to_string().contains("RecordNotFound"));
    }

    #[test]
    fn test_filter_exact_and_substring() {
        let server = Rc::new(MockServer::new());
        server.seed("vms", json!({"name": "vm-alpha"}).as_object().unwrap().clone());
        server.seed("vms", json!({"name": "vm-beta"}).as_object().unwrap().clone());
        let client = client_over(server);

        let exact = client
            .get("vms?expand=resources&filter[]=name='vm-alpha'")
            .unwrap();
        assert_eq!(exact.body["resources"].as_array().unwrap().len(), 1);

        let sub = client
            .get("vms?expand=resources&filter[]=name='%vm%'")
            .unwrap();
        assert_eq!(sub.body["resources"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_create_action_returns_results() {
        let server = Rc::new(MockServer::new());
        let client = client_over(Rc::clone(&server));
        let response = client
            .post(
                "categories",
                json!({"action": "create", "resources": [{"name": "cat_demo_001"}]}),
            )
            .unwrap();
        assert_eq!(response.results().unwrap().len(), 1);
        assert_eq!(server.count("categories"), 1);
    }

    #[test]
    fn test_raw_delete_is_204_then_404() {
        let server = Rc::new(MockServer::new());
        let id = server.seed("vms", Map::new());
        let client = client_over(server);
        let response = client.delete(&format!("vms/{id}")).unwrap();
        assert_eq!(response.status, 204);
        assert!(client.delete(&format!("vms/{id}")).is_err());
    }

    #[test]
    fn test_task_lifecycle_advances_per_poll() {
        let server = Rc::new(MockServer::new());
        server.task_mode("services", "delete");
        let id = server.seed("services", Map::new());
        let client = client_over(Rc::clone(&server));
        let response = client
            .post(&format!("services/{id}"), json!({"action": "delete"}))
            .unwrap();
        let task_id = response.body["task_id"].as_str().unwrap().to_string();

        let states: Vec<String> = (0..3)
            .map(|_| {
                client.get(&format!("tasks/{task_id}")).unwrap().body["state"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(states, vec!["queued", "running", "finished"]);
        let final_status = client.get(&format!("tasks/{task_id}")).unwrap().body["status"].clone();
        assert_eq!(final_status, json!("ok"));
    }
}
