//! Generic create/edit/delete/query flows shared by REST tests.

use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::rest::client::{Method, RestClient, RestResponse};
use crate::rest::entity::{Collection, Entity};
use crate::rest::task::{Task, DEFAULT_TASK_WAIT};
use crate::result::{MiradorError, MiradorResult};
use crate::wait::{wait_for, WaitOptions};

/// Expectations for [`assert_response`]
#[derive(Debug, Clone)]
pub struct ResponseExpectation {
    /// Expected per-result `success` flag; `None` accepts any present
    /// flag that is true
    pub success: Option<bool>,
    /// Accepted HTTP status codes; `None` accepts any 2xx
    pub http_status: Option<Vec<u16>>,
    /// Expected number of `results`
    pub results_num: Option<usize>,
    /// Budget for task stubs to reach their terminal state; zero skips
    /// task polling
    pub task_wait: f64,
}

impl Default for ResponseExpectation {
    fn default() -> Self {
        Self {
            success: None,
            http_status: None,
            results_num: None,
            task_wait: DEFAULT_TASK_WAIT,
        }
    }
}

impl ResponseExpectation {
    /// Default expectations: a successful response
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a specific per-result success flag
    #[must_use]
    pub const fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// Expect one of these HTTP status codes
    #[must_use]
    pub fn http_status(mut self, statuses: &[u16]) -> Self {
        self.http_status = Some(statuses.to_vec());
        self
    }

    /// Expect this many results
    #[must_use]
    pub const fn results_num(mut self, num: usize) -> Self {
        self.results_num = Some(num);
        self
    }

    /// Override the task-completion budget
    #[must_use]
    pub const fn task_wait(mut self, num_sec: f64) -> Self {
        self.task_wait = num_sec;
        self
    }
}

fn fail(message: String) -> MiradorError {
    MiradorError::ResponseAssertion { message }
}

/// Validate the client's last response: status code, per-result success
/// flags, result count, and (when a result carries a `task_id`) the
/// task's terminal state within `task_wait` seconds.
///
/// A 204 response is accepted only with an empty body. The response
/// retained on the client is restored afterwards, so follow-up
/// assertions still see the action's own response even though task
/// polling issued requests of its own.
pub fn assert_response(
    client: &Rc<RestClient>,
    expectation: &ResponseExpectation,
) -> MiradorResult<()> {
    let last = client
        .last_response()
        .ok_or_else(|| fail("no response recorded on the client".to_string()))?;

    match &expectation.http_status {
        Some(statuses) => {
            if !statuses.contains(&last.status) {
                return Err(fail(format!(
                    "status code {} does not match the expected {statuses:?}",
                    last.status
                )));
            }
        }
        None => {
            if !last.is_success() {
                return Err(fail(format!("the request failed with {}", last.status)));
            }
        }
    }

    if last.status == 204 {
        return if last.body.is_null() {
            Ok(())
        } else {
            Err(fail("no content expected for a 204 response".to_string()))
        };
    }

    if let Some(results) = last.results() {
        if let Some(expected) = expectation.results_num {
            if results.len() != expected {
                return Err(fail(format!(
                    "the number of results {} does not match the expected {expected}",
                    results.len()
                )));
            }
        }
        for result in results {
            check_result(client, result, &last, expectation)?;
        }
    } else {
        check_result(client, &last.body, &last, expectation)?;
    }

    // Task polling above issued its own requests; the action's response
    // stays the one callers observe.
    client.set_last_response(Some(last));
    Ok(())
}

fn check_result(
    client: &Rc<RestClient>,
    result: &Value,
    last: &RestResponse,
    expectation: &ResponseExpectation,
) -> MiradorResult<()> {
    if result.as_object().map_or(true, serde_json::Map::is_empty) && !result.is_array() {
        return Err(fail("the result should not be empty".to_string()));
    }

    let success_flag = result.get("success").and_then(Value::as_bool);
    match (expectation.success, success_flag) {
        (Some(expected), flag) => {
            if flag != Some(expected) {
                return Err(fail(format!(
                    "the response success flag is {flag:?}, expected {expected}"
                )));
            }
        }
        (None, Some(false)) if last.is_success() => {
            return Err(fail("the response success flag is false".to_string()));
        }
        _ => {}
    }

    let task_id = result.get("task_id").map(|id| match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    if expectation.task_wait > 0.0 && last.is_success() && success_flag != Some(false) {
        if let Some(task_id) = task_id {
            let task = Task::by_id(Rc::clone(client), &task_id);
            let outcome = task.wait_for_terminal(expectation.task_wait)?;
            if outcome.status != "ok" {
                return Err(MiradorError::RestTaskFailed {
                    task_id,
                    status: outcome.status,
                    message: outcome.message,
                });
            }
        }
    }
    Ok(())
}

/// Knobs for [`create_resource`]
#[derive(Debug, Clone)]
pub struct CreateOptions {
    /// Collection action to invoke
    pub action: String,
    /// Find created items by substring instead of equality
    pub substr_search: bool,
    /// Appearance budget in seconds
    pub num_sec: f64,
    /// Appearance polling interval
    pub delay: Duration,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            action: "create".to_string(),
            substr_search: false,
            num_sec: 180.0,
            delay: Duration::from_secs(10),
        }
    }
}

/// Create resources in a collection and wait until each shows up,
/// searched by `name` or `description`.
///
/// The action's own response stays retained on the client.
///
/// # Errors
///
/// [`MiradorError::RestActionNotAvailable`] when this product version
/// has no such action; [`MiradorError::Timeout`] when an item never
/// appears.
pub fn create_resource(
    client: &Rc<RestClient>,
    collection_name: &str,
    items: &[Value],
    options: &CreateOptions,
) -> MiradorResult<Vec<Entity>> {
    let collection = Collection::new(Rc::clone(client), collection_name);
    let entities = collection
        .action(&options.action, items.to_vec())
        .map_err(|err| match err {
            MiradorError::RestBadRequest { message }
                if message.contains("Unsupported Action") =>
            {
                MiradorError::RestActionNotAvailable {
                    collection: collection_name.to_string(),
                    action: options.action.clone(),
                }
            }
            other => other,
        })?;
    let action_response = client.last_response();

    for item in items {
        let (field, value) = if let Some(name) = item.get("name").and_then(Value::as_str) {
            ("name", name)
        } else if let Some(description) = item.get("description").and_then(Value::as_str) {
            ("description", description)
        } else {
            return Err(fail(
                "created items must carry a name or description to wait on".to_string(),
            ));
        };
        let pattern = if options.substr_search {
            format!("%{value}%")
        } else {
            value.to_string()
        };
        let wait_options = WaitOptions::new()
            .num_sec(options.num_sec)
            .delay(options.delay)
            .message(format!("{collection_name} with {field}={pattern} appears"));
        wait_for(
            || Ok(!collection.find_by(field, &pattern)?.is_empty()),
            &wait_options,
        )?;
    }

    client.set_last_response(action_response);
    Ok(entities)
}

/// Delete each entity through its detail endpoint, wait for
/// non-existence, then re-issue the delete expecting `RecordNotFound`
/// with HTTP 404.
///
/// Waits run in a separate pass so the combined wait overlaps the
/// server-side deletions.
pub fn delete_resources_from_detail(
    client: &Rc<RestClient>,
    entities: &[Entity],
    method: Method,
    num_sec: f64,
    delay: Duration,
) -> MiradorResult<()> {
    for entity in entities {
        entity.delete(method)?;
        assert_response(client, &ResponseExpectation::new())?;
    }

    for entity in entities {
        entity.wait_not_exists(num_sec, delay)?;
        match entity.delete(method) {
            Err(MiradorError::RestRecordNotFound { .. }) => {
                assert_response(client, &ResponseExpectation::new().http_status(&[404]))?;
            }
            Err(other) => return Err(other),
            Ok(()) => {
                return Err(fail(format!(
                    "second delete of {} unexpectedly succeeded",
                    entity.href()
                )))
            }
        }
    }
    Ok(())
}

/// Delete entities through a collection-level action, wait for
/// per-entity non-existence, then re-issue and check the version's
/// idempotence witness: `RecordNotFound`/404 on current versions
/// (`not_found`), `success=false` on older ones.
pub fn delete_resources_from_collection(
    collection: &Collection,
    entities: &[Entity],
    not_found: bool,
    num_sec: f64,
    delay: Duration,
) -> MiradorResult<()> {
    let client = collection.client();
    collection.delete(entities)?;
    assert_response(client, &ResponseExpectation::new())?;

    for entity in entities {
        entity.wait_not_exists(num_sec, delay)?;
    }

    if not_found {
        match collection.delete(entities) {
            Err(MiradorError::RestRecordNotFound { .. }) => {
                assert_response(client, &ResponseExpectation::new().http_status(&[404]))
            }
            Err(other) => Err(other),
            Ok(_) => Err(fail(
                "collection re-delete unexpectedly succeeded".to_string(),
            )),
        }
    } else {
        collection.delete(entities)?;
        assert_response(client, &ResponseExpectation::new().success(false))
    }
}

/// One attribute or subcollection that failed the readability sweep
#[derive(Debug, Clone)]
pub struct FailedRecord {
    /// Attribute or subcollection name
    pub name: String,
    /// `attribute` or `subcollection`
    pub kind: &'static str,
    /// The error observed
    pub error: String,
}

/// Outcome of [`query_resource_attributes`]
#[derive(Debug, Clone, Default)]
pub struct AttrCheck {
    /// Names that errored when fetched
    pub failed: Vec<FailedRecord>,
    /// Attributes the server accepted but did not include in the body
    pub missing: Vec<String>,
}

/// Probe every attribute and subcollection the collection's OPTIONS
/// advertises, recording failures and omissions for per-attribute soft
/// assertions.
pub fn query_resource_attributes(entity: &Entity) -> MiradorResult<AttrCheck> {
    let client = entity.client();
    let collection = Collection::new(Rc::clone(client), entity.collection_name());
    let options = collection.options()?;
    let mut outcome = AttrCheck::default();

    let mut attributes = options.virtual_attributes;
    attributes.extend(options.relationships);
    for attribute in attributes {
        let url = format!("{}?attributes={attribute}", entity.href());
        match client.get(&url) {
            Ok(response) => {
                if response.body.get(&attribute).is_none() {
                    outcome.missing.push(attribute);
                }
            }
            Err(error) => outcome.failed.push(FailedRecord {
                name: attribute,
                kind: "attribute",
                error: error.to_string(),
            }),
        }
    }

    for subcollection in options.subcollections {
        if let Err(error) = entity.subcollection(&subcollection).all() {
            outcome.failed.push(FailedRecord {
                name: subcollection,
                kind: "subcollection",
                error: error.to_string(),
            });
        }
    }

    Ok(outcome)
}

/// VM entities of a service, re-rooted to the top-level `vms`
/// collection where actions are available (the subcollection view lacks
/// them).
pub fn get_vms_in_service(service: &Entity) -> MiradorResult<Vec<Entity>> {
    let client = service.client();
    let vms_collection = Collection::new(Rc::clone(client), "vms");
    let mut out = Vec::new();
    for vm in service.subcollection("vms").all()? {
        let id = vm.id()?.ok_or_else(|| fail(format!(
            "service vm at {} carries no id",
            vm.href()
        )))?;
        out.push(vms_collection.get_entity(id));
    }
    Ok(out)
}
