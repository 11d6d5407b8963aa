//! Collection and entity handles.
//!
//! Entities are short-lived handles backed by server-side identity: a
//! href plus a lazily cached attribute map refreshed by `reload`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::rest::client::{Method, RestClient};
use crate::result::{MiradorError, MiradorResult};
use crate::wait::{wait_for, WaitOptions};

/// Attribute metadata reported by a collection's OPTIONS
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    /// Server-computed attributes
    pub virtual_attributes: Vec<String>,
    /// Relationship attributes
    pub relationships: Vec<String>,
    /// Subcollection names
    pub subcollections: Vec<String>,
}

/// A collection handle (`/api/vms`, `/api/services/1/tags`, …).
#[derive(Debug, Clone)]
pub struct Collection {
    client: Rc<RestClient>,
    name: String,
    href: String,
}

impl Collection {
    /// Bind a top-level collection by name
    #[must_use]
    pub fn new(client: Rc<RestClient>, name: impl Into<String>) -> Self {
        let name = name.into();
        let href = client.url_for(&name);
        Self { client, name, href }
    }

    /// Bind a collection at an explicit href (subcollections)
    #[must_use]
    pub fn at_href(client: Rc<RestClient>, name: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            href: href.into(),
        }
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection href
    #[must_use]
    pub fn href(&self) -> &str {
        &self.href
    }

    /// The client this collection talks through
    #[must_use]
    pub fn client(&self) -> &Rc<RestClient> {
        &self.client
    }

    fn entities_from(&self, body: &Value) -> Vec<Entity> {
        body.get("resources")
            .and_then(Value::as_array)
            .map(|resources| {
                resources
                    .iter()
                    .map(|resource| Entity::from_value(Rc::clone(&self.client), self, resource))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All entities, attributes expanded
    pub fn all(&self) -> MiradorResult<Vec<Entity>> {
        let response = self.client.get(&format!("{}?expand=resources", self.href))?;
        Ok(self.entities_from(&response.body))
    }

    /// Entities whose `field` equals `value`; `%sub%` patterns ask the
    /// server for a substring match
    pub fn find_by(&self, field: &str, value: &str) -> MiradorResult<Vec<Entity>> {
        let url = format!(
            "{}?expand=resources&filter[]={field}='{value}'",
            self.href
        );
        let response = self.client.get(&url)?;
        Ok(self.entities_from(&response.body))
    }

    /// Handle for the entity with `id` (no request issued)
    #[must_use]
    pub fn get_entity(&self, id: u64) -> Entity {
        Entity::from_href(Rc::clone(&self.client), &self.name, format!("{}/{id}", self.href))
    }

    /// Issue a collection action over `resources`
    ///
    /// # Errors
    ///
    /// [`MiradorError::RestBadRequest`] when the product version does
    /// not implement the action, surfaced by the server.
    pub fn action(&self, action: &str, resources: Vec<Value>) -> MiradorResult<Vec<Entity>> {
        let response = self
            .client
            .post(&self.href, json!({"action": action, "resources": resources}))?;
        Ok(self.entities_from(&json!({
            "resources": response.results().cloned().unwrap_or_default()
        })))
    }

    /// Collection-level delete of `entities`
    pub fn delete(&self, entities: &[Entity]) -> MiradorResult<Vec<Entity>> {
        let resources = entities
            .iter()
            .map(|entity| json!({"href": entity.href()}))
            .collect();
        self.action("delete", resources)
    }

    /// The collection's OPTIONS metadata
    pub fn options(&self) -> MiradorResult<CollectionOptions> {
        let response = self.client.options(&self.href)?;
        let list = |key: &str| -> Vec<String> {
            response
                .body
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(ToString::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(CollectionOptions {
            virtual_attributes: list("virtual_attributes"),
            relationships: list("relationships"),
            subcollections: list("subcollections"),
        })
    }
}

/// One entity handle.
#[derive(Debug, Clone)]
pub struct Entity {
    client: Rc<RestClient>,
    collection_name: String,
    href: String,
    attributes: Rc<RefCell<Option<Value>>>,
}

impl Entity {
    /// Handle from a known href
    #[must_use]
    pub fn from_href(
        client: Rc<RestClient>,
        collection_name: impl Into<String>,
        href: impl Into<String>,
    ) -> Self {
        Self {
            client,
            collection_name: collection_name.into(),
            href: href.into(),
            attributes: Rc::new(RefCell::new(None)),
        }
    }

    /// Handle from a resource body returned by the server
    #[must_use]
    pub fn from_value(client: Rc<RestClient>, collection: &Collection, value: &Value) -> Self {
        let href = value
            .get("href")
            .and_then(Value::as_str)
            .map_or_else(
                || {
                    let id = value.get("id").map(id_text).unwrap_or_default();
                    format!("{}/{id}", collection.href())
                },
                ToString::to_string,
            );
        Self {
            client,
            collection_name: collection.name().to_string(),
            href,
            attributes: Rc::new(RefCell::new(Some(value.clone()))),
        }
    }

    /// Entity href
    #[must_use]
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Name of the collection this entity belongs to
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// The client this entity talks through
    #[must_use]
    pub fn client(&self) -> &Rc<RestClient> {
        &self.client
    }

    /// Refresh the attribute cache from the server
    pub fn reload(&self) -> MiradorResult<()> {
        let response = self.client.get(&self.href)?;
        *self.attributes.borrow_mut() = Some(response.body);
        Ok(())
    }

    /// Refresh with explicit `?attributes=…` expansion
    pub fn reload_with_attributes(&self, attributes: &[&str]) -> MiradorResult<()> {
        let url = format!("{}?attributes={}", self.href, attributes.join(","));
        let response = self.client.get(&url)?;
        *self.attributes.borrow_mut() = Some(response.body);
        Ok(())
    }

    /// One attribute from the cache, reloading on first access
    pub fn attribute(&self, name: &str) -> MiradorResult<Option<Value>> {
        if self.attributes.borrow().is_none() {
            self.reload()?;
        }
        Ok(self
            .attributes
            .borrow()
            .as_ref()
            .and_then(|attrs| attrs.get(name))
            .cloned())
    }

    /// Entity id, when known
    pub fn id(&self) -> MiradorResult<Option<u64>> {
        Ok(self.attribute("id")?.as_ref().and_then(parse_id))
    }

    /// Entity name attribute, when present
    pub fn name(&self) -> MiradorResult<Option<String>> {
        Ok(self
            .attribute("name")?
            .as_ref()
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    /// Whether the server still knows this entity
    pub fn exists(&self) -> MiradorResult<bool> {
        match self.client.get(&self.href) {
            Ok(_) => Ok(true),
            Err(MiradorError::RestRecordNotFound { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// Wait until the entity exists
    pub fn wait_exists(&self, num_sec: f64) -> MiradorResult<()> {
        let options = WaitOptions::new()
            .num_sec(num_sec)
            .delay(Duration::from_millis(200))
            .message(format!("{} exists", self.href));
        wait_for(|| self.exists(), &options)?;
        Ok(())
    }

    /// Wait until the entity is gone
    pub fn wait_not_exists(&self, num_sec: f64, delay: Duration) -> MiradorResult<()> {
        let options = WaitOptions::new()
            .num_sec(num_sec)
            .delay(delay)
            .message(format!("{} not exists", self.href));
        wait_for(|| Ok(!self.exists()?), &options)?;
        Ok(())
    }

    /// Issue an entity action (`POST href {"action": …}`)
    pub fn action(&self, action: &str, resource: Option<Value>) -> MiradorResult<Value> {
        let mut body = json!({"action": action});
        if let Some(resource) = resource {
            body["resource"] = resource;
        }
        Ok(self.client.post(&self.href, body)?.body)
    }

    /// Edit attributes in place
    pub fn edit(&self, resource: Value) -> MiradorResult<Value> {
        let result = self.action("edit", Some(resource))?;
        *self.attributes.borrow_mut() = Some(result.clone());
        Ok(result)
    }

    /// Set entity ownership
    pub fn set_ownership(&self, resource: Value) -> MiradorResult<Value> {
        self.action("set_ownership", Some(resource))
    }

    /// Delete, via the requested HTTP method
    pub fn delete(&self, method: Method) -> MiradorResult<()> {
        match method {
            Method::Delete => {
                self.client.delete(&self.href)?;
            }
            _ => {
                self.action("delete", None)?;
            }
        }
        Ok(())
    }

    /// A subcollection handle under this entity
    #[must_use]
    pub fn subcollection(&self, name: &str) -> Collection {
        Collection::at_href(
            Rc::clone(&self.client),
            name,
            format!("{}/{name}", self.href),
        )
    }

    /// The tags subcollection with its assign/unassign actions
    #[must_use]
    pub fn tags(&self) -> Tags {
        Tags {
            collection: self.subcollection("tags"),
        }
    }
}

/// Tag operations on an entity's `tags` subcollection.
#[derive(Debug, Clone)]
pub struct Tags {
    collection: Collection,
}

impl Tags {
    /// Assign `tag` to the owning entity
    pub fn assign(&self, tag: &Entity) -> MiradorResult<()> {
        self.collection
            .action("assign", vec![json!({"href": tag.href()})])?;
        Ok(())
    }

    /// Unassign `tag` from the owning entity
    pub fn unassign(&self, tag: &Entity) -> MiradorResult<()> {
        self.collection
            .action("unassign", vec![json!({"href": tag.href()})])?;
        Ok(())
    }

    /// Ids of the currently assigned tags
    pub fn ids(&self) -> MiradorResult<Vec<u64>> {
        let mut out = Vec::new();
        for tag in self.collection.all()? {
            if let Some(id) = tag.id()? {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// The underlying subcollection
    #[must_use]
    pub const fn collection(&self) -> &Collection {
        &self.collection
    }
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
