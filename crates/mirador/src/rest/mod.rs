//! REST helper layer: client, entity handles, task polling, and the
//! traversal helpers built on them.

pub mod client;
pub mod entity;
pub mod helpers;
pub mod mock;
pub mod task;

pub use client::{Auth, Method, RestClient, RestRequest, RestResponse, Transport};
pub use entity::{Collection, CollectionOptions, Entity};
pub use task::Task;
