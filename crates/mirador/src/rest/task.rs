//! Server-side task polling.

use std::rc::Rc;
use std::time::Duration;

use crate::rest::client::RestClient;
use crate::rest::entity::{Collection, Entity};
use crate::result::{MiradorError, MiradorResult};
use crate::wait::{wait_for_with, WaitOptions};

/// Default task-completion budget in seconds
pub const DEFAULT_TASK_WAIT: f64 = 600.0;

/// A task's terminal outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Terminal status (`ok` or `error`)
    pub status: String,
    /// Human message from the server
    pub message: String,
}

/// Handle to one `/api/tasks/:id` entity.
#[derive(Debug, Clone)]
pub struct Task {
    entity: Entity,
}

impl Task {
    /// Bind the task with `task_id`
    #[must_use]
    pub fn by_id(client: Rc<RestClient>, task_id: &str) -> Self {
        let collection = Collection::new(client, "tasks");
        let href = format!("{}/{task_id}", collection.href());
        Self {
            entity: Entity::from_href(Rc::clone(collection.client()), "tasks", href),
        }
    }

    /// The task's entity handle
    #[must_use]
    pub const fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Current lifecycle state (`queued`, `running`, `finished`)
    pub fn state(&self) -> MiradorResult<String> {
        Ok(self
            .entity
            .attribute("state")?
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase())
    }

    /// Current status (`ok` or `error` once terminal)
    pub fn status(&self) -> MiradorResult<String> {
        Ok(self
            .entity
            .attribute("status")?
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase())
    }

    /// Server message
    pub fn message(&self) -> MiradorResult<String> {
        Ok(self
            .entity
            .attribute("message")?
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Wait until the task reaches `state == finished`, reloading
    /// between polls, then report the terminal outcome.
    ///
    /// # Errors
    ///
    /// [`MiradorError::Timeout`] when `num_sec` elapses first. A
    /// terminal non-ok status is reported in the outcome, not an error;
    /// callers decide (and [`super::helpers::assert_response`] fails on
    /// it with the message verbatim).
    pub fn wait_for_terminal(&self, num_sec: f64) -> MiradorResult<TaskOutcome> {
        self.entity.wait_exists(5.0)?;
        let options = WaitOptions::new()
            .num_sec(num_sec)
            .delay(Duration::from_millis(500))
            .message("task state finished");
        let entity = self.entity.clone();
        wait_for_with(
            || Ok(self.state()? == "finished"),
            Some(move || {
                if let Err(err) = entity.reload() {
                    tracing::debug!(error = %err, "task reload failed, will re-poll");
                }
            }),
            &options,
        )?;
        Ok(TaskOutcome {
            status: self.status()?,
            message: self.message()?,
        })
    }

    /// [`Task::wait_for_terminal`] that additionally demands `status ==
    /// ok`.
    pub fn wait_for_ok(&self, num_sec: f64) -> MiradorResult<()> {
        let outcome = self.wait_for_terminal(num_sec)?;
        if outcome.status == "ok" {
            Ok(())
        } else {
            let id = self
                .entity
                .attribute("id")?
                .map(|v| v.to_string())
                .unwrap_or_default();
            Err(MiradorError::RestTaskFailed {
                task_id: id,
                status: outcome.status,
                message: outcome.message,
            })
        }
    }
}
