//! Per-user forwarding task bookkeeping.

use std::collections::HashMap;

use tokio::task::JoinHandle;

/// Cancelable forwarding tasks, grouped per user.
///
/// Mutations are serialized by the controller's state lock; cancellation is
/// best-effort, records already pushed into the merged output before the
/// abort lands may still be delivered.
#[derive(Default)]
pub struct SubscriptionManager {
    tasks: HashMap<String, Vec<JoinHandle<()>>>,
}

impl SubscriptionManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register forwarding tasks for a user, creating the entry if absent.
    pub fn add_tasks(&mut self, user: &str, tasks: Vec<JoinHandle<()>>) {
        self.tasks.entry(user.to_string()).or_default().extend(tasks);
    }

    /// Abort every task registered for the user and drop the entry.
    ///
    /// No-op when the user has no tasks.
    pub fn cancel_all(&mut self, user: &str) {
        match self.tasks.remove(user) {
            Some(tasks) => {
                tracing::debug!(user, count = tasks.len(), "cancelling subscriptions");
                for task in tasks {
                    task.abort();
                }
            }
            None => tracing::debug!(user, "cancel: no subscriptions registered"),
        }
    }

    /// Abort every task for every user. Used at session teardown.
    pub fn cancel_everything(&mut self) {
        for (user, tasks) in self.tasks.drain() {
            tracing::debug!(user, count = tasks.len(), "cancelling subscriptions");
            for task in tasks {
                task.abort();
            }
        }
    }

    /// Number of live task handles for a user.
    #[must_use]
    pub fn task_count(&self, user: &str) -> usize {
        self.tasks.get(user).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parked_task() -> JoinHandle<()> {
        tokio::spawn(async {
            std::future::pending::<()>().await;
        })
    }

    #[tokio::test]
    async fn tasks_accumulate_per_user() {
        let mut manager = SubscriptionManager::new();
        manager.add_tasks("u1", vec![parked_task(), parked_task()]);
        manager.add_tasks("u1", vec![parked_task()]);
        manager.add_tasks("u2", vec![parked_task()]);

        assert_eq!(manager.task_count("u1"), 3);
        assert_eq!(manager.task_count("u2"), 1);

        manager.cancel_everything();
    }

    #[tokio::test]
    async fn cancel_aborts_and_removes_only_that_user() {
        let mut manager = SubscriptionManager::new();
        let handle = parked_task();
        let watcher = tokio::spawn(async {
            std::future::pending::<()>().await;
        });
        manager.add_tasks("u1", vec![handle]);
        manager.add_tasks("u2", vec![watcher]);

        manager.cancel_all("u1");

        assert_eq!(manager.task_count("u1"), 0);
        assert_eq!(manager.task_count("u2"), 1);
        manager.cancel_everything();
    }

    #[tokio::test]
    async fn cancelling_an_unknown_user_is_a_noop() {
        let mut manager = SubscriptionManager::new();
        manager.cancel_all("nobody");
        assert_eq!(manager.task_count("nobody"), 0);
    }
}
