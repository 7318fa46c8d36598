use crate::application::SessionController;
use crate::infrastructure::Transport;
use std::sync::Arc;

/// Background task driving a controller's processing turns
pub struct SessionRuntime<T: Transport> {
    controller: Arc<SessionController<T>>,

    /// Handle to background task
    task_handle: tokio::task::JoinHandle<()>,
}

impl<T: Transport> SessionRuntime<T> {
    /// Poll `controller` every `poll_interval_ms` until stopped
    pub fn spawn(controller: Arc<SessionController<T>>) -> Self {
        let period = controller.config().poll_interval();
        let driven = controller.clone();

        let task_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!("SessionRuntime started for {}", driven.local_identity());

            loop {
                interval.tick().await;

                if driven.is_shut_down() {
                    tracing::debug!("SessionRuntime: controller shut down, exiting");
                    break;
                }

                let processed = driven.poll();
                if processed > 0 {
                    tracing::debug!("SessionRuntime processed {} events", processed);
                }
            }
        });

        Self {
            controller,
            task_handle,
        }
    }

    pub fn controller(&self) -> &Arc<SessionController<T>> {
        &self.controller
    }

    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }

    /// End the task and shut the controller down
    pub async fn stop(self) {
        let Self {
            controller,
            task_handle,
        } = self;

        task_handle.abort();
        let _ = task_handle.await;
        controller.shutdown();
    }
}
