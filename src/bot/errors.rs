use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use nglbot::observability::{OperatorNotifier, Severity, METRICS};
use teloxide::error_handlers::ErrorHandler;

/// Dispatcher error handler that logs a failed update and reports it to the operator.
pub struct OperatorErrorHandler {
    notifier: Arc<dyn OperatorNotifier>,
}

impl OperatorErrorHandler {
    pub fn new(notifier: Arc<dyn OperatorNotifier>) -> Arc<Self> {
        Arc::new(Self { notifier })
    }

    async fn forward(&self, error: &str) {
        tracing::error!("Update handler failed: {}", error);
        METRICS.increment_errors();
        self.notifier
            .alert(
                Severity::Error,
                "Bot",
                &format!("Update handler failed: {}", error),
            )
            .await;
    }
}

impl<E: Display> ErrorHandler<E> for OperatorErrorHandler {
    fn handle_error(self: Arc<Self>, error: E) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let text = error.to_string();
        Box::pin(async move { self.forward(&text).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturedAlerts {
        alerts: Mutex<Vec<(Severity, String, String)>>,
    }

    #[async_trait]
    impl OperatorNotifier for CapturedAlerts {
        async fn alert(&self, severity: Severity, category: &str, message: &str) {
            self.alerts
                .lock()
                .unwrap()
                .push((severity, category.to_string(), message.to_string()));
        }

        async fn notice(&self, _message: &str) {}
    }

    #[tokio::test]
    async fn test_handler_errors_reach_the_operator() {
        let captured = Arc::new(CapturedAlerts::default());
        let handler = OperatorErrorHandler::new(captured.clone());

        handler
            .handle_error("Bad Request: message to edit not found".to_string())
            .await;

        let alerts = captured.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        let (severity, category, message) = &alerts[0];
        assert_eq!(*severity, Severity::Error);
        assert_eq!(category, "Bot");
        assert!(message.contains("message to edit not found"));
    }
}
