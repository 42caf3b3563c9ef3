//! 协作方调用守卫
//!
//! 每次外部调用都加超时，超时与失败统一映射为 GuideError；同时输出结构化审计日志（JSON）。

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::{GuideError, ServiceError};

/// 对单次协作方调用施加超时
#[derive(Debug, Clone, Copy)]
pub struct CallGuard {
    timeout: Duration,
}

impl CallGuard {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn from_duration(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 在超时内等待 fut；超时返回 Timeout，协作方返回 Err 则转为 Collaborator
    pub async fn call<T, F>(&self, collaborator: &'static str, fut: F) -> Result<T, GuideError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let start = Instant::now();
        let result = timeout(self.timeout, fut).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "collaborator_audit",
            "collaborator": collaborator,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %audit, "collaborator");

        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(GuideError::collaborator(collaborator, e)),
            Err(_) => Err(GuideError::Timeout {
                collaborator,
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

impl Default for CallGuard {
    fn default() -> Self {
        Self::new(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_passes_value_through() {
        let guard = CallGuard::new(1);
        let value = guard
            .call("test", async { Ok::<_, ServiceError>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_call_maps_service_error() {
        let guard = CallGuard::new(1);
        let err = guard
            .call("weather", async {
                Err::<(), _>(ServiceError::Unavailable("down".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GuideError::Collaborator { collaborator: "weather", .. }));
    }

    #[tokio::test]
    async fn test_call_times_out_stalled_future() {
        let guard = CallGuard::from_duration(Duration::from_millis(20));
        let err = guard
            .call("llm", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ServiceError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GuideError::Timeout { collaborator: "llm", .. }));
    }
}
