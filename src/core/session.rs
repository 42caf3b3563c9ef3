//! 会话存储
//!
//! 每个用户一份 Session（旅行偏好 + 最近一次结果），按 user_id 惰性创建，仅在显式 reset 时替换。
//! MemorySessionStore：外层 RwLock 只在查找 / 插入槽位时持有；每轮对话持有该用户的
//! OwnedMutexGuard 直到结束，同一用户的并发请求串行执行，不同用户互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::services::{Accommodation, WeatherRecord};

/// 目的地中需要剔除的填充词（不区分大小写，整词匹配）
const DESTINATION_FILLERS: &[&str] = &["suchen", "finden", "reisen", "nach", "zu"];

/// 旅行偏好
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub destination: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub travelers: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            destination: None,
            start_date: None,
            end_date: None,
            travelers: 1,
        }
    }
}

/// 最近一次工具结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastResults {
    pub accommodations: Option<Vec<Accommodation>>,
    pub weather: Option<WeatherRecord>,
}

/// 单个用户的会话状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub preferences: Preferences,
    pub last_results: LastResults,
}

impl Session {
    /// 合并意图识别得到的实体；缺失的键直接跳过
    pub fn merge_entities(&mut self, entities: &HashMap<String, String>) {
        if let Some(destination) = entities.get("destination") {
            let cleaned = normalize_destination(destination);
            // 剔除填充词后为空则保留原目的地
            if !cleaned.is_empty() {
                self.preferences.destination = Some(cleaned);
            }
        }
        if let Some(start) = entities.get("start_date") {
            self.preferences.start_date = Some(start.clone());
        }
        if let Some(end) = entities.get("end_date") {
            self.preferences.end_date = Some(end.clone());
        }
    }
}

/// 去掉目的地中的填充词（整词、不区分大小写），压缩空白
pub fn normalize_destination(raw: &str) -> String {
    raw.split_whitespace()
        .filter(|token| {
            let lower = token.to_lowercase();
            !DESTINATION_FILLERS.contains(&lower.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 返回已有会话的快照；不存在则创建默认会话
    async fn get_or_create(&self, user_id: &str) -> Session;

    /// 无条件替换为默认会话
    async fn reset(&self, user_id: &str) -> Session;

    /// 独占该用户的会话直到 guard 释放（一轮对话的边界）
    async fn lock(&self, user_id: &str) -> OwnedMutexGuard<Session>;

    /// 已知用户数
    async fn active_count(&self) -> usize;
}

/// 内存会话存储（进程重启即丢失）
#[derive(Default)]
pub struct MemorySessionStore {
    slots: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, user_id: &str) -> Arc<Mutex<Session>> {
        if let Some(slot) = self.slots.read().await.get(user_id) {
            return slot.clone();
        }
        let mut slots = self.slots.write().await;
        slots
            .entry(user_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(user_id, "session created");
                Arc::new(Mutex::new(Session::default()))
            })
            .clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_create(&self, user_id: &str) -> Session {
        self.slot(user_id).await.lock().await.clone()
    }

    async fn reset(&self, user_id: &str) -> Session {
        let slot = self.slot(user_id).await;
        let mut session = slot.lock().await;
        *session = Session::default();
        session.clone()
    }

    async fn lock(&self, user_id: &str) -> OwnedMutexGuard<Session> {
        self.slot(user_id).await.lock_owned().await
    }

    async fn active_count(&self) -> usize {
        self.slots.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entities(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_destination_strips_fillers() {
        assert_eq!(normalize_destination("nach Paris reisen"), "Paris");
        assert_eq!(normalize_destination("Hotels SUCHEN in Rom"), "Hotels in Rom");
        assert_eq!(normalize_destination("  New   York "), "New York");
        assert_eq!(normalize_destination("Zugspitze"), "Zugspitze");
    }

    #[test]
    fn test_merge_entities_skips_absent_and_empty() {
        let mut session = Session::default();
        session.merge_entities(&entities(&[("destination", "Berlin")]));
        session.merge_entities(&entities(&[("destination", "nach zu"), ("start_date", "1.11")]));
        assert_eq!(session.preferences.destination.as_deref(), Some("Berlin"));
        assert_eq!(session.preferences.start_date.as_deref(), Some("1.11"));
        assert_eq!(session.preferences.end_date, None);
        assert_eq!(session.preferences.travelers, 1);
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let store = MemorySessionStore::new();
        {
            let mut session = store.lock("u1").await;
            session.preferences.destination = Some("Wien".into());
            session.preferences.travelers = 3;
            session.last_results.accommodations = Some(Vec::new());
        }
        let reset = store.reset("u1").await;
        assert_eq!(reset, Session::default());
        assert_eq!(store.get_or_create("u1").await, Session::default());
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = MemorySessionStore::new();
        store.lock("a").await.preferences.destination = Some("Oslo".into());
        let first = store.get_or_create("a").await;
        let second = store.get_or_create("a").await;
        assert_eq!(first, second);
        assert_eq!(first.preferences.destination.as_deref(), Some("Oslo"));
        store.get_or_create("b").await;
        assert_eq!(store.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_other_users_not_blocked_by_held_lock() {
        let store = Arc::new(MemorySessionStore::new());
        let _held = store.lock("busy").await;
        let other = tokio::time::timeout(Duration::from_millis(200), store.lock("free")).await;
        assert!(other.is_ok());
        let same = tokio::time::timeout(Duration::from_millis(50), store.lock("busy")).await;
        assert!(same.is_err(), "same user must wait for the holder");
    }
}
