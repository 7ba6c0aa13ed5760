//! 内存版具名事件源（EventEmitter）
//!
//! 基于 `DashMap` 按事件名保存处理器列表，满足 `EventSource` 协议：
//! - `on`/`off`：注册/移除处理器；
//! - `emit`：同步调用该事件名下当前所有处理器；
//! - 典型用途：测试环境、示例与进程内通知。
//!
//! 注意：`emit` 先复制处理器快照再逐个调用，不持有分片锁，
//! 因此处理器内部可以安全地退订自身或订阅新的处理器。

use crate::error::{WaitError, WaitResult};
use crate::source::{EventHandler, EventSource, ListenerId};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, trace};

struct Registry<E> {
    listeners: DashMap<String, Vec<(ListenerId, EventHandler<E>)>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// 具名事件源
pub struct EventEmitter<E> {
    inner: Arc<Registry<E>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Registry {
                listeners: DashMap::new(),
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.total_listener_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器；已关闭的事件源拒绝订阅
    pub fn on<F>(&self, event_name: &str, handler: F) -> WaitResult<ListenerId>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add_listener(event_name, Arc::new(handler))
    }

    /// 移除处理器，返回是否确实移除
    pub fn off(&self, event_name: &str, id: ListenerId) -> bool {
        let removed = {
            let Some(mut list) = self.inner.listeners.get_mut(event_name) else {
                return false;
            };
            let before = list.len();
            list.retain(|(lid, _)| *lid != id);
            list.len() != before
        };
        // 分片写锁已在上面释放，这里再清理空列表
        self.inner
            .listeners
            .remove_if(event_name, |_, list| list.is_empty());

        if removed {
            debug!(event_name, listener_id = %id, "listener removed");
        }
        removed
    }

    /// 向 `event_name` 的所有处理器投递事件，返回被调用的处理器数量
    pub fn emit(&self, event_name: &str, event: &E) -> usize {
        let snapshot: Vec<EventHandler<E>> = match self.inner.listeners.get(event_name) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };

        trace!(event_name, listeners = snapshot.len(), "emitting event");
        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    /// 某事件名下的处理器数量
    pub fn listener_count(&self, event_name: &str) -> usize {
        self.inner
            .listeners
            .get(event_name)
            .map_or(0, |list| list.len())
    }

    /// 所有事件名下的处理器总数
    pub fn total_listener_count(&self) -> usize {
        self.inner.listeners.iter().map(|e| e.value().len()).sum()
    }

    /// 移除某事件名下的全部处理器，返回移除数量
    pub fn remove_all_listeners(&self, event_name: &str) -> usize {
        let removed = self
            .inner
            .listeners
            .remove(event_name)
            .map_or(0, |(_, list)| list.len());
        if removed > 0 {
            debug!(event_name, removed, "all listeners removed");
        }
        removed
    }

    /// 关闭事件源：清空全部处理器，此后订阅一律失败
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.listeners.clear();
        debug!("event emitter closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn add_listener(&self, event_name: &str, handler: EventHandler<E>) -> WaitResult<ListenerId> {
        if self.is_closed() {
            return Err(WaitError::subscribe(event_name, "event source is closed"));
        }

        let id = ListenerId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut list = self
                .inner
                .listeners
                .entry(event_name.to_string())
                .or_default();
            // 持有分片写锁时再检查一次：`close` 先置位再逐分片清空，
            // 此处看到未关闭则推入的处理器必然会被随后的清空移除
            if !self.is_closed() {
                list.push((id, handler));
                drop(list);
                debug!(event_name, listener_id = %id, "listener registered");
                return Ok(id);
            }
        }
        self.inner
            .listeners
            .remove_if(event_name, |_, list| list.is_empty());
        Err(WaitError::subscribe(event_name, "event source is closed"))
    }
}

impl<E> EventSource<E> for EventEmitter<E>
where
    E: 'static,
{
    fn subscribe(&self, event_name: &str, handler: EventHandler<E>) -> WaitResult<ListenerId> {
        self.add_listener(event_name, handler)
    }

    fn unsubscribe(&self, event_name: &str, id: ListenerId) -> bool {
        self.off(event_name, id)
    }
}
