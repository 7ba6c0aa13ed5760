//! 内存版派发式事件源（EventDispatcher）
//!
//! 与 `EventEmitter` 的区别仅在投递入口：`dispatch(event)` 从事件自身读取名字。
//! 订阅/退订仍按事件名进行，因此对等待器而言两者没有差别。
//!
use crate::error::WaitResult;
use crate::source::{EventHandler, EventSource, ListenerId};
use crate::source_emitter::EventEmitter;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 携带自身名字的事件
pub trait NamedEvent {
    fn event_name(&self) -> &str;
}

/// 通用事件载体：名字 + 任意负载
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchedEvent<T> {
    pub name: String,
    pub detail: T,
}

impl<T> DispatchedEvent<T> {
    pub fn new(name: impl Into<String>, detail: T) -> Self {
        Self {
            name: name.into(),
            detail,
        }
    }
}

impl<T> NamedEvent for DispatchedEvent<T> {
    fn event_name(&self) -> &str {
        &self.name
    }
}

/// 派发式事件源
pub struct EventDispatcher<E> {
    listeners: EventEmitter<E>,
}

impl<E> Clone for EventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self {
            listeners: EventEmitter::default(),
        }
    }
}

impl<E> fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.total_listener_count())
            .finish()
    }
}

impl<E: NamedEvent> EventDispatcher<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event_listener<F>(&self, event_name: &str, handler: F) -> WaitResult<ListenerId>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listeners.on(event_name, handler)
    }

    pub fn remove_event_listener(&self, event_name: &str, id: ListenerId) -> bool {
        self.listeners.off(event_name, id)
    }

    /// 按事件自身的名字派发，返回被调用的处理器数量
    pub fn dispatch(&self, event: &E) -> usize {
        self.listeners.emit(event.event_name(), event)
    }

    pub fn listener_count(&self, event_name: &str) -> usize {
        self.listeners.listener_count(event_name)
    }

    pub fn total_listener_count(&self) -> usize {
        self.listeners.total_listener_count()
    }

    pub fn close(&self) {
        self.listeners.close();
    }
}

impl<E> EventSource<E> for EventDispatcher<E>
where
    E: NamedEvent + 'static,
{
    fn subscribe(&self, event_name: &str, handler: EventHandler<E>) -> WaitResult<ListenerId> {
        self.listeners.subscribe(event_name, handler)
    }

    fn unsubscribe(&self, event_name: &str, id: ListenerId) -> bool {
        self.listeners.unsubscribe(event_name, id)
    }
}
