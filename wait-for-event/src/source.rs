//! 事件源（EventSource）协议
//!
//! 等待器只依赖“按事件名订阅/退订”这一能力，不关心事件如何被投递：
//! - 具名事件风格：`emit(name, event)` 直接按名字分发（见 `EventEmitter`）；
//! - 派发风格：`dispatch(event)`，事件自身携带名字（见 `EventDispatcher`）。
//!
use crate::error::WaitResult;
use std::fmt;
use std::sync::Arc;

/// 订阅句柄，`subscribe` 返回，`unsubscribe` 时凭此移除对应处理器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// 事件处理器；可能在任意线程被调用
pub type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// 事件源：按事件名注册/移除处理器
///
/// 实现需保证：
/// - 同名事件的多个订阅彼此独立，均能收到事件；
/// - `unsubscribe` 只移除该句柄对应的处理器，不影响同名的其他处理器；
/// - 可被多个并发等待同时订阅/退订。
pub trait EventSource<E>: Send + Sync {
    /// 为 `event_name` 注册处理器
    fn subscribe(&self, event_name: &str, handler: EventHandler<E>) -> WaitResult<ListenerId>;

    /// 移除处理器，返回是否确实移除
    fn unsubscribe(&self, event_name: &str, id: ListenerId) -> bool;
}

impl<E, S> EventSource<E> for Arc<S>
where
    S: EventSource<E> + ?Sized,
{
    fn subscribe(&self, event_name: &str, handler: EventHandler<E>) -> WaitResult<ListenerId> {
        (**self).subscribe(event_name, handler)
    }

    fn unsubscribe(&self, event_name: &str, id: ListenerId) -> bool {
        (**self).unsubscribe(event_name, id)
    }
}
