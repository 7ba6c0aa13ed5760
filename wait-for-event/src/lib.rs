//! 事件等待（wait-for-event）
//!
//! 把可多次触发的回调式事件通知适配为只结算一次的异步结果：
//! 给定事件源、事件名以及可选的过滤/超时/日志策略，返回一个 future，
//! 它以第一个满足过滤器的事件完成，或在超时、过滤器出错时失败。
//!
//! 组成：
//! - `source`：事件源协议（按事件名订阅/退订）；
//! - `source_emitter` / `source_dispatch`：具名事件与派发式两种内存事件源；
//! - `filter`：异步过滤器协议与闭包适配器；
//! - `logger`：可选日志出口；
//! - `options`：等待选项与可反序列化配置；
//! - `waiter`：等待器本体。
//!
//! 典型用法：
//! ```rust
//! use std::time::Duration;
//! use wait_for_event::{EventEmitter, WaitOptions, wait_for_event_with};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), wait_for_event::WaitError> {
//! let emitter = EventEmitter::<u32>::new();
//! let opts = WaitOptions::builder().timeout(Duration::from_secs(1)).build();
//!
//! let wait = wait_for_event_with(&emitter, "ready", opts)?;
//! emitter.emit("ready", &42);
//! assert_eq!(wait.await?, 42);
//! # Ok(())
//! # }
//! ```
pub mod error;
pub mod filter;
pub mod logger;
pub mod options;
pub mod source;
pub mod source_dispatch;
pub mod source_emitter;
pub mod waiter;

pub use error::{WaitError, WaitResult};
pub use filter::{EventFilter, Truthy, async_filter_fn, filter_fn, try_filter_fn};
pub use logger::{TracingLogger, WaitLogger};
pub use options::{WaitConfig, WaitOptions};
pub use source::{EventHandler, EventSource, ListenerId};
pub use source_dispatch::{DispatchedEvent, EventDispatcher, NamedEvent};
pub use source_emitter::EventEmitter;
pub use waiter::{EventWait, wait_for_event, wait_for_event_filtered, wait_for_event_with};
