//! 统一错误定义
//!
//! 一次已开始的等待只会以三种方式结算：匹配成功、超时、过滤器出错；
//! `Subscribe` 只在调用时返回，此时等待根本没有开始。
//! 事件源在结算前丢弃处理器不是错误：有超时则照常 `Timeout`，否则保持挂起。
//! 过滤器错误原样透传（`Display` 与来源保持不变，可 `downcast_ref` 取回原始错误）。
//!
use std::time::Duration;
use thiserror::Error;

/// 等待事件的错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WaitError {
    /// 超时前未等到匹配事件；消息固定，不携带事件名
    #[error("Timed out waiting for event")]
    Timeout {
        event_name: String,
        timeout: Duration,
    },

    /// 过滤器返回的错误，不做包装
    #[error(transparent)]
    Filter(anyhow::Error),

    /// 调用时无法开始等待：事件源拒绝订阅（能力缺失或已关闭）或没有 tokio 运行时
    #[error("subscribe failed: event={event_name}, reason={reason}")]
    Subscribe { event_name: String, reason: String },
}

impl WaitError {
    pub fn subscribe(event_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Subscribe {
            event_name: event_name.into(),
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// 若为过滤器错误，取回原始错误
    pub fn filter_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Filter(err) => Some(err),
            _ => None,
        }
    }
}

/// 统一 Result 类型别名
pub type WaitResult<T> = Result<T, WaitError>;
