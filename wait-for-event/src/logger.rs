//! 等待过程的日志出口（WaitLogger）
//!
//! 调用方可选地提供一个接收可读文本的日志出口，等待器在三个时点写入：
//! 开始等待、每次对候选事件执行过滤、匹配成功。
//!

/// 日志出口
pub trait WaitLogger: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> WaitLogger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// 转发到 `tracing` 的日志出口
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl WaitLogger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "wait_for_event", "{message}");
    }
}
