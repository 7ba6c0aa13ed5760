//! 等待选项（WaitOptions）与可反序列化配置（WaitConfig）
//!
//! - `timeout`：缺省或为零表示不设定时器，等待可以无限期挂起；
//! - `logger`：可选日志出口；
//! - `filter`：可选过滤器。若调用方另以位置参数传入过滤器，位置参数优先。
//!
use crate::filter::EventFilter;
use crate::logger::WaitLogger;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 一次等待的选项
#[derive(Builder)]
pub struct WaitOptions<E> {
    timeout: Option<Duration>,
    logger: Option<Arc<dyn WaitLogger>>,
    filter: Option<Arc<dyn EventFilter<E>>>,
}

impl<E> WaitOptions<E> {
    /// 由配置构造；配置只涉及超时
    pub fn from_config(config: &WaitConfig) -> Self {
        Self {
            timeout: config.timeout(),
            ..Self::default()
        }
    }

    /// 实际生效的超时，零值视为未设定
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }

    pub fn logger(&self) -> Option<&Arc<dyn WaitLogger>> {
        self.logger.as_ref()
    }

    pub fn filter(&self) -> Option<&Arc<dyn EventFilter<E>>> {
        self.filter.as_ref()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<Duration>,
        Option<Arc<dyn WaitLogger>>,
        Option<Arc<dyn EventFilter<E>>>,
    ) {
        let timeout = self.timeout();
        (timeout, self.logger, self.filter)
    }
}

impl<E> Default for WaitOptions<E> {
    fn default() -> Self {
        Self {
            timeout: None,
            logger: None,
            filter: None,
        }
    }
}

impl<E> Clone for WaitOptions<E> {
    fn clone(&self) -> Self {
        Self {
            timeout: self.timeout,
            logger: self.logger.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl<E> fmt::Debug for WaitOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl<E> From<WaitConfig> for WaitOptions<E> {
    fn from(config: WaitConfig) -> Self {
        Self::from_config(&config)
    }
}

/// 可从配置文件加载的等待配置
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// 超时毫秒数；缺省或 0 表示不超时
    pub timeout_ms: Option<u64>,
}

impl WaitConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_fn;

    #[test]
    fn zero_timeout_means_no_timer() {
        let opts = WaitOptions::<()>::builder()
            .timeout(Duration::ZERO)
            .build();
        assert_eq!(opts.timeout(), None);

        let opts = WaitOptions::<()>::builder()
            .timeout(Duration::from_millis(100))
            .build();
        assert_eq!(opts.timeout(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn builder_sets_filter_and_logger() {
        let opts = WaitOptions::<u8>::builder()
            .filter(Arc::new(filter_fn(|b: &u8| *b > 1)))
            .logger(Arc::new(|_: &str| {}))
            .build();
        assert!(opts.filter().is_some());
        assert!(opts.logger().is_some());
        assert_eq!(opts.timeout(), None);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: WaitConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, WaitConfig::default());
        assert_eq!(cfg.timeout(), None);

        let cfg: WaitConfig = serde_json::from_str(r#"{"timeout_ms":0}"#).unwrap();
        assert_eq!(cfg.timeout(), None);

        let cfg: WaitConfig = serde_json::from_str(r#"{"timeout_ms":250}"#).unwrap();
        let opts: WaitOptions<()> = cfg.into();
        assert_eq!(opts.timeout(), Some(Duration::from_millis(250)));
    }
}
