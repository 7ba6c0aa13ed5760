//! 等待器（EventWait）
//!
//! 把“可多次触发的回调式事件”适配为“只结算一次的异步结果”：
//! 1. 调用时立即在事件源上注册处理器，处理器把事件连同到达时刻转发进通道；
//! 2. 若配置了超时，截止时间从调用时刻起算；
//! 3. 对每个收到的事件执行过滤器（缺省恒为真），过滤可以相互重叠，
//!    谁先得出“真”谁胜出，而不一定是先到的事件；
//! 4. 匹配、过滤出错、超时三条终结路径都先退订、再给出结果，且退订只发生一次。
//!
//! 结算循环在调用时即被派生为 tokio 任务，不依赖调用方何时 `await`：
//! 超时到点即退订，迟于截止时间到达的事件一律不参与匹配。
//! `EventWait` 只是该任务的句柄；结算前被丢弃时中止任务并同步退订。
//!
//! 事件源自行丢弃处理器（例如 `remove_all_listeners`）不构成结算：
//! 有超时则照常超时，无超时则保持挂起。

use crate::error::{WaitError, WaitResult};
use crate::filter::EventFilter;
use crate::logger::WaitLogger;
use crate::options::WaitOptions;
use crate::source::{EventHandler, EventSource, ListenerId};
use futures_util::future::{BoxFuture, OptionFuture};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

type Verdict<E> = BoxFuture<'static, (anyhow::Result<bool>, E)>;

/// 等待 `event_name` 的下一次出现
pub fn wait_for_event<E, S>(source: &S, event_name: &str) -> WaitResult<EventWait<E>>
where
    E: Clone + Send + Sync + 'static,
    S: EventSource<E> + Clone + 'static,
{
    wait_for_event_with(source, event_name, WaitOptions::default())
}

/// 按选项等待；过滤器取自 `options.filter`
pub fn wait_for_event_with<E, S>(
    source: &S,
    event_name: &str,
    options: WaitOptions<E>,
) -> WaitResult<EventWait<E>>
where
    E: Clone + Send + Sync + 'static,
    S: EventSource<E> + Clone + 'static,
{
    let (timeout, logger, filter) = options.into_parts();
    start(source, event_name, filter, timeout, logger)
}

/// 以显式过滤器等待；它优先于 `options.filter`
pub fn wait_for_event_filtered<E, S, F>(
    source: &S,
    event_name: &str,
    filter: F,
    options: WaitOptions<E>,
) -> WaitResult<EventWait<E>>
where
    E: Clone + Send + Sync + 'static,
    S: EventSource<E> + Clone + 'static,
    F: EventFilter<E> + 'static,
{
    let (timeout, logger, _) = options.into_parts();
    let filter: Arc<dyn EventFilter<E>> = Arc::new(filter);
    start(source, event_name, Some(filter), timeout, logger)
}

/// 一次等待的延迟结果，`await` 得到匹配事件或错误
#[must_use = "dropping an EventWait cancels the wait"]
pub struct EventWait<E> {
    event_name: String,
    task: JoinHandle<WaitResult<E>>,
    subscription: Arc<Subscription>,
}

impl<E> EventWait<E> {
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// 结算循环是否已经结束
    pub fn is_settled(&self) -> bool {
        self.task.is_finished()
    }
}

impl<E> Future for EventWait<E> {
    type Output = WaitResult<E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.task).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            // 任务只会随运行时关闭被取消，此时等待永不结算
            Poll::Ready(Err(_)) | Poll::Pending => Poll::Pending,
        }
    }
}

impl<E> Drop for EventWait<E> {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            self.task.abort();
        }
        self.subscription.cancel();
    }
}

impl<E> fmt::Debug for EventWait<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventWait")
            .field("event_name", &self.event_name)
            .field("settled", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

fn start<E, S>(
    source: &S,
    event_name: &str,
    filter: Option<Arc<dyn EventFilter<E>>>,
    timeout: Option<Duration>,
    logger: Option<Arc<dyn WaitLogger>>,
) -> WaitResult<EventWait<E>>
where
    E: Clone + Send + Sync + 'static,
    S: EventSource<E> + Clone + 'static,
{
    let runtime = Handle::try_current()
        .map_err(|_| WaitError::subscribe(event_name, "no tokio runtime to drive the wait"))?;

    let (tx, rx) = mpsc::unbounded_channel::<(Instant, E)>();
    let handler: EventHandler<E> = Arc::new(move |event: &E| {
        // 接收端已结算时发送失败，忽略即可
        let _ = tx.send((Instant::now(), event.clone()));
    });

    let listener_id = source.subscribe(event_name, handler)?;
    let subscription = Arc::new(Subscription::new::<E, S>(
        source.clone(),
        event_name,
        listener_id,
    ));

    if let Some(logger) = &logger {
        logger.log(&format!("Waiting for event: {event_name}"));
    }
    debug!(event_name, listener_id = %listener_id, ?timeout, "waiting for event");

    let settle = Settle {
        event_name: event_name.to_string(),
        rx,
        subscription: subscription.clone(),
        filter,
        logger,
        timeout,
        deadline: timeout.map(|t| Instant::now() + t),
    };

    Ok(EventWait {
        event_name: event_name.to_string(),
        task: runtime.spawn(settle.run()),
        subscription,
    })
}

struct Settle<E> {
    event_name: String,
    rx: mpsc::UnboundedReceiver<(Instant, E)>,
    subscription: Arc<Subscription>,
    filter: Option<Arc<dyn EventFilter<E>>>,
    logger: Option<Arc<dyn WaitLogger>>,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl<E> Settle<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn run(mut self) -> WaitResult<E> {
        let mut pending: FuturesUnordered<Verdict<E>> = FuturesUnordered::new();
        let timer = OptionFuture::from(self.deadline.map(time::sleep_until));
        tokio::pin!(timer);
        let mut receiving = true;

        let outcome = loop {
            tokio::select! {
                biased;

                Some((verdict, event)) = pending.next(), if !pending.is_empty() => match verdict {
                    Ok(true) => break Ok(event),
                    Ok(false) => {
                        trace!(event_name = %self.event_name, "event rejected by filter");
                    }
                    Err(err) => break Err(WaitError::Filter(err)),
                },
                received = self.rx.recv(), if receiving => match received {
                    Some((arrived, _)) if self.is_late(arrived) => {
                        trace!(event_name = %self.event_name, "event arrived after the deadline");
                    }
                    Some((_, event)) => match &self.filter {
                        None => break Ok(event),
                        Some(filter) => {
                            self.log(|name| format!("Filtering for event: {name}"));
                            let filter = filter.clone();
                            pending.push(Box::pin(async move {
                                let verdict = filter.matches(&event).await;
                                (verdict, event)
                            }));
                        }
                    },
                    None => {
                        trace!(event_name = %self.event_name, "event source dropped the handler");
                        receiving = false;
                    }
                },
                Some(()) = &mut timer, if self.deadline.is_some() => {
                    break Err(WaitError::Timeout {
                        event_name: self.event_name.clone(),
                        timeout: self.timeout.unwrap_or_default(),
                    });
                }
                // 无超时、无在途过滤且不会再有事件：保持挂起
                else => std::future::pending::<()>().await,
            }
        };

        self.subscription.cancel();

        match &outcome {
            Ok(_) => {
                self.log(|name| format!("Got matching event: {name}"));
                debug!(event_name = %self.event_name, "wait settled with matching event");
            }
            Err(err) => debug!(event_name = %self.event_name, error = %err, "wait failed"),
        }
        outcome
    }

    fn is_late(&self, arrived: Instant) -> bool {
        self.deadline.is_some_and(|deadline| arrived >= deadline)
    }

    fn log(&self, message: impl FnOnce(&str) -> String) {
        if let Some(logger) = &self.logger {
            logger.log(&message(&self.event_name));
        }
    }
}

/// 一次等待持有的唯一订阅，由结算任务与 `EventWait` 共享；
/// `cancel` 或 drop 时退订，且至多执行一次
struct Subscription {
    teardown: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new<E, S>(source: S, event_name: &str, listener_id: ListenerId) -> Self
    where
        E: 'static,
        S: EventSource<E> + 'static,
    {
        let event_name = event_name.to_string();
        let teardown = move || {
            let removed = source.unsubscribe(&event_name, listener_id);
            trace!(
                event_name = %event_name,
                listener_id = %listener_id,
                removed,
                "subscription torn down"
            );
        };
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    fn cancel(&self) {
        let teardown = self
            .teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // 锁已释放后再退订，事件源回调不会与本锁嵌套
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{async_filter_fn, filter_fn, try_filter_fn};
    use crate::source_emitter::EventEmitter;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<dyn WaitLogger>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let lines = lines.clone();
            move |msg: &str| lines.lock().unwrap().push(msg.to_string())
        };
        (lines, Arc::new(sink))
    }

    #[tokio::test]
    async fn resolves_with_emitted_event() {
        let emitter = EventEmitter::<Arc<String>>::new();
        let emitted = Arc::new("payload".to_string());

        let wait = wait_for_event(&emitter, "ready").unwrap();
        assert_eq!(emitter.listener_count("ready"), 1);
        emitter.emit("ready", &emitted);

        let got = wait.await.unwrap();
        assert!(Arc::ptr_eq(&got, &emitted));
        assert_eq!(emitter.total_listener_count(), 0);
    }

    #[tokio::test]
    async fn subscription_is_created_at_call_time() {
        let emitter = EventEmitter::<u32>::new();
        let wait = wait_for_event(&emitter, "n").unwrap();
        // 尚未 poll，事件已被转发进通道
        emitter.emit("n", &7);
        assert_eq!(wait.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn positional_filter_wins_over_options_filter() {
        let emitter = EventEmitter::<u32>::new();
        let opts = WaitOptions::<u32>::builder()
            .filter(Arc::new(filter_fn(|n: &u32| *n == 1)))
            .build();

        let wait =
            wait_for_event_filtered(&emitter, "n", filter_fn(|n: &u32| *n == 2), opts).unwrap();
        emitter.emit("n", &1);
        emitter.emit("n", &2);

        assert_eq!(wait.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn options_filter_is_used_without_positional_filter() {
        let emitter = EventEmitter::<u32>::new();
        let opts = WaitOptions::<u32>::builder()
            .filter(Arc::new(filter_fn(|n: &u32| *n > 10)))
            .build();

        let wait = wait_for_event_with(&emitter, "n", opts).unwrap();
        emitter.emit("n", &3);
        emitter.emit("n", &30);

        assert_eq!(wait.await.unwrap(), 30);
    }

    #[tokio::test]
    async fn filter_error_rejects_and_unsubscribes() {
        let emitter = EventEmitter::<u32>::new();
        let wait = wait_for_event_filtered(
            &emitter,
            "n",
            try_filter_fn(|_: &u32| Err::<bool, _>(anyhow::anyhow!("this should fail"))),
            WaitOptions::default(),
        )
        .unwrap();

        emitter.emit("n", &1);
        let err = wait.await.unwrap_err();
        assert_eq!(err.to_string(), "this should fail");
        assert_eq!(emitter.total_listener_count(), 0);
        assert_eq!(emitter.emit("n", &2), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_truthy_verdict_wins_over_emission_order() {
        let emitter = EventEmitter::<u64>::new();
        // 事件值即过滤耗时（毫秒）
        let slow_first = async_filter_fn(|delay: u64| async move {
            time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, anyhow::Error>(true)
        });

        let wait =
            wait_for_event_filtered(&emitter, "n", slow_first, WaitOptions::default()).unwrap();
        emitter.emit("n", &50);
        emitter.emit("n", &5);

        assert_eq!(wait.await.unwrap(), 5);
        assert_eq!(emitter.total_listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rejects_with_fixed_message() {
        let emitter = EventEmitter::<()>::new();
        let opts = WaitOptions::<()>::builder()
            .timeout(Duration::from_millis(100))
            .build();

        let err = wait_for_event_with(&emitter, "never", opts)
            .unwrap()
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Timed out waiting for event");
        assert!(err.is_timeout());
        assert_eq!(emitter.total_listener_count(), 0);
    }

    #[tokio::test]
    async fn dropping_the_wait_unsubscribes() {
        let emitter = EventEmitter::<()>::new();
        let wait = wait_for_event(&emitter, "x").unwrap();
        assert_eq!(emitter.listener_count("x"), 1);

        drop(wait);
        assert_eq!(emitter.listener_count("x"), 0);
    }

    #[tokio::test]
    async fn closed_source_fails_immediately() {
        let emitter = EventEmitter::<()>::new();
        emitter.close();

        let err = wait_for_event(&emitter, "x").unwrap_err();
        assert!(matches!(err, WaitError::Subscribe { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn source_dropping_the_handler_leaves_an_untimed_wait_pending() {
        let emitter = EventEmitter::<()>::new();
        let wait = wait_for_event(&emitter, "x").unwrap();
        emitter.remove_all_listeners("x");

        assert!(time::timeout(Duration::from_secs(60), wait).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn source_dropping_the_handler_still_times_out() {
        let emitter = EventEmitter::<()>::new();
        let opts = WaitOptions::<()>::builder()
            .timeout(Duration::from_millis(100))
            .build();
        let wait = wait_for_event_with(&emitter, "x", opts).unwrap();
        emitter.remove_all_listeners("x");

        let err = wait.await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn waiting_outside_a_runtime_is_rejected_before_subscribing() {
        let emitter = EventEmitter::<()>::new();
        let err = wait_for_event(&emitter, "x").unwrap_err();
        assert!(matches!(err, WaitError::Subscribe { .. }));
        assert_eq!(emitter.listener_count("x"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn settles_on_timeout_without_being_polled() {
        let emitter = EventEmitter::<()>::new();
        let opts = WaitOptions::<()>::builder()
            .timeout(Duration::from_millis(100))
            .build();
        let wait = wait_for_event_with(&emitter, "x", opts).unwrap();

        time::sleep(Duration::from_millis(200)).await;
        assert!(wait.is_settled());
        assert_eq!(emitter.listener_count("x"), 0);
        assert!(wait.await.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn logs_filtering_for_every_candidate() {
        let emitter = EventEmitter::<u32>::new();
        let (lines, logger) = recorder();
        let opts = WaitOptions::<u32>::builder().logger(logger).build();

        let wait =
            wait_for_event_filtered(&emitter, "X", filter_fn(|n: &u32| *n == 2), opts).unwrap();
        emitter.emit("X", &1);
        emitter.emit("X", &2);
        wait.await.unwrap();

        assert_eq!(
            *lines.lock().unwrap(),
            vec![
                "Waiting for event: X",
                "Filtering for event: X",
                "Filtering for event: X",
                "Got matching event: X",
            ]
        );
    }
}
