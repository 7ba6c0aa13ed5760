use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wait_for_event::{
    DispatchedEvent, EventDispatcher, EventEmitter, TracingLogger, WaitConfig, WaitOptions,
    async_filter_fn, try_filter_fn, wait_for_event_filtered, wait_for_event_with,
};

#[derive(Debug, Deserialize)]
struct DemoConfig {
    #[serde(default)]
    wait: WaitConfig,
}

#[derive(Debug, Clone)]
struct Job {
    id: u32,
    progress: u8,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config: DemoConfig = serde_json::from_str(r#"{ "wait": { "timeout_ms": 500 } }"#)?;
    let emitter = EventEmitter::<Job>::new();

    // 匹配：等待某个任务完成
    let opts = WaitOptions::builder()
        .maybe_timeout(config.wait.timeout())
        .logger(Arc::new(TracingLogger))
        .build();
    let done = wait_for_event_filtered(
        &emitter,
        "job.progress",
        async_filter_fn(|job: Job| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, anyhow::Error>(job.progress == 100)
        }),
        opts,
    )?;
    {
        let emitter = emitter.clone();
        tokio::spawn(async move {
            for progress in [10, 60, 100] {
                tokio::time::sleep(Duration::from_millis(20)).await;
                emitter.emit("job.progress", &Job { id: 1, progress });
            }
        });
    }
    let job = done.await?;
    info!(job_id = job.id, "job finished");

    // 超时：没有人发出该事件
    let opts = WaitOptions::<Job>::builder()
        .timeout(Duration::from_millis(50))
        .logger(Arc::new(TracingLogger))
        .build();
    match wait_for_event_with(&emitter, "job.cancelled", opts)?.await {
        Ok(job) => info!(job_id = job.id, "unexpected cancellation"),
        Err(err) => info!(error = %err, "no cancellation observed"),
    }

    // 过滤器出错：派发式事件源
    let dispatcher = EventDispatcher::<DispatchedEvent<String>>::new();
    let parsed = wait_for_event_filtered(
        &dispatcher,
        "input",
        try_filter_fn(|e: &DispatchedEvent<String>| e.detail.parse::<u32>().map(|n| n > 0)),
        WaitOptions::default(),
    )?;
    dispatcher.dispatch(&DispatchedEvent::new("input", "not a number".to_string()));
    if let Err(err) = parsed.await {
        info!(error = %err, "filter rejected input");
    }

    info!(
        emitter_listeners = emitter.total_listener_count(),
        dispatcher_listeners = dispatcher.total_listener_count(),
        "all waits settled"
    );
    Ok(())
}
