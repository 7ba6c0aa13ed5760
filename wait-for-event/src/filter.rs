//! 事件过滤器（EventFilter）
//!
//! 过滤器决定收到的事件是否满足等待条件，可以是异步的。
//! 闭包适配器接受任何实现 `Truthy` 的返回值：
//! - `bool`；
//! - 整数（非零为真）、浮点（非零且非 NaN 为真）；
//! - `&str`/`String`（非空为真）；
//! - `Option<T>`（`Some` 且内部为真才为真）；
//! - `()` 恒为假。
//!
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

/// 过滤器：判断事件是否匹配
#[async_trait]
pub trait EventFilter<E>: Send + Sync {
    /// 返回 `Ok(true)` 表示匹配；返回错误将使等待失败
    async fn matches(&self, event: &E) -> anyhow::Result<bool>;
}

/// 可判真假的值
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

macro_rules! impl_truthy_for_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl Truthy for $t {
                fn is_truthy(&self) -> bool {
                    *self != 0
                }
            }
        )*
    };
}

impl_truthy_for_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Truthy for f32 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for &str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().is_some_and(Truthy::is_truthy)
    }
}

impl Truthy for () {
    fn is_truthy(&self) -> bool {
        false
    }
}

/// 同步过滤器，见 [`filter_fn`]
pub struct FilterFn<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// 可失败的同步过滤器，见 [`try_filter_fn`]
pub struct TryFilterFn<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// 异步过滤器，见 [`async_filter_fn`]
pub struct AsyncFilterFn<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// 由同步闭包构造过滤器
pub fn filter_fn<E, F, T>(f: F) -> FilterFn<F, T>
where
    F: Fn(&E) -> T,
    T: Truthy,
{
    FilterFn {
        f,
        _marker: PhantomData,
    }
}

/// 由返回 `Result` 的同步闭包构造过滤器
pub fn try_filter_fn<E, F, T, Err>(f: F) -> TryFilterFn<F, T>
where
    F: Fn(&E) -> Result<T, Err>,
    T: Truthy,
    Err: Into<anyhow::Error>,
{
    TryFilterFn {
        f,
        _marker: PhantomData,
    }
}

/// 由异步闭包构造过滤器；闭包拿到事件的克隆
pub fn async_filter_fn<E, F, Fut, T, Err>(f: F) -> AsyncFilterFn<F, T>
where
    E: Clone,
    F: Fn(E) -> Fut,
    Fut: Future<Output = Result<T, Err>>,
    T: Truthy,
    Err: Into<anyhow::Error>,
{
    AsyncFilterFn {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<E, F, T> EventFilter<E> for FilterFn<F, T>
where
    E: Sync,
    F: Fn(&E) -> T + Send + Sync,
    T: Truthy,
{
    async fn matches(&self, event: &E) -> anyhow::Result<bool> {
        Ok((self.f)(event).is_truthy())
    }
}

#[async_trait]
impl<E, F, T, Err> EventFilter<E> for TryFilterFn<F, T>
where
    E: Sync,
    F: Fn(&E) -> Result<T, Err> + Send + Sync,
    T: Truthy,
    Err: Into<anyhow::Error>,
{
    async fn matches(&self, event: &E) -> anyhow::Result<bool> {
        (self.f)(event)
            .map(|verdict| verdict.is_truthy())
            .map_err(Into::into)
    }
}

#[async_trait]
impl<E, F, Fut, T, Err> EventFilter<E> for AsyncFilterFn<F, T>
where
    E: Clone + Send + Sync,
    F: Fn(E) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, Err>> + Send,
    T: Truthy,
    Err: Into<anyhow::Error>,
{
    async fn matches(&self, event: &E) -> anyhow::Result<bool> {
        (self.f)(event.clone())
            .await
            .map(|verdict| verdict.is_truthy())
            .map_err(Into::into)
    }
}

impl<F, T> fmt::Debug for FilterFn<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FilterFn")
    }
}

impl<F, T> fmt::Debug for TryFilterFn<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TryFilterFn")
    }
}

impl<F, T> fmt::Debug for AsyncFilterFn<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncFilterFn")
    }
}
