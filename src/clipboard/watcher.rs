use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use clipboard_master::{CallbackResult, ClipboardHandler, Master, Shutdown};
use tokio::sync::broadcast;

use crate::error::AppError;

const MONITOR_RESTART_BASE_DELAY_MS: u64 = 100;
const MONITOR_RESTART_MAX_DELAY_MS: u64 = 5_000;
const EVENT_CAPACITY: usize = 64;

fn compute_restart_backoff_ms(restart_attempt: u32) -> u64 {
    let exp = 1_u64 << restart_attempt.saturating_sub(1).min(6);
    MONITOR_RESTART_BASE_DELAY_MS
        .saturating_mul(exp)
        .min(MONITOR_RESTART_MAX_DELAY_MS)
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("剪贴板监听状态锁中毒，继续使用恢复数据");
            poisoned.into_inner()
        }
    }
}

/// 剪贴板变化事件，不携带负载，观察者需自行重新读取剪贴板。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardChanged;

pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// 一次系统变化通知订阅，drop 或 `cancel` 时退订。
pub struct FeedSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl FeedSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

/// 系统剪贴板变化通知的来源。
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, on_change: ChangeCallback) -> Result<FeedSubscription, AppError>;
}

/// 剪贴板变化监听器
///
/// `start` / `stop` 均幂等。`stop` 返回后保证不会再有事件发出：
/// 回调在闸门锁内检查开关，`stop` 先关闸再退订。
pub struct ClipboardWatcher {
    feed: Arc<dyn ChangeFeed>,
    subscription: Mutex<Option<(FeedSubscription, Arc<Mutex<bool>>)>>,
    events: broadcast::Sender<ClipboardChanged>,
}

impl ClipboardWatcher {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            feed,
            subscription: Mutex::new(None),
            events,
        }
    }

    /// 基于 `clipboard-master` 的系统监听器。
    pub fn system() -> Self {
        Self::new(Arc::new(MasterFeed))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClipboardChanged> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        lock_or_recover(&self.subscription).is_some()
    }

    pub fn start(&self) -> Result<(), AppError> {
        let mut slot = lock_or_recover(&self.subscription);
        if slot.is_some() {
            return Ok(());
        }

        let gate = Arc::new(Mutex::new(true));
        let events = self.events.clone();
        let callback_gate = Arc::clone(&gate);
        let on_change: ChangeCallback = Arc::new(move || {
            let open = lock_or_recover(&callback_gate);
            if *open {
                // 没有订阅者时 send 返回错误，属于正常情况
                let _ = events.send(ClipboardChanged);
            }
        });

        let subscription = self.feed.subscribe(on_change)?;
        *slot = Some((subscription, gate));
        log::info!("📋 剪贴板监听已启动");
        Ok(())
    }

    pub fn stop(&self) {
        let taken = lock_or_recover(&self.subscription).take();
        if let Some((subscription, gate)) = taken {
            *lock_or_recover(&gate) = false;
            subscription.cancel();
            log::info!("📋 剪贴板监听已停止");
        }
    }
}

impl Drop for ClipboardWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// clipboard-master 实现
// ============================================================================

struct Handler {
    on_change: ChangeCallback,
    alive: Arc<AtomicBool>,
}

impl ClipboardHandler for Handler {
    fn on_clipboard_change(&mut self) -> CallbackResult {
        if !self.alive.load(Ordering::SeqCst) {
            return CallbackResult::Stop;
        }
        (self.on_change)();
        CallbackResult::Next
    }

    fn on_clipboard_error(&mut self, error: std::io::Error) -> CallbackResult {
        log::error!("剪贴板错误：{}", error);
        CallbackResult::Next
    }
}

/// 在独立线程运行 `clipboard_master::Master`，异常退出时按指数退避重启。
pub struct MasterFeed;

impl ChangeFeed for MasterFeed {
    fn subscribe(&self, on_change: ChangeCallback) -> Result<FeedSubscription, AppError> {
        let alive = Arc::new(AtomicBool::new(true));
        let shutdown_slot: Arc<Mutex<Option<Shutdown>>> = Arc::new(Mutex::new(None));

        let thread_alive = Arc::clone(&alive);
        let thread_slot = Arc::clone(&shutdown_slot);
        thread::Builder::new()
            .name("clipboard-watcher".to_string())
            .spawn(move || {
                let mut restart_attempt: u32 = 0;
                while thread_alive.load(Ordering::SeqCst) {
                    let handler = Handler {
                        on_change: Arc::clone(&on_change),
                        alive: Arc::clone(&thread_alive),
                    };
                    match Master::new(handler) {
                        Ok(mut master) => {
                            *lock_or_recover(&thread_slot) = Some(master.shutdown_channel());
                            if !thread_alive.load(Ordering::SeqCst) {
                                break;
                            }
                            restart_attempt = 0;
                            let _ = master.run();
                            if !thread_alive.load(Ordering::SeqCst) {
                                break;
                            }
                            log::warn!("📋 剪贴板监听已退出，将尝试重启");
                        }
                        Err(err) => {
                            log::error!("📋 创建剪贴板监听失败: {}", err);
                        }
                    }

                    restart_attempt = restart_attempt.saturating_add(1);
                    let backoff_ms = compute_restart_backoff_ms(restart_attempt);
                    log::warn!(
                        "📋 剪贴板监听 {}ms 后重试（attempt={}）",
                        backoff_ms,
                        restart_attempt
                    );
                    thread::sleep(Duration::from_millis(backoff_ms));
                }
            })?;

        Ok(FeedSubscription::new(move || {
            alive.store(false, Ordering::SeqCst);
            if let Some(shutdown) = lock_or_recover(&shutdown_slot).take() {
                shutdown.signal();
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::memory::MemoryClipboard;

    #[test]
    fn restart_backoff_grows_then_caps() {
        assert_eq!(compute_restart_backoff_ms(1), 100);
        assert_eq!(compute_restart_backoff_ms(2), 200);
        assert_eq!(compute_restart_backoff_ms(3), 400);
        assert_eq!(compute_restart_backoff_ms(7), 5_000);
        assert_eq!(compute_restart_backoff_ms(20), 5_000);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let clipboard = MemoryClipboard::new();
        let watcher = ClipboardWatcher::new(Arc::new(clipboard.feed()));

        watcher.start().expect("start");
        watcher.start().expect("start again");
        assert_eq!(clipboard.subscriber_count(), 1);

        watcher.stop();
        watcher.stop();
        assert!(!watcher.is_running());
        assert_eq!(clipboard.subscriber_count(), 0);
    }

    #[test]
    fn events_flow_only_while_started() {
        let clipboard = MemoryClipboard::new();
        let watcher = ClipboardWatcher::new(Arc::new(clipboard.feed()));
        let mut rx = watcher.subscribe();

        clipboard.set_text("before start");
        assert!(rx.try_recv().is_err());

        watcher.start().expect("start");
        clipboard.set_text("one");
        clipboard.set_text("two");
        assert_eq!(rx.try_recv(), Ok(ClipboardChanged));
        assert_eq!(rx.try_recv(), Ok(ClipboardChanged));

        watcher.stop();
        clipboard.set_text("after stop");
        assert!(rx.try_recv().is_err());
    }
}
