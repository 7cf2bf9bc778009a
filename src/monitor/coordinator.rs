//! 监控模式协调器
//!
//! # 设计思路
//!
//! 监控模式下复制图片后，剪贴板内容会被替换为指向临时文件的文件引用，
//! 这样可以直接在资源管理器里粘贴出图片文件。替换本身也是一次剪贴板变化，
//! 必须避免自我触发：写入前停止监听，写入完成后再恢复。
//!
//! 状态机：
//!
//! ```text
//! Idle ──start──▶ Watching ──图片变化──▶ Saving ──保存成功──▶ Restoring
//!                    ▲                     │                     │
//!                    └──────保存失败────────┘◀────写入完成────────┘
//! 任意状态 ──stop──▶ Idle
//! ```
//!
//! # 实现思路
//!
//! - 状态只由一个 tokio 任务持有；快捷键、剪贴板变化、保存完成、控制命令
//!   全部汇入同一个有序的 `MonitorEvent` 队列，天然避免竞争。
//! - 每个保存周期有递增编号，`stop` 也会推进编号，被打断周期的迟到完成
//!   按编号识别后丢弃。
//! - 转发任务与协调器只持有队列的弱引用，所有 `MonitorHandle` 释放后队列关闭，
//!   协调器随之退出。
//! - 快捷键注册要等监听线程回报、注销要等线程退出，文件名分配要探测目录，
//!   这些阻塞操作都放到 `spawn_blocking` 中执行，不占用协调器任务。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::presenter::{FolderLocator, Presenter};
use super::quick_paste::{QuickPaste, QuickPasteOutcome};
use crate::clipboard::{ClipboardWatcher, SaveStrategy, Snapshot};
use crate::error::AppError;
use crate::hotkey::{HotkeyBinding, HotkeyListener, KeyPressed};
use crate::naming::{allocate_file_name, shorten_for_display, DEFAULT_DISPLAY_WIDTH};
use crate::persist::{PersistenceEngine, SavedFile};

const TRANSITION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Watching,
    Saving,
    Restoring,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub auto_image_to_file: bool,
    pub hotkey: HotkeyBinding,
    /// 自动转换图片的保存目录，须已存在。
    pub temp_dir: PathBuf,
    pub save_timeout: Duration,
}

enum MonitorEvent {
    Start(oneshot::Sender<Result<(), AppError>>),
    Stop(oneshot::Sender<()>),
    SetAutoImageToFile(bool),
    ClipboardChanged,
    KeyPressed(KeyPressed),
    SaveCompleted {
        cycle: u64,
        result: Result<SavedFile, AppError>,
    },
    RestoreCompleted {
        cycle: u64,
        result: Result<(), AppError>,
    },
    Shutdown(oneshot::Sender<()>),
}

pub struct MonitorCoordinator {
    engine: PersistenceEngine,
    watcher: ClipboardWatcher,
    hotkeys: Arc<HotkeyListener>,
    presenter: Arc<dyn Presenter>,
    locator: Arc<dyn FolderLocator>,
    config: MonitorConfig,
}

impl MonitorCoordinator {
    pub fn new(
        engine: PersistenceEngine,
        watcher: ClipboardWatcher,
        hotkeys: HotkeyListener,
        presenter: Arc<dyn Presenter>,
        locator: Arc<dyn FolderLocator>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            engine,
            watcher,
            hotkeys: Arc::new(hotkeys),
            presenter,
            locator,
            config,
        }
    }

    /// 在当前 tokio 运行时上启动协调器任务。
    pub fn spawn(self) -> MonitorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(MonitorState::Idle);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        let weak = tx.downgrade();

        let forwarders = vec![
            forward(self.watcher.subscribe(), weak.clone(), |_| {
                MonitorEvent::ClipboardChanged
            }),
            forward(self.hotkeys.subscribe(), weak.clone(), MonitorEvent::KeyPressed),
        ];

        let quick = QuickPaste::new(
            self.engine.clone(),
            Arc::clone(&self.presenter),
            self.config.save_timeout,
        );

        let worker = Worker {
            parts: self,
            quick,
            queue: weak,
            state: MonitorState::Idle,
            cycle: 0,
            state_tx,
            transitions: transitions.clone(),
            forwarders,
        };
        tokio::spawn(worker.run(rx));

        MonitorHandle {
            tx,
            state: state_rx,
            transitions,
        }
    }
}

fn forward<T: Clone + Send + 'static>(
    mut rx: broadcast::Receiver<T>,
    queue: mpsc::WeakUnboundedSender<MonitorEvent>,
    map: fn(T) -> MonitorEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(value) => map(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("⚠️ 监控事件积压，已丢弃 {} 条", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(queue) = queue.upgrade() else {
                break;
            };
            if queue.send(event).is_err() {
                break;
            }
        }
    })
}

struct Worker {
    parts: MonitorCoordinator,
    quick: QuickPaste,
    queue: mpsc::WeakUnboundedSender<MonitorEvent>,
    state: MonitorState,
    cycle: u64,
    state_tx: watch::Sender<MonitorState>,
    transitions: broadcast::Sender<MonitorState>,
    forwarders: Vec<JoinHandle<()>>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<MonitorEvent>) {
        log::debug!("🛰️ 监控协调器已启动");
        while let Some(event) = rx.recv().await {
            match event {
                MonitorEvent::Start(reply) => {
                    let result = self.start().await;
                    let _ = reply.send(result);
                }
                MonitorEvent::Stop(reply) => {
                    self.stop().await;
                    let _ = reply.send(());
                }
                MonitorEvent::SetAutoImageToFile(enabled) => {
                    self.parts.config.auto_image_to_file = enabled;
                    log::info!("🖼️ 图片自动转文件: {}", if enabled { "开启" } else { "关闭" });
                }
                MonitorEvent::ClipboardChanged => self.on_clipboard_changed().await,
                MonitorEvent::KeyPressed(pressed) => self.on_key_pressed(pressed),
                MonitorEvent::SaveCompleted { cycle, result } => {
                    self.on_save_completed(cycle, result)
                }
                MonitorEvent::RestoreCompleted { cycle, result } => {
                    self.on_restore_completed(cycle, result)
                }
                MonitorEvent::Shutdown(reply) => {
                    self.shutdown().await;
                    let _ = reply.send(());
                    return;
                }
            }
        }
        self.shutdown().await;
    }

    fn set_state(&mut self, next: MonitorState) {
        if self.state == next {
            return;
        }
        log::info!("🔄 监控状态: {:?} → {:?}", self.state, next);
        self.state = next;
        self.state_tx.send_replace(next);
        let _ = self.transitions.send(next);
    }

    async fn register_hotkey(&self) -> Result<(), AppError> {
        let hotkeys = Arc::clone(&self.parts.hotkeys);
        let binding = self.parts.config.hotkey.clone();
        tokio::task::spawn_blocking(move || hotkeys.register(binding))
            .await
            .map_err(|e| AppError::internal(format!("快捷键注册任务异常：{}", e)))?
    }

    async fn unregister_hotkey(&self) {
        let hotkeys = Arc::clone(&self.parts.hotkeys);
        if let Err(err) = tokio::task::spawn_blocking(move || hotkeys.unregister()).await {
            log::warn!("⚠️ 快捷键注销任务异常: {}", err);
        }
    }

    async fn start(&mut self) -> Result<(), AppError> {
        if self.state != MonitorState::Idle {
            return Ok(());
        }

        if let Err(err) = self.register_hotkey().await {
            log::warn!("⚠️ 快捷键不可用，监控模式继续运行: {}", err);
            self.parts.presenter.warn(&err);
        }

        if let Err(err) = self.parts.watcher.start() {
            self.unregister_hotkey().await;
            return Err(err);
        }

        self.parts.presenter.enter_background();
        self.set_state(MonitorState::Watching);
        Ok(())
    }

    async fn stop(&mut self) {
        self.unregister_hotkey().await;
        self.parts.watcher.stop();
        self.cycle += 1;
        self.set_state(MonitorState::Idle);
    }

    async fn shutdown(&mut self) {
        self.stop().await;
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }
        log::debug!("🛰️ 监控协调器已退出");
    }

    fn resume_watching(&mut self) {
        if let Err(err) = self.parts.watcher.start() {
            log::error!("❌ 恢复剪贴板监听失败: {}", err);
            self.parts.presenter.warn(&err);
        }
        self.set_state(MonitorState::Watching);
    }

    async fn on_clipboard_changed(&mut self) {
        if self.state != MonitorState::Watching || !self.parts.config.auto_image_to_file {
            return;
        }

        let snapshot = match Snapshot::take(self.parts.engine.clipboard()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("⚠️ 读取剪贴板失败: {}", err);
                return;
            }
        };

        // 复制的图片文件本身已经是文件引用，只转换位图类内容
        let extension = match snapshot.top_candidate() {
            Some(top) if top.is_image() && top.strategy == SaveStrategy::Image => {
                top.extension.clone()
            }
            _ => return,
        };

        let folder = self.parts.config.temp_dir.clone();
        let name = match allocate_file_name(&folder, &extension).await {
            Ok(name) => name,
            Err(err) => {
                log::warn!("⚠️ 无法分配文件名: {}", err);
                return;
            }
        };
        let path = folder.join(format!("{}.{}", name, extension));
        let request = match snapshot.request(path, &extension) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("⚠️ 无法构造保存请求: {}", err);
                return;
            }
        };

        self.parts.watcher.stop();
        self.cycle += 1;
        let cycle = self.cycle;
        self.set_state(MonitorState::Saving);

        let ticket = self.parts.engine.save_async(request);
        let Some(queue) = self.queue.upgrade() else {
            return;
        };
        let timeout = self.parts.config.save_timeout;
        tokio::spawn(async move {
            let result = ticket.wait_timeout(timeout).await;
            let _ = queue.send(MonitorEvent::SaveCompleted { cycle, result });
        });
    }

    fn on_save_completed(&mut self, cycle: u64, result: Result<SavedFile, AppError>) {
        if cycle != self.cycle || self.state != MonitorState::Saving {
            log::debug!("忽略过期的保存完成（cycle={}）", cycle);
            return;
        }

        match result {
            Ok(saved) => {
                self.parts.presenter.notify_saved(&saved);
                self.set_state(MonitorState::Restoring);
                let Some(queue) = self.queue.upgrade() else {
                    return;
                };
                let clipboard = self.parts.engine.clipboard().clone();
                tokio::spawn(async move {
                    let result = clipboard.write_file_drop(vec![saved.path]).await;
                    let _ = queue.send(MonitorEvent::RestoreCompleted { cycle, result });
                });
            }
            Err(err) => {
                log::error!("❌ 自动保存图片失败: {}", err);
                self.parts.presenter.warn(&err);
                self.resume_watching();
            }
        }
    }

    fn on_restore_completed(&mut self, cycle: u64, result: Result<(), AppError>) {
        if cycle != self.cycle || self.state != MonitorState::Restoring {
            log::debug!("忽略过期的剪贴板写入完成（cycle={}）", cycle);
            return;
        }
        if let Err(err) = result {
            log::error!("❌ 写入文件引用失败: {}", err);
            self.parts.presenter.warn(&err);
        }
        self.resume_watching();
    }

    fn on_key_pressed(&mut self, pressed: KeyPressed) {
        if self.state == MonitorState::Idle {
            return;
        }
        log::info!("⌨️ {} 触发快速粘贴", pressed.binding);

        let locator = Arc::clone(&self.parts.locator);
        let presenter = Arc::clone(&self.parts.presenter);
        let quick = self.quick.clone();
        tokio::spawn(async move {
            let folder = match tokio::task::spawn_blocking(move || locator.active_folder()).await {
                Ok(Some(folder)) => folder,
                Ok(None) => {
                    log::info!("🗂️ 没有找到活动的文件管理器窗口，忽略快捷键");
                    return;
                }
                Err(err) => {
                    log::warn!("⚠️ 查询文件管理器失败: {}", err);
                    return;
                }
            };

            match quick
                .quick_paste_ex(&folder.to_string_lossy(), None)
                .await
            {
                Ok(QuickPasteOutcome::Saved(saved)) => log::info!(
                    "✅ 快速粘贴完成: {}",
                    shorten_for_display(&saved.path.display().to_string(), DEFAULT_DISPLAY_WIDTH)
                ),
                Ok(QuickPasteOutcome::Skipped(_)) => {}
                Err(err) => {
                    log::warn!("⚠️ 快速粘贴失败: {}", err);
                    presenter.warn(&err);
                }
            }
        });
    }
}

/// 协调器的控制句柄，可克隆。
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::UnboundedSender<MonitorEvent>,
    state: watch::Receiver<MonitorState>,
    transitions: broadcast::Sender<MonitorState>,
}

impl MonitorHandle {
    /// 注册快捷键、开始监听剪贴板并切到后台。重复调用无副作用。
    pub async fn start_monitor_mode(&self) -> Result<(), AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MonitorEvent::Start(reply))
            .map_err(|_| AppError::NoMainWindow)?;
        rx.await.map_err(|_| AppError::NoMainWindow)?
    }

    /// 从任意状态回到 `Idle`。协调器已不存在时返回 `NoMainWindow`。
    pub async fn stop_monitor_mode(&self) -> Result<(), AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MonitorEvent::Stop(reply))
            .map_err(|_| AppError::NoMainWindow)?;
        rx.await.map_err(|_| AppError::NoMainWindow)
    }

    pub fn set_auto_image_to_file(&self, enabled: bool) -> Result<(), AppError> {
        self.tx
            .send(MonitorEvent::SetAutoImageToFile(enabled))
            .map_err(|_| AppError::NoMainWindow)
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// 订阅此后的每一次状态切换。
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<MonitorState> {
        self.transitions.subscribe()
    }

    /// 等待进入指定状态。
    pub async fn wait_for_state(
        &self,
        wanted: MonitorState,
        timeout: Duration,
    ) -> Result<(), AppError> {
        let mut state = self.state.clone();
        tokio::time::timeout(timeout, state.wait_for(|current| *current == wanted))
            .await
            .map_err(|_| AppError::Timeout(format!("等待监控状态 {:?}", wanted)))?
            .map(|_| ())
            .map_err(|_| AppError::NoMainWindow)
    }

    /// 停止监控并结束协调器任务。
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(MonitorEvent::Shutdown(reply)).is_ok() {
            let _ = rx.await;
        }
    }
}
