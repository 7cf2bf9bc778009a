//! 剪贴板线程（actor）
//!
//! # 设计思路
//!
//! 系统剪贴板是单一共享资源，OS 要求读写发生在允许持有剪贴板的线程上。
//! 这里把这一隐式约束显式化：一个专用线程独占 `ClipboardBackend`，
//! 其他组件只能通过 `ClipboardHandle` 发送请求并等待应答。
//!
//! # 实现思路
//!
//! - 请求队列使用 `tokio::sync::mpsc`，剪贴板线程内以 `blocking_recv` 消费，
//!   不依赖异步运行时。
//! - 每个请求携带一个 `oneshot` 应答通道。
//! - 所有句柄被 drop 后队列关闭，线程自然退出。
//! - 等待应答有超时上限，避免 OS 剪贴板被长期占用时调用方无限挂起。

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::{ClipboardBackend, ClipboardCapture, ClipboardData, ClipboardFormat};
use crate::error::AppError;

pub const DEFAULT_CLIPBOARD_TIMEOUT: Duration = Duration::from_millis(5_000);

enum Request {
    Capture(oneshot::Sender<Result<ClipboardCapture, AppError>>),
    Read(ClipboardFormat, oneshot::Sender<Result<ClipboardData, AppError>>),
    WriteFileDrop(Vec<PathBuf>, oneshot::Sender<Result<(), AppError>>),
}

/// 剪贴板线程的启动入口。
pub struct ClipboardActor;

impl ClipboardActor {
    /// 启动剪贴板线程。
    ///
    /// `factory` 在线程内部执行，后端因此可以是非 `Send` 类型。
    /// 后端创建失败时错误会原样返回给调用方。
    pub fn spawn<F, B>(factory: F) -> Result<ClipboardHandle, AppError>
    where
        F: FnOnce() -> Result<B, AppError> + Send + 'static,
        B: ClipboardBackend + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Request>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), AppError>>();

        thread::Builder::new()
            .name("clipboard-owner".to_string())
            .spawn(move || {
                let backend = match factory() {
                    Ok(backend) => {
                        let _ = ready_tx.send(Ok(()));
                        backend
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                log::debug!("📋 剪贴板线程已启动");
                run(backend, rx);
                log::debug!("📋 剪贴板线程已退出");
            })?;

        ready_rx
            .recv()
            .map_err(|_| AppError::Clipboard("剪贴板线程启动失败".to_string()))??;

        Ok(ClipboardHandle {
            tx,
            timeout: DEFAULT_CLIPBOARD_TIMEOUT,
        })
    }
}

fn run<B: ClipboardBackend>(mut backend: B, mut rx: mpsc::UnboundedReceiver<Request>) {
    while let Some(request) = rx.blocking_recv() {
        match request {
            Request::Capture(reply) => {
                let _ = reply.send(backend.capture());
            }
            Request::Read(format, reply) => {
                let _ = reply.send(backend.read(&format));
            }
            Request::WriteFileDrop(paths, reply) => {
                let result = backend.write_file_drop(&paths);
                if let Err(err) = &result {
                    log::warn!("写入文件拖放引用失败: {}", err);
                }
                let _ = reply.send(result);
            }
        }
    }
}

/// 剪贴板线程的请求句柄，可廉价克隆。
#[derive(Clone)]
pub struct ClipboardHandle {
    tx: mpsc::UnboundedSender<Request>,
    timeout: Duration,
}

impl ClipboardHandle {
    /// 返回使用新超时设置的句柄副本。
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn capture(&self) -> Result<ClipboardCapture, AppError> {
        self.call("capture", Request::Capture).await
    }

    pub async fn read(&self, format: ClipboardFormat) -> Result<ClipboardData, AppError> {
        self.call("read", move |reply| Request::Read(format, reply)).await
    }

    pub async fn write_file_drop(&self, paths: Vec<PathBuf>) -> Result<(), AppError> {
        self.call("write_file_drop", move |reply| Request::WriteFileDrop(paths, reply))
            .await
    }

    async fn call<T>(
        &self,
        operation: &str,
        build: impl FnOnce(oneshot::Sender<Result<T, AppError>>) -> Request,
    ) -> Result<T, AppError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .map_err(|_| AppError::Clipboard("剪贴板线程已退出".to_string()))?;

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AppError::Clipboard(format!(
                "剪贴板线程未返回结果: {}",
                operation
            ))),
            Err(_) => Err(AppError::Timeout(format!(
                "剪贴板操作 {} 超过 {}ms",
                operation,
                self.timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread::ThreadId;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::clipboard::memory::MemoryClipboard;

    struct ThreadRecorder {
        inner: MemoryClipboard,
        seen: Arc<Mutex<Vec<ThreadId>>>,
    }

    impl ClipboardBackend for ThreadRecorder {
        fn formats(&mut self) -> Result<Vec<ClipboardFormat>, AppError> {
            self.seen.lock().unwrap().push(thread::current().id());
            self.inner.formats()
        }

        fn dropped_files(&mut self) -> Result<Vec<PathBuf>, AppError> {
            self.inner.dropped_files()
        }

        fn read(&mut self, format: &ClipboardFormat) -> Result<ClipboardData, AppError> {
            self.seen.lock().unwrap().push(thread::current().id());
            self.inner.read(format)
        }

        fn write_file_drop(&mut self, paths: &[PathBuf]) -> Result<(), AppError> {
            self.seen.lock().unwrap().push(thread::current().id());
            self.inner.write_file_drop(paths)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn all_requests_run_on_the_owner_thread() {
        let memory = MemoryClipboard::new();
        memory.set_text("hello");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = ThreadRecorder {
            inner: memory.clone(),
            seen: Arc::clone(&seen),
        };
        let handle = ClipboardActor::spawn(move || Ok(recorder)).expect("spawn actor");

        let capture = handle.capture().await.expect("capture");
        assert_eq!(capture.formats, vec![ClipboardFormat::UnicodeText]);
        let data = handle.read(ClipboardFormat::UnicodeText).await.expect("read");
        assert_eq!(data, ClipboardData::Text("hello".to_string()));
        handle
            .write_file_drop(vec![PathBuf::from("/tmp/a.png")])
            .await
            .expect("write");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|id| *id == seen[0]));
        assert_ne!(seen[0], thread::current().id());
    }

    #[test]
    fn factory_error_is_returned_to_caller() {
        let result = ClipboardActor::spawn(|| -> Result<MemoryClipboard, AppError> {
            Err(AppError::Clipboard("no display".to_string()))
        });
        assert!(matches!(result, Err(AppError::Clipboard(msg)) if msg == "no display"));
    }
}
