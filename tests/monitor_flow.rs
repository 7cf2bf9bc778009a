// 监控模式端到端流程：进程内剪贴板 + 手动快捷键驱动协调器
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use paste_ex::clipboard::memory::MemoryClipboard;
use paste_ex::clipboard::{ClipboardActor, ClipboardWatcher, RawImage};
use paste_ex::error::AppError;
use paste_ex::hotkey::{HotkeyBinding, HotkeyListener, ManualHotkeys};
use paste_ex::monitor::{
    FolderLocator, MonitorConfig, MonitorCoordinator, MonitorHandle, MonitorState,
    OverwriteDecision, Presenter,
};
use paste_ex::persist::{PersistConfig, PersistenceEngine, SavedFile};
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct RecordingPresenter {
    backgrounds: Mutex<usize>,
    warnings: Mutex<Vec<String>>,
    saved: Mutex<Vec<PathBuf>>,
}

impl RecordingPresenter {
    fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().unwrap().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn enter_background(&self) {
        *self.backgrounds.lock().unwrap() += 1;
    }

    fn warn(&self, error: &AppError) {
        self.warnings.lock().unwrap().push(error.to_string());
    }

    fn confirm_overwrite(&self, _path: &Path) -> OverwriteDecision {
        OverwriteDecision::Overwrite
    }

    fn notify_saved(&self, file: &SavedFile) {
        self.saved.lock().unwrap().push(file.path.clone());
    }
}

struct Rig {
    memory: MemoryClipboard,
    hotkeys: ManualHotkeys,
    presenter: Arc<RecordingPresenter>,
    handle: MonitorHandle,
    binding: HotkeyBinding,
}

fn red_image() -> RawImage {
    RawImage {
        width: 2,
        height: 2,
        bytes: [255, 0, 0, 255].repeat(4),
    }
}

fn large_image(side: usize) -> RawImage {
    RawImage {
        width: side,
        height: side,
        bytes: [0, 128, 255, 255].repeat(side * side),
    }
}

fn rig(temp_dir: &Path, paste_dir: Option<PathBuf>) -> Rig {
    rig_with(MemoryClipboard::new(), ManualHotkeys::new(), temp_dir, paste_dir)
}

fn rig_with(
    memory: MemoryClipboard,
    hotkeys: ManualHotkeys,
    temp_dir: &Path,
    paste_dir: Option<PathBuf>,
) -> Rig {
    let backend = memory.clone();
    let clipboard = ClipboardActor::spawn(move || Ok(backend)).expect("spawn clipboard actor");
    let engine = PersistenceEngine::new(clipboard, PersistConfig::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let locator: Arc<dyn FolderLocator> = Arc::new(move || paste_dir.clone());
    let binding: HotkeyBinding = "Ctrl+Alt+X".parse().unwrap();

    let handle = MonitorCoordinator::new(
        engine,
        ClipboardWatcher::new(Arc::new(memory.feed())),
        HotkeyListener::new(Arc::new(hotkeys.clone())),
        presenter.clone(),
        locator,
        MonitorConfig {
            auto_image_to_file: true,
            hotkey: binding.clone(),
            temp_dir: temp_dir.to_path_buf(),
            save_timeout: WAIT,
        },
    )
    .spawn();

    Rig {
        memory,
        hotkeys,
        presenter,
        handle,
        binding,
    }
}

async fn next_states(
    rx: &mut broadcast::Receiver<MonitorState>,
    count: usize,
) -> Vec<MonitorState> {
    let mut states = Vec::new();
    for _ in 0..count {
        let state = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("transition in time")
            .expect("transition channel open");
        states.push(state);
    }
    states
}

async fn file_count(dir: &Path) -> usize {
    tokio::time::timeout(WAIT, async {
        loop {
            let count = fs::read_dir(dir).unwrap().count();
            if count > 0 {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("file written in time")
}

async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn copied_image_becomes_file_reference_exactly_once() {
    let temp = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), None);

    rig.handle.start_monitor_mode().await.unwrap();
    assert_eq!(rig.handle.state(), MonitorState::Watching);
    assert_eq!(*rig.presenter.backgrounds.lock().unwrap(), 1);

    let mut transitions = rig.handle.subscribe_transitions();
    rig.memory.set_image(red_image());

    assert_eq!(
        next_states(&mut transitions, 3).await,
        vec![MonitorState::Saving, MonitorState::Restoring, MonitorState::Watching]
    );

    let writes = rig.memory.file_drop_writes();
    assert_eq!(writes.len(), 1);
    let saved = &writes[0][0];
    assert!(saved.starts_with(temp.path()));
    assert_eq!(saved.extension().unwrap(), "png");
    assert!(fs::metadata(saved).unwrap().len() > 0);
    assert_eq!(rig.presenter.saved(), vec![saved.clone()]);

    // 写入的文件引用不能再次触发转换
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(transitions.try_recv().is_err());
    assert_eq!(rig.memory.file_drop_writes().len(), 1);
    assert_eq!(rig.handle.state(), MonitorState::Watching);

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn text_changes_are_ignored() {
    let temp = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), None);
    rig.handle.start_monitor_mode().await.unwrap();

    let mut transitions = rig.handle.subscribe_transitions();
    rig.memory.set_text("just text");
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(transitions.try_recv().is_err());
    assert!(rig.memory.file_drop_writes().is_empty());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_auto_convert_leaves_images_alone() {
    let temp = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), None);
    rig.handle.start_monitor_mode().await.unwrap();
    rig.handle.set_auto_image_to_file(false).unwrap();

    rig.memory.set_image(red_image());
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(rig.handle.state(), MonitorState::Watching);
    assert!(rig.memory.file_drop_writes().is_empty());

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_save_returns_to_watching_with_warning() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("gone");
    let rig = rig(&missing, None);
    rig.handle.start_monitor_mode().await.unwrap();

    let mut transitions = rig.handle.subscribe_transitions();
    rig.memory.set_image(red_image());

    assert_eq!(
        next_states(&mut transitions, 2).await,
        vec![MonitorState::Saving, MonitorState::Watching]
    );
    assert_eq!(rig.presenter.warnings().len(), 1);
    assert!(rig.memory.file_drop_writes().is_empty());

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_clipboard_write_still_resumes_watching() {
    let temp = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), None);
    rig.memory.fail_writes(true);
    rig.handle.start_monitor_mode().await.unwrap();

    let mut transitions = rig.handle.subscribe_transitions();
    rig.memory.set_image(red_image());

    assert_eq!(
        next_states(&mut transitions, 3).await,
        vec![MonitorState::Saving, MonitorState::Restoring, MonitorState::Watching]
    );
    assert_eq!(rig.presenter.warnings().len(), 1);
    assert_eq!(rig.memory.subscriber_count(), 1);

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_releases_watcher_and_hotkey() {
    let temp = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), None);

    rig.handle.start_monitor_mode().await.unwrap();
    // 重复启动无副作用
    rig.handle.start_monitor_mode().await.unwrap();
    assert_eq!(rig.memory.subscriber_count(), 1);
    assert!(rig.hotkeys.is_registered(&rig.binding));

    rig.handle.stop_monitor_mode().await.unwrap();
    assert_eq!(rig.handle.state(), MonitorState::Idle);
    assert_eq!(rig.memory.subscriber_count(), 0);
    assert!(!rig.hotkeys.is_registered(&rig.binding));

    rig.memory.set_image(red_image());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rig.memory.file_drop_writes().is_empty());

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handle_reports_missing_coordinator_after_shutdown() {
    let temp = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), None);
    rig.handle.shutdown().await;

    let err = rig.handle.stop_monitor_mode().await.unwrap_err();
    assert!(matches!(err, AppError::NoMainWindow));
    assert!(err.is_fatal());
    assert!(matches!(
        rig.handle.start_monitor_mode().await,
        Err(AppError::NoMainWindow)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn occupied_hotkey_is_a_warning_not_a_failure() {
    let temp = tempfile::tempdir().unwrap();
    let hotkeys = ManualHotkeys::new();
    hotkeys.occupy("Ctrl+Alt+X".parse().unwrap());
    let rig = rig_with(MemoryClipboard::new(), hotkeys, temp.path(), None);

    rig.handle.start_monitor_mode().await.unwrap();

    assert_eq!(rig.handle.state(), MonitorState::Watching);
    assert_eq!(rig.presenter.warnings().len(), 1);
    assert!(!rig.hotkeys.is_registered(&rig.binding));
    assert_eq!(rig.memory.subscriber_count(), 1);

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hotkey_pastes_into_active_folder() {
    let temp = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), Some(target.path().to_path_buf()));
    rig.memory.set_text("hello from hotkey");

    rig.handle.start_monitor_mode().await.unwrap();
    assert!(rig.hotkeys.press(&rig.binding));

    let presenter = rig.presenter.clone();
    assert!(eventually(move || presenter.saved().len() == 1).await);

    let saved = rig.presenter.saved().remove(0);
    assert_eq!(saved.parent().unwrap(), target.path());
    assert_eq!(saved.extension().unwrap(), "txt");
    assert!(saved
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("Clipboard_"));
    assert_eq!(fs::read_to_string(&saved).unwrap(), "hello from hotkey");
    assert!(rig.presenter.warnings().is_empty());

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hotkey_without_explorer_window_does_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), None);
    rig.memory.set_text("unused");

    rig.handle.start_monitor_mode().await.unwrap();
    assert!(rig.hotkeys.press(&rig.binding));
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(rig.presenter.saved().is_empty());
    assert!(rig.presenter.warnings().is_empty());

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_hotkey_presses_write_separate_files() {
    let temp = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), Some(target.path().to_path_buf()));
    rig.memory.set_image(large_image(1500));

    rig.handle.start_monitor_mode().await.unwrap();
    rig.handle.set_auto_image_to_file(false).unwrap();
    assert!(rig.hotkeys.press(&rig.binding));
    assert!(rig.hotkeys.press(&rig.binding));

    let presenter = rig.presenter.clone();
    assert!(
        tokio::time::timeout(WAIT, async move {
            while presenter.saved().len() < 2 {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .is_ok()
    );

    let saved = rig.presenter.saved();
    assert_ne!(saved[0], saved[1]);
    assert_eq!(fs::read_dir(target.path()).unwrap().count(), 2);
    assert!(rig.presenter.warnings().is_empty());

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_while_saving_discards_the_late_save() {
    let temp = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), None);
    rig.handle.start_monitor_mode().await.unwrap();

    let mut transitions = rig.handle.subscribe_transitions();
    rig.memory.set_image(large_image(2000));
    assert_eq!(next_states(&mut transitions, 1).await, vec![MonitorState::Saving]);

    rig.handle.stop_monitor_mode().await.unwrap();
    rig.handle.start_monitor_mode().await.unwrap();

    // 被打断的保存仍会落盘，但它的完成消息已过期
    assert_eq!(file_count(temp.path()).await, 1);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        next_states(&mut transitions, 2).await,
        vec![MonitorState::Idle, MonitorState::Watching]
    );
    assert!(transitions.try_recv().is_err());
    assert_eq!(rig.handle.state(), MonitorState::Watching);
    assert!(rig.memory.file_drop_writes().is_empty());
    assert!(rig.presenter.saved().is_empty());

    rig.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_while_restoring_ignores_the_late_write() {
    let temp = tempfile::tempdir().unwrap();
    let rig = rig(temp.path(), None);
    rig.memory.delay_writes(Duration::from_millis(500));
    rig.handle.start_monitor_mode().await.unwrap();

    let mut transitions = rig.handle.subscribe_transitions();
    rig.memory.set_image(red_image());
    assert_eq!(
        next_states(&mut transitions, 2).await,
        vec![MonitorState::Saving, MonitorState::Restoring]
    );

    rig.handle.stop_monitor_mode().await.unwrap();
    rig.handle.start_monitor_mode().await.unwrap();

    let memory = rig.memory.clone();
    assert!(eventually(move || memory.file_drop_writes().len() == 1).await);
    tokio::time::sleep(Duration::from_millis(300)).await;

    // 迟到的文件引用是拖放内容，不会再触发一次转换
    assert_eq!(
        next_states(&mut transitions, 2).await,
        vec![MonitorState::Idle, MonitorState::Watching]
    );
    assert!(transitions.try_recv().is_err());
    assert_eq!(rig.handle.state(), MonitorState::Watching);
    assert_eq!(rig.memory.file_drop_writes().len(), 1);
    assert_eq!(rig.memory.subscriber_count(), 1);

    rig.handle.shutdown().await;
}
