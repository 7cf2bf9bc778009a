//! # PasteEx 命令行入口
//!
//! 本文件只负责参数解析、日志初始化与各组件的装配，
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use paste_ex::clipboard::catalog::normalize_extension;
use paste_ex::clipboard::platform::open_system_clipboard;
use paste_ex::clipboard::{ClipboardActor, ClipboardHandle, ClipboardWatcher, Snapshot};
use paste_ex::error::AppError;
use paste_ex::hotkey::{HotkeyBinding, HotkeyListener};
use paste_ex::monitor::{
    ExplorerLocator, MonitorConfig, MonitorCoordinator, OverwriteDecision, Presenter, QuickPaste,
    QuickPasteOutcome,
};
use paste_ex::naming::allocate_file_name;
use paste_ex::persist::{PersistenceEngine, SavedFile};
use paste_ex::settings::{self, AppSettings};
use paste_ex::{shell, storage};

#[derive(Parser)]
#[command(name = "paste-ex", version)]
#[command(about = "把剪贴板内容直接保存为文件", long_about = None)]
struct Cli {
    /// 设置文件路径（默认位于系统配置目录）
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 列出当前剪贴板可导出的扩展名（优先级从高到低）
    Formats,
    /// 保存当前剪贴板
    Save {
        /// 目标文件夹，默认桌面
        #[arg(short, long)]
        folder: Option<PathBuf>,
        /// 文件名（不含扩展名），默认按日期分配
        #[arg(short, long)]
        name: Option<String>,
        /// 扩展名，默认使用优先级最高的候选
        #[arg(short, long)]
        ext: Option<String>,
        /// 目标已存在时直接覆盖
        #[arg(short, long)]
        yes: bool,
    },
    /// 快速粘贴到指定文件夹（右键菜单入口）
    Quick {
        location: String,
        file_name: Option<String>,
        /// 目标已存在时直接覆盖
        #[arg(short, long)]
        yes: bool,
    },
    /// 监控模式：复制的图片自动转为文件，快捷键快速粘贴，Ctrl-C 退出
    Monitor {
        /// 覆盖设置中的快捷键，例如 Ctrl+Alt+X
        #[arg(long)]
        hotkey: Option<String>,
        /// 关闭图片自动转文件
        #[arg(long)]
        no_auto_convert: bool,
    },
    /// 显示前台文件管理器正在浏览的文件夹
    Where,
}

struct ConsolePresenter {
    assume_yes: bool,
}

impl Presenter for ConsolePresenter {
    fn enter_background(&self) {
        println!("监控模式已启动，按 Ctrl-C 退出");
    }

    fn warn(&self, error: &AppError) {
        eprintln!("⚠️ {}", error);
    }

    fn confirm_overwrite(&self, path: &Path) -> OverwriteDecision {
        if self.assume_yes {
            return OverwriteDecision::Overwrite;
        }

        print!("{} 已存在，是否覆盖？[y/N] ", path.display());
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return OverwriteDecision::Skip;
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => OverwriteDecision::Overwrite,
            _ => OverwriteDecision::Skip,
        }
    }

    fn notify_saved(&self, file: &SavedFile) {
        println!("{}", file.path.display());
    }
}

fn open_clipboard(settings: &AppSettings) -> Result<ClipboardHandle, AppError> {
    Ok(ClipboardActor::spawn(open_system_clipboard)?.with_timeout(settings.clipboard_timeout()))
}

async fn run_formats(settings: &AppSettings) -> Result<(), AppError> {
    let clipboard = open_clipboard(settings)?;
    let snapshot = Snapshot::take(&clipboard).await?;
    let extensions = snapshot.analyze();
    if extensions.is_empty() {
        return Err(AppError::NoRecognizedFormat);
    }
    for candidate in snapshot.candidates() {
        println!("{}\t{}", candidate.extension, candidate.format);
    }
    Ok(())
}

async fn run_save(
    settings: &AppSettings,
    folder: Option<PathBuf>,
    name: Option<String>,
    ext: Option<String>,
    assume_yes: bool,
) -> Result<(), AppError> {
    let clipboard = open_clipboard(settings)?;
    let engine = PersistenceEngine::new(clipboard.clone(), settings.persist_config());
    let presenter = ConsolePresenter { assume_yes };

    let snapshot = Snapshot::take(&clipboard).await?;
    let top = snapshot
        .top_candidate()
        .ok_or(AppError::NoRecognizedFormat)?
        .extension
        .clone();
    let ext = ext.map(|e| normalize_extension(&e)).unwrap_or(top);
    let folder = folder.unwrap_or_else(storage::desktop_dir);
    if !folder.is_dir() {
        return Err(AppError::TargetPathNotExist(folder));
    }
    let name = match name {
        Some(name) => name,
        None => allocate_file_name(&folder, &ext).await?,
    };
    let request = snapshot.request(folder.join(format!("{}.{}", name, ext)), &ext)?;

    if request.path().exists()
        && presenter.confirm_overwrite(request.path()) == OverwriteDecision::Skip
    {
        println!("已跳过");
        return Ok(());
    }

    let saved = engine
        .save_async(request)
        .wait_timeout(settings.save_timeout())
        .await?;
    presenter.notify_saved(&saved);
    Ok(())
}

async fn run_quick(
    settings: &AppSettings,
    location: &str,
    file_name: Option<&str>,
    assume_yes: bool,
) -> Result<(), AppError> {
    let clipboard = open_clipboard(settings)?;
    let engine = PersistenceEngine::new(clipboard, settings.persist_config());
    let quick = QuickPaste::new(
        engine,
        Arc::new(ConsolePresenter { assume_yes }),
        settings.save_timeout(),
    );

    match quick.quick_paste_ex(location, file_name).await? {
        QuickPasteOutcome::Saved(_) => {}
        QuickPasteOutcome::Skipped(path) => println!("已跳过 {}", path.display()),
    }
    Ok(())
}

async fn run_monitor(
    settings: &AppSettings,
    hotkey: Option<String>,
    no_auto_convert: bool,
) -> Result<(), AppError> {
    let hotkey: HotkeyBinding = match hotkey {
        Some(text) => text.parse()?,
        None => settings.hotkey_binding()?,
    };
    let config = MonitorConfig {
        auto_image_to_file: settings.auto_image_to_file && !no_auto_convert,
        hotkey,
        temp_dir: storage::temp_dir(settings)?,
        save_timeout: settings.save_timeout(),
    };
    log::info!("📂 临时目录: {}", config.temp_dir.display());

    let clipboard = open_clipboard(settings)?;
    let engine = PersistenceEngine::new(clipboard, settings.persist_config());
    let handle = MonitorCoordinator::new(
        engine,
        ClipboardWatcher::system(),
        HotkeyListener::system(),
        Arc::new(ConsolePresenter { assume_yes: true }),
        Arc::new(ExplorerLocator),
        config,
    )
    .spawn();

    handle.start_monitor_mode().await?;
    tokio::signal::ctrl_c().await?;

    let stopped = handle.stop_monitor_mode().await;
    handle.shutdown().await;
    stopped
}

fn run_where() -> Result<(), AppError> {
    match shell::active_explorer_location() {
        Some(path) => println!("{}", path.display()),
        None => println!("未找到活动的文件管理器窗口"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings_path = cli.settings.clone().or_else(settings::default_settings_path);
    let settings = settings::load_or_default(settings_path.as_deref());

    let result = match cli.command {
        Commands::Formats => run_formats(&settings).await,
        Commands::Save {
            folder,
            name,
            ext,
            yes,
        } => run_save(&settings, folder, name, ext, yes).await,
        Commands::Quick {
            location,
            file_name,
            yes,
        } => run_quick(&settings, &location, file_name.as_deref(), yes).await,
        Commands::Monitor {
            hotkey,
            no_auto_convert,
        } => run_monitor(&settings, hotkey, no_auto_convert).await,
        Commands::Where => run_where(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_fatal() => {
            log::error!("❌ {}", err);
            eprintln!("❌ {}", err);
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("❌ {}", err);
            ExitCode::FAILURE
        }
    }
}
