use anyhow::Result;
use log::info;

mod core;
mod player;

use player::{HeadlessPresenter, PlaybackManager};

fn main() -> Result<()> {
    // 初始化日志
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let path = match (args.next(), args.next()) {
        (Some(path), None) => path,
        _ => {
            eprintln!("用法: lite_player <媒体文件或URL>");
            std::process::exit(1);
        }
    };

    info!("🎬 Lite Player 启动");

    // 初始化 FFmpeg
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("FFmpeg 初始化失败: {}", e))?;
    info!("✅ FFmpeg 初始化成功");

    let mut manager = match PlaybackManager::start(&path) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("无法播放 {}: {}", path, e);
            std::process::exit(1);
        }
    };

    let mut presenter = HeadlessPresenter::new();
    manager.run(&mut presenter)?;
    manager.stop();

    info!("✅ 播放结束，共呈现 {} 帧", presenter.frame_count());
    Ok(())
}
