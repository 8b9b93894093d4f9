use crate::player::services::{FrameConvert, VideoDecode};
use crate::player::session::PlaybackSession;
use log::{info, warn};
use std::process;
use std::thread;

fn log_ctx() -> String {
    format!("[pid:{}-tid:{:?}]", process::id(), thread::current().id())
}

/// 视频解码线程主体
///
/// 循环：阻塞取包 → 解码 → 计算显示时间戳 → 取画面槽位 → 像素转换 → 提交。
/// 画面队列满时在 checkout_slot 阻塞，解码由此被自然节流到显示速率。
/// 队列关闭即干净退出，不会留下写了一半的帧。
pub fn video_decode_loop(
    session: &PlaybackSession,
    decoder: &mut dyn VideoDecode,
    converter: &mut dyn FrameConvert,
) {
    info!("{} 🎬 视频解码线程启动", log_ctx());

    let time_base = session.video_time_base;
    let mut last_pts = 0.0f64;

    while !session.is_quit() {
        let packet = match session.video_queue.get(true) {
            Ok(Some(p)) => p,
            Ok(None) => continue,
            // 队列关闭 = 正常终止信号，不是错误
            Err(_) => break,
        };

        let frame = match decoder.decode(&packet) {
            Ok(Some(f)) => f,
            // 本包未产出完整帧
            Ok(None) => continue,
            Err(e) => {
                // 单包解码错误就地恢复：丢弃该包继续，绝不终止播放
                warn!("视频解码错误（已跳过该包）: {}", e);
                continue;
            }
        };

        // pts 回退链：帧自带 pts → 包 dts（B 帧重排不在本内核范围，
        // dts 是文档化的回退而非猜测）→ 上一帧的值
        let pts = frame
            .pts
            .or(packet.dts)
            .map(|t| t as f64 * time_base)
            .unwrap_or(last_pts);
        last_pts = pts;

        let mut slot = match session.picture_queue.checkout_slot() {
            Ok(s) => s,
            Err(_) => break,
        };
        slot.ensure_allocated(frame.width, frame.height);

        if let Err(e) = converter.to_display(&frame, &mut slot) {
            warn!("像素转换失败（丢帧）: {}", e);
            session.picture_queue.abort_slot(slot);
            continue;
        }

        slot.pts = pts;
        session.picture_queue.commit_slot(slot);
    }

    info!("{} 🛑 视频解码线程退出", log_ctx());
}
