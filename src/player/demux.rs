use crate::player::services::PacketSource;
use crate::player::session::{PlaybackSession, PlayerEvent};
use crate::core::PlayerError;
use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use std::process;
use std::thread;
use std::time::Duration;

/// 两路包队列的合计字节预算：超过即暂停读取
///
/// 5 × 16KiB（音频） + 5 × 256KiB（视频），合并为单一预算 -
/// 两路消费速率天然不同，合计上限比分路上限更能容忍瞬时倾斜。
pub const MAX_QUEUE_BYTES: usize = 5 * 16 * 1024 + 5 * 256 * 1024;

/// 背压触发时的等待间隔
const BACKPRESSURE_WAIT: Duration = Duration::from_millis(10);
/// 源暂时无数据（EOF）时的重试间隔
const EOF_RETRY_WAIT: Duration = Duration::from_millis(100);

fn log_ctx() -> String {
    format!("[pid:{}-tid:{:?}]", process::id(), thread::current().id())
}

/// 解封装循环 - 读线程主体
///
/// 从源顺序读包，按流索引路由进音频/视频队列，其余流丢弃。
/// 背压：两队列合计字节量超预算就停读等待，上游文件/网络缓冲
/// 由此获得自然的读取节流。
///
/// EOF 不终止循环：直播/管道类源随时可能续上数据，按固定间隔
/// 重试。真正的 IO 错误才退出。退出时请求全局退出并通知呈现层。
pub fn demux_loop(
    session: &PlaybackSession,
    source: &mut dyn PacketSource,
    max_queue_bytes: usize,
    end_tx: &Sender<PlayerEvent>,
) {
    info!("{} 📦 解封装线程启动: {}", log_ctx(), source.description());

    while !session.is_quit() {
        // 合计预算背压
        if session.audio_queue.byte_size() + session.video_queue.byte_size() > max_queue_bytes {
            thread::sleep(BACKPRESSURE_WAIT);
            continue;
        }

        let packet = match source.read_packet() {
            Ok(Some(p)) => p,
            Ok(None) => {
                // 源暂时耗尽，保持存活等待新数据
                debug!("源暂时无数据，{}ms 后重试", EOF_RETRY_WAIT.as_millis());
                thread::sleep(EOF_RETRY_WAIT);
                continue;
            }
            Err(e) => {
                error!("{} ❌ 读包失败，解封装终止: {}", log_ctx(), e);
                break;
            }
        };

        let result = if Some(packet.stream_index) == session.audio_stream {
            session.audio_queue.put(packet)
        } else if Some(packet.stream_index) == session.video_stream {
            session.video_queue.put(packet)
        } else {
            // 未选中的流（字幕/附加数据等）直接丢弃
            Ok(())
        };

        if let Err(PlayerError::QueueClosed) = result {
            break;
        }
    }

    // 读端退出即整个会话结束：置退出标志、关队列、通知呈现层
    session.request_quit();
    if end_tx.send(PlayerEvent::End).is_err() {
        warn!("呈现层已不在，结束事件无人接收");
    }
    info!("{} 🛑 解封装线程退出", log_ctx());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Packet, Result};
    use crossbeam_channel::unbounded;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// 按脚本出包、脚本耗尽后报 IO 错误的假源
    struct ScriptedSource {
        packets: VecDeque<Packet>,
    }

    impl ScriptedSource {
        fn new(packets: Vec<Packet>) -> Self {
            Self {
                packets: packets.into(),
            }
        }
    }

    impl PacketSource for ScriptedSource {
        fn read_packet(&mut self) -> Result<Option<Packet>> {
            match self.packets.pop_front() {
                Some(p) => Ok(Some(p)),
                None => Err(PlayerError::IoError(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "源断开",
                ))),
            }
        }

        fn description(&self) -> String {
            "scripted".into()
        }
    }

    fn make_packet(stream: usize, len: usize) -> Packet {
        Packet {
            stream_index: stream,
            data: vec![0u8; len],
            pts: None,
            dts: None,
        }
    }

    #[test]
    fn test_routes_by_stream_index_and_discards_rest() {
        let session = Arc::new(PlaybackSession::new(Some(0), Some(1), 0.001, 0.001));
        let (tx, rx) = unbounded();
        let mut source = ScriptedSource::new(vec![
            make_packet(0, 10),
            make_packet(1, 20),
            // 流 2 未被选中，必须被丢弃
            make_packet(2, 30),
            make_packet(0, 40),
        ]);

        demux_loop(&session, &mut source, MAX_QUEUE_BYTES, &tx);

        // 源报错后循环退出并发送结束事件
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::End);
        assert!(session.is_quit());

        // 退出时队列已关闭，但入队字节量在关闭前已记账
        assert_eq!(session.audio_queue.byte_size(), 50);
        assert_eq!(session.video_queue.byte_size(), 20);
    }

    #[test]
    fn test_backpressure_pauses_until_drained() {
        let session = Arc::new(PlaybackSession::new(Some(0), None, 0.001, 0.001));
        let (tx, rx) = unbounded();
        // 预算 100 字节：第一包（200 字节）入队后即超预算
        let mut source = ScriptedSource::new(vec![make_packet(0, 200), make_packet(0, 50)]);

        let session2 = session.clone();
        let handle = thread::spawn(move || {
            demux_loop(&session2, &mut source, 100, &tx);
        });

        // 等第一包入队，随后循环应停在背压等待上
        while session.audio_queue.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(session.audio_queue.len(), 1);

        // 消费端排空后读取恢复，脚本耗尽即报错退出
        session.audio_queue.get(true).unwrap();
        handle.join().unwrap();
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::End);
    }

    #[test]
    fn test_quit_flag_stops_loop_before_reading() {
        let session = Arc::new(PlaybackSession::new(Some(0), None, 0.001, 0.001));
        session.request_quit();
        let (tx, rx) = unbounded();
        let mut source = ScriptedSource::new(vec![make_packet(0, 10)]);

        demux_loop(&session, &mut source, MAX_QUEUE_BYTES, &tx);

        // 一包未读，但结束事件照常发出
        assert_eq!(source.packets.len(), 1);
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::End);
    }
}
