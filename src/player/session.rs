use crate::core::AudioClock;
use crate::player::packet_queue::PacketQueue;
use crate::player::picture_queue::PictureQueue;
use std::sync::atomic::{AtomicBool, Ordering};

/// 画面队列容量 - 容量 1 足够：生产者被自然节流到显示速率
pub const VIDEO_PICTURE_QUEUE_SIZE: usize = 1;

/// 发给呈现层的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// 播放结束（解封装退出，正常或出错）
    End,
}

/// 播放会话 - 所有线程共享的显式状态
///
/// 取代"全局大结构"：会话对象由管理器持有 Arc，按引用传给每个
/// 线程入口，没有任何环境全局变量。跨线程可变状态只有三个队列
/// 和音频时钟，各自有独立的锁。
pub struct PlaybackSession {
    pub audio_queue: PacketQueue,
    pub video_queue: PacketQueue,
    pub picture_queue: PictureQueue,
    pub clock: AudioClock,
    /// 选中的音频/视频流索引（未选中即该路不播放）
    pub audio_stream: Option<usize>,
    pub video_stream: Option<usize>,
    /// 对应流的 time_base（秒/单位）
    pub audio_time_base: f64,
    pub video_time_base: f64,
    quit: AtomicBool,
}

impl PlaybackSession {
    pub fn new(
        audio_stream: Option<usize>,
        video_stream: Option<usize>,
        audio_time_base: f64,
        video_time_base: f64,
    ) -> Self {
        Self {
            audio_queue: PacketQueue::new(),
            video_queue: PacketQueue::new(),
            picture_queue: PictureQueue::new(VIDEO_PICTURE_QUEUE_SIZE),
            clock: AudioClock::new(),
            audio_stream,
            video_stream,
            audio_time_base,
            video_time_base,
            quit: AtomicBool::new(false),
        }
    }

    pub fn is_quit(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    /// 请求全局退出（幂等）
    ///
    /// 置位退出标志并关闭全部队列 - 关闭即唤醒机制，保证阻塞在
    /// 任何队列上的线程在一个调度量子内醒来退出。
    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
        self.audio_queue.close();
        self.video_queue.close();
        self.picture_queue.close();
    }
}
