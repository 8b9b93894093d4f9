use crate::core::Result;
use crate::player::services::Present;
use crate::player::session::{PlaybackSession, PlayerEvent};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 音视频偏差小于该值视为同步，不做修正（秒）
pub const SYNC_THRESHOLD: f64 = 0.01;
/// 偏差超过该值视为时钟不可信，放弃修正按名义节奏走（秒）
pub const NOSYNC_THRESHOLD: f64 = 10.0;
/// 调度下限：修正后的等待不短于 1ms，防止忙转
const MIN_REFRESH_SECS: f64 = 0.001;
/// 首帧前的缺省帧间隔（25fps 名义值）
const DEFAULT_FRAME_DELAY: f64 = 0.040;
/// 放大修正的上限：延迟翻倍后不超过 1 秒
const MAX_CORRECTED_DELAY: f64 = 1.0;

/// 无视频流时的空转轮询间隔
const IDLE_POLL: Duration = Duration::from_millis(100);
/// 画面队列为空时的轮询间隔
const WAIT_FRAME_POLL: Duration = Duration::from_millis(1);

/// 帧调度状态 - 纯同步算术，不触碰队列和时钟对象
///
/// 以"上一帧"三元组（pts、帧间隔、目标呈现时刻）推算下一帧
/// 应等待多久。所有输入显式传入，便于单独测试。
pub struct SyncState {
    /// 下一帧的目标呈现时刻（与传入的 now 同一时间轴）
    frame_timer: f64,
    frame_last_pts: f64,
    frame_last_delay: f64,
}

impl SyncState {
    pub fn new(now: f64) -> Self {
        Self {
            frame_timer: now,
            frame_last_pts: 0.0,
            frame_last_delay: DEFAULT_FRAME_DELAY,
        }
    }

    /// 计算呈现 pts 处的画面后应等待多久再取下一帧（秒）
    ///
    /// 三步：
    /// 1. 名义间隔 = pts 差，非正或 >=1s 视为异常（首帧、时间戳
    ///    回绕），退回上一次的间隔；
    /// 2. 与参考时钟比较：视频落后超过阈值则把等待压成 0 追赶，
    ///    领先超过阈值则翻倍等待（上限 1s）；偏差大到不可信
    ///    （>= NOSYNC_THRESHOLD）则不修正；
    /// 3. 推进目标时刻并换算成相对 now 的实际等待，下限 1ms。
    ///
    /// 回退用的 last_delay/last_pts 记录的是修正前的名义值，
    /// 追赶产生的 0 等待不会污染后续帧的间隔估计。
    pub fn next_delay(&mut self, pts: f64, clock: f64, now: f64) -> f64 {
        let mut delay = pts - self.frame_last_pts;
        if delay <= 0.0 || delay >= MAX_CORRECTED_DELAY {
            delay = self.frame_last_delay;
        }
        self.frame_last_delay = delay;
        self.frame_last_pts = pts;

        let diff = pts - clock;
        if diff.abs() < NOSYNC_THRESHOLD {
            if diff <= -SYNC_THRESHOLD {
                // 视频落后：立刻出下一帧
                delay = 0.0;
            } else if diff >= SYNC_THRESHOLD {
                // 视频领先：等待翻倍，让音频追上
                delay = (2.0 * delay).min(MAX_CORRECTED_DELAY);
            }
        }

        self.frame_timer += delay;
        let actual = self.frame_timer - now;
        actual.max(MIN_REFRESH_SECS)
    }
}

/// 刷新调度器 - 呈现线程主体
///
/// 唯一的画面消费者。非阻塞查看画面队列：
/// - 无视频流：长间隔空转，只等结束事件；
/// - 队列空：短间隔轮询等解码线程追上；
/// - 有画面：按同步算术呈现并等待。
///
/// 参考时钟取音频时钟；无音频流时以画面自身 pts 为参考
/// （偏差恒为 0，退化为按名义帧间隔走片）。
pub struct RefreshScheduler {
    session: Arc<PlaybackSession>,
    sync: SyncState,
    origin: Instant,
}

impl RefreshScheduler {
    pub fn new(session: Arc<PlaybackSession>) -> Self {
        Self {
            session,
            sync: SyncState::new(0.0),
            origin: Instant::now(),
        }
    }

    /// 调度主循环，占用调用线程直到播放结束
    ///
    /// 等待本身兼做事件接收：收到结束事件或事件通道断开即退出。
    pub fn run(&mut self, presenter: &mut dyn Present, events: &Receiver<PlayerEvent>) -> Result<()> {
        info!("🎬 刷新调度启动");
        let mut wait = WAIT_FRAME_POLL;
        loop {
            match events.recv_timeout(wait) {
                Ok(PlayerEvent::End) => break,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            if self.session.is_quit() {
                break;
            }
            wait = self.tick(presenter)?;
        }
        info!("🛑 刷新调度退出");
        Ok(())
    }

    /// 单步：尝试呈现一帧，返回下一次醒来前的等待
    fn tick(&mut self, presenter: &mut dyn Present) -> Result<Duration> {
        if self.session.video_stream.is_none() {
            return Ok(IDLE_POLL);
        }
        let picture = match self.session.picture_queue.checkout_front() {
            Some(p) => p,
            None => return Ok(WAIT_FRAME_POLL),
        };

        let now = self.origin.elapsed().as_secs_f64();
        let clock = if self.session.audio_stream.is_some() {
            self.session.clock.get()
        } else {
            picture.pts
        };
        let delay = self.sync.next_delay(picture.pts, clock, now);

        if let Err(e) = presenter.present(&picture) {
            warn!("呈现失败（丢帧）: {}", e);
        }
        self.session.picture_queue.release_front(picture);

        Ok(Duration::from_secs_f64(delay))
    }
}
