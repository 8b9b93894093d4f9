use parking_lot::Mutex;
use std::sync::Arc;

/// 音频时钟 - 整个系统的主时钟
///
/// 记录最近一次解码音频数据对应的播放时间（秒）。
/// 只由音频回调线程在每个解码子帧后写入，刷新调度线程只读；
/// 视频向音频同步，反过来永远不成立。
#[derive(Clone)]
pub struct AudioClock {
    inner: Arc<Mutex<f64>>,
}

impl AudioClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(0.0)),
        }
    }

    /// 当前音频播放时间（秒）
    pub fn get(&self) -> f64 {
        *self.inner.lock()
    }

    /// 更新音频播放时间（秒）
    pub fn set(&self, seconds: f64) {
        *self.inner.lock() = seconds;
    }
}

impl Default for AudioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_set_get() {
        let clock = AudioClock::new();
        assert_eq!(clock.get(), 0.0);
        clock.set(1.25);
        assert_eq!(clock.get(), 1.25);

        // clone 共享同一份时钟
        let other = clock.clone();
        other.set(2.5);
        assert_eq!(clock.get(), 2.5);
    }
}
