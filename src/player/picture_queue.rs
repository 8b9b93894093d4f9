use crate::core::{PlayerError, Result, VideoPicture};
use parking_lot::{Condvar, Mutex};

/// 固定容量的画面环形缓冲
///
/// 生产者（视频解码线程）在队列满时阻塞 - 这就是把解码节流到
/// 显示速率的机制；消费者（刷新调度）非阻塞轮询。
///
/// 槽位以 checkout/commit 成对使用：取出的槽位在锁外填充，
/// 填充期间不持有队列锁。槽位的底层存储随画面一起流转，
/// 尺寸不变时得以复用。单生产者：同一时刻只允许一个线程持有写槽位。
pub struct PictureQueue {
    inner: Mutex<Ring>,
    slot_free: Condvar,
}

struct Ring {
    slots: Vec<VideoPicture>,
    rindex: usize,
    windex: usize,
    size: usize,
    closed: bool,
}

impl PictureQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "画面队列容量至少为 1");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, VideoPicture::default);
        Self {
            inner: Mutex::new(Ring {
                slots,
                rindex: 0,
                windex: 0,
                size: 0,
                closed: false,
            }),
            slot_free: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// 当前占用（恒满足 0 <= size <= capacity）
    pub fn len(&self) -> usize {
        self.inner.lock().size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取出写槽位；队列满时阻塞直到消费者腾出空间或队列关闭
    pub fn checkout_slot(&self) -> Result<VideoPicture> {
        let mut ring = self.inner.lock();
        loop {
            if ring.closed {
                return Err(PlayerError::QueueClosed);
            }
            if ring.size < ring.slots.len() {
                let w = ring.windex;
                return Ok(std::mem::take(&mut ring.slots[w]));
            }
            self.slot_free.wait(&mut ring);
        }
    }

    /// 提交填充完的槽位：推进写索引、递增占用
    pub fn commit_slot(&self, picture: VideoPicture) {
        let mut ring = self.inner.lock();
        let w = ring.windex;
        ring.slots[w] = picture;
        ring.windex = (w + 1) % ring.slots.len();
        ring.size += 1;
    }

    /// 放弃写槽位：归还存储，不推进索引（转换失败时丢帧用）
    pub fn abort_slot(&self, picture: VideoPicture) {
        let mut ring = self.inner.lock();
        let w = ring.windex;
        ring.slots[w] = picture;
    }

    /// 取出读端画面（非阻塞）；队列空返回 None
    pub fn checkout_front(&self) -> Option<VideoPicture> {
        let mut ring = self.inner.lock();
        if ring.size == 0 {
            return None;
        }
        let r = ring.rindex;
        Some(std::mem::take(&mut ring.slots[r]))
    }

    /// 归还读端画面的存储并推进读索引，唤醒阻塞的生产者
    ///
    /// 存储留在环内，下一次写到该槽位时复用。
    pub fn release_front(&self, picture: VideoPicture) {
        let mut ring = self.inner.lock();
        let r = ring.rindex;
        ring.slots[r] = picture;
        ring.rindex = (r + 1) % ring.slots.len();
        ring.size -= 1;
        drop(ring);
        self.slot_free.notify_one();
    }

    /// 关闭队列（幂等），唤醒阻塞在 checkout_slot 的生产者
    pub fn close(&self) {
        let mut ring = self.inner.lock();
        ring.closed = true;
        drop(ring);
        self.slot_free.notify_all();
    }
}
