use crate::core::{Packet, PlayerError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// 线程安全的包队列（FIFO）
///
/// 不变量：size 恒等于队内所有包的字节数之和。
/// 队列自身不设上限 - 背压是解封装循环的外部策略（见 demux.rs），
/// 避免队列抽象依赖编解码器相关的尺寸常量。
///
/// 关闭是终态：close() 之后所有阻塞等待者立即被唤醒并得到 QueueClosed。
pub struct PacketQueue {
    inner: Mutex<Inner>,
    cond: Condvar,
}

struct Inner {
    packets: VecDeque<Packet>,
    size: usize,
    closed: bool,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                packets: VecDeque::new(),
                size: 0,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// 入队并唤醒一个等待者
    ///
    /// 队列已关闭时返回 QueueClosed，包被丢弃（调用方无需再释放）。
    pub fn put(&self, packet: Packet) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(PlayerError::QueueClosed);
        }
        inner.size += packet.byte_size();
        inner.packets.push_back(packet);
        drop(inner);
        self.cond.notify_one();
        Ok(())
    }

    /// 出队
    ///
    /// 关闭优先于排空：已关闭立即返回 QueueClosed，即使仍有存货 -
    /// 需要完整排空的调用方必须在关闭前完成。
    /// block=false 且队列为空时返回 Ok(None)（不会阻塞）。
    pub fn get(&self, block: bool) -> Result<Option<Packet>> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(PlayerError::QueueClosed);
            }
            if let Some(packet) = inner.packets.pop_front() {
                inner.size -= packet.byte_size();
                return Ok(Some(packet));
            }
            if !block {
                return Ok(None);
            }
            self.cond.wait(&mut inner);
        }
    }

    /// 关闭队列（幂等），唤醒所有阻塞的等待者
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        drop(inner);
        self.cond.notify_all();
    }

    /// 当前队内字节总量
    pub fn byte_size(&self) -> usize {
        self.inner.lock().size
    }

    /// 当前队内包数量
    pub fn len(&self) -> usize {
        self.inner.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}
