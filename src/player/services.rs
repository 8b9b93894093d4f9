use crate::core::{Packet, Result, VideoFrame, VideoPicture};
use log::debug;

/// 解封装服务抽象接口
///
/// 不同的媒体源（本地文件、内存流等）实现这个接口；
/// 内核只关心包的读取结果，不关心容器格式细节。
pub trait PacketSource: Send {
    /// 读取下一个包
    ///
    /// 返回：
    /// - Ok(Some(packet)): 成功读取一个包
    /// - Ok(None): 到达流末尾（非错误）
    /// - Err(e): 真正的读取错误
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    /// 获取描述信息（用于日志）
    fn description(&self) -> String;
}

/// 音频解码服务产出的一个子帧
pub struct AudioSubframe {
    /// 交错 f32 PCM 采样（固定输出格式），可能为空
    pub samples: Vec<f32>,
    /// 本次从包数据中消耗的字节数
    pub consumed: usize,
}

/// 音频解码服务
pub trait AudioDecode: Send {
    /// 从包数据解码一个子帧
    ///
    /// 采样可能为空（如 priming/extradata 子帧），调用方应继续解码。
    fn decode_subframe(&mut self, data: &[u8]) -> Result<AudioSubframe>;
}

/// 视频解码服务
pub trait VideoDecode: Send {
    /// 解码一个视频包；本包未产出完整帧时返回 Ok(None)
    fn decode(&mut self, packet: &Packet) -> Result<Option<VideoFrame>>;
}

/// 像素转换服务 - 将解码帧写入显示槽位
///
/// 目标槽位的存储由调用方预先通过 ensure_allocated 准备好。
pub trait FrameConvert: Send {
    fn to_display(&mut self, frame: &VideoFrame, dst: &mut VideoPicture) -> Result<()>;
}

/// 呈现服务 - 把画面交给显示表面
pub trait Present {
    fn present(&mut self, picture: &VideoPicture) -> Result<()>;
}

/// 无窗口呈现器 - 窗口/表面创建不在内核范围内
///
/// 周期性输出一条日志，方便在无显示环境下验证管线是否走通。
pub struct HeadlessPresenter {
    frames: u64,
}

impl HeadlessPresenter {
    pub fn new() -> Self {
        Self { frames: 0 }
    }

    /// 已呈现的帧数
    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}

impl Default for HeadlessPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Present for HeadlessPresenter {
    fn present(&mut self, picture: &VideoPicture) -> Result<()> {
        self.frames += 1;
        if self.frames == 1 || self.frames % 100 == 0 {
            debug!(
                "呈现第 {} 帧: {}x{}, pts={:.3}s",
                self.frames, picture.width, picture.height, picture.pts
            );
        }
        Ok(())
    }
}
