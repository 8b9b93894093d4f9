/// 编码数据包 - 解封装产出的最小单位
///
/// 生命周期：由解封装器创建，入队后归队列所有，消费方解码后销毁。
/// 时间戳使用所属流的 time_base 单位，可能缺失。
pub struct Packet {
    pub stream_index: usize,
    pub data: Vec<u8>,
    /// 显示时间戳（流 time_base 单位）
    pub pts: Option<i64>,
    /// 解码时间戳（流 time_base 单位）
    pub dts: Option<i64>,
}

impl Packet {
    /// 包的字节大小（用于队列预算统计）
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

/// 像素格式（显示输出固定为 RGBA）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    RGBA,
    YUV420P,
}

/// 解码后的视频帧（像素转换的输入）
///
/// data 按 stride 逐行存放，可能含对齐填充；转换服务负责去除。
pub struct VideoFrame {
    /// 显示时间戳（流 time_base 单位），解码器可能给不出
    pub pts: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
    pub stride: usize,
}

/// 转换完成、等待显示的画面
///
/// data 为连续 RGBA 内存（stride = width * 4）。
/// 首次使用时分配；后续尺寸不变则复用底层存储，变化才重新分配。
pub struct VideoPicture {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub allocated: bool,
    /// 显示时间戳（秒）
    pub pts: f64,
}

impl VideoPicture {
    /// 按目标尺寸准备底层存储：尺寸一致直接复用，不一致才重新分配
    pub fn ensure_allocated(&mut self, width: u32, height: u32) {
        if self.allocated && self.width == width && self.height == height {
            return;
        }
        self.data = vec![0u8; (width as usize) * (height as usize) * 4];
        self.width = width;
        self.height = height;
        self.allocated = true;
    }
}

impl Default for VideoPicture {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            allocated: false,
            pts: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picture_storage_reused_when_dims_match() {
        let mut vp = VideoPicture::default();
        vp.ensure_allocated(320, 240);
        assert!(vp.allocated);
        assert_eq!(vp.data.len(), 320 * 240 * 4);

        let ptr = vp.data.as_ptr();
        vp.ensure_allocated(320, 240);
        assert_eq!(vp.data.as_ptr(), ptr);
    }

    #[test]
    fn test_picture_reallocated_on_resize() {
        let mut vp = VideoPicture::default();
        vp.ensure_allocated(320, 240);
        vp.ensure_allocated(640, 480);
        assert_eq!((vp.width, vp.height), (640, 480));
        assert_eq!(vp.data.len(), 640 * 480 * 4);
    }
}
