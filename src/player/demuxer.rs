use crate::core::{Packet, PlayerError, Result};
use crate::player::services::PacketSource;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{format, media};
use log::{debug, info};

/// 解封装器 - 读取媒体源并分离音视频流
///
/// 流选择在打开时一次完成（各取"最佳"流），此后只做顺序读包。
/// 音视频至少要有一路，否则拒绝打开。
pub struct Demuxer {
    input_ctx: format::context::Input,
    video_stream_index: Option<usize>,
    audio_stream_index: Option<usize>,
    video_time_base: f64,
    audio_time_base: f64,
    source_path: String,
}

fn stream_time_base(stream: &format::stream::Stream) -> f64 {
    let tb = stream.time_base();
    tb.numerator() as f64 / tb.denominator() as f64
}

impl Demuxer {
    /// 打开媒体源（本地文件或 FFmpeg 支持的 URL）
    pub fn open(path: &str) -> Result<Self> {
        info!("正在打开媒体源: {}", path);

        let input_ctx = format::input(&path)
            .map_err(|e| PlayerError::OpenError(format!("无法打开 {}: {}", path, e)))?;

        let video_stream_index = input_ctx
            .streams()
            .best(media::Type::Video)
            .map(|s| s.index());
        let audio_stream_index = input_ctx
            .streams()
            .best(media::Type::Audio)
            .map(|s| s.index());

        if video_stream_index.is_none() && audio_stream_index.is_none() {
            return Err(PlayerError::NoStream);
        }

        let video_time_base = video_stream_index
            .and_then(|idx| input_ctx.stream(idx))
            .map(|s| stream_time_base(&s))
            .unwrap_or(0.0);
        let audio_time_base = audio_stream_index
            .and_then(|idx| input_ctx.stream(idx))
            .map(|s| stream_time_base(&s))
            .unwrap_or(0.0);

        debug!("视频流索引: {:?}", video_stream_index);
        debug!("音频流索引: {:?}", audio_stream_index);

        Ok(Self {
            input_ctx,
            video_stream_index,
            audio_stream_index,
            video_time_base,
            audio_time_base,
            source_path: path.to_string(),
        })
    }

    pub fn video_stream_index(&self) -> Option<usize> {
        self.video_stream_index
    }

    pub fn audio_stream_index(&self) -> Option<usize> {
        self.audio_stream_index
    }

    pub fn video_time_base(&self) -> f64 {
        self.video_time_base
    }

    pub fn audio_time_base(&self) -> f64 {
        self.audio_time_base
    }

    /// 获取视频流（解码器初始化用，借用期内不可读包）
    pub fn video_stream(&self) -> Option<format::stream::Stream> {
        self.video_stream_index
            .and_then(|idx| self.input_ctx.stream(idx))
    }

    /// 获取音频流
    pub fn audio_stream(&self) -> Option<format::stream::Stream> {
        self.audio_stream_index
            .and_then(|idx| self.input_ctx.stream(idx))
    }
}

impl PacketSource for Demuxer {
    /// 读取下一个包
    ///
    /// 用底层读接口而非包迭代器：迭代器把 EOF 和读错误都折叠成
    /// None，这里必须区分（EOF 保持重试，错误终止播放）。
    fn read_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input_ctx) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => return Ok(None),
                // EAGAIN：源暂时无数据，与 EOF 同样处理
                Err(ffmpeg::Error::Other { errno: 11 }) => return Ok(None),
                Err(e) => return Err(e.into()),
            }

            let stream_index = packet.stream();
            let selected = Some(stream_index) == self.video_stream_index
                || Some(stream_index) == self.audio_stream_index;
            if !selected {
                // 其他流（字幕/附加数据等）在源头就跳过
                continue;
            }

            return Ok(Some(Packet {
                stream_index,
                data: packet.data().map(|d| d.to_vec()).unwrap_or_default(),
                pts: packet.pts(),
                dts: packet.dts(),
            }));
        }
    }

    fn description(&self) -> String {
        format!("FFmpeg Demuxer: {}", self.source_path)
    }
}
