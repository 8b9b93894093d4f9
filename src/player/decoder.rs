use crate::core::{Packet, PixelFormat, PlayerError, Result, VideoFrame, VideoPicture};
use crate::player::services::{AudioDecode, AudioSubframe, FrameConvert, VideoDecode};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, software, util};
use log::debug;
use std::collections::VecDeque;

/// 音频解码器 - 解码并重采样到固定输出格式（交错 f32）
///
/// 一个包可能解出多个帧：首帧随本次调用返回（报告消耗了全部
/// 字节），其余帧暂存，后续调用以"零消耗子帧"逐个吐出，顺序
/// 与解码顺序一致。
pub struct AudioDecoder {
    decoder: codec::decoder::Audio,
    resampler: Option<software::resampling::Context>,
    target_sample_rate: u32,
    target_channels: u16,
    pending: VecDeque<Vec<f32>>,
}

// SwrContext 本身不是 Send，但每个解码器实例只在一个线程中使用
unsafe impl Send for AudioDecoder {}

impl AudioDecoder {
    /// 从音频流创建解码器，指定目标输出配置
    pub fn from_stream(
        stream: format::stream::Stream,
        target_sample_rate: u32,
        target_channels: u16,
    ) -> Result<Self> {
        let context = codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context.decoder().audio()?;

        debug!(
            "音频解码器: {} Hz, {} 声道, 格式 {:?} → 目标 {} Hz, {} 声道",
            decoder.rate(),
            decoder.channels(),
            decoder.format(),
            target_sample_rate,
            target_channels
        );

        Ok(Self {
            decoder,
            resampler: None,
            target_sample_rate,
            target_channels,
            pending: VecDeque::new(),
        })
    }

    /// 重采样到交错 f32 并复制成连续内存
    fn resample(&mut self, frame: &util::frame::Audio) -> Result<Vec<f32>> {
        if self.resampler.is_none() {
            let target_layout = match self.target_channels {
                1 => util::channel_layout::ChannelLayout::MONO,
                _ => util::channel_layout::ChannelLayout::STEREO,
            };
            debug!(
                "🔧 初始化音频重采样器: {}Hz/{}ch → {}Hz/{}ch",
                frame.rate(),
                frame.channels(),
                self.target_sample_rate,
                self.target_channels
            );
            self.resampler = Some(software::resampling::Context::get(
                frame.format(),
                frame.channel_layout(),
                frame.rate(),
                util::format::Sample::F32(util::format::sample::Type::Packed),
                target_layout,
                self.target_sample_rate,
            )?);
        }

        let mut resampled = util::frame::Audio::empty();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.run(frame, &mut resampled)?;
        }

        let sample_count = resampled.samples() * self.target_channels as usize;
        let mut samples = vec![0f32; sample_count];
        let raw = resampled.data(0);
        // 交错 f32 packed：数据平面 0 即连续采样
        let as_f32 =
            unsafe { std::slice::from_raw_parts(raw.as_ptr() as *const f32, sample_count) };
        samples.copy_from_slice(as_f32);
        Ok(samples)
    }
}

impl AudioDecode for AudioDecoder {
    fn decode_subframe(&mut self, data: &[u8]) -> Result<AudioSubframe> {
        // 先吐出上一个包暂存的帧，不消耗新数据
        if let Some(samples) = self.pending.pop_front() {
            return Ok(AudioSubframe {
                samples,
                consumed: 0,
            });
        }

        let packet = ffmpeg::Packet::copy(data);
        match self.decoder.send_packet(&packet) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => {
                self.decoder.flush();
                return Ok(AudioSubframe {
                    samples: Vec::new(),
                    consumed: data.len(),
                });
            }
            Err(e) => return Err(PlayerError::DecodeError(e.to_string())),
        }

        loop {
            let mut decoded = util::frame::Audio::empty();
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    let samples = self.resample(&decoded)?;
                    if !samples.is_empty() {
                        self.pending.push_back(samples);
                    }
                }
                Err(ffmpeg::Error::Other { errno: 11 }) => break, // EAGAIN
                Err(ffmpeg::Error::Eof) => break,
                Err(e) => return Err(PlayerError::DecodeError(e.to_string())),
            }
        }

        Ok(AudioSubframe {
            // 本包未出帧时返回空采样（priming 等），调用方继续
            samples: self.pending.pop_front().unwrap_or_default(),
            consumed: data.len(),
        })
    }
}

/// 视频解码器 - 软件解码并缩放到 RGBA
pub struct VideoDecoder {
    decoder: codec::decoder::Video,
    scaler: Option<software::scaling::Context>,
    pending: VecDeque<VideoFrame>,
}

// SwsContext 本身不是 Send，但每个解码器实例只在一个线程中使用
unsafe impl Send for VideoDecoder {}

impl VideoDecoder {
    pub fn from_stream(stream: format::stream::Stream) -> Result<Self> {
        let context = codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context.decoder().video()?;

        debug!(
            "视频解码器: {}x{}, 格式 {:?}",
            decoder.width(),
            decoder.height(),
            decoder.format()
        );

        Ok(Self {
            decoder,
            scaler: None,
            pending: VecDeque::new(),
        })
    }

    /// 缩放到 RGBA 并带跨距复制出来
    fn scale_frame(&mut self, frame: &util::frame::Video) -> Result<VideoFrame> {
        let width = frame.width();
        let height = frame.height();

        if self.scaler.is_none() {
            self.scaler = Some(software::scaling::Context::get(
                frame.format(),
                width,
                height,
                util::format::Pixel::RGBA,
                width,
                height,
                software::scaling::Flags::BILINEAR,
            )?);
        }

        let mut rgba = util::frame::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(frame, &mut rgba)?;
        }

        Ok(VideoFrame {
            pts: frame.timestamp(),
            width,
            height,
            format: PixelFormat::RGBA,
            data: rgba.data(0).to_vec(),
            stride: rgba.stride(0),
        })
    }
}

impl VideoDecode for VideoDecoder {
    fn decode(&mut self, packet: &Packet) -> Result<Option<VideoFrame>> {
        let mut ff_packet = ffmpeg::Packet::copy(&packet.data);
        ff_packet.set_pts(packet.pts);
        ff_packet.set_dts(packet.dts);

        match self.decoder.send_packet(&ff_packet) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => {
                self.decoder.flush();
                return Ok(self.pending.pop_front());
            }
            Err(e) => return Err(PlayerError::DecodeError(e.to_string())),
        }

        loop {
            let mut decoded = util::frame::Video::empty();
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    let frame = self.scale_frame(&decoded)?;
                    self.pending.push_back(frame);
                }
                Err(ffmpeg::Error::Other { errno: 11 }) => break, // EAGAIN
                Err(ffmpeg::Error::Eof) => break,
                Err(e) => return Err(PlayerError::DecodeError(e.to_string())),
            }
        }

        Ok(self.pending.pop_front())
    }
}

/// RGBA 帧 → 显示槽位的像素复制，去除行跨距
pub struct RgbaConverter;

impl FrameConvert for RgbaConverter {
    fn to_display(&mut self, frame: &VideoFrame, dst: &mut VideoPicture) -> Result<()> {
        if frame.format != PixelFormat::RGBA {
            return Err(PlayerError::DecodeError(format!(
                "不支持的显示格式: {:?}",
                frame.format
            )));
        }

        let row_size = frame.width as usize * 4;
        for y in 0..frame.height as usize {
            let src_offset = y * frame.stride;
            let dst_offset = y * row_size;
            dst.data[dst_offset..dst_offset + row_size]
                .copy_from_slice(&frame.data[src_offset..src_offset + row_size]);
        }
        Ok(())
    }
}
