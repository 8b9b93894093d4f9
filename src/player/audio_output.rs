use crate::core::{PlayerError, Result};
use crate::player::audio_pipeline::AudioPipeline;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, SupportedStreamConfigRange};
use log::{debug, error, info, warn};

/// 音频输出 - 拉模式
///
/// 设备回调直接从解码管线拉数据，中间没有环形缓冲：
/// 回调节奏即播放节奏，音频时钟由管线在解码时就地推进。
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

// cpal::Stream 本身不是 Send，但输出对象只在管理器所在线程中使用
unsafe impl Send for AudioOutput {}

impl AudioOutput {
    /// 创建音频输出（不支持请求配置时回退到标准配置）
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self> {
        info!("初始化音频输出: {} Hz, {} 声道", sample_rate, channels);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::AudioError("无法找到音频输出设备".to_string()))?;

        debug!("使用音频设备: {}", device.name().unwrap_or_default());

        let mut config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        if !Self::device_supports(&device, &config)? {
            warn!(
                "⚠️  音频设备不支持 {} Hz, {} 声道，回退到标准配置",
                sample_rate, channels
            );

            let fallback_configs = [(48000, 2), (44100, 2), (48000, 1), (44100, 1)];
            let mut found = false;
            for (fb_rate, fb_channels) in fallback_configs {
                let fb_config = StreamConfig {
                    channels: fb_channels,
                    sample_rate: cpal::SampleRate(fb_rate),
                    buffer_size: cpal::BufferSize::Default,
                };
                if Self::device_supports(&device, &fb_config)? {
                    info!("✅ 使用回退配置: {} Hz, {} 声道", fb_rate, fb_channels);
                    config = fb_config;
                    found = true;
                    break;
                }
            }
            if !found {
                return Err(PlayerError::AudioError(format!(
                    "音频设备不支持任何标准配置 (原请求: {} Hz, {} 声道)",
                    sample_rate, channels
                )));
            }
        }

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    fn device_supports(device: &Device, config: &StreamConfig) -> Result<bool> {
        let supported_configs = device
            .supported_output_configs()
            .map_err(|e| PlayerError::AudioError(format!("无法获取支持的音频配置: {}", e)))?;
        Ok(supported_configs.into_iter().any(|s| Self::is_config_compatible(config, &s)))
    }

    fn is_config_compatible(config: &StreamConfig, supported: &SupportedStreamConfigRange) -> bool {
        let rate_in_range = config.sample_rate.0 >= supported.min_sample_rate().0
            && config.sample_rate.0 <= supported.max_sample_rate().0;
        let channels_match = config.channels == supported.channels();
        rate_in_range && channels_match
    }

    /// 启动播放，管线的所有权交给设备回调
    pub fn start(&mut self, mut pipeline: AudioPipeline) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    pipeline.fill(data);
                },
                move |err| {
                    error!("音频流错误: {}", err);
                },
                None,
            )
            .map_err(|e| PlayerError::AudioError(format!("创建音频流失败: {}", e)))?;

        stream
            .play()
            .map_err(|e| PlayerError::AudioError(format!("启动音频流失败: {}", e)))?;

        self.stream = Some(stream);
        info!("🔊 音频输出已启动");
        Ok(())
    }

    /// 停止播放
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!("音频输出已停止");
        }
    }

    /// 实际使用的输出配置（采样率, 声道数）
    pub fn config(&self) -> (u32, u16) {
        (self.config.sample_rate.0, self.config.channels)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
