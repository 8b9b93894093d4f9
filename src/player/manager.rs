use crate::core::{PlayerError, Result};
use crate::player::audio_output::AudioOutput;
use crate::player::audio_pipeline::AudioPipeline;
use crate::player::decoder::{AudioDecoder, RgbaConverter, VideoDecoder};
use crate::player::demux::{demux_loop, MAX_QUEUE_BYTES};
use crate::player::demuxer::Demuxer;
use crate::player::refresh::RefreshScheduler;
use crate::player::services::Present;
use crate::player::session::{PlaybackSession, PlayerEvent};
use crate::player::video_thread::video_decode_loop;
use crossbeam_channel::{bounded, Receiver};
use log::{info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// 固定输出采样率（设备不支持时由输出层回退）
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
/// 固定输出声道数
pub const OUTPUT_CHANNELS: u16 = 2;

/// 播放管理器 - 组装并驱动整条播放管线
///
/// start() 打开媒体源、建立解码器、拉起读线程和视频解码线程、
/// 启动音频输出；run() 在调用线程上跑刷新调度直到播放结束；
/// stop() 请求退出并回收全部线程。
///
/// 单路缺失可播（纯音频/纯视频），该路解码器初始化失败则禁用
/// 该路继续；两路全无才拒绝播放。音频输出设备打不开是启动期
/// 致命错误，不降级。
pub struct PlaybackManager {
    session: Arc<PlaybackSession>,
    events: Receiver<PlayerEvent>,
    audio_output: Option<AudioOutput>,
    demux_handle: Option<JoinHandle<()>>,
    video_handle: Option<JoinHandle<()>>,
}

/// 音频链路组装：输出设备失败致命，解码器失败只禁用音频
///
/// 设备打不开意味着输出面整个不可用，错误原样上抛由入口报错
/// 退出；单路编解码器不支持则按流禁用，播放继续。
fn build_audio_chain<O, D>(
    output: Result<O>,
    make_decoder: impl FnOnce(&O) -> Result<D>,
) -> Result<Option<(O, D)>> {
    let output = output?;
    match make_decoder(&output) {
        Ok(decoder) => Ok(Some((output, decoder))),
        Err(e) => {
            warn!("音频解码器初始化失败，禁用音频: {}", e);
            Ok(None)
        }
    }
}

impl PlaybackManager {
    /// 打开媒体源并启动播放
    pub fn start(path: &str) -> Result<Self> {
        let mut demuxer = Demuxer::open(path)?;

        // 音频链路：先建输出设备，解码器按设备实际配置建 -
        // 请求配置被设备回退时重采样目标必须跟着变
        let mut audio_output = None;
        let mut audio_decoder = None;
        if let Some(stream) = demuxer.audio_stream() {
            let chain = build_audio_chain(
                AudioOutput::new(OUTPUT_SAMPLE_RATE, OUTPUT_CHANNELS),
                |output| {
                    let (rate, channels) = output.config();
                    AudioDecoder::from_stream(stream, rate, channels)
                },
            )?;
            if let Some((output, decoder)) = chain {
                audio_output = Some(output);
                audio_decoder = Some(decoder);
            }
        }

        let mut video_decoder = None;
        if let Some(stream) = demuxer.video_stream() {
            match VideoDecoder::from_stream(stream) {
                Ok(decoder) => video_decoder = Some(decoder),
                Err(e) => warn!("视频解码器初始化失败，禁用视频: {}", e),
            }
        }

        let audio_stream = audio_decoder
            .as_ref()
            .and_then(|_| demuxer.audio_stream_index());
        let video_stream = video_decoder
            .as_ref()
            .and_then(|_| demuxer.video_stream_index());
        if audio_stream.is_none() && video_stream.is_none() {
            return Err(PlayerError::NoStream);
        }

        let session = Arc::new(PlaybackSession::new(
            audio_stream,
            video_stream,
            demuxer.audio_time_base(),
            demuxer.video_time_base(),
        ));

        // 容量 1：唯一的事件是结束，发送端发完即退，不需要排队
        let (end_tx, end_rx) = bounded(1);

        if let (Some(mut output), Some(decoder)) = (audio_output.take(), audio_decoder.take()) {
            let (rate, channels) = output.config();
            let pipeline =
                AudioPipeline::new(session.clone(), Box::new(decoder), rate, channels);
            output.start(pipeline)?;
            audio_output = Some(output);
        }

        let demux_session = session.clone();
        let demux_handle = thread::spawn(move || {
            demux_loop(&demux_session, &mut demuxer, MAX_QUEUE_BYTES, &end_tx);
        });

        let video_handle = video_decoder.map(|mut decoder| {
            let video_session = session.clone();
            thread::spawn(move || {
                let mut converter = RgbaConverter;
                video_decode_loop(&video_session, &mut decoder, &mut converter);
            })
        });

        info!(
            "✅ 播放已启动: 音频流 {:?}, 视频流 {:?}",
            session.audio_stream, session.video_stream
        );

        Ok(Self {
            session,
            events: end_rx,
            audio_output,
            demux_handle: Some(demux_handle),
            video_handle,
        })
    }

    /// 在调用线程上运行刷新调度，直到播放结束
    pub fn run(&mut self, presenter: &mut dyn Present) -> Result<()> {
        RefreshScheduler::new(self.session.clone()).run(presenter, &self.events)
    }

    /// 请求退出并回收全部线程（幂等）
    pub fn stop(&mut self) {
        self.session.request_quit();

        if let Some(mut output) = self.audio_output.take() {
            output.stop();
        }
        if let Some(handle) = self.video_handle.take() {
            if handle.join().is_err() {
                warn!("视频解码线程异常终止");
            }
        }
        if let Some(handle) = self.demux_handle.take() {
            if handle.join().is_err() {
                warn!("解封装线程异常终止");
            }
        }
        info!("🛑 播放已停止");
    }
}

impl Drop for PlaybackManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_device_failure_is_fatal() {
        // 设备打不开必须原样上抛，不得降级成纯视频播放
        let result = build_audio_chain::<(), ()>(
            Err(PlayerError::AudioError("无法找到音频输出设备".into())),
            |_| Ok(()),
        );
        assert!(matches!(result, Err(PlayerError::AudioError(_))));
    }

    #[test]
    fn test_audio_decoder_failure_only_disables_audio() {
        // 编解码器不支持仅禁用音频这一路
        let result = build_audio_chain(Ok(()), |_| -> Result<()> {
            Err(PlayerError::DecodeError("不支持的编码".into()))
        });
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_audio_chain_assembles_when_both_succeed() {
        let result = build_audio_chain(Ok(1u32), |n| Ok(n + 1));
        assert!(matches!(result, Ok(Some((1, 2)))));
    }
}
