use crate::core::{Packet, Result};
use crate::player::services::AudioDecode;
use crate::player::session::PlaybackSession;
use log::{debug, warn};
use std::sync::Arc;

/// 解码失败/流结束时顶替输出的静音长度（采样数）
const SILENCE_SAMPLES: usize = 1024;

/// 音频解码管线 - 拉模式
///
/// 由音频设备的回调按需调用 fill()，而不是由解码侧主动推送。
/// 同时维护权威音频时钟：每个产出采样的子帧之后按
/// `时钟 = 包 pts + 包内已解码字节 / 每秒字节数` 推进并发布。
///
/// 残余缓冲、索引等过往隐藏在回调静态存储里的状态，在这里都是
/// 管线自己的字段，随对象显式传递。
pub struct AudioPipeline {
    session: Arc<PlaybackSession>,
    decoder: Box<dyn AudioDecode>,
    /// 固定输出格式
    sample_rate: u32,
    channels: u16,
    /// 残余采样缓冲（上次解码多出的部分）
    buf: Vec<f32>,
    buf_index: usize,
    /// 当前包与包内解码进度
    cur_packet: Option<Packet>,
    pkt_offset: usize,
    /// 时钟推算值（秒）
    pts_seconds: f64,
}

impl AudioPipeline {
    pub fn new(
        session: Arc<PlaybackSession>,
        decoder: Box<dyn AudioDecode>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            session,
            decoder,
            sample_rate,
            channels,
            buf: Vec::new(),
            buf_index: 0,
            cur_packet: None,
            pkt_offset: 0,
            pts_seconds: 0.0,
        }
    }

    /// 填满整个输出缓冲
    ///
    /// 解码失败或流结束时以固定长度静音顶替，平滑退化 -
    /// 绝不把错误抛给音频设备，也绝不卡死设备回调。
    pub fn fill(&mut self, out: &mut [f32]) {
        let mut filled = 0;
        while filled < out.len() {
            if self.buf_index >= self.buf.len() {
                if let Err(e) = self.decode_subframe_into_buf() {
                    debug!("音频管线无数据（{}），输出静音", e);
                    self.buf.clear();
                    self.buf.resize(SILENCE_SAMPLES, 0.0);
                }
                self.buf_index = 0;
            }
            let n = (out.len() - filled).min(self.buf.len() - self.buf_index);
            out[filled..filled + n]
                .copy_from_slice(&self.buf[self.buf_index..self.buf_index + n]);
            filled += n;
            self.buf_index += n;
        }
    }

    /// 解码直到得到一个产出采样的子帧，写入残余缓冲并推进时钟
    ///
    /// 队列关闭（即流结束/退出）时返回 QueueClosed，由 fill 静音顶替。
    fn decode_subframe_into_buf(&mut self) -> Result<()> {
        loop {
            if let Some(packet) = self.cur_packet.take() {
                // 当前包还有未解码字节
                while self.pkt_offset < packet.data.len() {
                    let sub = match self.decoder.decode_subframe(&packet.data[self.pkt_offset..]) {
                        Ok(sub) => sub,
                        Err(e) => {
                            // 单包解码错误就地恢复：丢弃包剩余部分换下一个包
                            warn!("音频解码错误（已跳过包剩余部分）: {}", e);
                            self.pkt_offset = packet.data.len();
                            break;
                        }
                    };
                    // 既不产出也不消耗的子帧视为解码器卡住，丢弃本包
                    if sub.samples.is_empty() && sub.consumed == 0 {
                        self.pkt_offset = packet.data.len();
                        break;
                    }
                    self.pkt_offset += sub.consumed;
                    if sub.samples.is_empty() {
                        // 无输出子帧（priming 等），继续解码
                        continue;
                    }
                    // 产出采样：推进并发布音频时钟
                    self.pts_seconds += sub.samples.len() as f64
                        / (self.sample_rate as f64 * self.channels as f64);
                    self.session.clock.set(self.pts_seconds);
                    self.buf = sub.samples;
                    self.buf_index = 0;
                    self.cur_packet = Some(packet);
                    return Ok(());
                }
                // 包耗尽，释放
            }
            // 阻塞取下一个包；队列关闭即为流结束
            let packet = loop {
                if let Some(p) = self.session.audio_queue.get(true)? {
                    break p;
                }
            };
            if let Some(pts) = packet.pts {
                self.pts_seconds = pts as f64 * self.session.audio_time_base;
            }
            self.pkt_offset = 0;
            self.cur_packet = Some(packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PlayerError;
    use crate::player::services::AudioSubframe;
    use std::collections::VecDeque;

    /// 按脚本逐次返回子帧的假解码器
    struct ScriptedDecoder {
        script: VecDeque<Result<AudioSubframe>>,
    }

    impl ScriptedDecoder {
        fn new(script: Vec<Result<AudioSubframe>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl AudioDecode for ScriptedDecoder {
        fn decode_subframe(&mut self, _data: &[u8]) -> Result<AudioSubframe> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(PlayerError::DecodeError("脚本耗尽".into())))
        }
    }

    fn make_session() -> Arc<PlaybackSession> {
        // 音频 time_base = 1/100 秒
        Arc::new(PlaybackSession::new(Some(0), None, 0.01, 0.001))
    }

    fn audio_packet(session: &PlaybackSession, len: usize, pts: Option<i64>) {
        session
            .audio_queue
            .put(Packet {
                stream_index: 0,
                data: vec![0u8; len],
                pts,
                dts: None,
            })
            .unwrap();
    }

    #[test]
    fn test_fill_copies_samples_then_silence() {
        let session = make_session();
        audio_packet(&session, 8, None);
        session.audio_queue.close();

        let decoder = ScriptedDecoder::new(vec![Ok(AudioSubframe {
            samples: vec![0.5; 4],
            consumed: 8,
        })]);
        let mut pipe = AudioPipeline::new(session, Box::new(decoder), 48_000, 2);

        let mut out = [1.0f32; 8];
        pipe.fill(&mut out);
        assert_eq!(&out[..4], &[0.5; 4]);
        // 队列关闭后以静音补齐，绝不阻塞
        assert_eq!(&out[4..], &[0.0; 4]);
    }

    #[test]
    fn test_clock_follows_packet_pts_plus_decoded_bytes() {
        let session = make_session();
        // pts=100 单位 × 0.01 秒/单位 = 1.0 秒
        audio_packet(&session, 4, Some(100));
        session.audio_queue.close();

        // 4800 采样 / (48000 Hz × 2 声道) = 0.05 秒
        let decoder = ScriptedDecoder::new(vec![Ok(AudioSubframe {
            samples: vec![0.0; 4800],
            consumed: 4,
        })]);
        let clock = session.clock.clone();
        let mut pipe = AudioPipeline::new(session, Box::new(decoder), 48_000, 2);

        let mut out = vec![0.0f32; 4800];
        pipe.fill(&mut out);
        assert!((clock.get() - 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_zero_output_subframe_keeps_decoding() {
        let session = make_session();
        audio_packet(&session, 8, None);
        session.audio_queue.close();

        let decoder = ScriptedDecoder::new(vec![
            // priming 子帧：消耗字节但无输出
            Ok(AudioSubframe {
                samples: vec![],
                consumed: 4,
            }),
            Ok(AudioSubframe {
                samples: vec![0.25; 2],
                consumed: 4,
            }),
        ]);
        let mut pipe = AudioPipeline::new(session, Box::new(decoder), 48_000, 2);

        let mut out = [0.0f32; 2];
        pipe.fill(&mut out);
        assert_eq!(out, [0.25; 2]);
    }

    #[test]
    fn test_decode_error_discards_packet_remainder() {
        let session = make_session();
        audio_packet(&session, 16, None);
        audio_packet(&session, 4, None);
        session.audio_queue.close();

        let decoder = ScriptedDecoder::new(vec![
            // 第一个包解码失败，剩余字节被丢弃
            Err(PlayerError::DecodeError("坏包".into())),
            // 第二个包正常
            Ok(AudioSubframe {
                samples: vec![0.75; 4],
                consumed: 4,
            }),
        ]);
        let mut pipe = AudioPipeline::new(session, Box::new(decoder), 48_000, 2);

        let mut out = [0.0f32; 4];
        pipe.fill(&mut out);
        assert_eq!(out, [0.75; 4]);
    }

    #[test]
    fn test_closed_queue_yields_pure_silence() {
        let session = make_session();
        session.audio_queue.close();

        let decoder = ScriptedDecoder::new(vec![]);
        let mut pipe = AudioPipeline::new(session, Box::new(decoder), 48_000, 2);

        let mut out = [9.0f32; 2048];
        pipe.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
