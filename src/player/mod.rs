// 播放器核心模块

pub mod audio_output;
pub mod audio_pipeline;
pub mod decoder;
pub mod demux;
pub mod demuxer;
pub mod manager;
pub mod packet_queue;
pub mod picture_queue;
pub mod refresh;
pub mod services;
pub mod session;
pub mod video_thread;

pub use audio_output::AudioOutput;
pub use audio_pipeline::AudioPipeline;
pub use decoder::{AudioDecoder, RgbaConverter, VideoDecoder};
pub use demuxer::Demuxer;
pub use manager::PlaybackManager;
pub use services::{HeadlessPresenter, Present};
pub use session::{PlaybackSession, PlayerEvent};
