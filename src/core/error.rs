use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("FFmpeg 错误: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("无法打开文件: {0}")]
    OpenError(String),

    #[error("没有可播放的音视频流")]
    NoStream,

    #[error("解码错误: {0}")]
    DecodeError(String),

    #[error("队列已关闭")]
    QueueClosed,

    #[error("音频输出错误: {0}")]
    AudioError(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
