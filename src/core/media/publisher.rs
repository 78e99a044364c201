//! Publisher side of a media channel: announces the stream descriptor, then forwards encoded
//! chunks as binary frames. Encoding itself happens outside the bridge.
//!
//! Library-only API: the CLI has no camera or encoder to feed it, so no subcommand uses it.
//! Embedders connect a pub socket with [`crate::commands::open_media_socket`] and drive a
//! [`MediaPublisher`] with their encoder output, flagging keyframes with [`KeyframeSchedule`].

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use log::{info, warn};

use crate::core::media::protocol::MimeDescriptor;
use crate::core::media::socket::{SocketMessage, SocketSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    Vp8,
    Vp9,
}

impl VideoCodec {
    pub fn name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::Vp8 => "vp8",
            VideoCodec::Vp9 => "vp9",
        }
    }

    /// Codec string handed to the encoder and announced in the descriptor
    pub fn codec_string(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "avc1.42E03C",
            VideoCodec::Vp8 => "vp8",
            VideoCodec::Vp9 => "vp09.00.31.08",
        }
    }
}

impl FromStr for VideoCodec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "h264" => Ok(VideoCodec::H264),
            "vp8" => Ok(VideoCodec::Vp8),
            "vp9" => Ok(VideoCodec::Vp9),
            other => Err(anyhow!("Unsupported video codec: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

pub const SUPPORTED_RESOLUTIONS: [Resolution; 3] = [
    Resolution { width: 640, height: 480 },
    Resolution { width: 1280, height: 720 },
    Resolution { width: 1920, height: 1080 },
];

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (width, height) = s
            .split_once('x')
            .ok_or_else(|| anyhow!("Resolution must look like 640x480, got {}", s))?;
        Ok(Resolution {
            width: width.trim().parse()?,
            height: height.trim().parse()?,
        })
    }
}

/// `video/<codec>;codecs=<codec string>;width=<w>;height=<h>`
pub fn stream_descriptor(codec: VideoCodec, resolution: Resolution) -> MimeDescriptor {
    MimeDescriptor::new(format!("video/{}", codec.name()))
        .with_option("codecs", codec.codec_string())
        .with_option("width", resolution.width)
        .with_option("height", resolution.height)
}

/// Marks every `interval`-th frame as a keyframe, counting from 1.
#[derive(Debug, Clone)]
pub struct KeyframeSchedule {
    interval: NonZeroU32,
    frame_counter: u64,
}

impl KeyframeSchedule {
    pub fn new(interval: NonZeroU32) -> Self {
        Self {
            interval,
            frame_counter: 0,
        }
    }

    /// Advance to the next frame and report whether it must be a keyframe.
    pub fn next_frame(&mut self) -> bool {
        self.frame_counter += 1;
        self.frame_counter % u64::from(self.interval.get()) == 0
    }
}

pub struct MediaPublisher<S: SocketSender + ?Sized> {
    socket: Arc<S>,
    announced: bool,
}

impl<S: SocketSender + ?Sized> MediaPublisher<S> {
    pub fn new(socket: Arc<S>) -> Self {
        Self {
            socket,
            announced: false,
        }
    }

    /// Send the stream descriptor. Must happen before any chunk.
    pub fn announce(&mut self, codec: VideoCodec, resolution: Resolution) -> bool {
        let descriptor = format!("{};", stream_descriptor(codec, resolution));
        info!("Announcing stream {}", descriptor);
        self.announced = self.socket.send(SocketMessage::Text(descriptor));
        self.announced
    }

    /// Forward one encoded chunk; skipped while the socket is not open.
    pub fn publish_chunk(&self, chunk: &[u8]) -> bool {
        if !self.announced {
            warn!("Dropping chunk published before the stream descriptor");
            return false;
        }
        self.socket.send(SocketMessage::Binary(chunk.to_vec()))
    }
}
