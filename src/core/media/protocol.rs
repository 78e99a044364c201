//! Media stream framing.
//!
//! A stream is a text descriptor such as `video/h264;codecs=avc1.42E03C;width=640;height=480`
//! followed by binary frames. A newer descriptor replaces the previous one.

use std::fmt;

use log::{debug, info, warn};

use crate::core::media::socket::SocketMessage;

/// Decoder codec used when the descriptor names none.
pub const DEFAULT_DECODER_CODEC: &str = "avc1.42E03C";

/// Codec families the decoder side accepts.
pub const SUPPORTED_CODEC_FAMILIES: &[&str] = &["avc1", "vp8", "vp09", "av01"];

pub fn is_text_descriptor(message: &SocketMessage) -> bool {
    matches!(message, SocketMessage::Text(_))
}

pub fn is_encoded_chunk(message: &SocketMessage) -> bool {
    matches!(message, SocketMessage::Binary(_))
}

/// A parsed `type;key=value;...` descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeDescriptor {
    mime_type: String,
    options: Vec<(String, Option<String>)>,
}

impl MimeDescriptor {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            options: Vec::new(),
        }
    }

    /// Parse a descriptor.
    ///
    /// Empty segments are skipped, a segment without `=` is a key with no value, only the first
    /// `=` splits key from value and a repeated key keeps its last value.
    pub fn parse(text: &str) -> Self {
        let mut segments = text.split(';');
        let mime_type = segments.next().unwrap_or_default().trim().to_string();
        let mut descriptor = Self::new(mime_type);
        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once('=') {
                Some((key, value)) => descriptor.set(key.trim(), Some(value.trim())),
                None => descriptor.set(segment, None),
            }
        }
        descriptor
    }

    pub fn with_option(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.set(key, Some(&value.to_string()));
        self
    }

    fn set(&mut self, key: &str, value: Option<&str>) {
        let value = value.map(str::to_string);
        match self.options.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.options.push((key.to_string(), value)),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Value of `key`; `None` when absent or present without a value.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|(k, _)| k == key)
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn is_jpeg(&self) -> bool {
        self.mime_type.contains("jpeg")
    }

    /// Codec the decoder should be configured with.
    pub fn decoder_codec(&self) -> &str {
        self.option("codecs").unwrap_or(DEFAULT_DECODER_CODEC)
    }
}

impl fmt::Display for MimeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mime_type)?;
        for (key, value) in &self.options {
            match value {
                Some(value) => write!(f, ";{}={}", key, value)?,
                None => write!(f, ";{}", key)?,
            }
        }
        Ok(())
    }
}

pub fn is_supported_codec(codec: &str) -> bool {
    let family = codec.split('.').next().unwrap_or_default();
    SUPPORTED_CODEC_FAMILIES.contains(&family)
}

/// How the decoder was set up for a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderSetup {
    Configured { codec: String },
    /// JPEG frames are shown as images and need no decoder
    NotNeeded,
    Unsupported { codec: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Binary frame arrived before any descriptor
    NoDescriptor,
    /// The current descriptor's codec could not be configured
    DecoderNotConfigured,
}

/// What one inbound message meant for the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Descriptor {
        descriptor: MimeDescriptor,
        decoder: DecoderSetup,
    },
    JpegImage(Vec<u8>),
    EncodedChunk {
        codec: String,
        data: Vec<u8>,
    },
    Dropped(DropReason),
}

/// Consumer-side stream state: the descriptor in effect and the decoder it configured.
#[derive(Debug, Default)]
pub struct MediaStreamState {
    descriptor: Option<MimeDescriptor>,
    decoder_codec: Option<String>,
}

impl MediaStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor(&self) -> Option<&MimeDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn handle(&mut self, message: SocketMessage) -> StreamEvent {
        match message {
            SocketMessage::Text(text) => self.apply_descriptor(&text),
            SocketMessage::Binary(data) => self.accept_frame(data),
        }
    }

    fn apply_descriptor(&mut self, text: &str) -> StreamEvent {
        let descriptor = MimeDescriptor::parse(text);
        info!("Stream descriptor: {}", descriptor);

        let decoder = if descriptor.is_jpeg() || descriptor.decoder_codec().contains("jpeg") {
            self.decoder_codec = None;
            DecoderSetup::NotNeeded
        } else {
            let codec = descriptor.decoder_codec().to_string();
            if is_supported_codec(&codec) {
                self.decoder_codec = Some(codec.clone());
                DecoderSetup::Configured { codec }
            } else {
                warn!("Unsupported codec {}, frames will be dropped", codec);
                self.decoder_codec = None;
                DecoderSetup::Unsupported { codec }
            }
        };

        self.descriptor = Some(descriptor.clone());
        StreamEvent::Descriptor {
            descriptor,
            decoder,
        }
    }

    fn accept_frame(&mut self, data: Vec<u8>) -> StreamEvent {
        let Some(descriptor) = &self.descriptor else {
            debug!("Dropping {} byte frame received before a descriptor", data.len());
            return StreamEvent::Dropped(DropReason::NoDescriptor);
        };
        if descriptor.is_jpeg() {
            return StreamEvent::JpegImage(data);
        }
        match &self.decoder_codec {
            Some(codec) => StreamEvent::EncodedChunk {
                codec: codec.clone(),
                data,
            },
            None => StreamEvent::Dropped(DropReason::DecoderNotConfigured),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_video_descriptor() {
        let descriptor = MimeDescriptor::parse("video/h264;codecs=avc1.42E03C;width=640;height=480");
        assert_eq!(descriptor.mime_type(), "video/h264");
        assert_eq!(descriptor.option("codecs"), Some("avc1.42E03C"));
        assert_eq!(descriptor.option("width"), Some("640"));
        assert_eq!(descriptor.option("height"), Some("480"));
    }

    #[test]
    fn parse_edge_cases() {
        let descriptor = MimeDescriptor::parse(" image/jpeg ;; flag ;a=b=c; a=d ;");
        assert_eq!(descriptor.mime_type(), "image/jpeg");
        assert!(descriptor.has_option("flag"));
        assert_eq!(descriptor.option("flag"), None);
        assert_eq!(descriptor.option("a"), Some("d"));
        assert_eq!(descriptor.options().count(), 2);

        assert_eq!(MimeDescriptor::parse("x;k=b=c").option("k"), Some("b=c"));
        assert_eq!(MimeDescriptor::parse("").mime_type(), "");
    }

    #[test]
    fn display_keeps_option_order() {
        let descriptor = MimeDescriptor::new("video/vp8")
            .with_option("codecs", "vp8")
            .with_option("width", 1280)
            .with_option("height", 720);
        assert_eq!(descriptor.to_string(), "video/vp8;codecs=vp8;width=1280;height=720");
        assert_eq!(MimeDescriptor::parse(&descriptor.to_string()), descriptor);
    }

    #[test]
    fn message_kinds() {
        assert!(is_text_descriptor(&SocketMessage::Text("video/h264".into())));
        assert!(is_encoded_chunk(&SocketMessage::Binary(vec![0, 0, 1])));
        assert!(!is_encoded_chunk(&SocketMessage::Text("x".into())));
    }

    #[test]
    fn frames_before_descriptor_are_dropped() {
        let mut stream = MediaStreamState::new();
        assert_eq!(
            stream.handle(SocketMessage::Binary(vec![1, 2, 3])),
            StreamEvent::Dropped(DropReason::NoDescriptor)
        );
    }

    #[test]
    fn descriptor_configures_decoder() {
        let mut stream = MediaStreamState::new();
        let event = stream.handle(SocketMessage::Text("video/h264;width=640".into()));
        match event {
            StreamEvent::Descriptor { decoder, .. } => assert_eq!(
                decoder,
                DecoderSetup::Configured {
                    codec: DEFAULT_DECODER_CODEC.into()
                }
            ),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            stream.handle(SocketMessage::Binary(vec![9])),
            StreamEvent::EncodedChunk {
                codec: DEFAULT_DECODER_CODEC.into(),
                data: vec![9]
            }
        );
    }

    #[test]
    fn newer_descriptor_supersedes() {
        let mut stream = MediaStreamState::new();
        stream.handle(SocketMessage::Text("video/vp8;codecs=vp8".into()));
        stream.handle(SocketMessage::Text("image/jpeg".into()));
        assert_eq!(stream.descriptor().unwrap().mime_type(), "image/jpeg");
        assert_eq!(
            stream.handle(SocketMessage::Binary(vec![0xff, 0xd8])),
            StreamEvent::JpegImage(vec![0xff, 0xd8])
        );

        stream.handle(SocketMessage::Text("video/x;codecs=hevc".into()));
        assert_eq!(
            stream.handle(SocketMessage::Binary(vec![1])),
            StreamEvent::Dropped(DropReason::DecoderNotConfigured)
        );
    }
}
