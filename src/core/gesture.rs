//! Gesture-driven control.
//!
//! Frames are pulled one at a time from a [`FrameSequence`]. A recognizer turns each frame into
//! its top gesture label, which goes through the session like any other input. The sequence
//! ends for good when its cancellation token fires or the source runs dry.

use anyhow::Result;
use futures_util::{Stream, StreamExt};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::session::{ControlSession, Dispatch, InputEvent};

/// Produces the top gesture label of a frame, if any gesture was recognized.
pub trait GestureRecognizer<F>: Send {
    fn recognize(&mut self, frame: &F) -> Option<String>;
}

/// Recognizer for frames that already are labels (e.g. produced by an external model).
#[derive(Debug, Default, Clone, Copy)]
pub struct LabelFrames;

impl GestureRecognizer<String> for LabelFrames {
    fn recognize(&mut self, frame: &String) -> Option<String> {
        let label = frame.trim();
        (!label.is_empty()).then(|| label.to_string())
    }
}

/// Pull-based, non-restartable sequence of frames with an explicit stop signal.
pub struct FrameSequence<S> {
    frames: S,
    cancel_token: CancellationToken,
    finished: bool,
}

impl<S> FrameSequence<S>
where
    S: Stream + Unpin,
{
    pub fn new(frames: S, cancel_token: CancellationToken) -> Self {
        Self {
            frames,
            cancel_token,
            finished: false,
        }
    }

    /// Next frame, or `None` once stopped or exhausted.
    pub async fn next_frame(&mut self) -> Option<S::Item> {
        if self.finished {
            return None;
        }
        let frame = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => None,
            frame = self.frames.next() => frame,
        };
        if frame.is_none() {
            self.finished = true;
        }
        frame
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Drive `session` from recognized gestures until the sequence ends.
///
/// Returns the number of frames processed. Send failures are logged and the loop goes on.
pub async fn run_gesture_control<S, R>(
    frames: &mut FrameSequence<S>,
    recognizer: &mut R,
    session: &ControlSession,
) -> Result<usize>
where
    S: Stream + Unpin,
    R: GestureRecognizer<S::Item>,
{
    let mut processed = 0;
    while let Some(frame) = frames.next_frame().await {
        processed += 1;
        let Some(label) = recognizer.recognize(&frame) else {
            continue;
        };
        match session.handle_input(InputEvent::Gesture(&label)).await {
            Ok(Dispatch::Delivered { direction }) => info!("Gesture {} -> {}", label, direction),
            Ok(_) => {}
            Err(e) => warn!("Failed to send gesture {}: {}", label, e),
        }
    }
    info!("Gesture control stopped after {} frames", processed);
    Ok(processed)
}
