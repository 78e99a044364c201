//! Control session
//! Holds everything one operator session needs: the robot profile, the paired robot's writer,
//! the media socket and the last transmitted direction.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use log::{debug, info, warn};

use crate::config::control_config::TransportMode;
use crate::config::network_config::NetworkConfig;
use crate::core::bluetooth::transport::{CharacteristicWriter, ChunkedTransport, SendOutcome};
use crate::core::command::{
    DirectionFilter, build_metric_message, build_wire_command, resolve_direction, resolve_stop,
};
use crate::core::media::socket::{SocketMessage, SocketSender};
use crate::core::profile::{DeviceProfile, InputSource};
use crate::error::SessionError;

/// Where directions and status lines are shown to the operator.
pub trait MessageView: Send + Sync {
    fn show(&self, message: &str);
}

/// One raw operator input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent<'a> {
    /// Key pressed, as a `KeyboardEvent.code`
    KeyDown(&'a str),
    /// Any key released
    KeyUp,
    /// Top label of a recognized hand gesture
    Gesture(&'a str),
}

/// What happened to one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The profile has no direction for the input
    Unmapped,
    /// Same direction as the last one sent
    Suppressed,
    Delivered { direction: String },
    /// Admitted, but the link refused it (closed socket or read-only characteristic)
    Skipped { direction: String },
}

pub struct ControlSession {
    profile: DeviceProfile,
    mode: TransportMode,
    /// Held for the whole of a send so chunks of different messages never interleave
    robot: tokio::sync::Mutex<Option<Arc<dyn CharacteristicWriter>>>,
    socket: Mutex<Option<Arc<dyn SocketSender>>>,
    last_direction: Mutex<DirectionFilter>,
    view: Arc<dyn MessageView>,
}

impl ControlSession {
    pub fn new(profile: DeviceProfile, mode: TransportMode, view: Arc<dyn MessageView>) -> Self {
        Self {
            profile,
            mode,
            robot: tokio::sync::Mutex::new(None),
            socket: Mutex::new(None),
            last_direction: Mutex::new(DirectionFilter::new()),
            view,
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub async fn attach_robot(&self, writer: Arc<dyn CharacteristicWriter>) {
        *self.robot.lock().await = Some(writer);
        info!("Robot attached to {} session", self.profile.key);
    }

    pub async fn detach_robot(&self) {
        self.robot.lock().await.take();
    }

    pub async fn is_paired(&self) -> bool {
        self.robot.lock().await.is_some()
    }

    pub fn attach_socket(&self, socket: Arc<dyn SocketSender>) {
        *lock(&self.socket) = Some(socket);
        self.view.show("Open WebSocket");
    }

    pub fn detach_socket(&self) -> Option<Arc<dyn SocketSender>> {
        lock(&self.socket).take()
    }

    pub fn last_direction(&self) -> Option<String> {
        lock(&self.last_direction).last().map(str::to_string)
    }

    /// Resolve, suppress, encode and route one input.
    pub async fn handle_input(&self, input: InputEvent<'_>) -> Result<Dispatch> {
        let direction = match input {
            InputEvent::KeyDown(code) => resolve_direction(&self.profile, InputSource::Keyboard, code),
            InputEvent::KeyUp => Some(resolve_stop(&self.profile)),
            InputEvent::Gesture(label) => {
                resolve_direction(&self.profile, InputSource::HandGesture, label)
            }
        };
        let Some(direction) = direction else {
            return Ok(Dispatch::Unmapped);
        };

        let previous = {
            let mut filter = lock(&self.last_direction);
            let previous = filter.last().map(str::to_string);
            if !filter.admit(direction) {
                debug!("Direction {} already sent, skipping", direction);
                return Ok(Dispatch::Suppressed);
            }
            previous
        };

        // a failed send leaves the slot as it was, so the operator can resubmit
        let delivered = match self.route(direction).await {
            Ok(delivered) => delivered,
            Err(e) => {
                lock(&self.last_direction).revert(previous);
                return Err(e);
            }
        };

        let direction = direction.to_string();
        if delivered {
            self.view.show(&direction);
            Ok(Dispatch::Delivered { direction })
        } else {
            Ok(Dispatch::Skipped { direction })
        }
    }

    /// Encode `direction` and hand it to the link the transport mode selects.
    async fn route(&self, direction: &str) -> Result<bool> {
        let wire = build_wire_command(self.profile.wire_format, direction).to_wire_text()?;
        if self.mode.commands_over_ble() {
            Ok(matches!(self.send_to_robot(&wire).await?, SendOutcome::Sent { .. }))
        } else {
            self.send_over_socket(&wire)
        }
    }

    /// Write `message` to the paired robot, chunked when the profile has a transfer limit.
    pub async fn send_to_robot(&self, message: &str) -> Result<SendOutcome> {
        let robot = self.robot.lock().await;
        let writer = robot.as_ref().ok_or(SessionError::NotPaired)?;
        ChunkedTransport::send(message, self.profile.max_transfer_size, writer.as_ref()).await
    }

    /// Write `text` to the paired robot in one piece.
    pub async fn send_text_to_robot(&self, text: &str) -> Result<SendOutcome> {
        let robot = self.robot.lock().await;
        let writer = robot.as_ref().ok_or(SessionError::NotPaired)?;
        ChunkedTransport::send_text(text, writer.as_ref()).await
    }

    /// Hand the media server and Wi-Fi settings to the robot.
    pub async fn provision_network(&self, network: &NetworkConfig) -> Result<SendOutcome> {
        if !self.profile.has_wifi_setting {
            bail!("{} has no Wi-Fi setting", self.profile.label);
        }
        let message = build_metric_message(network, &self.profile.key)?.to_json()?;
        let outcome = self.send_to_robot(&message).await?;
        info!("Media server info sent to {}", self.profile.key);
        Ok(outcome)
    }

    /// Forward a message received on the publish socket to the robot as text.
    pub async fn relay_to_robot(&self, message: &SocketMessage) -> Result<SendOutcome> {
        let text = String::from_utf8_lossy(message.as_bytes());
        debug!("Relaying {} to robot", text);
        self.send_text_to_robot(&text).await
    }

    /// Close the socket and forget the robot. Safe to call repeatedly.
    pub async fn stop(&self) {
        if let Some(socket) = self.detach_socket() {
            socket.close();
        }
        self.detach_robot().await;
        lock(&self.last_direction).reset();
        info!("Control session for {} stopped", self.profile.key);
    }

    fn send_over_socket(&self, wire: &str) -> Result<bool> {
        let socket = lock(&self.socket)
            .clone()
            .ok_or(SessionError::WebSocketNotConfigured)?;
        if !socket.is_open() {
            warn!("{}, command {} dropped", SessionError::SocketNotOpen, wire);
            return Ok(false);
        }
        Ok(socket.send(SocketMessage::Binary(wire.as_bytes().to_vec())))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::core::bluetooth::transport::tests::RecordingWriter;
    use crate::core::media::socket::tests::FakeSocket;
    use crate::core::profile::ProfileRegistry;

    #[derive(Default)]
    struct RecordingView {
        lines: Mutex<Vec<String>>,
    }

    impl MessageView for RecordingView {
        fn show(&self, message: &str) {
            self.lines.lock().unwrap().push(message.to_string());
        }
    }

    fn new_session(key: &str, mode: TransportMode) -> (ControlSession, Arc<RecordingView>) {
        let view = Arc::new(RecordingView::default());
        let profile = ProfileRegistry::builtin().get(key).unwrap().clone();
        (ControlSession::new(profile, mode, view.clone()), view)
    }

    #[tokio::test]
    async fn key_repeat_sends_once() {
        let (session, view) = new_session("XROVER_DOT", TransportMode::Ble);
        let writer = Arc::new(RecordingWriter::default());
        session.attach_robot(writer.clone()).await;

        let first = session.handle_input(InputEvent::KeyDown("KeyW")).await.unwrap();
        let repeat = session.handle_input(InputEvent::KeyDown("KeyW")).await.unwrap();
        let release = session.handle_input(InputEvent::KeyUp).await.unwrap();

        assert_eq!(first, Dispatch::Delivered { direction: "F".into() });
        assert_eq!(repeat, Dispatch::Suppressed);
        assert_eq!(release, Dispatch::Delivered { direction: "S".into() });
        assert_eq!(writer.written(), ["F", "S"]);
        assert_eq!(*view.lines.lock().unwrap(), ["F", "S"]);
    }

    #[tokio::test]
    async fn unmapped_key_is_ignored() {
        let (session, _) = new_session("XROVER_DOT", TransportMode::Ble);
        let writer = Arc::new(RecordingWriter::default());
        session.attach_robot(writer.clone()).await;

        assert_eq!(
            session.handle_input(InputEvent::KeyDown("KeyZ")).await.unwrap(),
            Dispatch::Unmapped
        );
        assert_eq!(
            session.handle_input(InputEvent::Gesture("Closed_Fist")).await.unwrap(),
            Dispatch::Unmapped
        );
        assert!(writer.written().is_empty());
        assert_eq!(session.last_direction(), None);
    }

    #[tokio::test]
    async fn envelope_is_chunked_for_cobot_pro() {
        let (session, _) = new_session("CoBot_Pro", TransportMode::Ble);
        let writer = Arc::new(RecordingWriter::default());
        session.attach_robot(writer.clone()).await;

        session.handle_input(InputEvent::Gesture("Closed_Fist")).await.unwrap();
        assert_eq!(
            writer.written(),
            [r#"{"type":"contro#3$"#, r#"l","direction":$"#, r#""N"}$"#]
        );
    }

    #[tokio::test]
    async fn ble_mode_without_robot_is_an_error() {
        let (session, _) = new_session("CoBot_ESP32", TransportMode::Ble);
        let err = session.handle_input(InputEvent::KeyDown("KeyW")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::NotPaired)
        ));
    }

    #[tokio::test]
    async fn failed_write_can_be_resubmitted() {
        let (session, view) = new_session("XROVER_DOT", TransportMode::Ble);
        let writer = Arc::new(RecordingWriter {
            failures_left: AtomicUsize::new(1),
            ..Default::default()
        });
        session.attach_robot(writer.clone()).await;

        assert!(session.handle_input(InputEvent::KeyDown("KeyW")).await.is_err());
        assert_eq!(session.last_direction(), None);

        let retry = session.handle_input(InputEvent::KeyDown("KeyW")).await.unwrap();
        assert_eq!(retry, Dispatch::Delivered { direction: "F".into() });
        assert_eq!(writer.written(), ["F"]);
        assert_eq!(*view.lines.lock().unwrap(), ["F"]);
    }

    #[tokio::test]
    async fn failed_write_keeps_the_earlier_direction() {
        let (session, _) = new_session("XROVER_DOT", TransportMode::Ble);
        let writer = Arc::new(RecordingWriter::default());
        session.attach_robot(writer.clone()).await;
        session.handle_input(InputEvent::KeyDown("KeyW")).await.unwrap();

        writer.failures_left.store(1, Ordering::SeqCst);
        assert!(session.handle_input(InputEvent::KeyDown("KeyD")).await.is_err());
        assert_eq!(session.last_direction().as_deref(), Some("F"));

        assert_eq!(
            session.handle_input(InputEvent::KeyDown("KeyW")).await.unwrap(),
            Dispatch::Suppressed
        );
        session.handle_input(InputEvent::KeyDown("KeyD")).await.unwrap();
        assert_eq!(writer.written(), ["F", "R"]);
    }

    #[tokio::test]
    async fn direction_sent_before_pairing_goes_out_after_pairing() {
        let (session, _) = new_session("XROVER_GRIPPER", TransportMode::Ble);
        assert!(session.handle_input(InputEvent::KeyDown("KeyW")).await.is_err());

        let writer = Arc::new(RecordingWriter::default());
        session.attach_robot(writer.clone()).await;
        assert_eq!(
            session.handle_input(InputEvent::KeyDown("KeyW")).await.unwrap(),
            Dispatch::Delivered { direction: "F".into() }
        );
        assert_eq!(writer.written(), ["F"]);
    }

    #[tokio::test]
    async fn websocket_mode_sends_bytes_and_skips_when_closed() {
        let (session, view) = new_session("CoBot_ESP32", TransportMode::Websocket);
        let socket = Arc::new(FakeSocket::open());
        session.attach_socket(socket.clone());

        session.handle_input(InputEvent::KeyDown("KeyD")).await.unwrap();
        socket.set_open(false);
        let skipped = session.handle_input(InputEvent::KeyUp).await.unwrap();

        assert_eq!(skipped, Dispatch::Skipped { direction: "STOP".into() });
        assert_eq!(
            socket.sent(),
            vec![SocketMessage::Binary(br#"{"type":"control","direction":"CW"}"#.to_vec())]
        );
        assert_eq!(*view.lines.lock().unwrap(), ["Open WebSocket", "CW"]);
    }

    #[tokio::test]
    async fn relay_writes_text_unchunked() {
        let (session, _) = new_session("CoBot_Pro", TransportMode::Hybrid);
        let writer = Arc::new(RecordingWriter::default());
        session.attach_robot(writer.clone()).await;

        let message = SocketMessage::Binary(br#"{"type":"control","direction":"N"}"#.to_vec());
        session.relay_to_robot(&message).await.unwrap();
        assert_eq!(writer.written(), [r#"{"type":"control","direction":"N"}"#]);
    }

    #[tokio::test]
    async fn provisioning_requires_wifi_profile() {
        let (session, _) = new_session("XROVER_GRIPPER", TransportMode::Ble);
        session.attach_robot(Arc::new(RecordingWriter::default())).await;
        assert!(session.provision_network(&NetworkConfig::default()).await.is_err());

        let (session, _) = new_session("CoBot_ESP32", TransportMode::Ble);
        let writer = Arc::new(RecordingWriter::default());
        session.attach_robot(writer.clone()).await;
        session.provision_network(&NetworkConfig::default()).await.unwrap();
        let written = writer.written();
        assert_eq!(written.len(), 1);
        assert!(written[0].starts_with(r#"{"type":"metric","data":{"server":"#));
    }

    #[tokio::test]
    async fn stop_resets_the_session() {
        let (session, _) = new_session("CoBot_ESP32", TransportMode::Hybrid);
        let socket = Arc::new(FakeSocket::open());
        session.attach_socket(socket.clone());
        session.attach_robot(Arc::new(RecordingWriter::default())).await;
        session.handle_input(InputEvent::KeyDown("KeyW")).await.unwrap();

        session.stop().await;
        session.stop().await;

        assert!(!socket.is_open());
        assert!(!session.is_paired().await);
        assert_eq!(session.last_direction(), None);
    }
}
