use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use cobot_bridge_lib::config::control_config::TransportMode;
use cobot_bridge_lib::core::bluetooth::{ChunkReassembler, CharacteristicWriter};
use cobot_bridge_lib::core::media::{SocketMessage, SocketSender};
use cobot_bridge_lib::core::{ControlSession, Dispatch, InputEvent, MessageView, ProfileRegistry};

/// Characteristic that reassembles chunks the way the robot firmware does
#[derive(Default)]
struct FirmwareCharacteristic {
    reassembler: Mutex<ChunkReassembler>,
    chunks: Mutex<Vec<String>>,
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl CharacteristicWriter for FirmwareCharacteristic {
    async fn can_write(&self) -> bool {
        true
    }

    async fn write_value(&self, value: &[u8]) -> Result<()> {
        // a GATT write completes asynchronously; let other sends run in between
        tokio::task::yield_now().await;
        let chunk = String::from_utf8(value.to_vec())?;
        self.chunks.lock().unwrap().push(chunk.clone());
        if let Some(message) = self.reassembler.lock().unwrap().feed(&chunk) {
            self.messages.lock().unwrap().push(message);
        }
        Ok(())
    }
}

struct LoopbackSocket {
    open: AtomicBool,
    sent: Mutex<Vec<SocketMessage>>,
}

impl SocketSender for LoopbackSocket {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&self, message: SocketMessage) -> bool {
        if !self.is_open() {
            return false;
        }
        self.sent.lock().unwrap().push(message);
        true
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Screen {
    lines: Mutex<Vec<String>>,
}

impl MessageView for Screen {
    fn show(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
}

fn session(key: &str, mode: TransportMode) -> (Arc<ControlSession>, Arc<Screen>) {
    let screen = Arc::new(Screen::default());
    let profile = ProfileRegistry::builtin().get(key).unwrap().clone();
    (Arc::new(ControlSession::new(profile, mode, screen.clone())), screen)
}

#[tokio::test]
async fn cobot_pro_commands_survive_chunking() {
    let (session, screen) = session("CoBot_Pro", TransportMode::Ble);
    let robot = Arc::new(FirmwareCharacteristic::default());
    session.attach_robot(robot.clone()).await;

    for input in [
        InputEvent::KeyDown("KeyW"),
        InputEvent::KeyDown("KeyW"),
        InputEvent::KeyDown("KeyW"),
        InputEvent::KeyUp,
        InputEvent::Gesture("Open_Palm"),
    ] {
        session.handle_input(input).await.unwrap();
    }

    assert_eq!(
        *robot.messages.lock().unwrap(),
        [
            r#"{"type":"control","direction":"N"}"#,
            r#"{"type":"control","direction":"STOP"}"#,
            r#"{"type":"control","direction":"CCW"}"#,
        ]
    );
    let chunks = robot.chunks.lock().unwrap();
    assert_eq!(chunks[0], r#"{"type":"contro#3$"#);
    assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 15 + 3));
    assert_eq!(*screen.lines.lock().unwrap(), ["N", "STOP", "CCW"]);
}

#[tokio::test]
async fn concurrent_sends_do_not_interleave() {
    let (session, _) = session("CoBot_Pro", TransportMode::Ble);
    let robot = Arc::new(FirmwareCharacteristic::default());
    session.attach_robot(robot.clone()).await;

    let long_a = "a".repeat(100);
    let long_b = "b".repeat(100);
    let (first, second) = tokio::join!(session.send_to_robot(&long_a), session.send_to_robot(&long_b));
    first.unwrap();
    second.unwrap();

    let mut messages = robot.messages.lock().unwrap().clone();
    messages.sort();
    assert_eq!(messages, [long_a, long_b]);
    assert_eq!(robot.chunks.lock().unwrap().len(), 14);
}

#[tokio::test]
async fn xrover_over_websocket_sends_bare_tokens() {
    let (session, _) = session("XROVER_GRIPPER", TransportMode::Websocket);
    let socket = Arc::new(LoopbackSocket {
        open: AtomicBool::new(true),
        sent: Mutex::new(Vec::new()),
    });
    session.attach_socket(socket.clone());

    assert_eq!(
        session.handle_input(InputEvent::KeyDown("KeyK")).await.unwrap(),
        Dispatch::Delivered { direction: "O".into() }
    );
    session.handle_input(InputEvent::KeyUp).await.unwrap();

    assert_eq!(
        *socket.sent.lock().unwrap(),
        [
            SocketMessage::Binary(b"O".to_vec()),
            SocketMessage::Binary(b"S".to_vec()),
        ]
    );
}

#[tokio::test]
async fn websocket_mode_without_socket_is_an_error() {
    let (session, _) = session("CoBot_ESP32", TransportMode::Websocket);
    assert!(session.handle_input(InputEvent::KeyDown("KeyA")).await.is_err());
}
