//! CLI commands
//! Handlers behind each subcommand. They work on the shared [`AppState`] and hand errors back to
//! `main` for reporting; long-running loops log per-message failures and keep going.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::stream;
use log::{debug, error, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::control_config::TransportMode;
use crate::config::keymap_config::KeymapConfig;
use crate::config::network_config::NetworkConfig;
use crate::core::bluetooth::SendOutcome;
use crate::core::gesture::{FrameSequence, LabelFrames, run_gesture_control};
use crate::core::media::endpoint::build_service_url;
use crate::core::media::socket::{self, SocketEvent, SocketHandle, SocketSender};
use crate::core::media::{
    ChannelDirectory, ChannelInfo, MediaStreamState, ServiceKind, ServiceOptions, StreamEvent,
};
use crate::core::{ControlSession, InputEvent, MessageView};
use crate::error::SessionError;
use crate::state::AppState;

/// Owned form of an operator input read from a terminal line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlInput {
    KeyDown(String),
    KeyUp,
    Gesture(String),
}

impl ControlInput {
    pub fn as_event(&self) -> InputEvent<'_> {
        match self {
            ControlInput::KeyDown(code) => InputEvent::KeyDown(code),
            ControlInput::KeyUp => InputEvent::KeyUp,
            ControlInput::Gesture(label) => InputEvent::Gesture(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlLine {
    Input(ControlInput),
    Quit,
}

/// Parse one line typed by the operator.
///
/// `quit` ends the session, `stop`/`up`/`.` release the key, `gesture <label>` submits a gesture and
/// anything else is a key token looked up in the keymap.
pub fn parse_control_line(keymap: &KeymapConfig, line: &str) -> Option<ControlLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let input = match word {
        "quit" | "exit" => return Some(ControlLine::Quit),
        "stop" | "up" | "." => ControlInput::KeyUp,
        "gesture" | "g" if !rest.is_empty() => ControlInput::Gesture(rest.to_string()),
        "down" if !rest.is_empty() => ControlInput::KeyDown(keymap.key_code(rest).to_string()),
        token => ControlInput::KeyDown(keymap.key_code(token).to_string()),
    };
    Some(ControlLine::Input(input))
}

/// Query options the control pages use for their sockets
pub fn service_options(network: &NetworkConfig) -> ServiceOptions {
    ServiceOptions::new()
        .channel(&network.channel)
        .name(&network.channel_name)
        .track(&network.track)
        .mode(&network.mode)
}

/// Discovers and pairs the configured robot and attaches it to the session
pub async fn pair_robot(app_state: &AppState, cancel_token: &CancellationToken) -> Result<String> {
    let bluetooth_manager_arc = app_state.get_bluetooth_manager_arc().await?;
    let bluetooth_manager_guard = bluetooth_manager_arc.lock().await;

    let scan_timeout = Duration::from_secs(app_state.config.control.scan_timeout_secs);
    let name = bluetooth_manager_guard
        .pair(app_state.session.profile(), scan_timeout, cancel_token)
        .await?;
    let writer = bluetooth_manager_guard
        .writer()
        .await
        .ok_or(SessionError::NotPaired)?;
    app_state.session.attach_robot(Arc::new(writer)).await;
    Ok(name)
}

/// Stops the session and disconnects the robot, if one was paired
pub async fn disconnect(app_state: &AppState) -> Result<()> {
    app_state.session.stop().await;
    if let Some(bluetooth_manager_arc) = app_state.existing_bluetooth_manager().await {
        let bluetooth_manager_guard = bluetooth_manager_arc.lock().await;
        bluetooth_manager_guard.disconnect().await?;
    }
    Ok(())
}

/// Sends the media server and Wi-Fi settings to the robot, pairing first if needed
pub async fn provision_network(
    app_state: &AppState,
    cancel_token: &CancellationToken,
) -> Result<SendOutcome> {
    if !app_state.session.is_paired().await {
        pair_robot(app_state, cancel_token).await?;
    }
    let outcome = app_state
        .session
        .provision_network(&app_state.config.network)
        .await;
    disconnect(app_state).await?;
    outcome
}

pub async fn list_channels(app_state: &AppState) -> Result<Vec<ChannelInfo>> {
    let network = &app_state.config.network;
    ChannelDirectory::new()
        .fetch(&network.host, network.port, network.scheme())
        .await
}

/// Opens a pub or sub socket to the configured media server, with heartbeat
pub async fn open_media_socket(
    app_state: &AppState,
    kind: ServiceKind,
) -> Result<(Arc<SocketHandle>, UnboundedReceiver<SocketEvent>)> {
    let network = &app_state.config.network;
    let url = build_service_url(
        kind,
        &service_options(network),
        &network.host,
        network.port,
        network.scheme(),
    )?;
    socket::connect(&url, Duration::from_millis(network.heartbeat_interval_ms)).await
}

/// Keyboard control: read operator lines from `input` until `quit`, EOF or cancellation
pub async fn drive<R>(app_state: &AppState, input: R, cancel_token: CancellationToken) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let relay_task = connect_links(app_state, &cancel_token).await?;
    let session = app_state.session.clone();
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            _ = cancel_token.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        match parse_control_line(&app_state.config.keymap, &line) {
            Some(ControlLine::Quit) => break,
            Some(ControlLine::Input(control_input)) => {
                match session.handle_input(control_input.as_event()).await {
                    Ok(dispatch) => debug!("{:?} -> {:?}", control_input, dispatch),
                    Err(e) => error!("Failed to send command: {}", e),
                }
            }
            None => {}
        }
    }

    finish(app_state, &cancel_token, relay_task).await
}

/// Gesture control: each line of `input` is the top gesture label of one frame
pub async fn gesture_control<R>(
    app_state: &AppState,
    input: R,
    cancel_token: CancellationToken,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let relay_task = connect_links(app_state, &cancel_token).await?;

    let frames = Box::pin(stream::unfold(input.lines(), |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line, lines)),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read gesture frame: {}", e);
                None
            }
        }
    }));
    let mut sequence = FrameSequence::new(frames, cancel_token.clone());
    let processed = run_gesture_control(&mut sequence, &mut LabelFrames, &app_state.session).await?;

    finish(app_state, &cancel_token, relay_task).await?;
    Ok(processed)
}

/// Host relay: forward every message arriving on the publish socket to the paired robot
pub async fn relay(app_state: &AppState, cancel_token: CancellationToken) -> Result<()> {
    let name = pair_robot(app_state, &cancel_token).await?;
    info!("Relaying media server commands to {}", name);
    let (socket, events) = open_media_socket(app_state, ServiceKind::Pub).await?;
    relay_loop(app_state.session.clone(), socket, events, cancel_token).await;
    disconnect(app_state).await
}

/// Receive a media stream and report what arrives
pub async fn subscribe(
    app_state: &AppState,
    view: Arc<dyn MessageView>,
    cancel_token: CancellationToken,
) -> Result<SubscribeStats> {
    let (socket, mut events) = open_media_socket(app_state, ServiceKind::Sub).await?;
    view.show("Open WebSocket");

    let mut stream_state = MediaStreamState::new();
    let mut stats = SubscribeStats::default();
    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = events.recv() => event,
        };
        let message = match event {
            Some(SocketEvent::Message(message)) => message,
            Some(SocketEvent::Closed) | None => break,
        };
        match stream_state.handle(message) {
            StreamEvent::Descriptor { descriptor, decoder } => {
                stats.descriptors += 1;
                view.show(&format!("{} ({:?})", descriptor, decoder));
            }
            StreamEvent::JpegImage(data) => {
                stats.images += 1;
                debug!("JPEG frame, {} bytes", data.len());
            }
            StreamEvent::EncodedChunk { codec, data } => {
                stats.chunks += 1;
                debug!("{} chunk, {} bytes", codec, data.len());
            }
            StreamEvent::Dropped(reason) => {
                stats.dropped += 1;
                debug!("Frame dropped: {:?}", reason);
            }
        }
    }

    socket.close();
    Ok(stats)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeStats {
    pub descriptors: usize,
    pub images: usize,
    pub chunks: usize,
    pub dropped: usize,
}

/// Brings up the links the transport mode needs. In hybrid mode this also starts the relay
/// of publish socket messages to the robot.
async fn connect_links(
    app_state: &AppState,
    cancel_token: &CancellationToken,
) -> Result<Option<JoinHandle<()>>> {
    let session = app_state.session.clone();
    let mode = session.mode();

    if mode != TransportMode::Websocket {
        let name = pair_robot(app_state, cancel_token).await?;
        info!("Connected to {}", name);
    }

    if mode.uses_socket() {
        let (socket, events) = open_media_socket(app_state, ServiceKind::Sub).await?;
        session.attach_socket(socket);
        tokio::spawn(drain_events(events));
    }

    if mode == TransportMode::Hybrid {
        let (socket, events) = open_media_socket(app_state, ServiceKind::Pub).await?;
        let task = tokio::spawn(relay_loop(session, socket, events, cancel_token.clone()));
        return Ok(Some(task));
    }
    Ok(None)
}

async fn finish(
    app_state: &AppState,
    cancel_token: &CancellationToken,
    relay_task: Option<JoinHandle<()>>,
) -> Result<()> {
    cancel_token.cancel();
    if let Some(task) = relay_task {
        if let Err(e) = task.await {
            warn!("Relay task ended abnormally: {}", e);
        }
    }
    disconnect(app_state).await
}

async fn relay_loop(
    session: Arc<ControlSession>,
    socket: Arc<SocketHandle>,
    mut events: UnboundedReceiver<SocketEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Some(SocketEvent::Message(message)) => {
                if let Err(e) = session.relay_to_robot(&message).await {
                    error!("Failed to relay message to robot: {}", e);
                }
            }
            Some(SocketEvent::Closed) | None => break,
        }
    }
    socket.close();
}

async fn drain_events(mut events: UnboundedReceiver<SocketEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Subscribe socket event: {:?}", event);
    }
}
