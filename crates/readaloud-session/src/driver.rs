//! Async driver: runs a session on its own task.
//!
//! The task owns the session exclusively and multiplexes, in one
//! `select!` loop: commands from [`SessionHandle`]s, engine signals, a
//! frame ticker for coalesced highlight work, and the session's next
//! deadline (deferred reconfiguration, sleep timer).

use std::time::Duration;

use readaloud_core::{
    EngineId, HighlightColor, HighlightGranularity, HighlightStyle, NarrationSnapshot,
    SegmentWindow, VoiceInfo,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::NarrationSession;

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 64;

/// The driver task has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Narration session is no longer running")]
pub struct SessionClosed;

/// Commands accepted by the driver task.
#[derive(Debug)]
pub enum SessionCommand {
    Play {
        start: Option<usize>,
        from_visible: bool,
        reply: oneshot::Sender<bool>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    Stop,
    Step {
        delta: i64,
        reply: oneshot::Sender<bool>,
    },
    Seek {
        target: i64,
        autoplay: bool,
        reply: oneshot::Sender<bool>,
    },
    Jump {
        delta_ms: i64,
        reply: oneshot::Sender<bool>,
    },
    PlayFromText {
        needle: String,
        reply: oneshot::Sender<bool>,
    },
    SetRate(f32),
    SetPitch(f32),
    SetVolume(f32),
    SetVoice(String),
    SetPreset {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    SetHighlightStyle(HighlightStyle),
    SetHighlightColor(HighlightColor),
    SetGranularity(HighlightGranularity),
    SwitchEngine {
        id: EngineId,
        reply: oneshot::Sender<bool>,
    },
    SetSleepTimer(Option<Duration>),
    Snapshot {
        reply: oneshot::Sender<NarrationSnapshot>,
    },
    SegmentWindow {
        radius: usize,
        reply: oneshot::Sender<SegmentWindow>,
    },
    Voices {
        reply: oneshot::Sender<Vec<VoiceInfo>>,
    },
    Shutdown,
}

/// Cloneable handle to a session running on a driver task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Move `session` onto a new task. Returns the handle and the task's
    /// join handle; the task ends on shutdown or when every handle is
    /// dropped, destroying the session.
    pub fn spawn(session: NarrationSession) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = session.shutdown_token();
        let task = tokio::spawn(run(session, rx, cancel.clone()));
        (Self { commands, cancel }, task)
    }

    pub async fn play(&self, start: Option<usize>) -> Result<bool, SessionClosed> {
        self.request(|reply| SessionCommand::Play {
            start,
            from_visible: false,
            reply,
        })
        .await
    }

    pub async fn play_from_visible(&self) -> Result<bool, SessionClosed> {
        self.request(|reply| SessionCommand::Play {
            start: None,
            from_visible: true,
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> Result<bool, SessionClosed> {
        self.request(|reply| SessionCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<bool, SessionClosed> {
        self.request(|reply| SessionCommand::Resume { reply }).await
    }

    pub async fn stop(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Stop).await
    }

    pub async fn step(&self, delta: i64) -> Result<bool, SessionClosed> {
        self.request(|reply| SessionCommand::Step { delta, reply })
            .await
    }

    pub async fn seek(&self, target: i64, autoplay: bool) -> Result<bool, SessionClosed> {
        self.request(|reply| SessionCommand::Seek {
            target,
            autoplay,
            reply,
        })
        .await
    }

    pub async fn jump(&self, delta_ms: i64) -> Result<bool, SessionClosed> {
        self.request(|reply| SessionCommand::Jump { delta_ms, reply })
            .await
    }

    pub async fn play_from_text(&self, needle: impl Into<String>) -> Result<bool, SessionClosed> {
        let needle = needle.into();
        self.request(|reply| SessionCommand::PlayFromText { needle, reply })
            .await
    }

    pub async fn set_rate(&self, rate: f32) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetRate(rate)).await
    }

    pub async fn set_pitch(&self, pitch: f32) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetPitch(pitch)).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetVolume(volume)).await
    }

    pub async fn set_voice(&self, voice_id: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetVoice(voice_id.into())).await
    }

    pub async fn set_preset(&self, name: impl Into<String>) -> Result<bool, SessionClosed> {
        let name = name.into();
        self.request(|reply| SessionCommand::SetPreset { name, reply })
            .await
    }

    pub async fn set_highlight_style(&self, style: HighlightStyle) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetHighlightStyle(style)).await
    }

    pub async fn set_highlight_color(&self, color: HighlightColor) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetHighlightColor(color)).await
    }

    pub async fn set_granularity(
        &self,
        granularity: HighlightGranularity,
    ) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetGranularity(granularity)).await
    }

    pub async fn switch_engine(&self, id: EngineId) -> Result<bool, SessionClosed> {
        self.request(|reply| SessionCommand::SwitchEngine { id, reply })
            .await
    }

    pub async fn set_sleep_timer(&self, after: Option<Duration>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetSleepTimer(after)).await
    }

    pub async fn snapshot(&self) -> Result<NarrationSnapshot, SessionClosed> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    pub async fn segment_window(&self, radius: usize) -> Result<SegmentWindow, SessionClosed> {
        self.request(|reply| SessionCommand::SegmentWindow { radius, reply })
            .await
    }

    pub async fn voices(&self) -> Result<Vec<VoiceInfo>, SessionClosed> {
        self.request(|reply| SessionCommand::Voices { reply }).await
    }

    /// Ask the task to destroy the session and exit.
    pub async fn shutdown(&self) {
        if self.commands.send(SessionCommand::Shutdown).await.is_err() {
            self.cancel.cancel();
        }
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.commands.send(command).await.map_err(|_| SessionClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionClosed> {
        let (reply, response) = oneshot::channel();
        self.send(make(reply)).await?;
        response.await.map_err(|_| SessionClosed)
    }
}

async fn run(
    mut session: NarrationSession,
    mut commands: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
) {
    let Some(mut signals) = session.take_signals() else {
        return;
    };
    let mut frames = interval(session.config().frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Narration driver started");

    loop {
        let deadline = session.next_deadline();
        tokio::select! {
            () = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(SessionCommand::Shutdown) | None => break,
                Some(command) => dispatch(&mut session, command).await,
            },
            Some(event) = signals.recv() => session.handle_event(event).await,
            _ = frames.tick() => {
                session.on_frame();
            }
            () = wait_until(deadline) => session.fire_due_timers(Instant::now()),
        }
    }

    session.restore_signals(signals);
    session.destroy();
    debug!("Narration driver stopped");
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn dispatch(session: &mut NarrationSession, command: SessionCommand) {
    // Replies fail only when the caller stopped waiting.
    match command {
        SessionCommand::Play {
            start,
            from_visible,
            reply,
        } => {
            let _ = reply.send(session.play(start, from_visible).await);
        }
        SessionCommand::Pause { reply } => {
            let _ = reply.send(session.pause());
        }
        SessionCommand::Resume { reply } => {
            let _ = reply.send(session.resume());
        }
        SessionCommand::Stop => session.stop(),
        SessionCommand::Step { delta, reply } => {
            let _ = reply.send(session.step_item(delta).await);
        }
        SessionCommand::Seek {
            target,
            autoplay,
            reply,
        } => {
            let _ = reply.send(session.seek(target, autoplay).await);
        }
        SessionCommand::Jump { delta_ms, reply } => {
            let _ = reply.send(session.jump_approx(delta_ms).await);
        }
        SessionCommand::PlayFromText { needle, reply } => {
            let _ = reply.send(session.play_from_text(&needle).await);
        }
        SessionCommand::SetRate(rate) => session.set_rate(rate),
        SessionCommand::SetPitch(pitch) => session.set_pitch(pitch),
        SessionCommand::SetVolume(volume) => session.set_volume(volume),
        SessionCommand::SetVoice(voice) => session.set_voice(&voice),
        SessionCommand::SetPreset { name, reply } => {
            let _ = reply.send(session.set_preset(&name));
        }
        SessionCommand::SetHighlightStyle(style) => session.set_highlight_style(style),
        SessionCommand::SetHighlightColor(color) => session.set_highlight_color(color),
        SessionCommand::SetGranularity(granularity) => {
            session.set_highlight_granularity(granularity);
        }
        SessionCommand::SwitchEngine { id, reply } => {
            let _ = reply.send(session.switch_engine(&id));
        }
        SessionCommand::SetSleepTimer(after) => session.set_sleep_timer(after),
        SessionCommand::Snapshot { reply } => {
            let _ = reply.send(session.snapshot());
        }
        SessionCommand::SegmentWindow { radius, reply } => {
            let _ = reply.send(session.segment_window(radius));
        }
        SessionCommand::Voices { reply } => {
            let _ = reply.send(session.voices());
        }
        SessionCommand::Shutdown => {}
    }
}
