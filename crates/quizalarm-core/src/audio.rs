//! Alarm sound playback.
//!
//! Playback is fire-and-forget: `play` returns as soon as the request is
//! issued and every failure is reported as an [`AudioError`] for the caller
//! to log. Nothing in the dismissal gate waits on audio.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alarm::SoundConfig;
use crate::error::AudioError;

/// Sound output used by the dismissal gate.
pub trait AudioGateway: Send + Sync {
    fn play(&self, sound: &SoundConfig) -> Result<(), AudioError>;
    fn stop(&self) -> Result<(), AudioError>;
}

/// Which gateway the application should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    #[default]
    System,
    Silent,
}

/// Logs requests and plays nothing.
#[derive(Debug, Default)]
pub struct SilentAudio;

impl AudioGateway for SilentAudio {
    fn play(&self, sound: &SoundConfig) -> Result<(), AudioError> {
        info!(file = %sound.file, volume = sound.volume, looping = sound.looping, "silent audio: play");
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        info!("silent audio: stop");
        Ok(())
    }
}

/// Plays through the platform's command-line player.
///
/// Each `play` starts a background thread that spawns the player and, while
/// looping, re-spawns it when it exits. A generation counter lets `stop` (or
/// a newer `play`) retire older loops without waiting for them.
pub struct SystemAudio {
    fallback: PathBuf,
    generation: Arc<AtomicU64>,
    child: Arc<Mutex<Option<Child>>>,
    playing: Arc<AtomicBool>,
}

impl SystemAudio {
    pub fn new(fallback: impl Into<PathBuf>) -> Self {
        Self {
            fallback: fallback.into(),
            generation: Arc::new(AtomicU64::new(0)),
            child: Arc::new(Mutex::new(None)),
            playing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn resolve(&self, file: &str) -> Result<PathBuf, AudioError> {
        let requested = PathBuf::from(file);
        if requested.exists() {
            return Ok(requested);
        }
        warn!(file = %requested.display(), fallback = %self.fallback.display(), "sound file missing, using fallback");
        if self.fallback.exists() {
            Ok(self.fallback.clone())
        } else {
            Err(AudioError::SoundMissing(requested))
        }
    }

    fn kill_child(child: &Mutex<Option<Child>>) {
        let mut guard = child.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(mut running) = guard.take() {
            let _ = running.kill();
            let _ = running.wait();
        }
    }
}

/// Park `process` as the running player if `generation` is still current.
/// A retired loop kills its own process instead, leaving the slot alone.
fn adopt_child(
    slot: &Mutex<Option<Child>>,
    current: &AtomicU64,
    generation: u64,
    mut process: Child,
) -> bool {
    let mut guard = slot.lock().unwrap_or_else(|p| p.into_inner());
    if current.load(Ordering::SeqCst) != generation {
        drop(guard);
        let _ = process.kill();
        let _ = process.wait();
        return false;
    }
    if let Some(mut previous) = guard.replace(process) {
        let _ = previous.kill();
        let _ = previous.wait();
    }
    true
}

fn player_command(path: &Path, volume: f64) -> Result<Command, AudioError> {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("afplay");
        cmd.arg("-v").arg(format!("{volume:.2}")).arg(path);
        Ok(cmd)
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("powershell");
        cmd.arg("-NoProfile").arg("-Command").arg(format!(
            "(New-Object Media.SoundPlayer '{}').PlaySync()",
            path.display()
        ));
        Ok(cmd)
    } else if cfg!(unix) {
        let player = ["aplay", "paplay"]
            .into_iter()
            .find(|p| which(p))
            .ok_or(AudioError::NoPlayer)?;
        let mut cmd = Command::new(player);
        if player == "paplay" {
            // paplay volume is linear in 0..=65536.
            cmd.arg(format!("--volume={}", (volume * 65536.0) as u32));
        } else {
            cmd.arg("-q");
        }
        cmd.arg(path);
        Ok(cmd)
    } else {
        Err(AudioError::NoPlayer)
    }
}

fn which(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

impl AudioGateway for SystemAudio {
    fn play(&self, sound: &SoundConfig) -> Result<(), AudioError> {
        let path = self.resolve(&sound.file)?;
        // Validate the player up front so the caller hears about it.
        player_command(&path, sound.volume)?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Self::kill_child(&self.child);
        self.playing.store(true, Ordering::SeqCst);

        let current = Arc::clone(&self.generation);
        let child = Arc::clone(&self.child);
        let playing = Arc::clone(&self.playing);
        let volume = sound.volume;
        let looping = sound.looping;

        thread::Builder::new()
            .name("quizalarm-audio".into())
            .spawn(move || {
                loop {
                    if current.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    let spawned = player_command(&path, volume).and_then(|mut cmd| {
                        cmd.stdout(Stdio::null())
                            .stderr(Stdio::null())
                            .spawn()
                            .map_err(AudioError::Spawn)
                    });
                    match spawned {
                        Ok(process) => {
                            // A stop or a newer play may have raced the spawn.
                            if !adopt_child(&child, &current, generation, process) {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "audio player failed to start");
                            break;
                        }
                    }
                    // Poll so `stop` can take the child out from under us.
                    loop {
                        let mut guard = child.lock().unwrap_or_else(|p| p.into_inner());
                        // The slot belongs to a newer loop now.
                        if current.load(Ordering::SeqCst) != generation {
                            return;
                        }
                        match guard.as_mut().map(|c| c.try_wait()) {
                            Some(Ok(None)) => {
                                drop(guard);
                                thread::sleep(std::time::Duration::from_millis(100));
                            }
                            _ => {
                                guard.take();
                                break;
                            }
                        }
                    }
                    if !looping {
                        break;
                    }
                }
                if current.load(Ordering::SeqCst) == generation {
                    playing.store(false, Ordering::SeqCst);
                }
            })
            .map_err(AudioError::Spawn)?;

        debug!(file = %sound.file, looping, "audio playback requested");
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        Self::kill_child(&self.child);
        debug!("audio playback stopped");
        Ok(())
    }
}

impl Drop for SystemAudio {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Build the gateway selected in configuration.
pub fn gateway_for(backend: AudioBackend, fallback: impl Into<PathBuf>) -> Arc<dyn AudioGateway> {
    match backend {
        AudioBackend::System => Arc::new(SystemAudio::new(fallback)),
        AudioBackend::Silent => Arc::new(SilentAudio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sound_without_fallback_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let audio = SystemAudio::new(dir.path().join("nope.wav"));
        let sound = SoundConfig {
            file: dir.path().join("also-missing.wav").display().to_string(),
            ..SoundConfig::default()
        };
        assert!(matches!(audio.play(&sound), Err(AudioError::SoundMissing(_))));
        assert!(!audio.is_playing());
        assert!(audio.stop().is_ok());
    }

    #[test]
    fn silent_backend_always_succeeds() {
        let audio = gateway_for(AudioBackend::Silent, "unused.wav");
        assert!(audio.play(&SoundConfig::default()).is_ok());
        assert!(audio.stop().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn retired_loop_does_not_replace_newer_player() {
        let sleeper = || Command::new("sleep").arg("5").spawn().unwrap();
        let slot = Mutex::new(None);
        let current = AtomicU64::new(2);

        let newer = sleeper();
        let newer_id = newer.id();
        assert!(adopt_child(&slot, &current, 2, newer));
        assert!(!adopt_child(&slot, &current, 1, sleeper()));

        let parked = slot.lock().unwrap().as_ref().map(Child::id);
        assert_eq!(parked, Some(newer_id));
        SystemAudio::kill_child(&slot);
        assert!(slot.lock().unwrap().is_none());
    }

    #[test]
    fn backend_names_round_trip() {
        let backend: AudioBackend = serde_json::from_str("\"silent\"").unwrap();
        assert_eq!(backend, AudioBackend::Silent);
    }
}
