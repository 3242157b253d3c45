use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Playback collaborator for dispatched cues.
///
/// The session core knows nothing about audio; the shell hands each
/// `CuePlay` event to one of these. Playback is fire-and-forget: a
/// player that cannot play must not block or fail the session, so the
/// trait has no error channel.
pub trait CuePlayer {
    fn play(&self, audio_path: &Path);
}

/// Plays audio files through the platform's command-line player,
/// detached. Spawn failures are swallowed; the worst outcome is a
/// silent cue.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPlayer;

impl SystemPlayer {
    fn command_for(path: &Path) -> Command {
        #[cfg(target_os = "macos")]
        {
            let mut cmd = Command::new("afplay");
            cmd.arg(path);
            cmd
        }
        #[cfg(target_os = "windows")]
        {
            let mut cmd = Command::new("powershell");
            cmd.arg("-c").arg(format!(
                "(New-Object Media.SoundPlayer '{}').PlaySync()",
                path.display()
            ));
            cmd
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            // paplay covers most desktop Linux setups; aplay is the
            // ALSA fallback wired up in play()
            let mut cmd = Command::new("paplay");
            cmd.arg(path);
            cmd
        }
    }
}

impl CuePlayer for SystemPlayer {
    fn play(&self, audio_path: &Path) {
        let spawned = Self::command_for(audio_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        if spawned.is_err() {
            let _ = Command::new("aplay")
                .arg(audio_path)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();
            return;
        }

        let _ = spawned;
    }
}

/// Discards every cue. Used for `--mute` and headless tests.
#[derive(Debug, Clone, Default)]
pub struct NullPlayer {
    played: std::cell::RefCell<Vec<PathBuf>>,
}

impl NullPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths handed to the player so far, in order.
    pub fn played(&self) -> Vec<PathBuf> {
        self.played.borrow().clone()
    }
}

impl CuePlayer for NullPlayer {
    fn play(&self, audio_path: &Path) {
        self.played.borrow_mut().push(audio_path.to_path_buf());
    }
}
