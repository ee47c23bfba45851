//! Animated spinner shown while waiting on the advisor.
//!
//! The label can change while spinning, so the same spinner covers
//! "waiting for the first byte" and "tool running".

use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
    ExecutableCommand,
};
use std::io::{stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Spinner animation frames.
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Alternative spinner styles.
pub const DOTS: &[&str] = SPINNER_FRAMES;
pub const LINE: &[&str] = &["-", "\\", "|", "/"];

/// Spinner configuration.
#[derive(Clone)]
pub struct SpinnerConfig {
    /// Animation frames.
    pub frames: Vec<&'static str>,
    /// Frame duration in milliseconds.
    pub interval_ms: u64,
    /// Spinner color.
    pub color: Color,
    /// Show seconds elapsed after the label.
    pub show_elapsed: bool,
}

impl Default for SpinnerConfig {
    fn default() -> Self {
        Self {
            frames: SPINNER_FRAMES.to_vec(),
            interval_ms: 80,
            color: Color::Cyan,
            show_elapsed: true,
        }
    }
}

/// A spinner handle for controlling the animation.
pub struct SpinnerHandle {
    stop_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
    message: Arc<Mutex<String>>,
    is_paused: Arc<AtomicBool>,
}

impl SpinnerHandle {
    /// Replace the label shown next to the animation.
    pub fn set_message(&self, message: impl Into<String>) {
        let mut label = self.message.lock().unwrap_or_else(|e| e.into_inner());
        *label = message.into();
    }

    /// Current label.
    pub fn message(&self) -> String {
        self.message
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Pause the spinner (e.g. while text is streaming).
    pub fn pause(&self) {
        if !self.is_paused.swap(true, Ordering::Relaxed) {
            clear_line();
        }
    }

    /// Resume the spinner.
    pub fn resume(&self) {
        self.is_paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::Relaxed)
    }

    /// Stop the spinner.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        if !self.is_paused() {
            clear_line();
        }
        let _ = stdout().execute(Show);
    }
}

impl Drop for SpinnerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
        // Ensure cursor is shown
        let _ = stdout().execute(Show);
    }
}

fn clear_line() {
    let mut stdout = stdout();
    let _ = stdout.execute(MoveToColumn(0));
    let _ = stdout.execute(Clear(ClearType::CurrentLine));
    let _ = stdout.flush();
}

/// Spinner for showing activity.
pub struct Spinner {
    config: SpinnerConfig,
}

impl Spinner {
    /// Create a new spinner with default config.
    pub fn new() -> Self {
        Self {
            config: SpinnerConfig::default(),
        }
    }

    /// Create with custom config.
    pub fn with_config(config: SpinnerConfig) -> Self {
        Self { config }
    }

    /// Start the spinner with a message.
    pub fn start(&self, message: impl Into<String>) -> SpinnerHandle {
        let config = self.config.clone();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let message = Arc::new(Mutex::new(message.into()));
        let is_paused = Arc::new(AtomicBool::new(false));

        let message_clone = message.clone();
        let is_paused_clone = is_paused.clone();

        let task = tokio::spawn(async move {
            let started = std::time::Instant::now();
            let mut frame_idx = 0;
            let mut stdout = stdout();

            let _ = stdout.execute(Hide);

            loop {
                if *stop_rx.borrow() {
                    break;
                }

                if is_paused_clone.load(Ordering::Relaxed) {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                        _ = stop_rx.changed() => { break; }
                    }
                    continue;
                }

                let label = message_clone
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                let frame = config.frames[frame_idx % config.frames.len()];
                let elapsed = if config.show_elapsed {
                    format_elapsed(started.elapsed())
                } else {
                    String::new()
                };

                let _ = stdout.execute(MoveToColumn(0));
                let _ = stdout.execute(Clear(ClearType::CurrentLine));
                let _ = stdout.execute(SetForegroundColor(config.color));
                let _ = stdout.execute(Print(format!("{} {}{}", frame, label, elapsed)));
                let _ = stdout.execute(ResetColor);
                let _ = stdout.flush();

                frame_idx += 1;

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(config.interval_ms)) => {}
                    _ = stop_rx.changed() => { break; }
                }
            }

            let _ = stdout.execute(Show);
        });

        SpinnerHandle {
            stop_tx,
            task: Some(task),
            message,
            is_paused,
        }
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

/// Elapsed suffix, hidden for the first second.
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs == 0 {
        String::new()
    } else {
        format!(" ({}s)", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(300)), "");
        assert_eq!(format_elapsed(Duration::from_secs(1)), " (1s)");
        assert_eq!(format_elapsed(Duration::from_millis(12_900)), " (12s)");
    }

    #[test]
    fn test_spinner_config_default() {
        let config = SpinnerConfig::default();
        assert_eq!(config.interval_ms, 80);
        assert!(config.show_elapsed);
        assert_eq!(config.color, Color::Cyan);
        assert_eq!(config.frames, SPINNER_FRAMES.to_vec());
    }

    #[test]
    fn test_spinner_with_config() {
        let config = SpinnerConfig {
            frames: LINE.to_vec(),
            interval_ms: 50,
            color: Color::Red,
            show_elapsed: false,
        };
        let spinner = Spinner::with_config(config);
        assert_eq!(spinner.config.frames.len(), 4);
        assert_eq!(spinner.config.interval_ms, 50);
        assert!(!spinner.config.show_elapsed);
    }

    #[tokio::test]
    async fn test_spinner_lifecycle() {
        let spinner = Spinner::new();
        let handle = spinner.start("Thinking...");

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.set_message("🔧 search");
        assert_eq!(handle.message(), "🔧 search");

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_spinner_handle_pause_resume() {
        let spinner = Spinner::new();
        let handle = spinner.start("Pause test");

        assert!(!handle.is_paused());

        handle.pause();
        handle.pause();
        assert!(handle.is_paused());

        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.resume();
        assert!(!handle.is_paused());

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_spinner_stop_while_paused() {
        let spinner = Spinner::new();
        let handle = spinner.start("Paused stop");
        handle.pause();
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_spinner_handle_drop() {
        let spinner = Spinner::new();
        {
            let handle = spinner.start("Drop test");
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(handle);
        }
    }
}
