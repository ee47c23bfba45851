//! Interactive REPL implementation.

use std::sync::Arc;

use anyhow::Context;
use dialoguer::{theme::ColorfulTheme, Confirm};
use reedline::Signal;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::commands::{advice_prompt, clear_confirmation, format_history, help_text, ReplCommand};
use super::completion::{create_reedline, try_complete_input, MchatPrompt};
use crate::chat::{ChatHandle, ChatOrchestrator, SessionReport};
use crate::client::HttpBackend;
use crate::config::{ChatConfig, ConfigOverrides, Settings, XdgDirs, KNOWN_KEYS};
use crate::db::Database;
use crate::messaging::{ChatEvent, EventBus, Spinner, TerminalRenderer};
use crate::session::ConversationStore;

/// REPL state.
pub struct Repl<'a> {
    db: &'a Database,
    overrides: ConfigOverrides,
    config: ChatConfig,
    bus: EventBus,
    handle: ChatHandle,
    task: JoinHandle<()>,
    renderer: TerminalRenderer,
}

impl<'a> Repl<'a> {
    /// Resolve configuration, restore the conversation and start the chat task.
    pub fn new(db: &'a Database, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let config = ChatConfig::resolve(&Settings::new(db), &overrides);
        let backend = HttpBackend::from_config(&config).context("Failed to build HTTP client")?;

        // The chat task gets its own connection for the history store
        let store_db = db.reopen().context("Failed to open history store")?;
        let store = ConversationStore::restore(Box::new(store_db));
        debug!(messages = store.len(), endpoint = %config.endpoint, "Conversation restored");

        let bus = EventBus::new();
        let orchestrator = ChatOrchestrator::new(Arc::new(backend), store, config.clone())
            .with_bus(bus.sender());
        let (handle, task) = ChatHandle::spawn(orchestrator);

        Ok(Self {
            db,
            overrides,
            config,
            bus,
            handle,
            task,
            renderer: TerminalRenderer::new(),
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Run the REPL loop.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let xdg = XdgDirs::new();
        let history_path = match xdg.ensure_dirs() {
            Ok(()) => Some(xdg.repl_history_path()),
            Err(e) => {
                warn!(error = %e, "Could not create state directory");
                None
            }
        };
        let mut line_editor = create_reedline(history_path);

        loop {
            let message_count = self.handle.history(None).await?.len();
            let prompt = MchatPrompt::new(&self.config.language, message_count);

            match line_editor.read_line(&prompt) {
                Ok(Signal::Success(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let line = match try_complete_input(line) {
                        Some(l) => l,
                        None => continue,
                    };

                    match self.handle_input(&line).await {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => self.notice(ChatEvent::error(format!("Error: {}", e))),
                    }
                }
                Ok(Signal::CtrlC) => {
                    println!("^C");
                    continue;
                }
                Ok(Signal::CtrlD) => break,
                Err(err) => {
                    self.notice(ChatEvent::error(format!("Readline error: {}", err)));
                    break;
                }
            }
        }

        println!("👋 Bye!");
        self.shutdown().await
    }

    /// Stop the chat task and wait for it to finish.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        // The task may already be gone; that is fine
        let _ = self.handle.shutdown().await;
        self.task.await.context("Chat task panicked")?;
        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> anyhow::Result<bool> {
        match ReplCommand::parse(input) {
            Some(command) => self.handle_command(command).await,
            None => {
                self.handle_prompt(input).await?;
                Ok(false)
            }
        }
    }

    async fn handle_command(&mut self, command: ReplCommand) -> anyhow::Result<bool> {
        match command {
            ReplCommand::Help => print!("{}", help_text()),
            ReplCommand::Quit => return Ok(true),
            ReplCommand::Clear => self.cmd_clear().await?,
            ReplCommand::History(limit) => {
                let messages = self.handle.history(limit).await?;
                println!();
                print!("{}", format_history(&messages));
                println!();
            }
            ReplCommand::Advice => {
                let prompt = advice_prompt(&self.config.language);
                println!("\x1b[2m{}\x1b[0m", prompt);
                self.handle_prompt(prompt).await?;
            }
            ReplCommand::Status => self.cmd_status().await?,
            ReplCommand::Set { key, value } => self.cmd_set(&key, &value).await?,
            ReplCommand::Settings => self.cmd_settings()?,
            ReplCommand::Usage(usage) => {
                self.notice(ChatEvent::warning(format!("Usage: {}", usage)));
            }
            ReplCommand::Unknown(cmd) => {
                println!("❓ Unknown command: /{}", cmd);
                println!("   Type /help for available commands");
            }
        }
        Ok(false)
    }

    /// Send a message and render the answer as it streams in.
    ///
    /// Ctrl-C cancels the running answer.
    pub async fn handle_prompt(&mut self, prompt: &str) -> anyhow::Result<Option<SessionReport>> {
        debug!(prompt_len = prompt.len(), "handle_prompt started");

        // Subscribe before submitting so no event is missed
        let receiver = self.bus.subscribe();
        println!();
        let spinner = Spinner::new().start("Thinking...");
        let render = tokio::spawn(async move {
            TerminalRenderer::new()
                .run_session(receiver, Some(spinner))
                .await;
        });

        let pending = self.handle.submit(prompt).await?;
        tokio::pin!(pending);

        let report = loop {
            tokio::select! {
                report = &mut pending => break report.context("Chat task stopped")?,
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!(error = %e, "Could not listen for Ctrl-C");
                        break (&mut pending).await.context("Chat task stopped")?;
                    }
                    debug!("Ctrl-C received, cancelling response");
                    self.handle.cancel().await?;
                }
            }
        };

        match &report {
            Some(_) => {
                if let Err(e) = render.await {
                    debug!(error = %e, "Render task ended abnormally");
                }
                println!();
            }
            // Blank input: no session, so the renderer never sees an end event
            None => render.abort(),
        }

        Ok(report)
    }

    async fn cmd_clear(&mut self) -> anyhow::Result<()> {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(clear_confirmation(&self.config.language))
            .default(false)
            .interact()
            .unwrap_or(false);

        if confirmed {
            self.handle.clear().await?;
            self.notice(ChatEvent::success("Conversation history cleared"));
        }
        Ok(())
    }

    async fn cmd_status(&mut self) -> anyhow::Result<()> {
        let messages = self.handle.history(None).await?.len();
        let tool = self.handle.status().borrow().tool_name().map(str::to_string);

        println!("\n\x1b[1m📊 Status\x1b[0m\n");
        println!("  Endpoint:    \x1b[36m{}\x1b[0m", self.config.endpoint);
        println!("  Language:    {}", self.config.language);
        println!(
            "  Context:     last {} messages per request",
            self.config.history_window
        );
        println!("  Messages:    {}", messages);
        println!("  Tool:        {}", tool.as_deref().unwrap_or("idle"));
        println!("  Database:    \x1b[2m{}\x1b[0m", self.db.path().display());
        println!();
        Ok(())
    }

    async fn cmd_set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let settings = Settings::new(self.db);
        if let Err(e) = settings.set_checked(key, value) {
            self.notice(ChatEvent::error(e.to_string()));
            return Ok(());
        }

        let config = ChatConfig::resolve(&settings, &self.overrides);
        let backend = HttpBackend::from_config(&config).context("Failed to build HTTP client")?;
        self.handle
            .reconfigure(config.clone(), Some(Arc::new(backend)))
            .await?;
        self.config = config;

        self.notice(ChatEvent::success(format!("Set {} = {}", key, value.trim())));
        if self.overrides.endpoint.is_some() || self.overrides.language.is_some() {
            self.notice(ChatEvent::info(
                "Command-line or environment overrides still take precedence",
            ));
        }
        Ok(())
    }

    fn cmd_settings(&mut self) -> anyhow::Result<()> {
        let settings = Settings::new(self.db);
        let stored = settings.list()?;

        println!("\n⚙️  \x1b[1mSettings:\x1b[0m\n");
        for (key, desc) in KNOWN_KEYS {
            match stored.iter().find(|(k, _)| k == key) {
                Some((_, value)) => println!("  {:<30} = {}", key, value),
                None => println!("  {:<30}   \x1b[2m(default) {}\x1b[0m", key, desc),
            }
        }
        println!();
        Ok(())
    }

    fn notice(&mut self, event: ChatEvent) {
        let _ = self.renderer.render(&event);
    }
}
