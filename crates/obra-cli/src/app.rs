//! Command implementations for the `obra` binary.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use obra_core::api::{ApiClient, ApiError};
use obra_core::auth::{ChannelListener, GateDecision, SessionEvent, SessionGate, SessionManager, SystemClock};
use obra_core::storage::{FileStorage, MemoryStorage, Storage};
use obra_core::utils::{format_remaining, mask_token};
use obra_core::{Clock, Config, Route};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffer size for the session event channel.
/// Covers a full 60 second countdown plus the surrounding lifecycle events.
const EVENT_BUFFER_SIZE: usize = 128;

enum WatchInput {
    Timers,
    Line(Option<String>),
    Interrupt,
}

pub struct App {
    config: Config,
    api: ApiClient,
    session: SessionManager<Box<dyn Storage>, SystemClock>,
    events: mpsc::Receiver<SessionEvent>,
}

impl App {
    pub fn new(api_url: Option<String>) -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let api_url = api_url.unwrap_or_else(|| config.resolved_api_url());
        let api = ApiClient::new(api_url)?;

        let storage: Box<dyn Storage> = match config.data_dir().and_then(|dir| FileStorage::open(dir).map_err(Into::into)) {
            Ok(storage) => {
                debug!(path = %storage.path().display(), "Using file storage");
                Box::new(storage)
            }
            Err(e) => {
                warn!(error = %e, "Storage unavailable, session will not survive this run");
                Box::new(MemoryStorage::new())
            }
        };

        let mut session = SessionManager::new(storage, SystemClock);
        let (listener, events) = ChannelListener::channel(EVENT_BUFFER_SIZE);
        session.subscribe(Arc::new(listener));

        Ok(Self {
            config,
            api,
            session,
            events,
        })
    }

    pub fn restore(&mut self) {
        self.session.restore();
        self.drain_events();
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub async fn login(&mut self, email: Option<String>) -> Result<()> {
        let email = match email.or_else(|| self.config.last_email.clone()) {
            Some(email) => email,
            None => prompt_line("Email: ")?,
        };
        let password = rpassword::prompt_password("Password: ")?;
        if email.is_empty() || password.is_empty() {
            anyhow::bail!("Email and password required");
        }

        let authenticated = match self.api.authenticate(&email, &password).await {
            Ok(a) => a,
            Err(e) => {
                let message = e
                    .downcast_ref::<ApiError>()
                    .map(ApiError::user_message)
                    .unwrap_or_else(|| format!("Login failed: {}", e));
                anyhow::bail!(message);
            }
        };

        let role = authenticated.user.role;
        if !self
            .session
            .login(authenticated.token, authenticated.user, authenticated.expires_in)
        {
            anyhow::bail!("The server returned an unusable session");
        }
        self.drain_events();

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Login successful. Home view: {}", Route::home_for(role));
        Ok(())
    }

    pub fn whoami(&self) -> Result<()> {
        let Some(session) = self.session.session() else {
            println!("Not logged in.");
            return Ok(());
        };
        let now = self.session.clock().now();
        let user = &session.user;
        println!("{} <{}>", user.full_name, user.email);
        println!("  id:        {} (document {})", user.id, user.number_id);
        println!("  role:      {} ({})", user.role.display_name(), user.role);
        println!("  token:     {}", mask_token(&session.token));
        println!("  expires:   in {}", format_remaining(session.time_until_expiry(now)));
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        let was_logged_in = self.session.is_authenticated();
        self.session.logout();
        self.drain_events();
        if was_logged_in {
            println!("Logged out.");
        } else {
            println!("No active session.");
        }
        Ok(())
    }

    pub async fn watch(&mut self) -> Result<()> {
        if !self.session.is_authenticated() {
            println!("Not logged in.");
            return Ok(());
        }
        println!("Watching session. Type 'd' + Enter to dismiss the warning, Ctrl+C to stop.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let input = tokio::select! {
                _ = self.session.wait_for_timers() => WatchInput::Timers,
                line = lines.next_line() => WatchInput::Line(line.context("Failed to read stdin")?),
                _ = tokio::signal::ctrl_c() => WatchInput::Interrupt,
            };

            match input {
                WatchInput::Timers => {}
                WatchInput::Line(Some(line)) if line.trim() == "d" => {
                    self.session.dismiss_warning();
                }
                WatchInput::Line(Some(_)) => {}
                WatchInput::Line(None) | WatchInput::Interrupt => return Ok(()),
            }

            if self.drain_events() {
                println!("Session expired. Log in again with `obra login`.");
                return Ok(());
            }
        }
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        self.api
            .send_reset_code(email)
            .await
            .map_err(|e| {
                if matches!(e.downcast_ref::<ApiError>(), Some(ApiError::NotFound(_))) {
                    anyhow::anyhow!("Email {} not found", email)
                } else {
                    e
                }
            })?;
        println!("A verification code was sent to {}.", email);

        let code = prompt_line("Verification code: ")?;
        let new_password = rpassword::prompt_password("New password: ")?;
        self.api.reset_password(email, &code, &new_password).await?;
        println!("Password reset. You can log in now.");
        Ok(())
    }

    pub fn can_open(&self, route: &str) -> Result<()> {
        let route: Route = route.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        match SessionGate::guard_route(route, &self.session.state()) {
            GateDecision::Render => println!("{}: allowed", route),
            GateDecision::Redirect(to) => println!("{}: redirected to {}", route, to),
            GateDecision::Loading => println!("{}: session still loading", route),
        }
        Ok(())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Print pending session events. Returns true once the session has ended.
    fn drain_events(&mut self) -> bool {
        let mut ended = false;
        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::WarningShown { .. } | SessionEvent::CountdownTick { .. } => {
                    if let Some(warning) = self.session.warning() {
                        print!("\r{}", warning.message());
                        let _ = io::stdout().flush();
                    }
                }
                SessionEvent::WarningDismissed => println!("\nWarning dismissed."),
                SessionEvent::Ended { reason } => {
                    debug!(?reason, "Session ended");
                    ended = true;
                }
                SessionEvent::Started { .. }
                | SessionEvent::Restored { .. }
                | SessionEvent::UserUpdated { .. } => {}
            }
        }
        ended
    }
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
