//! Entry point for the rigwatch CLI. Resolves the backend, then runs one command.

mod cli;
mod report;

use std::io::{self, Write};
use std::process::{Child, Command as Process};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use futures::future::try_join_all;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, MessagesCommand, NotesCommand};
use rigwatch::profiles::{
    load_profiles, save_profiles, upsert_profile, ProfileRequest, ResolveProfile,
};
use rigwatch::{
    warnings, ApiClient, ApiError, DevicePeaks, DeviceView, Inbox, Monitor, Session, SessionStore,
    DEFAULT_API_URL,
};

const DEMO_PORT: u16 = 3231;
const DEMO_USER: &str = "demo";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Demo mode short-circuits profile handling: the backend is ours.
    let (api_url, demo_guard) = if cli.demo || cli.profile.as_deref() == Some("demo") {
        if cli.dry_run {
            println!("http://127.0.0.1:{DEMO_PORT}/api/");
            return Ok(());
        }
        let guard = spawn_demo_backend(DEMO_PORT)?;
        (format!("http://127.0.0.1:{DEMO_PORT}/api/"), Some(guard))
    } else {
        let Some(url) = resolve_api_url(&cli)? else {
            return Ok(());
        };
        if cli.dry_run {
            println!("{url}");
            return Ok(());
        }
        (url, None)
    };

    let api = ApiClient::new(&api_url).with_context(|| format!("invalid backend url {api_url}"))?;
    tracing::info!(backend = %api.base_url(), "using backend");

    let demo_session = if demo_guard.is_some() {
        Some(demo_login(&api).await?)
    } else {
        None
    };

    let result = run(cli.command, &api, demo_session).await;
    if let Err(e) = &result {
        if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_unauthorized) {
            let _ = SessionStore::clear();
            bail!("the backend rejected the session; log in again");
        }
    }
    result
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

async fn run(command: Command, api: &ApiClient, demo: Option<Session>) -> Result<()> {
    let session = || -> Result<Session> {
        if let Some(s) = &demo {
            return Ok(s.clone());
        }
        SessionStore::load_valid(Utc::now())
            .context("not logged in (or the session expired); run `rigwatch login <USER>`")
    };

    match command {
        Command::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_string("Password: ")?.trim_end().to_string(),
            };
            let session = api.login(&username, &password).await?;
            SessionStore::save(&session)?;
            match session.expires_at() {
                Some(at) => println!("Logged in as {username} until {at}"),
                None => println!("Logged in as {username}"),
            }
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_string("Password: ")?.trim_end().to_string(),
            };
            let msg = api.register(&username, &email, &password).await?;
            println!("{}", if msg.is_empty() { "Registered." } else { msg.as_str() });
        }
        Command::Logout => {
            SessionStore::clear()?;
            println!("Logged out.");
        }
        Command::Devices { limits } => {
            let thresholds = limits.thresholds()?;
            let devices = api.fetch_devices(&session()?).await?;
            let mut views: Vec<DeviceView> = devices
                .into_iter()
                .map(|snapshot| {
                    let peaks = DevicePeaks::from_samples([&snapshot]);
                    DeviceView {
                        warnings: warnings::compute(&peaks, &thresholds),
                        snapshot: snapshot.into(),
                        peaks: peaks.into(),
                        acknowledged: false,
                    }
                })
                .collect();
            views.sort_by_key(|v| std::cmp::Reverse(v.warnings.len()));
            println!("{}", report::table(&views));
        }
        Command::AddDevice { device_id } => {
            api.add_device(&session()?, &device_id).await?;
            println!("Added {}.", device_id.trim());
        }
        Command::DeleteDevice { device_id } => {
            api.delete_device(&session()?, &device_id).await?;
            let mut inbox = Inbox::with_seen(SessionStore::load_seen());
            inbox.forget(&device_id);
            SessionStore::save_seen(inbox.seen_counts())?;
            println!("Deleted {device_id}.");
        }
        Command::Watch { interval, limits } => {
            let monitor = Monitor::new(api.clone(), session()?, limits.thresholds()?);
            watch(&monitor, Duration::from_secs(interval)).await?;
        }
        Command::Messages(cmd) => messages(api, &session()?, cmd).await?,
        Command::Notes(NotesCommand::Show { device_id }) => {
            match api.note(&session()?, &device_id).await? {
                Some(note) if !note.is_empty() => println!("{note}"),
                _ => println!("(no note)"),
            }
        }
        Command::Notes(NotesCommand::Save { device_id, text }) => {
            api.save_note(&session()?, &device_id, &text).await?;
            println!("Note saved.");
        }
    }
    Ok(())
}

async fn watch(monitor: &Monitor<ApiClient>, period: Duration) -> Result<()> {
    let loaded = monitor.load().await?;
    tracing::info!(devices = loaded, "watching");
    println!("{}", report::table(&monitor.view().await));
    println!(
        "\npolling every {}s; peaks update every {} polls (Ctrl-C to stop)",
        period.as_secs(),
        rigwatch::CYCLE_TICKS
    );

    let run = monitor.run(period, |tick, views| {
        println!("\n{}", report::tick_line(tick, views));
        if matches!(tick.outcome, rigwatch::TickOutcome::CycleClosed { .. }) {
            println!("{}", report::table(views));
        }
    });
    tokio::select! {
        _ = run => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    Ok(())
}

async fn messages(api: &ApiClient, session: &Session, cmd: MessagesCommand) -> Result<()> {
    let mut inbox = Inbox::with_seen(SessionStore::load_seen());
    match cmd {
        MessagesCommand::List => {
            let devices = api.fetch_devices(session).await?;
            let threads =
                try_join_all(devices.iter().map(|d| api.messages(session, &d.device_id))).await?;
            for (d, thread) in devices.iter().zip(&threads) {
                inbox.observe(&d.device_id, thread);
            }
            let ids: Vec<&str> = devices.iter().map(|d| d.device_id.as_str()).collect();
            for id in inbox.sort_by_unread(&ids) {
                let name = devices
                    .iter()
                    .find(|d| d.device_id == id)
                    .map(|d| d.device_name.as_str())
                    .unwrap_or_default();
                match inbox.unread(id) {
                    0 => println!("{name} ({id})"),
                    n => println!("{name} ({id})  {n} unread"),
                }
            }
        }
        MessagesCommand::Read { device_id } => {
            let thread = api.messages(session, &device_id).await?;
            inbox.observe(&device_id, &thread);
            for m in &thread {
                let who = if m.is_message_it { "it" } else { "user" };
                let when = m
                    .message_date
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("[{when}] {who}: {}", m.content);
            }
            if thread.is_empty() {
                println!("(no messages)");
            }
            inbox.mark_seen(&device_id);
            SessionStore::save_seen(inbox.seen_counts())?;
        }
        MessagesCommand::Send { device_id, text } => {
            let name = api
                .fetch_devices(session)
                .await?
                .into_iter()
                .find(|d| d.device_id == device_id)
                .map(|d| d.device_name)
                .unwrap_or_default();
            api.send_message(session, &device_id, &name, &text).await?;
            println!("Sent.");
        }
        MessagesCommand::Clear { device_id } => {
            api.clear_messages(session, &device_id).await?;
            inbox.clear(&device_id);
            SessionStore::save_seen(inbox.seen_counts())?;
            println!("Messages deleted.");
        }
    }
    Ok(())
}

/// Backend URL from --api-url / --profile, saving new or changed profiles.
/// `None` means the user aborted a prompt.
fn resolve_api_url(cli: &Cli) -> Result<Option<String>> {
    let mut profiles = load_profiles();
    let req = ProfileRequest {
        profile_name: cli.profile.clone(),
        api_url: cli.api_url.clone(),
    };
    let url = match req.resolve(&profiles) {
        ResolveProfile::Direct(url) => {
            if let Some(name) = cli.profile.as_deref() {
                let overwrite = match profiles.profiles.get(name) {
                    Some(entry) if entry.api_url != url => {
                        cli.save
                            || prompt_yes_no(&format!(
                                "Overwrite existing profile '{name}'? [y/N]: "
                            ))
                    }
                    _ => false,
                };
                if upsert_profile(&mut profiles, name, &url, overwrite) {
                    save_profiles(&profiles)?;
                }
            }
            url
        }
        ResolveProfile::Loaded(url) => url,
        ResolveProfile::PromptSelect(mut names) => {
            names.push("demo".into());
            eprintln!("Select profile:");
            for (i, n) in names.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, n);
            }
            let line = prompt_string("Enter number (blank for the default backend): ")?;
            let line = line.trim();
            if line.is_empty() {
                return Ok(Some(DEFAULT_API_URL.to_string()));
            }
            let Some(name) = line
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| names.get(i))
            else {
                return Ok(None);
            };
            if name == "demo" {
                bail!("use --demo to run against the demo backend");
            }
            match profiles.profiles.get(name) {
                Some(entry) => entry.api_url.clone(),
                None => return Ok(None),
            }
        }
        ResolveProfile::PromptCreate(name) => {
            eprintln!("Profile '{name}' does not exist yet.");
            let url = prompt_string("Enter backend URL (https://HOST:PORT/api/): ")?;
            let url = url.trim();
            if url.is_empty() {
                return Ok(None);
            }
            upsert_profile(&mut profiles, &name, url, true);
            save_profiles(&profiles)?;
            url.to_string()
        }
        ResolveProfile::None => DEFAULT_API_URL.to_string(),
    };
    Ok(Some(url))
}

fn prompt_yes_no(prompt: &str) -> bool {
    match prompt_string(prompt) {
        Ok(line) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn prompt_string(prompt: &str) -> io::Result<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

// --- Demo Mode ---

async fn demo_login(api: &ApiClient) -> Result<Session> {
    // the backend needs a moment to bind
    let mut last = None;
    for _ in 0..20 {
        match api.login(DEMO_USER, DEMO_USER).await {
            Ok(session) => return Ok(session),
            Err(e) => last = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    match last {
        Some(e) => Err(e).context("demo backend did not come up"),
        None => bail!("demo backend did not come up"),
    }
}

/// Kills the demo backend when dropped.
struct DemoGuard(Child);

impl Drop for DemoGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_demo_backend(port: u16) -> Result<DemoGuard> {
    let exe = find_demo_executable();
    let child = Process::new(&exe)
        .arg("--port")
        .arg(port.to_string())
        .spawn()
        .with_context(|| format!("cannot start demo backend {}", exe.display()))?;
    Ok(DemoGuard(child))
}

fn find_demo_executable() -> std::path::PathBuf {
    #[cfg(windows)]
    let name = "rigwatch_demo.exe";
    #[cfg(not(windows))]
    let name = "rigwatch_demo";
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(name);
            if candidate.exists() {
                return candidate;
            }
        }
    }
    // Fallback to relying on PATH
    std::path::PathBuf::from(name)
}
