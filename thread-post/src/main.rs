//! thread-post - Post a thread to Bluesky

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use libthreadpost::error::ValidationError;
use libthreadpost::logging::{LogFormat, LoggingConfig};
use libthreadpost::service::composer::ThreadComposer;
use libthreadpost::service::publisher::ThreadOutcome;
use libthreadpost::service::events::{Event, EventReceiver};
use libthreadpost::service::progress::{format_time, percent, preview};
use libthreadpost::service::status::StatusMessage;
use libthreadpost::service::validation::CounterLevel;
use libthreadpost::service::ThreadpostService;
use libthreadpost::{FormatStyle, ThreadpostError};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

/// Environment variable holding the app password for non-interactive use
const APP_PASSWORD_ENV: &str = "THREADPOST_APP_PASSWORD";

/// Line that separates posts in plain-text input
const SEPARATOR: &str = "---";

#[derive(Parser, Debug)]
#[command(name = "thread-post")]
#[command(version)]
#[command(about = "Post threads to Bluesky")]
#[command(long_about = "\
thread-post - Post threads to Bluesky

DESCRIPTION:
    thread-post publishes a list of posts as one Bluesky thread: the first
    post is the root and every following post replies to the one before it.
    Posts are sent one at a time with a pause between them. If a post fails,
    the thread stops and your drafts are kept so you can retry.

USAGE:
    # Sign in once with an app password (Settings > App Passwords)
    thread-post login --handle alice.bsky.social

    # Post a thread from a text file, posts separated by lines of ---
    thread-post post thread.txt

    # Post from stdin in bold
    printf 'First\\n---\\nSecond' | thread-post post --style bold

    # Post the saved drafts
    thread-post post

INPUT:
    Text with posts separated by '---' lines, or a JSON array of strings or
    {\"index\", \"content\", \"formatStyle\"} objects.

SIGNALS:
    SIGTERM, SIGINT - Stop after the current post (drafts are kept)

CONFIGURATION:
    Configuration file: ~/.config/threadpost/config.toml
    (override with THREADPOST_CONFIG)
    State file: ~/.local/share/threadpost/state.json

EXIT CODES:
    0 - Success
    1 - Posting or runtime error
    2 - Authentication failed or not signed in
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format (text, json, pretty)
    #[arg(long, global = true, value_name = "FORMAT", env = "THREADPOST_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the credentials
    Login {
        /// Bluesky handle, e.g. alice.bsky.social (prompted if omitted)
        #[arg(long, env = "THREADPOST_HANDLE")]
        handle: Option<String>,

        /// Read the app password from stdin
        #[arg(long)]
        password_stdin: bool,
    },

    /// Publish a thread
    Post {
        /// Thread file ('-' for stdin); defaults to stdin when piped, else the saved drafts
        file: Option<PathBuf>,

        /// Apply a text style to every post
        #[arg(short, long, value_name = "STYLE")]
        style: Option<FormatStyle>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Keep the saved drafts after posting them successfully
        #[arg(long)]
        keep_drafts: bool,

        /// Sign in as this handle instead of using saved credentials
        #[arg(long, env = "THREADPOST_HANDLE")]
        handle: Option<String>,
    },

    /// Manage saved drafts
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },

    /// Forget saved credentials
    Logout,
}

#[derive(Subcommand, Debug)]
enum DraftsAction {
    /// List saved drafts
    Show {
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Delete saved drafts
    Clear,
    /// Replace saved drafts with the contents of a file
    Import { file: PathBuf },
    /// Print saved drafts as JSON
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig {
        format: cli.log_format,
        verbose: cli.verbose,
        ..LoggingConfig::from_env()
    }
    .init();

    if let Err(e) = run(cli).await {
        report(&StatusMessage::error(format!("{:#}", e)));
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<ThreadpostError>()
        .map_or(1, ThreadpostError::exit_code)
}

fn report(message: &StatusMessage) {
    eprintln!("{}", message);
}

fn invalid_input(error: ValidationError, hint: &str) -> anyhow::Error {
    anyhow::Error::new(ThreadpostError::from(error)).context(hint.to_string())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let service = ThreadpostService::new()?;

    match cli.command {
        Command::Login {
            handle,
            password_stdin,
        } => login(&service, handle, password_stdin).await,
        Command::Post {
            file,
            style,
            format,
            keep_drafts,
            handle,
        } => {
            post(
                &service,
                file.as_deref(),
                style,
                format,
                keep_drafts,
                handle.as_deref(),
            )
            .await
        }
        Command::Drafts { action } => drafts(&service, action),
        Command::Logout => {
            service.session().end_session();
            service.session().forget_credentials();
            report(&StatusMessage::success("Saved credentials removed"));
            Ok(())
        }
    }
}

async fn login(
    service: &ThreadpostService,
    handle: Option<String>,
    password_stdin: bool,
) -> anyhow::Result<()> {
    let handle = match handle {
        Some(handle) => handle,
        None => prompt_line("Bluesky handle (e.g. name.bsky.social): ")?,
    };
    let password = read_app_password(password_stdin)?;

    let session = service.session().authenticate(&handle, &password).await?;
    report(&StatusMessage::success(format!(
        "Signed in as {}",
        session.handle
    )));
    Ok(())
}

fn prompt_line(prompt: &str) -> anyhow::Result<String> {
    if !atty::is(atty::Stream::Stdin) {
        return Err(invalid_input(
            ValidationError::MissingCredentials,
            "Not a TTY. Pass --handle for non-interactive use",
        ));
    }
    eprint!("{}", prompt);
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn read_app_password(use_stdin: bool) -> anyhow::Result<String> {
    if use_stdin {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read app password from stdin")?;
        return Ok(buffer.trim().to_string());
    }

    if let Ok(password) = std::env::var(APP_PASSWORD_ENV) {
        return Ok(password);
    }

    if !atty::is(atty::Stream::Stdin) {
        return Err(invalid_input(
            ValidationError::MissingCredentials,
            "Not a TTY. Use --password-stdin or set THREADPOST_APP_PASSWORD for automation",
        ));
    }
    Ok(rpassword::prompt_password("App password: ")?)
}

/// Sign in with an explicit handle or the remembered credentials
async fn ensure_session(service: &ThreadpostService, handle: Option<&str>) -> anyhow::Result<()> {
    if let Some(handle) = handle {
        let password = read_app_password(false)?;
        service.session().authenticate(handle, &password).await?;
        return Ok(());
    }

    if service.session().resume().await?.is_none() {
        return Err(invalid_input(
            ValidationError::NoSession,
            "Run 'thread-post login' first, or pass --handle",
        ));
    }
    Ok(())
}

fn read_stdin() -> anyhow::Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read thread from stdin")?;
    Ok(buffer)
}

/// Split plain text into posts at `---` lines
fn split_sections(text: &str) -> Vec<String> {
    let mut sections = vec![String::new()];
    for line in text.lines() {
        if line.trim() == SEPARATOR {
            sections.push(String::new());
            continue;
        }
        if let Some(current) = sections.last_mut() {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    sections
}

/// Fill a composer from a JSON array or `---`-separated text
fn parse_thread_input(composer: &mut ThreadComposer, text: &str) -> libthreadpost::Result<usize> {
    if text.trim_start().starts_with('[') {
        composer.import_json(text)
    } else {
        composer.import_texts(split_sections(text))
    }
}

/// Where the thread being posted came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadSource {
    /// A file or piped stdin; the saved drafts are left alone
    Input,
    /// The saved drafts, which are cleared once they are posted
    SavedDrafts,
}

/// Thread to post: the given file, piped stdin, or the saved drafts
fn load_composer(
    service: &ThreadpostService,
    file: Option<&Path>,
) -> anyhow::Result<(ThreadComposer, ThreadSource)> {
    let input = match file {
        Some(path) if path == Path::new("-") => Some(read_stdin()?),
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None if !atty::is(atty::Stream::Stdin) => {
            let text = read_stdin()?;
            (!text.trim().is_empty()).then_some(text)
        }
        None => None,
    };

    match input {
        Some(text) => {
            let mut composer = ThreadComposer::new(service.validation().clone());
            parse_thread_input(&mut composer, &text)?;
            Ok((composer, ThreadSource::Input))
        }
        None => {
            debug!("No input given, using saved drafts");
            Ok((service.composer(), ThreadSource::SavedDrafts))
        }
    }
}

/// Publish the composer's thread, updating saved drafts only when they are its source
async fn publish(
    service: &ThreadpostService,
    composer: &mut ThreadComposer,
    source: ThreadSource,
    keep_drafts: bool,
    cancel: &AtomicBool,
) -> libthreadpost::Result<ThreadOutcome> {
    match source {
        ThreadSource::SavedDrafts if !keep_drafts => {
            service.post_composer(composer, Some(cancel)).await
        }
        ThreadSource::SavedDrafts => {
            let result = service
                .post_thread(&composer.formatted_bodies(), Some(cancel))
                .await;
            if result.is_err() {
                service.drafts().save(composer.drafts());
            }
            result
        }
        ThreadSource::Input => {
            service
                .post_thread(&composer.formatted_bodies(), Some(cancel))
                .await
        }
    }
}

async fn post(
    service: &ThreadpostService,
    file: Option<&Path>,
    style: Option<FormatStyle>,
    format: OutputFormat,
    keep_drafts: bool,
    handle: Option<&str>,
) -> anyhow::Result<()> {
    let (mut composer, source) = load_composer(service, file)?;
    if let Some(style) = style {
        for index in 0..composer.len() {
            composer.set_style(index, style)?;
        }
    }

    // Reject bad input before asking for credentials
    let bodies = composer.formatted_bodies();
    service
        .validation()
        .validate_thread(&bodies)
        .map_err(ThreadpostError::from)?;

    ensure_session(service, handle).await?;

    let cancel = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(Arc::clone(&cancel))?;

    let progress = (format == OutputFormat::Text).then(|| spawn_progress(service.subscribe()));

    let result = publish(service, &mut composer, source, keep_drafts, &cancel).await;

    if let Some(progress) = progress {
        let _ = tokio::time::timeout(Duration::from_secs(1), progress).await;
    }

    match result {
        Ok(outcome) => {
            info!("Thread {} posted", outcome.job_id);
            match format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "job_id": outcome.job_id,
                        "posted": outcome.posted,
                        "posts": outcome.published,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    if let Some(root) = outcome.root() {
                        println!("{}", root.uri);
                    }
                    report(&StatusMessage::success(format!(
                        "Posted {} post(s)",
                        outcome.posted
                    )));
                }
            }
            Ok(())
        }
        Err(ThreadpostError::ThreadPost(e)) => {
            if e.is_partial() {
                let hint = match source {
                    ThreadSource::SavedDrafts => "Drafts were kept; remove the posted ones",
                    ThreadSource::Input => "Remove the posted ones from the input",
                };
                report(&StatusMessage::info(format!(
                    "{} post(s) are already live. {} before retrying",
                    e.posted, hint
                )));
            }
            Err(ThreadpostError::ThreadPost(e).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn spawn_progress(mut events: EventReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    render_event(&event);
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Progress display skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn render_event(event: &Event) {
    match event {
        Event::ThreadStarted {
            total,
            estimated_ms,
            ..
        } => {
            eprintln!(
                "Posting {} post(s), estimated {}",
                total,
                format_time(Duration::from_millis(*estimated_ms))
            );
        }
        Event::PostProgress {
            index,
            total,
            preview,
            elapsed_ms,
            remaining_ms,
            ..
        } => {
            let remaining = remaining_ms.map_or_else(
                || "estimating".to_string(),
                |ms| format_time(Duration::from_millis(ms)),
            );
            eprintln!(
                "[{}/{}] {:>3}%  elapsed {}, remaining {}  {}",
                index,
                total,
                percent(*index, *total),
                format_time(Duration::from_millis(*elapsed_ms)),
                remaining,
                preview.replace('\n', " ")
            );
        }
        Event::PostPublished { index, uri, .. } => {
            debug!("Post {} published: {}", index, uri);
        }
        Event::ThreadCompleted { .. } | Event::ThreadFailed { .. } => {}
    }
}

/// Set up signal handlers that stop the thread between posts
fn setup_signal_handlers(cancel: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            if matches!(sig, SIGINT | SIGTERM) {
                eprintln!("\nStopping after the current post...");
                cancel.store(true, Ordering::SeqCst);
                break;
            }
        }
    });

    Ok(())
}

fn drafts(service: &ThreadpostService, action: DraftsAction) -> anyhow::Result<()> {
    match action {
        DraftsAction::Show { format } => {
            let composer = service.composer();
            if format == OutputFormat::Json {
                println!("{}", composer.export_json()?);
                return Ok(());
            }

            if composer.is_empty() {
                report(&StatusMessage::info("No saved drafts"));
                return Ok(());
            }

            let max = service.validation().max_post_length();
            for draft in composer.drafts().iter().filter(|d| !d.is_blank()) {
                let count = composer.character_count(draft.index);
                let marker = match composer.counter_level(draft.index) {
                    CounterLevel::Normal => "",
                    CounterLevel::Warning => " (near limit)",
                    CounterLevel::Danger if count > max => " (too long)",
                    CounterLevel::Danger => " (at limit)",
                };
                println!(
                    "{:>3}. [{}] {}/{}{}  {}",
                    draft.index + 1,
                    draft.format_style,
                    count,
                    max,
                    marker,
                    preview(&draft.content).replace('\n', " ")
                );
            }
            Ok(())
        }
        DraftsAction::Clear => {
            service.drafts().clear();
            report(&StatusMessage::success("Saved drafts cleared"));
            Ok(())
        }
        DraftsAction::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut composer = ThreadComposer::new(service.validation().clone());
            let imported = parse_thread_input(&mut composer, &text)?;
            service.drafts().save(composer.drafts());
            report(&StatusMessage::success(format!(
                "Imported {} draft(s)",
                imported
            )));
            Ok(())
        }
        DraftsAction::Export => {
            println!("{}", service.composer().export_json()?);
            Ok(())
        }
    }
}
