//! `notedesk` command line surface over the core services.
//!
//! # Responsibility
//! - Map subcommands onto note, sharing and analytics operations.
//! - Print results as JSON on stdout and typed errors on stderr.
//!
//! # Invariants
//! - Exit code 75 means a retryable store condition; any other failure
//!   exits 1 (2 for usage errors).

use chrono::{DateTime, Duration, FixedOffset};
use clap::{Parser, Subcommand, ValueEnum};
use notedesk_core::{
    open_db, AccessPolicy, ActivityAggregator, CivilClock, CivilZone, ConfigError, CoreConfig,
    CoreError, DbError, EventKind, LoggingConfig, LoggingError, NewActivityEvent, NoteDraft,
    NoteListQuery, NoteService, NoteUpdate, RepoError, ShareRequest, SharingManager,
    SqliteEventLog, SqliteNoteRepository, TimeWindow,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;

const EXIT_FAILURE: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_TEMPFAIL: i32 = 75;
/// Stderr also carries the JSON error object, so only warnings go there.
const STDERR_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(
    name = "notedesk",
    version,
    about = "Multi-user notes with sharing and activity analytics"
)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "notedesk.sqlite3")]
    db: PathBuf,
    /// TOML configuration file; environment overrides still apply
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Identity the command acts as
    #[arg(long = "as", global = true)]
    identity: Option<String>,
    /// Log level; defaults to the configured level for file logging and to
    /// `warn` on stderr
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Note CRUD
    #[command(subcommand)]
    Note(NoteCommand),
    /// Collaborator management (owner only)
    #[command(subcommand)]
    Share(ShareCommand),
    /// Activity event ingestion
    #[command(subcommand)]
    Event(EventCommand),
    /// Derived activity views
    #[command(subcommand)]
    Analytics(AnalyticsCommand),
}

#[derive(Subcommand)]
enum NoteCommand {
    /// Create a note owned by --as
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        /// Tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tag: Vec<String>,
        /// Initial collaborators as identity:permission (repeatable)
        #[arg(long)]
        share: Vec<String>,
    },
    /// Show a note readable by --as
    Get { id: String },
    /// Change title, content, tags or archive flag
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// Replace tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tag: Option<Vec<String>>,
        #[arg(long)]
        archived: Option<bool>,
    },
    /// Delete a note (owner or administrator)
    Delete { id: String },
    /// List notes owned by or shared with --as
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        include_archived: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Unauthenticated projection of a note
    Public { id: String },
}

#[derive(Subcommand)]
enum ShareCommand {
    /// Replace the collaborator list; no entries clears it
    Set {
        id: String,
        /// identity:permission (repeatable)
        #[arg(long)]
        entry: Vec<String>,
    },
    /// Show the collaborator list
    Get { id: String },
    /// Add or re-level one collaborator
    Grant {
        id: String,
        identity: String,
        permission: String,
    },
    /// Remove one collaborator
    Revoke { id: String, identity: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Login,
    Logout,
    PageView,
}

impl From<KindArg> for EventKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Login => Self::Login,
            KindArg::Logout => Self::Logout,
            KindArg::PageView => Self::PageView,
        }
    }
}

#[derive(Subcommand)]
enum EventCommand {
    /// Record one event for --as
    Record {
        #[arg(long, value_enum)]
        kind: KindArg,
        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        page: Option<String>,
        /// Seconds spent (page views only)
        #[arg(long)]
        seconds: Option<i64>,
    },
}

#[derive(clap::Args)]
struct WindowArgs {
    /// RFC 3339 window start
    #[arg(long)]
    from: Option<String>,
    /// RFC 3339 window end; defaults to now
    #[arg(long)]
    to: Option<String>,
    /// Trailing window length in days when --from is absent
    #[arg(long, default_value_t = 7)]
    days: i64,
    /// Tracked identities (comma-separated); defaults to the configured roster
    #[arg(long, value_delimiter = ',')]
    roster: Vec<String>,
}

#[derive(Subcommand)]
enum AnalyticsCommand {
    /// Full analytics report
    Dashboard(WindowArgs),
    /// Raw event log counts
    Summary(WindowArgs),
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Db(#[from] DbError),
    #[error("{0}")]
    Logging(#[from] LoggingError),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Usage(String),
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Core(value.into())
    }
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Core(err) => err.code(),
            Self::Config(_) => "config",
            Self::Db(err) if err.is_busy() => "store_unavailable",
            Self::Db(_) => "storage",
            Self::Logging(_) => "logging",
            Self::Json(_) => "serialization",
            Self::Usage(_) => "usage",
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            Self::Core(err) if err.is_retryable() => EXIT_TEMPFAIL,
            Self::Db(err) if err.is_busy() => EXIT_TEMPFAIL,
            Self::Usage(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}

/// Per-invocation wiring shared by every subcommand.
struct Context {
    conn: Connection,
    config: CoreConfig,
    zone: CivilZone,
    clock: CivilClock,
    identity: Option<String>,
}

impl Context {
    fn policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.config.administrator.clone())
    }

    fn notes(&self) -> Result<NoteService<SqliteNoteRepository<'_>>, CliError> {
        let repo = SqliteNoteRepository::try_new(&self.conn, self.zone)?;
        Ok(NoteService::new(repo, self.policy(), self.clock.clone()))
    }

    fn sharing(&self) -> Result<SharingManager<SqliteNoteRepository<'_>>, CliError> {
        let repo = SqliteNoteRepository::try_new(&self.conn, self.zone)?;
        Ok(SharingManager::new(repo, self.policy(), self.clock.clone()))
    }

    fn analytics(
        &self,
    ) -> Result<ActivityAggregator<SqliteEventLog<'_>, SqliteNoteRepository<'_>>, CliError> {
        let log = SqliteEventLog::try_new(&self.conn, self.zone)?;
        let corpus = SqliteNoteRepository::try_new(&self.conn, self.zone)?;
        Ok(ActivityAggregator::new(log, corpus, self.clock.clone()))
    }

    fn requester(&self) -> Result<&str, CliError> {
        self.identity
            .as_deref()
            .map(str::trim)
            .filter(|identity| !identity.is_empty())
            .ok_or_else(|| CliError::Usage("this command needs --as <identity>".to_string()))
    }

    fn window(&self, args: &WindowArgs) -> Result<TimeWindow, CliError> {
        let to = match args.to.as_deref() {
            Some(raw) => parse_instant(raw)?,
            None => self.clock.now(),
        };
        let window = match args.from.as_deref() {
            Some(raw) => TimeWindow::new(parse_instant(raw)?, to),
            None => TimeWindow::trailing(to, Duration::days(args.days.max(0))),
        };
        Ok(window)
    }

    fn roster(&self, args: &WindowArgs) -> Vec<String> {
        if args.roster.is_empty() {
            self.config.tracked_roster.clone()
        } else {
            args.roster.clone()
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!(
            "{}",
            serde_json::json!({
                "error": err.code(),
                "message": err.to_string(),
            })
        );
        std::process::exit(err.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match cli.config.as_deref() {
        Some(path) => CoreConfig::load(path)?,
        None => {
            let mut config = CoreConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    notedesk_core::init_logging(&cli_logging(&config.logging, cli.log_level.as_deref()))?;

    let zone = config.civil_zone()?;
    let ctx = Context {
        conn: open_db(&cli.db, &config.store)?,
        clock: CivilClock::system(zone),
        zone,
        config,
        identity: cli.identity,
    };

    match cli.command {
        Commands::Note(command) => run_note(&ctx, command),
        Commands::Share(command) => run_share(&ctx, command),
        Commands::Event(command) => run_event(&ctx, command),
        Commands::Analytics(command) => run_analytics(&ctx, command),
    }
}

/// Effective logging settings: an explicit level wins; otherwise stderr
/// logging is held at `warn` and file logging keeps the configured level.
fn cli_logging(configured: &LoggingConfig, explicit_level: Option<&str>) -> LoggingConfig {
    let level = match (explicit_level, &configured.directory) {
        (Some(level), _) => level.to_string(),
        (None, Some(_)) => configured.level.clone(),
        (None, None) => STDERR_LOG_LEVEL.to_string(),
    };
    LoggingConfig {
        level,
        directory: configured.directory.clone(),
    }
}

fn run_note(ctx: &Context, command: NoteCommand) -> Result<(), CliError> {
    let notes = ctx.notes()?;
    match command {
        NoteCommand::Create {
            title,
            content,
            tag,
            share,
        } => {
            let draft = NoteDraft {
                title,
                content,
                tags: tag,
                shared_with: share
                    .iter()
                    .map(|raw| parse_share(raw))
                    .collect::<Result<_, _>>()?,
            };
            print_json(&notes.create_note(ctx.requester()?, draft)?)
        }
        NoteCommand::Get { id } => print_json(&notes.get_note(&id, ctx.requester()?)?),
        NoteCommand::Update {
            id,
            title,
            content,
            tag,
            archived,
        } => {
            let update = NoteUpdate {
                title,
                content,
                tags: tag,
                is_archived: archived,
            };
            print_json(&notes.update_note(&id, ctx.requester()?, update)?)
        }
        NoteCommand::Delete { id } => {
            notes.delete_note(&id, ctx.requester()?)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        NoteCommand::List {
            search,
            include_archived,
            page,
            limit,
        } => {
            let query = NoteListQuery {
                search,
                include_archived,
                page,
                limit,
            };
            print_json(&notes.list_notes(ctx.requester()?, query)?)
        }
        NoteCommand::Public { id } => print_json(&notes.public_view(&id)?),
    }
}

fn run_share(ctx: &Context, command: ShareCommand) -> Result<(), CliError> {
    let sharing = ctx.sharing()?;
    let requester = ctx.requester()?;
    match command {
        ShareCommand::Set { id, entry } => {
            let requested = entry
                .iter()
                .map(|raw| parse_share(raw))
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&sharing.set_sharing(&id, requester, &requested)?)
        }
        ShareCommand::Get { id } => print_json(&sharing.get_sharing(&id, requester)?),
        ShareCommand::Grant {
            id,
            identity,
            permission,
        } => print_json(&sharing.grant(
            &id,
            requester,
            ShareRequest::new(identity, permission),
        )?),
        ShareCommand::Revoke { id, identity } => {
            print_json(&sharing.revoke(&id, requester, &identity)?)
        }
    }
}

fn run_event(ctx: &Context, command: EventCommand) -> Result<(), CliError> {
    let EventCommand::Record {
        kind,
        at,
        page,
        seconds,
    } = command;
    let timestamp = match at.as_deref() {
        Some(raw) => parse_instant(raw)?,
        None => ctx.clock.now(),
    };
    let event = NewActivityEvent {
        identity: ctx.requester()?.to_string(),
        kind: kind.into(),
        timestamp,
        page,
        time_spent_seconds: seconds,
    };
    print_json(&ctx.analytics()?.record_event(&event))
}

fn run_analytics(ctx: &Context, command: AnalyticsCommand) -> Result<(), CliError> {
    let analytics = ctx.analytics()?;
    match command {
        AnalyticsCommand::Dashboard(args) => {
            let report = analytics.dashboard(ctx.window(&args)?, &ctx.roster(&args));
            print_json(&report)
        }
        AnalyticsCommand::Summary(args) => {
            let summary = analytics.event_log_summary(ctx.window(&args)?, &ctx.roster(&args));
            print_json(&summary)
        }
    }
}

/// Splits `identity:permission` at the last colon.
fn parse_share(raw: &str) -> Result<ShareRequest, CliError> {
    raw.rsplit_once(':')
        .map(|(identity, permission)| ShareRequest::new(identity, permission))
        .ok_or_else(|| {
            CliError::Usage(format!("expected identity:permission, got `{raw}`"))
        })
}

fn parse_instant(raw: &str) -> Result<DateTime<FixedOffset>, CliError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|err| CliError::Usage(format!("invalid timestamp `{raw}`: {err}")))
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
