//! mailsort CLI - inspect and classify messages in the desktop mail store.

use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug, info, warn};
use mailsort_core::automation::StoredFolder;
use mailsort_core::folders::INBOX;
use mailsort_core::paths::expand_path;
use mailsort_core::{
    AppConfig, AppPaths, Classification, ClassificationMapping, ClassificationOutcome,
    ClassifierClient, FolderSummary, MailStore, Mailbox, MemoryAutomation, MessageRecord,
};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;

const APP_NAME: &str = env!("CARGO_PKG_NAME");

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("config loaded from {}", ctx.paths.global_config.display());

    match cli.command {
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Folders => handle_folders(&ctx),
        Command::Mail { command } => handle_mail(&ctx, command),
        Command::Apply(args) => handle_apply(&ctx, args),
        Command::Categories => handle_categories(&ctx),
        Command::Triage(args) => handle_triage(&ctx, args),
        Command::Health => handle_health(&ctx),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Inspect and classify messages in the desktop mail store.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Mailbox document to use instead of the configured one
    #[arg(long, value_name = "PATH", global = true, env = "MAILSORT_STORE")]
    store: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[arg(long, global = true)]
    debug: bool,
    #[arg(long, global = true)]
    trace: bool,
    #[arg(long, global = true, conflicts_with = "yaml")]
    json: bool,
    #[arg(long, global = true)]
    yaml: bool,
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
    /// Report what would change without writing anything
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,
    /// Classifier request timeout
    #[arg(long = "timeout", value_name = "SECONDS", global = true)]
    timeout: Option<u64>,
    #[arg(long = "diagnostics", global = true)]
    diagnostics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the default config and create the mailbox with its folders
    Init(InitCommand),
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// List folders with message counts
    Folders,
    Mail {
        #[command(subcommand)]
        command: MailCommand,
    },
    /// File a message according to a category
    Apply(ApplyArgs),
    /// Show the category-to-folder mapping
    #[command(alias = "cats")]
    Categories,
    /// Classify inbox messages through the service and file them
    Triage(TriageArgs),
    /// Check that the classification service answers
    Health,
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    Show,
    Path,
    Reset,
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Overwrite an existing config file
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum MailCommand {
    /// List messages in a folder, newest first
    #[command(alias = "ls")]
    List(MailListArgs),
    /// Show a message
    Get(MailGetArgs),
    /// Mark a message read or unread
    Mark(MailMarkArgs),
    /// Move a message to another folder
    #[command(alias = "mv")]
    Move(MailMoveArgs),
    /// Replace a message's category tags
    Tag(MailTagArgs),
    /// Inbox messages of a conversation, oldest first
    Thread(MailThreadArgs),
}

#[derive(Debug, Args)]
struct MailListArgs {
    #[arg(short, long, default_value = INBOX)]
    folder: String,
    /// Defaults to `page_size` from the config
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    #[arg(long, default_value_t = 0)]
    offset: usize,
    /// Only show unread messages of the page
    #[arg(short, long)]
    unread: bool,
}

#[derive(Debug, Args)]
struct MailGetArgs {
    id: String,
}

#[derive(Debug, Args)]
struct MailMarkArgs {
    id: String,
    #[arg(long, conflicts_with = "unread")]
    read: bool,
    #[arg(long, required_unless_present = "read")]
    unread: bool,
}

#[derive(Debug, Args)]
struct MailMoveArgs {
    id: String,
    folder: String,
}

#[derive(Debug, Args)]
struct MailTagArgs {
    id: String,
    label: String,
}

#[derive(Debug, Args)]
struct MailThreadArgs {
    conversation_id: String,
}

#[derive(Debug, Args)]
struct ApplyArgs {
    id: String,
    category: String,
}

#[derive(Debug, Args)]
struct TriageArgs {
    /// Number of newest inbox messages to classify (defaults to `page_size`)
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Also reclassify messages that already carry a tag
    #[arg(long)]
    all: bool,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.clone()).context("discovering paths")?;
        let config = AppConfig::load(&paths).context("loading configuration")?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let mut builder = env_logger::Builder::new();
        builder.filter_level(self.effective_log_level());
        if let Ok(filters) = env::var("MAILSORT_LOG") {
            builder.parse_filters(&filters);
        }

        if self.disable_color() {
            builder.write_style(WriteStyle::Never);
        } else if self.force_color() {
            builder.write_style(WriteStyle::Always);
        } else {
            builder.write_style(WriteStyle::Auto);
        }

        if self.common.diagnostics {
            builder.format_timestamp_millis();
            builder.format_module_path(true);
            builder.format_target(true);
        } else {
            builder.format_timestamp(None);
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn force_color(&self) -> bool {
        matches!(self.common.color, ColorOption::Always) || env::var_os("FORCE_COLOR").is_some()
    }

    fn disable_color(&self) -> bool {
        self.common.no_color
            || matches!(self.common.color, ColorOption::Never)
            || env::var_os("NO_COLOR").is_some()
    }

    fn style(&self) -> Style {
        let tz = self.config.timezone.parse::<Tz>().unwrap_or_else(|_| {
            warn!("unknown timezone '{}', using UTC", self.config.timezone);
            Tz::UTC
        });
        let color = !self.disable_color() && (self.force_color() || io::stdout().is_terminal());
        Style { color, tz }
    }

    fn store_path(&self) -> Result<PathBuf> {
        match &self.common.store {
            Some(path) => Ok(expand_path(path.clone())?),
            None => Ok(self.config.store_path(&self.paths)?),
        }
    }

    fn classifier(&self) -> Result<ClassifierClient> {
        let mut settings = self.config.classifier.clone();
        if let Some(secs) = self.common.timeout {
            settings.timeout_secs = secs;
        }
        ClassifierClient::from_config(&settings).context("creating classifier client")
    }

    fn page_size(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.config.page_size)
    }
}

/// The mail store opened over the mailbox document.
struct Backend {
    app: MemoryAutomation,
    store: MailStore<MemoryAutomation>,
    path: PathBuf,
}

impl Backend {
    fn open(ctx: &RuntimeContext) -> Result<Self> {
        let path = ctx.store_path()?;
        let app = if path.exists() {
            MemoryAutomation::load(&path)
                .with_context(|| format!("loading mailbox {}", path.display()))?
        } else {
            debug!("no mailbox at {}, starting empty", path.display());
            MemoryAutomation::new()
        };
        let store = MailStore::new(app.clone());
        store.initialize().context("opening mail session")?;
        Ok(Self { app, store, path })
    }

    /// Write the current store contents back to the mailbox document.
    fn persist(&self) -> Result<()> {
        self.app
            .snapshot()
            .save(&self.path)
            .with_context(|| format!("writing mailbox {}", self.path.display()))?;
        debug!("mailbox written to {}", self.path.display());
        Ok(())
    }
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    let config_path = ctx.paths.writable_config();
    let store_path = ctx.store_path()?;
    if ctx.common.dry_run {
        println!(
            "dry-run: would write config to {} and create mailbox at {}",
            config_path.display(),
            store_path.display()
        );
        return Ok(());
    }

    if cmd.force {
        AppConfig::write_default(config_path)?;
    } else {
        AppConfig::ensure_default(config_path)?;
    }
    println!("config:  {}", config_path.display());

    if store_path.exists() {
        println!("mailbox: {} (kept)", store_path.display());
        return Ok(());
    }
    seed_mailbox(&ClassificationMapping::builtin())
        .save(&store_path)
        .with_context(|| format!("creating mailbox {}", store_path.display()))?;
    println!("mailbox: {}", store_path.display());
    Ok(())
}

/// Empty mailbox holding the inbox and every folder a category files into.
fn seed_mailbox(mapping: &ClassificationMapping) -> Mailbox {
    let mut names = vec![INBOX];
    for (_, destination) in mapping.entries() {
        if !destination.stays_in_place && !names.contains(&destination.folder) {
            names.push(destination.folder);
        }
    }
    Mailbox {
        folders: names
            .into_iter()
            .map(|name| StoredFolder {
                name: name.to_string(),
                messages: Vec::new(),
            })
            .collect(),
    }
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => emit_output(&ctx.common, &ctx.config, |config| {
            pretty_print_value(&serde_json::to_value(config)?, 0);
            Ok(())
        }),
        ConfigCommand::Path => {
            println!("{}", ctx.paths.writable_config().display());
            Ok(())
        }
        ConfigCommand::Reset => {
            AppConfig::write_default(ctx.paths.writable_config())?;
            Ok(())
        }
    }
}

fn handle_folders(ctx: &RuntimeContext) -> Result<()> {
    let backend = Backend::open(ctx)?;
    let folders = backend.store.list_folders().context("listing folders")?;
    let style = ctx.style();
    emit_output(&ctx.common, &folders, |folders| {
        print_folders(folders, &style);
        Ok(())
    })
}

fn handle_mail(ctx: &RuntimeContext, cmd: MailCommand) -> Result<()> {
    let backend = Backend::open(ctx)?;
    match cmd {
        MailCommand::List(args) => handle_mail_list(ctx, &backend, args),
        MailCommand::Get(args) => handle_mail_get(ctx, &backend, args),
        MailCommand::Mark(args) => handle_mail_mark(ctx, &backend, args),
        MailCommand::Move(args) => handle_mail_move(ctx, &backend, args),
        MailCommand::Tag(args) => handle_mail_tag(ctx, &backend, args),
        MailCommand::Thread(args) => handle_mail_thread(ctx, &backend, args),
    }
}

fn handle_mail_list(ctx: &RuntimeContext, backend: &Backend, args: MailListArgs) -> Result<()> {
    let mut records = backend
        .store
        .list(&args.folder, ctx.page_size(args.limit), args.offset)
        .with_context(|| format!("listing {}", args.folder))?;
    if args.unread {
        records.retain(|r| !r.is_read);
    }
    let style = ctx.style();
    emit_output(&ctx.common, &records, |records| {
        print_message_list(records, &style);
        Ok(())
    })
}

fn handle_mail_get(ctx: &RuntimeContext, backend: &Backend, args: MailGetArgs) -> Result<()> {
    let record = backend
        .store
        .get(&args.id)
        .with_context(|| format!("reading message {}", args.id))?;
    let style = ctx.style();
    emit_output(&ctx.common, &record, |record| {
        print_message(record, &style);
        Ok(())
    })
}

fn handle_mail_mark(ctx: &RuntimeContext, backend: &Backend, args: MailMarkArgs) -> Result<()> {
    let state = if args.read { "read" } else { "unread" };
    if ctx.common.dry_run {
        println!("dry-run: would mark {} as {state}", args.id);
        return Ok(());
    }
    backend
        .store
        .set_read(&args.id, args.read)
        .with_context(|| format!("marking {} as {state}", args.id))?;
    backend.persist()?;
    println!("Marked {} as {state}", args.id);
    Ok(())
}

fn handle_mail_move(ctx: &RuntimeContext, backend: &Backend, args: MailMoveArgs) -> Result<()> {
    if ctx.common.dry_run {
        println!("dry-run: would move {} to {}", args.id, args.folder);
        return Ok(());
    }
    backend
        .store
        .move_to(&args.id, &args.folder)
        .with_context(|| format!("moving {} to {}", args.id, args.folder))?;
    backend.persist()?;
    println!("Moved {} to {}", args.id, args.folder);
    Ok(())
}

fn handle_mail_tag(ctx: &RuntimeContext, backend: &Backend, args: MailTagArgs) -> Result<()> {
    if ctx.common.dry_run {
        println!("dry-run: would tag {} with '{}'", args.id, args.label);
        return Ok(());
    }
    backend
        .store
        .set_category(&args.id, &args.label)
        .with_context(|| format!("tagging {}", args.id))?;
    backend.persist()?;
    println!("Tagged {} with '{}'", args.id, args.label);
    Ok(())
}

fn handle_mail_thread(ctx: &RuntimeContext, backend: &Backend, args: MailThreadArgs) -> Result<()> {
    let records = backend
        .store
        .conversation(&args.conversation_id)
        .with_context(|| format!("reading conversation {}", args.conversation_id))?;
    let style = ctx.style();
    emit_output(&ctx.common, &records, |records| {
        print_message_list(records, &style);
        Ok(())
    })
}

fn handle_apply(ctx: &RuntimeContext, args: ApplyArgs) -> Result<()> {
    let backend = Backend::open(ctx)?;
    if ctx.common.dry_run {
        let destination = backend.store.mapping().resolve(&args.id, &args.category)?;
        println!(
            "dry-run: would {} {} '{}'",
            if destination.stays_in_place { "tag" } else { "file" },
            args.id,
            destination.folder
        );
        return Ok(());
    }

    let result = backend.store.apply_classification(&args.id, &args.category);
    // a failed tag can follow a successful move
    backend.persist()?;
    let outcome = result.with_context(|| format!("applying '{}' to {}", args.category, args.id))?;
    emit_output(&ctx.common, &outcome, |outcome| {
        print_outcome(outcome);
        Ok(())
    })
}

#[derive(Debug, Serialize)]
struct CategoryRow {
    label: &'static str,
    folder: &'static str,
    relocates: bool,
}

fn handle_categories(ctx: &RuntimeContext) -> Result<()> {
    let rows: Vec<CategoryRow> = ClassificationMapping::builtin()
        .entries()
        .iter()
        .map(|(label, destination)| CategoryRow {
            label: *label,
            folder: destination.folder,
            relocates: !destination.stays_in_place,
        })
        .collect();
    emit_output(&ctx.common, &rows, |rows| {
        for row in rows {
            let action = if row.relocates { "move + tag" } else { "tag only" };
            println!("{:<26} {:<18} {action}", row.label, row.folder);
        }
        Ok(())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum TriageAction {
    Applied,
    WouldApply,
    LowConfidence,
    UnknownCategory,
    Failed,
}

impl TriageAction {
    fn as_str(&self) -> &'static str {
        match self {
            TriageAction::Applied => "applied",
            TriageAction::WouldApply => "would apply",
            TriageAction::LowConfidence => "low confidence",
            TriageAction::UnknownCategory => "unknown category",
            TriageAction::Failed => "failed",
        }
    }
}

#[derive(Debug, Serialize)]
struct TriageRow {
    id: String,
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    action: TriageAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// What triage does with a verdict before touching the store.
fn triage_action(
    mapping: &ClassificationMapping,
    verdict: &Classification,
    min_confidence: f64,
    dry_run: bool,
) -> TriageAction {
    if mapping.lookup(&verdict.category).is_none() {
        TriageAction::UnknownCategory
    } else if verdict.confidence < min_confidence {
        TriageAction::LowConfidence
    } else if dry_run {
        TriageAction::WouldApply
    } else {
        TriageAction::Applied
    }
}

fn handle_triage(ctx: &RuntimeContext, args: TriageArgs) -> Result<()> {
    let backend = Backend::open(ctx)?;
    let client = ctx.classifier()?;
    let mapping = *backend.store.mapping();
    let records = backend
        .store
        .list(INBOX, ctx.page_size(args.limit), 0)
        .context("listing inbox")?;

    let mut rows = Vec::with_capacity(records.len());
    let mut touched = false;
    for record in records {
        if !args.all && !record.categories.is_empty() {
            debug!("skipping {}: already tagged", record.id);
            continue;
        }
        let mut row = TriageRow {
            id: record.id.clone(),
            subject: record.subject.clone(),
            category: None,
            confidence: None,
            action: TriageAction::Failed,
            error: None,
        };

        let verdict = match client.classify(&record) {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!("classifying {}: {err}", record.id);
                row.error = Some(err.to_string());
                rows.push(row);
                continue;
            }
        };
        row.action = triage_action(
            &mapping,
            &verdict,
            ctx.config.classifier.min_confidence,
            ctx.common.dry_run,
        );
        if row.action == TriageAction::Applied {
            touched = true;
            if let Err(err) = backend.store.apply_classification(&record.id, &verdict.category) {
                warn!("filing {}: {err}", record.id);
                row.action = TriageAction::Failed;
                row.error = Some(err.to_string());
            }
        }
        row.category = Some(verdict.category);
        row.confidence = Some(verdict.confidence);
        rows.push(row);
    }

    if touched {
        backend.persist()?;
    }
    let applied = rows
        .iter()
        .filter(|r| r.action == TriageAction::Applied)
        .count();
    info!("triaged {} messages, {applied} filed", rows.len());

    let style = ctx.style();
    emit_output(&ctx.common, &rows, |rows| {
        print_triage(rows, &style);
        Ok(())
    })
}

fn handle_health(ctx: &RuntimeContext) -> Result<()> {
    let client = ctx.classifier()?;
    let status = client
        .health()
        .with_context(|| format!("reaching classifier at {}", client.base_url()))?;
    emit_output(&ctx.common, &status, |status| {
        println!("classifier at {}: ok", client.base_url());
        pretty_print_value(status, 1);
        Ok(())
    })
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

fn emit_output<T, F>(opts: &CommonOpts, value: &T, pretty: F) -> Result<()>
where
    T: ?Sized + Serialize,
    F: FnOnce(&T) -> Result<()>,
{
    if opts.json {
        let json = serde_json::to_string_pretty(value)?;
        println!("{json}");
        return Ok(());
    }
    if opts.yaml {
        let yaml = serde_yaml::to_string(value)?;
        println!("{yaml}");
        return Ok(());
    }
    pretty(value)
}

/// Terminal rendering settings.
struct Style {
    color: bool,
    tz: Tz,
}

fn pretty_print_value(v: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match v {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::Object(_) => {
                        println!("{pad}{key}:");
                        pretty_print_value(value, indent + 1);
                    }
                    Value::String(s) => println!("{pad}{key}: {s}"),
                    other => println!("{pad}{key}: {other}"),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                pretty_print_value(item, indent);
            }
        }
        Value::String(s) => println!("{pad}{s}"),
        other => println!("{pad}{other}"),
    }
}

fn print_folders(folders: &[FolderSummary], style: &Style) {
    for folder in folders {
        let counts = format!("{} messages, {} unread", folder.total, folder.unread);
        if style.color && folder.unread > 0 {
            println!("{:<24} {}", folder.name.bold(), counts.yellow());
        } else if style.color {
            println!("{:<24} {}", folder.name, counts.dimmed());
        } else {
            println!("{:<24} {counts}", folder.name);
        }
    }
}

fn print_message_list(records: &[MessageRecord], style: &Style) {
    if records.is_empty() {
        println!("(no messages)");
        return;
    }
    let now = Utc::now();
    for record in records {
        let subject = if record.subject.is_empty() {
            "(no subject)".to_string()
        } else {
            truncate_str(&record.subject, 72)
        };
        let date_str = format_date_human(record.received, style.tz, now);
        let id = short_id(&record.id);

        if style.color {
            if record.is_read {
                println!("  {} - {} [{}]", subject, date_str.dimmed(), id.cyan());
            } else {
                println!(
                    "{} {} - {} [{}]",
                    "*".yellow().bold(),
                    subject.bold(),
                    date_str.dimmed(),
                    id.cyan()
                );
            }
            println!("  {}", record.sender.dimmed());
        } else {
            let marker = if record.is_read { ' ' } else { '*' };
            println!("{marker} {subject} - {date_str} [{id}]");
            println!("  {}", record.sender);
        }
        if !record.categories.is_empty() {
            let tags = record.categories.join(", ");
            if style.color {
                println!("  {}", tags.magenta());
            } else {
                println!("  [{tags}]");
            }
        }
        println!();
    }
}

fn print_message(record: &MessageRecord, style: &Style) {
    let received = record.received.with_timezone(&style.tz);
    let header = |name: &str, value: &str| {
        if value.is_empty() {
            return;
        }
        if style.color {
            println!("{} {value}", format!("{name}:").bold());
        } else {
            println!("{name}: {value}");
        }
    };
    header("Subject", &record.subject);
    header("From", &record.sender);
    header("To", &record.recipient);
    header("Date", &received.format("%a, %d %b %Y %H:%M %Z").to_string());
    header("Folder", &record.folder);
    header("Importance", record.importance.as_str());
    header("Categories", &record.categories.join(", "));
    header("Conversation", &record.conversation_id);
    if record.has_attachments {
        header("Attachments", "yes");
    }
    header("Id", &record.id);
    println!();
    println!("{}", record.content);
}

fn print_outcome(outcome: &ClassificationOutcome) {
    if outcome.relocated {
        println!(
            "Filed {} into '{}' ({})",
            outcome.id, outcome.destination, outcome.category
        );
    } else {
        println!(
            "Tagged {} as '{}' ({})",
            outcome.id, outcome.destination, outcome.category
        );
    }
}

fn print_triage(rows: &[TriageRow], style: &Style) {
    if rows.is_empty() {
        println!("(nothing to triage)");
        return;
    }
    for row in rows {
        let category = row.category.as_deref().unwrap_or("-");
        let confidence = row
            .confidence
            .map(|c| format!("{:.0}%", c * 100.0))
            .unwrap_or_default();
        let subject = truncate_str(&row.subject, 48);
        let action = row.action.as_str();
        if style.color {
            let action = match row.action {
                TriageAction::Applied => action.green().to_string(),
                TriageAction::Failed => action.red().to_string(),
                _ => action.yellow().to_string(),
            };
            println!(
                "[{}] {subject:<48} {category:<26} {confidence:>4} {action}",
                short_id(&row.id).cyan()
            );
        } else {
            println!(
                "[{}] {subject:<48} {category:<26} {confidence:>4} {action}",
                short_id(&row.id)
            );
        }
        if let Some(error) = &row.error {
            println!("    {error}");
        }
    }
}

/// Last 12 characters of a store identity, enough to tell messages apart
/// in a listing. `--json` output keeps the full value.
fn short_id(id: &str) -> String {
    let count = id.chars().count();
    if count <= 16 {
        return id.to_string();
    }
    id.chars().skip(count - 12).collect()
}

/// Truncate string to max length, adding ellipsis if needed.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(2)).collect();
        format!("{truncated}..")
    }
}

/// "Today 14:30", "Yesterday 09:15", "Mon 14:30", "Dec 5" or "Dec 5 2023"
/// depending on how long ago `received` is.
fn format_date_human(received: DateTime<Utc>, tz: Tz, now: DateTime<Utc>) -> String {
    if received == DateTime::<Utc>::default() {
        return "-".to_string();
    }
    let dt = received.with_timezone(&tz);
    let today = now.with_timezone(&tz).date_naive();
    let date = dt.date_naive();
    let yesterday = today.pred_opt().unwrap_or(today);

    if date == today {
        format!("Today {}", dt.format("%H:%M"))
    } else if date == yesterday {
        format!("Yesterday {}", dt.format("%H:%M"))
    } else if date < today && (today - date).num_days() < 7 {
        dt.format("%a %H:%M").to_string()
    } else if date.year() == today.year() {
        dt.format("%b %-d").to_string()
    } else {
        dt.format("%b %-d %Y").to_string()
    }
}
