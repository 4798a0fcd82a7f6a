mod config;
mod serve;
mod service;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use elvtrace_core::{NewBatch, Session, Stage, StageEntry, TraceRecord};
use elvtrace_export::ExportFormat;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::service::{build_filter, TraceService};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Download format for `export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormatArg {
    Csv,
    Xlsx,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Csv => ExportFormat::Csv,
            ExportFormatArg::Xlsx => ExportFormat::Xlsx,
        }
    }
}

/// Recycled-plastic batch traceability.
#[derive(Parser)]
#[command(name = "elvtrace", version, about = "Recycled-plastic batch traceability")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Configuration file (default: ./elvtrace.toml if present)
    #[arg(long, global = true, env = "ELVTRACE_CONFIG")]
    config: Option<PathBuf>,

    /// Account to act as; without it commands run as a guest
    #[arg(long, global = true, env = "ELVTRACE_USER")]
    user: Option<String>,

    /// Password for --user
    #[arg(long, global = true, env = "ELVTRACE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP JSON API server
    Serve {
        /// Port to listen on (default: from config, else 8080)
        #[arg(long)]
        port: Option<u16>,
        /// TLS certificate file (PEM). Requires --tls-key.
        #[arg(long, requires = "tls_key")]
        tls_cert: Option<PathBuf>,
        /// TLS private key file (PEM). Requires --tls-cert.
        #[arg(long, requires = "tls_cert")]
        tls_key: Option<PathBuf>,
    },

    /// Create batches and render their labels
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },

    /// Record a stage event for an existing batch
    Record {
        /// Batch code from the label
        code: String,
        /// Stage reached (Shipped, Transported, Received, Reprocessed, Manufactured, Sold)
        stage: Stage,
        /// Person recording the event
        #[arg(long)]
        operator: String,
        /// Weight in kilograms
        #[arg(long)]
        weight: Option<Decimal>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long)]
        product_model: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },

    /// List records, newest first
    Query {
        /// Only this batch
        #[arg(long)]
        batch: Option<String>,
        /// Only these stages (repeatable)
        #[arg(long = "stage")]
        stages: Vec<String>,
        /// First day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },

    /// Show a batch's timeline, oldest first by timestamp
    History {
        code: String,
    },

    /// Record totals, stage distribution and per-batch completeness
    Stats,

    /// Write the table as CSV or XLSX
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormatArg,
        /// Only these batches (repeatable); default exports everything
        #[arg(long = "code")]
        codes: Vec<String>,
        /// Output file (default: generated name in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Storage administration
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum BatchCommands {
    /// Open a new batch and write its label PNG
    Create {
        /// Human-readable batch name
        name: String,
        /// Where to write the label (default: QR_<code>_<name>.png)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List batches with a creation record
    List,
    /// Re-render one batch's label
    Label {
        code: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a ZIP with every batch label
    Labels {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Show which backend is active
    Storage,
    /// Push the local table to the remote, overwriting it
    Sync,
    /// Delete every record
    Clear {
        /// Skip confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Replace the table with a CSV backup
    Import {
        file: PathBuf,
    },
    /// Copy the local file to a timestamped CSV
    Backup {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List accounts and roles
    Accounts,
    /// Load demo batches into an empty table
    SeedDemo,
}

/// Everything a command needs.
struct Ctx {
    service: TraceService,
    session: Option<Session>,
    output: OutputFormat,
    quiet: bool,
}

impl Ctx {
    /// Report `msg` and exit with status 1.
    fn fail(&self, msg: impl std::fmt::Display) -> ! {
        report_error(&msg.to_string(), self.output, self.quiet);
        process::exit(1);
    }

    fn warnings(&mut self) {
        for warning in self.service.drain_advisories() {
            if !self.quiet {
                eprintln!("warning: {}", warning);
            }
        }
    }

    fn emit_json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => self.fail(format!("could not serialize output: {}", e)),
        }
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) {
        if let Err(e) = std::fs::write(path, bytes) {
            self.fail(format!("error writing '{}': {}", path.display(), e));
        }
    }
}

fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    let serving = matches!(cli.command, Commands::Serve { .. });
    init_logging(if serving { "info" } else { "warn" });

    let config = match config::resolve(cli.config.as_deref(), |k| std::env::var(k).ok()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    let command = match cli.command {
        Commands::Serve {
            port,
            tls_cert,
            tls_key,
        } => {
            let port = port.unwrap_or(config.port);
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    let msg = format!("failed to create tokio runtime: {}", e);
                    report_error(&msg, cli.output, cli.quiet);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(config, port, tls_cert, tls_key)) {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
            return;
        }
        other => other,
    };

    let service = TraceService::open(&config);
    let mut ctx = Ctx {
        service,
        session: None,
        output: cli.output,
        quiet: cli.quiet,
    };
    ctx.warnings();

    if let Some(user) = cli.user.as_deref() {
        let password = match cli.password.as_deref() {
            Some(p) => p,
            None => ctx.fail("--password (or ELVTRACE_PASSWORD) is required with --user"),
        };
        match ctx.service.login(user, password) {
            Ok(session) => ctx.session = Some(session),
            Err(e) => ctx.fail(e),
        }
    }

    match command {
        Commands::Serve { .. } => {}
        Commands::Batch { command } => cmd_batch(&mut ctx, command),
        Commands::Record {
            code,
            stage,
            operator,
            weight,
            source,
            destination,
            product_model,
            notes,
            location,
        } => {
            let mut entry = StageEntry::new(code, stage, operator);
            entry.weight_kg = weight;
            entry.source = source;
            entry.destination = destination;
            entry.product_model = product_model;
            entry.notes = notes;
            entry.location = location;
            cmd_record(&mut ctx, entry);
        }
        Commands::Query {
            batch,
            stages,
            from,
            to,
        } => cmd_query(&mut ctx, batch, stages, from, to),
        Commands::History { code } => cmd_history(&mut ctx, &code),
        Commands::Stats => cmd_stats(&mut ctx),
        Commands::Export { format, codes, out } => cmd_export(&mut ctx, format.into(), &codes, out),
        Commands::Admin { command } => cmd_admin(&mut ctx, command),
    }
    ctx.warnings();
}

fn print_records(records: &[TraceRecord]) {
    for r in records {
        let weight = r
            .weight_kg
            .map(|w| format!("{} kg", w))
            .unwrap_or_default();
        println!(
            "{}  {}  {:<12}  {:<20}  {}",
            r.timestamp,
            r.batch_code,
            r.stage.as_str(),
            r.operator,
            weight
        );
    }
}

fn cmd_batch(ctx: &mut Ctx, command: BatchCommands) {
    match command {
        BatchCommands::Create { name, out } => {
            let session = ctx.session.clone();
            let created = match ctx
                .service
                .create_batch(session.as_ref(), NewBatch { batch_name: name })
            {
                Ok(c) => c,
                Err(e) => ctx.fail(e),
            };
            let path = out.unwrap_or_else(|| {
                let stem = elvtrace_codegen::label_file_stem(
                    &created.record.batch_code,
                    &created.record.batch_name,
                );
                PathBuf::from(format!("{}.png", stem))
            });
            ctx.write_file(&path, &created.label.png);
            match ctx.output {
                OutputFormat::Json => ctx.emit_json(&serde_json::json!({
                    "record": created.record,
                    "scan_url": created.label.url,
                    "label": path,
                })),
                OutputFormat::Text => {
                    if !ctx.quiet {
                        println!("created batch {}", created.record.batch_code);
                        println!("scan url: {}", created.label.url);
                        println!("label: {}", path.display());
                    }
                }
            }
        }
        BatchCommands::List => {
            let session = ctx.session.clone();
            let batches = match ctx.service.list_batches(session.as_ref()) {
                Ok(b) => b,
                Err(e) => ctx.fail(e),
            };
            match ctx.output {
                OutputFormat::Json => ctx.emit_json(&batches),
                OutputFormat::Text => {
                    for b in &batches {
                        println!("{}  {}  {}", b.batch_code, b.created_at, b.batch_name);
                    }
                }
            }
        }
        BatchCommands::Label { code, out } => {
            let session = ctx.session.clone();
            let label = match ctx.service.batch_label(session.as_ref(), &code) {
                Ok(l) => l,
                Err(e) => ctx.fail(e),
            };
            let path = out.unwrap_or_else(|| PathBuf::from(format!("{}.png", label.batch_code)));
            ctx.write_file(&path, &label.png);
            if !ctx.quiet {
                match ctx.output {
                    OutputFormat::Json => ctx.emit_json(&serde_json::json!({
                        "batch_code": label.batch_code,
                        "scan_url": label.url,
                        "label": path,
                    })),
                    OutputFormat::Text => println!("wrote {}", path.display()),
                }
            }
        }
        BatchCommands::Labels { out } => {
            let session = ctx.session.clone();
            let (file_name, bytes) = match ctx.service.label_bundle(session.as_ref()) {
                Ok(b) => b,
                Err(e) => ctx.fail(e),
            };
            let path = out.unwrap_or_else(|| PathBuf::from(file_name));
            ctx.write_file(&path, &bytes);
            if !ctx.quiet {
                println!("wrote {}", path.display());
            }
        }
    }
}

fn cmd_record(ctx: &mut Ctx, entry: StageEntry) {
    let session = ctx.session.clone();
    let record = match ctx.service.submit_stage(session.as_ref(), entry) {
        Ok(r) => r,
        Err(e) => ctx.fail(e),
    };
    match ctx.output {
        OutputFormat::Json => ctx.emit_json(&record),
        OutputFormat::Text => {
            if !ctx.quiet {
                println!(
                    "recorded {} for {} ({}) at {}",
                    record.stage, record.batch_code, record.batch_name, record.timestamp
                );
            }
        }
    }
}

fn cmd_query(
    ctx: &mut Ctx,
    batch: Option<String>,
    stages: Vec<String>,
    from: Option<String>,
    to: Option<String>,
) {
    let stages = (!stages.is_empty()).then(|| stages.join(","));
    let filter = match build_filter(
        batch.as_deref(),
        stages.as_deref(),
        from.as_deref(),
        to.as_deref(),
    ) {
        Ok(f) => f,
        Err(e) => ctx.fail(e),
    };
    let session = ctx.session.clone();
    let records = match ctx.service.query(session.as_ref(), &filter) {
        Ok(r) => r,
        Err(e) => ctx.fail(e),
    };
    match ctx.output {
        OutputFormat::Json => ctx.emit_json(&records),
        OutputFormat::Text => {
            print_records(&records);
            if !ctx.quiet {
                println!("{} record(s)", records.len());
            }
        }
    }
}

fn cmd_history(ctx: &mut Ctx, code: &str) {
    let session = ctx.session.clone();
    let history = match ctx.service.history(session.as_ref(), code) {
        Ok(h) => h,
        Err(e) => ctx.fail(e),
    };
    match ctx.output {
        OutputFormat::Json => ctx.emit_json(&history),
        OutputFormat::Text => print_records(&history),
    }
}

fn cmd_stats(ctx: &mut Ctx) {
    let session = ctx.session.clone();
    let stats = match ctx.service.stats(session.as_ref()) {
        Ok(s) => s,
        Err(e) => ctx.fail(e),
    };
    match ctx.output {
        OutputFormat::Json => ctx.emit_json(&stats),
        OutputFormat::Text => {
            println!("records: {}", stats.summary.total_records);
            println!("batches: {}", stats.summary.distinct_batches);
            println!("stages:  {}", stats.summary.distinct_stages);
            for (stage, count) in &stats.summary.stage_counts {
                println!("  {:<12} {}", stage.as_str(), count);
            }
            for (code, c) in &stats.completeness {
                let missing: Vec<String> = c.missing().iter().map(|s| s.to_string()).collect();
                println!(
                    "{}  {} record(s)  missing: {}",
                    code,
                    c.record_count,
                    if missing.is_empty() { "-".to_string() } else { missing.join(", ") }
                );
            }
        }
    }
}

fn cmd_export(ctx: &mut Ctx, format: ExportFormat, codes: &[String], out: Option<PathBuf>) {
    let session = ctx.session.clone();
    let artifact = match ctx.service.export(session.as_ref(), format, codes) {
        Ok(a) => a,
        Err(e) => ctx.fail(e),
    };
    let path = out.unwrap_or_else(|| PathBuf::from(&artifact.file_name));
    ctx.write_file(&path, &artifact.bytes);
    if !ctx.quiet {
        match ctx.output {
            OutputFormat::Json => ctx.emit_json(&serde_json::json!({ "file": path, "format": format.to_string() })),
            OutputFormat::Text => println!("wrote {}", path.display()),
        }
    }
}

fn cmd_admin(ctx: &mut Ctx, command: AdminCommands) {
    let session = ctx.session.clone();
    let session = session.as_ref();
    match command {
        AdminCommands::Storage => {
            let info = match ctx.service.storage_info(session) {
                Ok(i) => i,
                Err(e) => ctx.fail(e),
            };
            match ctx.output {
                OutputFormat::Json => ctx.emit_json(&info),
                OutputFormat::Text => {
                    println!("backend: {:?}", info.backend);
                    println!("local: {} (present: {})", info.local, info.local_backup_present);
                    println!("remote: {}", info.remote.as_deref().unwrap_or("unavailable"));
                }
            }
        }
        AdminCommands::Sync => match ctx.service.sync_to_remote(session) {
            Ok(rows) => {
                if !ctx.quiet {
                    println!("synced {} row(s) to remote", rows);
                }
            }
            Err(e) => ctx.fail(e),
        },
        AdminCommands::Clear { yes } => {
            if !yes {
                ctx.fail("refusing to clear without --yes");
            }
            match ctx.service.clear(session) {
                Ok(()) => {
                    if !ctx.quiet {
                        println!("cleared");
                    }
                }
                Err(e) => ctx.fail(e),
            }
        }
        AdminCommands::Import { file } => {
            let bytes = match std::fs::read(&file) {
                Ok(b) => b,
                Err(e) => ctx.fail(format!("error reading file '{}': {}", file.display(), e)),
            };
            match ctx.service.import(session, &bytes) {
                Ok(rows) => {
                    if !ctx.quiet {
                        println!("imported {} row(s)", rows);
                    }
                }
                Err(e) => ctx.fail(e),
            }
        }
        AdminCommands::Backup { out } => {
            let artifact = match ctx.service.backup(session) {
                Ok(a) => a,
                Err(e) => ctx.fail(e),
            };
            let path = out.unwrap_or_else(|| PathBuf::from(&artifact.file_name));
            ctx.write_file(&path, &artifact.bytes);
            if !ctx.quiet {
                println!("wrote {}", path.display());
            }
        }
        AdminCommands::Accounts => {
            let accounts = match ctx.service.accounts(session) {
                Ok(a) => a,
                Err(e) => ctx.fail(e),
            };
            match ctx.output {
                OutputFormat::Json => ctx.emit_json(&accounts),
                OutputFormat::Text => {
                    for a in &accounts {
                        println!("{:<12} {}", a.username, a.role.as_str());
                    }
                }
            }
        }
        AdminCommands::SeedDemo => match ctx.service.seed_demo(session) {
            Ok(0) => {
                if !ctx.quiet {
                    println!("table not empty, nothing seeded");
                }
            }
            Ok(rows) => {
                if !ctx.quiet {
                    println!("seeded {} demo row(s)", rows);
                }
            }
            Err(e) => ctx.fail(e),
        },
    }
}

fn error_json(msg: &str) -> String {
    serde_json::json!({ "error": msg }).to_string()
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", error_json(msg)),
    }
}
