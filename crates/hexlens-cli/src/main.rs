use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use hexlens_core::{
    Catalog, CatalogError, Command, Endian, Field, FieldRef, HexError, Protocol, Session,
    SessionError, Template, hex_to_spaced, normalize, parse_strict,
};
use tracing::{debug, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("HEXLENS_BUILD_COMMIT"),
    "\nbuilt: ",
    env!("HEXLENS_BUILD_DATE"),
);

const LOG_ENV: &str = "HEXLENS_LOG";
const DEFAULT_LOG_FILTER: &str = "hexlens=info,hexlens_core=info";

const EXAMPLES: &str = "Examples:\n  hexlens normalize dump.txt --spaced\n  hexlens parse dump.txt --pretty\n  hexlens template add-protocol --name TestProto --id AA\n  hexlens template add-command --protocol TestProto --name Ping --id 05\n  hexlens field add testproto/05 --name seq --type u16 --start 5 --end 6 --endian big";

#[derive(Parser, Debug)]
#[command(name = "hexlens")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Reverse-engineering aid for binary wire protocols: normalize hex dumps, match them against templates and decode their fields.",
    long_about = None,
    after_help = EXAMPLES
)]
struct Cli {
    /// Template catalog root directory
    #[arg(long, global = true, env = "HEXLENS_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Session cache file
    #[arg(
        long,
        global = true,
        env = "HEXLENS_SESSION",
        default_value = "last_session.json"
    )]
    session: PathBuf,

    /// Log debug details (decode failures, skipped files)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the canonical hex of a dump.
    Normalize {
        /// Dump file, a glob matching one file, or '-' for stdin (default)
        input: Option<PathBuf>,

        /// Print space-separated byte pairs
        #[arg(long)]
        spaced: bool,

        #[command(flatten)]
        hex: HexArgs,
    },
    /// Print the template matching a dump.
    Match {
        /// Dump file, a glob matching one file, or '-' for stdin (default)
        input: Option<PathBuf>,

        #[command(flatten)]
        hex: HexArgs,
    },
    /// Decode a dump against its matching template (or --template) as JSON.
    Parse {
        /// Dump file, a glob matching one file, or '-' for stdin (default)
        input: Option<PathBuf>,

        /// Template key to decode with instead of matching
        #[arg(short, long)]
        template: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        hex: HexArgs,
    },
    /// Manage protocol and command templates.
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Manage the fields of a template.
    Field {
        #[command(subcommand)]
        command: FieldCommands,
    },
    /// Inspect the session cache.
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Args, Debug)]
struct HexArgs {
    /// Read the input as one contiguous hex run (no dump decoration)
    #[arg(long)]
    strict: bool,

    /// Pad odd-length strict input with a trailing 0
    #[arg(long, requires = "strict")]
    pad: bool,
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// List every template.
    List,
    /// Show one template as a field table.
    Show {
        /// <group>/<id>, <group>/<id>/<name> or a protocol name
        key: String,

        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create or update a protocol.
    AddProtocol {
        #[arg(long)]
        name: String,

        /// Protocol id byte(s) in hex
        #[arg(long)]
        id: String,

        #[arg(long, default_value = "")]
        description: String,
    },
    /// Create or update a command of an existing protocol.
    AddCommand {
        /// Owning protocol name
        #[arg(long)]
        protocol: String,

        #[arg(long)]
        name: String,

        /// Command id byte(s) in hex
        #[arg(long)]
        id: String,

        /// Discriminator bytes following the command id
        #[arg(long, default_value = "")]
        follow: String,

        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a template; deleting a protocol deletes its commands.
    Delete {
        /// <group>/<id>, <group>/<id>/<name> or a protocol name
        key: String,
    },
}

#[derive(Subcommand, Debug)]
enum FieldCommands {
    /// Append a field to a template.
    Add {
        /// Template key
        key: String,

        #[arg(long)]
        name: String,

        /// Field type, e.g. u16, float, char.ascii, date
        #[arg(long = "type")]
        field_type: String,

        /// First byte offset (inclusive)
        #[arg(long)]
        start: usize,

        /// Last byte offset (inclusive)
        #[arg(long)]
        end: usize,

        #[arg(long, default_value = "little")]
        endian: Endian,

        #[arg(long, default_value = "")]
        description: String,
    },
    /// Change a field; omitted options keep their value.
    Update {
        /// Template key
        key: String,

        /// Field index or name
        field: FieldRef,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "type")]
        field_type: Option<String>,

        #[arg(long)]
        start: Option<usize>,

        #[arg(long)]
        end: Option<usize>,

        #[arg(long)]
        endian: Option<Endian>,

        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a field.
    Remove {
        /// Template key
        key: String,

        /// Field index or name
        field: FieldRef,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// Print the cached session as JSON.
    Show,
    /// Delete the session cache.
    Clear,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(err.code)
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("hexlens=debug,hexlens_core=debug")
    } else if quiet {
        EnvFilter::new("hexlens=warn,hexlens_core=warn")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let data_dir = cli.data_dir;
    let session = cli.session;
    match cli.command {
        Commands::Normalize { input, spaced, hex } => cmd_normalize(input, spaced, &hex),
        Commands::Match { input, hex } => cmd_match(&data_dir, input, &hex),
        Commands::Parse {
            input,
            template,
            pretty,
            hex,
        } => cmd_parse(&data_dir, &session, input, template, pretty, &hex),
        Commands::Template { command } => cmd_template(&data_dir, command),
        Commands::Field { command } => cmd_field(&data_dir, command),
        Commands::Session { command } => cmd_session(&session, command),
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
    code: u8,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
            code: 2,
        }
    }

    fn with_code(mut self, code: u8) -> Self {
        self.code = code;
        self
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

impl From<CatalogError> for CliError {
    fn from(err: CatalogError) -> Self {
        let hint = match &err {
            CatalogError::InvalidInput { .. } => None,
            CatalogError::OddLengthHex { .. } => {
                Some("hex ids are whole bytes; add a trailing 0".to_string())
            }
            CatalogError::DuplicateName { .. } => Some("choose a different name".to_string()),
            CatalogError::UnknownTemplate { .. } => {
                Some("run 'hexlens template list' to see the available keys".to_string())
            }
            CatalogError::AmbiguousKey { .. } => {
                Some("name the command: <group>/<id>/<name>".to_string())
            }
            CatalogError::NoMatch => Some(
                "define one with 'hexlens template add-protocol' or 'hexlens template add-command'"
                    .to_string(),
            ),
            CatalogError::Io { .. } | CatalogError::Json { .. } => {
                Some("check the --data-dir path and its permissions".to_string())
            }
        };
        let code = if matches!(err, CatalogError::NoMatch) { 1 } else { 2 };
        CliError::new(err.to_string(), hint).with_code(code)
    }
}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        CliError::new(
            err.to_string(),
            Some("check the --session path and its permissions".to_string()),
        )
    }
}

fn cmd_normalize(input: Option<PathBuf>, spaced: bool, hex: &HexArgs) -> Result<(), CliError> {
    let (_, canonical) = read_canonical(input.as_deref(), hex)?;
    if spaced {
        println!("{}", hex_to_spaced(&canonical));
    } else {
        println!("{}", canonical);
    }
    Ok(())
}

fn cmd_match(data_dir: &Path, input: Option<PathBuf>, hex: &HexArgs) -> Result<(), CliError> {
    let (_, canonical) = read_canonical(input.as_deref(), hex)?;
    let catalog = Catalog::open(data_dir);
    let template = catalog.match_hex(&canonical).ok_or(CatalogError::NoMatch)?;
    println!(
        "{}\t{}\t{}",
        template.full_key(),
        template.kind(),
        template.name()
    );
    Ok(())
}

fn cmd_parse(
    data_dir: &Path,
    session_path: &Path,
    input: Option<PathBuf>,
    template: Option<String>,
    pretty: bool,
    hex: &HexArgs,
) -> Result<(), CliError> {
    let (text, canonical) = read_canonical(input.as_deref(), hex)?;
    let catalog = Catalog::open(data_dir);
    let record = match template {
        Some(key) => {
            let template = catalog.template(&key)?;
            catalog.parse(&canonical, &template)
        }
        None => catalog.identify(&canonical)?.1,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&record)
    } else {
        serde_json::to_string(&record)
    }
    .context("JSON serialization failed")?;
    println!("{}", json);

    let session = Session {
        input_text: text,
        output_text: json,
        raw_hex_data: canonical,
        offset: 0,
    };
    if let Err(err) = session.save(session_path) {
        warn!(%err, "session not saved");
    }
    Ok(())
}

fn cmd_template(data_dir: &Path, command: TemplateCommands) -> Result<(), CliError> {
    let mut catalog = Catalog::open(data_dir);
    match command {
        TemplateCommands::List => {
            let templates = catalog.list();
            if templates.is_empty() {
                eprintln!("no templates in {}", data_dir.display());
            }
            for template in templates {
                println!(
                    "{:<8} {:<28} {} ({} fields)",
                    template.kind(),
                    template.full_key(),
                    template.name(),
                    template.fields().len()
                );
            }
        }
        TemplateCommands::Show { key, json } => {
            let template = catalog.template(&key)?;
            if json {
                let json = serde_json::to_string_pretty(&template)
                    .context("JSON serialization failed")?;
                println!("{}", json);
            } else {
                print_template(&template);
            }
        }
        TemplateCommands::AddProtocol {
            name,
            id,
            description,
        } => {
            let mut protocol = Protocol::new(name, id);
            protocol.header.description = description;
            if let Some(existing) = catalog.protocol(&protocol.header.name) {
                protocol.header.fields = existing.header.fields.clone();
            }
            let saved = catalog.save(&Template::Protocol(protocol))?;
            println!("saved {}", saved.full_key());
        }
        TemplateCommands::AddCommand {
            protocol,
            name,
            id,
            follow,
            description,
        } => {
            let mut command = Command::new(protocol, name, id).with_follow(follow);
            command.header.description = description;
            keep_command_fields(&catalog, &mut command);
            let saved = catalog.save(&Template::Command(command))?;
            println!("saved {}", saved.full_key());
        }
        TemplateCommands::Delete { key } => {
            for template in catalog.delete(&key)? {
                println!("deleted {}", template.full_key());
            }
        }
    }
    Ok(())
}

/// Carry the fields of an already stored command over an update.
fn keep_command_fields(catalog: &Catalog, command: &mut Command) {
    let Ok(id) = hexlens_core::canonical_id(&command.header.protocol_id_hex) else {
        return;
    };
    let key = format!(
        "{}/{}/{}",
        command.protocol_name.to_lowercase(),
        id,
        command.header.name
    );
    let follow = command.follow.to_ascii_uppercase();
    if let Some(Template::Command(existing)) = catalog
        .resolve(&key)
        .into_iter()
        .find(|t| matches!(t, Template::Command(c) if c.follow == follow))
    {
        debug!(key = %key, "keeping stored fields");
        command.header.fields = existing.header.fields;
    }
}

fn cmd_field(data_dir: &Path, command: FieldCommands) -> Result<(), CliError> {
    let mut catalog = Catalog::open(data_dir);
    let saved = match command {
        FieldCommands::Add {
            key,
            name,
            field_type,
            start,
            end,
            endian,
            description,
        } => {
            let field =
                Field::new(name, field_type, start, end, endian).with_description(description);
            catalog.add_field(&key, field)?
        }
        FieldCommands::Update {
            key,
            field,
            name,
            field_type,
            start,
            end,
            endian,
            description,
        } => {
            let mut updated = catalog.field(&key, &field)?;
            if let Some(name) = name {
                updated.name = name;
            }
            if let Some(field_type) = field_type {
                updated.field_type = field_type;
            }
            if let Some(start) = start {
                updated.start_pos = start;
            }
            if let Some(end) = end {
                updated.end_pos = end;
            }
            if let Some(endian) = endian {
                updated.endian = endian;
            }
            if let Some(description) = description {
                updated.description = description;
            }
            catalog.update_field(&key, &field, updated)?
        }
        FieldCommands::Remove { key, field } => catalog.remove_field(&key, &field)?,
    };
    print_template(&saved);
    Ok(())
}

fn cmd_session(path: &Path, command: SessionCommands) -> Result<(), CliError> {
    match command {
        SessionCommands::Show => {
            let session = Session::load(path);
            let json =
                serde_json::to_string_pretty(&session).context("JSON serialization failed")?;
            println!("{}", json);
        }
        SessionCommands::Clear => {
            if path.exists() {
                fs::remove_file(path).with_context(|| {
                    format!("Failed to remove session file: {}", path.display())
                })?;
                eprintln!("OK: session cleared -> {}", path.display());
            }
        }
    }
    Ok(())
}

fn print_template(template: &Template) {
    let header = template.header();
    println!("{} {} ({})", template.kind(), header.name, template.full_key());
    println!("id: {}", header.protocol_id_hex);
    if let Template::Command(command) = template {
        println!("protocol: {}", command.protocol_name);
        if !command.follow.is_empty() {
            println!("follow: {}", command.follow);
        }
    }
    if !header.description.is_empty() {
        println!("description: {}", header.description);
    }
    if header.fields.is_empty() {
        println!("(no fields)");
        return;
    }
    println!(
        "{:>3}  {:<16} {:<16} {:>5} {:>5} {:>6}  {:<6}  description",
        "#", "name", "type", "start", "end", "length", "endian"
    );
    for (index, field) in header.fields.iter().enumerate() {
        let endian = match field.endian {
            Endian::Little => "little",
            Endian::Big => "big",
        };
        println!(
            "{:>3}  {:<16} {:<16} {:>5} {:>5} {:>6}  {:<6}  {}",
            index,
            field.name,
            field.field_type,
            field.start_pos,
            field.end_pos,
            field.length(),
            endian,
            field.description
        );
    }
}

/// Read the input text and reduce it to canonical hex.
fn read_canonical(input: Option<&Path>, hex: &HexArgs) -> Result<(String, String), CliError> {
    let text = read_input(input)?;
    let canonical = if hex.strict {
        parse_strict(&text, hex.pad).map_err(|err| match err {
            HexError::OddLength { len } => CliError::new(
                format!("odd-length hex input ({} digits)", len),
                Some("pass --pad to append a trailing 0".to_string()),
            ),
            other => CliError::new(
                other.to_string(),
                Some("drop --strict to accept dump decoration".to_string()),
            ),
        })?
    } else {
        normalize(&text)
    };
    if canonical.is_empty() {
        return Err(CliError::new(
            "input contains no hex bytes",
            Some("paste bytes as hex pairs, e.g. 'AA 00 05'".to_string()),
        ));
    }
    debug!(bytes = canonical.len() / 2, "input normalized");
    Ok((text, canonical))
}

fn read_input(input: Option<&Path>) -> Result<String, CliError> {
    let input = match input {
        Some(path) if path.as_os_str() != "-" => path,
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            return Ok(text);
        }
    };
    let resolved = resolve_input_path(input)?;
    if !resolved.is_file() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("pass a text file holding a hex dump, or '-' for stdin".to_string()),
        ));
    }
    let bytes = fs::read(&resolved)
        .with_context(|| format!("Failed to read input file: {}", resolved.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// A dump path, or a glob that must select exactly one regular file.
fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !pattern.contains(GLOB_META) {
        return Ok(input.to_path_buf());
    }

    let bad_pattern = |detail: String| {
        CliError::new(
            format!("invalid input pattern '{pattern}'"),
            Some(format!("pattern error: {detail}")),
        )
    };
    let files = glob(&pattern)
        .map_err(|err| bad_pattern(err.msg.to_string()))?
        .filter_map(|entry| match entry {
            Ok(path) => path.is_file().then_some(Ok(path)),
            Err(err) => Some(Err(bad_pattern(err.to_string()))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    match files.as_slice() {
        [file] => Ok(file.clone()),
        [] => Err(CliError::new(
            format!("no dump file matches '{pattern}'"),
            Some("check the path or quote the pattern".to_string()),
        )),
        several => Err(CliError::new(
            format!(
                "multiple files match pattern '{pattern}': {}",
                summarize_paths(several, 3)
            ),
            Some("pass a single dump file, or run once per file".to_string()),
        )),
    }
}

const GLOB_META: [char; 3] = ['*', '?', '['];

/// `a, b, c and 2 more`.
fn summarize_paths(paths: &[PathBuf], shown: usize) -> String {
    let mut text = paths
        .iter()
        .take(shown)
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let rest = paths.len().saturating_sub(shown);
    if rest > 0 {
        text.push_str(&format!(" and {rest} more"));
    }
    text
}
