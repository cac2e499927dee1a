//! CLI entry point for `mimeShell`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mimeshell::config::Config;
use mimeshell::{Address, AttachmentEncoding, Message, ParseOptions};

#[derive(Parser)]
#[command(name = "mimeshell", version, about = "Decode MIME email messages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a summary of a message
    Parse {
        /// Message file (`-` for stdin)
        path: PathBuf,
        /// Print the full decoded message as JSON
        #[arg(long)]
        json: bool,
        /// Attachment content encoding in JSON output: arraybuffer, base64, utf8
        #[arg(long, value_name = "ENC")]
        attachment_encoding: Option<String>,
    },
    /// Print the decoded body
    Text {
        /// Message file (`-` for stdin)
        path: PathBuf,
        /// Print the HTML body instead of plain text
        #[arg(long)]
        html: bool,
    },
    /// Extract all attachments
    Attachments {
        /// Message file (`-` for stdin)
        path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = mimeshell::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Parse {
            path,
            json,
            attachment_encoding,
        } => cmd_parse(&path, json, attachment_encoding.as_deref(), &config),
        Commands::Text { path, html } => cmd_text(&path, html, &config),
        Commands::Attachments { path, output } => cmd_attachments(&path, output, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = mimeshell::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mimeshell.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimeshell", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Parse the message at `path` (or stdin for `-`).
fn load_message(path: &Path, options: ParseOptions) -> anyhow::Result<Message> {
    if path == Path::new("-") {
        let mut buffer = Vec::new();
        std::io::stdin().lock().read_to_end(&mut buffer)?;
        return Ok(mimeshell::parse(buffer, options)?);
    }

    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let file = std::fs::File::open(path).map_err(|e| mimeshell::MimeError::io(path, e))?;
    if file.metadata()?.len() == 0 {
        return Ok(mimeshell::parse(&b""[..], options)?);
    }
    // SAFETY: the map is read-only and dropped before this function returns.
    // Concurrent truncation of the file by another process is not guarded against.
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| mimeshell::MimeError::io(path, e))?;
    Ok(mimeshell::parse(&mmap[..], options)?)
}

fn display_list(list: &[Address]) -> String {
    list.iter()
        .map(Address::display)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print a message summary or its JSON form.
fn cmd_parse(
    path: &Path,
    json: bool,
    attachment_encoding: Option<&str>,
    config: &Config,
) -> anyhow::Result<()> {
    let mut options = config.parse_options()?;
    if let Some(enc) = attachment_encoding {
        options.attachment_encoding = enc.parse::<AttachmentEncoding>()?;
    }
    let message = load_message(path, options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_summary(&message);
    }
    Ok(())
}

/// Print a human-readable table of the main fields and attachments.
fn print_summary(message: &Message) {
    use humansize::{format_size, BINARY};

    println!();
    if let Some(from) = &message.from {
        println!("  {:<12} {}", "From:", from.display());
    }
    if !message.to.is_empty() {
        println!("  {:<12} {}", "To:", display_list(&message.to));
    }
    if !message.cc.is_empty() {
        println!("  {:<12} {}", "Cc:", display_list(&message.cc));
    }
    if let Some(subject) = &message.subject {
        println!("  {:<12} {}", "Subject:", subject);
    }
    if let Some(date) = &message.date {
        println!("  {:<12} {}", "Date:", date);
    }
    if let Some(id) = &message.message_id {
        println!("  {:<12} {}", "Message-ID:", id);
    }

    let body_len = message.text.as_deref().map_or(0, str::len);
    println!("  {:<12} {}", "Text:", format_size(body_len, BINARY));

    if message.attachments.is_empty() {
        println!();
        return;
    }

    println!();
    println!(
        "  {:<4} {:<40} {:<30} {:>10}",
        "#", "Filename", "Type", "Size"
    );
    println!("  {}", "-".repeat(87));
    for (i, att) in message.attachments.iter().enumerate() {
        let name: String = att
            .filename
            .as_deref()
            .unwrap_or("(unnamed)")
            .chars()
            .take(39)
            .collect();
        let mime: String = att.mime_type.chars().take(29).collect();
        println!(
            "  {:<4} {:<40} {:<30} {:>10}",
            i + 1,
            name,
            mime,
            format_size(att.size(), BINARY)
        );
    }
    println!();
}

/// Print the text or HTML body.
fn cmd_text(path: &Path, html: bool, config: &Config) -> anyhow::Result<()> {
    let message = load_message(path, config.parse_options()?)?;
    let body = if html { message.html } else { message.text };
    match body {
        Some(body) => println!("{body}"),
        None => eprintln!("  No inline body found."),
    }
    Ok(())
}

/// Extract all attachments of a message to a directory.
fn cmd_attachments(path: &Path, output: Option<PathBuf>, config: &Config) -> anyhow::Result<()> {
    let output = output
        .or_else(|| config.export.default_output_dir.clone())
        .ok_or_else(|| anyhow::anyhow!("No output directory given (use -o or [export] default_output_dir)"))?;

    let options = ParseOptions {
        attachment_encoding: AttachmentEncoding::ArrayBuffer,
        ..config.parse_options()?
    };
    let message = load_message(path, options)?;

    if message.attachments.is_empty() {
        println!("  No attachments found.");
        return Ok(());
    }

    let paths = mimeshell::export::attachment::export_all_attachments(&message, &output)?;
    println!(
        "  Extracted {} attachment(s) to {}",
        paths.len(),
        output.display()
    );
    Ok(())
}
