use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ring::rand::SystemRandom;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::license::{
    generate_license_key, KeyCatalog, LicenseError, LicenseGate, LicenseStatus, LicenseType,
    DEFAULT_KEY_PREFIX,
};
use crate::logging;
use crate::validation::{
    password_strength, sanitize_input, stored_file_name, FieldState, FieldValidator, FileField,
    FileUpload, Form, SearchParams, SubmitDecision, TicketDraft, UserDraft, Validatable,
    ValidationContext, SECTOR_FIELD,
};

/// Ticketdesk - field validation and license gate for the helpdesk
#[derive(Parser)]
#[command(name = "ticketdesk")]
#[command(about = "Field validation and license gate for the helpdesk")]
#[command(long_about = "Ticketdesk - validate helpdesk form input and manage the machine license\n\nRun `ticketdesk start` to run the startup license check")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a single field value against its rule
    CheckField { name: String, value: String },
    /// Rate the strength of a password
    PasswordStrength { password: String },
    /// Escape text for display in HTML
    Sanitize { text: String },
    /// Validate an attachment by name, size in bytes and MIME type
    CheckFile {
        filename: String,
        size: u64,
        mime_type: String,
    },
    /// Validate a form given as a JSON object of field values
    CheckForm { path: PathBuf },
    /// Validate a user, ticket or search record given as JSON
    CheckRecord { kind: RecordKind, path: PathBuf },
    /// Manage the license installed on this machine
    #[command(subcommand)]
    License(LicenseCommands),
    /// Run the startup license check
    Start,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RecordKind {
    User,
    Ticket,
    Search,
}

#[derive(Subcommand)]
pub enum LicenseCommands {
    /// Show the installed license
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the startup check and record the validation
    Check,
    /// Print this machine's hardware id
    MachineId,
    /// Activate a license key on this machine
    Activate {
        key: String,
        name: String,
        email: String,
    },
    /// Restart the validity period of the installed license
    Renew { key: String },
    /// Deactivate the installed license
    Deactivate,
    /// Generate license keys without recording them
    Generate {
        #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
        prefix: String,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Generate a key for a license type and add it to the key catalog
    Issue {
        license_type: LicenseType,
        #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
        prefix: String,
        #[arg(long)]
        notes: Option<String>,
    },
}

/// Exit status when the license gate refuses to start
pub const EXIT_UNLICENSED: u8 = 2;

/// Exit status for a failed command: license errors anywhere in the chain
/// map to [`EXIT_UNLICENSED`], everything else to 1.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<LicenseError>().is_some() {
        EXIT_UNLICENSED
    } else {
        1
    }
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    logging::init_logging(cli.verbose, config.log_level.as_deref());

    match cli.command {
        Commands::CheckField { name, value } => check_field(&config, &name, &value),
        Commands::PasswordStrength { password } => show_password_strength(&password),
        Commands::Sanitize { text } => {
            println!("{}", sanitize_input(&text));
            Ok(())
        }
        Commands::CheckFile {
            filename,
            size,
            mime_type,
        } => check_file(&config, &filename, size, &mime_type),
        Commands::CheckForm { path } => check_form(&config, &path),
        Commands::CheckRecord { kind, path } => check_record(&config, kind, &path),
        Commands::License(command) => run_license(&config, command),
        Commands::Start => start(&config),
    }
}

fn validator(config: &AppConfig) -> Result<FieldValidator> {
    config
        .field_validator()
        .context("Failed to build validation rules")
}

fn gate(config: &AppConfig) -> Result<LicenseGate> {
    LicenseGate::from_config(config).context("Failed to open license state")
}

fn print_errors(messages: &[String]) {
    for msg in messages {
        println!("   📝 {}", msg);
    }
}

fn check_field(config: &AppConfig, name: &str, value: &str) -> Result<()> {
    let validator = validator(config)?;

    if validator.rules().get(name).is_none() {
        println!("ℹ️  No rule for field '{}', value accepted", name);
        return Ok(());
    }

    let mut field = FieldState::new(name, value);
    if validator.validate_field(&mut field) {
        println!("✅ {} is valid", name);
    } else {
        println!("❌ {} is invalid", name);
        print_errors(&field.messages());
    }
    Ok(())
}

fn show_password_strength(password: &str) -> Result<()> {
    let strength = password_strength(password);
    println!(
        "🔐 Password strength: {} ({}%, score {}/{})",
        strength.label,
        strength.percentage,
        strength.score,
        crate::validation::password::MAX_SCORE
    );
    println!("   class: {}", strength.class);
    Ok(())
}

fn check_file(config: &AppConfig, filename: &str, size: u64, mime_type: &str) -> Result<()> {
    let validator = validator(config)?;
    let mut input = FileField::with_selection("anexo", FileUpload::new(filename, size, mime_type));

    if validator.validate_file(&mut input) {
        println!("✅ {} accepted", filename);
        println!("   📦 Stored as: {}", stored_file_name(filename));
    } else {
        println!("❌ {} rejected", filename);
        print_errors(&input.messages());
    }
    Ok(())
}

/// Build a form from a JSON object. String, number and boolean members become
/// field values; objects with `filename`, `size_bytes` and `mime_type` become
/// file inputs; `null` is an empty file input.
fn form_from_json(value: &serde_json::Value) -> Result<Form> {
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("Form must be a JSON object of field values"))?;

    let mut form = Form::new();
    for (name, member) in object {
        match member {
            serde_json::Value::String(s) => form.set_value(name, s),
            serde_json::Value::Number(n) => form.set_value(name, &n.to_string()),
            serde_json::Value::Bool(b) => form.set_value(name, &b.to_string()),
            serde_json::Value::Null => form = form.with_file(FileField::new(name)),
            serde_json::Value::Object(_) => {
                let upload: FileUpload = serde_json::from_value(member.clone())
                    .with_context(|| format!("Invalid file description for '{}'", name))?;
                form = form.with_file(FileField::with_selection(name, upload));
            }
            serde_json::Value::Array(_) => bail!("Field '{}' cannot be a list", name),
        }
    }
    Ok(form)
}

fn check_form(config: &AppConfig, path: &Path) -> Result<()> {
    println!("📋 Validating form {}...", path.display());

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read form file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse form file: {}", path.display()))?;

    let validator = validator(config)?;
    let mut form = form_from_json(&value)?;

    if let Some(sector) = form.value(SECTOR_FIELD).map(str::to_string) {
        let update = validator.check_compras_setor(&sector, &mut form);
        if let Some(banner) = update.banner() {
            println!("⚠️  {}", banner);
        }
    }

    let decision = validator.on_submit(&mut form);

    for field in form.fields() {
        if !field.errors().is_empty() {
            println!("❌ {}", field.name);
            print_errors(&field.messages());
        }
    }
    for file in form.files() {
        if !file.errors().is_empty() {
            println!("❌ {}", file.name);
            print_errors(&file.messages());
        }
    }

    match decision {
        SubmitDecision::Proceed => println!("✅ Form is valid"),
        SubmitDecision::Abort { invalid_fields } => {
            println!("❌ Form rejected: {}", invalid_fields.join(", "))
        }
    }
    Ok(())
}

fn record_errors(
    config: &AppConfig,
    kind: RecordKind,
    value: serde_json::Value,
) -> Result<Vec<String>> {
    let record: Box<dyn Validatable> = match kind {
        RecordKind::User => Box::new(serde_json::from_value::<UserDraft>(value)?),
        RecordKind::Ticket => Box::new(serde_json::from_value::<TicketDraft>(value)?),
        RecordKind::Search => Box::new(serde_json::from_value::<SearchParams>(value)?),
    };

    let mut ctx = ValidationContext::with_options(config.validation_options());
    record.validate_with_context(&mut ctx);
    Ok(ctx.errors.iter().map(ToString::to_string).collect())
}

fn check_record(config: &AppConfig, kind: RecordKind, path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse record file: {}", path.display()))?;

    let errors = record_errors(config, kind, value)
        .with_context(|| format!("Invalid {:?} record", kind))?;
    if errors.is_empty() {
        println!("✅ Record is valid");
    } else {
        println!("❌ Record rejected");
        print_errors(&errors);
    }
    Ok(())
}

fn print_status(status: &LicenseStatus) {
    let icon = if status.licensed { "✅" } else { "❌" };
    println!("{} License {}: {}", icon, status.status, status.message);

    if let Some(name) = &status.customer_name {
        println!("   👤 Customer: {}", name);
    }
    if let Some(license_type) = status.license_type {
        println!("   🏷️  Type: {}", license_type);
    }
    if let Some(key) = &status.masked_key {
        println!("   🔑 Key: {}", key);
    }
    if let Some(expires_at) = &status.expires_at {
        println!(
            "   📅 Expires: {} ({} days remaining)",
            expires_at, status.days_remaining
        );
    }
    if let Some(features) = &status.features {
        println!(
            "   📦 Limits: {} users, {} tickets",
            features.max_users, features.max_tickets
        );
        if !features.flags.is_empty() {
            let flags: Vec<&str> = features.flags.iter().map(String::as_str).collect();
            println!("   ✨ Features: {}", flags.join(", "));
        }
    }
    if status.licensed {
        println!("   🔁 Validations: {}", status.validation_count);
    }
}

fn run_license(config: &AppConfig, command: LicenseCommands) -> Result<()> {
    match command {
        LicenseCommands::Status { json } => {
            let status = gate(config)?.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        LicenseCommands::Check => {
            let status = gate(config)?.check()?;
            print_status(&status);
        }
        LicenseCommands::MachineId => {
            println!("{}", gate(config)?.machine_id()?);
        }
        LicenseCommands::Activate { key, name, email } => {
            println!("🔑 Activating license...");
            let status = gate(config)?.activate(&key, &name, &email)?;
            print_status(&status);
        }
        LicenseCommands::Renew { key } => {
            println!("🔁 Renewing license...");
            let status = gate(config)?.renew(&key)?;
            print_status(&status);
        }
        LicenseCommands::Deactivate => {
            if gate(config)?.deactivate()? {
                println!("✅ License deactivated");
            } else {
                println!("📭 No active license to deactivate");
            }
        }
        LicenseCommands::Generate { prefix, count } => {
            let rng = SystemRandom::new();
            for _ in 0..count {
                println!("{}", generate_license_key(&prefix, &rng)?);
            }
        }
        LicenseCommands::Issue {
            license_type,
            prefix,
            notes,
        } => {
            let path = config.license.key_catalog_file();
            let mut catalog = KeyCatalog::load(&path)?;
            let key = catalog.issue(&prefix, license_type, notes)?;
            catalog.save(&path)?;
            println!("✅ Issued {} key: {}", license_type, key);
            println!("   📝 Recorded in {}", path.display());
        }
    }
    Ok(())
}

fn start(config: &AppConfig) -> Result<()> {
    let status = gate(config)?.check()?;
    let validator = validator(config)?;

    println!(
        "🚀 Ticketdesk ready: {} field rules loaded",
        validator.rules().len()
    );
    print_status(&status);
    Ok(())
}
