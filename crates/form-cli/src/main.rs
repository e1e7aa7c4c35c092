use clap::{Parser, Subcommand, ValueEnum};
use form_service::{RenderFormat, RenderedForm, render_payload};
use form_spec::{
    AnswerMap, FormDefinition, SubmissionQuery, SubmissionRecord, ValidationResult, apply_query,
    build_render_payload, build_sheet, builtin_templates, definition_schema, find_template,
    validate_answers, write_csv,
};
use form_web::Settings;
use form_web::settings::DEFAULT_CONFIG_PATH;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Form builder server and offline form tooling",
    long_about = "Runs the form builder web server, and checks, renders and exports form definitions without a database"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Json,
    Text,
    Html,
}

impl From<RenderMode> for RenderFormat {
    fn from(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Json => RenderFormat::Json,
            RenderMode::Text => RenderFormat::Text,
            RenderMode::Html => RenderFormat::Html,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server.
    Serve {
        /// TOML settings file; missing files fall back to defaults and FORMS__* variables.
        #[arg(long, value_name = "CONFIG", env = "FORMS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: String,
        /// Override the listen address from the settings.
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Check a form definition for structural problems.
    Check {
        /// Form definition JSON (`{"form": ..., "fields": [...]}`).
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
    },
    /// Validate answers against a form definition.
    Validate {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        /// JSON object mapping field ids to answer strings.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Render the public view of a form definition.
    Render {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Export submission records to CSV.
    Export {
        /// Definitions of the forms the records belong to. Repeat for several forms.
        #[arg(long = "form", value_name = "FORM", required = true)]
        forms: Vec<PathBuf>,
        /// JSON array of submission records.
        #[arg(long, value_name = "SUBMISSIONS")]
        submissions: PathBuf,
        /// Keep only records whose form name or answers contain this text.
        #[arg(long)]
        search: Option<String>,
        /// Output file; stdout when omitted.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// List the built-in templates, or print one of them.
    Templates {
        #[arg(value_name = "KEY")]
        key: Option<String>,
    },
    /// Print an argon2 hash for `admin.password_hash`.
    HashPassword {
        /// Read from stdin when omitted.
        #[arg(long, env = "FORMS_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Print the JSON schema of a form definition.
    Schema,
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config, bind } => run_serve(&config, bind),
        Command::Check { form } => run_check(&form),
        Command::Validate { form, answers } => run_validate(&form, &answers),
        Command::Render {
            form,
            answers,
            format,
        } => run_render(&form, answers.as_deref(), format),
        Command::Export {
            forms,
            submissions,
            search,
            out,
        } => run_export(&forms, &submissions, search, out.as_deref()),
        Command::Templates { key } => run_templates(key.as_deref()),
        Command::HashPassword { password } => run_hash_password(password),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&definition_schema())?);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_serve(config: &str, bind: Option<String>) -> CliResult<()> {
    let mut settings = Settings::load(config)?;
    if let Some(bind) = bind {
        settings.web.bind = bind;
    }
    info!(config, bind = %settings.web.bind, "starting form builder");
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(form_web::serve(settings))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let contents =
        fs::read_to_string(path).map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    serde_json::from_str(&contents)
        .map_err(|err| format!("cannot parse {}: {err}", path.display()).into())
}

fn run_check(form_path: &Path) -> CliResult<()> {
    let definition: FormDefinition = read_json(form_path)?;
    definition.check()?;
    println!(
        "Form '{}' is well formed ({} fields)",
        definition.form.name,
        definition.fields.len()
    );
    Ok(())
}

fn run_validate(form_path: &Path, answers_path: &Path) -> CliResult<()> {
    let definition: FormDefinition = read_json(form_path)?;
    let answers: AnswerMap = read_json(answers_path)?;

    let fields = definition.public_fields();
    let (_, result) = validate_answers(&fields, &answers);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&definition, &result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(definition: &FormDefinition, result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            let label = definition
                .fields
                .iter()
                .find(|field| field.id == error.field_id)
                .map(|field| field.label.as_str())
                .unwrap_or("<unknown>");
            println!("  {label} [{}] - {}", error.kind.code(), error.message);
        }
    }
    if !result.unknown_fields.is_empty() {
        let ids = result
            .unknown_fields
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        println!("Ignored answers for unknown fields: {}", ids.join(", "));
    }
}

fn run_render(form_path: &Path, answers_path: Option<&Path>, mode: RenderMode) -> CliResult<()> {
    let definition: FormDefinition = read_json(form_path)?;
    let answers: AnswerMap = match answers_path {
        Some(path) => read_json(path)?,
        None => AnswerMap::new(),
    };
    let payload = build_render_payload(
        &definition.form,
        &definition.public_fields(),
        &answers,
        None,
    );
    match render_payload(&payload, mode.into())? {
        RenderedForm::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        RenderedForm::Text(text) | RenderedForm::Html(text) => println!("{text}"),
    }
    Ok(())
}

fn run_export(
    form_paths: &[PathBuf],
    submissions_path: &Path,
    search: Option<String>,
    out: Option<&Path>,
) -> CliResult<()> {
    let mut fields = Vec::new();
    for path in form_paths {
        let definition: FormDefinition = read_json(path)?;
        fields.extend(definition.ordered_fields());
    }
    let records: Vec<SubmissionRecord> = read_json(submissions_path)?;
    let query = SubmissionQuery {
        search,
        ..SubmissionQuery::default()
    };
    let records = apply_query(records, &query);
    let sheet = build_sheet(&records, &fields);

    match out {
        Some(path) => {
            let file = fs::File::create(path)?;
            write_csv(&sheet, io::BufWriter::new(file))?;
            info!(rows = sheet.rows.len(), path = %path.display(), "export written");
        }
        None => {
            let stdout = io::stdout();
            write_csv(&sheet, stdout.lock())?;
        }
    }
    Ok(())
}

fn run_templates(key: Option<&str>) -> CliResult<()> {
    match key {
        Some(key) => {
            let template = find_template(key).ok_or_else(|| format!("unknown template '{key}'"))?;
            println!("{}", serde_json::to_string_pretty(&template)?);
        }
        None => {
            for template in builtin_templates() {
                println!(
                    "{:<16} {} ({} fields)",
                    template.key,
                    template.name,
                    template.fields.len()
                );
            }
        }
    }
    Ok(())
}

fn run_hash_password(password: Option<String>) -> CliResult<()> {
    let password = match password {
        Some(password) => password,
        None => {
            eprint!("Password: ");
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        return Err("password cannot be empty".into());
    }
    let hash = form_web::auth::hash_password(&password).map_err(|err| err.to_string())?;
    println!("{hash}");
    Ok(())
}
