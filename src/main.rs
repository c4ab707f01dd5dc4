use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use doc_suggest::{
    ApplyRequest, ApplyResponse, BatchPolicy, Config, DocumentStore, DocumentStoreClient,
    EditSuggestion, ExecutionLog, ExecutionLogEntry, HttpSessionProvider, LineEdit, NewProject,
    ReviewRequest, ReviewSession, SaveDocument, Session, Targeted, apply_edits, group_by_file,
    handle_callback, read_file,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Review and apply line-level edit suggestions to project documents
#[derive(Parser, Debug)]
#[command(name = "doc-suggest")]
#[command(version = "0.1.0")]
#[command(about = "Line-level edit suggestions for project documents", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.doc-suggest/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Document store API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Access token for the document store
    #[arg(long, global = true)]
    token: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a batch of line edits to a local file
    Apply(ApplyArgs),
    /// Accept or reject suggestions for a local file
    Review(ReviewArgs),
    /// Print a document from the store
    Fetch {
        #[arg(long)]
        project: String,
        #[arg(long)]
        file_id: String,
    },
    /// Save a local file to the store
    Push {
        #[arg(long)]
        project: String,
        #[arg(long)]
        file_id: String,
        /// Local file whose content is saved
        #[arg(short, long)]
        file: PathBuf,
        /// File name recorded with the document
        #[arg(long)]
        filename: Option<String>,
    },
    /// Manage projects
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Exchange a login code and print where the browser goes next
    Callback {
        /// Dashboard origin, e.g. https://app.example.com
        #[arg(long)]
        origin: String,
        #[arg(long)]
        code: Option<String>,
        #[arg(long, default_value = "")]
        verifier: String,
        #[arg(long)]
        next: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Template to initialize the project from
        #[arg(long)]
        template: Option<String>,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// File to transform
    #[arg(short, long)]
    file: PathBuf,

    /// JSON file containing the edit request (omit to read from stdin)
    #[arg(short, long)]
    edits: Option<PathBuf>,

    /// Only apply edits whose filePath matches (defaults to edits that
    /// name no file or name --file)
    #[arg(long)]
    file_path: Option<String>,

    /// What to do with invalid or conflicting edits
    #[arg(long, value_enum)]
    policy: Option<BatchPolicy>,

    /// Output structured JSON instead of human-readable
    #[arg(short, long)]
    json: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rewrite the input file with the edited content
    #[arg(short, long)]
    write: bool,

    /// Append a record of the run to this JSON-lines log
    #[arg(long)]
    log: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReviewArgs {
    /// File the suggestions were written against
    #[arg(short, long)]
    file: PathBuf,

    /// JSON array of suggestions; statuses are written back to it
    #[arg(short, long)]
    suggestions: PathBuf,

    /// Suggestion ids to accept
    #[arg(long, value_delimiter = ',')]
    accept: Vec<String>,

    /// Suggestion ids to reject
    #[arg(long, value_delimiter = ',')]
    reject: Vec<String>,

    /// Accept every pending suggestion
    #[arg(long)]
    accept_all: bool,

    /// JSON review request ({"accept": [...], "reject": [...], "acceptAll": bool});
    /// combined with the flags above
    #[arg(long)]
    decisions: Option<PathBuf>,

    /// Write the reviewed document here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rewrite the input file with the reviewed document
    #[arg(short, long)]
    write: bool,

    /// Save the reviewed document to this store project
    #[arg(long, requires = "file_id")]
    project: Option<String>,

    #[arg(long, requires = "project")]
    file_id: Option<String>,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "doc_suggest=debug"
        } else {
            "doc_suggest=warn"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(token) = cli.token {
        config.access_token = Some(token);
    }

    match cli.command {
        Command::Apply(args) => run_apply(&config, args),
        Command::Review(args) => run_review(&config, args).await,
        Command::Fetch { project, file_id } => {
            let session = config.session()?;
            let store = DocumentStoreClient::new(&config.api_url)?;
            let document = store
                .fetch_document(&session, &project, &file_id)
                .await
                .with_context(|| format!("Failed to fetch {}/{}", project, file_id))?;
            print!("{}", document.content);
            Ok(ExitCode::SUCCESS)
        }
        Command::Push {
            project,
            file_id,
            file,
            filename,
        } => {
            let content = read_file(&file)?.document.to_text();
            let store = DocumentStoreClient::new(&config.api_url)?;
            save(&store, &config, &project, &file_id, content, filename).await?;
            println!("Saved {} to {}/{}", file.display(), project, file_id);
            Ok(ExitCode::SUCCESS)
        }
        Command::Projects { action } => run_projects(&config, action).await,
        Command::Callback {
            origin,
            code,
            verifier,
            next,
        } => {
            let provider = HttpSessionProvider::new(&config.auth_url, config.api_key.clone())?;
            let outcome = handle_callback(
                &provider,
                &origin,
                code.as_deref(),
                &verifier,
                next.as_deref(),
            )
            .await;
            println!("Location: {}", outcome.location);
            match outcome.session {
                Some(session) => {
                    println!("{}", serde_json::to_string_pretty(&session)?);
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(ExitCode::FAILURE),
            }
        }
    }
}

/// Read the edit request from a file, or stdin when no path is given
fn read_edit_request(path: Option<&Path>) -> Result<ApplyRequest> {
    let json_str = match path {
        Some(p) => fs::read_to_string(p)
            .with_context(|| format!("Failed to read edit request {}", p.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    serde_json::from_str(&json_str).context("Invalid edit request")
}

fn run_apply(config: &Config, args: ApplyArgs) -> Result<ExitCode> {
    let request = read_edit_request(args.edits.as_deref())?;
    let execution_id = request.resolved_execution_id();
    let policy = args.policy.unwrap_or(config.policy);

    let edits: Vec<LineEdit> = match &args.file_path {
        Some(target) => group_by_file(&request.edits)
            .remove(target)
            .unwrap_or_default(),
        None => {
            let (own, other): (Vec<LineEdit>, Vec<LineEdit>) = request
                .edits
                .iter()
                .cloned()
                .partition(|edit| targets_file(edit, &args.file));
            if !other.is_empty() {
                warn!(
                    count = other.len(),
                    file = %args.file.display(),
                    "ignoring edits for other files"
                );
            }
            own
        }
    };

    let file_content = match read_file(&args.file) {
        Ok(content) => content,
        Err(e) => {
            let response = ApplyResponse::failure(
                execution_id,
                format!("Failed to read file '{}': {}", args.file.display(), e),
            );
            output_response(&response, args.json, args.output.as_deref())?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let response = match apply_edits(
        &file_content.document,
        &edits,
        policy,
        request.expected_checksum.as_deref(),
    ) {
        Ok(result) => {
            if args.write {
                fs::write(&args.file, result.document.to_text())
                    .with_context(|| format!("Failed to write {}", args.file.display()))?;
            }
            if let Some(log) = &args.log {
                let entry = ExecutionLogEntry {
                    execution_id: execution_id.clone(),
                    timestamp: Utc::now(),
                    file: file_content.path.clone(),
                    checksum_before: file_content.checksum.clone(),
                    checksum_after: result.final_checksum.clone(),
                    applied_count: result.applied_count,
                    skipped_count: result.skipped_count,
                    conflict_count: result.conflict_count,
                };
                ExecutionLog::append(log, &entry)
                    .with_context(|| format!("Failed to append to {}", log.display()))?;
            }
            ApplyResponse::success(execution_id, &edits, &result)
        }
        Err(e) => ApplyResponse::failure(execution_id, format!("Failed to apply edits: {}", e)),
    };

    output_response(&response, args.json, args.output.as_deref())?;

    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Check whether an edit is meant for `file`
///
/// Edits naming no file belong to every file; otherwise the named path
/// must match `file` or a trailing part of it.
fn targets_file<T: Targeted>(edit: &T, file: &Path) -> bool {
    let target = edit.file_path();
    target.is_empty() || file.ends_with(target)
}

/// Format and write the response
fn output_response(response: &ApplyResponse, json_mode: bool, output_path: Option<&Path>) -> Result<()> {
    let output = if json_mode {
        serde_json::to_string_pretty(response)?
    } else {
        response.render_text()
    };

    match output_path {
        Some(path) => fs::write(path, &output)
            .with_context(|| format!("Failed to write output to '{}'", path.display())),
        None => {
            println!("{}", output);
            Ok(())
        }
    }
}

async fn run_review(config: &Config, args: ReviewArgs) -> Result<ExitCode> {
    let base = read_file(&args.file)?.document;
    let raw = fs::read_to_string(&args.suggestions)
        .with_context(|| format!("Failed to read suggestions {}", args.suggestions.display()))?;
    let suggestions: Vec<EditSuggestion> =
        serde_json::from_str(&raw).context("Invalid suggestions file")?;

    let mut request: ReviewRequest = match &args.decisions {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read review request {}", path.display()))?;
            serde_json::from_str(&raw).context("Invalid review request")?
        }
        None => ReviewRequest::default(),
    };
    request.accept.extend(args.accept);
    request.reject.extend(args.reject);
    request.accept_all |= args.accept_all;

    let mut session = ReviewSession::new(base, suggestions)?;
    let report = request.run(&mut session);
    for failure in &report.failed {
        warn!(id = %failure.id, reason = %failure.reason, "review decision failed");
        eprintln!("{}", failure.reason);
    }
    let failed = report.failed.len();

    for suggestion in session.suggestions() {
        println!("{}\t{}\tline {}", suggestion.id, suggestion.status, suggestion.edit.position.line);
    }

    let (document, suggestions) = session.into_parts();
    fs::write(&args.suggestions, serde_json::to_string_pretty(&suggestions)?)
        .with_context(|| format!("Failed to write {}", args.suggestions.display()))?;

    let text = document.to_text();
    if let Some(path) = &args.output {
        fs::write(path, &text).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    if args.write {
        fs::write(&args.file, &text)
            .with_context(|| format!("Failed to write {}", args.file.display()))?;
    }
    if let (Some(project), Some(file_id)) = (&args.project, &args.file_id) {
        let store = DocumentStoreClient::new(&config.api_url)?;
        save(&store, config, project, file_id, text, None).await?;
    }

    println!("Document: {} line(s), checksum {}", document.line_count(), document.checksum());

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn save(
    store: &impl DocumentStore,
    config: &Config,
    project: &str,
    file_id: &str,
    content: String,
    filename: Option<String>,
) -> Result<()> {
    let session = config.session()?;
    store
        .save_document(&session, project, file_id, &SaveDocument { content, filename })
        .await
        .with_context(|| format!("Failed to save {}/{}", project, file_id))?;
    Ok(())
}

async fn run_projects(config: &Config, action: ProjectAction) -> Result<ExitCode> {
    let session = config.session()?;
    let store = DocumentStoreClient::new(&config.api_url)?;
    manage_projects(&store, &session, config, action).await?;
    Ok(ExitCode::SUCCESS)
}

async fn manage_projects(
    store: &impl DocumentStore,
    session: &Session,
    config: &Config,
    action: ProjectAction,
) -> Result<()> {
    match action {
        ProjectAction::List => {
            for project in store.list_projects(session).await? {
                println!("{}\t{}", project.id, project.name);
            }
        }
        ProjectAction::Create {
            name,
            description,
            template,
        } => {
            let registry = config.template_registry();
            let resolved = registry.require(template.as_deref())?.cloned();
            let project = store
                .create_project(
                    session,
                    &NewProject {
                        name,
                        description,
                        template: resolved,
                    },
                )
                .await?;
            println!("{}\t{}", project.id, project.name);
        }
        ProjectAction::Delete { id } => {
            store.delete_project(session, &id).await?;
            println!("Deleted {}", id);
        }
    }

    Ok(())
}
