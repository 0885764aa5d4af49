use std::fs;
use std::io;
use std::io::BufRead;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use gogo_core::config::Config;
use gogo_core::conversation::ConversationEvent;
use gogo_core::conversation::ConversationLog;
use gogo_core::conversation::OutcomeStatus;
use gogo_core::Proposal;
use gogo_exec::AuthenticatedIdentity;
use gogo_exec::CommandSuggestionSource;
use gogo_exec::GhIdentity;
use gogo_exec::GitCli;
use gogo_exec::IssueRef;
use gogo_exec::Pipeline;
use gogo_exec::SelectionPrompt;
use gogo_exec::SuggestionSource;
use gogo_exec::VersionControl;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(name = "gogo", version, about)]
struct Cli {
    /// Config file; defaults to `<config dir>/gogo/config.toml`.
    #[arg(long, global = true, env = "GOGO_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a suggestion and print the canonical proposal JSON.
    Parse {
        /// Read from this file instead of stdin.
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Mode::Auto)]
        mode: Mode,
    },
    /// Apply a suggestion to a repository and commit it.
    Apply {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Mode::Auto)]
        mode: Mode,
        /// Offer other unstaged paths for inclusion in the commit.
        #[arg(long)]
        interactive: bool,
        /// Switch to (or create) this branch first.
        #[arg(long)]
        branch: Option<String>,
        #[command(flatten)]
        commit: CommitArgs,
    },
    /// Ask the suggestion source to fix an issue, then apply the answer.
    Suggest {
        #[arg(long)]
        org: String,
        #[arg(long)]
        repo: String,
        #[arg(long)]
        issue: u64,
        /// Existing checkout; defaults to `<base_dir>/<org>/<repo>`, cloned when missing.
        #[arg(long)]
        repo_path: Option<PathBuf>,
        #[arg(long)]
        interactive: bool,
        #[command(flatten)]
        commit: CommitArgs,
    },
    /// Print the GitHub login the tooling is authenticated as.
    Whoami,
}

#[derive(Debug, Clone, Default, clap::Args)]
struct CommitArgs {
    /// Commit message for suggestions that do not carry one.
    #[arg(long, short = 'm')]
    message: Option<String>,
    /// Push the branch to `origin` after committing.
    #[arg(long)]
    push: bool,
}

/// How a raw suggestion is turned into a commit.
#[derive(Debug, Clone)]
struct ApplyOptions {
    mode: Mode,
    interactive: bool,
    message: Option<String>,
    push: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Auto,
    Structured,
    Text,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> CliResult<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Parse { input, mode } => {
            let raw = read_input(input.as_deref())?;
            let proposal = parse_with_mode(&raw, mode)?;
            println!("{}", proposal.to_json()?);
            Ok(())
        }
        Command::Apply {
            repo,
            input,
            mode,
            interactive,
            branch,
            commit,
        } => {
            let interactive = interactive || config.workspace.interactive;
            if interactive && input.is_none() {
                // The selection prompt reads its answer from stdin too.
                return Err("interactive apply needs --input FILE".into());
            }
            let raw = read_input(input.as_deref())?;
            let git = GitCli::open(&repo)?;
            if let Some(branch) = branch.as_deref() {
                git.switch_or_create_branch(branch)?;
            }
            let mut log = ConversationLog::open(git.root())?;
            let options = ApplyOptions {
                mode,
                interactive,
                message: commit.message,
                push: commit.push,
            };
            let commit_id = apply_response(&git, &mut log, &raw, &options)?;
            println!("{commit_id}");
            Ok(())
        }
        Command::Suggest {
            org,
            repo,
            issue,
            repo_path,
            interactive,
            commit,
        } => {
            let request = IssueRef { org, repo, issue };
            let checkout = match repo_path {
                Some(path) => path,
                None => gogo_exec::ensure_checkout(
                    &config.workspace.base_dir,
                    &request.org,
                    &request.repo,
                )?,
            };
            let git = GitCli::open(&checkout)?;
            if config.workspace.branch_per_issue {
                git.switch_or_create_branch(&request.fix_branch())?;
            }

            let source = CommandSuggestionSource::from_config(&config.suggestion)?;
            let mut log = ConversationLog::open(git.root())?;
            log.append(ConversationEvent::Prompt {
                text: source.prompt_for(&request),
            })?;
            let raw = match source.suggest(&request) {
                Ok(raw) => raw,
                Err(err) => {
                    record_failure(&mut log, &err);
                    return Err(err.into());
                }
            };
            let options = ApplyOptions {
                mode: Mode::Auto,
                interactive: interactive || config.workspace.interactive,
                message: Some(
                    commit
                        .message
                        .unwrap_or_else(|| default_commit_message(&request)),
                ),
                push: commit.push,
            };
            let commit_id = apply_response(&git, &mut log, &raw, &options)?;
            println!("{commit_id}");
            Ok(())
        }
        Command::Whoami => {
            println!("{}", GhIdentity::default().username()?);
            Ok(())
        }
    }
}

fn load_config(explicit: Option<&Path>) -> CliResult<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir() {
            Some(dir) => dir.join("gogo").join("config.toml"),
            None => return Ok(Config::default()),
        },
    };
    Ok(Config::load(&path)?)
}

fn read_input(input: Option<&Path>) -> io::Result<String> {
    match input {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            Ok(raw)
        }
    }
}

fn parse_with_mode(raw: &str, mode: Mode) -> gogo_core::Result<Proposal> {
    match mode {
        Mode::Auto => Ok(gogo_core::parse(raw)),
        Mode::Structured => gogo_core::parse_structured(raw),
        Mode::Text => Ok(gogo_core::parse_text(raw).into_proposal()),
    }
}

fn default_commit_message(request: &IssueRef) -> String {
    format!("Proposed fix for {request}")
}

/// Fill in `message` when the suggestion itself carries no commit message.
fn with_fallback_message(mut proposal: Proposal, message: Option<&str>) -> Proposal {
    if proposal.commit_message().is_none() {
        if let Some(message) = message {
            proposal.set_commit_message(Some(message.to_string()));
        }
    }
    proposal
}

/// Parse, apply and commit one raw suggestion. Returns the new commit id.
fn apply_response(
    git: &GitCli,
    log: &mut ConversationLog,
    raw: &str,
    options: &ApplyOptions,
) -> CliResult<String> {
    log.append(ConversationEvent::Response {
        text: raw.to_string(),
    })?;

    let outcome = parse_with_mode(raw, options.mode).and_then(|proposal| {
        let proposal = with_fallback_message(proposal, options.message.as_deref());
        let prompt = TerminalPrompt;
        let mut pipeline = Pipeline::new(git);
        if options.interactive {
            pipeline = pipeline.interactive(&prompt);
        }
        pipeline.run(&proposal)
    });

    let report = match outcome {
        Ok(report) => report,
        Err(err) => {
            record_failure(log, &err);
            return Err(err.into());
        }
    };
    log.append(ConversationEvent::Outcome {
        status: OutcomeStatus::Committed,
        detail: report.commit_id.clone(),
    })?;
    if options.push {
        git.push_current_branch()?;
    }
    Ok(report.commit_id)
}

fn record_failure(log: &mut ConversationLog, err: &gogo_core::GogoError) {
    let event = ConversationEvent::Outcome {
        status: OutcomeStatus::Failed,
        detail: format!("{}: {err}", err.step()),
    };
    if let Err(write_err) = log.append(event) {
        tracing::warn!(path = %log.path().display(), error = %write_err, "failed to record outcome");
    }
}

/// Lists candidates on stdout and reads one answer line from stdin.
struct TerminalPrompt;

impl SelectionPrompt for TerminalPrompt {
    fn select(&self, candidates: &[String]) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(render_candidates(candidates).as_bytes())?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

fn render_candidates(candidates: &[String]) -> String {
    let mut text = String::from("Other changed files:\n");
    for (index, path) in candidates.iter().enumerate() {
        text.push_str(&format!("  {}. {path}\n", index + 1));
    }
    text.push_str("Stage which? (comma-separated numbers, 'all' or 'none'): ");
    text
}
