use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

mod context;

use context::{Context, SourceArgs};

#[derive(Parser)]
#[command(name = "consentctl", version, about = "Evaluate data sharing consent")]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    /// Output machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args, Debug)]
struct CourseArgs {
    /// Learner username
    #[arg(long)]
    user: String,
    /// Course key
    #[arg(long)]
    course: String,
    /// Enterprise customer UUID
    #[arg(long)]
    customer: Uuid,
}

#[derive(Args, Debug)]
struct ScopeArgs {
    /// Learner username
    #[arg(long)]
    user: String,
    /// Enterprise customer UUID
    #[arg(long)]
    customer: Uuid,
    /// Course key; takes precedence over --program
    #[arg(long)]
    course: Option<String>,
    /// Program UUID
    #[arg(long)]
    program: Option<Uuid>,
}

#[derive(Subcommand)]
enum Commands {
    /// Whether the learner has granted consent for a course
    Granted(CourseArgs),
    /// Whether the customer requires consent for a course
    Required(CourseArgs),
    /// Show the consent record for a course or program
    Record(ScopeArgs),
    /// Grant (or revoke) consent and write it back to the fixture
    Grant {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Revoke instead of grant
        #[arg(long)]
        revoke: bool,
    },
    /// Print version and exit
    Version,
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_flag(json: bool, name: &str, value: bool) {
    if json {
        println!("{}", serde_json::json!({ name: value }));
    } else {
        println!("{}", value);
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let load = || Context::load(&cli.source);

    match cli.cmd {
        Commands::Granted(args) => {
            let ctx = load()?;
            let granted = ctx
                .policy
                .is_granted(&args.user, &args.course, &args.customer)?;
            print_flag(cli.json, "granted", granted);
        }
        Commands::Required(args) => {
            let ctx = load()?;
            let required = ctx
                .policy
                .is_required(&args.user, &args.course, &args.customer)?;
            print_flag(cli.json, "required", required);
        }
        Commands::Record(args) => {
            let ctx = load()?;
            let consent = ctx.policy.get_consent_record(
                &args.user,
                &args.customer,
                args.course.as_deref(),
                args.program.as_ref(),
            )?;
            println!("{}", serde_json::to_string_pretty(&consent)?);
        }
        Commands::Grant { scope, revoke } => {
            let ctx = load()?;
            let consent = ctx.policy.record_consent(
                &scope.user,
                &scope.customer,
                scope.course.as_deref(),
                scope.program.as_ref(),
                !revoke,
            )?;
            match consent {
                Some(consent) => {
                    ctx.persist()?;
                    println!("{}", serde_json::to_string_pretty(&consent)?);
                }
                None => {
                    eprintln!(
                        "No consent recorded: unknown customer {} or empty scope",
                        scope.customer
                    );
                    std::process::exit(2);
                }
            }
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}
