use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use folio_lib::{Repository, flows::FlowError, pages::Page};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod account;
mod page;
mod profile;

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Show underlying error details
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Sign in to an existing account
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// View or edit your profile
    #[command(subcommand)]
    Profile(profile::Command),
    /// Show one of the static pages
    Page {
        #[arg(value_enum, default_value_t = Page::Home)]
        page: Page,
    },
}

fn main() -> ExitCode {
    // Human friendly panicking in release mode
    human_panic::setup_panic!();

    // Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();

    let repo = match Repository::new() {
        Ok(repo) => repo,
        Err(e) => {
            eprintln!("{} {e}", "Could not open the database:".red().bold());
            return sysexits::ExitCode::Unavailable.into();
        }
    };
    if cli.debug {
        repo.cfg().write().set_debug(true);
    }
    let debug = repo.cfg().read().debug();

    let result = match &cli.command {
        Command::Signup {
            name,
            email,
            password,
        } => account::signup(&repo, name, email, password),
        Command::Login { email, password } => account::login(&repo, email, password),
        Command::Logout => account::logout(),
        Command::Profile(cmd) => profile::handle(&repo, cmd),
        Command::Page { page } => page::show(&repo, *page),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err.message(debug).red());
            exit_code(&err).into()
        }
    }
}

fn exit_code(err: &FlowError) -> sysexits::ExitCode {
    match err {
        FlowError::Validation(_) | FlowError::DuplicateIdentity => sysexits::ExitCode::DataErr,
        FlowError::InvalidCredentials | FlowError::NotSignedIn => sysexits::ExitCode::NoPerm,
        FlowError::StoreUnavailable(_) => sysexits::ExitCode::Unavailable,
        FlowError::PostLoginVerification => sysexits::ExitCode::TempFail,
        FlowError::SignupFailed(_) | FlowError::Unexpected(_) => sysexits::ExitCode::Software,
    }
}
