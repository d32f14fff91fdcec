use clap::Parser;
use speak_anywhere::config::Config;
use speak_anywhere::daemon;
use speak_anywhere::ipc::client::{default_socket_path, send_command};
use speak_anywhere::ipc::protocol::{Request, Response};
use speak_anywhere::output::OutputMethod;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "speak-anywhere", version, about = "Push-to-talk dictation for Wayland")]
struct Cli {
    /// Daemon socket path (defaults to $XDG_RUNTIME_DIR/speak-anywhere.sock)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the daemon in the foreground
    Daemon {
        /// Config file path (default: ~/.config/speak-anywhere/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Start recording
    Start {
        /// Where to deliver the transcript
        #[arg(long, value_enum)]
        output: Option<OutputMethod>,
    },
    /// Stop recording and print the transcript
    Stop,
    /// Start if idle, stop if recording
    Toggle {
        /// Where to deliver the transcript
        #[arg(long, value_enum)]
        output: Option<OutputMethod>,
    },
    /// Show daemon status
    Status,
    /// Show recent transcriptions
    History {
        /// How many entries to show
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon { config, verbose } => run_daemon(cli.socket, config, verbose),
        Commands::Start { output } => run_client(cli.socket, Request::Start { output }),
        Commands::Stop => run_client(cli.socket, Request::Stop),
        Commands::Toggle { output } => run_client(cli.socket, Request::Toggle { output }),
        Commands::Status => run_client(cli.socket, Request::Status),
        Commands::History { limit } => run_client(
            cli.socket,
            Request::History {
                limit: Some(limit),
            },
        ),
    }
}

/// Build the single-threaded runtime the daemon's dispatcher runs on. The
/// command client uses the same thing since it has one connection to drive.
fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

fn run_daemon(socket: Option<PathBuf>, config_path: Option<PathBuf>, verbose: bool) -> ExitCode {
    init_logging(verbose);

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("speak-anywhere: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("speak-anywhere: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(daemon::run(config, socket)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("speak-anywhere: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>) -> speak_anywhere::error::Result<Config> {
    match path {
        Some(path) => Config::load(&path),
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path),
            None => Ok(Config::default_with_agents()),
        },
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose {
        "speak_anywhere=debug"
    } else {
        "speak_anywhere=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_client(socket: Option<PathBuf>, request: Request) -> ExitCode {
    let socket_path = socket.unwrap_or_else(default_socket_path);

    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("speak-anywhere: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let response = match rt.block_on(send_command(&socket_path, request)) {
        Ok(response) => response,
        Err(e) => {
            eprintln!("speak-anywhere: {}", e);
            eprintln!("Is the daemon running?");
            return ExitCode::FAILURE;
        }
    };

    render_response(response)
}

fn render_response(response: Response) -> ExitCode {
    match response {
        Response::Ok {
            state: Some(state),
            duration,
            ..
        } => {
            println!("State: {}", state);
            if let Some(duration) = duration {
                println!("Recording duration: {:.1}s", duration);
            }
            ExitCode::SUCCESS
        }
        Response::Ok {
            entries: Some(entries),
            ..
        } => {
            for entry in entries {
                println!("[{}] {}", entry.timestamp, entry.text);
                if let Some(context) = entry.app_context {
                    println!("  Context: {}", context);
                }
            }
            ExitCode::SUCCESS
        }
        Response::Ok {
            text: Some(text), ..
        } => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Response::Ok { .. } => {
            println!("OK");
            ExitCode::SUCCESS
        }
        Response::Error { message } => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
        // Internal sentinel; a correct daemon never sends it.
        Response::Transcribing { .. } => {
            eprintln!("Error: unexpected response from daemon");
            ExitCode::FAILURE
        }
    }
}
