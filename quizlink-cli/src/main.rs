use clap::{Parser, Subcommand, ValueEnum};
use quizlink_cli::infrastructure::{LogConfig, OwnedEmotes, QuestionBank, StatsFile};
use quizlink_cli::{game_io, CliError, Result};
use quizlink_core::traits::QuestionSource;
use quizlink_core::{Role, Session, TOTAL_QUESTIONS};
use quizlink_p2p::{
    BeaconConfig, BeaconTransport, EstablishedLink, GroupConfig, GroupTransport, PeerRef,
    RuntimeHandle, SessionRuntime, Transport, TransportEvent,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(name = "quizlink")]
#[command(version, about = "Two-player trivia over ad-hoc peer-to-peer links")]
struct Cli {
    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play alone against the clock
    Single {
        /// Display name
        #[arg(short, long, default_value = "Player")]
        name: String,

        /// JSON file with a custom question pool
        #[arg(long)]
        questions: Option<PathBuf>,

        /// Where player statistics are kept
        #[arg(long, default_value = "quizlink-stats.json")]
        stats: PathBuf,
    },

    /// Accept an inbound opponent
    Host {
        #[arg(short, long, default_value = "Player")]
        name: String,

        #[arg(short, long, value_enum, default_value = "beacon")]
        transport: TransportArg,

        /// Data port to serve on (defaults per transport)
        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        questions: Option<PathBuf>,

        #[arg(long, default_value = "quizlink-stats.json")]
        stats: PathBuf,

        /// Extra owned emotes, repeatable
        #[arg(long = "emote")]
        emotes: Vec<String>,
    },

    /// Discover an opponent and connect
    Join {
        #[arg(short, long, default_value = "Player")]
        name: String,

        #[arg(short, long, value_enum, default_value = "beacon")]
        transport: TransportArg,

        /// Skip discovery and dial this address directly
        #[arg(long)]
        peer: Option<String>,

        #[arg(long)]
        questions: Option<PathBuf>,

        #[arg(long, default_value = "quizlink-stats.json")]
        stats: PathBuf,

        #[arg(long = "emote")]
        emotes: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TransportArg {
    Beacon,
    Group,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = if cli.verbose {
        LogConfig::dev()
    } else {
        LogConfig::quiet()
    };
    if let Err(err) = log.init() {
        eprintln!("{err}");
    }

    match cli.command {
        Commands::Single {
            name,
            questions,
            stats,
        } => run_single(name, questions, stats).await,
        Commands::Host {
            name,
            transport,
            port,
            questions,
            stats,
            emotes,
        } => {
            run_peer(PeerArgs {
                name,
                transport,
                port,
                peer: None,
                questions,
                stats,
                emotes,
                listen: true,
            })
            .await
        }
        Commands::Join {
            name,
            transport,
            peer,
            questions,
            stats,
            emotes,
        } => {
            run_peer(PeerArgs {
                name,
                transport,
                port: None,
                peer,
                questions,
                stats,
                emotes,
                listen: false,
            })
            .await
        }
    }
}

async fn run_single(name: String, questions: Option<PathBuf>, stats: PathBuf) -> Result<()> {
    let mut bank = open_bank(questions)?;
    let session = Session::single(bank.load_random_questions(TOTAL_QUESTIONS)?, &name)?;

    let (runtime, handle) = SessionRuntime::single(
        session,
        Box::new(StatsFile::load(stats)),
        Box::new(OwnedEmotes::default()),
    );
    finish(runtime, handle).await
}

struct PeerArgs {
    name: String,
    transport: TransportArg,
    port: Option<u16>,
    peer: Option<String>,
    questions: Option<PathBuf>,
    stats: PathBuf,
    emotes: Vec<String>,
    listen: bool,
}

async fn run_peer(args: PeerArgs) -> Result<()> {
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let mut transport: Box<dyn Transport> = match args.transport {
        TransportArg::Beacon => {
            let mut config = BeaconConfig::new(&args.name);
            if let Some(port) = args.port {
                config.tcp_port = port;
            }
            Box::new(BeaconTransport::new(config, events_tx))
        }
        TransportArg::Group => {
            let mut config = GroupConfig::new(&args.name);
            if let Some(port) = args.port {
                config.tcp_port = port;
            }
            Box::new(GroupTransport::new(config, events_tx))
        }
    };

    if args.listen {
        transport.listen().await?;
        println!("Waiting for an opponent...");
    } else if let Some(address) = &args.peer {
        println!("Connecting to {address}...");
        transport.connect(&PeerRef::new("opponent", address.clone())).await?;
    } else {
        transport.start_discovery().await?;
        println!("Scanning for opponents...");
    }

    let link = wait_for_link(&mut transport, &mut events_rx).await?;
    println!(
        "Connected to {} over {} ({})",
        link.peer_name,
        link.kind,
        if link.is_host() { "hosting" } else { "joined" }
    );

    // The negotiation decides who hosts; only the host owns questions
    let session = match link.role {
        Role::Host => {
            let mut bank = open_bank(args.questions)?;
            Session::host(bank.load_random_questions(TOTAL_QUESTIONS)?, &args.name)?
        }
        Role::Client => Session::client(&args.name),
    };

    let (runtime, handle) = SessionRuntime::versus(
        link,
        session,
        transport,
        events_rx,
        Box::new(StatsFile::load(args.stats)),
        Box::new(OwnedEmotes::default().with_extra(&args.emotes)),
    );
    finish(runtime, handle).await
}

/// Consume setup-phase events until the link is established.
///
/// The scanning side connects to the first peer discovery surfaces; a
/// failed or dropped setup is terminal (the user decides whether to retry).
async fn wait_for_link(
    transport: &mut Box<dyn Transport>,
    events: &mut mpsc::Receiver<TransportEvent>,
) -> Result<EstablishedLink> {
    let mut dialing = false;
    loop {
        let event = events
            .recv()
            .await
            .ok_or_else(|| CliError::Setup("transport closed during setup".to_string()))?;

        if let Some(link) = EstablishedLink::from_event(&event) {
            return Ok(link);
        }
        match event {
            TransportEvent::DeviceFound(peer) => {
                if dialing {
                    info!(%peer, "also found");
                    continue;
                }
                dialing = true;
                println!("Found {peer}, connecting...");
                transport.connect(&peer).await?;
            }
            TransportEvent::DeviceLost(address) => {
                println!("Lost {address}");
            }
            TransportEvent::ConnectionFailed(reason) => {
                return Err(CliError::Setup(reason));
            }
            TransportEvent::Disconnected(reason) => {
                return Err(CliError::Setup(reason));
            }
            _ => {}
        }
    }
}

async fn finish(runtime: SessionRuntime, handle: RuntimeHandle) -> Result<()> {
    let session_task = tokio::spawn(runtime.run());
    game_io::drive(handle).await;

    let outcome = session_task
        .await
        .map_err(|e| CliError::Setup(e.to_string()))??;
    info!(?outcome, "session complete");
    Ok(())
}

fn open_bank(path: Option<PathBuf>) -> Result<QuestionBank> {
    match path {
        Some(path) => Ok(QuestionBank::from_file(&path)?),
        None => Ok(QuestionBank::builtin()),
    }
}
