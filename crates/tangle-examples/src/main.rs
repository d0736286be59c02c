use facet::Facet;
use figue as args;
use tracing_subscriber::EnvFilter;

mod scenarios;

type AnyResult<T> = Result<T, String>;

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    #[facet(args::subcommand)]
    command: CommandKind,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum CommandKind {
    LockOrderInversion,
    RecursiveReentry,
    Contention {
        #[facet(args::named, default)]
        threads: Option<u32>,
        #[facet(args::named, default)]
        iterations: Option<u32>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> AnyResult<()> {
    let cli = parse_cli()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dispatch_command(cli.command)
}

fn parse_cli() -> AnyResult<Cli> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("tangle-examples")
                .description("Run tangle lock scenarios as subcommands")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();

    args::Driver::new(figue_config)
        .run()
        .into_result()
        .map(|v| v.value)
        .map_err(|e| e.to_string())
}

fn dispatch_command(command: CommandKind) -> AnyResult<()> {
    match command {
        CommandKind::LockOrderInversion => scenarios::lock_order_inversion::run(),
        CommandKind::RecursiveReentry => scenarios::recursive_reentry::run(),
        CommandKind::Contention {
            threads,
            iterations,
        } => scenarios::contention::run(threads.unwrap_or(4), iterations.unwrap_or(10_000)),
    }
}
