// livecodec worker
// Sets up a worker codec from configuration and prints the installed type registry

use anyhow::{bail, Context, Result};
use clap::Parser;
use livecodec::{
    Agent, Instrumentation, Loader, QualifiedSymbol, RecordType, Var, WorkerConf, WorkerEnv,
    CUSTOMIZER_KEY, DEFAULT_CUSTOMIZER,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "livecodec-worker")]
#[command(about = "Run worker codec setup against the system loader and report the result")]
#[command(version)]
struct Args {
    /// Worker configuration file (TOML)
    #[arg(short, long, env = "LIVECODEC_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Configuration override, `key=value` (repeatable)
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Declare a session record type before setup, `Name:field,field`
    /// (repeatable); declarations go into the `user` namespace
    #[arg(short, long = "declare", value_name = "TYPE")]
    declarations: Vec<String>,

    /// Agent argument string passed to the attach hook
    #[arg(long, default_value = "")]
    agent_args: String,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_conf: bool,
}

fn parse_declaration(declaration: &str) -> Result<RecordType> {
    let Some((name, fields)) = declaration.split_once(':') else {
        bail!("expected Name:field,field, got '{}'", declaration);
    };
    if name.trim().is_empty() {
        bail!("record type name missing in '{}'", declaration);
    }
    let fields: Vec<&str> = fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    Ok(RecordType::new(name.trim(), fields))
}

fn load_conf(args: &Args) -> Result<WorkerConf> {
    let mut conf = match &args.config {
        Some(path) => WorkerConf::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => WorkerConf::new(),
    };
    conf.merge_env(std::env::vars());
    for assignment in &args.overrides {
        conf.apply_override(assignment)?;
    }
    Ok(conf)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("livecodec=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let conf = load_conf(&args)?;

    if args.dump_conf {
        print!("{}", conf.to_toml_string()?);
        return Ok(());
    }

    // Play the host: attach the agent, then push session code through it.
    let system = Loader::system();
    Agent::load(&system)?.agentmain(&args.agent_args, Instrumentation::for_system())?;
    let instrumentation =
        livecodec::agent::instrumentation().context("instrumentation missing after attach")?;

    for declaration in &args.declarations {
        let record_type = parse_declaration(declaration)?;
        let symbol = QualifiedSymbol::new("user", record_type.name().as_str())?;
        info!(%symbol, "declaring record type");
        instrumentation.redefine(&symbol, Var::Type(record_type))?;
    }

    let env = WorkerEnv::new(conf, instrumentation.loader().clone());
    println!(
        "customizer: {}",
        env.conf().get_or(CUSTOMIZER_KEY, DEFAULT_CUSTOMIZER)
    );
    let codec = env.codec().context("worker codec setup failed")?;

    let registry = codec.registry();
    println!("{:>4}  {:<20} serializer", "id", "type");
    for registration in registry.registrations() {
        println!(
            "{:>4}  {:<20} {:?}",
            registration.id, registration.type_name, registration.serializer
        );
    }
    Ok(())
}
