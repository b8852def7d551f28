#[macro_use]
extern crate clap;

use clap::{App, ArgMatches};
use env_logger::{from_env, Env};
use pkgbox::{
    containerfile::{as_canonical_json, BuildSpec},
    errors::{Error, RuntimeError},
    image::Reference,
    paths::{self, Paths},
    registry,
    runtime::RuntimeRegistry,
    source::Source,
};

#[tokio::main]
async fn main() {
    let yaml = load_yaml!("cli.yml");
    let matches = App::from_yaml(yaml).get_matches();

    let log_level = matches.value_of("log_level").unwrap();
    from_env(Env::default().default_filter_or(log_level)).init();

    if let Err(err) = run(&matches).await {
        eprintln!("ERR: {}", err);
        std::process::exit(err.exit_code());
    }
}

async fn run(matches: &ArgMatches<'_>) -> Result<(), Error> {
    let paths = Paths::resolve();
    match matches.subcommand() {
        ("version", _) => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        ("init", _) => init(&paths),
        ("info", _) => info(&paths),
        ("build", Some(sub)) => build(&paths, sub).await,
        ("pull", Some(sub)) => pull(&paths, sub).await,
        _ => unreachable!("subcommand is required"),
    }
}

fn print_paths(paths: &Paths) {
    println!("config_dir: {}", paths.config_dir.display());
    println!("data_dir: {}", paths.data_dir.display());
}

fn init(paths: &Paths) -> Result<(), Error> {
    print_paths(paths);
    paths.ensure()?;
    paths::bootstrap(paths)?;
    Ok(())
}

fn info(paths: &Paths) -> Result<(), Error> {
    if !paths.crun_config().is_file() {
        return Err(RuntimeError::Unavailable(
            "pkgbox not initialized, run `pkgbox init` first".to_owned(),
        )
        .into());
    }
    print_paths(paths);
    println!("crun base config: {}", paths.crun_config().display());
    Ok(())
}

async fn build(paths: &Paths, matches: &ArgMatches<'_>) -> Result<(), Error> {
    let source = Source::parse(matches.value_of("source").unwrap());
    let runtime_name = matches.value_of("runtime").unwrap();

    let text = source.read().await?;
    let spec = BuildSpec::parse(&text)?;
    println!("{}", as_canonical_json(&spec, true));

    let backends = RuntimeRegistry::with_defaults(paths);
    let mut runtime = backends.resolve(runtime_name)?;
    runtime.preflight_check()?;
    runtime.prepare_build(&spec)?;

    for outcome in runtime.run_build(&spec)? {
        let outcome = outcome?;
        if outcome.cached {
            log::info!("{} {} (cached)", outcome.context, outcome.digest);
        } else {
            log::info!("{} {} done", outcome.context, outcome.digest);
        }
    }
    Ok(())
}

async fn pull(paths: &Paths, matches: &ArgMatches<'_>) -> Result<(), Error> {
    let reference = Reference::parse(matches.value_of("image").unwrap())?;
    let client = registry::Client::new()?;

    let manifest = client.fetch_manifest(&reference).await?;
    let dest = paths.layer_dir();
    println!("fetching {} layers from \"{}\"...", manifest.layers.len(), reference);
    client.fetch_layers(&reference, &manifest, &dest).await?;
    println!("layers fetched into {}", dest.display());
    Ok(())
}
