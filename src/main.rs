//! envchain - Search Path Inspector CLI
use envchain::{BootstrapConfig, DirectoryLoader, EnvRegistry};
use std::env;
use std::path::PathBuf;
use std::process;
use tracing::Level;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("envchain v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    envchain [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help              Print this help message");
    eprintln!("    -V, --version           Print version information");
    eprintln!("    -c, --config <FILE>     Bootstrap config (TOML)");
    eprintln!("    -L, --library <DIR>     Package library directory (overrides config)");
    eprintln!("    -a, --attach <NAME[:POS]>  Load and attach a package (default pos 2)");
    eprintln!("    -d, --detach <POS>      Detach the search path entry at POS");
    eprintln!("    --ls <NAME>             List bindings of a search path entry");
    eprintln!("    -v, --verbose           Log structural events (repeat for trace)");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    envchain -L lib -a utils -a stats");
    eprintln!("    envchain -c envchain.toml -d 2 --ls package:base");
}

fn print_version() {
    println!("envchain {}", VERSION);
}

/// One search path edit, applied in command-line order.
enum Step {
    Attach { name: String, pos: usize },
    Detach(usize),
}

struct Options {
    config: Option<PathBuf>,
    library: Option<PathBuf>,
    steps: Vec<Step>,
    list: Option<String>,
    verbosity: u8,
}

fn parse_pos(text: &str) -> Result<usize, String> {
    text.parse::<usize>()
        .map_err(|_| format!("Invalid position '{}'", text))
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut options = Options {
        config: None,
        library: None,
        steps: Vec::new(),
        list: None,
        verbosity: 0,
    };
    let mut i = 1;

    let value = |i: usize, flag: &str| -> Result<String, String> {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("Missing value after {}", flag))
    };

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-V" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                options.config = Some(PathBuf::from(value(i, flag)?));
            }
            "-L" | "--library" => {
                i += 1;
                options.library = Some(PathBuf::from(value(i, flag)?));
            }
            "-a" | "--attach" => {
                i += 1;
                let spec = value(i, flag)?;
                let step = match spec.split_once(':') {
                    Some((name, pos)) => Step::Attach {
                        name: name.to_string(),
                        pos: parse_pos(pos)?,
                    },
                    None => Step::Attach {
                        name: spec.clone(),
                        pos: 2,
                    },
                };
                options.steps.push(step);
            }
            "-d" | "--detach" => {
                i += 1;
                options.steps.push(Step::Detach(parse_pos(&value(i, flag)?)?));
            }
            "--ls" => {
                i += 1;
                options.list = Some(value(i, flag)?);
            }
            "-v" | "--verbose" => {
                options.verbosity += 1;
            }
            "-vv" => {
                options.verbosity += 2;
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    Ok(options)
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(options: &Options) -> Result<(), String> {
    let mut config = match &options.config {
        Some(path) => BootstrapConfig::from_file(path).map_err(|e| e.to_string())?,
        None => BootstrapConfig::default(),
    };
    if let Some(library) = &options.library {
        config = config.with_library(library);
    }

    let loader = DirectoryLoader::new(&config.library);
    let mut reg = EnvRegistry::bootstrap(&config, &loader).map_err(|e| e.to_string())?;

    for step in &options.steps {
        match step {
            Step::Attach { name, pos } => {
                reg.library(name, *pos, &loader).map_err(|e| e.to_string())?;
            }
            Step::Detach(pos) => {
                reg.detach(*pos, false, false).map_err(|e| e.to_string())?;
            }
        }
    }

    for (i, name) in reg.search().iter().enumerate() {
        println!("[{}] {}", i + 1, name);
    }

    if let Some(name) = &options.list {
        let env = reg
            .env_on_search_path(name)
            .ok_or_else(|| format!("no item called \"{}\" on the search list", name))?;
        println!();
        println!("{}:", reg.print_name(env));
        for key in reg.ls(env, false, None) {
            match reg.get(env, &key) {
                Some(value) => println!("    {} = {}", key, value),
                None => println!("    {}", key),
            }
        }
    }

    Ok(())
}

fn main() {
    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    init_logging(options.verbosity);

    if let Err(e) = run(&options) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
