use gedgram::schema::Schema;
use std::env;
use std::fs;
use std::process;

#[derive(Debug, PartialEq)]
enum Mode {
    Dump,
    Pattern(String),
    Validate(String, String),
}

#[derive(Debug)]
struct Cli {
    inputs: Vec<String>,
    output_path: Option<String>,
    mode: Mode,
    quiet: bool,
}

#[derive(Debug, PartialEq)]
enum ArgsError {
    Usage,
    UnknownOption(String),
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <grammar-file>... [options]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output <file>             Write the regenerated grammar to a file (default: stdout)");
    eprintln!("  -p, --pattern <PRIMITIVE>       Print the anchored match pattern of a primitive");
    eprintln!("  -c, --check <PRIMITIVE> <VALUE> Validate a value against a primitive");
    eprintln!("  -q, --quiet                     Only log errors (RUST_LOG still applies)");
    process::exit(1);
}

/// Parses everything after the program name.
fn parse_args(args: &[String]) -> Result<Cli, ArgsError> {
    let mut cli = Cli {
        inputs: Vec::new(),
        output_path: None,
        mode: Mode::Dump,
        quiet: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                i += 1;
                if i < args.len() {
                    cli.output_path = Some(args[i].clone());
                }
            }
            "-p" | "--pattern" => {
                i += 1;
                if i < args.len() {
                    cli.mode = Mode::Pattern(args[i].clone());
                }
            }
            "-c" | "--check" => {
                if i + 2 >= args.len() {
                    return Err(ArgsError::Usage);
                }
                cli.mode = Mode::Validate(args[i + 1].clone(), args[i + 2].clone());
                i += 2;
            }
            "-q" | "--quiet" => cli.quiet = true,
            opt if opt.starts_with('-') => return Err(ArgsError::UnknownOption(opt.to_string())),
            path => cli.inputs.push(path.to_string()),
        }
        i += 1;
    }

    if cli.inputs.is_empty() {
        return Err(ArgsError::Usage);
    }
    Ok(cli)
}

fn log_level(quiet: bool) -> tracing::Level {
    if quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    }
}

fn init_logging(quiet: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level(quiet).into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("gedgram", String::as_str);

    let Cli {
        inputs,
        output_path,
        mode,
        quiet,
    } = match parse_args(args.get(1..).unwrap_or_default()) {
        Ok(cli) => cli,
        Err(ArgsError::Usage) => usage(program),
        Err(ArgsError::UnknownOption(opt)) => {
            eprintln!("Unknown option: {}", opt);
            process::exit(1);
        }
    };
    init_logging(quiet);

    let schema = match Schema::load_files(inputs.as_slice()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            process::exit(1);
        }
    };

    match mode {
        Mode::Dump => {
            let mut text = schema.to_text();
            text.push('\n');
            match output_path {
                Some(path) => {
                    if let Err(e) = fs::write(&path, &text) {
                        eprintln!("Failed to write {}: {}", path, e);
                        process::exit(1);
                    }
                }
                None => print!("{}", text),
            }
        }
        Mode::Pattern(label) => {
            let Some(primitive) = schema.primitive(&label) else {
                eprintln!("Unknown primitive: {}", label);
                process::exit(1);
            };
            match primitive.match_pattern(None, &schema) {
                Ok(pattern) => println!("{}", pattern),
                Err(e) => {
                    eprintln!("Pattern error: {}", e);
                    process::exit(1);
                }
            }
        }
        Mode::Validate(label, value) => {
            let Some(primitive) = schema.primitive(&label) else {
                eprintln!("Unknown primitive: {}", label);
                process::exit(1);
            };
            match primitive.validate_detailed(&value, &schema) {
                Ok(Some(matched)) => println!("valid ({})", matched.definition()),
                Ok(None) => println!("valid"),
                Err(e) => {
                    eprintln!("invalid: {}", e);
                    process::exit(2);
                }
            }
        }
    }
}
