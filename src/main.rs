use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser as ClapParser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use fun::bytecode::disasm::print_image;
use fun::bytecode::verify::verify;
use fun::bytecode::{CodeImage, Encoder};
use fun::check::check;
use fun::frontend;
use fun::frontend::lexer::Lexer;
use fun::frontend::token_dumper::TokenDumper;
use fun::runtime::{Svm, VmConfig};

#[derive(ClapParser, Debug)]
#[command(name = "fun", version, about = "Compile and run Fun programs on the stack machine")]
struct Args {
    /// Source file (.fun), or an object file with --object
    file: PathBuf,

    /// Print each instruction as it executes
    #[arg(long)]
    trace: bool,

    /// Print the object code before running
    #[arg(long)]
    code: bool,

    /// Dump tokens and exit
    #[arg(long)]
    tokens: bool,

    /// Disable colors in token output
    #[arg(long)]
    no_color: bool,

    /// Skip comments and newlines in token output
    #[arg(long)]
    compact: bool,

    /// Print the syntax tree and exit
    #[arg(long)]
    ast: bool,

    /// Write the object code to this file instead of running it
    #[arg(long, value_name = "OBJ")]
    emit: Option<PathBuf>,

    /// Treat FILE as an object file written by --emit
    #[arg(long)]
    object: bool,

    /// Fail after this many executed instructions
    #[arg(long, value_name = "N")]
    max_steps: Option<usize>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let image = if args.object {
        load_object(&args.file)
    } else {
        ensure_extension(&args.file);
        let source = match fs::read_to_string(&args.file) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("Failed to read '{}': {}", args.file.display(), e);
                process::exit(1);
            }
        };

        if args.tokens {
            dump_tokens(&source, args.no_color, args.compact);
            return;
        }

        match compile_source(&source, args.ast) {
            Some(image) => image,
            None => return,
        }
    };

    if args.code {
        print_image(&image);
    }

    if let Some(path) = &args.emit {
        write_object(&image, path);
        return;
    }

    let config = VmConfig {
        max_steps: args.max_steps,
        trace: args.trace,
        ..VmConfig::default()
    };
    run_image(&image, config);
}

fn ensure_extension(path: &Path) {
    if path.extension().and_then(|e| e.to_str()) != Some("fun") {
        eprintln!("Error: expected a .fun file, got {}", path.display());
        process::exit(1);
    }
}

fn dump_tokens(source: &str, no_color: bool, compact: bool) {
    let mut lexer = Lexer::new(source);

    match lexer.tokenize() {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            if compact {
                dumper = dumper.compact();
            }
            dumper.dump(&tokens);
        }
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            process::exit(1);
        }
    }
}

/// Syntactic analysis, contextual analysis and code generation. Returns
/// `None` when only the tree was requested.
fn compile_source(source: &str, ast: bool) -> Option<CodeImage> {
    let program = match frontend::parse(source) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if ast {
        println!("{:#?}", program);
        return None;
    }

    if let Err(errors) = check(&program) {
        for e in errors.iter() {
            eprintln!("Check error: {}", e);
        }
        eprintln!("Contextual analysis failed with {} error(s)", errors.len());
        process::exit(1);
    }
    debug!("contextual analysis passed");

    match Encoder::new().encode_program(&program) {
        Ok(image) => Some(image),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn load_object(path: &Path) -> CodeImage {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", path.display(), e);
            process::exit(1);
        }
    };

    let image = match CodeImage::from_bytes(&bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = verify(&image) {
        eprintln!("{}", e);
        process::exit(1);
    }

    image
}

fn write_object(image: &CodeImage, path: &Path) {
    let bytes = match image.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = fs::write(path, bytes) {
        eprintln!("Failed to write '{}': {}", path.display(), e);
        process::exit(1);
    }
}

fn run_image(image: &CodeImage, config: VmConfig) {
    let trace = config.trace;
    let mut vm = Svm::with_config(image, config);

    if let Err(e) = vm.interpret_stdio() {
        eprintln!("Runtime error: {}", e);
        for ret in vm.backtrace() {
            eprintln!("    returns to code address {}", ret);
        }
        if trace {
            eprint!("{}", vm.show_stack());
        }
        process::exit(1);
    }

    if trace {
        eprintln!("Halted after {} instruction(s)", vm.steps());
    }
}
