use clap::Parser;
use color_print::{cformat, cprintln};
use mccasm::{
    compile_file,
    config::{CompilerArgs, FileConfig, DEFAULT_CONFIG_FILE},
    emit,
    error::Error,
    msg::Level,
    target,
    util::print_dump,
};
use std::path::{Path, PathBuf};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Main source file
    input: Option<PathBuf>,

    /// Output file without extension [default: <input>.out]
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Language target, see --list-targets
    #[clap(short, long)]
    target: Option<String>,

    /// Emulated memory size in bytes
    #[clap(long)]
    memory_size: Option<usize>,

    /// Number of memory banks used by balanced layouts
    #[clap(long)]
    memory_blocks: Option<usize>,

    /// Emulated stack size in bytes
    #[clap(long)]
    stack_size: Option<usize>,

    /// Number of registers
    #[clap(long)]
    register_count: Option<usize>,

    /// Stop when a message of this level is reported
    #[clap(short, long, value_enum)]
    exit_level: Option<Level>,

    /// Directory with templates overriding the built-in ones
    #[clap(long)]
    template_dir: Option<PathBuf>,

    /// YAML config file [default: ./mccpu.yaml when present]
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Dump the compiled program
    #[clap(short, long)]
    dump: bool,

    /// List language targets and exit
    #[clap(long)]
    list_targets: bool,
}

impl Args {
    fn flags(&self) -> FileConfig {
        FileConfig {
            target: self.target.clone(),
            memory_size: self.memory_size,
            memory_blocks: self.memory_blocks,
            stack_size: self.stack_size,
            register_count: self.register_count,
            exit_level: self.exit_level,
            out_file: self.output.clone(),
            template_dir: self.template_dir.clone(),
        }
    }

    fn compiler_args(&self, input: &Path) -> Result<CompilerArgs, Error> {
        let config = match &self.config {
            Some(path) => Some(FileConfig::load(path)?),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Some(FileConfig::load(path)?)
                } else {
                    None
                }
            }
        };
        let compiler = CompilerArgs::merge(input, config, self.flags());
        compiler.validate()?;
        target::find(&compiler.target)?;
        Ok(compiler)
    }
}

fn run(args: &Args, input: &Path) -> Result<i32, Error> {
    let compiler = args.compiler_args(input)?;

    println!("1. Compile");
    println!("  < {}", input.display());
    let result = compile_file(input, &compiler)?;
    result.report.print();
    let status = result.report.status();
    let status = match status {
        Level::Error => cformat!("<r,s>{}</>", status),
        Level::Warning => cformat!("<y,s>{}</>", status),
        _ => cformat!("<g,s>{}</>", status),
    };
    println!("  status: {}", status);

    if args.dump {
        if let Some(program) = &result.program {
            print_dump(program);
        }
    }

    let code = result.exit_code(compiler.exit_level);
    if result.report.reached(compiler.exit_level) {
        cprintln!("<r,s>Compilation stopped</>: exit level {} reached", compiler.exit_level);
        return Ok(code);
    }
    let Some(program) = result.program else {
        cprintln!("<r,s>Compilation failed</>");
        return Ok(code);
    };

    println!("2. Emit `{}`", compiler.target);
    let path = emit(&program, &compiler)?;
    println!("  > {}", path.display());
    Ok(code)
}

fn main() {
    let args = Args::parse();
    cprintln!(
        "<s>MCCPU Compiler</> {} by {}",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_AUTHORS")
    );

    if args.list_targets {
        for t in target::targets() {
            let aliases = t.aliases().join(", ");
            println!("  {:<10} .{:<6} {}", t.id(), t.extension(), aliases);
        }
        return;
    }

    let Some(input) = args.input.as_deref() else {
        println!("No input file given, see --help");
        return;
    };
    if !input.is_file() {
        cprintln!("<r,s>error</>: input file `{}` does not exist", input.display());
        std::process::exit(1);
    }

    match run(&args, input) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            e.print();
            std::process::exit(1);
        }
    }
}
