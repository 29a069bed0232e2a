use clap::Parser;

use nnc::Options;

/// Neural network description compiler.
#[derive(Parser)]
#[command(name = "nnc", version, about)]
struct Args {
    /// Network description source file (.n)
    input: String,

    /// Debug level (1 traces markers, 2 queues one per statement)
    #[arg(short, long, default_value_t = 0)]
    debug: u8,

    /// Print each statement as it is read
    #[arg(short, long)]
    listing: bool,

    /// Dump the symbol table after compilation
    #[arg(short, long)]
    symtab: bool,

    /// Suppress the banner and message id prefixes
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();
    let opts = Options {
        debug: args.debug,
        listing: args.listing,
        symtab: args.symtab,
        quiet: args.quiet,
        flush: true,
    };
    std::process::exit(nnc::compile_file(&args.input, &opts));
}
