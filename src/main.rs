use clap::{Parser, Subcommand};
use eyre::Result;
use yatta::subcommand;

#[derive(Parser, Debug)]
#[command(version)]
struct App {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a file into a self-describing LZ4 buffer.
    Compress {
        #[arg(value_name = "input")]
        input: String,

        #[arg(value_name = "output")]
        output: String,
    },
    /// Decompress a buffer written by `compress`.
    Decompress {
        #[arg(value_name = "input")]
        input: String,

        #[arg(value_name = "output")]
        output: String,
    },
    /// Compute a binary diff from one file to another.
    Diff {
        #[arg(value_name = "source")]
        source: String,

        #[arg(value_name = "target")]
        target: String,

        #[arg(value_name = "diff_out")]
        output: String,
    },
    /// Reconstruct a target file from a source file and a diff.
    Patch {
        #[arg(value_name = "source")]
        source: String,

        #[arg(value_name = "diff")]
        diff: String,

        #[arg(value_name = "target_out")]
        output: String,
    },
    /// Serialize a folder into a single package file.
    Pack {
        #[arg(value_name = "folder")]
        folder: String,

        #[arg(value_name = "package_out")]
        output: String,

        /// Name recorded in the package header; defaults to the folder's own name.
        #[arg(long)]
        name: Option<String>,

        /// Exclude entries matching this path or (with a leading '.') extension.
        /// May be repeated.
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },
    /// Unpack a package file into a folder.
    Unpack {
        #[arg(value_name = "package")]
        package: String,

        #[arg(value_name = "folder_out")]
        output: String,
    },
    /// Compute a delta transforming one folder into another.
    Delta {
        #[arg(value_name = "old_folder")]
        old: String,

        #[arg(value_name = "new_folder")]
        new: String,

        #[arg(value_name = "delta_out")]
        output: String,

        /// Exclude entries matching this path or (with a leading '.') extension.
        /// May be repeated.
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },
    /// Apply a delta to a folder in place.
    ApplyDelta {
        #[arg(value_name = "folder")]
        folder: String,

        #[arg(value_name = "delta")]
        delta: String,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let app = App::parse();
    match app.command {
        Command::Compress { input, output } => subcommand::compress::run(&input, &output),
        Command::Decompress { input, output } => subcommand::decompress::run(&input, &output),
        Command::Diff { source, target, output } => subcommand::diff::run(&source, &target, &output),
        Command::Patch { source, diff, output } => subcommand::patch::run(&source, &diff, &output),
        Command::Pack {
            folder,
            output,
            name,
            exclude,
        } => subcommand::pack::run(&folder, &output, name.as_deref(), &exclude),
        Command::Unpack { package, output } => subcommand::unpack::run(&package, &output),
        Command::Delta {
            old,
            new,
            output,
            exclude,
        } => subcommand::delta::run(&old, &new, &output, &exclude),
        Command::ApplyDelta { folder, delta } => subcommand::apply_delta::run(&folder, &delta),
    }
}
