use clap::{ArgAction, Parser};
use movrepair::{
    AtomSummary, Error, RepairOptions, default_output_path, list_atoms, read_movie, repair_paths,
    util::{format_size, stream_len},
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(version, about = "Inspect QuickTime files and repair truncated recordings")]
struct Args {
    /// A working movie file. Without further options its top-level atoms are
    /// listed.
    file: PathBuf,

    /// A broken recording to repair using FILE as the reference
    #[arg(short = 'R', long = "repair")]
    repair: Option<PathBuf>,

    /// Repaired output path (default: <broken-stem>-fixed<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Copy FILE's moov unchanged instead of rescaling durations and sample
    /// tables. FILE must then be at least as long as the broken recording.
    #[arg(long, action = ArgAction::SetTrue)]
    no_fix_metadata: bool,

    /// Print FILE's decoded moov atom as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    dump_moov: bool,

    /// Emit the atom listing as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Levels of container atoms to descend into when listing
    #[arg(long, default_value_t = 0)]
    depth: usize,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.dump_moov {
        let movie = read_movie(BufReader::new(File::open(&args.file)?))?;
        println!("{}", serde_json::to_string_pretty(&movie)?);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(broken) = &args.repair {
        let output = args.output.clone().unwrap_or_else(|| default_output_path(broken));
        info!(output = %output.display(), "output file");
        let opts = RepairOptions { fix_metadata: !args.no_fix_metadata, ..RepairOptions::default() };
        return match repair_paths(&args.file, broken, &output, &opts) {
            Ok(summary) => {
                info!(
                    media = %format_size(summary.broken_media_len),
                    reference_media = %format_size(summary.reference_media_len),
                    "repair complete"
                );
                Ok(ExitCode::SUCCESS)
            }
            Err(Error::NoMediaData) => {
                error!("could not find mdat atom in broken input file");
                Ok(ExitCode::from(1))
            }
            Err(e) => Err(e.into()),
        };
    }

    let mut file = File::open(&args.file)?;
    let size = stream_len(&mut file)?;
    let atoms = list_atoms(BufReader::new(file), args.depth)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&atoms)?);
    } else {
        println!("file size: {}", format_size(size));
        print_atoms(&atoms, 0);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_atoms(atoms: &[AtomSummary], depth: usize) {
    let indent = "  ".repeat(depth);
    for atom in atoms {
        println!("{indent}* {} ({})", atom.typ, format_size(atom.size));
        print_atoms(&atom.children, depth + 1);
    }
}
