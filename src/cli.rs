use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::entities::sequence::Compress;
use crate::entities::speed::Speed;
use crate::utils::sequences::SortBy;

// Build version with codec info
pub const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"),
    "\n",
    "EXR:    exrs (pure Rust, RGBA f16)\n",
    "Still:  image 0.25 (png, jpeg, tiff, tga, bmp, pnm)\n",
    "Target: ",
    std::env::consts::ARCH,
    "-",
    std::env::consts::OS
);

/// Image sequence lister and cached player
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: seqcache.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List directories with numbered files grouped into sequences
    Ls(LsArgs),
    /// Describe a file, sequence pattern, or frame list
    Info(InfoArgs),
    /// Play a sequence through the frame cache without display
    Play(PlayArgs),
    /// Print the effective settings
    Config(ConfigArgs),
}

#[derive(ClapArgs, Debug)]
pub struct LsArgs {
    /// Directories to list (default: current directory)
    #[arg(value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// Frame list mode: off, sparse, range
    #[arg(long, value_name = "MODE")]
    pub compress: Option<Compress>,

    /// Sort key: name, start, size, time
    #[arg(short = 's', long, value_name = "KEY")]
    pub sort: Option<SortBy>,

    /// Reverse the sort order
    #[arg(short = 'r', long)]
    pub reverse: bool,

    /// Include dot files
    #[arg(short = 'a', long = "all")]
    pub show_hidden: bool,

    /// Only group these extensions into sequences (repeatable)
    #[arg(short = 'x', long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct InfoArgs {
    /// File, pattern (`shot.####.exr`, `shot.%04d.exr`, `shot.*.exr`) or frame list (`shot.1-100.exr`)
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Also decode the first frame and print its resolution
    #[arg(long)]
    pub probe: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct PlayArgs {
    /// File or pattern to play
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Playback speed (fps, e.g. 24, 23.976, 30000/1001)
    #[arg(long, value_name = "FPS")]
    pub speed: Option<Speed>,

    /// Frames to read ahead of the playhead
    #[arg(long, value_name = "N")]
    pub ahead: Option<usize>,

    /// Frames to keep behind the playhead
    #[arg(long, value_name = "N")]
    pub behind: Option<usize>,

    /// Cache budget in megabytes (overrides settings)
    #[arg(long = "cache-mb", value_name = "MB")]
    pub cache_mb: Option<usize>,

    /// Cache budget in frames (overrides settings and --cache-mb)
    #[arg(long = "cache-frames", value_name = "N")]
    pub cache_frames: Option<usize>,

    /// Decode threads (0 = auto)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Number of passes over the sequence
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub loops: u32,

    /// Start frame
    #[arg(long = "frame", value_name = "N")]
    pub start_frame: Option<i64>,
}

#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Write the effective settings to the config directory
    #[arg(long)]
    pub save: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ls() {
        let args = Args::try_parse_from(["seqcache", "-vv", "ls", "/tmp", "--compress", "range", "--json"]).unwrap();
        assert_eq!(args.verbosity, 2);
        match args.command {
            Command::Ls(ls) => {
                assert_eq!(ls.dirs, vec![PathBuf::from("/tmp")]);
                assert_eq!(ls.compress, Some(Compress::Range));
                assert!(ls.json);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_play_and_global_log() {
        let args = Args::try_parse_from([
            "seqcache", "play", "shot.####.exr", "--ahead", "12", "--loops", "3", "-l",
        ])
        .unwrap();
        assert_eq!(args.log_file, Some(None));
        match args.command {
            Command::Play(play) => {
                assert_eq!(play.path, "shot.####.exr");
                assert_eq!(play.ahead, Some(12));
                assert_eq!(play.loops, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_sort_key_rejected() {
        assert!(Args::try_parse_from(["seqcache", "ls", "--sort", "colour"]).is_err());
    }
}
