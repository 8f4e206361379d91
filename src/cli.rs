use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Frame-accurate timeline engine: timecode math, tag queries, track rendering
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Write the log to a file instead of stderr
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert between frame number, seconds and SMPTE timecode
    Timecode(TimecodeArgs),
    /// Render every track of a project to PNG
    Render(RenderArgs),
    /// Query tags overlapping a time or range
    Query(QueryArgs),
}

#[derive(ClapArgs, Debug)]
pub struct TimecodeArgs {
    /// Frame rate: "24", "29.97", "30000/1001"
    #[arg(short = 'r', long = "rate", value_name = "RATE")]
    pub rate: String,

    /// Use drop-frame labels (29.97 / 59.94 only)
    #[arg(short = 'd', long = "drop-frame")]
    pub drop_frame: bool,

    /// Media duration in seconds (bounds clamping)
    #[arg(long = "duration", value_name = "SECONDS", default_value_t = 86400.0)]
    pub duration: f64,

    /// Input frame number
    #[arg(short = 'f', long = "frame", value_name = "N", group = "input")]
    pub frame: Option<i64>,

    /// Input SMPTE timecode (HH:MM:SS:FF)
    #[arg(short = 's', long = "smpte", value_name = "TC", group = "input")]
    pub smpte: Option<String>,

    /// Input time in seconds
    #[arg(short = 't', long = "time", value_name = "SECONDS", group = "input")]
    pub time: Option<f64>,
}

#[derive(ClapArgs, Debug)]
pub struct RenderArgs {
    /// Project JSON file
    #[arg(value_name = "PROJECT")]
    pub project: PathBuf,

    /// Output directory for PNG files
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub out: PathBuf,

    /// Canvas width in pixels (default from settings)
    #[arg(short = 'W', long = "width", value_name = "PX")]
    pub width: Option<u32>,

    /// Track row height in pixels (default from settings)
    #[arg(short = 'H', long = "height", value_name = "PX")]
    pub height: Option<u32>,

    /// Zoom window in timeline percent
    #[arg(long = "scale", value_names = ["MIN", "MAX"], num_args = 2)]
    pub scale: Option<Vec<f64>>,

    /// Text filter
    #[arg(long = "filter", value_name = "TEXT")]
    pub filter: Option<String>,

    /// Playhead time in seconds (highlights active tags)
    #[arg(short = 'p', long = "playhead", value_name = "SECONDS")]
    pub playhead: Option<f64>,

    /// Also write all tracks stacked into one image
    #[arg(long = "composite")]
    pub composite: bool,
}

#[derive(ClapArgs, Debug)]
pub struct QueryArgs {
    /// Project JSON file
    #[arg(value_name = "PROJECT")]
    pub project: PathBuf,

    /// Tags active at this time (seconds)
    #[arg(long = "at", value_name = "SECONDS", conflicts_with_all = ["from", "to"])]
    pub at: Option<f64>,

    /// Range start (seconds)
    #[arg(long = "from", value_name = "SECONDS", requires = "to")]
    pub from: Option<f64>,

    /// Range end (seconds)
    #[arg(long = "to", value_name = "SECONDS", requires = "from")]
    pub to: Option<f64>,

    /// Restrict to one track
    #[arg(long = "track", value_name = "ID")]
    pub track: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_timecode() {
        let args = Args::parse_from(["frameline", "-vv", "timecode", "--rate", "29.97", "-d", "--frame", "1800"]);
        assert_eq!(args.verbosity, 2);
        match args.command {
            Command::Timecode(t) => {
                assert_eq!(t.rate, "29.97");
                assert!(t.drop_frame);
                assert_eq!(t.frame, Some(1800));
                assert!(t.smpte.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_timecode_inputs_exclusive() {
        let res = Args::try_parse_from(["frameline", "timecode", "-r", "24", "-f", "1", "-t", "2.0"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_render_and_query() {
        let args = Args::parse_from([
            "frameline", "render", "p.json", "--out", "out", "--scale", "10", "20", "--playhead", "3.5",
        ]);
        match args.command {
            Command::Render(r) => {
                assert_eq!(r.scale, Some(vec![10.0, 20.0]));
                assert_eq!(r.playhead, Some(3.5));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(Args::try_parse_from(["frameline", "query", "p.json", "--from", "1"]).is_err());
        assert!(Args::try_parse_from(["frameline", "query", "p.json", "--from", "1", "--to", "2"]).is_ok());
    }
}
