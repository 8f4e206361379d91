use frameline::cli::{Args, Command, QueryArgs, RenderArgs, TimecodeArgs};
use frameline::core::timebase::{FrameRate, TimeBase, time_to_string};
use frameline::entities::{TimelineProject, TrackId};
use frameline::render::{RenderCoordinator, raster};
use frameline::shell::{self, Shell};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Characters not allowed in output file names
static UNSAFE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("filename pattern is a valid regex"));

/// Height of ruler marks on the composite
const RULER_TICK_PX: u32 = 6;

/// Upper bound for waiting on renderer threads
const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    let args = Args::parse();

    if let Err(e) = shell::init_logger(args.verbosity, args.log_file.as_deref()) {
        eprintln!("Warning: {:#}", e);
    }
    debug!("Command-line args: {:?}", args);

    let shell = Shell::bootstrap(args.config_dir.clone());

    let result = match &args.command {
        Command::Timecode(t) => run_timecode(t),
        Command::Render(r) => run_render(r, &shell),
        Command::Query(q) => run_query(q),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_timecode(args: &TimecodeArgs) -> Result<()> {
    let rate = FrameRate::parse(&args.rate).with_context(|| format!("Invalid rate '{}'", args.rate))?;
    let tb = TimeBase::new(rate, args.drop_frame, args.duration);

    let frame = if let Some(frame) = args.frame {
        tb.clamp_frame(frame)
    } else if let Some(tc) = &args.smpte {
        tb.smpte_to_frame(tc)
            .with_context(|| format!("Invalid timecode '{}'", tc))?
    } else if let Some(time) = args.time {
        tb.time_to_frame(time)
    } else {
        bail!("One of --frame, --smpte or --time is required");
    };

    let seconds = tb.frame_to_time(frame as i64);
    println!("rate:    {}{}", rate, if tb.drop_frame() { " DF" } else { "" });
    println!("frame:   {}", frame);
    println!("seconds: {:.6}", seconds);
    println!("smpte:   {}", tb.frame_to_smpte(frame as i64));
    println!("elapsed: {}", time_to_string(seconds, true));
    Ok(())
}

fn run_render(args: &RenderArgs, shell: &Shell) -> Result<()> {
    let project = TimelineProject::load(&args.project)?;

    let mut settings = shell.settings.clone();
    if let Some(width) = args.width {
        settings.canvas.width = width;
    }
    if let Some(height) = args.height {
        settings.canvas.height = height;
    }
    let row_height = settings.canvas.height;
    let palette = settings.palette;
    let ruler_spacing = settings.ruler_min_spacing;

    let mut coord = RenderCoordinator::new(*project.time_base(), settings);
    if let Some(scale) = &args.scale {
        coord.set_scale(scale[0], scale[1]);
    }
    if let Some(filter) = &args.filter {
        coord.set_filter(filter);
    }
    if let Some(t) = args.playhead {
        coord.update_playhead(t);
    }
    for track in project.tracks() {
        coord.add_track(track.clone())?;
    }

    if !coord.wait_for_renders(RENDER_TIMEOUT) {
        warn!("Some tracks did not finish rendering; writing what arrived");
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output dir {}", args.out.display()))?;

    let mut written = 0;
    for (track_id, layer) in coord.canvas().layers() {
        let Some(image) = layer.image() else {
            warn!("Track '{}': no render received", track_id);
            continue;
        };
        let path = output_path(&args.out, track_id);
        image
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}\t{} tags\t{}", track_id, layer.visible(), path.display());
        written += 1;
    }

    if args.composite {
        let mut image = coord.canvas().composite(row_height);
        let width = image.width() as f64;
        let ticks = coord.viewport().ruler_ticks(width, ruler_spacing);
        debug!("Ruler: {} ticks", ticks.len());
        raster::ruler_ticks(&mut image, &ticks, RULER_TICK_PX, palette.hover.with_alpha(160));
        if let Some(t) = coord.playhead() {
            let x = coord.viewport().time_to_pixels(t, width);
            raster::vline(&mut image, x, 1, palette.active.with_alpha(255));
        }
        let path = args.out.join("timeline.png");
        image
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("composite\t{}", path.display());
    }

    let stats = coord.stats();
    info!(
        "Rendered {} tracks: {} messages, {} results applied, {} stale discarded",
        written,
        stats.total_dispatched(),
        stats.results_applied,
        stats.stale_discarded
    );
    coord.shutdown();
    Ok(())
}

fn output_path(dir: &Path, track_id: &TrackId) -> PathBuf {
    let name = UNSAFE_FILENAME.replace_all(track_id.as_str(), "_");
    dir.join(format!("{}.png", name))
}

fn run_query(args: &QueryArgs) -> Result<()> {
    let project = TimelineProject::load(&args.project)?;
    let tb = project.time_base();

    let only = args.track.as_deref().map(TrackId::from);
    if let Some(id) = &only {
        if project.track(id).is_none() {
            bail!("No track '{}' in {}", id, args.project.display());
        }
    }

    for track in project.tracks() {
        if only.as_ref().is_some_and(|id| id != track.track_id()) {
            continue;
        }
        let ids = match (args.at, args.from, args.to) {
            (Some(at), _, _) => track.search_point(at),
            (None, Some(from), Some(to)) => track.search(from, to),
            _ => bail!("Either --at or --from/--to is required"),
        };
        for id in ids {
            let Some(tag) = track.tag(&id) else {
                continue;
            };
            println!(
                "{}\t{}\t{}\t{}\t{}",
                track.track_id(),
                tag.tag_id,
                tb.time_to_smpte(tag.start_time),
                tb.time_to_smpte(tag.end_time),
                tag.text.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}
