use seqcache::cli::{Args, Command, ConfigArgs, InfoArgs, LsArgs, PlayArgs};
use seqcache::config::{self, PathConfig, Settings};
use seqcache::core::cache_events::{FrameFailed, FramesEvicted};
use seqcache::core::cache_man::CacheBudget;
use seqcache::core::frame_cache::FrameCache;
use seqcache::core::orchestrator::{CacheOrchestrator, Delivery, FrameReader};
use seqcache::core::player::Player;
use seqcache::core::workers::Workers;
use seqcache::entities::codec::{Codec, CodecRegistry, SequenceReader};
use seqcache::entities::file_info::{FileInfo, FileType};
use seqcache::utils::sequences::{self, ListOptions};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", bytes, UNITS[0])
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}

fn print_item(item: &FileInfo) {
    match item.file_type() {
        FileType::Directory => println!("{:>8}  {}/", "-", item.file_name(None, false)),
        FileType::File => println!("{:>8}  {}", human_size(item.size()), item.file_name(None, false)),
        FileType::Sequence => println!(
            "{:>8}  {}  ({} frames)",
            human_size(item.size()),
            item.file_name(None, false),
            item.sequence().len()
        ),
    }
}

fn run_ls(cmd: LsArgs, settings: &Settings) -> Result<()> {
    let mut opts: ListOptions = settings.list.clone();
    if let Some(compress) = cmd.compress {
        opts.compress = compress;
    }
    if let Some(sort) = cmd.sort {
        opts.sort = sort;
    }
    if !cmd.extensions.is_empty() {
        opts.sequence_extensions = cmd.extensions;
    }
    opts.reverse |= cmd.reverse;
    opts.show_hidden |= cmd.show_hidden;

    let dirs = if cmd.dirs.is_empty() { vec![PathBuf::from(".")] } else { cmd.dirs };
    let multiple = dirs.len() > 1;

    let mut listings = serde_json::Map::new();
    for dir in &dirs {
        let report = sequences::directory_list(dir, &opts)?;
        if !report.errors.is_empty() {
            warn!("{}: {} entries skipped", dir.display(), report.errors.len());
        }
        if cmd.json {
            listings.insert(dir.display().to_string(), serde_json::to_value(&report.items)?);
            continue;
        }
        if multiple {
            println!("{}:", dir.display());
        }
        for item in &report.items {
            print_item(item);
        }
        for err in &report.errors {
            eprintln!("skipped: {}", err);
        }
        if multiple {
            println!();
        }
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&serde_json::Value::Object(listings))?);
    }
    Ok(())
}

fn run_info(cmd: InfoArgs, settings: &Settings) -> Result<()> {
    let item = sequences::parse_pattern(&cmd.path, &settings.list)?;
    let seq = item.sequence();

    let probe = if cmd.probe {
        let reader = SequenceReader::open(item.clone(), &CodecRegistry::new())
            .with_context(|| format!("Failed to open {}", cmd.path))?;
        let image = reader.read(reader.frames().start().unwrap_or(0))?;
        Some((reader.codec().name(), image.info()))
    } else {
        None
    };

    if cmd.json {
        let mut value = serde_json::json!({
            "name": item.file_name(None, true),
            "type": item.file_type(),
            "frames": seq.len(),
            "start": seq.start(),
            "end": seq.end(),
            "pad": seq.pad(),
            "ranges": seq.ranges(),
            "gaps": seq.gaps(),
            "size": item.size(),
        });
        if let Some((codec, info)) = &probe {
            value["codec"] = serde_json::json!(codec);
            value["image"] = serde_json::to_value(info)?;
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Name:    {}", item.file_name(None, true));
    println!("Type:    {:?}", item.file_type());
    if item.file_type() == FileType::Sequence {
        println!("Frames:  {} ({})", seq.len(), seq);
        println!("Padding: {}", seq.pad());
        let gaps = seq.gaps();
        if !gaps.is_empty() {
            let missing: i64 = gaps.iter().map(|(a, b)| b - a + 1).sum();
            println!("Missing: {} frames in {} gaps", missing, gaps.len());
        }
    }
    println!("Size:    {}", human_size(item.size()));
    if let Some((codec, info)) = probe {
        println!("Codec:   {}", codec);
        println!("Image:   {}x{} {:?} ({} per frame)", info.width, info.height, info.format, human_size(info.mem() as u64));
    }
    Ok(())
}

fn play_budget(cmd: &PlayArgs, settings: &Settings) -> CacheBudget {
    match (cmd.cache_frames, cmd.cache_mb) {
        (Some(n), _) => CacheBudget::items(n),
        (None, Some(mb)) => CacheBudget::bytes(mb.saturating_mul(1024 * 1024)),
        (None, None) => settings.cache.budget(),
    }
}

fn run_play(cmd: PlayArgs, settings: &Settings) -> Result<()> {
    let item = sequences::parse_pattern(&cmd.path, &settings.list)?;
    let reader = Arc::new(
        SequenceReader::open(item, &CodecRegistry::new()).with_context(|| format!("Failed to open {}", cmd.path))?,
    );
    let speed = cmd.speed.unwrap_or(settings.speed);
    let frames = reader.frames().clone().with_speed(speed);
    let total = frames.len();

    let mut window = settings.window();
    if let Some(ahead) = cmd.ahead {
        window.ahead = ahead;
    }
    if let Some(behind) = cmd.behind {
        window.behind = behind;
    }
    let threads = match cmd.workers {
        Some(0) | None => settings.worker_threads(),
        Some(n) => n,
    };

    let budget = play_budget(&cmd, settings);
    let cache = Arc::new(FrameCache::new(budget));
    let workers = Arc::new(Workers::new(threads).context("Failed to start decode workers")?);
    info!("Playing {} frames at {} fps, cache {:?}, {} workers", total, speed, budget, threads);

    let frame_reader: Arc<dyn FrameReader> = reader.clone();
    let orch = CacheOrchestrator::new(frame_reader, frames, Arc::clone(&cache), workers, window);

    let evicted = Arc::new(AtomicUsize::new(0));
    {
        let evicted = Arc::clone(&evicted);
        orch.events().subscribe::<FramesEvicted, _>(move |e| {
            evicted.fetch_add(e.0.len(), Ordering::Relaxed);
        });
    }
    orch.events().subscribe::<FrameFailed, _>(|e| {
        warn!("Frame {} failed: {}", e.frame, e.error);
    });

    let mut player = Player::new(orch);
    player.set_looping(cmd.loops > 1);
    if let Some(frame) = cmd.start_frame {
        player.seek(frame);
    }
    player.play();

    let target = total as u64 * u64::from(cmd.loops.max(1));
    let started = Instant::now();
    while player.is_playing() && player.delivered() < target {
        match player.tick(Instant::now()) {
            Some(Delivery::Frame { frame, image }) => {
                debug!("Frame {} ({}x{})", frame, image.width(), image.height());
            }
            Some(Delivery::Skipped { frame, error }) => {
                eprintln!("frame {}: {}", frame, error);
            }
            None => std::thread::sleep(Duration::from_millis(1)),
        }
    }
    player.pause();
    reader.close();

    let elapsed = started.elapsed().as_secs_f64();
    let orch = player.orchestrator();
    let stats = orch.stats();
    let cache_stats = cache.stats();
    println!(
        "Delivered {} frames in {:.2}s ({:.2} fps, target {})",
        player.delivered(),
        elapsed,
        player.delivered() as f64 / elapsed.max(1e-9),
        speed
    );
    println!("Late:      {}", player.late_frames());
    println!(
        "Decodes:   {} ({} coalesced, {} discarded, {} dropped, {} failed)",
        stats.decodes(),
        stats.coalesced(),
        stats.discarded(),
        stats.dropped_jobs(),
        stats.failed()
    );
    println!(
        "Cache:     {} frames, {} ({:.1}% hit rate, {} evicted)",
        cache.len(),
        human_size(cache.bytes() as u64),
        cache_stats.hit_rate() * 100.0,
        evicted.load(Ordering::Relaxed)
    );
    Ok(())
}

fn run_config(cmd: ConfigArgs, settings: &Settings, path_config: &PathConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    if cmd.save {
        let path = settings.save(path_config)?;
        eprintln!("Saved {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());

    if args.log_file.is_some()
        && let Err(e) = config::ensure_dirs(&path_config)
    {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    init_logging(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);
    info!(
        "Config path: {}",
        config::config_file(config::SETTINGS_FILE, &path_config).display()
    );

    let settings = Settings::load(&path_config)?;

    match args.command {
        Command::Ls(cmd) => run_ls(cmd, &settings),
        Command::Info(cmd) => run_info(cmd, &settings),
        Command::Play(cmd) => run_play(cmd, &settings),
        Command::Config(cmd) => run_config(cmd, &settings, &path_config),
    }
}
