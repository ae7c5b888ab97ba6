use crate::cli::{Cli, Commands};
use anyhow::{Context, Result};
use ffplan::config::Config;
use ffplan::engine::{
    self, CapabilityProber, Decision, Engine, JobRequest, ProcessInfo, SourceInspector, Validator,
};
use ffplan::logging;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load_from(p),
        None => Config::load(),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    if let Commands::InitConfig = cli.command {
        return handle_init_config();
    }

    let config = load_config(cli.config.as_deref())?;
    if let Err(e) = logging::init(&config.logging, cli.verbose) {
        eprintln!("Warning: {:#}", e);
    }

    match cli.command {
        Commands::ProbeHw { json } => handle_probe_hw(&config, json),
        Commands::Inspect { file, json } => handle_inspect(&config, &file, json),
        Commands::Validate { files } => handle_validate(&config, &files),
        Commands::Scan {
            directory,
            output_dir,
            container,
        } => handle_scan(config, directory, output_dir, &container),
        Commands::Plan {
            input,
            output,
            container,
            json,
        } => handle_plan(config, input, output, container, json),
        Commands::Progress { duration } => handle_progress(duration),
        Commands::InitConfig => handle_init_config(),
    }
}

fn handle_probe_hw(config: &Config, json: bool) -> Result<()> {
    let snapshot = CapabilityProber::new(config.probe.clone()).probe();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let cpu = &snapshot.processor;
    println!("CPU:       {} ({} threads)", display_or(&cpu.model, "unknown"), cpu.core_count);

    let gpu = &snapshot.graphics;
    if gpu.vendor_detected {
        println!("GPU:       {}", display_or(&gpu.model, "unknown model"));
        println!(
            "Device:    {} ({})",
            display_or(&gpu.device_id, "unknown id"),
            gpu.generation.display_name()
        );
        if !gpu.driver.is_empty() {
            println!("Driver:    {}", gpu.driver);
        }
    } else {
        println!("GPU:       none detected");
    }
    println!("Render:    {}", gpu.render_device_path);
    println!(
        "Features:  10-bit encode {}, AV1 encode {}, AV1 decode {}",
        yes_no(gpu.supports_10bit_encode),
        yes_no(gpu.supports_av1_encode),
        yes_no(gpu.supports_av1_decode)
    );

    let enc = &snapshot.encoders;
    println!("AMF:       {}", join_or_none(&enc.hardware_class_a));
    println!("VA-API:    {}", join_or_none(&enc.hardware_class_b));
    println!("Software:  {}", join_or_none(&enc.software));
    Ok(())
}

fn handle_inspect(config: &Config, file: &Path, json: bool) -> Result<()> {
    let profile = SourceInspector::new(config.probe.clone())
        .probe_source(file)
        .with_context(|| format!("Failed to inspect {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("File:      {}", file.display());
        println!("Codec:     {}", profile.codec.as_str());
        println!("Bit depth: {}", profile.bit_depth);
        println!("Size:      {}x{}", profile.width, profile.height);
        println!("Duration:  {:.2} seconds", profile.duration_seconds);
        println!("Bitrate:   {} bps", profile.video_bitrate_bps);
        println!("HDR:       {:?}", profile.hdr_kind);
    }
    Ok(())
}

fn handle_validate(config: &Config, files: &[PathBuf]) -> Result<()> {
    let validator = Validator::new(SourceInspector::new(config.probe.clone()));
    let mut failed = 0;
    for file in files {
        match validator.validate(file) {
            Ok(profile) => println!(
                "OK    {} ({} {}x{}, {:.1}s)",
                file.display(),
                profile.codec.as_str(),
                profile.width,
                profile.height,
                profile.duration_seconds
            ),
            Err(e) => {
                failed += 1;
                println!("FAIL  {} [{}] {}", file.display(), e.category(), e);
            }
        }
    }

    if failed > 0 {
        eprintln!("{} of {} files failed pre-flight checks", failed, files.len());
        process::exit(1);
    }
    Ok(())
}

fn handle_scan(
    config: Config,
    directory: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    container: &str,
) -> Result<()> {
    let dir = match directory {
        Some(d) => d,
        None => std::env::current_dir().context("Could not determine current directory")?,
    };
    println!("Scanning directory: {}", dir.display());

    let files = engine::scan(&dir);
    if files.is_empty() {
        println!("No video files found");
        return Ok(());
    }

    let mut eng = Engine::new(config.settings, config.probe);
    let (mut encode, mut skip, mut refuse) = (0, 0, 0);
    for input in files {
        let output = engine::derive_output_path(&input, output_dir.as_deref(), "ffplan", container);
        let outcome = eng.plan_job(&JobRequest::new(&input, output));
        match &outcome.decision {
            Decision::Encode { encoder, .. } => {
                encode += 1;
                println!("ENCODE  {} -> {}", input.display(), encoder.name);
            }
            Decision::Skip { reason } => {
                skip += 1;
                println!("SKIP    {} ({})", input.display(), reason);
            }
            Decision::Refuse { category, message, .. } => {
                refuse += 1;
                println!("REFUSE  {} [{}] {}", input.display(), category, message);
            }
        }
    }

    println!("\n{} to encode, {} skipped, {} refused", encode, skip, refuse);
    Ok(())
}

fn handle_plan(
    config: Config,
    input: PathBuf,
    output: PathBuf,
    container: Option<String>,
    json: bool,
) -> Result<()> {
    let mut job = JobRequest::new(input, output);
    job.container_override = container;

    let mut eng = Engine::new(config.settings, config.probe);
    let outcome = eng.plan_job(&job);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    for line in &outcome.log {
        eprintln!("# {}", line);
    }
    for warning in &outcome.warnings {
        eprintln!("Warning: {}", warning);
    }

    match outcome.decision {
        Decision::Encode { command, .. } => {
            println!("{}", command);
            Ok(())
        }
        Decision::Skip { reason } => {
            println!("Skipped: {}", reason);
            Ok(())
        }
        Decision::Refuse {
            category,
            message,
            remediation,
        } => {
            eprintln!("Refused [{}]: {}", category, message);
            if let Some(hint) = remediation {
                eprintln!("Hint: {}", hint);
            }
            process::exit(2);
        }
    }
}

fn handle_progress(duration: f64) -> Result<()> {
    let mut tracker = engine::ProgressTracker::new(duration);
    tracker.parse(
        "",
        Some(ProcessInfo {
            pid: process::id(),
        }),
    );

    let mut last = None;
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        // ffmpeg rewrites its status line with carriage returns
        for segment in line.split('\r') {
            let report = tracker.parse(segment, None);
            if last != Some(report.percent) {
                println!("{}%", report.percent);
                last = Some(report.percent);
            }
        }
    }

    let done = tracker.finalize();
    println!("{}%", done.percent);
    Ok(())
}

fn handle_init_config() -> Result<()> {
    let existed = Config::exists();
    let path = Config::ensure_default()?;
    if existed {
        println!("Config file exists: {}", path.display());
    } else {
        println!("Created default config: {}", path.display());
    }
    Ok(())
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn join_or_none(names: &std::collections::BTreeSet<String>) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
