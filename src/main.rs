//! Beatwave command-line entry point
//!
//! Reads a map request, runs the generate/validate/regenerate loop and writes
//! the resulting map record.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;
    use std::process::ExitCode;

    use clap::Parser;

    use beatwave::settings::{GeneratorSettings, RetryPolicy, SearchPreset};
    use beatwave::{MapRecord, MapRequest, generate_playable};

    /// Beatwave - music-synchronised wave course generator
    #[derive(Parser)]
    #[command(name = "beatwave")]
    #[command(author, version, about, long_about = None)]
    pub(crate) struct Cli {
        /// Map request JSON (beat times, sections, tempo, difficulty)
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the map record JSON
        #[arg(short, long, default_value = "map.json")]
        output: PathBuf,

        /// Generator settings JSON (defaults when omitted)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Override the request's seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the request's difficulty (1-30)
        #[arg(short, long)]
        difficulty: Option<u8>,

        /// Override the request's title
        #[arg(long)]
        title: Option<String>,

        /// Generate/validate attempts before giving up
        #[arg(long, default_value_t = 5)]
        max_attempts: u32,

        /// Validator budget preset
        #[arg(long, value_parser = ["fast", "balanced", "thorough"])]
        preset: Option<String>,
    }

    fn run(cli: Cli) -> beatwave::error::Result<bool> {
        let json = std::fs::read_to_string(&cli.input)?;
        let mut request: MapRequest = serde_json::from_str(&json)?;
        if let Some(seed) = cli.seed {
            request.seed = seed;
        }
        if let Some(difficulty) = cli.difficulty {
            request.difficulty = difficulty;
        }
        if let Some(title) = cli.title {
            request.title = title;
        }

        let mut settings = match &cli.settings {
            Some(path) => GeneratorSettings::load(path)?,
            None => GeneratorSettings::default(),
        };
        if let Some(preset) = cli.preset.as_deref().and_then(SearchPreset::from_str) {
            settings.apply_preset(preset);
        }
        let policy = RetryPolicy {
            max_attempts: cli.max_attempts,
            ..RetryPolicy::default()
        };

        log::info!(
            "Generating '{}' (difficulty {}, seed {}, {} beats, {:.1}s)",
            request.title,
            request.difficulty,
            request.seed,
            request.beat_times.len(),
            request.duration
        );

        let mut last_reported = (u32::MAX, 0.0);
        let report = generate_playable(&request, &settings, &policy, |attempt, progress| {
            if attempt != last_reported.0 || progress - last_reported.1 >= 0.1 {
                log::info!("Attempt {}: validated {:.0}%", attempt + 1, progress * 100.0);
                last_reported = (attempt, progress);
            }
        })?;

        let record = MapRecord::from_context(&request, &report.ctx);
        record.save(&cli.output)?;

        match report.failure() {
            None => log::info!(
                "Playable map with {} obstacles and {} portals after {} attempt(s)",
                report.ctx.obstacles.len(),
                report.ctx.portals.len(),
                report.attempts
            ),
            Some(failure) => log::error!(
                "Map still unplayable after {} attempts (frontier x={:.0}, y={:.0})",
                report.attempts,
                failure.x,
                failure.y
            ),
        }
        Ok(report.is_playable())
    }

    pub(crate) fn main() -> ExitCode {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        match run(Cli::parse()) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::from(2),
            Err(err) => {
                log::error!("{}", err);
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    cli::main()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library-only on wasm; hosts drive `Validator::poll` directly
}
