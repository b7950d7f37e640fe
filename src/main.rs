use std::{fs, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use garage_coach::{
    CoachError, ConfigSources, CornerFeedback, FeedbackSet, PlanRequest, RunType,
    SetupAssistant, TemperatureContext, TrackCatalog,
    setup_assistant::{DEFAULT_BASELINE_TEMP_F, SetupSheet, temperature::celsius_to_fahrenheit},
    writer,
};

#[derive(Parser, Debug)]
#[command(version, about = "Turns corner-by-corner handling feedback into garage setup changes", long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Rule document overriding the default setup_rules.json
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Limits document overriding the default limits.json
    #[arg(long, global = true)]
    limits: Option<PathBuf>,

    /// Track geometry document overriding the default tracks.json
    #[arg(long, global = true)]
    tracks: Option<PathBuf>,

    /// More logging, repeat for debug output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    /// Report with findings, changes and checklist
    #[default]
    Text,
    /// Full structured plan
    Json,
    /// Plan with each change as a display string
    Lines,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute a setup plan for a track
    Compute {
        #[arg(short, long)]
        track: String,

        /// JSON file of {corner: {symptom, severity, note}}
        #[arg(short, long)]
        feedback: Option<PathBuf>,

        /// Inline corner feedback, e.g. "T1=Loose on entry@8"
        #[arg(long = "feel", value_parser = parse_feel)]
        feel: Vec<(String, CornerFeedback)>,

        /// Track temperature the baseline setup was built for
        #[arg(short, long)]
        baseline: Option<f64>,

        /// Current track temperature
        #[arg(short, long)]
        current: Option<f64>,

        /// Temperatures are given in °C
        #[arg(long)]
        celsius: bool,

        #[arg(short, long, value_enum, default_value_t = RunType::Practice)]
        run_type: RunType,

        /// JSON file of current absolute values to apply the plan to
        #[arg(short, long)]
        setup: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Also write the full plan to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the tracks in the catalog
    Tracks,
    /// List the symptom labels the rules understand
    Symptoms,
    /// Load and validate all configuration documents
    CheckConfig,
}

fn parse_feel(value: &str) -> Result<(String, CornerFeedback), String> {
    let (corner, rest) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CORNER=SYMPTOM@SEVERITY, got {}", value))?;
    let (symptom, severity) = rest
        .rsplit_once('@')
        .ok_or_else(|| format!("missing @SEVERITY in {}", value))?;
    let severity: i32 = severity
        .trim()
        .parse()
        .map_err(|e| format!("invalid severity {:?}: {}", severity, e))?;
    if corner.trim().is_empty() {
        return Err(format!("missing corner name in {}", value));
    }
    Ok((
        corner.trim().to_string(),
        CornerFeedback::new(symptom.trim(), severity),
    ))
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &PathBuf, document: &str) -> Result<T, CoachError> {
    let content = fs::read_to_string(path).map_err(|e| CoachError::ConfigIOError {
        path: path.clone(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| CoachError::ConfigParseError {
        document: document.to_string(),
        source: e,
    })
}

fn to_json_value<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, CoachError> {
    serde_json::to_value(value).map_err(|e| CoachError::WriterError { source: e.into() })
}

fn to_json_string<T: serde::Serialize>(value: &T) -> Result<String, CoachError> {
    serde_json::to_string_pretty(value).map_err(|e| CoachError::WriterError { source: e.into() })
}

#[allow(clippy::too_many_arguments)]
fn compute(
    sources: &ConfigSources,
    track: &str,
    feedback_file: Option<&PathBuf>,
    feel: &[(String, CornerFeedback)],
    baseline: Option<f64>,
    current: Option<f64>,
    celsius: bool,
    run_type: RunType,
    setup: Option<&PathBuf>,
    format: OutputFormat,
    output: Option<&PathBuf>,
) -> Result<(), CoachError> {
    let assistant = SetupAssistant::new(sources.load_config()?);
    let catalog = sources.load_tracks()?;

    let geometry = catalog.get(track);
    if geometry.is_none() {
        log::warn!("Track {} not found, only temperature compensation applies", track);
    }

    let mut feedback: FeedbackSet = match feedback_file {
        Some(path) => read_json_file(path, "feedback")?,
        None => FeedbackSet::new(),
    };
    feedback.extend(feel.iter().cloned());

    let track_baseline_f = geometry
        .and_then(|g| g.baseline_temp_f)
        .unwrap_or(DEFAULT_BASELINE_TEMP_F);
    let to_fahrenheit = |t: f64| if celsius { celsius_to_fahrenheit(t) } else { t };
    let baseline_f = baseline.map(to_fahrenheit).unwrap_or(track_baseline_f);
    let temperature =
        TemperatureContext::new(baseline_f, current.map(to_fahrenheit).unwrap_or(baseline_f));

    let track_name = geometry.map(|g| g.track_name.as_str()).unwrap_or(track);
    let request = PlanRequest::new(track_name, geometry, &feedback)
        .with_temperature(temperature)
        .with_run_type(run_type);
    let plan = assistant.compute(&request);

    let applied = match setup {
        Some(path) => {
            let sheet: SetupSheet = read_json_file(path, "setup sheet")?;
            Some(plan.apply_to(assistant.config().limits(), &sheet))
        }
        None => None,
    };

    let rendered = match format {
        OutputFormat::Text => {
            let mut report = plan.render_text();
            if let Some(applied) = &applied {
                report.push_str("\nApplied To Setup Sheet\n");
                for change in applied {
                    report.push_str(&format!("- {}\n", change.display_line()));
                }
            }
            report
        }
        OutputFormat::Json => match &applied {
            Some(applied) => {
                let mut value = serde_json::Map::new();
                value.insert("plan".to_string(), to_json_value(&plan)?);
                value.insert("applied".to_string(), to_json_value(applied)?);
                to_json_string(&value)?
            }
            None => to_json_string(&plan)?,
        },
        OutputFormat::Lines => to_json_string(&plan.display_document())?,
    };
    println!("{}", rendered.trim_end());

    if let Some(path) = output {
        writer::write_plan(path, &plan)?;
    }
    Ok(())
}

fn tracks(catalog: &TrackCatalog) {
    for name in catalog.list_available_tracks() {
        let Some(track) = catalog.get(name) else {
            continue;
        };
        let baseline = track
            .baseline_temp_f
            .map(|t| format!("{}°F", t))
            .unwrap_or_else(|| "default baseline".to_string());
        println!("{} ({})", track.track_name, baseline);
        for corner in &track.corners {
            println!(
                "  {:<12} {:<6} bank {:>4}°  angle {:>5}°",
                corner.name,
                corner.direction.to_string(),
                corner.bank_deg,
                corner.angle_deg
            );
        }
    }
}

fn symptoms(assistant: &SetupAssistant) {
    let rules = assistant.config().rules();
    for (label, key) in rules.labels() {
        let marker = match rules.block(key) {
            Some(block) if !block.is_empty() => "",
            _ if rules.is_no_issue(key) => " (skip)",
            _ => " (no rules)",
        };
        println!("{:<26} {}{}", label, key, marker);
    }
}

fn check_config(sources: &ConfigSources) -> Result<(), CoachError> {
    let config = sources.load_config()?;
    let catalog = sources.load_tracks()?;

    println!("Allowed parameters: {}", config.registry().len());
    println!("Limit families: {}", config.limits().families().count());
    println!("Symptoms with rules: {}", config.rules().symptom_keys().count());
    println!("Tracks: {}", catalog.len());
    for parameter in config.unreachable_rule_parameters() {
        log::warn!("Rule parameter {} is never allowed and will always be filtered", parameter);
    }
    match &sources.user_dir {
        Some(dir) => println!("User overrides: {}", dir.display()),
        None => println!("User overrides: none"),
    }
    println!("Configuration OK");
    Ok(())
}

fn run(cli: &Args) -> Result<(), CoachError> {
    let sources = ConfigSources {
        rules: cli.rules.clone(),
        limits: cli.limits.clone(),
        tracks: cli.tracks.clone(),
        ..ConfigSources::with_user_dir()
    };

    match &cli.command {
        Commands::Compute {
            track,
            feedback,
            feel,
            baseline,
            current,
            celsius,
            run_type,
            setup,
            format,
            output,
        } => compute(
            &sources,
            track,
            feedback.as_ref(),
            feel,
            *baseline,
            *current,
            *celsius,
            *run_type,
            setup.as_ref(),
            *format,
            output.as_ref(),
        ),
        Commands::Tracks => {
            tracks(&sources.load_tracks()?);
            Ok(())
        }
        Commands::Symptoms => {
            symptoms(&SetupAssistant::new(sources.load_config()?));
            Ok(())
        }
        Commands::CheckConfig => check_config(&sources),
    }
}

fn main() {
    let cli = Args::parse();

    let level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    };
    colog::default_builder().filter_level(level).init();

    if let Err(e) = run(&cli) {
        log::error!("{}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            log::error!("  caused by: {}", cause);
            source = std::error::Error::source(cause);
        }
        std::process::exit(1);
    }
}
