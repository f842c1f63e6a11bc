use clap::{Parser, Subcommand};
use planday_core::*;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "planday")]
#[command(about = "Workout plan day-progression system", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// User identifier
    #[arg(long, global = true, default_value = "default")]
    user: String,

    /// Plan type (assigned, manual, ai_generated)
    #[arg(long, global = true, default_value = "manual")]
    plan_type: String,

    /// Source plan identifier
    #[arg(long, global = true, default_value = "sample")]
    source: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current day of the plan (default)
    Current {
        /// Show the full entry history instead of just the next day
        #[arg(long, conflicts_with = "with_last")]
        full: bool,

        /// Also show the most recently completed day
        #[arg(long, conflicts_with = "full")]
        with_last: bool,

        /// Plan template JSON (falls back to the built-in sample plan)
        #[arg(long)]
        template: Option<PathBuf>,
    },

    /// Mark a day of the plan as completed
    Complete {
        /// Day number to complete (defaults to the next pending day)
        #[arg(long, conflicts_with = "entry_id")]
        day: Option<u32>,

        /// Entry id to complete
        #[arg(long, conflicts_with = "day")]
        entry_id: Option<Uuid>,

        /// Per-exercise actuals as a JSON array
        #[arg(long)]
        results: Option<String>,

        /// Plan template JSON (falls back to the built-in sample plan)
        #[arg(long)]
        template: Option<PathBuf>,
    },

    /// Show progress stats (streaks, weekly and monthly batches)
    Stats {
        /// Recompute from completion history instead of the cached record
        #[arg(long)]
        refresh: bool,
    },

    /// Distribute a flat exercise list into a day-by-day plan and sync it
    Plan {
        /// JSON file holding a flat exercise array
        #[arg(long)]
        exercises: PathBuf,

        /// Number of days to spread the exercises over
        #[arg(long, default_value_t = 10)]
        days: u32,

        /// Plan name
        #[arg(long, default_value = "custom")]
        name: String,
    },

    /// Materialize or re-sync a plan template into the store
    Sync {
        /// Plan template JSON (falls back to the built-in sample plan)
        #[arg(long)]
        template: Option<PathBuf>,
    },

    /// Export completed history to CSV
    Export {
        /// Output CSV path (defaults to <data-dir>/history.csv)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Export every plan type, not just the selected one
        #[arg(long)]
        all_types: bool,
    },

    /// Roll up the completion journal to CSV
    Rollup {
        /// Clean up processed journal files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    planday_core::logging::init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }

    let plan_type = PlanType::parse(&cli.plan_type)
        .ok_or_else(|| Error::Validation(format!("Unknown plan type: {}", cli.plan_type)))?;
    let key = GroupKey::new(cli.user.clone(), cli.source.clone(), plan_type);
    let service = PlanService::new(config);

    match cli.command {
        Some(Commands::Current {
            full,
            with_last,
            template,
        }) => cmd_current(&service, &key, full, with_last, template.as_deref()),
        Some(Commands::Complete {
            day,
            entry_id,
            results,
            template,
        }) => cmd_complete(
            &service,
            &key,
            day,
            entry_id,
            results.as_deref(),
            template.as_deref(),
        ),
        Some(Commands::Stats { refresh }) => cmd_stats(&service, &key, refresh),
        Some(Commands::Plan {
            exercises,
            days,
            name,
        }) => cmd_plan(&service, &key, &exercises, days, &name),
        Some(Commands::Sync { template }) => cmd_sync(&service, &key, template.as_deref()),
        Some(Commands::Export { output, all_types }) => {
            cmd_export(&service, &key, output, all_types)
        }
        Some(Commands::Rollup { cleanup }) => cmd_rollup(&service, cleanup),
        None => {
            // Default to "current"
            cmd_current(&service, &key, false, false, None)
        }
    }
}

/// Load the template from a path, or fall back to the built-in sample plan
fn resolve_template(path: Option<&std::path::Path>) -> Result<PlanTemplate> {
    match path {
        Some(path) => load_template(path),
        None => Ok(get_sample_template().clone()),
    }
}

fn cmd_current(
    service: &PlanService,
    key: &GroupKey,
    full: bool,
    with_last: bool,
    template_path: Option<&std::path::Path>,
) -> Result<()> {
    let template = resolve_template(template_path)?;
    let view = if full {
        FetchView::Full
    } else if with_last {
        FetchView::WithLastCompleted
    } else {
        FetchView::NextOnly
    };

    let entries = service.fetch_current(key, view, Some(&template))?;

    if entries.is_empty() {
        println!("Plan complete - no pending days for {}.", key.source_plan_id);
        return Ok(());
    }

    for entry in &entries {
        display_entry(entry);
    }

    Ok(())
}

fn cmd_complete(
    service: &PlanService,
    key: &GroupKey,
    day: Option<u32>,
    entry_id: Option<Uuid>,
    results_json: Option<&str>,
    template_path: Option<&std::path::Path>,
) -> Result<()> {
    let template = resolve_template(template_path)?;

    let results: Vec<ExerciseResult> = match results_json {
        Some(json) => serde_json::from_str(json)
            .map_err(|e| Error::Validation(format!("Invalid results JSON: {}", e)))?,
        None => Vec::new(),
    };

    let target = if let Some(entry_id) = entry_id {
        CompletionTarget::EntryId(entry_id)
    } else {
        let day = match day {
            Some(day) => day,
            None => {
                // Default to the next pending day
                let next = service
                    .fetch_current(key, FetchView::NextOnly, Some(&template))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        Error::NotFound(format!("Plan {} has no pending days", key.source_plan_id))
                    })?;
                next.day_number
            }
        };
        CompletionTarget::Position {
            source_plan_id: key.source_plan_id.clone(),
            day,
        }
    };

    let outcome = service.submit_completion(
        &key.user_id,
        key.plan_type,
        &target,
        &results,
        Some(&template),
    )?;

    if outcome.already_completed {
        println!(
            "Day {} was already completed at {}.",
            outcome.entry.day_number,
            outcome
                .entry
                .completed_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown time".into())
        );
    } else {
        println!("✓ Day {} completed!", outcome.entry.day_number);
        for exercise in &outcome.entry.exercises {
            println!(
                "  {} - {}x{} ({} min)",
                exercise.name, exercise.sets, exercise.reps, exercise.minutes
            );
        }
    }

    Ok(())
}

fn cmd_stats(service: &PlanService, key: &GroupKey, refresh: bool) -> Result<()> {
    let stats = service.get_stats(&key.user_id, key.plan_type, refresh)?;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  PROGRESS ({})", stats.plan_type);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Days completed:  {}", stats.total_days);
    println!("  Total workouts:  {}", stats.total_workouts);
    println!("  Longest streak:  {} days", stats.longest_streak);
    println!();
    println!(
        "  Week  (batch {}): {}/{} done, {} to go",
        stats.weekly_progress.batch,
        stats.weekly_progress.completed,
        stats.weekly_progress.total,
        stats.weekly_progress.remaining
    );
    println!(
        "  Month (batch {}): {}/{} done, {} to go",
        stats.monthly_progress.batch,
        stats.monthly_progress.completed,
        stats.monthly_progress.total,
        stats.monthly_progress.remaining
    );

    if !stats.recent_workouts.is_empty() {
        println!();
        println!("  Recent workouts:");
        for name in &stats.recent_workouts {
            println!("    - {}", name);
        }
    }

    println!();
    Ok(())
}

fn cmd_plan(
    service: &PlanService,
    key: &GroupKey,
    exercises_path: &std::path::Path,
    days: u32,
    name: &str,
) -> Result<()> {
    let contents = std::fs::read_to_string(exercises_path)?;
    let exercises: Vec<Exercise> = serde_json::from_str(&contents).map_err(|e| {
        Error::Validation(format!(
            "Malformed exercise list {}: {}",
            exercises_path.display(),
            e
        ))
    })?;

    let template = service.distribute_template(name, None, None, &exercises, days)?;
    let outcome = service.sync_plan(&template, key)?;

    println!(
        "✓ Planned '{}' over {} days ({} inserted)",
        name,
        template.days.len(),
        outcome.inserted
    );
    for (i, day) in template.days.iter().enumerate() {
        let minutes: u32 = day.exercises.iter().map(|e| e.minutes).sum();
        println!(
            "  Day {}: {} exercise(s), {} min",
            i + 1,
            day.exercises.len(),
            minutes
        );
    }

    Ok(())
}

fn cmd_sync(
    service: &PlanService,
    key: &GroupKey,
    template_path: Option<&std::path::Path>,
) -> Result<()> {
    let template = resolve_template(template_path)?;
    let outcome = service.sync_plan(&template, key)?;

    if outcome.changed() == 0 {
        println!("Plan {} already up to date.", key.source_plan_id);
    } else {
        println!(
            "✓ Synced plan {}: {} inserted, {} replaced, {} pruned",
            key.source_plan_id, outcome.inserted, outcome.replaced, outcome.pruned
        );
    }
    if outcome.boundary > 0 {
        println!("  Days 1-{} already completed and untouched.", outcome.boundary);
    }

    Ok(())
}

fn cmd_export(
    service: &PlanService,
    key: &GroupKey,
    output: Option<PathBuf>,
    all_types: bool,
) -> Result<()> {
    let csv_path =
        output.unwrap_or_else(|| service.store().data_dir().join("history.csv"));
    let plan_type = if all_types { None } else { Some(key.plan_type) };

    let count = service.export_history(&key.user_id, plan_type, &csv_path)?;

    println!("✓ Exported {} completed entries", count);
    println!("  CSV: {}", csv_path.display());

    Ok(())
}

fn cmd_rollup(service: &PlanService, cleanup: bool) -> Result<()> {
    let (rolled, cleaned) = service.rollup_journal(cleanup)?;

    if rolled == 0 {
        println!("No journal events to roll up.");
    } else {
        println!("✓ Rolled up {} completion events to CSV", rolled);
    }
    if cleaned > 0 {
        println!("✓ Cleaned up {} processed journal files", cleaned);
    }

    Ok(())
}

fn display_entry(entry: &DailyPlanEntry) {
    let status = if entry.is_completed {
        "COMPLETED"
    } else {
        "PENDING"
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DAY {} - {}", entry.day_number, status);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Plan: {} ({})", entry.source_plan_id, entry.plan_type);

    if let Some(ref category) = entry.category {
        println!("  Category: {}", category);
    }
    if let Some(ref level) = entry.level {
        println!("  Level: {}", level);
    }
    if let Some(completed_at) = entry.completed_at {
        println!("  Completed: {}", completed_at.to_rfc3339());
    }

    println!();
    for exercise in &entry.exercises {
        print!(
            "  → {} - {}x{} ({} min)",
            exercise.name, exercise.sets, exercise.reps, exercise.minutes
        );
        match exercise.weight {
            Some(WeightSpec::Fixed(kg)) => print!(" @ {}kg", kg),
            Some(WeightSpec::Range { min, max }) => print!(" @ {}-{}kg", min, max),
            None => {}
        }
        println!();
    }
    println!();
    println!("  Total: ~{} minutes", entry.total_minutes());
    println!();
}
