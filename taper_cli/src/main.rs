use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use taper_core::*;

#[derive(Parser)]
#[command(name = "taper")]
#[command(about = "Benzodiazepine taper schedule generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a taper plan
    Plan {
        /// Starting medication (e.g. clonazepam)
        #[arg(long)]
        med: String,

        /// Starting daily dose in mg
        #[arg(long)]
        dose: f64,

        /// Taper speed label (see `taper speeds`)
        #[arg(long)]
        speed: Option<String>,

        /// Start date YYYY-MM-DD (default: today)
        #[arg(long)]
        start: Option<String>,

        /// Dosing frequency: auto, once, bid or tid
        #[arg(long)]
        frequency: Option<String>,

        /// Final hold: DAYS EVERY_N (e.g. 6 3 = 6 days, dose every 3 days)
        #[arg(long, num_args = 2, value_names = ["DAYS", "EVERY_N"])]
        final_hold: Option<Vec<u32>>,

        /// Diazepam tablet strengths in mg, comma separated (e.g. 10,5,2)
        #[arg(long, value_delimiter = ',')]
        strengths: Option<Vec<f64>>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        /// Also write pharmacy orders to this CSV file
        #[arg(long)]
        orders_csv: Option<PathBuf>,
    },

    /// List medications in the equivalency table
    Meds,

    /// List taper speeds, gentlest first
    Speeds,

    /// List tablet strengths for a medication
    Strengths {
        medication: String,
    },

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    // Initialize logging
    taper_core::logging::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn load_engine(path: Option<&Path>) -> Result<TaperEngine> {
    TaperEngine::from_config(&load_config(path)?)
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Plan {
            med,
            dose,
            speed,
            start,
            frequency,
            final_hold,
            strengths,
            json,
            orders_csv,
        } => {
            let config = load_config(config_path)?;
            let engine = TaperEngine::from_config(&config)?;
            let start_date = match start {
                Some(ref s) => parse_start_date(s)?,
                None => chrono::Local::now().date_naive(),
            };
            let speed = speed.unwrap_or_else(|| config.taper.default_speed.clone());

            let mut request = TaperRequest::new(&med, dose, &speed, start_date)
                .with_frequency(match frequency {
                    Some(ref f) => f.parse()?,
                    None => config.taper.default_frequency,
                });
            if let Some(hold) = final_hold {
                request = request.with_final_hold(hold[0], hold[1]);
            }
            if let Some(mgs) = strengths {
                request = request.with_strengths(mgs.into_iter().map(Dose::from_mg).collect());
            }

            cmd_plan(&engine, &request, json, orders_csv)
        }
        Commands::Meds => {
            let engine = load_engine(config_path)?;
            for med in engine.catalog().medications() {
                println!("{}", med);
            }
            Ok(())
        }
        Commands::Speeds => {
            let engine = load_engine(config_path)?;
            for speed in engine.catalog().speeds() {
                println!(
                    "{:<12} {:>5}% every {} days",
                    speed.label, speed.percent_reduction, speed.interval_days
                );
            }
            Ok(())
        }
        Commands::Strengths { medication } => {
            let engine = load_engine(config_path)?;
            match engine.catalog().strengths_for(&medication) {
                Some(strengths) => {
                    let list: Vec<String> = strengths.iter().map(|s| s.to_string()).collect();
                    println!("{}: {} mg", medication.to_lowercase(), list.join(", "));
                }
                None => println!("No tablet strengths known for {}", medication),
            }
            Ok(())
        }
        Commands::InitConfig { force } => cmd_init_config(config_path, force),
    }
}

fn cmd_init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };
    if target.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            target.display()
        )));
    }

    let config = Config::default();
    match path {
        Some(path) => config.save_to(path)?,
        None => config.save()?,
    }
    println!("✓ Wrote default config to {}", target.display());
    Ok(())
}

fn cmd_plan(
    engine: &TaperEngine,
    request: &TaperRequest,
    json: bool,
    orders_csv: Option<PathBuf>,
) -> Result<()> {
    let plan = engine.plan(request)?;
    tracing::debug!("Plan has {} steps", plan.steps.len());

    if let Some(ref path) = orders_csv {
        let count = write_pharmacy_orders_csv(&pharmacy_orders(&plan), path)?;
        eprintln!("✓ Wrote {} pharmacy orders to {}", count, path.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if let Some(ref warning) = plan.warning {
        println!("⚠️  {}\n", warning);
    }

    if plan.is_empty() {
        println!("❌ No valid taper schedule could be generated.");
        return Ok(());
    }

    display_plan(&plan);
    Ok(())
}

fn display_plan(plan: &TaperPlan) {
    println!("🧑‍⚕️  PATIENT INSTRUCTIONS\n──────────────────────────");
    for line in patient_instructions(plan) {
        println!("{}", line);
    }

    println!("\n📄  EHR SUMMARY\n──────────────");
    println!("{}", ehr_summary(plan));

    println!("\n💊  PHARMACY ORDERS\n────────────────");
    for order in pharmacy_orders(plan) {
        println!(
            "{}\n  {}\n  {}\n  {}\n",
            order.date,
            order.product,
            order.sig,
            order.dispense_line()
        );
    }

    println!("🧮  TOTAL PILLS NEEDED\n────────────────────");
    for (strength, count) in pill_totals(plan).iter().rev() {
        println!("Diazepam {} mg: {} tablets", strength, count);
    }
}
