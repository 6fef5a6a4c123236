//! # Item Forge Command Line
//!
//! Builds an engine from the builtin or a JSON configuration, optionally
//! pre-warms the cache, and prints generated items.

use clap::{Parser, ValueEnum};
use item_forge::{EngineConfig, ForgeError, ForgeResult, Generated, ItemEngine, ItemKind, Rarity};
use log::{error, info};

/// Item kind selection on the command line.
#[derive(ValueEnum, Debug, Clone, Copy)]
enum KindArg {
    Weapon,
    Armor,
}

impl From<KindArg> for ItemKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Weapon => ItemKind::Weapon,
            KindArg::Armor => ItemKind::Armor,
        }
    }
}

/// Command line arguments for the item forge.
#[derive(Parser, Debug)]
#[command(name = "item-forge")]
#[command(about = "Procedural weapon and armor generation with a hybrid template cache")]
#[command(version)]
struct Args {
    /// Random seed for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON configuration file (builtin tables when omitted)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Kind of item to generate
    #[arg(short, long, value_enum, default_value = "weapon")]
    kind: KindArg,

    /// Rarity tier name, numeric rank, or "random" for a weighted roll
    #[arg(short, long, default_value = "random")]
    rarity: String,

    /// Required level of generated items
    #[arg(short, long, default_value_t = 1)]
    level: u32,

    /// Number of items to generate
    #[arg(short = 'n', long, default_value_t = 5)]
    count: usize,

    /// Pre-warm the configured buckets and serve items through the cache
    #[arg(long)]
    warm: bool,

    /// Print cache statistics for the requested bucket(s) afterwards
    #[arg(long)]
    stats: bool,

    /// Print items as JSON lines
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    initialize_logging(&args.log_level);

    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Initializes env_logger with the requested filter.
fn initialize_logging(log_level: &str) {
    env_logger::Builder::new()
        .parse_filters(log_level)
        .format_target(false)
        .init();
}

fn run(args: &Args) -> ForgeResult<()> {
    info!("Starting Item Forge v{}", item_forge::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            EngineConfig::from_path(path)?
        }
        None => EngineConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let engine = ItemEngine::new(config)?;
    let kind = ItemKind::from(args.kind);
    let fixed_rarity = parse_rarity(&engine, &args.rarity)?;

    if args.warm {
        let report = engine.warm_configured()?;
        info!(
            "Pre-warmed {} templates across {} buckets",
            report.produced,
            engine.config().prewarm.len()
        );
    }

    let mut served = Vec::new();
    for _ in 0..args.count {
        let rarity = fixed_rarity.unwrap_or_else(|| engine.roll_rarity());
        let generated = if args.warm {
            let generated = engine.get_or_generate(kind, rarity, args.level)?;
            engine.pump_refills(None);
            generated
        } else {
            engine.generate(kind, rarity, args.level)?
        };
        print_item(&generated, args.json)?;
        served.push(rarity);
    }

    if args.stats {
        served.sort();
        served.dedup();
        for rarity in served {
            let stats = engine.get_cache_stats(kind, rarity)?;
            println!(
                "{} {}: hits={} misses={} templates={} generated={} state={:?}",
                kind,
                rarity,
                stats.hits,
                stats.misses,
                stats.template_count,
                stats.generated,
                stats.state
            );
        }
    }

    Ok(())
}

/// Parses a rarity argument. `None` means roll one per item.
fn parse_rarity(engine: &ItemEngine, text: &str) -> ForgeResult<Option<Rarity>> {
    if text.eq_ignore_ascii_case("random") {
        return Ok(None);
    }

    let table = engine.factory().rarity_table();
    if let Some(tier) = table.tier_by_name(text) {
        return Ok(Some(tier.rarity()));
    }

    let rank: u8 = text
        .parse()
        .map_err(|_| ForgeError::InvalidConfig(format!("unknown rarity '{}'", text)))?;
    let tier = table.tier_for(Rarity(rank))?;
    Ok(Some(tier.rarity()))
}

fn print_item(generated: &Generated, json: bool) -> ForgeResult<()> {
    if json {
        println!("{}", serde_json::to_string(&generated.item)?);
    } else {
        println!("{}", generated.item);
    }
    for warning in &generated.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}
