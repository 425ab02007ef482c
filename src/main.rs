//! Rice Leaf Classifier CLI
//!
//! Entry point for checking and classifying rice leaf photos from the
//! command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use rice_leaf_classifier::backend::backend_name;
use rice_leaf_classifier::inference::{
    Diagnosis, LeafValidator, MODEL_UNAVAILABLE_MESSAGE, NOT_A_LEAF_MESSAGE,
};
use rice_leaf_classifier::knowledge::{DiseaseRecord, KnowledgeBase};
use rice_leaf_classifier::utils::load_image;
use rice_leaf_classifier::utils::logging::{init_logging, LogConfig};
use rice_leaf_classifier::{AppConfig, ClassificationOutcome, RiceLeafError};

/// Rice Leaf Disease Classification
///
/// Checks that an upload looks like a leaf, classifies it with a Burn CNN
/// and prints treatment advice for the predicted disease.
#[derive(Parser, Debug)]
#[command(name = "rice_leaf_classifier")]
#[command(version)]
#[command(about = "Rice leaf disease classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Path to a JSON configuration file
    #[arg(short, long, global = true, env = "RICE_LEAF_CONFIG")]
    config: Option<PathBuf>,

    /// Knowledge base JSON file (overrides the configuration)
    #[arg(long, global = true)]
    knowledge_base: Option<PathBuf>,

    /// Green coverage threshold of the leaf check (overrides the configuration)
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run only the leaf check on an image
    Validate {
        /// Path to the input image
        #[arg(short, long)]
        input: PathBuf,

        /// Write the green pixel mask to this path
        #[arg(long)]
        mask: Option<PathBuf>,
    },

    /// Check and classify an image
    Classify {
        /// Path to the input image
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the model weights (tried before the configured paths)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print the knowledge base entry for a label
    Lookup {
        /// Class label, e.g. "Brown Spot"
        label: String,
    },

    /// List the class labels in model output order
    Labels,

    /// Write the default configuration to a file
    Config {
        /// Output path for the configuration
        #[arg(short, long, default_value = "rice_leaf_config.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    let mut config = AppConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Validate { input, mask } => {
            config.apply_overrides(None, cli.knowledge_base, cli.threshold);
            cmd_validate(&config, &input, mask.as_deref())?;
        }

        Commands::Classify { input, model, json } => {
            config.apply_overrides(model, cli.knowledge_base, cli.threshold);
            cmd_classify(&config, &input, json)?;
        }

        Commands::Lookup { label } => {
            config.apply_overrides(None, cli.knowledge_base, None);
            cmd_lookup(&config, &label)?;
        }

        Commands::Labels => {
            cmd_labels(&config)?;
        }

        Commands::Config { output } => {
            AppConfig::default()
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{} {}", "Default configuration written to".green(), output.display());
        }
    }

    Ok(())
}

fn cmd_validate(config: &AppConfig, input: &Path, mask: Option<&Path>) -> Result<()> {
    config.validator.validate()?;

    let image = load_image(input)?;
    let validator = LeafValidator::new(config.validator);
    let verdict = validator.assess(&image);

    println!("{}", "Leaf Check:".cyan().bold());
    println!("  Input:     {}", input.display());
    match verdict.coverage {
        Some(coverage) => println!(
            "  Green:     {} / {} pixels ({:.1}%)",
            coverage.green_pixels,
            coverage.total_pixels,
            coverage.green_ratio * 100.0
        ),
        None => println!("  Green:     {}", "inconclusive".yellow()),
    }
    println!(
        "  Threshold: {:.1}%",
        config.validator.green_ratio_threshold * 100.0
    );

    if let Some(mask_path) = mask {
        validator
            .green_mask(&image.to_rgb8())
            .save(mask_path)
            .with_context(|| format!("Failed to write mask to {}", mask_path.display()))?;
        println!("  Mask:      {}", mask_path.display());
    }

    println!();
    if verdict.leaf_like {
        println!("{}", "Looks like a leaf".green().bold());
        Ok(())
    } else {
        println!("{}", NOT_A_LEAF_MESSAGE.yellow());
        std::process::exit(2);
    }
}

fn cmd_classify(config: &AppConfig, input: &Path, json: bool) -> Result<()> {
    let image = match load_image(input) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e.user_message());
            std::process::exit(1);
        }
    };

    info!("Using {} backend", backend_name());
    let pipeline = config.build_pipeline()?;

    match pipeline.diagnose(&image) {
        Ok(Diagnosis::Classified(outcome)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&Diagnosis::Classified(outcome))?);
            } else {
                print_outcome(&outcome);
            }
            Ok(())
        }
        Ok(diagnosis @ Diagnosis::NotALeaf { .. }) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&diagnosis)?);
            } else {
                println!("{}", NOT_A_LEAF_MESSAGE.yellow());
            }
            std::process::exit(2);
        }
        Err(RiceLeafError::ModelUnavailable(reason)) => {
            info!("Model unavailable: {}", reason);
            eprintln!("{} {}", "Error:".red(), MODEL_UNAVAILABLE_MESSAGE);
            std::process::exit(3);
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e.user_message());
            std::process::exit(1);
        }
    }
}

fn print_outcome(outcome: &ClassificationOutcome) {
    println!("{}", "Diagnosis:".cyan().bold());
    let label = if outcome.is_healthy() {
        outcome.predicted_label.green().bold()
    } else {
        outcome.predicted_label.red().bold()
    };
    println!("  Prediction: {}", label);
    println!("  Confidence: {:.2}%", outcome.confidence);
    println!("  Time:       {:.2}ms", outcome.inference_time_ms);
    println!();

    println!("{}", "Class probabilities:".cyan());
    for (i, class) in outcome.top_k(outcome.probabilities.len()).iter().enumerate() {
        println!("  {}. {:24} {:>6.2}%", i + 1, class.label, class.percentage);
    }
    println!();

    print_record(&outcome.disease_info);
}

fn print_record(record: &DiseaseRecord) {
    match record {
        DiseaseRecord::Disease(profile) => {
            print!("{}", profile.disease_name.bold());
            match &profile.scientific_name {
                Some(scientific) => println!(" ({})", scientific.italic()),
                None => println!(),
            }
            print_list("Symptoms", &profile.symptoms);
            print_list("Prevention", &profile.prevention_methods);
            if !profile.organic_cures.is_empty() {
                println!("{}", "Organic treatments:".yellow());
                for cure in &profile.organic_cures {
                    println!("  - {} ({}): {}", cure.name, cure.kind, cure.application);
                }
            }
            if !profile.chemical_pesticides.is_empty() {
                println!("{}", "Chemical control:".yellow());
                for pesticide in &profile.chemical_pesticides {
                    println!(
                        "  - {}: {} (safety period {})",
                        pesticide.name, pesticide.dosage, pesticide.safety_period
                    );
                }
            }
        }
        DiseaseRecord::Healthy(profile) => {
            println!("{}", profile.disease_name.bold());
            print_list("Characteristics", &profile.characteristics);
            print_list("Maintenance", &profile.maintenance_practices);
        }
        DiseaseRecord::Empty(_) => {
            println!("{}", "No reference information for this class.".yellow());
        }
    }
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{}", format!("{}:", title).yellow());
    for item in items {
        println!("  - {}", item);
    }
}

fn cmd_lookup(config: &AppConfig, label: &str) -> Result<()> {
    let knowledge = KnowledgeBase::load(config.knowledge_base.as_deref());
    let record = knowledge.lookup(label);

    if record.is_empty() {
        eprintln!("{} no entry for '{}'", "Warning:".yellow(), label);
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn cmd_labels(config: &AppConfig) -> Result<()> {
    let labels = config.label_set()?;
    println!("{}", "Class labels (model output order):".cyan().bold());
    for (i, label) in labels.iter().enumerate() {
        println!("  {}. {}", i, label);
    }
    Ok(())
}
