use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand};

mod artifact;
mod config;
mod db;
mod error;
mod models;
mod predictor;
mod report;
mod sql_guard;
mod telemetry;

use artifact::ModelArtifact;
use config::AppConfig;
use models::StudentSummary;
use predictor::{Assessment, EligibilityPredictor};
use report::ReportKind;

#[derive(Parser)]
#[command(name = "placement-insights")]
#[command(about = "Placement readiness reports and eligibility predictions", long_about = None)]
struct Cli {
    /// SQLite database file (overrides PLACEMENT_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Model artifact (overrides PLACEMENT_MODEL_PATH)
    #[arg(long, global = true)]
    model: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("selector")
        .args(["student_id", "name"])
        .required(true)
        .multiple(false)
))]
struct StudentSelector {
    #[arg(long)]
    student_id: Option<i64>,
    #[arg(long)]
    name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema if it does not exist yet
    InitDb,
    /// Load students and their profiles from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List students by name
    Students,
    /// Show the feature row used for prediction
    Features {
        #[command(flatten)]
        student: StudentSelector,
    },
    /// Predict placement eligibility for one student
    Predict {
        #[command(flatten)]
        student: StudentSelector,
    },
    /// Run the report catalog and render it as markdown
    Report {
        /// Report number (1-10) or slug; repeat to pick several
        #[arg(long)]
        only: Vec<ReportKind>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run a single read-only SQL statement
    Query {
        #[arg(long)]
        sql: String,
    },
    /// Students who solved more than the given number of problems
    TopProgrammers {
        #[arg(long, default_value_t = 50)]
        min_problems: i64,
    },
    /// Students above a score in both communication and teamwork
    SoftSkills {
        #[arg(long, default_value_t = 75)]
        min_score: i64,
    },
    /// Describe the loaded model artifact
    ModelInfo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().with_overrides(cli.db, cli.model);
    telemetry::init(&config.telemetry)?;

    let db_path = config.db_path.as_path();

    match cli.command {
        Commands::InitDb => {
            db::init_db(db_path).await?;
            println!("Schema ready in {}.", db_path.display());
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(db_path, &csv).await?;
            println!("Imported {inserted} students from {}.", csv.display());
        }
        Commands::Students => {
            let students = db::list_students(db_path).await?;
            if students.is_empty() {
                println!("{}", report::EMPTY_RESULT);
                return Ok(());
            }
            for student in students {
                println!("{:>5}  {}", student.student_id, student.name);
            }
        }
        Commands::Features { student } => {
            let Some(student) = resolve_student(db_path, &student).await? else {
                return Ok(());
            };
            match db::student_features(db_path, student.student_id).await? {
                Some(row) => print!("{}", report::render_table(&row.to_table())),
                None => println!("No feature data for {}.", student.name),
            }
        }
        Commands::Predict { student } => {
            let predictor = match ModelArtifact::load(&config.model_path) {
                Ok(model) => EligibilityPredictor::new(Arc::new(model)),
                Err(err) => {
                    tracing::warn!(error = %err, "model unavailable");
                    println!("{err}");
                    return Ok(());
                }
            };
            let Some(student) = resolve_student(db_path, &student).await? else {
                return Ok(());
            };

            let features = db::student_features(db_path, student.student_id).await?;
            match predictor.assess(features.as_ref()) {
                Ok(Assessment::NoFeatureData) => {
                    println!("No feature data for {}; prediction skipped.", student.name);
                }
                Ok(Assessment::Scored(eligibility)) => {
                    let verdict = if eligibility.is_eligible() {
                        "Eligible"
                    } else {
                        "Not Eligible"
                    };
                    println!("{}: {verdict} ({})", student.name, predictor.classifier_name());
                    println!("Confidence: {:.2}%", eligibility.confidence_percent());
                }
                Err(err) => {
                    tracing::warn!(student_id = student.student_id, error = %err, "prediction failed");
                    println!("{err}");
                }
            }
        }
        Commands::Report { only, out } => {
            let kinds = if only.is_empty() {
                ReportKind::all().to_vec()
            } else {
                only
            };
            let rendered = report::build_report(db_path, &kinds).await?;
            match out {
                Some(out) => {
                    std::fs::write(&out, rendered)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Report written to {}.", out.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Query { sql } => match db::run_ad_hoc_query(db_path, &sql).await {
            Ok(table) => print!("{}", report::render_table(&table)),
            Err(err) => println!("Error executing query: {err}"),
        },
        Commands::TopProgrammers { min_problems } => {
            let table = db::top_programmers(db_path, min_problems).await?;
            print!("{}", report::render_table(&table));
        }
        Commands::SoftSkills { min_score } => {
            let table = db::high_soft_skills(db_path, min_score).await?;
            print!("{}", report::render_table(&table));
        }
        Commands::ModelInfo => match ModelArtifact::load(&config.model_path) {
            Ok(model) => {
                println!("Model class: {}", model.kind());
                println!("Estimators: {}", model.estimator_count());
                println!("Features: {}", model.feature_names().join(", "));
            }
            Err(err) => println!("{err}"),
        },
    }

    Ok(())
}

async fn resolve_student(
    db_path: &Path,
    selector: &StudentSelector,
) -> anyhow::Result<Option<StudentSummary>> {
    let student = match (&selector.student_id, &selector.name) {
        (Some(id), _) => db::find_student(db_path, *id).await?,
        (None, Some(name)) => db::find_student_by_name(db_path, name).await?,
        (None, None) => None,
    };

    if student.is_none() {
        let label = selector
            .student_id
            .map(|id| format!("id {id}"))
            .or_else(|| selector.name.clone())
            .unwrap_or_default();
        println!("No student found for {label}.");
    }
    Ok(student)
}
