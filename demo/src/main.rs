//! Aftercare follow-up orchestrator: demo CLI
//!
//! Plays the built-in scenarios, or drives a resumable follow-up workflow
//! whose patients live as JSON files in the store directory and whose stage
//! journal is a hash-chained JSONL file next to them. All model calls go to
//! the offline keyword model.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- scenario severe-bleeding
//!   cargo run -p demo -- enroll P100 "Ana Ruiz" "Wisdom Tooth Extraction" 2026-10-17 --phone +15551234567
//!   cargo run -p demo -- check-in P100
//!   cargo run -p demo -- respond P100 "Pain is about a 6, a little bleeding"
//!   cargo run -p demo -- process P100
//!   cargo run -p demo -- rerun P100 extract-symptoms
//!   cargo run -p demo -- receive +15551234567 "Swelling is worse today"
//!   cargo run -p demo -- intake P100
//!   cargo run -p demo -- send-care P100
//!   cargo run -p demo -- show P100
//!   cargo run -p demo -- journal

use std::{path::PathBuf, sync::Arc};

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use aftercare_audit::FileStageJournal;
use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    interaction::InteractionRecord,
    patient::{Patient, PatientId},
    stage::Stage,
};
use aftercare_core::{traits::RecordStore, DeliveryService, Orchestrator};
use aftercare_ref_dental::{
    dental_processors,
    scenarios::{self, print_record, print_step},
    AppConfig, ConsoleDelivery, JsonInbox, OfflineModel,
};
use aftercare_store::JsonFileRecordStore;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Post-operative dental follow-up: check-in, symptoms, risk, care, summary.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Dental post-op follow-up orchestrator demo",
    long_about = "Runs the built-in follow-up scenarios, or drives a resumable workflow:\n\
                  patients are stored as JSON files, every stage invocation is written\n\
                  to a hash-chained journal, and model calls use the offline model."
)]
struct Cli {
    /// TOML configuration file. Missing file means defaults.
    #[arg(long, global = true, default_value = "aftercare.toml")]
    config: PathBuf,

    /// Overrides `[store] dir` from the configuration.
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Run one scenario by name.
    Scenario {
        #[arg(value_parser = clap::builder::PossibleValuesParser::new(scenarios::NAMES))]
        name: String,
    },
    /// Register a patient.
    Enroll {
        id: String,
        name: String,
        procedure: String,
        /// Procedure date, YYYY-MM-DD.
        procedure_date: NaiveDate,
        #[arg(long, default_value = "")]
        contact: String,
        #[arg(long, default_value = "")]
        history: String,
        /// SMS destination, e.g. +15551234567.
        #[arg(long)]
        phone: Option<String>,
    },
    /// List enrolled patients.
    List,
    /// Send the check-in, opening a new round if the last one is finished.
    CheckIn { id: String },
    /// Record the patient's reply on the current round.
    Respond {
        id: String,
        text: String,
        /// Replace an existing reply and discard everything derived from it.
        #[arg(long)]
        replace: bool,
    },
    /// Run every remaining stage of the current round.
    Process { id: String },
    /// Clear a stage and everything after it, then run the pipeline again.
    Rerun { id: String, stage: StageArg },
    /// Replace the current round's care instructions or clinic summary with
    /// an edited text. Editing care regenerates the summary.
    Amend {
        id: String,
        output: OutputArg,
        text: String,
    },
    /// Append an inbound SMS to the inbox, as the webhook would.
    Receive { phone: String, message: String },
    /// Pull the patient's latest inbox message and process it.
    Intake { id: String },
    /// Deliver the current round's care instructions by SMS.
    SendCare { id: String },
    /// Print a patient's rounds and the current record.
    Show { id: String },
    /// Verify the stage journal's hash chain.
    Journal,
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    CheckIn,
    ExtractSymptoms,
    AssessRisk,
    GenerateCare,
    GenerateSummary,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::CheckIn => Stage::CheckIn,
            StageArg::ExtractSymptoms => Stage::ExtractSymptoms,
            StageArg::AssessRisk => Stage::AssessRisk,
            StageArg::GenerateCare => Stage::GenerateCare,
            StageArg::GenerateSummary => Stage::GenerateSummary,
        }
    }
}

/// Stage outputs a clinician may edit.
#[derive(Clone, Copy, ValueEnum)]
enum OutputArg {
    GenerateCare,
    GenerateSummary,
}

impl From<OutputArg> for Stage {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::GenerateCare => Stage::GenerateCare,
            OutputArg::GenerateSummary => Stage::GenerateSummary,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> AftercareResult<()> {
    match &cli.command {
        Command::RunAll => {
            print_banner();
            scenarios::run_all()?;
            println!("All scenarios completed successfully.");
            Ok(())
        }
        Command::Scenario { name } => {
            print_banner();
            scenarios::run_named(name).unwrap_or_else(|| {
                Err(AftercareError::ConfigError {
                    reason: format!("unknown scenario '{name}'"),
                })
            })
        }
        command => {
            let workspace = Workspace::open(cli)?;
            workspace.dispatch(command)
        }
    }
}

// ── Workflow commands ─────────────────────────────────────────────────────────

/// Configuration plus the on-disk store the workflow commands share.
struct Workspace {
    config: AppConfig,
    store_dir: PathBuf,
    store: JsonFileRecordStore,
}

impl Workspace {
    fn open(cli: &Cli) -> AftercareResult<Self> {
        let config = AppConfig::load(&cli.config)?;
        let store_dir = cli.store_dir.clone().unwrap_or_else(|| config.store.dir.clone());
        let store = JsonFileRecordStore::open(&store_dir)?;
        info!(store = %store_dir.display(), "workspace opened");
        Ok(Self {
            config,
            store_dir,
            store,
        })
    }

    fn journal(&self) -> AftercareResult<FileStageJournal> {
        FileStageJournal::open(self.store_dir.join("journal.jsonl"))
    }

    fn inbox(&self) -> JsonInbox {
        let path = self
            .config
            .intake
            .inbox_path
            .clone()
            .unwrap_or_else(|| self.store_dir.join("intake").join("inbox.json"));
        JsonInbox::new(path)
    }

    fn orchestrator(&self) -> AftercareResult<Orchestrator> {
        let processors = dental_processors(Arc::new(OfflineModel), self.config.risk_rules()?)?;
        Ok(Orchestrator::new(
            processors,
            Box::new(self.journal()?),
            self.config.orchestrator_config(),
        )
        .with_intake(Arc::new(self.inbox())))
    }

    fn patient(&self, id: &str) -> AftercareResult<Patient> {
        self.store
            .load(&PatientId(id.to_string()))?
            .ok_or_else(|| AftercareError::PreconditionUnmet {
                stage: "enroll".to_string(),
                reason: format!("patient '{id}' is not enrolled"),
            })
    }

    /// Write `record` back as the patient's latest round.
    fn commit(&self, patient: &mut Patient, record: InteractionRecord) -> AftercareResult<()> {
        patient.replace_latest(record)?;
        self.store.save(patient)
    }

    fn dispatch(&self, command: &Command) -> AftercareResult<()> {
        match command {
            Command::RunAll | Command::Scenario { .. } => Ok(()),
            Command::Enroll {
                id,
                name,
                procedure,
                procedure_date,
                contact,
                history,
                phone,
            } => {
                if self.store.load(&PatientId(id.clone()))?.is_some() {
                    return Err(AftercareError::PreconditionUnmet {
                        stage: "enroll".to_string(),
                        reason: format!("patient '{id}' is already enrolled"),
                    });
                }
                let mut patient = Patient::new(
                    id.as_str(),
                    name.as_str(),
                    procedure.as_str(),
                    *procedure_date,
                    contact.as_str(),
                    history.as_str(),
                );
                if let Some(phone) = phone {
                    patient = patient.with_phone_number(phone.as_str());
                }
                self.store.save(&patient)?;
                println!("Enrolled {} ({}).", patient.name, patient.id());
                Ok(())
            }
            Command::List => {
                for id in self.store.list()? {
                    println!("{id}");
                }
                Ok(())
            }
            Command::CheckIn { id } => {
                let mut patient = self.patient(id)?;
                let record = match patient.latest_interaction() {
                    Some(latest) if !latest.state().is_terminal() => latest.clone(),
                    _ => patient.add_interaction().clone(),
                };
                let run = self.orchestrator()?.run_stage(&patient, record, Stage::CheckIn)?;
                print_step("check-in", &run.outcome);
                if let Some(message) = run.record.check_in_message() {
                    println!("  {message}");
                }
                self.commit(&mut patient, run.record)
            }
            Command::Respond { id, text, replace } => {
                let mut patient = self.patient(id)?;
                let record = current_round(&patient)?;
                let orchestrator = self.orchestrator()?;
                let run = if *replace {
                    orchestrator.replace_response(&patient, record, text)?
                } else {
                    orchestrator.record_response(&patient, record, text)?
                };
                print_step("response", &run.outcome);
                self.commit(&mut patient, run.record)
            }
            Command::Process { id } => {
                let mut patient = self.patient(id)?;
                let record = current_round(&patient)?;
                let run = self.orchestrator()?.process_remaining(&patient, record)?;
                for (stage, outcome) in &run.steps {
                    print_step(&stage.to_string(), outcome);
                }
                if run.steps.is_empty() {
                    println!("  nothing to do, state is '{}'", run.record.state());
                }
                print_record(&run.record);
                self.commit(&mut patient, run.record)
            }
            Command::Rerun { id, stage } => {
                let mut patient = self.patient(id)?;
                let record = current_round(&patient)?;
                let stage = Stage::from(*stage);
                let orchestrator = self.orchestrator()?;

                let rerun = orchestrator.force_rerun(&patient, record, stage)?;
                print_step(&stage.to_string(), &rerun.outcome);
                let record = if rerun.outcome.advanced() {
                    let run = orchestrator.process_remaining(&patient, rerun.record)?;
                    for (stage, outcome) in &run.steps {
                        print_step(&stage.to_string(), outcome);
                    }
                    run.record
                } else {
                    rerun.record
                };
                print_record(&record);
                self.commit(&mut patient, record)
            }
            Command::Amend { id, output, text } => {
                let mut patient = self.patient(id)?;
                let record = current_round(&patient)?;
                let stage = Stage::from(*output);
                let orchestrator = self.orchestrator()?;

                let amended = orchestrator.amend_output(&patient, record, stage, text)?;
                print_step(&format!("amend {stage}"), &amended.outcome);
                let run = orchestrator.process_remaining(&patient, amended.record)?;
                for (stage, outcome) in &run.steps {
                    print_step(&stage.to_string(), outcome);
                }
                print_record(&run.record);
                self.commit(&mut patient, run.record)
            }
            Command::Receive { phone, message } => {
                self.inbox().deliver(phone, message)?;
                println!("Message from {phone} added to the inbox.");
                Ok(())
            }
            Command::Intake { id } => {
                let mut patient = self.patient(id)?;
                let record = current_round(&patient)?;
                let run = self.orchestrator()?.process_intake(&patient, record)?;
                print_step("intake", &run.receipt);
                for (stage, outcome) in &run.steps {
                    print_step(&stage.to_string(), outcome);
                }
                println!("  Marked processed:   {}", run.marked_processed);
                print_record(&run.record);
                self.commit(&mut patient, run.record)
            }
            Command::SendCare { id } => {
                let patient = self.patient(id)?;
                let record = current_round(&patient)?;
                let care = record.care_instructions().ok_or_else(|| AftercareError::PreconditionUnmet {
                    stage: Stage::GenerateCare.to_string(),
                    reason: "the current round has no care instructions yet".to_string(),
                })?;
                let destination = patient.phone_number.as_deref().ok_or_else(|| {
                    AftercareError::PreconditionUnmet {
                        stage: "send-care".to_string(),
                        reason: format!("patient {} has no phone number", patient.id()),
                    }
                })?;
                let delivery = DeliveryService::new(Box::new(ConsoleDelivery::new(
                    self.config.delivery.segment_length,
                )));
                let receipt = delivery.deliver(destination, care)?;
                if receipt.delivered() {
                    println!("Delivered {} segment(s) to {destination}.", receipt.segments.len());
                } else {
                    println!("Delivery to {destination} failed; nothing was sent.");
                }
                Ok(())
            }
            Command::Show { id } => {
                let patient = self.patient(id)?;
                println!(
                    "{} ({}), {} on {}",
                    patient.name,
                    patient.id(),
                    patient.procedure,
                    patient.procedure_date
                );
                for (i, round) in patient.interactions().iter().enumerate() {
                    println!(
                        "  round {} [{}] {}",
                        i + 1,
                        round.timestamp().format("%Y-%m-%d %H:%M"),
                        round.state()
                    );
                }
                if let Some(latest) = patient.latest_interaction() {
                    println!();
                    print_record(latest);
                }
                Ok(())
            }
            Command::Journal => {
                let journal = self.journal()?;
                let log = journal.export_log();
                println!(
                    "Journal {}: {} event(s), integrity {}",
                    journal.path().display(),
                    log.events.len(),
                    if journal.verify_integrity() { "VERIFIED" } else { "FAILED" }
                );
                Ok(())
            }
        }
    }
}

fn current_round(patient: &Patient) -> AftercareResult<InteractionRecord> {
    patient
        .latest_interaction()
        .cloned()
        .ok_or_else(|| AftercareError::PreconditionUnmet {
            stage: Stage::CheckIn.to_string(),
            reason: format!("no check-in has been sent to {}", patient.id()),
        })
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Aftercare: post-operative dental follow-up");
    println!("==========================================");
    println!();
    println!("Pipeline per round:");
    println!("  [1] Check-in message sent to the patient");
    println!("  [2] Reply decoded into symptoms against a strict JSON Schema");
    println!("  [3] Risk graded by the TOML rule table (Unknown when it cannot be)");
    println!("  [4] Care instructions written; High risk always escalates");
    println!("  [5] Clinic summary; every step journalled to a SHA-256 chain");
    println!();
}
