use chrono::Utc;
use clap::{Parser, Subcommand};
use portal_core::{
    CaseFilter, CaseLifecycleService, CaseStatus, Clinic, CoreConfig, LogNotifier, Provider,
    RecordId, ReportService, User, UserRole,
};
use portal_files::DocumentService;
use portal_store::JsonStore;
use portal_types::{EmailAddress, NonEmptyText};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Clinic portal lab-side CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List cases, newest first
    ListCases {
        /// Restrict to one clinic id
        #[arg(long)]
        clinic: Option<String>,
        /// Restrict to one status (snake_case name)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one case and its consent records
    ShowCase {
        /// Case id
        case_id: String,
    },
    /// Set a case's status
    SetStatus {
        /// Case id
        case_id: String,
        /// Target status (snake_case name)
        status: String,
    },
    /// Upload a finished report for a case
    UploadReport {
        /// Case id
        case_id: String,
        /// Path to the report file
        file: PathBuf,
    },
    /// Record that a consent has been signed
    MarkSigned {
        /// Consent id
        consent_id: String,
    },
    /// Register a clinic
    AddClinic {
        /// Clinic name
        name: String,
        /// Postal address
        #[arg(long)]
        address: Option<String>,
    },
    /// Register a portal user
    AddUser {
        first_name: String,
        last_name: String,
        email: String,
        /// Clinic id the user belongs to (omit for lab admins)
        #[arg(long)]
        clinic: Option<String>,
        /// Grant the lab admin role
        #[arg(long)]
        admin: bool,
    },
    /// Register an ordering provider at a clinic
    AddProvider {
        /// Clinic id
        clinic_id: String,
        first_name: String,
        last_name: String,
        /// Professional credentials, e.g. "MD"
        #[arg(long)]
        credentials: Option<String>,
    },
}

fn open_store() -> Result<Arc<JsonStore>, Box<dyn std::error::Error>> {
    let data_dir = std::env::var("PORTAL_DATA_DIR").unwrap_or_else(|_| "/portal_data".into());
    Ok(Arc::new(JsonStore::new(data_dir.as_str())?))
}

fn open_report_service(
    store: Arc<JsonStore>,
) -> Result<ReportService, Box<dyn std::error::Error>> {
    let documents_dir =
        std::env::var("PORTAL_DOCUMENTS_DIR").unwrap_or_else(|_| "/portal_documents".into());
    let public_base_url = std::env::var("PORTAL_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".into());
    let documents = Arc::new(DocumentService::new(
        PathBuf::from(documents_dir).as_path(),
        &public_base_url,
    )?);
    Ok(ReportService::new(
        store.clone(),
        documents,
        store,
        Arc::new(LogNotifier),
    ))
}

fn print_case(case: &portal_core::Case) {
    println!(
        "{}  {}  {}  {} {}  clinic {}",
        case.case_number,
        case.id,
        case.status,
        case.patient.first_name,
        case.patient.last_name,
        case.clinic_id
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::ListCases { clinic, status }) => {
            let store = open_store()?;
            let filter = CaseFilter {
                clinic_id: clinic.as_deref().map(RecordId::parse).transpose()?,
                status: status.as_deref().map(str::parse::<CaseStatus>).transpose()?,
            };
            let lifecycle = CaseLifecycleService::new(store.clone(), store);
            let cases = lifecycle.list_cases(&filter)?;
            if cases.is_empty() {
                println!("No cases found.");
            } else {
                for case in &cases {
                    print_case(case);
                }
            }
        }
        Some(Commands::ShowCase { case_id }) => {
            let store = open_store()?;
            let lifecycle = CaseLifecycleService::new(store.clone(), store);
            let id = RecordId::parse(&case_id)?;
            let case = lifecycle.fetch_case(id)?;
            print_case(&case);
            println!(
                "  tests: {}",
                case.tests_ordered
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("  indication: {}", case.indication);
            if let Some(path) = &case.karyotype_file_path {
                println!("  karyotype: {}", path);
            }
            if let Some(url) = &case.report_file_url {
                println!("  report: {}", url);
            }
            for consent in lifecycle.consents_for_case(id)? {
                let signed = match consent.signed_at {
                    Some(at) => format!("signed {}", at.to_rfc3339()),
                    None => "unsigned".to_string(),
                };
                println!(
                    "  consent {} ({}): {} <{}> {}",
                    consent.id,
                    consent.signer_role,
                    consent.recipient_name,
                    consent.recipient_email,
                    signed
                );
            }
        }
        Some(Commands::SetStatus { case_id, status }) => {
            let store = open_store()?;
            let lifecycle = CaseLifecycleService::new(store.clone(), store);
            let target = status.parse::<CaseStatus>()?;
            match lifecycle.set_status(RecordId::parse(&case_id)?, target) {
                Ok(case) => println!("{} is now {}", case.case_number, case.status),
                Err(e) => eprintln!("Error setting status: {}", e),
            }
        }
        Some(Commands::UploadReport { case_id, file }) => {
            let store = open_store()?;
            let reports = open_report_service(store)?;
            let bytes = std::fs::read(&file)?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "report.pdf".to_string());
            match reports.upload_report(RecordId::parse(&case_id)?, &file_name, &bytes) {
                Ok(outcome) => println!(
                    "{} is now {}; notified {} user(s)",
                    outcome.case.case_number, outcome.case.status, outcome.notified_users
                ),
                Err(e) => eprintln!("Error uploading report: {}", e),
            }
        }
        Some(Commands::MarkSigned { consent_id }) => {
            let store = open_store()?;
            let lifecycle = CaseLifecycleService::new(store.clone(), store);
            match lifecycle.mark_consent_signed(RecordId::parse(&consent_id)?, Utc::now()) {
                Ok(consent) => println!(
                    "Consent {} ({}) marked signed",
                    consent.id, consent.signer_role
                ),
                Err(e) => eprintln!("Error marking consent signed: {}", e),
            }
        }
        Some(Commands::AddClinic { name, address }) => {
            let store = open_store()?;
            let clinic = Clinic {
                id: RecordId::new(),
                name: NonEmptyText::new(&name)?,
                address,
                is_active: true,
            };
            store.put_clinic(&clinic)?;
            println!("Added clinic {} with id {}", clinic.name, clinic.id);
        }
        Some(Commands::AddUser {
            first_name,
            last_name,
            email,
            clinic,
            admin,
        }) => {
            let store = open_store()?;
            let user = User {
                id: RecordId::new(),
                clinic_id: clinic.as_deref().map(RecordId::parse).transpose()?,
                first_name: NonEmptyText::new(&first_name)?,
                last_name: NonEmptyText::new(&last_name)?,
                email: EmailAddress::new(&email)?,
                role: if admin {
                    UserRole::LabAdmin
                } else {
                    UserRole::ClinicUser
                },
                is_active: true,
            };
            store.put_user(&user)?;
            println!("Added user {} {} with id {}", user.first_name, user.last_name, user.id);
        }
        Some(Commands::AddProvider {
            clinic_id,
            first_name,
            last_name,
            credentials,
        }) => {
            let store = open_store()?;
            let provider = Provider {
                id: RecordId::new(),
                clinic_id: RecordId::parse(&clinic_id)?,
                first_name: NonEmptyText::new(&first_name)?,
                last_name: NonEmptyText::new(&last_name)?,
                credentials,
                is_active: true,
            };
            store.put_provider(&provider)?;
            println!(
                "Added provider {} {} with id {}",
                provider.first_name, provider.last_name, provider.id
            );
        }
        None => {
            println!("No command given. Try `portal --help`.");
        }
    }

    Ok(())
}
