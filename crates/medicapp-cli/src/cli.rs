use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "medicapp", version, about = "Clinic administration from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and start a session
    Login {
        username: String,
        /// Use the system admin portal
        #[arg(long)]
        admin: bool,
        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// End the session
    Logout {
        /// Also remove the remembered password
        #[arg(long)]
        forget: bool,
    },
    /// Show the current session state
    Status,
    /// Check whether a screen would render for the current viewer
    Open { path: String },
    /// Register a system admin account (employee record must exist)
    RegisterAdmin { employee_id: String, email: String },
    /// Self-register as a doctor; credentials are emailed
    RegisterDoctor(DoctorArgs),
    /// Request a new password by email
    ForgotPassword { email: String },
    /// Patient records
    #[command(subcommand)]
    Patients(PatientsCommand),
    /// Doctor accounts (admin)
    #[command(subcommand)]
    Doctors(DoctorsCommand),
    /// Health-program categories (admin)
    #[command(subcommand)]
    Categories(CategoriesCommand),
    /// Dashboard summary for the current viewer
    Overview,
}

#[derive(Debug, Subcommand)]
pub enum PatientsCommand {
    List {
        #[arg(long, short)]
        search: Option<String>,
    },
    Add(PatientArgs),
    Update {
        /// Clinic patient number of the record to update
        #[arg(id = "target_pat_id", value_name = "PAT_ID")]
        pat_id: i64,
        #[command(flatten)]
        patient: PatientArgs,
    },
}

#[derive(Debug, Args)]
pub struct PatientArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long, default_value = "")]
    pub middle_name: String,
    #[arg(long)]
    pub surname: String,
    #[arg(long = "patient-number")]
    pub pat_id: i64,
    /// Date of birth, YYYY-MM-DD
    #[arg(long)]
    pub dob: NaiveDate,
    #[arg(long, default_value = "")]
    pub city: String,
    /// Comma-separated category ids
    #[arg(long, value_delimiter = ',')]
    pub categories: Vec<i64>,
}

#[derive(Debug, Subcommand)]
pub enum DoctorsCommand {
    List {
        #[arg(long, short)]
        search: Option<String>,
    },
    Stats,
    Add(DoctorArgs),
    /// Email a password reset to a doctor
    ResetPassword { employee_id: String, email: String },
}

#[derive(Debug, Args)]
pub struct DoctorArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub employee_id: String,
    #[arg(long)]
    pub email: String,
}

#[derive(Debug, Subcommand)]
pub enum CategoriesCommand {
    List {
        #[arg(long, short)]
        search: Option<String>,
    },
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Update {
        id: i64,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Delete { id: i64 },
}
