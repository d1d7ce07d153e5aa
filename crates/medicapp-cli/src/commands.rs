use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use medicapp_core::auth::policy::ADMIN_DASHBOARD;
use medicapp_core::auth::{dashboard_for, is_public, CredentialStore};
use medicapp_core::models::{
    AdminRegistration, AdminVerification, Category, Doctor, NewCategory, NewDoctor, NewPatient,
    Patient,
};
use medicapp_core::utils::{format_date, format_optional, clip};
use medicapp_core::{ApiClient, Config, GuardDecision, NavigationLog, RouteGuard, ViewerRole};

use crate::cli::{
    CategoriesCommand, Command, DoctorArgs, DoctorsCommand, PatientArgs, PatientsCommand,
};

const NAME_WIDTH: usize = 28;
const EMAIL_WIDTH: usize = 30;
const DESCRIPTION_WIDTH: usize = 40;

pub struct App {
    config: Config,
    api: ApiClient,
    guard: RouteGuard,
    navigation: Arc<NavigationLog>,
}

impl App {
    pub fn new(config: Config, api: ApiClient, navigation: Arc<NavigationLog>) -> Self {
        let guard = RouteGuard::new(api.session().clone());
        Self {
            config,
            api,
            guard,
            navigation,
        }
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login {
                username,
                admin,
                remember,
            } => self.login(username, admin, remember).await,
            Command::Logout { forget } => self.logout(forget),
            Command::Status => self.status(),
            Command::Open { path } => self.open(&path),
            Command::RegisterAdmin { employee_id, email } => {
                self.register_admin(employee_id, email).await
            }
            Command::RegisterDoctor(args) => {
                let next = self.api.register_doctor(&new_doctor(args)).await?;
                println!("Registration submitted. Check your email for sign-in details.");
                println!("Next: {}", next);
                Ok(())
            }
            Command::ForgotPassword { email } => {
                self.api.forgot_password(&email).await?;
                println!("If {} is registered, a new password has been sent.", email);
                Ok(())
            }
            Command::Patients(cmd) => self.patients(cmd).await,
            Command::Doctors(cmd) => self.doctors(cmd).await,
            Command::Categories(cmd) => self.categories(cmd).await,
            Command::Overview => self.overview().await,
        }
    }

    // ===== Account =====

    async fn login(&mut self, username: String, admin: bool, remember: bool) -> Result<()> {
        let role = if admin {
            ViewerRole::SystemAdmin
        } else {
            ViewerRole::Regular
        };

        let password = match CredentialStore::get_password(&username, role) {
            Ok(Some(password)) => password,
            Ok(None) => prompt_password("Password: ")?,
            Err(e) => {
                warn!("Keychain unavailable: {:#}", e);
                prompt_password("Password: ")?
            }
        };

        let landing = self.api.login(&username, &password, role).await?;

        if remember {
            if let Err(e) = CredentialStore::store(&username, role, &password) {
                warn!("Failed to remember password: {:#}", e);
            }
        }

        self.config.last_username = Some(username.clone());
        self.config.last_role = Some(role);
        self.config.save()?;

        println!("Signed in as {} ({})", username, role);
        println!("Now at {}", landing);
        Ok(())
    }

    fn logout(&mut self, forget: bool) -> Result<()> {
        let entry = self.api.logout()?;

        if forget {
            if let (Some(username), Some(role)) =
                (self.config.last_username.take(), self.config.last_role)
            {
                CredentialStore::delete(&username, role)?;
                self.config.save()?;
            }
        }

        println!("Signed out. Now at {}", entry);
        Ok(())
    }

    fn status(&self) -> Result<()> {
        let data = self.api.session().snapshot();
        if data.has_valid_session() {
            println!("Signed in ({})", data.role);
            if let Some(username) = &self.config.last_username {
                println!("User:      {}", username);
            }
            println!("Dashboard: {}", dashboard_for(data.role));
        } else if data.is_authenticated {
            println!("Session is incomplete; the next screen you open will sign you out.");
        } else {
            println!("Not signed in.");
        }
        println!("API:       {}", self.api.base_url());
        Ok(())
    }

    fn open(&self, path: &str) -> Result<()> {
        if is_public(path) {
            println!("{} is public", path);
            return Ok(());
        }
        match self.guard.check(path) {
            GuardDecision::Render => println!("{} renders", path),
            GuardDecision::Redirect(to) => println!("{} redirects to {}", path, to),
        }
        Ok(())
    }

    async fn register_admin(&self, employee_id: String, email: String) -> Result<()> {
        let verification = AdminVerification {
            employee_id: employee_id.clone(),
            email: email.clone(),
        };
        self.api.verify_admin(&verification).await?;
        println!("Employee record verified.");

        let password = prompt_password("New password: ")?;
        let confirm = prompt_password("Confirm password: ")?;
        if password != confirm {
            bail!("Passwords do not match");
        }

        let next = self
            .api
            .register_admin(&AdminRegistration {
                employee_id,
                email,
                password,
            })
            .await?;
        println!("Admin account created. Sign in with `medicapp login --admin`.");
        println!("Next: {}", next);
        Ok(())
    }

    // ===== Screens =====

    /// Run the guard for `screen`. Returns false (after reporting) when the
    /// viewer is redirected away.
    fn enter(&self, screen: &str) -> bool {
        match self.guard.check(screen) {
            GuardDecision::Render => true,
            GuardDecision::Redirect(to) => {
                println!("Cannot open {}: redirected to {}", screen, to);
                false
            }
        }
    }

    fn screen(&self, section: &str) -> String {
        format!("{}{}", dashboard_for(self.api.session().role()), section)
    }

    /// Attach the forced-logout destination, if any, to a failed call.
    fn explain<T>(&self, before: usize, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            let history = self.navigation.history();
            match history.get(before..).and_then(|moved| moved.last()) {
                Some(to) => e.context(format!("Session ended; sign in again at {}", to)),
                None => e,
            }
        })
    }

    async fn patients(&self, cmd: PatientsCommand) -> Result<()> {
        let screen = self.screen("/patients");
        if !self.enter(&screen) {
            return Ok(());
        }
        let before = self.navigation.history().len();

        match cmd {
            PatientsCommand::List { search } => {
                let patients = self.explain(before, self.api.list_patients().await)?;
                let shown: Vec<&Patient> = patients
                    .iter()
                    .filter(|p| search.as_deref().is_none_or(|q| p.matches(q)))
                    .collect();
                print_patients(&shown);
            }
            PatientsCommand::Add(args) => {
                let patient = new_patient(args);
                self.explain(before, self.api.create_patient(&patient).await)?;
                println!("Patient {} added", patient.pat_id);
            }
            PatientsCommand::Update { pat_id, patient } => {
                let patient = new_patient(patient);
                self.explain(before, self.api.update_patient(pat_id, &patient).await)?;
                println!("Patient {} updated", pat_id);
            }
        }
        Ok(())
    }

    async fn doctors(&self, cmd: DoctorsCommand) -> Result<()> {
        let screen = format!("{}/doctors", ADMIN_DASHBOARD);
        if !self.enter(&screen) {
            return Ok(());
        }
        let before = self.navigation.history().len();

        match cmd {
            DoctorsCommand::List { search } => {
                let doctors = self.explain(before, self.api.list_doctors().await)?;
                let shown: Vec<&Doctor> = doctors
                    .iter()
                    .filter(|d| search.as_deref().is_none_or(|q| d.matches(q)))
                    .collect();
                print_doctors(&shown);
            }
            DoctorsCommand::Stats => {
                let stats = self.explain(before, self.api.doctor_stats().await)?;
                println!("Total doctors:   {}", stats.total_doctors);
                println!("Active doctors:  {}", stats.active_doctors);
                println!("Specializations: {}", stats.specializations);
            }
            DoctorsCommand::Add(args) => {
                let doctor = new_doctor(args);
                self.explain(before, self.api.add_doctor(&doctor).await)?;
                println!("Doctor {} added; credentials sent to {}", doctor.employee_id, doctor.email);
            }
            DoctorsCommand::ResetPassword { employee_id, email } => {
                self.explain(
                    before,
                    self.api.send_password_reset(&employee_id, &email).await,
                )?;
                println!("Password reset sent to {}", email);
            }
        }
        Ok(())
    }

    async fn categories(&self, cmd: CategoriesCommand) -> Result<()> {
        let screen = self.screen("/categories");
        if !self.enter(&screen) {
            return Ok(());
        }
        let before = self.navigation.history().len();

        match cmd {
            CategoriesCommand::List { search } => {
                let categories = self.explain(before, self.api.list_categories().await)?;
                let shown: Vec<&Category> = categories
                    .iter()
                    .filter(|c| search.as_deref().is_none_or(|q| c.matches(q)))
                    .collect();
                print_categories(&shown);
            }
            CategoriesCommand::Add { name, description } => {
                let category = NewCategory { name, description };
                let created = self.explain(before, self.api.create_category(&category).await)?;
                println!("Category {} created: {}", created.id, created.name);
            }
            CategoriesCommand::Update {
                id,
                name,
                description,
            } => {
                let category = NewCategory { name, description };
                let updated = self.explain(before, self.api.update_category(id, &category).await)?;
                println!("Category {} updated: {}", updated.id, updated.name);
            }
            CategoriesCommand::Delete { id } => {
                self.explain(before, self.api.delete_category(id).await)?;
                println!("Category {} deleted", id);
            }
        }
        Ok(())
    }

    async fn overview(&self) -> Result<()> {
        let role = self.api.session().role();
        let screen = dashboard_for(role);
        if !self.enter(screen) {
            return Ok(());
        }
        let before = self.navigation.history().len();

        let json = if role.is_admin() {
            let overview = self.explain(before, self.api.admin_overview().await)?;
            serde_json::to_string_pretty(&overview)?
        } else {
            let overview = self.explain(before, self.api.dashboard_overview().await)?;
            serde_json::to_string_pretty(&overview)?
        };
        println!("{}", json);
        Ok(())
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

fn new_patient(args: PatientArgs) -> NewPatient {
    NewPatient {
        first_name: args.first_name,
        middle_name: args.middle_name,
        surname: args.surname,
        pat_id: args.pat_id,
        date_of_birth: args.dob,
        city: args.city,
        category_ids: args.categories,
    }
}

fn new_doctor(args: DoctorArgs) -> NewDoctor {
    NewDoctor {
        first_name: args.first_name,
        last_name: args.last_name,
        employee_id: args.employee_id,
        email: args.email,
    }
}

fn print_patients(patients: &[&Patient]) {
    debug!(count = patients.len(), "Listing patients");
    if patients.is_empty() {
        println!("No patients found");
        return;
    }
    println!(
        "{:<8} {:<width$} {:<12} {:<16} CATEGORIES",
        "PAT ID",
        "NAME",
        "BORN",
        "CITY",
        width = NAME_WIDTH
    );
    for p in patients {
        let born = p
            .date_of_birth
            .as_deref()
            .map(format_date)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<width$} {:<12} {:<16} {}",
            p.pat_id,
            clip(&p.full_name(), NAME_WIDTH),
            born,
            clip(&format_optional(Some(&p.city), "-"), 16),
            p.category_names().join(", "),
            width = NAME_WIDTH
        );
    }
}

fn print_doctors(doctors: &[&Doctor]) {
    if doctors.is_empty() {
        println!("No doctors found");
        return;
    }
    println!(
        "{:<10} {:<name$} {:<email$} {:<20} ACTIVE",
        "EMPLOYEE",
        "NAME",
        "EMAIL",
        "SPECIALIZATION",
        name = NAME_WIDTH,
        email = EMAIL_WIDTH
    );
    for d in doctors {
        println!(
            "{:<10} {:<name$} {:<email$} {:<20} {}",
            d.employee_id,
            clip(&d.full_name(), NAME_WIDTH),
            clip(&d.email, EMAIL_WIDTH),
            clip(&format_optional(d.specialization.as_deref(), "-"), 20),
            if d.is_active { "yes" } else { "no" },
            name = NAME_WIDTH,
            email = EMAIL_WIDTH
        );
    }
}

fn print_categories(categories: &[&Category]) {
    if categories.is_empty() {
        println!("No categories found");
        return;
    }
    println!("{:<6} {:<24} DESCRIPTION", "ID", "NAME");
    for c in categories {
        println!(
            "{:<6} {:<24} {}",
            c.id,
            clip(&c.name, 24),
            clip(&c.description, DESCRIPTION_WIDTH)
        );
    }
}
