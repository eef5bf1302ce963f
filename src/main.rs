mod api;
mod catalog;
mod config;
mod drafts;
mod error;
mod form;
mod logging;
mod models;
mod pipeline;
mod progress;
mod store;
mod suggest;
mod sync;
mod tui;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{info, warn};

use catalog::Track;
use config::Config;
use error::ApiError;
use form::{parse_assignment, FieldChange, Panel, SlideOver};
use models::{Application, ApplicationStatus, Company, Role};
use pipeline::{ApplicationFilter, PageRequest, SortState};
use progress::{topic_key, ProgressTracker};
use store::{LocalStore, Session};

#[derive(Parser)]
#[command(name = "elevate")]
#[command(about = "Track job applications, request referrals, and work through interview prep")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a session from the web app
    Login {
        /// Access token
        #[arg(long)]
        token: String,

        /// User ID
        #[arg(long)]
        user_id: String,

        /// Role name or code (guest, member, referrer, volunteer, lead, admin)
        #[arg(long, default_value = "member")]
        role: Role,
    },

    /// Forget the stored session
    Logout,

    /// Manage job applications
    Apps {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Manage companies
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },

    /// Request referrals
    Referral {
        #[command(subcommand)]
        command: ReferralCommands,
    },

    /// Manage learning lessons
    Lesson {
        #[command(subcommand)]
        command: LessonCommands,
    },

    /// Track interview prep progress
    Learn {
        #[command(subcommand)]
        command: LearnCommands,
    },

    /// Update profile documents
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Suggest values from the reference lists
    Suggest {
        /// Which list to search
        list: SuggestList,

        /// Partial input
        query: String,

        /// Maximum number of suggestions
        #[arg(short, long, default_value = "8")]
        limit: usize,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum YesNo {
    Yes,
    No,
}

#[derive(Clone, Copy, ValueEnum)]
enum SuggestList {
    Companies,
    Titles,
    Levels,
    Countries,
}

#[derive(Args)]
struct FilterArgs {
    /// Search company, position, level and member name
    #[arg(short, long)]
    search: Option<String>,

    /// Filter by status (Submitted, OA, Phone interview, ...)
    #[arg(long)]
    status: Option<String>,

    /// Filter by level
    #[arg(long)]
    level: Option<String>,

    /// Filter by country or city
    #[arg(long)]
    location: Option<String>,

    /// Filter by referral
    #[arg(long)]
    referred: Option<YesNo>,

    /// Applied on or after (YYYY-MM-DD)
    #[arg(long)]
    from: Option<String>,

    /// Applied on or before (YYYY-MM-DD)
    #[arg(long)]
    to: Option<String>,

    /// Sort order, e.g. date_desc, company_asc, status
    #[arg(long, default_value = "date_desc")]
    sort: String,

    /// Flip the sort direction
    #[arg(long)]
    reverse: bool,

    /// Every member's applications (leads and admins)
    #[arg(long)]
    all: bool,

    /// Filter by member name or email (with --all)
    #[arg(long)]
    member: Option<String>,

    /// Filter by company name
    #[arg(long)]
    company: Option<String>,
}

impl FilterArgs {
    fn sort_state(&self) -> Result<SortState> {
        let sort: SortState = self.sort.parse()?;
        Ok(if self.reverse { sort.toggle(sort.key) } else { sort })
    }

    fn to_filter(&self) -> Result<ApplicationFilter> {
        Ok(ApplicationFilter {
            search: self.search.clone().unwrap_or_default(),
            member: self.member.clone().unwrap_or_default(),
            company: self.company.clone().unwrap_or_default(),
            status: pipeline::active(self.status.as_deref())
                .map(|s| ApplicationStatus::from(s.to_string())),
            level: pipeline::active(self.level.as_deref()).map(str::to_string),
            location: pipeline::active(self.location.as_deref()).map(str::to_string),
            referred: self.referred.map(|r| r == YesNo::Yes),
            date_from: self.from.as_deref().map(pipeline::parse_date_arg).transpose()?,
            date_to: self.to.as_deref().map(pipeline::parse_date_arg).transpose()?,
        })
    }
}

#[derive(Subcommand)]
enum AppCommands {
    /// List applications
    List {
        #[command(flatten)]
        filters: FilterArgs,

        /// Page number
        #[arg(short, long)]
        page: Option<usize>,
    },

    /// Show application details
    Show {
        /// Application ID
        id: String,
    },

    /// Add an application
    Add {
        /// Field assignments, e.g. --set company=Google --set location.country=Ghana
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    /// Update an application
    Update {
        /// Application ID
        id: String,

        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,

        /// Send the whole record, allowing company, position and level changes
        #[arg(long)]
        replace: bool,
    },

    /// Archive applications
    Archive {
        /// Application IDs
        #[arg(required = true)]
        ids: Vec<String>,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,

        /// Use the admin endpoint (any member's applications)
        #[arg(long)]
        admin: bool,
    },

    /// Delete applications
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(short, long)]
        yes: bool,

        #[arg(long)]
        admin: bool,
    },

    /// Show status counts
    Stats {
        /// Every member's applications
        #[arg(long)]
        all: bool,
    },

    /// Export applications as CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CompanyCommands {
    /// Add a company
    Create {
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ReferralCommands {
    /// List companies that accept referral requests
    Companies,

    /// Request a referral
    Request {
        /// Company name
        #[arg(short, long)]
        company: String,

        /// Link to the resume to share
        #[arg(long)]
        resume: Option<String>,

        /// File containing the referral essay
        #[arg(long)]
        essay_file: Option<PathBuf>,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,

        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
}

#[derive(Subcommand)]
enum LessonCommands {
    /// List lessons
    List {
        /// Filter by category (Workshops, DSA, System Design)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Add a lesson
    Create {
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    /// Update a lesson
    Update {
        /// Lesson ID
        id: i64,

        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    /// Upload a file and print its link
    Upload {
        /// File to upload
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum LearnCommands {
    /// List topics with progress
    Topics {
        #[arg(short, long, value_enum, default_value = "dsa")]
        track: Track,

        /// Only bookmarked topics
        #[arg(long)]
        bookmarked: bool,
    },

    /// Toggle a topic as done
    Done {
        category: String,
        topic: String,

        #[arg(short, long, value_enum, default_value = "dsa")]
        track: Track,
    },

    /// Toggle a bookmark
    Bookmark {
        category: String,
        topic: String,

        #[arg(short, long, value_enum, default_value = "dsa")]
        track: Track,
    },

    /// Set a note on a topic (empty text removes it)
    Note {
        category: String,
        topic: String,
        text: String,

        #[arg(short, long, value_enum, default_value = "dsa")]
        track: Track,
    },

    /// Browse topics interactively
    Browse {
        #[arg(short, long, value_enum, default_value = "dsa")]
        track: Track,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Upload a cover letter from a text file
    CoverLetter { file: PathBuf },

    /// Upload a referral essay from a text file
    Essay { file: PathBuf },
}

struct App {
    config: Config,
    store: LocalStore,
    session: Option<Session>,
}

impl App {
    fn open(config: Config) -> Result<Self> {
        let store = LocalStore::open(&config.data_dir())?;
        let session = Session::load(&store)?;
        Ok(Self { config, store, session })
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("Not logged in. Run 'elevate login' first."))
    }

    fn client(&self) -> Result<api::Client> {
        let client = api::Client::new(&self.config.api_url)?;
        Ok(match &self.session {
            Some(session) => client.with_session(&session.access_token, &session.user_id),
            None => client,
        })
    }

    fn role(&self) -> Role {
        self.session.as_ref().map(|s| s.role).unwrap_or(Role::Guest)
    }

    fn require_privileged(&self) -> Result<()> {
        let role = self.session()?.role;
        if !role.is_privileged() {
            bail!("This needs a lead or admin account (you are {})", role);
        }
        Ok(())
    }

    /// A rejected token means the stored session is stale.
    fn expire_on_unauthorized<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_unauthorized) {
                match Session::clear(&self.store) {
                    Ok(()) => info!("Cleared session after 401"),
                    Err(clear_err) => warn!("Failed to clear session: {}", clear_err),
                }
            }
        }
        result
    }

    fn tracker(&self) -> Result<ProgressTracker<'_>> {
        let remote = match &self.session {
            Some(_) => Some(self.client()?),
            None => None,
        };
        ProgressTracker::for_role(self.role(), &self.store, remote, self.config.debounce_window())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config::Loaded { config, warning } = config::load();
    if let Err(e) = logging::init(&config.data_dir()) {
        eprintln!("Warning: logging disabled: {}", e);
    }
    if let Some(warning) = warning {
        warn!("{}, using defaults", warning);
        eprintln!("Warning: {}, using defaults", warning);
    }
    let app = App::open(config)?;

    match cli.command {
        Commands::Login { token, user_id, role } => {
            let session = Session { access_token: token, user_id, role };
            session.save(&app.store)?;
            info!(user_id = %session.user_id, %role, "logged in");
            println!("Logged in as {} ({})", session.user_id, role);
        }

        Commands::Logout => {
            Session::clear(&app.store)?;
            println!("Logged out.");
        }

        Commands::Apps { command } => {
            let result = run_apps(&app, command);
            app.expire_on_unauthorized(result)?;
        }

        Commands::Company { command } => match command {
            CompanyCommands::Create { set } => {
                app.session()?;
                let mut panel = SlideOver::open("New Company", drafts::company_form());
                panel.form_mut().apply_all(parse_assignments(&set)?)?;
                panel.form().validate()?;
                let company: Company = panel.form().to_payload()?;

                let client = app.client()?;
                submit(&mut panel, |_| client.create_company(&company))?;
                println!("Created company {}", company.name);
            }
        },

        Commands::Referral { command } => run_referral(&app, command)?,

        Commands::Lesson { command } => run_lesson(&app, command)?,

        Commands::Learn { command } => run_learn(&app, command)?,

        Commands::Profile { command } => {
            app.session()?;
            let client = app.client()?;
            match command {
                ProfileCommands::CoverLetter { file } => {
                    let text = read_text(&file)?;
                    client.update_cover_letter(&text)?;
                    println!("Cover letter updated.");
                }
                ProfileCommands::Essay { file } => {
                    let text = read_text(&file)?;
                    client.update_essay(&text)?;
                    println!("Referral essay updated.");
                }
            }
        }

        Commands::Suggest { list, query, limit } => {
            let reference = catalog::reference()?;
            let options = match list {
                SuggestList::Companies => &reference.companies,
                SuggestList::Titles => &reference.job_titles,
                SuggestList::Levels => &reference.job_levels,
                SuggestList::Countries => &reference.countries,
            };
            let matches = suggest::suggest(&query, options, limit);
            if matches.is_empty() {
                println!("No suggestions for '{}'.", query);
            }
            for option in matches {
                println!("{}", option);
            }
        }
    }

    Ok(())
}

fn run_apps(app: &App, command: AppCommands) -> Result<()> {
    match command {
        AppCommands::List { filters, page } => {
            let source = load_applications(app, filters.all)?;
            let filter = filters.to_filter()?;
            let sort = filters.sort_state()?;
            let request = PageRequest {
                page: page.unwrap_or(1),
                page_size: app.config.page_size,
            };
            let view = pipeline::derive_view(&source, &filter, sort, Some(request));

            if view.items.is_empty() {
                println!("No applications found.");
                if filter.is_active() {
                    let mut unfiltered = filter.clone();
                    unfiltered.clear();
                    let hidden = pipeline::derive_view(&source, &unfiltered, sort, None).matched;
                    println!("{} application(s) hidden by filters. Try clearing some.", hidden);
                }
                return Ok(());
            }

            if filters.all {
                println!(
                    "{:<26} {:<18} {:<16} {:<26} {:<12} {:<16} {:<10}",
                    "ID", "MEMBER", "COMPANY", "POSITION", "LEVEL", "STATUS", "APPLIED"
                );
                println!("{}", "-".repeat(130));
            } else {
                println!(
                    "{:<26} {:<16} {:<26} {:<12} {:<16} {:<4} {:<10}",
                    "ID", "COMPANY", "POSITION", "LEVEL", "STATUS", "REF", "APPLIED"
                );
                println!("{}", "-".repeat(116));
            }
            for a in &view.items {
                if filters.all {
                    println!(
                        "{:<26} {:<18} {:<16} {:<26} {:<12} {:<16} {:<10}",
                        truncate(&a.id, 24),
                        truncate(&a.user_name, 16),
                        truncate(a.company_name(), 14),
                        truncate(&a.title, 24),
                        truncate(&a.role, 10),
                        truncate(a.status.as_str(), 14),
                        display_date(&a.date)
                    );
                } else {
                    println!(
                        "{:<26} {:<16} {:<26} {:<12} {:<16} {:<4} {:<10}",
                        truncate(&a.id, 24),
                        truncate(a.company_name(), 14),
                        truncate(&a.title, 24),
                        truncate(&a.role, 10),
                        truncate(a.status.as_str(), 14),
                        if a.referred { "yes" } else { "no" },
                        display_date(&a.date)
                    );
                }
            }
            println!(
                "\nPage {} of {} ({} matching, sorted by {})",
                view.page, view.page_count, view.matched, sort
            );
            if filter.active_count() > 0 {
                println!("{} filter(s) active", filter.active_count());
            }
        }

        AppCommands::Show { id } => {
            let application = match &app.session {
                Some(_) => app.client()?.get_application(&id)?,
                None => catalog::demo_applications()?
                    .into_iter()
                    .find(|a| a.id == id)
                    .ok_or_else(|| anyhow!("Application '{}' not found", id))?,
            };
            print_application(&application);
        }

        AppCommands::Add { set } => {
            app.session()?;
            let reference = catalog::reference()?;
            let mut panel = SlideOver::open("New Application", drafts::application_form());
            panel.form_mut().apply_all(parse_assignments(&set)?)?;
            drafts::normalize_application(panel.form_mut(), &reference)?;

            let client = app.client()?;
            let created = submit(&mut panel, |draft| client.create_application(draft))?;
            println!("Added application {}", created.id);
            print_application(&created);
        }

        AppCommands::Update { id, set, replace } => {
            app.session()?;
            let client = app.client()?;
            let current = client.get_application(&id)?;
            let reference = catalog::reference()?;

            let form = if replace {
                drafts::application_replace_form(&current)?
            } else {
                drafts::application_update_form(&current)
            };
            let mut panel = SlideOver::open("Update Application", form);
            panel.form_mut().apply_all(parse_assignments(&set)?)?;
            drafts::normalize_application(panel.form_mut(), &reference)?;

            let updated = if replace {
                let record: Application = panel.form().to_payload()?;
                submit(&mut panel, |_| client.put_application(&record))?
            } else {
                submit(&mut panel, |draft| client.update_application(&id, draft))?
            };
            println!("Updated application {}", updated.id);
            print_application(&updated);
        }

        AppCommands::Archive { ids, yes, admin } => {
            if admin {
                app.require_privileged()?;
            } else {
                app.session()?;
            }
            if !yes && !confirm(&format!("Archive {} application(s)?", ids.len()))? {
                println!("Cancelled.");
                return Ok(());
            }
            let client = app.client()?;
            if admin {
                client.archive_applications(&ids)?;
            } else {
                client.archive_user_applications(&ids)?;
            }
            println!("Archived {} application(s).", ids.len());
        }

        AppCommands::Delete { ids, yes, admin } => {
            if admin {
                app.require_privileged()?;
            } else {
                app.session()?;
            }
            if !yes
                && !confirm(&format!(
                    "Permanently delete {} application(s)? This cannot be undone.",
                    ids.len()
                ))?
            {
                println!("Cancelled.");
                return Ok(());
            }
            let client = app.client()?;
            if admin {
                client.delete_applications(&ids)?;
            } else {
                client.delete_user_applications(&ids)?;
            }
            println!("Deleted {} application(s).", ids.len());
        }

        AppCommands::Stats { all } => {
            let source = load_applications(app, all)?;
            let stats = pipeline::stats(&source);
            println!("Total:        {}", stats.total);
            println!("Submitted:    {}", stats.submitted);
            println!("Interviewing: {}", stats.interviewing);
            println!("Offers:       {}", stats.offers);
            println!("Rejected:     {}", stats.rejected);
            println!("Pending:      {}", stats.pending);
        }

        AppCommands::Export { filters, output } => {
            let source = load_applications(app, filters.all)?;
            let filter = filters.to_filter()?;
            let sort = filters.sort_state()?;
            let view = pipeline::derive_view(&source, &filter, sort, None);
            let csv = pipeline::export_csv(&view.items);

            match output {
                Some(path) => {
                    std::fs::write(&path, csv + "\n")
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported {} application(s) to {}", view.matched, path.display());
                }
                None => println!("{}", csv),
            }
        }
    }
    Ok(())
}

/// The user's applications, every member's with `all`, or the demo set when
/// nobody is logged in.
fn load_applications(app: &App, all: bool) -> Result<Vec<Application>> {
    if app.session.is_none() {
        println!("Showing demo applications. Run 'elevate login' to see yours.\n");
        return catalog::demo_applications();
    }
    let client = app.client()?;
    if all {
        app.require_privileged()?;
        Ok(client.list_all_applications()?)
    } else {
        Ok(client.list_user_applications()?)
    }
}

fn run_referral(app: &App, command: ReferralCommands) -> Result<()> {
    app.session()?;
    let client = app.client()?;
    let companies = client.list_referral_companies()?;

    match command {
        ReferralCommands::Companies => {
            if companies.is_empty() {
                println!("No referral companies yet.");
                return Ok(());
            }
            println!("{:<24} {:<8} {:<8} {:<8}", "COMPANY", "RESUME", "ESSAY", "PHONE");
            println!("{}", "-".repeat(52));
            for c in &companies {
                let req = &c.referral_materials;
                println!(
                    "{:<24} {:<8} {:<8} {:<8}",
                    truncate(&c.name, 22),
                    if req.resume { "yes" } else { "-" },
                    if req.essay { "yes" } else { "-" },
                    if req.phone_number { "yes" } else { "-" }
                );
            }
        }

        ReferralCommands::Request { company, resume, essay_file, phone, set } => {
            let names: Vec<&str> = companies.iter().map(|c| c.name.as_str()).collect();
            let name = suggest::resolve(&company, &names).ok_or_else(|| {
                anyhow!("'{}' does not take referral requests. Run 'elevate referral companies'.", company)
            })?;
            let company = companies
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| anyhow!("Company '{}' not found", name))?;

            let materials = drafts::Materials {
                resume,
                essay: essay_file.as_deref().map(read_text).transpose()?,
                phone_number: phone,
            };
            let today = chrono::Local::now().date_naive();
            let mut panel = SlideOver::open(
                format!("Referral at {}", company.name),
                drafts::referral_form(company, &materials, today),
            );
            panel.form_mut().apply_all(parse_assignments(&set)?)?;
            let request = drafts::referral_request(panel.form(), company, &materials)?;
            submit(&mut panel, |_| client.create_referral(&request))?;
            println!("Requested a referral for {} at {}.", request.job_title, company.name);
        }
    }
    Ok(())
}

fn run_lesson(app: &App, command: LessonCommands) -> Result<()> {
    let client = app.client()?;
    match command {
        LessonCommands::List { category } => {
            let category = category.as_deref().map(str::parse::<models::LessonCategory>).transpose()?;
            let lessons: Vec<_> = client
                .list_lessons()?
                .into_iter()
                .filter(|l| category.is_none_or(|c| l.category == c))
                .collect();
            if lessons.is_empty() {
                println!("No lessons found.");
                return Ok(());
            }
            println!("{:<6} {:<32} {:<16} {:<10} {:<6} {:<20}", "ID", "TOPIC", "PLAYLIST", "FORMAT", "YEAR", "INSTRUCTOR");
            println!("{}", "-".repeat(94));
            for l in lessons {
                println!(
                    "{:<6} {:<32} {:<16} {:<10} {:<6} {:<20}",
                    l.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
                    truncate(&l.topic, 30),
                    truncate(&l.playlist, 14),
                    format!("{:?}", l.format).to_lowercase(),
                    l.year,
                    truncate(&l.instructor, 18)
                );
            }
        }

        LessonCommands::Create { set } => {
            app.require_privileged()?;
            let uploader = uploader_id(app.session()?)?;
            let today = chrono::Local::now().date_naive();
            let mut panel = SlideOver::open("New Lesson", drafts::lesson_form(uploader, today));
            panel.form_mut().apply_all(parse_assignments(&set)?)?;
            let lesson = drafts::lesson_payload(panel.form())?;
            let created = submit(&mut panel, |_| client.create_lesson(&lesson))?;
            println!(
                "Created lesson {} ({})",
                created.id.map(|id| id.to_string()).unwrap_or_default(),
                created.topic
            );
        }

        LessonCommands::Update { id, set } => {
            app.require_privileged()?;
            let changes = drafts::lesson_changes(parse_assignments(&set)?)?;
            if changes.as_object().is_none_or(|c| c.is_empty()) {
                bail!("Nothing to update. Pass --set field=value");
            }
            let updated = client.update_lesson(id, &changes)?;
            println!("Updated lesson {} ({})", id, updated.topic);
        }

        LessonCommands::Upload { file } => {
            app.require_privileged()?;
            let uploaded = client.upload_file(&file)?;
            println!("Uploaded {}", uploaded.name);
            println!("Link: {}", uploaded.link);
        }
    }
    Ok(())
}

fn run_learn(app: &App, command: LearnCommands) -> Result<()> {
    let mut tracker = app.tracker()?;
    if !tracker.is_persistent() && !matches!(command, LearnCommands::Topics { .. }) {
        println!("Note: progress is only saved for member accounts.");
    }

    match command {
        LearnCommands::Topics { track, bookmarked } => {
            let categories = catalog::curriculum(track)?;
            for category in &categories {
                let keys: Vec<_> = category
                    .topics
                    .iter()
                    .map(|t| (t, topic_key(&category.category, &t.name)))
                    .filter(|(_, key)| !bookmarked || tracker.is_bookmarked(key))
                    .collect();
                if keys.is_empty() {
                    continue;
                }
                println!(
                    "{} ({}/{})",
                    category.category,
                    tracker.completed_in(&category.category),
                    category.topics.len()
                );
                for (topic, key) in keys {
                    println!(
                        "  [{}] {}{}",
                        if tracker.is_completed(&key) { "x" } else { " " },
                        topic.name,
                        if tracker.is_bookmarked(&key) { " *" } else { "" }
                    );
                }
            }
        }

        LearnCommands::Done { category, topic, track } => {
            let key = resolve_topic_key(track, &category, &topic)?;
            let done = tracker.toggle_complete(&key)?;
            println!("{} {}", if done { "Completed" } else { "Unmarked" }, key);
        }

        LearnCommands::Bookmark { category, topic, track } => {
            let key = resolve_topic_key(track, &category, &topic)?;
            let marked = tracker.toggle_bookmark(&key)?;
            println!("{} {}", if marked { "Bookmarked" } else { "Removed bookmark from" }, key);
        }

        LearnCommands::Note { category, topic, text, track } => {
            let key = resolve_topic_key(track, &category, &topic)?;
            tracker.set_note(&key, &text)?;
            if text.trim().is_empty() {
                println!("Removed note from {}", key);
            } else {
                println!("Saved note on {}", key);
            }
        }

        LearnCommands::Browse { track } => {
            let categories = catalog::curriculum(track)?;
            tui::run_browse(&categories, &mut tracker)?;
        }
    }
    Ok(())
}

fn resolve_topic_key(track: Track, category: &str, topic: &str) -> Result<String> {
    let categories = catalog::curriculum(track)?;
    let (category, topic) = catalog::find_topic(&categories, category, topic)
        .ok_or_else(|| anyhow!("No topic '{}' in '{}'. Run 'elevate learn topics'.", topic, category))?;
    Ok(topic_key(&category.category, &topic.name))
}

/// Submits the panel, prefixing failures with its title and banner.
fn submit<T>(
    panel: &mut SlideOver,
    handler: impl FnOnce(&Value) -> std::result::Result<T, ApiError>,
) -> Result<T> {
    panel.submit(handler).map_err(|e| match panel.panel() {
        Panel::Open => {
            let banner = panel.banner().unwrap_or("Request failed").to_string();
            e.context(format!("{}: {}", panel.title(), banner))
        }
        _ => e,
    })
}

/// Lessons record their uploader as the numeric user id.
fn uploader_id(session: &Session) -> Result<i64> {
    session
        .user_id
        .parse()
        .with_context(|| format!("User id '{}' is not numeric, so it can't upload lessons", session.user_id))
}

fn parse_assignments(raw: &[String]) -> Result<Vec<FieldChange>> {
    raw.iter().map(|r| parse_assignment(r)).collect()
}

fn read_text(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_application(a: &Application) {
    println!("Application {}", a.id);
    println!("Company: {}", a.company_name());
    println!("Position: {}", a.title);
    println!("Level: {}", a.role);
    println!("Status: {}", a.status);
    let location = a.location.display();
    if !location.is_empty() {
        println!("Location: {}", location);
    }
    println!("Referred: {}", if a.referred { "Yes" } else { "No" });
    if !a.recruiter_name.is_empty() || !a.recruiter_email.is_empty() {
        println!("Recruiter: {} {}", a.recruiter_name, a.recruiter_email);
    }
    if !a.user_name.is_empty() {
        println!("Member: {} <{}>", a.user_name, a.user_email);
    }
    println!("Applied: {}", display_date(&a.date));
    if a.archived {
        println!("(archived)");
    }
    if !a.notes.is_empty() {
        println!("\n--- Notes ---\n{}", a.notes);
    }
}

fn display_date(raw: &str) -> String {
    pipeline::parse_timestamp(raw)
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| if raw.is_empty() { "-".to_string() } else { raw.to_string() })
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max.saturating_sub(3)).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("Google", 10), "Google");
        assert_eq!(truncate("Software Engineer II", 10), "Softwar...");
        assert_eq!(truncate("Zürich Zürich Zürich", 8), "Züric...");
    }

    #[test]
    fn test_filter_args_build_filter() {
        let cli = Cli::try_parse_from([
            "elevate", "apps", "list", "--status", "Offer", "--referred", "no", "--level", "All",
            "--from", "2024-10-01",
        ])
        .unwrap();
        let Commands::Apps { command: AppCommands::List { filters, .. } } = cli.command else {
            panic!("expected apps list");
        };
        let filter = filters.to_filter().unwrap();
        assert_eq!(filter.status, Some(ApplicationStatus::Offer));
        assert_eq!(filter.referred, Some(false));
        assert_eq!(filter.level, None);
        assert_eq!(filter.active_count(), 3);
    }

    #[test]
    fn test_login_parses_role_names_and_codes() {
        for (raw, role) in [("member", Role::Member), ("4", Role::Lead)] {
            let cli = Cli::try_parse_from(["elevate", "login", "--token", "t", "--user-id", "u", "--role", raw])
                .unwrap();
            let Commands::Login { role: parsed, .. } = cli.command else {
                panic!("expected login");
            };
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_display_date() {
        assert_eq!(display_date("2024-10-15T09:30:00Z"), "2024-10-15");
        assert_eq!(display_date(""), "-");
        assert_eq!(display_date("sometime"), "sometime");
    }

    #[test]
    fn test_reverse_flips_sort() {
        let cli = Cli::try_parse_from(["elevate", "apps", "list", "--sort", "company", "--reverse"]).unwrap();
        let Commands::Apps { command: AppCommands::List { filters, .. } } = cli.command else {
            panic!("expected apps list");
        };
        assert_eq!(filters.sort_state().unwrap().to_string(), "company_desc");

        let cli = Cli::try_parse_from(["elevate", "apps", "export"]).unwrap();
        let Commands::Apps { command: AppCommands::Export { filters, .. } } = cli.command else {
            panic!("expected apps export");
        };
        assert_eq!(filters.sort_state().unwrap().to_string(), "date_desc");
    }

    #[test]
    fn test_uploader_id_must_be_numeric() {
        let session = Session { access_token: "t".into(), user_id: "42".into(), role: Role::Lead };
        assert_eq!(uploader_id(&session).unwrap(), 42);

        let session = Session { user_id: "64f0c2".into(), ..session };
        let err = uploader_id(&session).unwrap_err();
        assert!(err.to_string().contains("64f0c2"));
    }
}
