use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgGroup, Args, Parser, Subcommand};
use console::net::api::{ImageSource, ResourceScope, UploadRequest};
use console::poll::{PollEvent, TaskWatch};
use console::state::preview::{PreviewError, PreviewStore};
use console::train::{TrainForm, TrainFormError};
use console::{ApiClient, ApiError, ConsoleConfig, Dispatcher, FileSessionStore, Navigator, Route};
use insights::{DashboardStats, MODEL_PAGE_SIZE, RESOURCE_PAGE_SIZE, ResourceFilter};
use records::{Id, ProfileUpdate, RegisterRequest, ResetPasswordRequest, ResourceKind};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{notice}")]
    Api {
        notice: String,
        #[source]
        source: ApiError,
    },
    #[error("not signed in")]
    SignedOut,
    #[error(transparent)]
    Train(#[from] TrainFormError),
    #[error(transparent)]
    Preview(#[from] PreviewError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("nothing to update; pass --username, --phone or --email")]
    EmptyUpdate,
    #[error("pass --file or --resource")]
    MissingImage,
    #[error("no model with id {0}")]
    ModelNotFound(Id),
    #[error("training failed: {0}")]
    TaskFailed(String),
}

impl CliError {
    fn needs_login(&self) -> bool {
        match self {
            Self::SignedOut => true,
            Self::Api { source, .. } => source.is_unauthorized(),
            _ => false,
        }
    }
}

/// Map an [`ApiError`] to its one-line notice, with `fallback` for failures
/// that carry no server message.
fn api(fallback: &'static str) -> impl FnOnce(ApiError) -> CliError {
    move |source| CliError::Api { notice: source.notice(fallback), source }
}

#[derive(Parser, Debug)]
#[command(name = "continuum", about = "Continual-learning platform console")]
struct Cli {
    #[arg(long, env = "CONTINUUM_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CONTINUUM_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session.
    Login {
        account: String,
        #[arg(long, env = "CONTINUUM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    Register {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CONTINUUM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    ResetPassword {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        new_password: String,
    },
    Profile(ProfileCommand),
    /// Platform overview: running tasks, models, storage.
    Dashboard,
    Model(ModelCommand),
    Resource(ResourceCommand),
    /// Submit a training job.
    Train(TrainCommand),
    Task(TaskCommand),
    /// Accuracy summary and per-task series for one model.
    Results {
        model_id: Id,
    },
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Show,
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ModelCommand {
    #[command(subcommand)]
    command: ModelSubcommand,
}

#[derive(Subcommand, Debug)]
enum ModelSubcommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Delete {
        model_id: Id,
    },
    /// Classify an image with a trained model.
    #[command(group(ArgGroup::new("image").required(true).args(["file", "resource"])))]
    Predict {
        model_id: Id,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Use an uploaded image resource instead of a local file.
        #[arg(long)]
        resource: Option<Id>,
    },
}

#[derive(Args, Debug)]
struct ResourceCommand {
    #[command(subcommand)]
    command: ResourceSubcommand,
}

#[derive(Subcommand, Debug)]
enum ResourceSubcommand {
    List {
        /// `all`, `image`, `dataset` or `others`.
        #[arg(long = "type", default_value = "all")]
        filter: ResourceFilter,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = RESOURCE_PAGE_SIZE)]
        page_size: usize,
        /// Keep image previews for the listed page in this directory.
        #[arg(long)]
        previews: Option<PathBuf>,
    },
    Upload {
        path: PathBuf,
        #[arg(long = "type")]
        kind: ResourceKind,
        /// Defaults to the file name.
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    Delete {
        resource_id: Id,
    },
    /// Download an image resource.
    Image {
        resource_id: Id,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TrainCommand {
    model_name: String,
    /// Display label (`CIFAR-10`, `CIFAR-100`, `Tiny-imagenet`) or backend id.
    #[arg(long, default_value = "CIFAR-10")]
    dataset: String,
    /// Keep training an existing model with the backend's fallback settings.
    #[arg(long = "continue")]
    continue_training: bool,
    #[arg(long)]
    lr: Option<f64>,
    #[arg(long)]
    batch_size: Option<u32>,
    #[arg(long)]
    buffer_size: Option<u32>,
    #[arg(long)]
    epochs: Option<u32>,
    /// Extra backend argument as key=value; repeatable.
    #[arg(long = "param")]
    params: Vec<String>,
    /// Follow the task's logs until it finishes.
    #[arg(long)]
    watch: bool,
}

#[derive(Args, Debug)]
struct TaskCommand {
    #[command(subcommand)]
    command: TaskSubcommand,
}

#[derive(Subcommand, Debug)]
enum TaskSubcommand {
    List,
    Logs { task_id: Id },
    Stop { task_id: Id },
    /// Follow a task's logs until it finishes.
    Watch { task_id: Id },
}

impl Command {
    /// Console view the command stands in for.
    fn route(&self) -> Route {
        match self {
            Self::Login { .. } | Self::Logout => Route::Login,
            Self::Register { .. } => Route::Register,
            Self::ResetPassword { .. } => Route::ForgetPassword,
            Self::Profile(_) => Route::Profile,
            Self::Dashboard => Route::Dashboard,
            Self::Model(ModelCommand { command: ModelSubcommand::Predict { .. } }) => Route::Classify,
            Self::Model(_) => Route::ModelManagement,
            Self::Resource(_) => Route::ResourceManagement,
            Self::Train(_) => Route::TrainConfig,
            Self::Task(_) => Route::TaskManagement,
            Self::Results { .. } => Route::Visualization,
        }
    }
}

struct CliContext {
    client: ApiClient,
    config: ConsoleConfig,
    json: bool,
}

impl CliContext {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<(), CliError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }

    fn notice(&self, notice: &records::Notice, fallback: &str) -> Result<(), CliError> {
        self.emit(notice, || notice.message.clone().unwrap_or_else(|| fallback.to_owned()))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            if error.needs_login() {
                eprintln!("hint: run `continuum login <account>` to sign in");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ConsoleConfig::from_env();
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(path) = cli.session_file {
        config = config.with_session_file(path);
    }
    debug!(base_url = %config.base_url, session_file = %config.session_file.display(), "console configured");

    let sessions = Arc::new(FileSessionStore::new(config.session_file.clone()));
    let navigator = Navigator::default();
    let dispatcher = Dispatcher::new(&config, sessions, navigator).map_err(api("failed to start HTTP client"))?;
    let ctx = CliContext { client: ApiClient::new(dispatcher), config, json: cli.json };

    let route = cli.command.route();
    if ctx.client.dispatcher().navigate(route) != route {
        return Err(CliError::SignedOut);
    }

    match cli.command {
        Command::Login { account, password } => {
            let reply = ctx.client.login(&account, &password).await.map_err(api("login failed"))?;
            ctx.emit(&reply, || format!("signed in as user {}", reply.user_id))
        }
        Command::Logout => {
            ctx.client.logout().map_err(api("logout failed"))?;
            println!("signed out");
            Ok(())
        }
        Command::Register { phone, email, password } => {
            let request = RegisterRequest { phone, email, password };
            let notice = ctx.client.register(&request).await.map_err(api("registration failed"))?;
            ctx.notice(&notice, "registered")
        }
        Command::ResetPassword { phone, email, new_password } => {
            let request = ResetPasswordRequest { phone, email, new_password };
            let notice = ctx.client.reset_password(&request).await.map_err(api("password reset failed"))?;
            ctx.notice(&notice, "password reset")
        }
        Command::Profile(profile) => run_profile(&ctx, profile.command).await,
        Command::Dashboard => run_dashboard(&ctx).await,
        Command::Model(model) => run_model(&ctx, model.command).await,
        Command::Resource(resource) => run_resource(&ctx, resource.command).await,
        Command::Train(train) => run_train(&ctx, train).await,
        Command::Task(task) => run_task(&ctx, task.command).await,
        Command::Results { model_id } => {
            let models = ctx.client.list_models().await.map_err(api("failed to load models"))?;
            let model = models
                .into_iter()
                .find(|model| model.id == model_id)
                .ok_or(CliError::ModelNotFound(model_id))?;
            ctx.emit(&model, || render::results(&model))
        }
    }
}

async fn run_profile(ctx: &CliContext, command: ProfileSubcommand) -> Result<(), CliError> {
    match command {
        ProfileSubcommand::Show => {
            let profile = ctx.client.profile().await.map_err(api("failed to load profile"))?;
            ctx.emit(&profile, || render::profile(&profile))
        }
        ProfileSubcommand::Update { username, phone, email } => {
            let update = ProfileUpdate { username, phone, email };
            if update.is_empty() {
                return Err(CliError::EmptyUpdate);
            }
            let notice = ctx.client.update_profile(&update).await.map_err(api("failed to update profile"))?;
            ctx.notice(&notice, "profile updated")
        }
    }
}

async fn run_dashboard(ctx: &CliContext) -> Result<(), CliError> {
    let client = &ctx.client;
    let (models, tasks, usage) = tokio::try_join!(client.list_models(), client.list_tasks(), client.resource_dashboard())
        .map_err(api("failed to load dashboard"))?;
    let stats = DashboardStats::compute(&models, &tasks, &usage);
    ctx.emit(&stats, || render::dashboard(&stats))
}

async fn run_model(ctx: &CliContext, command: ModelSubcommand) -> Result<(), CliError> {
    match command {
        ModelSubcommand::List { page } => {
            let models = ctx.client.list_models().await.map_err(api("failed to load models"))?;
            let page = insights::paginate(&models, page, MODEL_PAGE_SIZE);
            ctx.emit(&page.items, || render::models(&page))
        }
        ModelSubcommand::Delete { model_id } => {
            let notice = ctx.client.delete_model(&model_id).await.map_err(api("failed to delete model"))?;
            ctx.notice(&notice, "model deleted")
        }
        ModelSubcommand::Predict { model_id, file, resource } => {
            let image = match (file, resource) {
                (Some(path), _) => ImageSource::File(path),
                (None, Some(resource_id)) => {
                    let bytes = ctx.client.fetch_image(&resource_id).await.map_err(api("failed to load image"))?;
                    ImageSource::Bytes { name: format!("resource-{resource_id}"), bytes }
                }
                (None, None) => return Err(CliError::MissingImage),
            };
            let prediction = ctx.client.predict(&model_id, image).await.map_err(api("prediction failed"))?;
            ctx.emit(&prediction, || format!("{} ({:.3}s)", prediction.result, prediction.time_taken))
        }
    }
}

async fn run_resource(ctx: &CliContext, command: ResourceSubcommand) -> Result<(), CliError> {
    match command {
        ResourceSubcommand::List { filter, page, page_size, previews } => {
            let resources =
                ctx.client.list_resources(ResourceScope::All).await.map_err(api("failed to load resources"))?;
            let matching = insights::filter_resources(&resources, filter);
            let page = insights::paginate(&matching, page, page_size);

            let store = match previews {
                Some(dir) => Some(sync_previews(ctx, &dir, &page.items).await?),
                None => None,
            };
            let preview = |resource: &records::Resource| store.as_ref().and_then(|store| store.path_of(&resource.id));
            ctx.emit(&page.items, || render::resources(&page, preview))
        }
        ResourceSubcommand::Upload { path, kind, name, description } => {
            let name = name.unwrap_or_else(|| {
                path.file_name().map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned())
            });
            let upload = UploadRequest { path, kind, name, description };
            let notice = ctx.client.upload_resource(&upload).await.map_err(api("upload failed"))?;
            ctx.notice(&notice, "uploaded")
        }
        ResourceSubcommand::Delete { resource_id } => {
            let notice = ctx.client.delete_resource(&resource_id).await.map_err(api("failed to delete resource"))?;
            ctx.notice(&notice, "resource deleted")
        }
        ResourceSubcommand::Image { resource_id, out } => {
            let bytes = ctx.client.fetch_image(&resource_id).await.map_err(api("failed to load image"))?;
            tokio::fs::write(&out, &bytes).await.map_err(|source| CliError::Io { path: out.clone(), source })?;
            info!(%resource_id, path = %out.display(), bytes = bytes.len(), "image saved");
            println!("saved {} bytes to {}", bytes.len(), out.display());
            Ok(())
        }
    }
}

/// Make `dir` hold previews for exactly the images on the current page.
async fn sync_previews(
    ctx: &CliContext,
    dir: &Path,
    shown: &[&records::Resource],
) -> Result<PreviewStore, CliError> {
    let mut store = PreviewStore::open(dir)?;
    let images: Vec<Id> = shown
        .iter()
        .filter(|resource| resource.kind == ResourceKind::Image)
        .map(|resource| resource.id.clone())
        .collect();

    let missing: Vec<Id> = store.missing(&images).into_iter().cloned().collect();
    for id in &missing {
        let bytes = ctx.client.fetch_image(id).await.map_err(api("failed to load image preview"))?;
        let name = shown.iter().find(|resource| &resource.id == id).map_or("", |resource| resource.name.as_str());
        store.insert(id, name, &bytes)?;
    }
    let released = store.release_except(&images)?;
    debug!(fetched = missing.len(), released, "previews synced");
    Ok(store)
}

async fn run_train(ctx: &CliContext, command: TrainCommand) -> Result<(), CliError> {
    let mut form = if command.continue_training {
        TrainForm::continue_training(&command.model_name, &command.dataset)
    } else {
        TrainForm::new_training(&command.model_name, &command.dataset)
    };
    if let Some(lr) = command.lr {
        form.hyper.lr = lr;
    }
    if let Some(batch_size) = command.batch_size {
        form.hyper.batch_size = batch_size;
    }
    if let Some(buffer_size) = command.buffer_size {
        form.hyper.buffer_size = buffer_size;
    }
    if let Some(epochs) = command.epochs {
        form.hyper.epochs = epochs;
    }
    for raw in &command.params {
        form.push_extra(raw)?;
    }

    let (models, tasks) = tokio::try_join!(ctx.client.list_models(), ctx.client.list_tasks())
        .map_err(api("failed to check running tasks"))?;
    form.ensure_submittable(&models, &tasks)?;

    let accepted = ctx.client.submit_training(&form.into_request()).await.map_err(api("failed to submit training"))?;
    ctx.emit(&accepted.task_id, || format!("training submitted as task {}", accepted.task_id))?;

    if command.watch {
        follow_task(ctx, accepted.task_id).await?;
    }
    Ok(())
}

async fn run_task(ctx: &CliContext, command: TaskSubcommand) -> Result<(), CliError> {
    match command {
        TaskSubcommand::List => {
            let tasks = ctx.client.list_tasks().await.map_err(api("failed to load tasks"))?;
            ctx.emit(&tasks, || render::tasks(&tasks))
        }
        TaskSubcommand::Logs { task_id } => {
            let info = ctx.client.task_info(&task_id).await.map_err(api("failed to load task logs"))?;
            ctx.emit(&info, || match info.error() {
                Some(error) => format!("{}\n--- errors ---\n{error}", info.training_logs),
                None => info.training_logs.clone(),
            })
        }
        TaskSubcommand::Stop { task_id } => {
            let notice = ctx.client.stop_task(&task_id).await.map_err(api("failed to stop task"))?;
            ctx.notice(&notice, "task stopped")
        }
        TaskSubcommand::Watch { task_id } => follow_task(ctx, task_id).await,
    }
}

/// Stream new log output until the task finishes.
async fn follow_task(ctx: &CliContext, task_id: Id) -> Result<(), CliError> {
    let source = Arc::new(ctx.client.clone());
    let mut watch = TaskWatch::spawn(source, task_id, ctx.config.poll_interval);
    let mut shown = 0;

    while let Some(event) = watch.next().await {
        match event {
            PollEvent::Update(info) => {
                shown = render::stream_log_delta(&mut std::io::stdout().lock(), &info.training_logs, shown)
                    .map_err(|source| CliError::Io { path: PathBuf::from("<stdout>"), source })?;
            }
            PollEvent::Finished(info) => {
                println!("{}", render::log_delta(&info.training_logs, shown));
                if let Some(error) = info.error() {
                    return Err(CliError::TaskFailed(error.to_owned()));
                }
                println!("training completed");
                return Ok(());
            }
            PollEvent::Failed(error) => return Err(api("failed to fetch task status")(error)),
        }
    }
    Ok(())
}
