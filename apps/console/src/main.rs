use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use console_core::{
    config::DEFAULT_SETTINGS_FILE, load_settings, ConsoleController, ConsoleError, ConsoleEvent,
    HttpConsoleBackend,
};
use shared::domain::{PlanId, SubscriptionStatus, UserId};
use tracing_subscriber::EnvFilter;

mod host;
mod notice;
mod render;
mod repl;

use host::{SettingsSession, TerminalConfirmation};
use notice::UserNotice;
use render::{render_metrics, render_view};

#[derive(Parser, Debug)]
#[command(name = "admin-console", about = "Tenant administration console")]
struct Cli {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Overrides `api_base_url` from settings and environment.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print metrics, one page of users and (for superadmins) the admin roster.
    Show {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        plan: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    Metrics,
    ChangePlan {
        user_id: UserId,
        /// Plan id, or `none` to remove the subscription plan.
        plan: String,
        status: String,
    },
    ToggleActive {
        user_id: UserId,
    },
    Promote {
        email: String,
    },
    Demote {
        user_id: UserId,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    SelfTestPlan {
        plan: String,
        status: String,
    },
    Repl,
}

pub(crate) fn parse_plan(raw: &str) -> Option<PlanId> {
    match raw.trim() {
        "none" | "any" | "-" => None,
        other => PlanId::parse(other),
    }
}

pub(crate) fn parse_status(raw: &str) -> Result<SubscriptionStatus> {
    raw.parse::<SubscriptionStatus>().map_err(|err| anyhow!(err))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    if let Some(api_url) = &cli.api_url {
        settings.api_base_url = console_core::config::normalize_base_url(api_url);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let backend = Arc::new(HttpConsoleBackend::from_settings(&settings));
    let assume_yes = matches!(cli.command, Command::Demote { yes: true, .. });
    let console = ConsoleController::new_with_dependencies(
        backend.clone(),
        Arc::new(SettingsSession::new(cli.config.clone(), backend)),
        Arc::new(TerminalConfirmation::new(assume_yes)),
        &settings,
    );

    if let Err(err) = run_command(&console, cli.command, settings.search_debounce()).await {
        let notice = match err.downcast_ref::<ConsoleError>() {
            Some(console_err) => UserNotice::from_console_error(console_err),
            None => UserNotice::from_message(format!("{err:#}")),
        };
        repl::report(&notice);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(
    console: &Arc<ConsoleController>,
    command: Command,
    search_debounce: Duration,
) -> Result<()> {
    match command {
        Command::Repl => return repl::run(console.clone()).await,
        Command::Show {
            search,
            plan,
            status,
            page,
        } => {
            console.load_all().await?;
            if let Some(plan) = plan {
                console.set_plan_filter(parse_plan(&plan)).await?;
            }
            if let Some(status) = status {
                console.set_status_filter(Some(parse_status(&status)?)).await?;
            }
            if let Some(search) = search {
                search_and_wait(console, search, search_debounce).await?;
            }
            if let Some(page) = page {
                console.go_to_page(page).await?;
            }
            print!("{}", render_view(&console.render().await));
        }
        Command::Metrics => {
            let metrics = console.refresh_metrics_only().await?;
            println!(
                "{}",
                render_metrics(&console_core::view::MetricsPanel::from(&metrics))
            );
        }
        Command::ChangePlan {
            user_id,
            plan,
            status,
        } => {
            let status = parse_status(&status)?;
            console
                .change_user_plan(user_id, parse_plan(&plan), status)
                .await?;
            println!("plan updated for {user_id}");
        }
        Command::ToggleActive { user_id } => {
            console.toggle_user_active(user_id).await?;
            println!("active flag toggled for {user_id}");
        }
        Command::Promote { email } => {
            console.load_all().await?;
            console.promote_to_admin(&email).await?;
            println!("{} is now an admin", email.trim());
        }
        Command::Demote { user_id, .. } => {
            console.load_all().await?;
            console.demote_admin(user_id).await?;
            println!("{user_id} demoted");
        }
        Command::SelfTestPlan { plan, status } => {
            let status = parse_status(&status)?;
            console.set_self_test_plan(parse_plan(&plan), status).await?;
            print!("{}", render_view(&console.render().await));
        }
    }
    Ok(())
}

/// One-shot searches go through the same debounce as typed ones.
async fn search_and_wait(
    console: &Arc<ConsoleController>,
    text: String,
    search_debounce: Duration,
) -> Result<()> {
    let mut events = console.subscribe_events();
    console.set_search_text(text).await;
    let wait = async {
        loop {
            match events.recv().await {
                Ok(ConsoleEvent::ViewCommitted { .. }) => return Ok(()),
                Ok(ConsoleEvent::Notification(err)) => return Err(anyhow::Error::new(err)),
                Ok(_) => continue,
                Err(err) => return Err(anyhow!("console event stream failed: {err}")),
            }
        }
    };
    tokio::time::timeout(search_debounce + Duration::from_secs(30), wait)
        .await
        .context("search did not complete")?
}
