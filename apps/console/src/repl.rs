//! Line-oriented console. Views are printed from the controller's event stream,
//! so debounced searches show up without a separate command.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use console_core::{ConsoleController, ConsoleError, ConsoleEvent};
use shared::domain::{PlanId, SubscriptionStatus, UserId};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::{
    host::read_line,
    notice::UserNotice,
    parse_plan, parse_status,
    render::{render_metrics, render_view},
};

const HELP: &str = "\
commands:
  show | refresh                      reload metrics, users and admins
  metrics                             refresh metrics only
  search <text>                       debounced user search (empty text clears it)
  plan <id|none>  status <s|none>     filter the listing
  clear                               reset search and filters
  next | prev | page <n>              paginate
  change-plan <user> <plan|none> <status>
  toggle <user>                       activate / deactivate a user
  email <address>                     stage an email for promotion
  promote [address]                   promote the given or staged email
  demote <user>                       demote an admin (asks for confirmation)
  self-plan <plan|none> <status>      switch your own plan, then reload everything
  reload                              invalidate the session and reload
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Show,
    Metrics,
    Search(String),
    Plan(Option<PlanId>),
    Status(Option<SubscriptionStatus>),
    Clear,
    Next,
    Previous,
    Page(u32),
    ChangePlan {
        user_id: UserId,
        plan_id: Option<PlanId>,
        status: SubscriptionStatus,
    },
    Toggle(UserId),
    Email(String),
    Promote(Option<String>),
    Demote(UserId),
    SelfPlan {
        plan_id: Option<PlanId>,
        status: SubscriptionStatus,
    },
    Reload,
    Help,
    Quit,
}

fn parse_user(raw: Option<&str>) -> Result<UserId> {
    let raw = raw.ok_or_else(|| anyhow!("missing user id"))?;
    raw.parse()
        .map_err(|_| anyhow!("invalid user id '{raw}'"))
}

fn required<'a>(raw: Option<&'a str>, what: &str) -> Result<&'a str> {
    raw.ok_or_else(|| anyhow!("missing {what}"))
}

pub fn parse_command(line: &str) -> Result<Option<ReplCommand>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let command = match word {
        "" => return Ok(None),
        "show" | "refresh" => ReplCommand::Show,
        "metrics" => ReplCommand::Metrics,
        "search" => ReplCommand::Search(rest.to_string()),
        "plan" => ReplCommand::Plan(parse_plan(required(args.next(), "plan")?)),
        "status" => ReplCommand::Status(match required(args.next(), "status")? {
            "none" | "any" | "-" => None,
            raw => Some(parse_status(raw)?),
        }),
        "clear" => ReplCommand::Clear,
        "next" => ReplCommand::Next,
        "prev" | "previous" => ReplCommand::Previous,
        "page" => {
            let raw = required(args.next(), "page number")?;
            ReplCommand::Page(
                raw.parse()
                    .map_err(|_| anyhow!("invalid page number '{raw}'"))?,
            )
        }
        "change-plan" => ReplCommand::ChangePlan {
            user_id: parse_user(args.next())?,
            plan_id: parse_plan(required(args.next(), "plan")?),
            status: parse_status(required(args.next(), "status")?)?,
        },
        "toggle" => ReplCommand::Toggle(parse_user(args.next())?),
        "email" => ReplCommand::Email(rest.to_string()),
        "promote" => ReplCommand::Promote((!rest.is_empty()).then(|| rest.to_string())),
        "demote" => ReplCommand::Demote(parse_user(args.next())?),
        "self-plan" => ReplCommand::SelfPlan {
            plan_id: parse_plan(required(args.next(), "plan")?),
            status: parse_status(required(args.next(), "status")?)?,
        },
        "reload" => ReplCommand::Reload,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => bail!("unknown command '{other}' (try `help`)"),
    };
    Ok(Some(command))
}

pub async fn run(console: Arc<ConsoleController>) -> Result<()> {
    let printer = tokio::spawn(print_events(console.clone()));
    println!("{HELP}");

    if let Err(err) = console.load_all().await {
        debug!(error = %err, "console: initial load failed");
    }

    while let Some(line) = read_line("> ").await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                report(&UserNotice::from_message(err.to_string()));
                continue;
            }
        };
        if command == ReplCommand::Quit {
            break;
        }
        if let Err(err) = execute(&console, command).await {
            // Fetch and mutation failures already arrived as notifications.
            if matches!(err, ConsoleError::Validation(_)) {
                report(&UserNotice::from_console_error(&err));
            }
        }
    }

    printer.abort();
    Ok(())
}

async fn execute(
    console: &Arc<ConsoleController>,
    command: ReplCommand,
) -> Result<(), ConsoleError> {
    match command {
        ReplCommand::Show => {
            console.load_all().await?;
        }
        ReplCommand::Metrics => {
            console.refresh_metrics_only().await?;
        }
        ReplCommand::Search(text) => console.set_search_text(text).await,
        ReplCommand::Plan(plan_id) => {
            console.set_plan_filter(plan_id).await?;
        }
        ReplCommand::Status(status) => {
            console.set_status_filter(status).await?;
        }
        ReplCommand::Clear => {
            console.clear_filters().await?;
        }
        ReplCommand::Next => {
            console.next_page().await?;
        }
        ReplCommand::Previous => {
            console.previous_page().await?;
        }
        ReplCommand::Page(page) => {
            console.go_to_page(page).await?;
        }
        ReplCommand::ChangePlan {
            user_id,
            plan_id,
            status,
        } => {
            console.change_user_plan(user_id, plan_id, status).await?;
        }
        ReplCommand::Toggle(user_id) => {
            console.toggle_user_active(user_id).await?;
        }
        ReplCommand::Email(email) => console.set_pending_admin_email(email).await,
        ReplCommand::Promote(email) => {
            let email = match email {
                Some(email) => {
                    console.set_pending_admin_email(email.clone()).await;
                    email
                }
                None => console.pending_admin_email().await,
            };
            console.promote_to_admin(&email).await?;
        }
        ReplCommand::Demote(user_id) => {
            console.demote_admin(user_id).await?;
        }
        ReplCommand::SelfPlan { plan_id, status } => {
            console.set_self_test_plan(plan_id, status).await?;
        }
        ReplCommand::Reload => {
            console.invalidate_session_and_refetch_all().await?;
        }
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Quit => {}
    }
    Ok(())
}

async fn print_events(console: Arc<ConsoleController>) {
    let mut events = console.subscribe_events();
    loop {
        match events.recv().await {
            Ok(ConsoleEvent::ViewCommitted { .. }) => {
                print!("{}", render_view(&console.render().await));
            }
            Ok(ConsoleEvent::MetricsRefreshed) => {
                if let Some(metrics) = console.render().await.metrics {
                    println!("{}", render_metrics(&metrics));
                }
            }
            Ok(ConsoleEvent::SessionReloaded) => println!("session reloaded"),
            Ok(ConsoleEvent::StaleFetchDiscarded { generation }) => {
                debug!(generation, "console: superseded listing dropped");
            }
            Ok(ConsoleEvent::Notification(err)) => report(&UserNotice::from_console_error(&err)),
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "console: event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

pub fn report(notice: &UserNotice) {
    eprintln!("{} {}", notice.headline(), notice.message());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filters_and_paging() {
        assert_eq!(
            parse_command("plan none").expect("plan"),
            Some(ReplCommand::Plan(None))
        );
        assert_eq!(
            parse_command("status past-due").expect("status"),
            Some(ReplCommand::Status(Some(SubscriptionStatus::PastDue)))
        );
        assert_eq!(
            parse_command(" page 4 ").expect("page"),
            Some(ReplCommand::Page(4))
        );
        assert_eq!(parse_command("   ").expect("blank"), None);
    }

    #[test]
    fn search_keeps_inner_spaces() {
        assert_eq!(
            parse_command("search ana maria").expect("search"),
            Some(ReplCommand::Search("ana maria".into()))
        );
        assert_eq!(
            parse_command("search").expect("clear search"),
            Some(ReplCommand::Search(String::new()))
        );
    }

    #[test]
    fn mutation_commands_need_valid_ids() {
        let user_id = UserId::new_v4();
        assert_eq!(
            parse_command(&format!("change-plan {user_id} pro trialing")).expect("change"),
            Some(ReplCommand::ChangePlan {
                user_id,
                plan_id: PlanId::parse("pro"),
                status: SubscriptionStatus::Trialing,
            })
        );
        assert!(parse_command("toggle 42").is_err());
        assert!(parse_command("demote").is_err());
        assert_eq!(
            parse_command("promote").expect("staged"),
            Some(ReplCommand::Promote(None))
        );
    }

    #[test]
    fn unknown_words_are_rejected() {
        let err = parse_command("frobnicate").expect_err("unknown");
        assert!(err.to_string().contains("unknown command"));
    }
}
