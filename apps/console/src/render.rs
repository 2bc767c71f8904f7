use std::fmt::Write as _;

use console_core::{
    view::{MetricsPanel, UserRow},
    ConsoleView,
};

pub fn render_metrics(metrics: &MetricsPanel) -> String {
    format!(
        "users {} (active {}, paying {}) | revenue {}/mo | properties {} | whatsapp {} | messages 30d {}",
        metrics.total_users,
        metrics.active_users,
        metrics.paying_users,
        metrics.monthly_revenue,
        metrics.total_properties,
        metrics.whatsapp_connected_users,
        metrics.messages_last_30_days,
    )
}

fn render_user(row: &UserRow) -> String {
    let plan = row.plan.as_deref().unwrap_or("-");
    let status = row.status.as_deref().unwrap_or("-");
    let mut flags = Vec::new();
    if row.is_admin {
        flags.push("admin");
    }
    if !row.is_active {
        flags.push("inactive");
    }
    if row.whatsapp_connected {
        flags.push("whatsapp");
    }
    if row.over_property_limit {
        flags.push("over-limit");
    }
    format!(
        "{}  {:<24} {:<32} {:<12} {:<10} props {:<7} {}",
        row.id,
        row.name,
        row.email,
        plan,
        status,
        row.property_usage,
        flags.join(",")
    )
}

pub fn render_view(view: &ConsoleView) -> String {
    let mut out = String::new();
    if !view.loaded {
        out.push_str("(not loaded)\n");
        return out;
    }

    if let Some(metrics) = &view.metrics {
        let _ = writeln!(out, "{}", render_metrics(metrics));
    }

    let query = &view.query;
    let _ = writeln!(
        out,
        "search '{}' | plan {} | status {}{}",
        query.search_text,
        query
            .plan_filter
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "any".into()),
        query
            .status_filter
            .map(|status| status.to_string())
            .unwrap_or_else(|| "any".into()),
        if view.loading.listing { " | loading" } else { "" },
    );

    if view.users.is_empty() {
        out.push_str("  no users match\n");
    }
    for row in &view.users {
        let _ = writeln!(out, "  {}", render_user(row));
    }

    let pagination = view.pagination;
    let _ = writeln!(
        out,
        "page {}/{}{}{}",
        pagination.page,
        pagination.total_pages,
        if pagination.has_previous { " [prev]" } else { "" },
        if pagination.has_next { " [next]" } else { "" },
    );

    if let Some(admin) = &view.admin_management {
        out.push_str("admins:\n");
        for row in &admin.admins {
            let _ = writeln!(
                out,
                "  {}  {}{}",
                row.id,
                row.email,
                if row.is_superadmin {
                    " (superadmin)"
                } else if row.can_demote {
                    ""
                } else {
                    " (protected)"
                }
            );
        }
        if !admin.pending_email.is_empty() {
            let _ = writeln!(out, "  pending promotion: {}", admin.pending_email);
        }
    }
    out
}
