//! Plain-text rendering of a patient list view.

use std::fmt::Write;

use patientlist_core::utils::truncate_string;
use patientlist_core::{CacheReason, DataOrigin, LoadPhase, PatientListView};

/// Maximum characters in the name column
const NAME_WIDTH: usize = 28;

/// Render the current page as a fixed-width table with a pagination footer
pub fn render_table(view: &PatientListView) -> String {
    let mut out = String::new();

    if view.phase == LoadPhase::Errored {
        let message = view.error_message.as_deref().unwrap_or("unknown error");
        let _ = writeln!(out, "Error loading patients: {}", message);
    }

    if view.patients.is_empty() {
        out.push_str("No patients found.\n");
    } else {
        let _ = writeln!(
            out,
            "{:<3} {:>6}  {:<width$}  {:<12} {:<6}",
            "Sel", "ID", "Name", "Service", "Rank",
            width = NAME_WIDTH
        );
        for patient in &view.patients {
            let marker = if view.selected_ids.contains(&patient.id) { "[x]" } else { "[ ]" };
            let _ = writeln!(
                out,
                "{:<3} {:>6}  {:<width$}  {:<12} {:<6}",
                marker,
                patient.id,
                truncate_string(&patient.display_name(), NAME_WIDTH),
                patient.service_display(),
                patient.rank_display(),
                width = NAME_WIDTH
            );
        }
    }

    let _ = writeln!(
        out,
        "Page {} of {} ({} matching, {} total)",
        view.current_page, view.total_pages, view.filtered_count, view.total_count
    );

    if let Some(line) = view.origin.as_ref().and_then(origin_line) {
        let _ = writeln!(out, "{}", line);
    }

    let mut active = Vec::new();
    if let Some(ref service) = view.filters.service {
        active.push(format!("service={}", service));
    }
    if let Some(ref rank) = view.filters.rank {
        active.push(format!("rank={}", rank));
    }
    if !view.search_term.is_empty() {
        active.push(format!("search=\"{}\"", view.search_term));
    }
    if !active.is_empty() {
        let _ = writeln!(out, "Filters: {}", active.join(", "));
    }
    if !view.selected_ids.is_empty() {
        let _ = writeln!(out, "Selected: {}", view.selected_ids.len());
    }

    out
}

/// Footer note for cached data; live data needs none
fn origin_line(origin: &DataOrigin) -> Option<String> {
    let DataOrigin::Cache { stamp, reason } = origin else {
        return None;
    };
    let stale = if stamp.is_stale() { " (stale)" } else { "" };
    let why = match reason {
        CacheReason::Offline => "offline mode".to_string(),
        CacheReason::Fallback { error } => format!("live fetch failed: {}", error),
    };
    Some(format!("Served from cache, {}{} - {}", stamp, stale, why))
}
