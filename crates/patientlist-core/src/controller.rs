//! Patient list state management.
//!
//! `PatientListController` owns the loaded record set and the user's view
//! state (filters, search term, page, selection). The visible page is derived
//! on every read by running filter -> search -> paginate over the records.
//!
//! Loading happens in a spawned Tokio task. Results travel back through an
//! MPSC channel and are applied when the owner calls
//! [`PatientListController::check_background_tasks`] or awaits
//! [`PatientListController::settle`]. Between those calls every other
//! operation keeps working against whatever records are currently held.

use std::collections::{BTreeSet, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::ControllerOptions;
use crate::models::{PatientFilters, PatientRecord};
use crate::source::{DataOrigin, FetchedPatients, PatientSource};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the load result channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Number of pages needed for `count` records, never less than 1.
pub fn page_count(count: usize, per_page: usize) -> usize {
    count.div_ceil(per_page.max(1)).max(1)
}

/// Where the controller is in its load lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    Unloaded,
    Loading,
    Loaded,
    Errored,
}

/// Result of one background load, tagged with the id `load` returned.
struct LoadOutcome {
    load_id: u64,
    result: Result<FetchedPatients>,
}

/// Snapshot of everything a render layer needs for one frame
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientListView {
    pub patients: Vec<PatientRecord>,
    pub current_page: usize,
    pub total_pages: usize,
    pub per_page: usize,
    pub filtered_count: usize,
    pub total_count: usize,
    pub phase: LoadPhase,
    pub loading: bool,
    pub error: bool,
    pub error_message: Option<String>,
    /// Where the displayed records came from; `None` before the first successful load
    pub origin: Option<DataOrigin>,
    pub selected_ids: Vec<i64>,
    pub filters: PatientFilters,
    pub search_term: String,
}

pub struct PatientListController {
    source: Arc<dyn PatientSource>,
    options: ControllerOptions,

    // Loaded data, replaced wholesale on each successful load
    all_records: Vec<PatientRecord>,
    origin: Option<DataOrigin>,

    // View state
    filters: PatientFilters,
    search_term: String,
    selected_ids: BTreeSet<i64>,
    current_page: usize,

    // Load tracking
    outstanding: usize,
    next_load_id: u64,
    /// Outcome of the most recently resolved load
    settled_phase: LoadPhase,
    last_error: Option<String>,
    load_tx: mpsc::Sender<LoadOutcome>,
    load_rx: mpsc::Receiver<LoadOutcome>,
}

impl PatientListController {
    pub fn new(source: Arc<dyn PatientSource>, options: ControllerOptions) -> Self {
        let (load_tx, load_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            source,
            options: options.with_per_page(options.per_page),
            all_records: Vec::new(),
            origin: None,
            filters: PatientFilters::default(),
            search_term: String::new(),
            selected_ids: BTreeSet::new(),
            current_page: 1,
            outstanding: 0,
            next_load_id: 1,
            settled_phase: LoadPhase::Unloaded,
            last_error: None,
            load_tx,
            load_rx,
        }
    }

    pub fn with_source<S: PatientSource + 'static>(source: S, options: ControllerOptions) -> Self {
        Self::new(Arc::new(source), options)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Start fetching the full record set in the background.
    ///
    /// Returns immediately with an id identifying this load in log events.
    /// Must be called from within a Tokio runtime. Loads are never cancelled;
    /// when several are outstanding, the last one to resolve wins.
    pub fn load(&mut self) -> u64 {
        let load_id = self.next_load_id;
        self.next_load_id += 1;
        self.outstanding += 1;

        info!(load_id, source = self.source.name(), outstanding = self.outstanding, "Loading patients");

        let source = Arc::clone(&self.source);
        let tx = self.load_tx.clone();

        tokio::spawn(async move {
            let result = match AssertUnwindSafe(source.fetch()).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("patient source panicked")),
            };
            if tx.send(LoadOutcome { load_id, result }).await.is_err() {
                debug!(load_id, "Controller dropped before load completed");
            }
        });

        load_id
    }

    /// Apply any loads that have already resolved, without waiting.
    /// Returns how many outcomes were applied.
    pub fn check_background_tasks(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.load_rx.try_recv() {
            self.process_load_outcome(outcome);
            applied += 1;
        }
        applied
    }

    /// Wait until no load is outstanding, applying outcomes as they arrive.
    pub async fn settle(&mut self) {
        while self.outstanding > 0 {
            match self.load_rx.recv().await {
                Some(outcome) => self.process_load_outcome(outcome),
                None => break,
            }
        }
    }

    /// `load` followed by `settle`
    pub async fn load_and_settle(&mut self) {
        self.load();
        self.settle().await;
    }

    fn process_load_outcome(&mut self, outcome: LoadOutcome) {
        self.outstanding = self.outstanding.saturating_sub(1);
        let load_id = outcome.load_id;

        match outcome.result {
            Ok(FetchedPatients { records, origin }) => {
                info!(load_id, count = records.len(), origin = %origin, "Patients loaded");
                self.all_records = records;
                self.origin = Some(origin);
                self.current_page = 1;
                self.settled_phase = LoadPhase::Loaded;
                self.last_error = None;
                if self.options.prune_stale_selection {
                    self.prune_selection();
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(load_id, error = %message, "Failed to load patients");
                self.settled_phase = LoadPhase::Errored;
                self.last_error = Some(message);
            }
        }
    }

    /// Drop selected ids that no longer exist in the loaded records
    fn prune_selection(&mut self) {
        let present: HashSet<i64> = self.all_records.iter().map(|r| r.id).collect();
        let before = self.selected_ids.len();
        self.selected_ids.retain(|id| present.contains(id));
        let pruned = before - self.selected_ids.len();
        if pruned > 0 {
            debug!(pruned, "Pruned stale selections after reload");
        }
    }

    // =========================================================================
    // Load state
    // =========================================================================

    pub fn phase(&self) -> LoadPhase {
        if self.outstanding > 0 {
            LoadPhase::Loading
        } else {
            self.settled_phase
        }
    }

    pub fn is_loading(&self) -> bool {
        self.outstanding > 0
    }

    /// True when the most recently resolved load failed and none is outstanding
    pub fn has_error(&self) -> bool {
        self.phase() == LoadPhase::Errored
    }

    /// Message of the most recent failure, kept until a load succeeds
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Provenance of the records currently held.
    /// A failed load keeps the records, and so the origin, of the last success.
    pub fn origin(&self) -> Option<&DataOrigin> {
        self.origin.as_ref()
    }

    // =========================================================================
    // Filtering, search and paging
    // =========================================================================

    /// Replace both filters. Blank values are treated as unset.
    pub fn apply_filters(&mut self, filters: PatientFilters) {
        self.filters = filters.normalized();
        self.current_page = 1;
        debug!(service = ?self.filters.service, rank = ?self.filters.rank, "Filters applied");
    }

    /// Unset both filters and clear the search term
    pub fn clear_filters(&mut self) {
        self.filters = PatientFilters::default();
        self.search_term.clear();
        self.current_page = 1;
        debug!("Filters cleared");
    }

    /// Set the name search term. Stored trimmed but with its original case.
    pub fn search_patients(&mut self, term: &str) {
        self.search_term = term.trim().to_string();
        self.current_page = 1;
        debug!(term = %self.search_term, "Search applied");
    }

    /// Move to `page`, clamped into `1..=total_pages`. Returns the new page.
    pub fn go_to_page(&mut self, page: i64) -> usize {
        let total = self.total_pages() as i64;
        self.current_page = page.clamp(1, total) as usize;
        self.current_page
    }

    pub fn next_page(&mut self) -> usize {
        self.go_to_page(self.current_page as i64 + 1)
    }

    pub fn prev_page(&mut self) -> usize {
        self.go_to_page(self.current_page as i64 - 1)
    }

    /// Records passing the filters and search term, before pagination
    pub fn filtered_patients(&self) -> Vec<&PatientRecord> {
        self.all_records
            .iter()
            .filter(|r| self.filters.matches(r))
            .filter(|r| r.matches_search(&self.search_term))
            .collect()
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered_patients().len()
    }

    /// The current page of filtered, searched records
    pub fn patients_to_display(&self) -> Vec<&PatientRecord> {
        let per_page = self.options.per_page;
        let start = (self.current_page - 1) * per_page;
        self.filtered_patients()
            .into_iter()
            .skip(start)
            .take(per_page)
            .collect()
    }

    pub fn total_pages(&self) -> usize {
        page_count(self.filtered_count(), self.options.per_page)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn per_page(&self) -> usize {
        self.options.per_page
    }

    pub fn filters(&self) -> &PatientFilters {
        &self.filters
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn all_records(&self) -> &[PatientRecord] {
        &self.all_records
    }

    /// Distinct services in load order, lower-cased, for filter dropdowns
    pub fn available_services(&self) -> Vec<String> {
        Self::distinct_lowercase(self.all_records.iter().map(|r| r.service.as_str()))
    }

    /// Distinct ranks in load order, lower-cased, for filter dropdowns
    pub fn available_ranks(&self) -> Vec<String> {
        Self::distinct_lowercase(self.all_records.iter().map(|r| r.rank.as_str()))
    }

    fn distinct_lowercase<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut seen = HashSet::new();
        values
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .filter(|v| seen.insert(v.clone()))
            .collect()
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Flip membership of `record.id` in the selection.
    /// Returns true if the record is now selected.
    pub fn toggle_select_patient(&mut self, record: &PatientRecord) -> bool {
        if self.selected_ids.remove(&record.id) {
            false
        } else {
            self.selected_ids.insert(record.id);
            true
        }
    }

    pub fn is_selected(&self, id: i64) -> bool {
        self.selected_ids.contains(&id)
    }

    pub fn selected_ids(&self) -> &BTreeSet<i64> {
        &self.selected_ids
    }

    pub fn clear_selection(&mut self) {
        self.selected_ids.clear();
    }

    /// Loaded records whose id is selected, in load order
    pub fn selected_patients(&self) -> Vec<&PatientRecord> {
        self.all_records
            .iter()
            .filter(|r| self.selected_ids.contains(&r.id))
            .collect()
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    pub fn view(&self) -> PatientListView {
        PatientListView {
            patients: self.patients_to_display().into_iter().cloned().collect(),
            current_page: self.current_page,
            total_pages: self.total_pages(),
            per_page: self.options.per_page,
            filtered_count: self.filtered_count(),
            total_count: self.all_records.len(),
            phase: self.phase(),
            loading: self.is_loading(),
            error: self.has_error(),
            error_message: self.last_error.clone(),
            origin: self.origin.clone(),
            selected_ids: self.selected_ids.iter().copied().collect(),
            filters: self.filters.clone(),
            search_term: self.search_term.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
