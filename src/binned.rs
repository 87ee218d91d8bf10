//! Binned event-study regression: one coefficient per event-time bin,
//! measured against an omitted reference bin.

use chrono::NaiveDate;

use crate::error::Result;
use crate::event_time::{assign_bins, choose_reference, event_time, observed_bins, EventBin};
use crate::jump::{fit_or_degenerate, pick, usable_controls, MIN_OBSERVATIONS};
use crate::ols::Design;
use crate::panel::Panel;
use crate::table::{EffectRow, EffectTable, TableSchema};

/// Rows that fall in a bin and carry a finite outcome, with their bins.
pub(crate) struct BinFrame {
    /// Panel positions of the retained rows.
    pub rows: Vec<usize>,
    /// Outcome at each retained row.
    pub response: Vec<f64>,
    /// Bin of each retained row.
    pub assigned: Vec<EventBin>,
    /// Observed bins other than the reference, ordered by midpoint.
    pub retained: Vec<EventBin>,
    pub reference: EventBin,
}

impl BinFrame {
    /// Builds the frame, or `None` when no row falls in any bin.
    pub fn new(
        panel: &Panel,
        outcome: &str,
        event_date: NaiveDate,
        bins: &[EventBin],
        requested_reference: Option<EventBin>,
    ) -> Result<Option<Self>> {
        let y = panel.require_numeric(outcome)?;
        let offsets = event_time(panel, event_date);
        let assigned_all = assign_bins(&offsets, bins);

        let mut rows = Vec::new();
        let mut assigned = Vec::new();
        for (row, bin) in assigned_all.iter().enumerate() {
            if let Some(bin) = bin {
                if y[row].is_finite() {
                    rows.push(row);
                    assigned.push(*bin);
                }
            }
        }

        let observed = observed_bins(&assigned.iter().copied().map(Some).collect::<Vec<_>>());
        let Some(reference) = choose_reference(&observed, requested_reference) else {
            return Ok(None);
        };
        log::debug!("reference bin {reference} for `{outcome}` at {event_date}");

        Ok(Some(Self {
            response: pick(&y, &rows),
            rows,
            assigned,
            retained: observed.into_iter().filter(|b| *b != reference).collect(),
            reference,
        }))
    }

    /// 0/1 indicator of `bin` over the retained rows.
    pub fn indicator(&self, bin: EventBin) -> Vec<f64> {
        self.assigned
            .iter()
            .map(|b| if *b == bin { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Estimates per-bin effects of `outcome` around `event_date`.
///
/// Each observed bin except the reference (`[-20,-1]` when observed, else the
/// bin with the smallest midpoint) gets an indicator; numeric controls are
/// appended; all-missing and constant columns are dropped; OLS with an
/// intercept is fit with Newey-West errors at `hac_lags`. Returns one row per
/// bin term that survives the fit, or an empty table with the
/// [`TableSchema::Basic`] columns when no usable design exists.
///
/// # Errors
///
/// [`crate::EventStudyError::MissingColumn`] if `outcome` is not in the panel.
pub fn binned_regression(
    panel: &Panel,
    outcome: &str,
    event_date: NaiveDate,
    bins: &[EventBin],
    controls: &[&str],
    hac_lags: usize,
) -> Result<EffectTable> {
    let empty = EffectTable::empty(TableSchema::Basic);
    let Some(frame) = BinFrame::new(panel, outcome, event_date, bins, None)? else {
        return Ok(empty);
    };
    if frame.retained.is_empty() {
        return Ok(empty);
    }

    let mut design = Design::new(frame.response.clone());
    for bin in &frame.retained {
        design.push(bin.label(), frame.indicator(*bin))?;
    }
    for name in usable_controls(panel, outcome, controls) {
        design.push(name, pick(&panel.require_numeric(name)?, &frame.rows))?;
    }
    design.drop_all_missing();

    let mut design = design.complete_cases();
    if design.nobs() < MIN_OBSERVATIONS {
        return Ok(empty);
    }
    let constant = design.drop_constant();
    if !constant.is_empty() {
        log::debug!("binned design drops constant columns {constant:?}");
    }
    if design.is_empty() {
        return Ok(empty);
    }

    let Some(fit) = fit_or_degenerate(&design, hac_lags)? else {
        return Ok(empty);
    };

    let mut table = empty;
    for bin in &frame.retained {
        let term = bin.label();
        if let (Some(estimate), Some(se)) = (fit.estimate(&term), fit.std_error(&term)) {
            table.push(EffectRow::new(term, estimate, se, fit.nobs()));
        }
    }
    Ok(table)
}
