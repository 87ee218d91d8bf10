//! Pooled event studies across entities: a treatment-group interaction and
//! entity fixed effects on top of the jump and binned designs.
//!
//! The group-1 path is the sum of the baseline and interaction coefficients;
//! its variance uses the covariance between the two from the same fit.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::binned::BinFrame;
use crate::error::Result;
use crate::event_time::{event_time, EventBin};
use crate::jump::{
    fit_or_degenerate, pick, post_indicator, usable_controls, window_rows, MIN_OBSERVATIONS, POST,
};
use crate::ols::{Design, RobustFit};
use crate::panel::Panel;
use crate::table::{EffectKind, EffectRow, EffectTable, TableSchema};

/// Name of the post x group interaction term.
pub const POST_X_GROUP: &str = "post_x_group";

/// Name of the interaction term for a bin.
pub fn interaction_term(bin: EventBin) -> String {
    format!("{bin}_x_group")
}

/// Treatment indicator coerced to numbers, missing treated as 0.
fn group_values(panel: &Panel, group_col: &str) -> Result<Vec<f64>> {
    Ok(panel
        .require_numeric(group_col)?
        .into_iter()
        .map(|g| if g.is_nan() { 0.0 } else { g })
        .collect())
}

/// One-hot columns for every category except the lexicographically first.
/// Rows without a category get NaN in every column and fall out of the
/// complete-case step.
fn fixed_effect_dummies(labels: &[Option<String>]) -> Vec<(String, Vec<f64>)> {
    let categories: BTreeSet<&str> = labels.iter().flatten().map(String::as_str).collect();
    categories
        .into_iter()
        .skip(1)
        .map(|category| {
            let values = labels
                .iter()
                .map(|label| match label {
                    Some(l) if l == category => 1.0,
                    Some(_) => 0.0,
                    None => f64::NAN,
                })
                .collect();
            (format!("fe_{category}"), values)
        })
        .collect()
}

fn pick_labels(labels: &[Option<String>], rows: &[usize]) -> Vec<Option<String>> {
    rows.iter().map(|&r| labels[r].clone()).collect()
}

/// Finishes a pooled design: drops unusable columns and enforces the row floor.
fn finalize(mut design: Design) -> Option<Design> {
    design.drop_all_missing();
    let mut design = design.complete_cases();
    if design.nobs() < MIN_OBSERVATIONS {
        return None;
    }
    let constant = design.drop_constant();
    if !constant.is_empty() {
        log::debug!("pooled design drops constant columns {constant:?}");
    }
    (!design.is_empty()).then_some(design)
}

/// Pooled jump with a post x group interaction and entity fixed effects.
///
/// Returns rows for `post` (the group-0 jump) and `post_x_group` (the
/// incremental group-1 jump) that survive the fit, or an empty
/// [`TableSchema::EventPath`] table if the post indicator does not vary.
///
/// # Errors
///
/// [`crate::EventStudyError::MissingColumn`] naming `outcome`, `group_col`
/// or `fe_col` if absent.
#[allow(clippy::too_many_arguments)]
pub fn pooled_jump(
    panel: &Panel,
    outcome: &str,
    event_date: NaiveDate,
    window: usize,
    group_col: &str,
    fe_col: &str,
    controls: &[&str],
    hac_lags: usize,
) -> Result<EffectTable> {
    let group = group_values(panel, group_col)?;
    let fe = panel.require_labels(fe_col)?;
    let y = panel.require_numeric(outcome)?;
    let empty = EffectTable::empty(TableSchema::EventPath);

    let offsets = event_time(panel, event_date);
    let rows = window_rows(&offsets, window);
    let post: Vec<f64> = rows.iter().map(|&r| post_indicator(offsets[r])).collect();
    let post_x_group: Vec<f64> = rows
        .iter()
        .zip(&post)
        .map(|(&r, p)| p * group[r])
        .collect();

    let mut design = Design::new(pick(&y, &rows));
    design.push(POST, post)?;
    design.push(POST_X_GROUP, post_x_group)?;
    for (name, values) in fixed_effect_dummies(&pick_labels(&fe, &rows)) {
        design.push(name, values)?;
    }
    for name in usable_controls(panel, outcome, controls) {
        design.push(name, pick(&panel.require_numeric(name)?, &rows))?;
    }

    let Some(design) = finalize(design) else {
        return Ok(empty);
    };
    if !design.varies(POST) {
        log::debug!("pooled jump at {event_date}: post indicator does not vary");
        return Ok(empty);
    }
    let Some(fit) = fit_or_degenerate(&design, hac_lags)? else {
        return Ok(empty);
    };

    let mut table = empty;
    for (term, kind) in [
        (POST, EffectKind::BaselineBin),
        (POST_X_GROUP, EffectKind::InteractionBin),
    ] {
        if let (Some(estimate), Some(se)) = (fit.estimate(term), fit.std_error(term)) {
            table.push(
                EffectRow::new(term, estimate, se, fit.nobs())
                    .with_kind(kind)
                    .with_event_date(event_date),
            );
        }
    }
    Ok(table)
}

/// Pooled binned event study with bin x group interactions and entity fixed
/// effects.
///
/// For every retained bin the table carries up to four rows: the group-0
/// coefficient (`baseline_bin`), the bin x group coefficient
/// (`interaction_bin`), the group-0 effect path (`group0_effect`) and the
/// group-1 path (`group1_effect`, baseline + interaction with variance
/// `Var(b) + Var(i) + 2 Cov(b, i)`). Every row carries the bin midpoint, the
/// reference bin label and `event_date`.
///
/// `ref_bin` overrides the reference when it is observed; otherwise `[-20,-1]`
/// is used if observed, else the bin with the smallest midpoint. An empty
/// design yields an empty table and no fit.
///
/// # Errors
///
/// [`crate::EventStudyError::MissingColumn`] naming `outcome`, `group_col`
/// or `fe_col` if absent.
#[allow(clippy::too_many_arguments)]
pub fn pooled_binned(
    panel: &Panel,
    outcome: &str,
    event_date: NaiveDate,
    bins: &[EventBin],
    group_col: &str,
    fe_col: &str,
    controls: &[&str],
    hac_lags: usize,
    ref_bin: Option<EventBin>,
) -> Result<(EffectTable, Option<RobustFit>)> {
    let group = group_values(panel, group_col)?;
    let fe = panel.require_labels(fe_col)?;
    let empty = EffectTable::empty(TableSchema::EventPath);

    let Some(frame) = BinFrame::new(panel, outcome, event_date, bins, ref_bin)? else {
        return Ok((empty, None));
    };
    let frame_group = pick(&group, &frame.rows);

    let mut design = Design::new(frame.response.clone());
    for bin in &frame.retained {
        design.push(bin.label(), frame.indicator(*bin))?;
    }
    for bin in &frame.retained {
        let values = frame
            .indicator(*bin)
            .into_iter()
            .zip(&frame_group)
            .map(|(d, g)| d * g)
            .collect();
        design.push(interaction_term(*bin), values)?;
    }
    for (name, values) in fixed_effect_dummies(&pick_labels(&fe, &frame.rows)) {
        design.push(name, values)?;
    }
    for name in usable_controls(panel, outcome, controls) {
        design.push(name, pick(&panel.require_numeric(name)?, &frame.rows))?;
    }

    let Some(design) = finalize(design) else {
        return Ok((empty, None));
    };
    let Some(fit) = fit_or_degenerate(&design, hac_lags)? else {
        return Ok((empty, None));
    };

    let reference = frame.reference.label();
    let n = fit.nobs();
    let mut table = empty;
    for bin in &frame.retained {
        let base = bin.label();
        let inter = interaction_term(*bin);
        let decorate = |row: EffectRow, kind| {
            row.with_kind(kind)
                .with_bin_mid(bin.midpoint())
                .with_ref_bin(reference.clone())
                .with_event_date(event_date)
        };

        let baseline = fit.estimate(&base).zip(fit.variance(&base));
        let interaction = fit.estimate(&inter).zip(fit.variance(&inter));

        if let Some((b, _)) = baseline {
            let se = fit.std_error(&base).unwrap_or(f64::NAN);
            table.push(decorate(EffectRow::new(&base, b, se, n), EffectKind::BaselineBin));
        }
        if let Some((i, _)) = interaction {
            let se = fit.std_error(&inter).unwrap_or(f64::NAN);
            table.push(decorate(EffectRow::new(&inter, i, se, n), EffectKind::InteractionBin));
        }
        if let Some((b, var_b)) = baseline {
            let se = var_b.max(0.0).sqrt();
            table.push(decorate(EffectRow::new(&base, b, se, n), EffectKind::Group0Effect));
        }
        if let (Some((b, var_b)), Some((i, var_i))) = (baseline, interaction) {
            let cov = fit.covariance(&base, &inter).unwrap_or(f64::NAN);
            let var = var_b + var_i + 2.0 * cov;
            table.push(decorate(
                EffectRow::new(&base, b + i, var.max(0.0).sqrt(), n),
                EffectKind::Group1Effect,
            ));
        }
    }
    Ok((table, Some(fit)))
}
