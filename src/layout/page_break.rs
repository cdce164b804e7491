//! # Page Break Decisions
//!
//! Logic for deciding where a table is cut when it meets the bottom of a
//! page. The packer asks one question per fragment: given the room left on
//! this page, how many whole rows go here?
//!
//! Rows are atomic. The orphan guard keeps a header from being stranded
//! with too few rows beneath it, on either side of a natural cut. A user's
//! break always wins over a natural one when it lands at or before it.
//!
//! On a fresh page the guard can only be honoured when the page holds at
//! least `guard` rows and the table has at least `2 * guard` of them.
//! Otherwise the natural cut stands so packing still makes progress, and the
//! packer reports the cut as an `OrphanGuardRelaxed` diagnostic.

/// Tolerance for floating point comparisons against the page budget.
pub const EPSILON: f64 = 0.01;

/// What to do with the remaining rows of a table.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakDecision {
    /// All remaining rows (and the footer) fit on the current page.
    Place,
    /// Defer the header and its first rows to the next page.
    MoveToNextPage,
    /// Place some rows here and continue on the next page.
    Split {
        rows_on_current_page: usize,
        /// The cut comes from a manual or row break rather than the fit.
        forced: bool,
    },
}

/// Inputs for one fragment decision.
#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub remaining_height: f64,
    /// Header bar plus column header, repeated on every fragment.
    pub fixed_height: f64,
    pub per_row_height: f64,
    /// Totals footer, only paid by the last fragment.
    pub footer_height: f64,
    pub remaining_rows: usize,
    pub orphan_guard: usize,
    pub page_is_empty: bool,
    /// Rows until the next user break, if one falls inside the remaining rows.
    pub forced_cut: Option<usize>,
}

/// Number of whole rows that fit in `room`.
pub fn rows_that_fit(room: f64, per_row_height: f64, max_rows: usize) -> usize {
    if per_row_height <= 0.0 {
        return max_rows;
    }
    if room < 0.0 {
        return 0;
    }
    (((room + EPSILON) / per_row_height).floor() as usize).min(max_rows)
}

/// Decide how many of the remaining rows go on the current page.
///
/// Never returns `MoveToNextPage` for an empty page, and never splits with
/// zero rows, so the packer always makes progress.
pub fn decide_split(req: &SplitRequest) -> BreakDecision {
    let rows = req.remaining_rows;
    let guard = req.orphan_guard.max(1);
    let fit = rows_that_fit(
        req.remaining_height - req.fixed_height,
        req.per_row_height,
        rows,
    );

    let whole = req.fixed_height + req.per_row_height * rows as f64 + req.footer_height;
    let natural_end = if fit >= rows && whole <= req.remaining_height + EPSILON {
        rows
    } else {
        // The footer travels with at least one row.
        fit.min(rows.saturating_sub(1))
    };

    // Orphan: header at the bottom with almost nothing beneath it.
    if natural_end < guard.min(rows) && !req.page_is_empty {
        return BreakDecision::MoveToNextPage;
    }

    // Nothing fits even on a fresh page: place one row anyway.
    let natural_end = natural_end.max(1);

    if let Some(cut) = req.forced_cut {
        if cut >= 1 && cut <= natural_end && cut < rows {
            return BreakDecision::Split {
                rows_on_current_page: cut,
                forced: true,
            };
        }
    }

    if natural_end >= rows {
        return BreakDecision::Place;
    }

    // Widow: too few rows would carry over to the continuation.
    let leftover = rows - natural_end;
    if leftover < guard {
        let adjusted = natural_end.saturating_sub(guard - leftover);
        if adjusted >= guard {
            return BreakDecision::Split {
                rows_on_current_page: adjusted,
                forced: false,
            };
        }
        if !req.page_is_empty {
            return BreakDecision::MoveToNextPage;
        }
    }

    BreakDecision::Split {
        rows_on_current_page: natural_end,
        forced: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(remaining_height: f64, remaining_rows: usize) -> SplitRequest {
        SplitRequest {
            remaining_height,
            fixed_height: 50.0,
            per_row_height: 10.0,
            footer_height: 0.0,
            remaining_rows,
            orphan_guard: 2,
            page_is_empty: false,
            forced_cut: None,
        }
    }

    #[test]
    fn everything_fits() {
        assert_eq!(decide_split(&request(300.0, 20)), BreakDecision::Place);
    }

    #[test]
    fn split_at_whole_rows() {
        assert_eq!(
            decide_split(&request(335.0, 40)),
            BreakDecision::Split {
                rows_on_current_page: 28,
                forced: false,
            }
        );
    }

    #[test]
    fn footer_needs_its_own_room() {
        let mut req = request(150.0, 10);
        req.footer_height = 15.0;
        // 10 rows fit but the footer does not: keep the widow guard's 2 rows back
        assert_eq!(
            decide_split(&req),
            BreakDecision::Split {
                rows_on_current_page: 8,
                forced: false,
            }
        );
    }

    #[test]
    fn orphan_control() {
        // Only 1 row would fit beneath the header, guard is 2
        assert_eq!(decide_split(&request(65.0, 10)), BreakDecision::MoveToNextPage);
    }

    #[test]
    fn orphan_guard_ignores_tiny_tables_on_fresh_pages() {
        let mut req = request(65.0, 10);
        req.page_is_empty = true;
        assert_eq!(
            decide_split(&req),
            BreakDecision::Split {
                rows_on_current_page: 1,
                forced: false,
            }
        );
    }

    #[test]
    fn widow_control() {
        // 9 of 10 fit, leaving 1 widow (guard 2) -> pull one back
        assert_eq!(
            decide_split(&request(140.0, 10)),
            BreakDecision::Split {
                rows_on_current_page: 8,
                forced: false,
            }
        );
    }

    #[test]
    fn widow_control_defers_short_tables() {
        // 2 of 3 fit, pulling back would leave 1 on this page
        assert_eq!(decide_split(&request(70.0, 3)), BreakDecision::MoveToNextPage);
    }

    #[test]
    fn fresh_page_too_short_for_both_sides_keeps_natural_cut() {
        // 3 rows cannot be split 2 + 2; a fresh page still has to make progress
        let mut req = request(70.0, 3);
        req.page_is_empty = true;
        assert_eq!(
            decide_split(&req),
            BreakDecision::Split {
                rows_on_current_page: 2,
                forced: false,
            }
        );
    }

    #[test]
    fn fresh_page_pulls_back_when_both_sides_can_hold_the_guard() {
        let mut req = request(80.0, 4);
        req.page_is_empty = true;
        assert_eq!(
            decide_split(&req),
            BreakDecision::Split {
                rows_on_current_page: 2,
                forced: false,
            }
        );
    }

    #[test]
    fn manual_cut_wins_when_earlier() {
        let mut req = request(335.0, 40);
        req.forced_cut = Some(23);
        assert_eq!(
            decide_split(&req),
            BreakDecision::Split {
                rows_on_current_page: 23,
                forced: true,
            }
        );
    }

    #[test]
    fn manual_cut_tie_is_forced() {
        let mut req = request(335.0, 40);
        req.forced_cut = Some(28);
        assert_eq!(
            decide_split(&req),
            BreakDecision::Split {
                rows_on_current_page: 28,
                forced: true,
            }
        );
    }

    #[test]
    fn manual_cut_past_fit_is_ignored() {
        let mut req = request(335.0, 40);
        req.forced_cut = Some(35);
        assert_eq!(
            decide_split(&req),
            BreakDecision::Split {
                rows_on_current_page: 28,
                forced: false,
            }
        );
    }

    #[test]
    fn manual_cut_splits_a_table_that_would_fit() {
        let mut req = request(300.0, 20);
        req.forced_cut = Some(5);
        assert_eq!(
            decide_split(&req),
            BreakDecision::Split {
                rows_on_current_page: 5,
                forced: true,
            }
        );
    }

    #[test]
    fn zero_row_height_fits_everything() {
        let mut req = request(60.0, 500);
        req.per_row_height = 0.0;
        assert_eq!(decide_split(&req), BreakDecision::Place);
    }
}
