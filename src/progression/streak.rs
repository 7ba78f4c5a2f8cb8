use chrono::NaiveDate;

use super::ProgressionState;

/// Folds one qualifying date into the streak.
///
/// Same-day repeats leave the streak alone, the next calendar day extends
/// it, and anything else (a gap, or a date earlier than the last one seen)
/// restarts it at 1. The last qualifying date never moves backwards.
pub fn advance_streak(state: &mut ProgressionState, date: NaiveDate) {
    state.current_streak = match state.last_qualifying_date {
        None => 1,
        Some(last) if date == last => state.current_streak.max(1),
        Some(last) if last.succ_opt() == Some(date) => state.current_streak.saturating_add(1),
        Some(_) => 1,
    };

    state.last_qualifying_date = match state.last_qualifying_date {
        Some(last) if last > date => Some(last),
        _ => Some(date),
    };

    state.longest_streak = state.longest_streak.max(state.current_streak);
}
