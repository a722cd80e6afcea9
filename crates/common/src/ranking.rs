//! Pure comparators ordering mirror candidates by peer-quality signals.
//!
//! All comparators are total orders over [`Mirror`] records and are meant
//! for use with stable sorts, so ties keep their relative input order.
//! Absent signals have documented sentinel ordering: an unmeasured timeout
//! rate counts as `0` (best), an unmeasured response time counts as
//! `+infinity` (worst), and a dangling contact counts as reputation `0`.

use std::cmp::Ordering;

use crate::mirror::Mirror;

fn timeout_rate(mirror: &Mirror) -> f64 {
    mirror
        .contact
        .as_ref()
        .and_then(|c| c.timeout_rate)
        .unwrap_or(0.0)
}

fn response_time(mirror: &Mirror) -> f64 {
    mirror
        .contact
        .as_ref()
        .and_then(|c| c.response_time)
        .unwrap_or(f64::INFINITY)
}

fn reputation(mirror: &Mirror) -> i64 {
    mirror.contact.as_ref().map_or(0, |c| c.reputation)
}

/// Orders by observed timeout rate, ascending. Lower is better; a peer
/// with no recorded rate sorts first.
#[must_use]
pub fn by_timeout_rate(a: &Mirror, b: &Mirror) -> Ordering {
    timeout_rate(a)
        .partial_cmp(&timeout_rate(b))
        .unwrap_or(Ordering::Equal)
}

/// Orders by observed response time, ascending. Lower is better; a peer
/// with no recorded time sorts last.
#[must_use]
pub fn by_response_time(a: &Mirror, b: &Mirror) -> Ordering {
    response_time(a)
        .partial_cmp(&response_time(b))
        .unwrap_or(Ordering::Equal)
}

/// Orders by cumulative reputation, descending: the best-reputed peer
/// sorts first. This is the order the mirror orchestrator selects
/// candidates in.
#[must_use]
pub fn by_reputation(a: &Mirror, b: &Mirror) -> Ordering {
    reputation(b).cmp(&reputation(a))
}
