//! Derived ratio fields computed from two merged cells.

use crate::config::{DerivedKind, DerivedSpec};
use crate::model::{Cell, Derived, MergedRecord, Unavailable};
use crate::numeric::parse_decimal;

/// Percentage distance between `current` and `reference`.
///
/// Pure: identical inputs always give the same result, and every bad input
/// degrades to `Derived::Unavailable` instead of erroring.
pub fn compute(kind: DerivedKind, current: &Cell, reference: &Cell) -> Derived {
    let (Some(current), Some(reference)) = (current.as_value(), reference.as_value()) else {
        return Derived::Unavailable(Unavailable::MissingInput);
    };
    let (Some(current), Some(reference)) = (parse_decimal(current), parse_decimal(reference))
    else {
        return Derived::Unavailable(Unavailable::Unparseable);
    };
    if reference == 0.0 {
        return Derived::Unavailable(Unavailable::ZeroReference);
    }

    let pct = match kind {
        DerivedKind::DistanceFromHigh => (reference - current) / reference * 100.0,
        DerivedKind::DistanceFromLow => (current - reference) / reference * 100.0,
    };

    if pct.is_finite() {
        Derived::Value(pct)
    } else {
        Derived::Unavailable(Unavailable::Unparseable)
    }
}

static MISSING: Cell = Cell::Missing;

/// Evaluate every derived field against the record, in declaration order.
pub fn apply(record: &mut MergedRecord, specs: &[DerivedSpec]) {
    let derived = specs
        .iter()
        .map(|spec| {
            let current = record.field(&spec.current).unwrap_or(&MISSING);
            let reference = record.field(&spec.reference).unwrap_or(&MISSING);
            (spec.name.clone(), compute(spec.kind, current, reference))
        })
        .collect();
    record.derived = derived;
}
