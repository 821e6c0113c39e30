//! Sort stage with per-field comparison-type inference.
//!
//! Each sort field samples up to 200 rows to decide how it compares: a field
//! is Date only when every non-empty sample parses as a date and none as a
//! number, Numeric only when every non-empty sample parses as a number and
//! none as a date, and String otherwise (the safe default for mixed or empty
//! samples). Multiple fields apply as a stable primary/secondary ordering.

use std::cmp::Ordering;

use serde_json::Value;

use crate::coerce::{smart_date, smart_number, to_text};
use crate::spec::SortDirection;
use crate::table::{field_value, get_field, is_null_like, Row};

/// Rows sampled per field for type detection.
const TYPE_SAMPLE_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortType {
    Text,
    Numeric,
    Date,
}

/// Infer the comparison type for one field from sampled values. Null-like
/// samples count as empty text and never force a type.
pub fn detect_sort_type(rows: &[Row], field: &str) -> SortType {
    let mut non_empty = 0usize;
    let mut all_numeric = true;
    let mut all_dates = true;
    let mut any_numeric = false;
    let mut any_date = false;

    for row in rows.iter().take(TYPE_SAMPLE_SIZE) {
        let value = match get_field(row, field) {
            Some(v) if !is_null_like(v) => v,
            _ => continue,
        };
        non_empty += 1;
        let numeric = smart_number(value).is_some();
        let date = smart_date(value).is_some();
        all_numeric &= numeric;
        all_dates &= date;
        any_numeric |= numeric;
        any_date |= date;
    }

    if non_empty == 0 {
        return SortType::Text;
    }
    if all_dates && !any_numeric {
        SortType::Date
    } else if all_numeric && !any_date {
        SortType::Numeric
    } else {
        SortType::Text
    }
}

/// One resolved sort key: field, direction, inferred type.
struct SortField {
    field: String,
    direction: SortDirection,
    sort_type: SortType,
}

/// Sort rows in place by the spec's field -> direction map (primary key
/// first). Unparsable values sort first within their type.
pub fn apply(rows: &mut [Row], sort_spec: &serde_json::Map<String, Value>) {
    let fields: Vec<SortField> = sort_spec
        .iter()
        .map(|(field, direction)| SortField {
            field: field.clone(),
            direction: SortDirection::from_value(direction),
            sort_type: detect_sort_type(rows, field),
        })
        .collect();

    rows.sort_by(|a, b| {
        for sf in &fields {
            let ord = compare_typed(a, b, sf);
            if ord != Ordering::Equal {
                return match sf.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
            }
        }
        Ordering::Equal
    });
}

fn compare_typed(a: &Row, b: &Row, sf: &SortField) -> Ordering {
    let va = field_value(a, &sf.field);
    let vb = field_value(b, &sf.field);
    match sf.sort_type {
        SortType::Numeric => {
            // Unparsable values take the minimal sentinel and sort first.
            let x = smart_number(&va).unwrap_or(f64::MIN);
            let y = smart_number(&vb).unwrap_or(f64::MIN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        SortType::Date => match (smart_date(&va), smart_date(&vb)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortType::Text => to_text(&va).to_lowercase().cmp(&to_text(&vb).to_lowercase()),
    }
}
