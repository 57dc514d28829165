use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::patterns::{clean_name, normalize_date};
use super::{Field, LessonFields, Resolved, Source};

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Label keywords, checked in this order; the first set that matches a label
/// decides the field.
const LABELS: &[(Field, &[&str])] = &[
    (Field::Teacher, &["преподаватель", "учитель"]),
    (Field::Date, &["дат"]),
    (Field::City, &["город", "филиал"]),
    (Field::Group, &["групп"]),
    // class level; "клаc" carries a latin c as typed on the source
    (Field::Group, &["класс", "клаc", "кл."]),
];

/// Read an embedded label/value table. Later rows overwrite earlier ones.
pub fn resolve(payload: &str) -> LessonFields {
    let mut fields = LessonFields::default();
    let fragment = Html::parse_fragment(payload);
    let Some(table) = fragment.select(&TABLE).next() else {
        return fields;
    };

    for row in table.select(&ROW) {
        let cells: Vec<ElementRef> = row.select(&CELL).collect();
        if cells.len() < 2 {
            continue;
        }
        let label = cell_text(&cells[0]).trim_end_matches(':').to_lowercase();
        let value = cell_text(&cells[1]);
        if value.is_empty() {
            continue;
        }
        let Some(field) = classify(&label) else {
            continue;
        };
        if let Some(value) = accept(field, &value) {
            fields.set(
                field,
                Resolved {
                    value,
                    source: Source::Table,
                },
            );
        }
    }
    fields
}

fn classify(label: &str) -> Option<Field> {
    LABELS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| label.contains(k)))
        .map(|(field, _)| *field)
}

fn accept(field: Field, value: &str) -> Option<String> {
    let value = match field {
        Field::Teacher | Field::City => clean_name(value),
        Field::Date => return normalize_date(value),
        Field::Group => value.to_string(),
    };
    (!value.is_empty()).then_some(value)
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}
