use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::error::ExtractionError;

static SCHEDULE_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.plan-rep").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static MARKER: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.bull").unwrap());

/// Background of a slot that has a lesson booked in it.
const SCHEDULED_BACKGROUND: &str = "background:#96fe96";

/// One occupied slot, before its payload is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLesson {
    pub topic: String,
    pub module_id: i64,
    pub payload: String,
}

/// Walk the schedule table and collect the detail payload of every scheduled
/// slot, in document order.
pub fn extract_lessons(body: &str, module_id: i64) -> Result<Vec<RawLesson>, ExtractionError> {
    let document = Html::parse_document(body);
    let table = document
        .select(&SCHEDULE_TABLE)
        .next()
        .ok_or(ExtractionError::TableNotFound)?;

    let mut rows = table.select(&ROW);
    rows.next().ok_or(ExtractionError::HeaderNotFound)?;

    let mut lessons = Vec::new();
    for row in rows {
        let cells: Vec<ElementRef> = row.select(&CELL).collect();
        // topic cell plus at least one slot
        if cells.len() < 2 {
            continue;
        }

        let topic = collapsed_text(&cells[0]);
        debug!("Processing topic: {}", topic);

        for cell in &cells[1..] {
            for marker in cell.select(&MARKER).filter(is_occupied) {
                let Some(payload) = marker
                    .value()
                    .attr("data-content")
                    .filter(|p| !p.trim().is_empty())
                else {
                    continue;
                };
                lessons.push(RawLesson {
                    topic: topic.clone(),
                    module_id,
                    payload: payload.to_string(),
                });
            }
        }
    }

    info!("Module {}: {} occupied slots", module_id, lessons.len());
    Ok(lessons)
}

/// Scheduled colour plus the popover toggle that carries the details.
fn is_occupied(marker: &ElementRef) -> bool {
    let el = marker.value();
    let scheduled = el.attr("style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        compact.contains(SCHEDULED_BACKGROUND)
    });
    scheduled && el.attr("data-toggle") == Some("popover")
}

fn collapsed_text(el: &ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
