//! Turn a marker's free-form detail payload into a lesson record.
//!
//! Two stages per payload:
//!   1. regex strategies per field, first acceptable candidate wins
//!   2. if the payload embeds a `<table>`, its label/value rows override
//!      whatever stage 1 found for the fields they name
//!
//! Stage 2 is a refinement, not a fallback: a table value always replaces a
//! regex value for the same field.

pub mod patterns;
pub mod table;

use std::fmt;

use tracing::{debug, warn};

use crate::error::NormalizationWarning;
use crate::extract::RawLesson;
use crate::store::LessonRecord;
use patterns::PatternResolver;

pub const UNKNOWN_TEACHER: &str = "unknown-teacher";
pub const UNKNOWN_DATE: &str = "unknown-date";
pub const UNKNOWN_CITY: &str = "unknown-city";

/// Anything shorter carries no usable details.
const MIN_PAYLOAD_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Teacher,
    Date,
    City,
    Group,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Teacher => "teacher",
            Field::Date => "date",
            Field::City => "city",
            Field::Group => "group",
        };
        f.write_str(name)
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Pattern(&'static str),
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub source: Source,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonFields {
    pub teacher: Option<Resolved>,
    pub date: Option<Resolved>,
    pub city: Option<Resolved>,
    pub group: Option<Resolved>,
}

impl LessonFields {
    pub fn set(&mut self, field: Field, value: Resolved) {
        let slot = match field {
            Field::Teacher => &mut self.teacher,
            Field::Date => &mut self.date,
            Field::City => &mut self.city,
            Field::Group => &mut self.group,
        };
        *slot = Some(value);
    }

    /// Replace every field that `later` resolved.
    pub fn override_with(&mut self, later: LessonFields) {
        let LessonFields {
            teacher,
            date,
            city,
            group,
        } = later;
        for (field, value) in [
            (Field::Teacher, teacher),
            (Field::Date, date),
            (Field::City, city),
            (Field::Group, group),
        ] {
            if let Some(value) = value {
                self.set(field, value);
            }
        }
    }

    /// Required fields that will fall back to their sentinel.
    pub fn warnings(&self) -> Vec<NormalizationWarning> {
        [
            (Field::Teacher, &self.teacher),
            (Field::Date, &self.date),
            (Field::City, &self.city),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(field, _)| NormalizationWarning::Unresolved(field))
        .collect()
    }
}

fn first_match(resolvers: &[PatternResolver], text: &str) -> Option<Resolved> {
    resolvers.iter().find_map(|r| {
        r.resolve(text).map(|value| Resolved {
            value,
            source: Source::Pattern(r.name),
        })
    })
}

/// Resolve all four fields of one payload.
pub fn resolve_fields(payload: &str) -> LessonFields {
    if payload.trim().chars().count() < MIN_PAYLOAD_CHARS {
        return LessonFields::default();
    }

    let mut fields = LessonFields {
        teacher: first_match(&patterns::TEACHER, payload),
        date: first_match(&patterns::DATE, payload),
        city: first_match(&patterns::CITY, payload),
        group: first_match(&patterns::GROUP, payload),
    };

    if payload.contains("<table") {
        fields.override_with(table::resolve(payload));
    }

    debug!(?fields, "resolved payload");
    fields
}

/// Normalize one extracted slot. Returns `None` when the city cannot be
/// determined; such a lesson cannot be attributed and is dropped.
pub fn normalize(raw: &RawLesson) -> Option<LessonRecord> {
    let fields = resolve_fields(&raw.payload);
    for warning in fields.warnings() {
        warn!("{}: {}", raw.topic, warning);
    }

    let date = fields
        .date
        .map(|d| d.value)
        .unwrap_or_else(|| UNKNOWN_DATE.to_string());

    let city = fields
        .city
        .map(|c| c.value)
        .unwrap_or_else(|| UNKNOWN_CITY.to_string());
    if city == UNKNOWN_CITY {
        warn!(
            "Could not determine city for lesson: {} - {}",
            raw.topic, date
        );
        return None;
    }

    Some(LessonRecord {
        topic: raw.topic.clone(),
        module_id: raw.module_id,
        teacher: fields
            .teacher
            .map(|t| t.value)
            .unwrap_or_else(|| UNKNOWN_TEACHER.to_string()),
        date,
        city,
        group_name: fields.group.map(|g| g.value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(payload: &str) -> RawLesson {
        RawLesson {
            topic: "Тема 1".to_string(),
            module_id: 1,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn plain_text_payload() {
        let rec = normalize(&raw(
            "Город: Пермь<br>Преподаватель: <b>Петр Петров</b><br>12.3.2024<br>Группа: П-1",
        ))
        .unwrap();
        assert_eq!(rec.city, "Пермь");
        assert_eq!(rec.teacher, "Петр Петров");
        assert_eq!(rec.date, "2024-03-12");
        assert_eq!(rec.group_name.as_deref(), Some("П-1"));
        assert_eq!(rec.topic, "Тема 1");
        assert_eq!(rec.module_id, 1);
    }

    #[test]
    fn teacher_from_bold_run() {
        let fields = resolve_fields("<b>Иван Иванов</b>\n\t");
        let teacher = fields.teacher.unwrap();
        assert_eq!(teacher.value, "Иван Иванов");
        assert_eq!(teacher.source, Source::Pattern("bold"));
    }

    #[test]
    fn table_overrides_inline_teacher() {
        let fields = resolve_fields(
            "Преподаватель: A<table><tr><td>Преподаватель</td><td>B</td></tr></table>",
        );
        assert_eq!(fields.teacher.unwrap().value, "B");

        let fields = resolve_fields(
            "Преподаватель: Анна Смирнова\n\
             <table><tr><td>Преподаватель:</td><td>Ольга Орлова</td></tr></table>",
        );
        let teacher = fields.teacher.unwrap();
        assert_eq!(teacher.value, "Ольга Орлова");
        assert_eq!(teacher.source, Source::Table);
    }

    #[test]
    fn table_leaves_unnamed_fields_alone() {
        let fields = resolve_fields(
            "Город: Пермь\n05.03.2024\n<table><tr><td>Группа</td><td>Старшая</td></tr></table>",
        );
        assert_eq!(fields.city.unwrap().source, Source::Pattern("city-inline"));
        assert_eq!(fields.date.unwrap().value, "2024-03-05");
        assert_eq!(fields.group.unwrap().source, Source::Table);
    }

    #[test]
    fn sentinels_for_teacher_and_date() {
        let rec = normalize(&raw("Город: Томск, без подробностей")).unwrap();
        assert_eq!(rec.city, "Томск, без подробностей");
        assert_eq!(rec.teacher, UNKNOWN_TEACHER);
        assert_eq!(rec.date, UNKNOWN_DATE);
        assert_eq!(rec.group_name, None);
    }

    #[test]
    fn unattributable_city_is_dropped() {
        let payloads = [
            "Преподаватель: Анна Смирнова<br>19.03.2024",
            "<b>Иван Иванов</b> 05.03.2024",
            "",
            "abc",
        ];
        let accepted: Vec<_> = payloads.iter().filter_map(|p| normalize(&raw(p))).collect();
        assert!(accepted.is_empty());
    }

    #[test]
    fn city_equal_to_sentinel_is_dropped() {
        assert_eq!(normalize(&raw("Город: unknown-city<br>05.03.2024")), None);
        assert!(normalize(&raw("Город: Пермь<br>05.03.2024")).is_some());
    }

    #[test]
    fn short_payload_resolves_nothing() {
        let fields = resolve_fields(" <b> ");
        assert_eq!(fields, LessonFields::default());
        assert_eq!(fields.warnings().len(), 3);
    }

    #[test]
    fn fixture_payloads() {
        let page = std::fs::read_to_string("tests/fixtures/module_page.html").unwrap();
        let lessons = crate::extract::extract_lessons(&page, 1).unwrap();
        let records: Vec<_> = lessons.iter().filter_map(normalize).collect();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].city, "Москва ОРТ");
        assert_eq!(records[0].teacher, "Иван Иванов");
        assert_eq!(records[0].date, "2024-03-05");

        assert_eq!(records[1].city, "Пермь");
        assert_eq!(records[1].date, "2024-03-12");
    }
}
