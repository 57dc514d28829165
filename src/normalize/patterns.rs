//! Ordered regex strategies for each field of a lesson payload.
//!
//! Each list is tried front to back and the first resolver that yields an
//! acceptable value wins. Order matters: labelled forms come before the
//! looser fallbacks.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static DATE_DMY_PADDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]{2}\.[0-9]{2}\.[0-9]{4})\b").unwrap());
static DATE_DMY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]{1,2}\.[0-9]{1,2}\.[0-9]{4})\b").unwrap());
static DATE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]{4}-[0-9]{2}-[0-9]{2})\b").unwrap());

static CITY_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bГород[:\s]+(.*?)(?:<|\n|$)").unwrap());
static CITY_TAGGED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bГород[^<>]*?<[^<>]*?>(.*?)<").unwrap());
static CITY_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bГород\s*:\s*([^<>\n]+)").unwrap());
static BRANCH_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bФилиал[:\s]+(.*?)(?:<|\n|$)").unwrap());
static BRANCH_TAGGED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bФилиал[^<>]*?<[^<>]*?>(.*?)<").unwrap());
static BRANCH_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bФилиал\s*:\s*([^<>\n]+)").unwrap());
static BRANCH_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<tr><td>\s*Филиал\s*:?\s*</td>\s*<td>\s*<b>\s*([^<>]+?)\s*</b>\s*</td>")
        .unwrap()
});

static TEACHER_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bПреподаватель[:\s]+(.*?)(?:<|\n|$)").unwrap());
static TEACHER_TAGGED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bПреподаватель[^<>]*?<[^<>]*?>(.*?)<").unwrap());
static BOLD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<b>([^<>]+?)</b>").unwrap());

static GROUP_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Группа:\s*([^|<\n]+)").unwrap());
static GROUP_LOOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Группа[^:]*:\s*([^|<\n]+)").unwrap());

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A named regex whose first capture is offered to `accept` for cleaning and
/// validation. Matches are tried in order until one is accepted.
pub struct PatternResolver {
    pub name: &'static str,
    pattern: &'static LazyLock<Regex>,
    accept: fn(&str) -> Option<String>,
}

impl PatternResolver {
    pub fn resolve(&self, text: &str) -> Option<String> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| (self.accept)(m.as_str()))
    }
}

pub static DATE: [PatternResolver; 3] = [
    PatternResolver {
        name: "dd.mm.yyyy",
        pattern: &DATE_DMY_PADDED,
        accept: dotted_date,
    },
    PatternResolver {
        name: "d.m.yyyy",
        pattern: &DATE_DMY,
        accept: dotted_date,
    },
    PatternResolver {
        name: "yyyy-mm-dd",
        pattern: &DATE_ISO,
        accept: iso_date,
    },
];

pub static CITY: [PatternResolver; 7] = [
    PatternResolver {
        name: "city-inline",
        pattern: &CITY_INLINE,
        accept: place_name,
    },
    PatternResolver {
        name: "city-tagged",
        pattern: &CITY_TAGGED,
        accept: place_name,
    },
    PatternResolver {
        name: "city-colon",
        pattern: &CITY_COLON,
        accept: place_name,
    },
    PatternResolver {
        name: "branch-inline",
        pattern: &BRANCH_INLINE,
        accept: place_name,
    },
    PatternResolver {
        name: "branch-tagged",
        pattern: &BRANCH_TAGGED,
        accept: place_name,
    },
    PatternResolver {
        name: "branch-colon",
        pattern: &BRANCH_COLON,
        accept: place_name,
    },
    PatternResolver {
        name: "branch-row",
        pattern: &BRANCH_ROW,
        accept: place_name,
    },
];

pub static TEACHER: [PatternResolver; 3] = [
    PatternResolver {
        name: "teacher-inline",
        pattern: &TEACHER_INLINE,
        accept: person_name,
    },
    PatternResolver {
        name: "teacher-tagged",
        pattern: &TEACHER_TAGGED,
        accept: person_name,
    },
    PatternResolver {
        name: "bold",
        pattern: &BOLD_RUN,
        accept: person_name,
    },
];

pub static GROUP: [PatternResolver; 2] = [
    PatternResolver {
        name: "group-label",
        pattern: &GROUP_LABEL,
        accept: group_name,
    },
    PatternResolver {
        name: "group-loose",
        pattern: &GROUP_LOOSE,
        accept: group_name,
    },
];

/// Strip tags, collapse whitespace, trim.
pub fn clean_name(raw: &str) -> String {
    let no_tags = TAG.replace_all(raw, " ");
    SPACES.replace_all(&no_tags, " ").trim().to_string()
}

/// Normalize any supported date spelling to `YYYY-MM-DD`.
pub fn normalize_date(text: &str) -> Option<String> {
    DATE.iter().find_map(|r| r.resolve(text))
}

fn longer_than_two(value: String) -> Option<String> {
    (value.chars().count() > 2).then_some(value)
}

fn place_name(raw: &str) -> Option<String> {
    longer_than_two(SPACES.replace_all(raw.trim(), " ").to_string())
}

fn person_name(raw: &str) -> Option<String> {
    longer_than_two(clean_name(raw))
}

fn group_name(raw: &str) -> Option<String> {
    let value = raw.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn dotted_date(raw: &str) -> Option<String> {
    let mut parts = raw.split('.').map(|p| p.parse::<u32>().ok());
    let (day, month, year) = (parts.next()??, parts.next()??, parts.next()??);
    to_iso(year as i32, month, day)
}

fn iso_date(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn to_iso(year: i32, month: u32, day: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(list: &[PatternResolver], text: &str) -> Option<(&'static str, String)> {
        list.iter().find_map(|r| r.resolve(text).map(|v| (r.name, v)))
    }

    #[test]
    fn dates_normalize_to_iso() {
        assert_eq!(normalize_date("05.03.2024").as_deref(), Some("2024-03-05"));
        assert_eq!(normalize_date("2024-03-05").as_deref(), Some("2024-03-05"));
        assert_eq!(normalize_date("занятие 5.3.2024 в 10:00").as_deref(), Some("2024-03-05"));
        assert_eq!(normalize_date("без даты"), None);
    }

    #[test]
    fn padded_date_wins_over_earlier_short_date() {
        let (name, value) = first(&DATE, "перенос с 1.2.2024 на 05.03.2024").unwrap();
        assert_eq!(name, "dd.mm.yyyy");
        assert_eq!(value, "2024-03-05");
    }

    #[test]
    fn impossible_date_falls_through() {
        assert_eq!(normalize_date("31.02.2024"), None);
        assert_eq!(
            normalize_date("31.02.2024 или 2024-03-01").as_deref(),
            Some("2024-03-01")
        );
    }

    #[test]
    fn later_valid_date_wins_over_impossible_one() {
        assert_eq!(
            normalize_date("31.02.2024 перенесено на 05.03.2024").as_deref(),
            Some("2024-03-05")
        );
        assert_eq!(
            normalize_date("00.00.0000 05.03.2024").as_deref(),
            Some("2024-03-05")
        );
        assert_eq!(
            first(&DATE, "было 31.02.2024, стало 5.3.2024").unwrap(),
            ("d.m.yyyy", "2024-03-05".to_string())
        );
    }

    #[test]
    fn short_capture_does_not_hide_later_name() {
        assert_eq!(
            first(&CITY, "Город: Ек\nГород: Пермь").unwrap(),
            ("city-inline", "Пермь".to_string())
        );
    }

    #[test]
    fn city_layouts() {
        assert_eq!(first(&CITY, "Город: Пермь<br>").unwrap().1, "Пермь");
        assert_eq!(first(&CITY, "город <i>Самара</i>").unwrap().1, "Самара");
        assert_eq!(
            first(&CITY, "Филиал:   Москва\n ОРТ").unwrap(),
            ("branch-inline", "Москва".to_string())
        );
        assert_eq!(
            first(&CITY, "<tr><td>Филиал:</td><td><b>Москва ОРТ</b></td>").unwrap(),
            ("branch-row", "Москва ОРТ".to_string())
        );
    }

    #[test]
    fn short_city_is_rejected() {
        assert_eq!(first(&CITY, "Город: Ек"), None);
    }

    #[test]
    fn teacher_cleanup() {
        assert_eq!(
            first(&TEACHER, "<b>Иван Иванов</b>\n\t").unwrap(),
            ("bold", "Иван Иванов".to_string())
        );
        assert_eq!(
            first(&TEACHER, "Преподаватель: <b> Петр\n\tПетров </b>").unwrap(),
            ("teacher-tagged", "Петр Петров".to_string())
        );
        assert_eq!(clean_name("  <i>Анна</i>\t Смирнова\n"), "Анна Смирнова");
    }

    #[test]
    fn group_stops_at_separators() {
        assert_eq!(first(&GROUP, "Группа: П-1 | 10:00").unwrap().1, "П-1");
        assert_eq!(first(&GROUP, "Группа №2: Старшие<br>").unwrap().1, "Старшие");
        assert_eq!(first(&GROUP, "Группа:   <br>"), None);
    }
}
