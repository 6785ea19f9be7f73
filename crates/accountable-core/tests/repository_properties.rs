//! Property tests for repository writes, ranges and toggles.

use std::collections::BTreeMap;
use std::sync::Arc;

use accountable_core::storage::MemoryStore;
use accountable_core::{FixedClock, HabitRepository, HabitStore, LogRepository};
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 12, 1).unwrap()
}

fn repo() -> LogRepository<MemoryStore> {
    LogRepository::open(MemoryStore::new(), "habit-tracker-logs").unwrap()
}

proptest! {
    #[test]
    fn last_write_per_key_wins(
        writes in proptest::collection::vec(("[a-d]", any::<bool>()), 1..30),
    ) {
        let repo = repo();
        let date = base();
        let mut expected = BTreeMap::new();
        for (habit, value) in &writes {
            if *value {
                repo.mark_complete(habit, date).unwrap();
            } else {
                repo.mark_incomplete(habit, date).unwrap();
            }
            expected.insert(habit.clone(), *value);
        }
        let log = repo.get_log(date).unwrap().unwrap();
        prop_assert_eq!(log.habits, expected);
    }

    #[test]
    fn range_returns_exactly_the_inclusive_window(
        days in proptest::collection::btree_set(0i64..90, 0..40),
        start in 0i64..90,
        len in 0i64..60,
    ) {
        let repo = repo();
        for offset in &days {
            repo.mark_complete("water", base() + Duration::days(*offset)).unwrap();
        }
        let from = base() + Duration::days(start);
        let to = from + Duration::days(len);
        let got: Vec<NaiveDate> = repo
            .get_date_range(from, to)
            .unwrap()
            .into_iter()
            .map(|log| log.date)
            .collect();
        let want: Vec<NaiveDate> = days
            .iter()
            .map(|offset| base() + Duration::days(*offset))
            .filter(|date| *date >= from && *date <= to)
            .collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn toggle_is_an_involution(
        habit in "[a-z]{1,8}",
        offset in 0i64..7,
        seeded in any::<bool>(),
    ) {
        let today = base();
        let date = today - Duration::days(offset);
        let repo = repo();
        if seeded {
            repo.mark_complete(&habit, date).unwrap();
        }
        let mut store = HabitStore::new(repo, Vec::new())
            .with_clock(Arc::new(FixedClock(today)));
        store.load_date(date).unwrap();

        let before = store.repository().is_complete(&habit, date).unwrap();
        store.toggle_habit(&habit).unwrap();
        prop_assert_eq!(store.repository().is_complete(&habit, date).unwrap(), !before);
        store.toggle_habit(&habit).unwrap();
        prop_assert_eq!(store.repository().is_complete(&habit, date).unwrap(), before);
    }
}
