//! Property-based tests for queue ordering

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use lusotown_engine::engine::local_db::LocalDatabase;
use lusotown_engine::engine::offline::ActionKind;
use proptest::prelude::*;
use serde_json::json;

fn kind_strategy() -> impl Strategy<Value = ActionKind> {
    prop::sample::select(ActionKind::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_replay_order_is_time_then_insertion(
        entries in prop::collection::vec((kind_strategy(), 0i64..5), 1..20)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (loaded, expected) = runtime.block_on(async {
            let db = LocalDatabase::in_memory().await.unwrap();
            let base = Utc.with_ymd_and_hms(2024, 6, 13, 20, 0, 0).unwrap();

            let mut expected = Vec::new();
            for (n, (kind, offset)) in entries.iter().enumerate() {
                let id = format!("action-{}", n);
                let at = base + ChronoDuration::seconds(*offset);
                db.insert_action(&id, *kind, &json!({"n": n}), at).await.unwrap();
                expected.push((*offset, n, id));
            }
            expected.sort();

            let loaded: Vec<String> = db.load_actions().await.unwrap().into_iter().map(|a| a.id).collect();
            (loaded, expected.into_iter().map(|(_, _, id)| id).collect::<Vec<_>>())
        });

        prop_assert_eq!(loaded, expected);
    }
}
