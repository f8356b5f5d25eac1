//! Viewer counter properties

use proptest::prelude::*;
use std::collections::HashSet;
use tokio::runtime::Runtime;
use xfhub::shared::identity::ViewerId;

use crate::common::TestHub;

const SESSION: &str = "prop-live";

#[derive(Debug, Clone)]
enum ViewerOp {
    Join(usize),
    Leave(usize),
}

fn viewer_op() -> impl Strategy<Value = ViewerOp> {
    prop_oneof![
        (0usize..4).prop_map(ViewerOp::Join),
        (0usize..4).prop_map(ViewerOp::Leave),
    ]
}

fn viewer(index: usize) -> ViewerId {
    ViewerId::anonymous(format!("10.0.0.{}", index))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_counter_equals_distinct_viewers(ops in prop::collection::vec(viewer_op(), 1..40)) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = TestHub::new();
            fixture.store.start_session(SESSION).await;
            let mut expected = HashSet::new();

            for op in ops {
                let count = match op {
                    ViewerOp::Join(i) => {
                        expected.insert(i);
                        fixture.hub.join_viewer(SESSION, viewer(i), None).await.unwrap()
                    }
                    ViewerOp::Leave(i) => {
                        expected.remove(&i);
                        fixture.hub.leave_viewer(SESSION, viewer(i), None).await.unwrap()
                    }
                };
                prop_assert_eq!(count, expected.len() as u64);
            }

            let snapshot = fixture.store.session_snapshot(SESSION).await.unwrap();
            prop_assert_eq!(snapshot.viewers, expected.len() as u64);
            prop_assert!(snapshot.peak_viewers >= snapshot.viewers);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
