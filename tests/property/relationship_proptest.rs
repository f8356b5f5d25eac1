//! Social graph symmetry properties

use proptest::prelude::*;
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::common::TestHub;

const USERS: usize = 3;

#[derive(Debug, Clone, Copy)]
enum GraphOp {
    Send,
    Cancel,
    Accept,
    Reject,
    Unfriend,
}

fn graph_op() -> impl Strategy<Value = (GraphOp, usize, usize)> {
    let op = prop_oneof![
        Just(GraphOp::Send),
        Just(GraphOp::Cancel),
        Just(GraphOp::Accept),
        Just(GraphOp::Reject),
        Just(GraphOp::Unfriend),
    ];
    (op, 0..USERS, 0..USERS)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_edges_stay_symmetric(ops in prop::collection::vec(graph_op(), 1..30)) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = TestHub::new();
            let hub = &fixture.hub;
            let users: Vec<Uuid> = (0..USERS).map(|_| Uuid::new_v4()).collect();

            for (op, a, b) in ops {
                let (a, b) = (users[a], users[b]);
                // Rejections such as self requests or missing requests are expected
                let _ = match op {
                    GraphOp::Send => hub.send_request(a, b).await.map(|_| ()),
                    GraphOp::Cancel => hub.cancel_request(a, b).await.map(|_| ()),
                    GraphOp::Accept => hub.accept_request(a, b).await,
                    GraphOp::Reject => hub.reject_request(a, b).await,
                    GraphOp::Unfriend => hub.unfriend(a, b).await.map(|_| ()),
                };
            }

            for &a in &users {
                let friends = hub.list_friends(a).await.unwrap();
                prop_assert!(!friends.contains(&a));

                for &b in &users {
                    if a == b {
                        continue;
                    }
                    let forward = hub.relationship(a, b).await.unwrap();
                    let backward = hub.relationship(b, a).await.unwrap();
                    prop_assert_eq!(forward, backward.mirrored());

                    let listed = friends.contains(&b);
                    let reverse_listed = hub.list_friends(b).await.unwrap().contains(&a);
                    prop_assert_eq!(listed, reverse_listed);
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
