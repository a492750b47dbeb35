use chrono::{Duration, TimeZone, Utc};
use paw_core::{verify_chain, CreditLedger, InMemoryLedgerStore};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Purchase(i64),
    Consume(i64),
    Adjust(i64),
    Expire { days_later: i64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![(1i64..50).prop_map(Op::Purchase),
                (1i64..30).prop_map(Op::Consume),
                (-40i64..40).prop_map(Op::Adjust),
                (0i64..90).prop_map(|days_later| Op::Expire { days_later }),]
}

proptest! {
    #[test]
    fn balance_matches_totals_and_history_chains(ops in prop::collection::vec(op(), 1..40)) {
        let ledger = CreditLedger::new(InMemoryLedgerStore::new());
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ledger.configure_expiration(1, true, Some(45), start).unwrap();

        for (i, op) in ops.iter().enumerate() {
            let now = start + Duration::hours(i as i64);
            // Los rechazos de negocio son esperables; lo que importa es que
            // no dejen rastro.
            let before = ledger.history(1).unwrap().len();
            let res = match *op {
                Op::Purchase(n) => ledger.purchase(1, n, None, 1, now).map(Some),
                Op::Consume(n) => ledger.consume(1, n, i as i64, None, now).map(Some),
                Op::Adjust(n) => ledger.adjust(1, n, "prop", 1, now).map(Some),
                Op::Expire { days_later } => ledger.expire_if_due(1, None, now + Duration::days(days_later)),
            };
            let after = ledger.history(1).unwrap().len();
            match res {
                Ok(Some(_)) => prop_assert_eq!(after, before + 1),
                Ok(None) | Err(_) => prop_assert_eq!(after, before),
            }

            let row = ledger.ledger(1, now).unwrap();
            prop_assert!(row.credit_balance >= 0);
            prop_assert!(row.is_consistent());
        }

        let history = ledger.history(1).unwrap();
        prop_assert!(verify_chain(&history).is_ok());
        let last = history.last().map(|t| t.balance_after).unwrap_or(0);
        prop_assert_eq!(last, ledger.get_balance(1, start).unwrap());
    }
}
