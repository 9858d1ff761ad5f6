//! Optimistic trade append. The provisional row is visible immediately and
//! is either replaced by the authoritative record or rolled back wholesale.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{CreateTradeInput, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Pending,
    Committed,
    RolledBack,
}

/// One in-progress append over a snapshot of the trade list.
#[derive(Debug)]
pub struct OptimisticAppend {
    trades: Vec<Trade>,
    provisional_id: String,
    phase: MutationPhase,
}

impl OptimisticAppend {
    /// Splice a provisional trade (temporary id, current timestamp) into the
    /// front of the list, mirroring the newest-first server ordering.
    pub fn begin(mut trades: Vec<Trade>, input: &CreateTradeInput) -> Self {
        let provisional_id = format!("temp-{}", Uuid::new_v4());
        let provisional = Trade {
            id: provisional_id.clone(),
            trade_date: input.trade_date.clone(),
            asset_id: input.asset_id.clone(),
            asset_name: None,
            session_id: input.session_id.clone(),
            session_name: None,
            setup_id: input.setup_id.clone(),
            setup_name: None,
            risk_input: input.risk_input.clone(),
            profit_loss_amount: input.profit_loss_amount,
            tradingview_link: input.tradingview_link.clone(),
            notes: input.notes.clone(),
            duration_minutes: input.duration_minutes,
            created_at: Utc::now().timestamp_millis(),
        };
        trades.insert(0, provisional);

        Self {
            trades,
            provisional_id,
            phase: MutationPhase::Pending,
        }
    }

    pub fn phase(&self) -> MutationPhase {
        self.phase
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn provisional_id(&self) -> &str {
        &self.provisional_id
    }

    /// Replace the provisional row with the authoritative record. Only a
    /// pending append can commit; a rolled-back one stays rolled back.
    pub fn commit(&mut self, authoritative: Trade) -> bool {
        if self.phase != MutationPhase::Pending {
            return false;
        }
        if let Some(slot) = self.trades.iter_mut().find(|t| t.id == self.provisional_id) {
            *slot = authoritative;
        }
        self.phase = MutationPhase::Committed;
        true
    }

    /// Discard the provisional row and adopt the refetched list.
    pub fn rollback(&mut self, refetched: Vec<Trade>) -> bool {
        if self.phase != MutationPhase::Pending {
            return false;
        }
        self.trades = refetched;
        self.phase = MutationPhase::RolledBack;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateTradeInput {
        CreateTradeInput {
            trade_date: "2024-04-01".into(),
            risk_input: "1%".into(),
            profit_loss_amount: 1.5,
            ..Default::default()
        }
    }

    fn server_trade(id: &str) -> Trade {
        Trade {
            id: id.into(),
            trade_date: "2024-04-01".into(),
            asset_id: None,
            asset_name: None,
            session_id: None,
            session_name: None,
            setup_id: None,
            setup_name: None,
            risk_input: "1%".into(),
            profit_loss_amount: 1.5,
            tradingview_link: None,
            notes: None,
            duration_minutes: None,
            created_at: 1,
        }
    }

    #[test]
    fn provisional_row_is_visible_immediately() {
        let append = OptimisticAppend::begin(vec![server_trade("existing")], &input());

        assert_eq!(append.phase(), MutationPhase::Pending);
        assert_eq!(append.trades().len(), 2);
        assert!(append.trades()[0].id.starts_with("temp-"));
        assert_eq!(append.trades()[1].id, "existing");
    }

    #[test]
    fn commit_swaps_in_the_authoritative_record() {
        let mut append = OptimisticAppend::begin(vec![], &input());

        assert!(append.commit(server_trade("real-id")));
        assert_eq!(append.phase(), MutationPhase::Committed);
        assert_eq!(append.trades()[0].id, "real-id");
        assert!(!append.trades().iter().any(|t| t.id.starts_with("temp-")));
    }

    #[test]
    fn rollback_adopts_the_refetched_list() {
        let mut append = OptimisticAppend::begin(vec![server_trade("a")], &input());

        assert!(append.rollback(vec![server_trade("a")]));
        assert_eq!(append.phase(), MutationPhase::RolledBack);
        assert_eq!(append.trades().len(), 1);
    }

    #[test]
    fn rolled_back_append_can_never_commit() {
        let mut append = OptimisticAppend::begin(vec![], &input());
        append.rollback(vec![]);

        assert!(!append.commit(server_trade("late")));
        assert_eq!(append.phase(), MutationPhase::RolledBack);
        assert!(append.trades().is_empty());
    }

    #[test]
    fn double_commit_is_a_no_op() {
        let mut append = OptimisticAppend::begin(vec![], &input());
        assert!(append.commit(server_trade("first")));
        assert!(!append.commit(server_trade("second")));
        assert_eq!(append.trades()[0].id, "first");
    }
}
