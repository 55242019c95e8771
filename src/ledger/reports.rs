//! Read-only summaries derived from a ledger snapshot

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::cmp::min;

use crate::ledger::LedgerSnapshot;
use crate::types::*;

/// Headline figures for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Total owed to all creditors
    pub total_debts: BigDecimal,
    /// Outstanding amount across all customers
    pub total_receivables: BigDecimal,
    /// Sum of every recorded receipt
    pub total_collected: BigDecimal,
    /// Collected minus debts
    pub net_position: BigDecimal,
}

/// Overall collection progress against customer expectations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub total_expected: BigDecimal,
    pub total_collected: BigDecimal,
    pub progress_percent: BigDecimal,
}

/// How much of a creditor's debt is covered by matched receipts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditorCoverage {
    pub creditor_id: String,
    pub name: String,
    pub total_amount: BigDecimal,
    /// Live sum of records matched to this creditor
    pub matched_amount: BigDecimal,
    /// Capped at 100
    pub progress_percent: BigDecimal,
}

/// Collection status of one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProgress {
    pub customer_id: String,
    pub name: String,
    pub expected_amount: BigDecimal,
    pub collected_amount: BigDecimal,
    pub remaining_amount: BigDecimal,
    pub progress_percent: BigDecimal,
    pub maturity_date: String,
}

/// A customer together with their receipts, for the receipt archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerStatement {
    pub customer: Customer,
    pub records: Vec<ReceiptRecord>,
    pub total: BigDecimal,
}

/// `part / whole * 100` rounded to two places; a zero whole counts as 1
fn percent(part: &BigDecimal, whole: &BigDecimal) -> BigDecimal {
    let one = BigDecimal::from(1);
    let denominator = if *whole < one { &one } else { whole };
    (part * BigDecimal::from(100) / denominator).round(2)
}

impl LedgerSnapshot {
    pub fn dashboard_summary(&self) -> DashboardSummary {
        let total_debts: BigDecimal = self.creditors.iter().map(|c| &c.total_amount).sum();
        let total_receivables: BigDecimal =
            self.customers.iter().map(Customer::remaining_amount).sum();
        let total_collected: BigDecimal = self.records.iter().map(|r| &r.amount).sum();
        let net_position = &total_collected - &total_debts;

        DashboardSummary {
            total_debts,
            total_receivables,
            total_collected,
            net_position,
        }
    }

    pub fn collection_report(&self) -> CollectionReport {
        let total_expected: BigDecimal = self.customers.iter().map(|c| &c.expected_amount).sum();
        let total_collected: BigDecimal = self.records.iter().map(|r| &r.amount).sum();
        let progress_percent = percent(&total_collected, &total_expected);

        CollectionReport {
            total_expected,
            total_collected,
            progress_percent,
        }
    }

    /// Coverage of one creditor, `None` if it does not exist
    pub fn creditor_coverage(&self, creditor_id: &str) -> Option<CreditorCoverage> {
        self.creditor(creditor_id).map(|c| self.coverage_of(c))
    }

    /// Coverage of every creditor, in collection order
    pub fn creditor_coverages(&self) -> Vec<CreditorCoverage> {
        self.creditors.iter().map(|c| self.coverage_of(c)).collect()
    }

    fn coverage_of(&self, creditor: &Creditor) -> CreditorCoverage {
        let matched_amount = self.matched_for(&creditor.id);
        let progress_percent = min(
            percent(&matched_amount, &creditor.total_amount),
            BigDecimal::from(100),
        );
        CreditorCoverage {
            creditor_id: creditor.id.clone(),
            name: creditor.name.clone(),
            total_amount: creditor.total_amount.clone(),
            matched_amount,
            progress_percent,
        }
    }

    pub fn customer_progress(&self, customer_id: &str) -> Option<CustomerProgress> {
        self.customer(customer_id).map(|customer| CustomerProgress {
            customer_id: customer.id.clone(),
            name: customer.name.clone(),
            expected_amount: customer.expected_amount.clone(),
            collected_amount: customer.collected_amount.clone(),
            remaining_amount: customer.remaining_amount(),
            progress_percent: percent(&customer.collected_amount, &customer.expected_amount),
            maturity_date: customer.maturity_date.clone(),
        })
    }

    /// Customers whose name contains `term`; an empty term matches all
    pub fn search_customers(&self, term: &str) -> Vec<&Customer> {
        self.customers
            .iter()
            .filter(|c| c.name.contains(term))
            .collect()
    }

    /// Per-customer receipt summaries. Customers without receipts are only
    /// listed while a search term is active.
    pub fn customer_statements(&self, term: &str) -> Vec<CustomerStatement> {
        self.customers
            .iter()
            .filter(|c| c.name.contains(term))
            .filter_map(|customer| {
                let records: Vec<ReceiptRecord> = self
                    .records_for_customer(&customer.id)
                    .into_iter()
                    .cloned()
                    .collect();
                if records.is_empty() && term.is_empty() {
                    return None;
                }
                let total = records.iter().map(|r| &r.amount).sum();
                Some(CustomerStatement {
                    customer: customer.clone(),
                    records,
                    total,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(customer_id: &str, amount: i64, creditor: Option<&str>) -> ReceiptRecord {
        let mut record = ReceiptRecord::from_extracted(
            customer_id.to_string(),
            ExtractedData {
                amount: BigDecimal::from(amount),
                ..Default::default()
            },
            String::new(),
        );
        record.matched_creditor_id = creditor.map(str::to_string);
        record
    }

    fn sample() -> LedgerSnapshot {
        let mut ali = Customer::new("Ali".to_string(), BigDecimal::from(1_000), String::new());
        ali.collected_amount = BigDecimal::from(600);
        let sara = Customer::new("Sara".to_string(), BigDecimal::from(500), String::new());
        let creditor = Creditor::new(
            "Sarraf".to_string(),
            "1".to_string(),
            String::new(),
            BigDecimal::from(400),
        );

        LedgerSnapshot {
            records: vec![
                record(&ali.id, 450, Some(&creditor.id)),
                record(&ali.id, 150, None),
            ],
            creditors: vec![creditor],
            customers: vec![ali, sara],
        }
    }

    #[test]
    fn test_dashboard_summary() {
        let summary = sample().dashboard_summary();
        assert_eq!(summary.total_debts, BigDecimal::from(400));
        assert_eq!(summary.total_receivables, BigDecimal::from(400 + 500));
        assert_eq!(summary.total_collected, BigDecimal::from(600));
        assert_eq!(summary.net_position, BigDecimal::from(200));
    }

    #[test]
    fn test_collection_report() {
        let report = sample().collection_report();
        assert_eq!(report.total_expected, BigDecimal::from(1_500));
        assert_eq!(report.progress_percent, BigDecimal::from(40));

        let empty = LedgerSnapshot::default().collection_report();
        assert_eq!(empty.progress_percent, BigDecimal::from(0));
    }

    #[test]
    fn test_creditor_coverage_is_capped() {
        let snapshot = sample();
        let coverage = snapshot.creditor_coverages();
        assert_eq!(coverage.len(), 1);
        assert_eq!(coverage[0].matched_amount, BigDecimal::from(450));
        assert_eq!(coverage[0].progress_percent, BigDecimal::from(100));
        assert!(snapshot.creditor_coverage("missing").is_none());
    }

    #[test]
    fn test_customer_progress() {
        let snapshot = sample();
        let ali = &snapshot.customers[0];
        let progress = snapshot.customer_progress(&ali.id).unwrap();
        assert_eq!(progress.remaining_amount, BigDecimal::from(400));
        assert_eq!(progress.progress_percent, BigDecimal::from(60));
    }

    #[test]
    fn test_statements_hide_idle_customers_without_search() {
        let snapshot = sample();

        let all = snapshot.customer_statements("");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].customer.name, "Ali");
        assert_eq!(all[0].total, BigDecimal::from(600));

        let searched = snapshot.customer_statements("Sa");
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].customer.name, "Sara");
        assert!(searched[0].records.is_empty());

        assert_eq!(snapshot.search_customers("").len(), 2);
        assert_eq!(snapshot.search_customers("li").len(), 1);
    }
}
