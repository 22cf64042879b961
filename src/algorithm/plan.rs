use crate::models::{Plan, QuarterBucket, Term};

/// Arma el plan final con los trimestres en orden de índice.
pub fn assemble(reference_term: Term, max_credits: u32, mut buckets: Vec<QuarterBucket>) -> Plan {
    buckets.sort_by_key(|b| b.index);
    Plan { reference_term, max_credits, quarters: buckets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quarter;

    #[test]
    fn test_buckets_come_out_in_index_order() {
        let t = Term::new(2024, Quarter::Autumn);
        let b1 = QuarterBucket::new(1, Term::new(2025, Quarter::Spring), 0);
        let b0 = QuarterBucket::new(0, Term::new(2025, Quarter::Winter), 0);
        let plan = assemble(t, 15, vec![b1, b0]);
        assert_eq!(plan.quarters[0].index, 0);
        assert_eq!(plan.quarters[1].term, Term::new(2025, Quarter::Spring));
    }
}
