//! Demonstration data for a fresh installation.
//!
//! Three batches at different points of the lifecycle, timestamped relative
//! to `now` so date filters have something to bite on.

use rust_decimal::Decimal;
use time::{Duration, PrimitiveDateTime};

use crate::clock::format_timestamp;
use crate::record::{Stage, TraceRecord};

struct Step {
    stage: Stage,
    operator: &'static str,
    offset: Duration,
    weight_tenths: Option<i64>,
    source: &'static str,
    destination: &'static str,
    product_model: &'static str,
    location: &'static str,
    notes: &'static str,
}

fn batch(code: &str, name: &str, start: PrimitiveDateTime, steps: &[Step]) -> Vec<TraceRecord> {
    let mut records = vec![{
        let mut r = TraceRecord::new(
            code,
            name,
            Stage::Created,
            "label generator",
            format_timestamp(start),
        );
        r.notes = Some(format!("Label created for batch {}", name));
        r
    }];
    let text = |s: &str| (!s.is_empty()).then(|| s.to_string());
    for step in steps {
        let mut r = TraceRecord::new(
            code,
            name,
            step.stage,
            step.operator,
            format_timestamp(start.saturating_add(step.offset)),
        );
        r.weight_kg = step.weight_tenths.map(|t| Decimal::new(t, 1));
        r.source = text(step.source);
        r.destination = text(step.destination);
        r.product_model = text(step.product_model);
        r.location = text(step.location);
        r.notes = text(step.notes);
        records.push(r);
    }
    records
}

/// Demo table anchored at `now`.
pub fn demo_records(now: PrimitiveDateTime) -> Vec<TraceRecord> {
    let mut out = batch(
        "DEMO0001",
        "PP plastic batch 001",
        now.saturating_sub(Duration::days(30)),
        &[
            Step {
                stage: Stage::Shipped,
                operator: "Chang Hsiao-ming",
                offset: Duration::hours(2),
                weight_tenths: Some(5000),
                source: "Vehicle dismantling yard",
                destination: "Recycling plant",
                product_model: "PP trim parts",
                location: "Taipei",
                notes: "Dashboards and bumpers",
            },
            Step {
                stage: Stage::Transported,
                operator: "Li Yun-shu",
                offset: Duration::days(1),
                weight_tenths: Some(5000),
                source: "Vehicle dismantling yard",
                destination: "Recycling plant",
                product_model: "PP trim parts",
                location: "In transit",
                notes: "No loss in transit",
            },
            Step {
                stage: Stage::Received,
                operator: "Wang Chu-li",
                offset: Duration::days(1) + Duration::hours(4),
                weight_tenths: Some(4985),
                source: "Haulier",
                destination: "Regrind plant",
                product_model: "PP trim parts",
                location: "Taoyuan",
                notes: "Sorted, impurities removed",
            },
            Step {
                stage: Stage::Reprocessed,
                operator: "Chen Chi-shih",
                offset: Duration::days(3),
                weight_tenths: Some(4500),
                source: "Sorted PP",
                destination: "Moulding plant",
                product_model: "Recycled PP pellets",
                location: "Taichung",
                notes: "Shredded, washed, pelletised",
            },
            Step {
                stage: Stage::Manufactured,
                operator: "Lin Chih-tsao",
                offset: Duration::days(5),
                weight_tenths: Some(4250),
                source: "Recycled PP pellets",
                destination: "Retail",
                product_model: "ECO-BOX-001 storage box",
                location: "Tainan",
                notes: "200 storage boxes",
            },
        ],
    );
    out.extend(batch(
        "DEMO0002",
        "PE plastic batch 002",
        now.saturating_sub(Duration::days(20)),
        &[
            Step {
                stage: Stage::Shipped,
                operator: "Huang Tsao-tso",
                offset: Duration::hours(1),
                weight_tenths: Some(3000),
                source: "Vehicle dismantling yard",
                destination: "Recycling plant",
                product_model: "PE fuel tanks",
                location: "Hsinchu",
                notes: "",
            },
            Step {
                stage: Stage::Received,
                operator: "Liu Pin-kuan",
                offset: Duration::days(2),
                weight_tenths: Some(2950),
                source: "Haulier",
                destination: "Regrind plant",
                product_model: "PE fuel tanks",
                location: "Taoyuan",
                notes: "Quality check passed",
            },
        ],
    ));
    out.extend(batch(
        "DEMO0003",
        "ABS plastic batch 003",
        now.saturating_sub(Duration::days(10)),
        &[
            Step {
                stage: Stage::Shipped,
                operator: "Wu Chien-yen",
                offset: Duration::hours(3),
                weight_tenths: Some(8000),
                source: "Vehicle dismantling yard",
                destination: "Recycling plant",
                product_model: "ABS interior panels",
                location: "Kaohsiung",
                notes: "",
            },
            Step {
                stage: Stage::Reprocessed,
                operator: "Cheng Kung-cheng",
                offset: Duration::days(1),
                weight_tenths: Some(7500),
                source: "ABS interior panels",
                destination: "Moulding plant",
                product_model: "Recycled ABS pellets",
                location: "Kaohsiung",
                notes: "",
            },
            Step {
                stage: Stage::Manufactured,
                operator: "Tsai Chih-tsao",
                offset: Duration::days(3),
                weight_tenths: Some(7200),
                source: "Recycled ABS pellets",
                destination: "Retail",
                product_model: "Phone stand PS-02",
                location: "Tainan",
                notes: "",
            },
            Step {
                stage: Stage::Sold,
                operator: "Hsu Yeh-wu",
                offset: Duration::days(5),
                weight_tenths: Some(7200),
                source: "Moulding plant",
                destination: "Retail chain",
                product_model: "Phone stand PS-02",
                location: "Taipei",
                notes: "",
            },
        ],
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{batch_completeness, created_batches};
    use time::macros::datetime;

    #[test]
    fn every_demo_batch_opens_with_created() {
        let records = demo_records(datetime!(2024-08-04 12:00:00));
        let batches = created_batches(&records);
        assert_eq!(batches.len(), 3);
        for b in &batches {
            let first = records.iter().find(|r| r.batch_code == b.batch_code).unwrap();
            assert_eq!(first.stage, Stage::Created);
        }
    }

    #[test]
    fn demo_batches_are_in_different_states() {
        let records = demo_records(datetime!(2024-08-04 12:00:00));
        let c = batch_completeness(&records);
        assert_eq!(c["DEMO0001"].record_count, 6);
        assert!(c["DEMO0003"].stages_seen.contains(&Stage::Sold));
        assert!(!c["DEMO0002"].stages_seen.contains(&Stage::Sold));
    }

    #[test]
    fn demo_timestamps_are_anchored_before_now() {
        let records = demo_records(datetime!(2024-08-04 12:00:00));
        assert!(records.iter().all(|r| r.timestamp.as_str() < "2024-08-04 12:00:00"));
        assert_eq!(records[0].timestamp, "2024-07-05 12:00:00");
    }
}
