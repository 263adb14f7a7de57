//! Assertions over execution record trails.

use crate::core::RecordStatus;
use crate::state::ExecutionRecord;

/// Returns the records of one stage in one cycle.
#[must_use]
pub fn records_for<'a>(
    records: &'a [ExecutionRecord],
    stage: &str,
    cycle: u32,
) -> Vec<&'a ExecutionRecord> {
    records
        .iter()
        .filter(|record| record.stage_name == stage && record.cycle == cycle)
        .collect()
}

/// Returns the records written in one cycle.
#[must_use]
pub fn records_in_cycle(records: &[ExecutionRecord], cycle: u32) -> Vec<&ExecutionRecord> {
    records.iter().filter(|record| record.cycle == cycle).collect()
}

/// Asserts how many records a stage has across all cycles.
pub fn assert_record_count(records: &[ExecutionRecord], stage: &str, expected: usize) {
    let actual = records.iter().filter(|record| record.stage_name == stage).count();
    assert_eq!(
        actual, expected,
        "Expected {expected} record(s) for stage '{stage}', found {actual}"
    );
}

/// Asserts the exact `(stage, cycle)` sequence of a trail.
pub fn assert_stage_sequence(records: &[ExecutionRecord], expected: &[(&str, u32)]) {
    let actual: Vec<(&str, u32)> = records
        .iter()
        .map(|record| (record.stage_name.as_str(), record.cycle))
        .collect();
    assert_eq!(actual, expected, "Unexpected stage sequence");
}

/// Asserts that no record is still `running`.
pub fn assert_all_finalized(records: &[ExecutionRecord]) {
    let open: Vec<&str> = records
        .iter()
        .filter(|record| !record.is_finalized())
        .map(|record| record.stage_name.as_str())
        .collect();
    assert!(open.is_empty(), "Records still running: {open:?}");
}

/// Asserts that a stage never ran during a correction cycle.
pub fn assert_never_ran_in_correction(records: &[ExecutionRecord], stage: &str) {
    let cycles: Vec<u32> = records
        .iter()
        .filter(|record| record.stage_name == stage && record.cycle > 0)
        .map(|record| record.cycle)
        .collect();
    assert!(
        cycles.is_empty(),
        "Stage '{stage}' ran in correction cycle(s) {cycles:?}"
    );
}

/// Asserts the status of the last record of a stage.
pub fn assert_last_status(records: &[ExecutionRecord], stage: &str, expected: RecordStatus) {
    let last = records
        .iter()
        .rev()
        .find(|record| record.stage_name == stage)
        .unwrap_or_else(|| panic!("No record for stage '{stage}'"));
    assert_eq!(
        last.status, expected,
        "Expected last '{stage}' record to be {expected}, got {}",
        last.status
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageMetrics;
    use crate::utils::generate_uuid;

    fn trail() -> Vec<ExecutionRecord> {
        let run = generate_uuid();
        vec![
            ExecutionRecord::start("p1", run, "builder", 0).finalize(
                RecordStatus::Completed,
                StageMetrics::default(),
                None,
            ),
            ExecutionRecord::start("p1", run, "tester", 0).finalize(
                RecordStatus::RebuildRequired,
                StageMetrics::default(),
                None,
            ),
            ExecutionRecord::start("p1", run, "builder", 1).finalize(
                RecordStatus::Completed,
                StageMetrics::default(),
                None,
            ),
        ]
    }

    #[test]
    fn test_trail_assertions() {
        let records = trail();

        assert_record_count(&records, "builder", 2);
        assert_stage_sequence(&records, &[("builder", 0), ("tester", 0), ("builder", 1)]);
        assert_all_finalized(&records);
        assert_never_ran_in_correction(&records, "tester");
        assert_last_status(&records, "tester", RecordStatus::RebuildRequired);
        assert_eq!(records_for(&records, "builder", 1).len(), 1);
        assert_eq!(records_in_cycle(&records, 0).len(), 2);
    }

    #[test]
    #[should_panic(expected = "ran in correction cycle")]
    fn test_correction_assertion_fails() {
        assert_never_ran_in_correction(&trail(), "builder");
    }
}
