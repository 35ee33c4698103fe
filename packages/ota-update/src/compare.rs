use crate::build_date::BuildDate;
use crate::record::UpdateRecord;

/// A record is newer only when its build date is strictly later than the
/// installed one.
pub fn is_newer(record: &UpdateRecord, installed: &BuildDate) -> bool {
    record.build_date().is_after(installed)
}

pub fn evaluate_all(records: Vec<UpdateRecord>, installed: &BuildDate) -> Vec<UpdateRecord> {
    records
        .into_iter()
        .map(|record| record.evaluated(installed))
        .collect()
}
