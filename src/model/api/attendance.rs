use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// How many members of one group have responded to a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAttendance {
    pub group_id: Id,
    pub group_name: String,
    pub total_assigned: u64,
    pub submitted: u64,
    pub attendance_ratio: f64,
}

impl GroupAttendance {
    pub fn new(group_id: Id, group_name: String, total_assigned: u64, submitted: u64) -> Self {
        Self {
            group_id,
            group_name,
            total_assigned,
            submitted,
            attendance_ratio: ratio(submitted, total_assigned),
        }
    }
}

/// Totals over every group a form is assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub total_users: u64,
    pub total_submitted: u64,
    pub overall_ratio: f64,
}

/// Attendance of a form, per group and overall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub group_attendance: Vec<GroupAttendance>,
    pub summary: AttendanceSummary,
}

impl AttendanceReport {
    pub fn new(group_attendance: Vec<GroupAttendance>) -> Self {
        let total_users = group_attendance.iter().map(|g| g.total_assigned).sum();
        let total_submitted = group_attendance.iter().map(|g| g.submitted).sum();
        Self {
            group_attendance,
            summary: AttendanceSummary {
                total_users,
                total_submitted,
                overall_ratio: ratio(total_submitted, total_users),
            },
        }
    }
}

/// `part / whole`, or zero for an empty whole.
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
