use crate::calc::{self, AttendanceTally, LetterCount, Mean};
use crate::error::{ServiceError, ServiceResult};
use crate::records::{AttendanceStatus, EnrollmentStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DashboardQuery {
    /// Restricts the recent-enrollments list when set.
    pub since: Option<NaiveDate>,
    pub limit: usize,
    pub window_start: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentCount {
    pub department_id: i64,
    pub department: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearCount {
    pub year_of_study: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentEnrollment {
    pub enrollment_id: i64,
    pub enrollment_date: NaiveDate,
    pub status: String,
    pub student_id: i64,
    pub student_name: String,
    pub course_id: i64,
    pub course_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseEnrollment {
    pub course_id: i64,
    pub course_code: String,
    pub name: String,
    pub max_students: i64,
    pub enrolled: i64,
    pub available_slots: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub students: i64,
    pub courses: i64,
    pub teachers: i64,
    pub departments: i64,
    pub by_department: Vec<DepartmentCount>,
    pub by_year: Vec<YearCount>,
    pub recent_enrollments: Vec<RecentEnrollment>,
    pub recent_enrollment_count: i64,
    pub window_start: NaiveDate,
    pub course_enrollment: Vec<CourseEnrollment>,
    pub grade_distribution: Vec<LetterCount>,
    pub average_attendance: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

fn count(conn: &Connection, sql: &str) -> rusqlite::Result<i64> {
    conn.query_row(sql, [], |r| r.get(0))
}

fn tally_statuses<I>(rows: I) -> AttendanceTally
where
    I: IntoIterator<Item = (String, usize)>,
{
    let mut tally = AttendanceTally::default();
    for (raw, n) in rows {
        match AttendanceStatus::parse(&raw) {
            Some(status) => tally.record_many(status, n),
            None => {
                tracing::warn!(status = %raw, rows = n, "unknown attendance status counted as not attended");
                tally.total += n;
            }
        }
    }
    tally
}

/// Every section is read inside one transaction so the counts agree with each other.
pub fn dashboard_summary(conn: &Connection, query: &DashboardQuery) -> ServiceResult<DashboardSummary> {
    let tx = conn.unchecked_transaction()?;

    let students = count(&tx, "SELECT COUNT(*) FROM students WHERE is_active = 1")?;
    let courses = count(&tx, "SELECT COUNT(*) FROM courses WHERE is_active = 1")?;
    let teachers = count(&tx, "SELECT COUNT(*) FROM teachers WHERE is_active = 1")?;
    let departments = count(&tx, "SELECT COUNT(*) FROM departments")?;

    let by_department = {
        let mut stmt = tx.prepare(
            "SELECT d.id, d.name, COUNT(s.id)
             FROM departments d
             LEFT JOIN students s ON s.department_id = d.id AND s.is_active = 1
             GROUP BY d.id, d.name
             ORDER BY d.name, d.id",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(DepartmentCount {
                    department_id: r.get(0)?,
                    department: r.get(1)?,
                    count: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let by_year = {
        let mut stmt = tx.prepare(
            "SELECT year_of_study, COUNT(*)
             FROM students
             WHERE is_active = 1
             GROUP BY year_of_study
             ORDER BY year_of_study",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(YearCount {
                    year_of_study: r.get(0)?,
                    count: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let limit = query.limit as i64;
    let recent_enrollments = {
        let mut stmt = tx.prepare(
            "SELECT e.id, e.enrollment_date, e.status,
                    s.id, s.first_name, s.last_name,
                    c.id, c.course_code
             FROM enrollments e
             JOIN students s ON s.id = e.student_id
             JOIN courses c ON c.id = e.course_id
             WHERE ?1 IS NULL OR e.enrollment_date >= ?1
             ORDER BY e.enrollment_date DESC, e.id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map((query.since, limit), |r| {
                let first: String = r.get(4)?;
                let last: String = r.get(5)?;
                Ok(RecentEnrollment {
                    enrollment_id: r.get(0)?,
                    enrollment_date: r.get(1)?,
                    status: r.get(2)?,
                    student_id: r.get(3)?,
                    student_name: format!("{} {}", first, last),
                    course_id: r.get(6)?,
                    course_code: r.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let recent_enrollment_count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM enrollments WHERE enrollment_date >= ?",
        [query.window_start],
        |r| r.get(0),
    )?;

    let course_enrollment = {
        let mut stmt = tx.prepare(
            "SELECT c.id, c.course_code, c.name, c.max_students, COUNT(e.id)
             FROM courses c
             LEFT JOIN enrollments e ON e.course_id = c.id AND e.is_active = 1
             WHERE c.is_active = 1
             GROUP BY c.id, c.course_code, c.name, c.max_students
             ORDER BY c.course_code, c.id
             LIMIT ?",
        )?;
        let rows = stmt
            .query_map([limit], |r| {
                let max_students: i64 = r.get(3)?;
                let enrolled: i64 = r.get(4)?;
                Ok(CourseEnrollment {
                    course_id: r.get(0)?,
                    course_code: r.get(1)?,
                    name: r.get(2)?,
                    max_students,
                    enrolled,
                    available_slots: max_students - enrolled,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let percentages = {
        let mut stmt = tx.prepare("SELECT points_earned, points_possible FROM grades ORDER BY id")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, f64>(0)?, r.get::<_, f64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .filter_map(|(earned, possible)| calc::grade_percentage(earned, possible))
            .collect::<Vec<_>>()
    };
    let grade_distribution = calc::grade_distribution(percentages);

    let attendance = {
        let mut stmt = tx.prepare("SELECT status, COUNT(*) FROM attendance GROUP BY status")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)))?
            .collect::<Result<Vec<_>, _>>()?;
        tally_statuses(rows)
    };

    tx.commit()?;

    Ok(DashboardSummary {
        students,
        courses,
        teachers,
        departments,
        by_department,
        by_year,
        recent_enrollments,
        recent_enrollment_count,
        window_start: query.window_start,
        course_enrollment,
        grade_distribution,
        average_attendance: attendance.rate(),
        generated_at: Utc::now(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentInfo {
    pub id: i64,
    pub student_no: String,
    pub full_name: String,
    pub department: String,
    pub year_of_study: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoursePerformance {
    pub course_id: i64,
    pub course_code: String,
    pub course_name: String,
    pub credits: i64,
    pub status: String,
    pub final_grade: Option<String>,
    pub enrollment_date: NaiveDate,
    pub average_grade: Option<f64>,
    pub grade_count: usize,
    pub attendance_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceTotals {
    pub total_courses: usize,
    pub completed_courses: usize,
    pub active_enrollments: usize,
    pub total_credits: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentPerformance {
    pub student_id: i64,
    pub student: StudentInfo,
    pub average_grade: Option<f64>,
    pub attendance_rate: Option<f64>,
    pub weighted_average: Option<f64>,
    pub courses: Vec<CoursePerformance>,
    pub totals: PerformanceTotals,
    pub generated_at: DateTime<Utc>,
}

struct EnrollmentRow {
    id: i64,
    course_id: i64,
    course_code: String,
    course_name: String,
    credits: i64,
    status: String,
    final_grade: Option<String>,
    enrollment_date: NaiveDate,
    is_active: bool,
}

pub fn student_performance(conn: &Connection, student_id: i64) -> ServiceResult<StudentPerformance> {
    let tx = conn.unchecked_transaction()?;

    let student = tx
        .query_row(
            "SELECT s.id, s.student_no, s.first_name, s.last_name, d.name, s.year_of_study, s.is_active
             FROM students s
             JOIN departments d ON d.id = s.department_id
             WHERE s.id = ?",
            [student_id],
            |r| {
                let first: String = r.get(2)?;
                let last: String = r.get(3)?;
                Ok(StudentInfo {
                    id: r.get(0)?,
                    student_no: r.get(1)?,
                    full_name: format!("{} {}", first, last),
                    department: r.get(4)?,
                    year_of_study: r.get(5)?,
                    is_active: r.get::<_, i64>(6)? != 0,
                })
            },
        )
        .optional()?
        .ok_or_else(|| ServiceError::not_found("student", student_id))?;

    let enrollments = {
        let mut stmt = tx.prepare(
            "SELECT e.id, c.id, c.course_code, c.name, c.credits,
                    e.status, e.final_grade, e.enrollment_date, e.is_active
             FROM enrollments e
             JOIN courses c ON c.id = e.course_id
             WHERE e.student_id = ?
             ORDER BY c.course_code, c.id",
        )?;
        let rows = stmt
            .query_map([student_id], |r| {
                Ok(EnrollmentRow {
                    id: r.get(0)?,
                    course_id: r.get(1)?,
                    course_code: r.get(2)?,
                    course_name: r.get(3)?,
                    credits: r.get(4)?,
                    status: r.get(5)?,
                    final_grade: r.get(6)?,
                    enrollment_date: r.get(7)?,
                    is_active: r.get::<_, i64>(8)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let mut overall_grades = Mean::default();
    let mut grades_by_enrollment: HashMap<i64, Mean> = HashMap::new();
    {
        let mut stmt = tx.prepare(
            "SELECT g.enrollment_id, g.points_earned, g.points_possible
             FROM grades g
             JOIN enrollments e ON e.id = g.enrollment_id
             WHERE e.student_id = ?
             ORDER BY g.id",
        )?;
        let rows = stmt
            .query_map([student_id], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, f64>(1)?, r.get::<_, f64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (enrollment_id, earned, possible) in rows {
            let Some(pct) = calc::grade_percentage(earned, possible) else {
                continue;
            };
            overall_grades.push(pct);
            grades_by_enrollment.entry(enrollment_id).or_default().push(pct);
        }
    }

    let mut overall_attendance = AttendanceTally::default();
    let mut attendance_by_enrollment: HashMap<i64, AttendanceTally> = HashMap::new();
    {
        let mut stmt = tx.prepare(
            "SELECT a.enrollment_id, a.status, COUNT(*)
             FROM attendance a
             JOIN enrollments e ON e.id = a.enrollment_id
             WHERE e.student_id = ?
             GROUP BY a.enrollment_id, a.status",
        )?;
        let rows = stmt
            .query_map([student_id], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)? as usize,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (enrollment_id, status, n) in rows {
            let tally = tally_statuses([(status, n)]);
            attendance_by_enrollment
                .entry(enrollment_id)
                .or_default()
                .merge(tally);
            overall_attendance.merge(tally);
        }
    }

    tx.commit()?;

    let mut totals = PerformanceTotals {
        total_courses: enrollments.len(),
        ..PerformanceTotals::default()
    };
    let mut weighted: Vec<(f64, f64)> = Vec::new();
    let mut courses = Vec::with_capacity(enrollments.len());
    for e in enrollments {
        let grades = grades_by_enrollment.get(&e.id).copied().unwrap_or_default();
        let attendance = attendance_by_enrollment.get(&e.id).copied().unwrap_or_default();
        let average_grade = grades.value();
        if let Some(avg) = average_grade {
            weighted.push((avg, e.credits as f64));
            totals.total_credits += e.credits;
        }
        if EnrollmentStatus::parse(&e.status) == Some(EnrollmentStatus::Completed) {
            totals.completed_courses += 1;
        }
        if e.is_active {
            totals.active_enrollments += 1;
        }
        courses.push(CoursePerformance {
            course_id: e.course_id,
            course_code: e.course_code,
            course_name: e.course_name,
            credits: e.credits,
            status: e.status,
            final_grade: e.final_grade,
            enrollment_date: e.enrollment_date,
            average_grade,
            grade_count: grades.count(),
            attendance_rate: attendance.rate(),
        });
    }

    Ok(StudentPerformance {
        student_id,
        student,
        average_grade: overall_grades.value(),
        attendance_rate: overall_attendance.rate(),
        weighted_average: calc::weighted_mean(weighted),
        courses,
        totals,
        generated_at: Utc::now(),
    })
}
