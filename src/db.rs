use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, Connection, Executor, Row, SqliteConnection, Statement, TypeInfo, ValueRef};

use crate::error::QueryError;
use crate::models::{
    Cell, FeatureRow, PlacementRecord, PlacementStatus, ProgrammingProfile, SoftSkillsProfile,
    Student, StudentRecord, StudentSummary, Table, FEATURE_COLUMNS,
};
use crate::report::ReportKind;
use crate::sql_guard;

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS Students (
        student_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        age INTEGER,
        gender TEXT,
        email TEXT,
        phone TEXT,
        enrollment_year INTEGER,
        course_batch TEXT,
        city TEXT,
        graduation_year INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS Programming (
        programming_id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER,
        language TEXT,
        problems_solved INTEGER,
        assessments_completed INTEGER,
        mini_projects INTEGER,
        certifications_earned INTEGER,
        latest_project_score INTEGER,
        FOREIGN KEY(student_id) REFERENCES Students(student_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS SoftSkills (
        soft_skill_id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER,
        communication INTEGER,
        teamwork INTEGER,
        presentation INTEGER,
        leadership INTEGER,
        critical_thinking INTEGER,
        interpersonal_skills INTEGER,
        FOREIGN KEY(student_id) REFERENCES Students(student_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS Placements (
        placement_id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER,
        mock_interview_score INTEGER,
        internships_completed INTEGER,
        placement_status TEXT,
        company_name TEXT,
        placement_package REAL,
        interview_rounds_cleared INTEGER,
        placement_date TEXT,
        FOREIGN KEY(student_id) REFERENCES Students(student_id)
    )
    "#,
];

const FEATURES_SQL: &str = r#"
    SELECT
        pr.problems_solved,
        pr.assessments_completed,
        pr.mini_projects,
        pr.certifications_earned,
        pr.latest_project_score,
        ss.communication,
        ss.teamwork,
        ss.presentation,
        ss.leadership,
        ss.critical_thinking,
        ss.interpersonal_skills,
        p.mock_interview_score,
        p.internships_completed
    FROM Students s
    JOIN Programming pr ON s.student_id = pr.student_id
    JOIN SoftSkills ss ON s.student_id = ss.student_id
    JOIN Placements p ON s.student_id = p.student_id
    WHERE s.student_id = ?
    LIMIT 1
"#;

/// Opens a fresh connection for a single call. Readers never create the file.
async fn connect(path: &Path, read_only: bool) -> sqlx::Result<SqliteConnection> {
    tracing::debug!(path = %path.display(), read_only, "opening database");
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(read_only)
        .create_if_missing(!read_only)
        .foreign_keys(true);
    SqliteConnection::connect_with(&options).await
}

pub async fn init_db(path: &Path) -> anyhow::Result<()> {
    let mut conn = connect(path, false)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut conn).await?;
    }

    conn.close().await?;
    Ok(())
}

pub async fn list_students(path: &Path) -> anyhow::Result<Vec<StudentSummary>> {
    let mut conn = connect(path, true).await?;
    let students = sqlx::query_as::<_, StudentSummary>(
        "SELECT student_id, COALESCE(name, '') AS name FROM Students ORDER BY name, student_id",
    )
    .fetch_all(&mut conn)
    .await?;
    conn.close().await?;
    Ok(students)
}

pub async fn find_student(path: &Path, student_id: i64) -> anyhow::Result<Option<StudentSummary>> {
    let mut conn = connect(path, true).await?;
    let student = sqlx::query_as::<_, StudentSummary>(
        "SELECT student_id, COALESCE(name, '') AS name FROM Students WHERE student_id = ?",
    )
    .bind(student_id)
    .fetch_optional(&mut conn)
    .await?;
    conn.close().await?;
    Ok(student)
}

pub async fn find_student_by_name(
    path: &Path,
    name: &str,
) -> anyhow::Result<Option<StudentSummary>> {
    let mut conn = connect(path, true).await?;
    let student = sqlx::query_as::<_, StudentSummary>(
        r#"
        SELECT student_id, name FROM Students
        WHERE name = ?
        ORDER BY student_id
        LIMIT 1
        "#,
    )
    .bind(name)
    .fetch_optional(&mut conn)
    .await?;
    conn.close().await?;
    Ok(student)
}

/// The 13-column feature row for one student, or `None` when the student or
/// any of their three profiles is missing. A NULL in any feature column is
/// treated the same way, so nothing is scored on partial data.
pub async fn student_features(path: &Path, student_id: i64) -> anyhow::Result<Option<FeatureRow>> {
    let mut conn = connect(path, true).await?;
    let table = fetch_table(&mut conn, FEATURES_SQL, &[student_id])
        .await
        .with_context(|| format!("failed to load features for student {student_id}"))?;
    conn.close().await?;

    let Some(cells) = table.rows.first() else {
        return Ok(None);
    };

    let mut values = [0.0; 13];
    let mut missing = Vec::new();
    for (idx, (cell, column)) in cells.iter().zip(FEATURE_COLUMNS).enumerate() {
        match cell {
            Cell::Integer(value) => values[idx] = *value as f64,
            Cell::Real(value) => values[idx] = *value,
            Cell::Null => missing.push(column),
            other => anyhow::bail!(
                "student {student_id} has a non-numeric {column} value '{other}'"
            ),
        }
    }

    if !missing.is_empty() {
        tracing::warn!(student_id, missing = %missing.join(", "), "incomplete feature row");
        return Ok(None);
    }

    Ok(Some(FeatureRow::from_values(values)))
}

pub async fn run_report(path: &Path, kind: ReportKind) -> anyhow::Result<Table> {
    let mut conn = connect(path, true).await?;
    let table = fetch_table(&mut conn, kind.sql(), &[])
        .await
        .with_context(|| format!("report '{}' failed", kind.slug()))?;
    conn.close().await?;
    tracing::debug!(report = kind.slug(), rows = table.rows.len(), "report finished");
    Ok(table)
}

pub async fn top_programmers(path: &Path, min_problems: i64) -> anyhow::Result<Table> {
    let mut conn = connect(path, true).await?;
    let table = fetch_table(
        &mut conn,
        r#"
        SELECT s.name, p.problems_solved
        FROM Students s
        JOIN Programming p ON s.student_id = p.student_id
        WHERE p.problems_solved > ?
        ORDER BY p.problems_solved DESC, s.student_id
        "#,
        &[min_problems],
    )
    .await?;
    conn.close().await?;
    Ok(table)
}

pub async fn high_soft_skills(path: &Path, min_score: i64) -> anyhow::Result<Table> {
    let mut conn = connect(path, true).await?;
    let table = fetch_table(
        &mut conn,
        r#"
        SELECT s.name, ss.communication, ss.teamwork
        FROM Students s
        JOIN SoftSkills ss ON s.student_id = ss.student_id
        WHERE ss.communication > ? AND ss.teamwork > ?
        ORDER BY s.name, s.student_id
        "#,
        &[min_score, min_score],
    )
    .await?;
    conn.close().await?;
    Ok(table)
}

/// Runs operator-supplied SQL. Only a single read-only statement gets past
/// the guard, and it still runs on a read-only connection.
pub async fn run_ad_hoc_query(path: &Path, sql: &str) -> Result<Table, QueryError> {
    let statement = match sql_guard::check(sql) {
        Ok(statement) => statement,
        Err(err) => {
            tracing::warn!(error = %err, "rejected ad-hoc query");
            return Err(err);
        }
    };

    let mut conn = connect(path, true).await?;
    let table = fetch_table(&mut conn, statement, &[]).await?;
    conn.close().await?;
    Ok(table)
}

async fn fetch_table(
    conn: &mut SqliteConnection,
    sql: &str,
    binds: &[i64],
) -> sqlx::Result<Table> {
    let statement = (&mut *conn).prepare(sql).await?;
    let columns: Vec<String> = statement
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();

    let mut query = statement.query();
    for value in binds {
        query = query.bind(*value);
    }

    let records = query.fetch_all(&mut *conn).await?;
    let mut rows = Vec::with_capacity(records.len());

    for record in records.iter() {
        let mut cells = Vec::with_capacity(columns.len());
        for idx in 0..record.len() {
            cells.push(decode_cell(record, idx)?);
        }
        rows.push(cells);
    }

    Ok(Table { columns, rows })
}

/// SQLite values are dynamically typed, so decode by the storage class of the
/// value itself rather than the declared column type.
fn decode_cell(row: &SqliteRow, idx: usize) -> sqlx::Result<Cell> {
    let storage_class = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Cell::Null);
        }
        raw.type_info().name().to_string()
    };

    let cell = match storage_class.as_str() {
        "INTEGER" => Cell::Integer(row.try_get(idx)?),
        "REAL" => Cell::Real(row.try_get(idx)?),
        "BLOB" => Cell::Blob(row.try_get::<Vec<u8>, _>(idx)?.len()),
        _ => Cell::Text(row.try_get(idx)?),
    };
    Ok(cell)
}

pub async fn import_csv(path: &Path, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        age: i64,
        gender: String,
        email: String,
        phone: String,
        enrollment_year: i64,
        course_batch: String,
        city: String,
        graduation_year: i64,
        language: String,
        problems_solved: i64,
        assessments_completed: i64,
        mini_projects: i64,
        certifications_earned: i64,
        latest_project_score: i64,
        communication: i64,
        teamwork: i64,
        presentation: i64,
        leadership: i64,
        critical_thinking: i64,
        interpersonal_skills: i64,
        mock_interview_score: i64,
        internships_completed: i64,
        placement_status: String,
        company_name: Option<String>,
        placement_package: Option<f64>,
        interview_rounds_cleared: i64,
        placement_date: Option<NaiveDate>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut records = Vec::new();

    for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = idx + 2;
        let row = result.with_context(|| format!("line {line}: malformed row"))?;
        let status: PlacementStatus = row
            .placement_status
            .parse()
            .map_err(|err: String| anyhow::anyhow!("line {line}: {err}"))?;

        let record = StudentRecord {
            student: Student {
                name: row.name,
                age: row.age,
                gender: row.gender,
                email: row.email,
                phone: row.phone,
                enrollment_year: row.enrollment_year,
                course_batch: row.course_batch,
                city: row.city,
                graduation_year: row.graduation_year,
            },
            programming: ProgrammingProfile {
                language: row.language,
                problems_solved: row.problems_solved,
                assessments_completed: row.assessments_completed,
                mini_projects: row.mini_projects,
                certifications_earned: row.certifications_earned,
                latest_project_score: row.latest_project_score,
            },
            soft_skills: SoftSkillsProfile {
                communication: row.communication,
                teamwork: row.teamwork,
                presentation: row.presentation,
                leadership: row.leadership,
                critical_thinking: row.critical_thinking,
                interpersonal_skills: row.interpersonal_skills,
            },
            placement: PlacementRecord {
                mock_interview_score: row.mock_interview_score,
                internships_completed: row.internships_completed,
                status,
                company_name: row.company_name,
                placement_package: row.placement_package,
                interview_rounds_cleared: row.interview_rounds_cleared,
                placement_date: row.placement_date,
            },
        };

        validate(&record).map_err(|err| anyhow::anyhow!("line {line}: {err}"))?;
        records.push(record);
    }

    let mut conn = connect(path, false).await?;
    let mut tx = conn.begin().await?;
    for record in records.iter() {
        insert_student_record(&mut tx, record).await?;
    }
    tx.commit().await?;
    conn.close().await?;

    tracing::info!(count = records.len(), source = %csv_path.display(), "imported students");
    Ok(records.len())
}

fn validate(record: &StudentRecord) -> Result<(), String> {
    let student = &record.student;
    if student.graduation_year < student.enrollment_year {
        return Err(format!(
            "graduation_year {} is before enrollment_year {}",
            student.graduation_year, student.enrollment_year
        ));
    }

    let soft = &record.soft_skills;
    let scores = [
        ("latest_project_score", record.programming.latest_project_score),
        ("communication", soft.communication),
        ("teamwork", soft.teamwork),
        ("presentation", soft.presentation),
        ("leadership", soft.leadership),
        ("critical_thinking", soft.critical_thinking),
        ("interpersonal_skills", soft.interpersonal_skills),
        ("mock_interview_score", record.placement.mock_interview_score),
    ];
    for (column, score) in scores {
        if !(0..=100).contains(&score) {
            return Err(format!("{column} {score} is outside 0-100"));
        }
    }

    let counts = [
        ("age", student.age),
        ("problems_solved", record.programming.problems_solved),
        ("assessments_completed", record.programming.assessments_completed),
        ("mini_projects", record.programming.mini_projects),
        ("certifications_earned", record.programming.certifications_earned),
        ("internships_completed", record.placement.internships_completed),
        ("interview_rounds_cleared", record.placement.interview_rounds_cleared),
    ];
    for (column, count) in counts {
        if count < 0 {
            return Err(format!("{column} {count} is negative"));
        }
    }

    let placement = &record.placement;
    let has_outcome = placement.company_name.is_some()
        || placement.placement_package.is_some()
        || placement.placement_date.is_some();
    if placement.status != PlacementStatus::Placed && has_outcome {
        return Err(format!(
            "company, package and date are only allowed for Placed students (status is {})",
            placement.status
        ));
    }

    Ok(())
}

/// Inserts a student and their three profiles, returning the new student id.
async fn insert_student_record(
    conn: &mut SqliteConnection,
    record: &StudentRecord,
) -> sqlx::Result<i64> {
    let student = &record.student;
    let student_id = sqlx::query(
        r#"
        INSERT INTO Students
        (name, age, gender, email, phone, enrollment_year, course_batch, city, graduation_year)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&student.name)
    .bind(student.age)
    .bind(&student.gender)
    .bind(&student.email)
    .bind(&student.phone)
    .bind(student.enrollment_year)
    .bind(&student.course_batch)
    .bind(&student.city)
    .bind(student.graduation_year)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let programming = &record.programming;
    sqlx::query(
        r#"
        INSERT INTO Programming
        (student_id, language, problems_solved, assessments_completed, mini_projects,
         certifications_earned, latest_project_score)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(student_id)
    .bind(&programming.language)
    .bind(programming.problems_solved)
    .bind(programming.assessments_completed)
    .bind(programming.mini_projects)
    .bind(programming.certifications_earned)
    .bind(programming.latest_project_score)
    .execute(&mut *conn)
    .await?;

    let soft = &record.soft_skills;
    sqlx::query(
        r#"
        INSERT INTO SoftSkills
        (student_id, communication, teamwork, presentation, leadership,
         critical_thinking, interpersonal_skills)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(student_id)
    .bind(soft.communication)
    .bind(soft.teamwork)
    .bind(soft.presentation)
    .bind(soft.leadership)
    .bind(soft.critical_thinking)
    .bind(soft.interpersonal_skills)
    .execute(&mut *conn)
    .await?;

    let placement = &record.placement;
    sqlx::query(
        r#"
        INSERT INTO Placements
        (student_id, mock_interview_score, internships_completed, placement_status,
         company_name, placement_package, interview_rounds_cleared, placement_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(student_id)
    .bind(placement.mock_interview_score)
    .bind(placement.internships_completed)
    .bind(placement.status.as_str())
    .bind(&placement.company_name)
    .bind(placement.placement_package)
    .bind(placement.interview_rounds_cleared)
    .bind(placement.placement_date)
    .execute(&mut *conn)
    .await?;

    Ok(student_id)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};

    use super::*;

    pub fn sample_record(name: &str) -> StudentRecord {
        StudentRecord {
            student: Student {
                name: name.to_string(),
                age: 22,
                gender: "Female".to_string(),
                email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
                phone: "555-0100".to_string(),
                enrollment_year: 2020,
                course_batch: "Batch A".to_string(),
                city: "Pune".to_string(),
                graduation_year: 2024,
            },
            programming: ProgrammingProfile {
                language: "Python".to_string(),
                problems_solved: 40,
                assessments_completed: 5,
                mini_projects: 2,
                certifications_earned: 1,
                latest_project_score: 70,
            },
            soft_skills: SoftSkillsProfile {
                communication: 70,
                teamwork: 70,
                presentation: 70,
                leadership: 70,
                critical_thinking: 70,
                interpersonal_skills: 70,
            },
            placement: PlacementRecord {
                mock_interview_score: 70,
                internships_completed: 1,
                status: PlacementStatus::NotReady,
                company_name: None,
                placement_package: None,
                interview_rounds_cleared: 1,
                placement_date: None,
            },
        }
    }

    pub fn placed(mut record: StudentRecord, company: &str, package: f64) -> StudentRecord {
        record.placement.status = PlacementStatus::Placed;
        record.placement.company_name = Some(company.to_string());
        record.placement.placement_package = Some(package);
        record.placement.placement_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        record
    }

    /// Fresh schema in a temp directory. Keep the `TempDir` alive for the test.
    pub async fn empty_db() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("placement.db");
        init_db(&path).await.expect("init db");
        (dir, path)
    }

    pub async fn seed(path: &Path, records: &[StudentRecord]) -> Vec<i64> {
        let mut conn = connect(path, false).await.expect("connect");
        let mut ids = Vec::new();
        for record in records {
            ids.push(insert_student_record(&mut conn, record).await.expect("insert"));
        }
        conn.close().await.expect("close");
        ids
    }

    pub async fn execute(path: &Path, sql: &str) {
        let mut conn = connect(path, false).await.expect("connect");
        sqlx::query(sql).execute(&mut conn).await.expect("execute");
        conn.close().await.expect("close");
    }
}
