use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

/// Column order the classifier artifact was trained on.
pub const FEATURE_COLUMNS: [&str; 13] = [
    "problems_solved",
    "assessments_completed",
    "mini_projects",
    "certifications_earned",
    "latest_project_score",
    "communication",
    "teamwork",
    "presentation",
    "leadership",
    "critical_thinking",
    "interpersonal_skills",
    "mock_interview_score",
    "internships_completed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStatus {
    NotReady,
    Ready,
    Placed,
}

impl PlacementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementStatus::NotReady => "Not Ready",
            PlacementStatus::Ready => "Ready",
            PlacementStatus::Placed => "Placed",
        }
    }
}

impl fmt::Display for PlacementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Not Ready" => Ok(PlacementStatus::NotReady),
            "Ready" => Ok(PlacementStatus::Ready),
            "Placed" => Ok(PlacementStatus::Placed),
            other => Err(format!("unknown placement status '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Student {
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub enrollment_year: i64,
    pub course_batch: String,
    pub city: String,
    pub graduation_year: i64,
}

#[derive(Debug, Clone)]
pub struct ProgrammingProfile {
    pub language: String,
    pub problems_solved: i64,
    pub assessments_completed: i64,
    pub mini_projects: i64,
    pub certifications_earned: i64,
    pub latest_project_score: i64,
}

#[derive(Debug, Clone)]
pub struct SoftSkillsProfile {
    pub communication: i64,
    pub teamwork: i64,
    pub presentation: i64,
    pub leadership: i64,
    pub critical_thinking: i64,
    pub interpersonal_skills: i64,
}

#[derive(Debug, Clone)]
pub struct PlacementRecord {
    pub mock_interview_score: i64,
    pub internships_completed: i64,
    pub status: PlacementStatus,
    pub company_name: Option<String>,
    pub placement_package: Option<f64>,
    pub interview_rounds_cleared: i64,
    pub placement_date: Option<NaiveDate>,
}

/// One student with all three detail profiles, as loaded by the importer.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub student: Student,
    pub programming: ProgrammingProfile,
    pub soft_skills: SoftSkillsProfile,
    pub placement: PlacementRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StudentSummary {
    pub student_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub problems_solved: f64,
    pub assessments_completed: f64,
    pub mini_projects: f64,
    pub certifications_earned: f64,
    pub latest_project_score: f64,
    pub communication: f64,
    pub teamwork: f64,
    pub presentation: f64,
    pub leadership: f64,
    pub critical_thinking: f64,
    pub interpersonal_skills: f64,
    pub mock_interview_score: f64,
    pub internships_completed: f64,
}

impl FeatureRow {
    /// Builds a row from values in `FEATURE_COLUMNS` order.
    pub fn from_values(values: [f64; 13]) -> Self {
        let [
            problems_solved,
            assessments_completed,
            mini_projects,
            certifications_earned,
            latest_project_score,
            communication,
            teamwork,
            presentation,
            leadership,
            critical_thinking,
            interpersonal_skills,
            mock_interview_score,
            internships_completed,
        ] = values;
        Self {
            problems_solved,
            assessments_completed,
            mini_projects,
            certifications_earned,
            latest_project_score,
            communication,
            teamwork,
            presentation,
            leadership,
            critical_thinking,
            interpersonal_skills,
            mock_interview_score,
            internships_completed,
        }
    }

    /// Values in `FEATURE_COLUMNS` order.
    pub fn values(&self) -> [f64; 13] {
        [
            self.problems_solved,
            self.assessments_completed,
            self.mini_projects,
            self.certifications_earned,
            self.latest_project_score,
            self.communication,
            self.teamwork,
            self.presentation,
            self.leadership,
            self.critical_thinking,
            self.interpersonal_skills,
            self.mock_interview_score,
            self.internships_completed,
        ]
    }

    pub fn to_table(&self) -> Table {
        Table {
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: vec![self.values().iter().map(|v| Cell::Real(*v)).collect()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(usize),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Real(value) => write!(f, "{value}"),
            Cell::Text(value) => f.write_str(value),
            Cell::Blob(len) => write!(f, "<blob {len} bytes>"),
        }
    }
}

/// Query output of arbitrary shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one named column, top to bottom.
    pub fn column(&self, name: &str) -> Vec<&Cell> {
        match self.column_index(name) {
            Some(idx) => self.rows.iter().filter_map(|row| row.get(idx)).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            PlacementStatus::NotReady,
            PlacementStatus::Ready,
            PlacementStatus::Placed,
        ] {
            assert_eq!(status.as_str().parse::<PlacementStatus>(), Ok(status));
        }
        assert!("placed".parse::<PlacementStatus>().is_err());
    }

    #[test]
    fn feature_values_follow_column_order() {
        let expected: Vec<f64> = (1..=13).map(|v| v as f64).collect();
        let mut values = [0.0; 13];
        values.copy_from_slice(&expected);
        let row = FeatureRow::from_values(values);
        assert_eq!(row.problems_solved, 1.0);
        assert_eq!(row.leadership, 9.0);
        assert_eq!(row.internships_completed, 13.0);
        assert_eq!(row.values().to_vec(), expected);

        let table = row.to_table();
        assert_eq!(table.columns.len(), 13);
        assert_eq!(table.columns[12], "internships_completed");
        assert_eq!(table.column("leadership"), vec![&Cell::Real(9.0)]);
    }

    #[test]
    fn real_cells_keep_full_precision() {
        assert_eq!(Cell::Real(20.0).to_string(), "20");
        assert_eq!(Cell::Real(72.5).to_string(), "72.5");
        assert_eq!(Cell::Real(61.0 / 3.0).to_string(), (61.0_f64 / 3.0).to_string());
    }
}
