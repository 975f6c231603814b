use std::fmt::Write;
use std::path::Path;
use std::str::FromStr;

use crate::db;
use crate::models::Table;

pub const EMPTY_RESULT: &str = "No matching records found.";

/// The fixed catalog of dashboard reports, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    AvgProgrammingByBatch,
    TopReadyByMockInterview,
    SoftSkillAverages,
    ProblemsSolvedOver100,
    InternshipsOver2,
    AvgPackageByGraduationYear,
    TopLeadership,
    PlacementStatusCounts,
    PlacedByCompany,
    InterviewRoundsOver3,
}

impl ReportKind {
    pub fn all() -> [ReportKind; 10] {
        [
            ReportKind::AvgProgrammingByBatch,
            ReportKind::TopReadyByMockInterview,
            ReportKind::SoftSkillAverages,
            ReportKind::ProblemsSolvedOver100,
            ReportKind::InternshipsOver2,
            ReportKind::AvgPackageByGraduationYear,
            ReportKind::TopLeadership,
            ReportKind::PlacementStatusCounts,
            ReportKind::PlacedByCompany,
            ReportKind::InterviewRoundsOver3,
        ]
    }

    /// 1-based position in the catalog.
    pub fn from_number(number: usize) -> Option<ReportKind> {
        number
            .checked_sub(1)
            .and_then(|idx| Self::all().get(idx).copied())
    }

    pub fn number(&self) -> usize {
        Self::all()
            .iter()
            .position(|kind| kind == self)
            .map(|idx| idx + 1)
            .unwrap_or_default()
    }

    pub fn slug(&self) -> &'static str {
        match self {
            ReportKind::AvgProgrammingByBatch => "avg-programming-by-batch",
            ReportKind::TopReadyByMockInterview => "top-ready-by-mock-interview",
            ReportKind::SoftSkillAverages => "soft-skill-averages",
            ReportKind::ProblemsSolvedOver100 => "problems-solved-over-100",
            ReportKind::InternshipsOver2 => "internships-over-2",
            ReportKind::AvgPackageByGraduationYear => "avg-package-by-graduation-year",
            ReportKind::TopLeadership => "top-leadership",
            ReportKind::PlacementStatusCounts => "placement-status-counts",
            ReportKind::PlacedByCompany => "placed-by-company",
            ReportKind::InterviewRoundsOver3 => "interview-rounds-over-3",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::AvgProgrammingByBatch => "Average programming performance per batch",
            ReportKind::TopReadyByMockInterview => {
                "Top 5 students ready for placement (by mock interview score)"
            }
            ReportKind::SoftSkillAverages => "Distribution of soft skills (dataset averages)",
            ReportKind::ProblemsSolvedOver100 => "Students with > 100 problems solved",
            ReportKind::InternshipsOver2 => "Students with more than 2 internships",
            ReportKind::AvgPackageByGraduationYear => "Average placement package by graduation year",
            ReportKind::TopLeadership => "Top 5 leadership scorers",
            ReportKind::PlacementStatusCounts => "Ready vs Not Ready vs Placed (counts)",
            ReportKind::PlacedByCompany => "Placed students by company (count)",
            ReportKind::InterviewRoundsOver3 => "Students who cleared > 3 interview rounds",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            ReportKind::AvgProgrammingByBatch => {
                r#"
                SELECT s.course_batch,
                       AVG(p.problems_solved) AS avg_problems_solved,
                       AVG(p.assessments_completed) AS avg_assessments,
                       AVG(p.latest_project_score) AS avg_project_score
                FROM Students s
                JOIN Programming p ON s.student_id = p.student_id
                GROUP BY s.course_batch
                ORDER BY s.course_batch
                "#
            }
            ReportKind::TopReadyByMockInterview => {
                r#"
                SELECT s.name, pl.mock_interview_score, pl.placement_status
                FROM Students s
                JOIN Placements pl ON s.student_id = pl.student_id
                WHERE pl.placement_status IN ('Ready', 'Placed')
                ORDER BY pl.mock_interview_score DESC, s.student_id
                LIMIT 5
                "#
            }
            ReportKind::SoftSkillAverages => {
                r#"
                SELECT AVG(communication) AS avg_communication,
                       AVG(teamwork) AS avg_teamwork,
                       AVG(presentation) AS avg_presentation,
                       AVG(leadership) AS avg_leadership,
                       AVG(critical_thinking) AS avg_critical_thinking,
                       AVG(interpersonal_skills) AS avg_interpersonal
                FROM SoftSkills
                "#
            }
            ReportKind::ProblemsSolvedOver100 => {
                r#"
                SELECT s.name, p.problems_solved
                FROM Students s
                JOIN Programming p ON s.student_id = p.student_id
                WHERE p.problems_solved > 100
                ORDER BY p.problems_solved DESC, s.student_id
                "#
            }
            ReportKind::InternshipsOver2 => {
                r#"
                SELECT s.name, pl.internships_completed
                FROM Students s
                JOIN Placements pl ON s.student_id = pl.student_id
                WHERE pl.internships_completed > 2
                ORDER BY pl.internships_completed DESC, s.student_id
                "#
            }
            ReportKind::AvgPackageByGraduationYear => {
                r#"
                SELECT s.graduation_year, AVG(pl.placement_package) AS avg_package
                FROM Students s
                JOIN Placements pl ON s.student_id = pl.student_id
                GROUP BY s.graduation_year
                ORDER BY s.graduation_year
                "#
            }
            ReportKind::TopLeadership => {
                r#"
                SELECT s.name, ss.leadership
                FROM Students s
                JOIN SoftSkills ss ON s.student_id = ss.student_id
                ORDER BY ss.leadership DESC, s.student_id
                LIMIT 5
                "#
            }
            ReportKind::PlacementStatusCounts => {
                r#"
                SELECT pl.placement_status, COUNT(*) AS count_students
                FROM Placements pl
                GROUP BY pl.placement_status
                ORDER BY pl.placement_status
                "#
            }
            ReportKind::PlacedByCompany => {
                r#"
                SELECT pl.company_name, COUNT(*) AS placed_count
                FROM Placements pl
                WHERE pl.placement_status = 'Placed' AND pl.company_name IS NOT NULL
                GROUP BY pl.company_name
                ORDER BY placed_count DESC, pl.company_name
                "#
            }
            ReportKind::InterviewRoundsOver3 => {
                r#"
                SELECT s.name, pl.interview_rounds_cleared
                FROM Students s
                JOIN Placements pl ON s.student_id = pl.student_id
                WHERE pl.interview_rounds_cleared > 3
                ORDER BY pl.interview_rounds_cleared DESC, s.student_id
                "#
            }
        }
    }
}

impl FromStr for ReportKind {
    type Err = String;

    /// Accepts a catalog number (`1`-`10`) or a slug.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Ok(number) = value.parse::<usize>() {
            return ReportKind::from_number(number)
                .ok_or_else(|| format!("report number must be 1-10, got {number}"));
        }

        ReportKind::all()
            .into_iter()
            .find(|kind| kind.slug() == value)
            .ok_or_else(|| format!("unknown report '{value}'"))
    }
}

/// Markdown pipe table, or the empty-state line when there are no rows.
pub fn render_table(table: &Table) -> String {
    let mut output = String::new();

    if table.is_empty() {
        let _ = writeln!(output, "{EMPTY_RESULT}");
        return output;
    }

    let _ = writeln!(output, "| {} |", table.columns.join(" | "));
    let _ = writeln!(
        output,
        "|{}|",
        table
            .columns
            .iter()
            .map(|_| "---")
            .collect::<Vec<_>>()
            .join("|")
    );
    for row in table.rows.iter() {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| cell.to_string().replace('|', "\\|"))
            .collect();
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }

    output
}

pub fn render_section(kind: ReportKind, table: &Table) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {}. {}", kind.number(), kind.title());
    let _ = writeln!(output);
    let _ = writeln!(output, "```sql");
    for line in kind.sql().trim().lines() {
        let _ = writeln!(output, "{}", line.trim());
    }
    let _ = writeln!(output, "```");
    let _ = writeln!(output);
    output.push_str(&render_table(table));
    output
}

/// Runs the given reports in order and renders them as one markdown document.
pub async fn build_report(path: &Path, kinds: &[ReportKind]) -> anyhow::Result<String> {
    let mut output = String::new();
    let _ = writeln!(output, "# Placement Insights");

    for kind in kinds {
        let table = db::run_report(path, *kind).await?;
        let _ = writeln!(output);
        output.push_str(&render_section(*kind, &table));
    }

    Ok(output)
}
