use crate::models::QuestionPaper;

/// Renders the question paper as the plain-text document offered for
/// download: title line, total-marks line, then one numbered entry per
/// question with its marks.
pub fn question_paper_text(paper: &QuestionPaper) -> String {
    let questions = paper
        .questions
        .iter()
        .enumerate()
        .map(|(index, q)| format!("{}. {} ({} marks)", index + 1, q.question, q.marks))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "# {}\n**Total Marks: {}**\n\n---\n\n{}",
        paper.title, paper.total_marks, questions
    )
}

/// Download file name: whitespace collapsed to underscores, `.txt` suffix.
pub fn export_filename(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{sanitized}.txt")
}
