use serde::{Deserialize, Serialize};

/// The four artifacts generated from one uploaded document. Immutable once
/// produced; discarded on session reset or logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySet {
    pub flashcards: Vec<Flashcard>,
    pub quiz: Quiz,
    pub summary: String,
    pub question_paper: QuestionPaper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    pub questions: Vec<Question>,
}

/// Closed question union. The tag decides rendering and grading; every
/// consumption site matches exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Question {
    #[serde(rename = "MCQ")]
    Mcq {
        question: String,
        options: Vec<String>,
        answer: String,
        explanation: String,
    },
    Subjective { question: String, answer: String },
}

impl Question {
    pub fn question_text(&self) -> &str {
        match self {
            Question::Mcq { question, .. } => question,
            Question::Subjective { question, .. } => question,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPaper {
    pub title: String,
    pub total_marks: u32,
    pub questions: Vec<PaperQuestion>,
}

impl QuestionPaper {
    /// The generator is assumed, not required, to make per-question marks sum
    /// to `total_marks`. Violations are possible and tolerated.
    pub fn marks_consistent(&self) -> bool {
        self.questions.iter().map(|q| q.marks).sum::<u32>() == self.total_marks
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperQuestion {
    pub question: String,
    pub marks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Flashcards,
    Quizzes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalFrequency {
    Daily,
    Weekly,
}

/// A user-defined recurring review target, persisted remotely keyed by owner
/// and goal id. `progress` is monotonically non-decreasing; `last_reset` is
/// stored as epoch milliseconds. Nothing client-side triggers a
/// frequency-driven reset; `frequency` and `last_reset` are carried for the
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyGoal {
    pub id: String,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub target: u32,
    pub frequency: GoalFrequency,
    pub progress: u32,
    pub last_reset: i64,
}

impl StudyGoal {
    pub fn is_met(&self) -> bool {
        self.progress >= self.target
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn of the tutor transcript. The transcript is append-only except for
/// the in-place growth of the last model message while its reply streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorMessage {
    pub role: Role,
    pub text: String,
}

/// Transient input to generation. `content` is the base64 payload; only
/// `name` outlives the generation call (for display).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileState {
    pub name: String,
    pub content: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum View {
    Flashcards,
    Quiz,
    Summary,
    QuestionPaper,
    Tutor,
    Goals,
    Profile,
}
