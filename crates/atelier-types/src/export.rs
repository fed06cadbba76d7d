use serde::{Deserialize, Serialize};

/// Column headers of the reporting export, in column order.
pub const EXPORT_COLUMNS: [&str; 10] = [
    "Timestamp",
    "Id élève",
    "Id enseignant\u{b7}e",
    "Prénom enseignant\u{b7}e",
    "Nom enseignant\u{b7}e",
    "Id question",
    "MÉTIER",
    "Id réponse",
    "Question/Répondant",
    "Text",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKind {
    Question,
    #[serde(rename = "student")]
    Student,
    #[serde(rename = "teacher")]
    Teacher,
}

impl RowKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Question => "Question",
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

/// One line of the flattened report: either a question header (empty
/// timestamp and message id) or one discussion message under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Id élève")]
    pub student_id: String,
    #[serde(rename = "Id enseignant\u{b7}e")]
    pub teacher_id: String,
    #[serde(rename = "Prénom enseignant\u{b7}e")]
    pub teacher_first_name: String,
    #[serde(rename = "Nom enseignant\u{b7}e")]
    pub teacher_last_name: String,
    #[serde(rename = "Id question")]
    pub question_id: String,
    #[serde(rename = "MÉTIER")]
    pub category: String,
    #[serde(rename = "Id réponse")]
    pub message_id: String,
    #[serde(rename = "Question/Répondant")]
    pub kind: RowKind,
    #[serde(rename = "Text")]
    pub text: String,
}

impl ExportRow {
    pub fn is_header(&self) -> bool {
        self.kind == RowKind::Question
    }
}
