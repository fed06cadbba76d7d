use chrono::DateTime;
use tracing::{info, warn};

use atelier_db::{Repository, Schema, TreeStore};
use atelier_types::export::{ExportRow, RowKind};

use crate::error::{ServiceError, ServiceResult};

/// Category labels, indexed by a question's `section`.
pub const CATEGORY_LABELS: [&str; 6] = ["M", "É", "T", "I", "E", "R"];

/// Answer-map key that is not a question id.
const ANSWER_ID_KEY: &str = "id";

pub fn category_label(ordinal: i64) -> Option<&'static str> {
    usize::try_from(ordinal)
        .ok()
        .and_then(|i| CATEGORY_LABELS.get(i))
        .copied()
}

/// Formats a microsecond epoch timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_timestamp(micros: i64) -> String {
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Flattens every teacher/student discussion into report rows, sorted by
/// teacher name, student, question, then time.
pub fn project<S: TreeStore + ?Sized>(store: &S, schema: Schema) -> ServiceResult<Vec<ExportRow>> {
    let mut repo = Repository::new(store, schema);
    repo.warm()?;
    project_from(&repo)
}

pub fn project_from<S: TreeStore + ?Sized>(repo: &Repository<'_, S>) -> ServiceResult<Vec<ExportRow>> {
    let mut rows = Vec::new();

    for token in repo.teaching_tokens()? {
        let Some(teacher_id) = repo.teacher_id(&token)? else {
            continue;
        };
        let Some(teacher) = repo.user(&teacher_id)? else {
            warn!("Token {} belongs to unknown teacher {}, skipping", token, teacher_id);
            continue;
        };
        let questions = repo.questions(&teacher_id)?;

        for student_id in repo.student_ids(&token)? {
            let connected = repo.connected_tokens(&student_id)?;
            let [student_token] = connected.as_slice() else {
                return Err(ServiceError::UnsupportedConfiguration {
                    student_id,
                    token_count: connected.len(),
                });
            };

            for (question_id, answer) in repo.answers(student_token, &student_id)? {
                if question_id == ANSWER_ID_KEY {
                    continue;
                }
                let Some(question) = questions.get(&question_id) else {
                    continue;
                };
                let category = category_label(question.section).ok_or_else(|| {
                    ServiceError::CategoryOutOfRange {
                        teacher_id: teacher_id.clone(),
                        question_id: question_id.clone(),
                        ordinal: question.section,
                        label_count: CATEGORY_LABELS.len(),
                    }
                })?;

                let row = |timestamp: String, message_id: String, kind: RowKind, text: String| ExportRow {
                    timestamp,
                    student_id: student_id.clone(),
                    teacher_id: teacher_id.clone(),
                    teacher_first_name: teacher.first_name.clone(),
                    teacher_last_name: teacher.last_name.clone(),
                    question_id: question_id.clone(),
                    category: category.to_string(),
                    message_id,
                    kind,
                    text,
                };

                rows.push(row(String::new(), String::new(), RowKind::Question, question.text.clone()));

                for (message_id, message) in answer.discussion {
                    let kind = if message.creator_id == student_id {
                        RowKind::Student
                    } else {
                        RowKind::Teacher
                    };
                    rows.push(row(
                        format_timestamp(message.creation_time_stamp),
                        message_id,
                        kind,
                        message.text,
                    ));
                }
            }
        }
    }

    sort_rows(&mut rows);
    info!("Projected {} rows", rows.len());
    Ok(rows)
}

/// Question rows carry an empty timestamp, so they land right before their
/// discussion.
pub fn sort_rows(rows: &mut [ExportRow]) {
    rows.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

fn sort_key(row: &ExportRow) -> (&str, &str, &str, &str, &str) {
    (
        row.teacher_last_name.as_str(),
        row.teacher_first_name.as_str(),
        row.student_id.as_str(),
        row.question_id.as_str(),
        row.timestamp.as_str(),
    )
}
