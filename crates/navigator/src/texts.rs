use shared::domain::NodeId;

pub const CHOOSE_QUESTION: &str = "Choose a question:";
pub const NO_QUESTIONS: &str = "No questions available.";
pub const LANGUAGE_PROMPT: &str = "Please choose your language / Пожалуйста, выберите язык:";
pub const INVALID_FORMAT: &str = "Invalid format. Use:\n\nquestion|answer";
pub const CREATED: &str = "Question created successfully.";
pub const UPDATED: &str = "Question updated successfully.";
pub const CREATE_FAILED: &str = "Failed to create question.";
pub const UPDATE_FAILED: &str = "Failed to update question.";
pub const DELETE_FAILED: &str = "Failed to delete question.";

pub const EDIT_LABEL: &str = "✏️";
pub const DELETE_LABEL: &str = "🗑️";
pub const PREV_LABEL: &str = "⬅️ Prev";
pub const NEXT_LABEL: &str = "➡️ Next";
pub const BACK_LABEL: &str = "🔙 Back";
pub const ADD_LABEL: &str = "➕ Add Question";

pub fn help(language: &str) -> String {
    let lines: &[&str] = match language {
        "ru" => &[
            "Уважаемые эксперты Комитета по правам человека, здесь вы можете найти все тексты Нормативных Актов и текущую статистику по всем вопросам, которые были направлены",
            "Доступные команды:",
            "/start - Показать это сообщение",
            "/questions - Список доступных вопросов",
            "/language - Установить язык",
        ],
        _ => &[
            "Distinguished experts of the Human Rights Committee, here you can find all the texts of the Legal Acts and current statistics on all questions submitted",
            "Available commands:",
            "/start - Show this help message",
            "/questions - List available questions",
            "/language - Set language",
        ],
    };
    lines.join("\n")
}

pub fn language_confirmation(language: &str) -> &'static str {
    match language {
        "ru" => "Язык установлен на русский.",
        _ => "Language set to English.",
    }
}

pub fn add_prompt(language: &str, parent_id: NodeId) -> String {
    format!(
        "Send your new question for language [{language}] and parent [{parent_id}] in the format:\n\nquestion|answer"
    )
}

pub fn edit_prompt(node_id: NodeId) -> String {
    format!("Send edited text for question #{node_id} in format:\n\nquestion|answer")
}

pub fn deleted(node_id: NodeId) -> String {
    format!("Question #{node_id} deleted.")
}

/// Node view body, rendered with Markdown.
pub fn answer(text: &str, answer: &str) -> String {
    format!("*{text}*\n\n{answer}")
}
