pub mod generator;
pub mod session;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

pub fn percentage(score: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((score as f64 / total as f64) * 100.0).round() as u32
}

pub fn verdict(percentage: u32) -> &'static str {
    if percentage >= 80 {
        "Excellent!"
    } else if percentage >= 50 {
        "Good Job!"
    } else {
        "Keep Practicing!"
    }
}
