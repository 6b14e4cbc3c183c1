use quizlink_core::traits::{QuestionSource, QuestionSourceError};
use quizlink_core::Question;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;

/// Question source backed by an in-memory pool, sampled randomly per
/// session.
pub struct QuestionBank {
    questions: Vec<Question>,
    rng: StdRng,
}

impl QuestionBank {
    /// The shipped general-knowledge pool
    pub fn builtin() -> Self {
        Self {
            questions: builtin_questions(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Load a pool from a JSON file containing an array of questions
    pub fn from_file(path: &Path) -> Result<Self, QuestionSourceError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| QuestionSourceError::Store(format!("{}: {e}", path.display())))?;
        let questions: Vec<Question> = serde_json::from_str(&raw)
            .map_err(|e| QuestionSourceError::Store(format!("{}: {e}", path.display())))?;

        Ok(Self {
            questions,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl QuestionSource for QuestionBank {
    fn load_random_questions(&mut self, n: usize) -> Result<Vec<Question>, QuestionSourceError> {
        if self.questions.len() < n {
            return Err(QuestionSourceError::NotEnough {
                wanted: n,
                available: self.questions.len(),
            });
        }

        let mut pool = self.questions.clone();
        pool.shuffle(&mut self.rng);
        pool.truncate(n);
        Ok(pool)
    }
}

fn q(id: u32, text: &str, options: [&str; 4], correct: u8) -> Question {
    Question::new(id, text, options.map(str::to_string), correct)
        .expect("builtin question is valid")
}

fn builtin_questions() -> Vec<Question> {
    vec![
        q(
            1,
            "Which planet has the most moons?",
            ["Mars", "Saturn", "Venus", "Mercury"],
            2,
        ),
        q(
            2,
            "What is the largest ocean on Earth?",
            ["Atlantic", "Indian", "Pacific", "Arctic"],
            3,
        ),
        q(
            3,
            "Which element has the chemical symbol Fe?",
            ["Iron", "Fluorine", "Lead", "Tin"],
            1,
        ),
        q(
            4,
            "In which year did the first person walk on the Moon?",
            ["1959", "1965", "1969", "1972"],
            3,
        ),
        q(
            5,
            "Which country has the longest coastline?",
            ["Australia", "Russia", "Indonesia", "Canada"],
            4,
        ),
        q(
            6,
            "What is the smallest prime number?",
            ["0", "1", "2", "3"],
            3,
        ),
        q(
            7,
            "Which instrument measures atmospheric pressure?",
            ["Barometer", "Hygrometer", "Anemometer", "Altimeter"],
            1,
        ),
        q(
            8,
            "Which river is the longest in the world?",
            ["Amazon", "Nile", "Yangtze", "Mississippi"],
            2,
        ),
        q(
            9,
            "How many strings does a standard violin have?",
            ["Four", "Five", "Six", "Seven"],
            1,
        ),
        q(
            10,
            "Which gas makes up most of Earth's atmosphere?",
            ["Oxygen", "Carbon dioxide", "Hydrogen", "Nitrogen"],
            4,
        ),
        q(
            11,
            "What is the capital of New Zealand?",
            ["Auckland", "Wellington", "Christchurch", "Dunedin"],
            2,
        ),
        q(
            12,
            "Which painter cut off part of his own ear?",
            ["Claude Monet", "Pablo Picasso", "Vincent van Gogh", "Salvador Dali"],
            3,
        ),
    ]
}
