//! Message, time-of-day and session analysis.
//!
//! Everything here is total: any string, any clock reading and any history
//! produce an answer. The analyzer keeps two bounded histories, the
//! conversation ring buffer and the recent-question list used for repeat
//! detection.

use std::collections::{HashSet, VecDeque};

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::emotion::EmotionalState;

pub const CONVERSATION_CAPACITY: usize = 50;
pub const QUESTION_CAPACITY: usize = 10;
pub const REPEAT_SIMILARITY: f64 = 0.7;

const MINUTE_MS: i64 = 60 * 1000;
const TIRED_AFTER_MS: i64 = 30 * MINUTE_MS;
const OVERTIME_AFTER_MS: i64 = 45 * MINUTE_MS;

/// Table order is match priority.
const KEYWORDS: &[(&str, EmotionalState)] = &[
    ("really?", EmotionalState::Skeptical),
    ("seriously?", EmotionalState::Skeptical),
    ("are you sure", EmotionalState::Skeptical),
    ("that simple", EmotionalState::Skeptical),
    ("again", EmotionalState::Annoyed),
    ("same thing", EmotionalState::Annoyed),
    ("you just said", EmotionalState::Annoyed),
    ("repeat", EmotionalState::Annoyed),
    ("you're great", EmotionalState::Suspicious),
    ("i love you", EmotionalState::Suspicious),
    ("you're amazing", EmotionalState::Suspicious),
    ("thank you so much", EmotionalState::Suspicious),
    ("compliment", EmotionalState::Suspicious),
    ("sad", EmotionalState::SoftMode),
    ("depressed", EmotionalState::SoftMode),
    ("anxious", EmotionalState::SoftMode),
    ("worried", EmotionalState::SoftMode),
    ("scared", EmotionalState::SoftMode),
    ("lonely", EmotionalState::SoftMode),
    ("struggling", EmotionalState::SoftMode),
    ("help me", EmotionalState::SoftMode),
    ("crisis", EmotionalState::SoftMode),
    ("monday", EmotionalState::MaximumGrump),
    ("worst day", EmotionalState::MaximumGrump),
    ("terrible", EmotionalState::MaximumGrump),
    ("hate this", EmotionalState::MaximumGrump),
    ("furious", EmotionalState::Furious),
    ("angry", EmotionalState::Furious),
    ("hurry", EmotionalState::Annoyed),
    ("joke", EmotionalState::Skeptical),
];

const POSITIVE_WORDS: &[&str] = &[
    "happy", "great", "good", "awesome", "wonderful", "excited", "love", "thanks", "thank you",
];

const NEGATIVE_WORDS: &[&str] = &[
    "sad",
    "bad",
    "terrible",
    "awful",
    "hate",
    "angry",
    "frustrated",
    "annoyed",
    "worried",
    "anxious",
    "obviously",
    "whatever",
];

/// Negative words that on their own call for a gentle face.
const SOFT_WORDS: &[&str] = &["sad", "depressed", "anxious", "worried"];

const POSITIVE_WEIGHT: f64 = 0.1;
const NEGATIVE_WEIGHT: f64 = 0.2;
const SOFT_MODE_SENTIMENT: f64 = -0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Grump,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub sender: Sender,
    pub content: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAnalysis {
    pub emotional_state: Option<EmotionalState>,
    pub sentiment_score: f64,
    pub keyword_matches: Vec<String>,
    pub is_repeat_question: bool,
    pub requires_soft_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeFacts {
    pub hour: u32,
    /// 0 = Sunday.
    pub day_of_week: u32,
    pub is_3am: bool,
    pub is_monday: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeContext {
    #[serde(flatten)]
    pub facts: TimeFacts,
    pub time_based_state: Option<EmotionalState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_length_ms: i64,
    pub message_count: usize,
    pub average_response_time_ms: f64,
    pub session_based_state: Option<EmotionalState>,
    /// Past the second tiredness threshold.
    pub overtime: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationPatterns {
    pub repeat_questions: usize,
    pub sentiment_trajectory: Vec<f64>,
    pub advice_followed: bool,
}

/// Additive keyword sentiment, unclamped.
pub fn sentiment(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    positive * POSITIVE_WEIGHT - negative * NEGATIVE_WEIGHT
}

/// Lowercase, drop punctuation, collapse whitespace.
fn normalize_question(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaccard similarity of the two word sets; 0 when both are empty.
pub fn word_similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Pure function of the local wall-clock reading.
pub fn time_context(now: NaiveDateTime) -> TimeContext {
    let hour = now.hour();
    let day_of_week = now.weekday().num_days_from_sunday();
    let is_3am = (2..5).contains(&hour);
    let is_monday = day_of_week == 1;

    let time_based_state = if is_3am {
        Some(EmotionalState::ThreeAm)
    } else if is_monday && (8..10).contains(&hour) {
        Some(EmotionalState::MaximumGrump)
    } else if hour >= 22 || hour < 6 {
        Some(EmotionalState::Sleepy)
    } else {
        None
    };

    TimeContext {
        facts: TimeFacts {
            hour,
            day_of_week,
            is_3am,
            is_monday,
        },
        time_based_state,
    }
}

#[derive(Debug, Clone)]
pub struct ContextAnalyzer {
    conversation: VecDeque<ConversationEntry>,
    questions: VecDeque<String>,
    session_start_ms: i64,
}

impl ContextAnalyzer {
    pub fn new(now_ms: i64) -> Self {
        Self {
            conversation: VecDeque::with_capacity(CONVERSATION_CAPACITY),
            questions: VecDeque::with_capacity(QUESTION_CAPACITY),
            session_start_ms: now_ms,
        }
    }

    /// Classify a user message. Records the message as a question for
    /// later repeat detection unless it is itself a repeat.
    pub fn analyze_message(&mut self, text: &str) -> MessageAnalysis {
        let lower = text.to_lowercase();

        let mut emotional_state = None;
        let mut keyword_matches = Vec::new();
        for (keyword, state) in KEYWORDS {
            if lower.contains(keyword) {
                keyword_matches.push(keyword.to_string());
                emotional_state.get_or_insert(*state);
            }
        }

        let sentiment_score = sentiment(&lower);
        let soft_word = SOFT_WORDS.iter().any(|w| lower.contains(*w));
        let requires_soft_mode = soft_word || sentiment_score < SOFT_MODE_SENTIMENT;
        if requires_soft_mode {
            emotional_state.get_or_insert(EmotionalState::SoftMode);
        }

        let is_repeat_question = self.check_repeat_question(text);

        MessageAnalysis {
            emotional_state,
            sentiment_score,
            keyword_matches,
            is_repeat_question,
            requires_soft_mode,
        }
    }

    fn check_repeat_question(&mut self, text: &str) -> bool {
        let normalized = normalize_question(text);
        let is_repeat = self
            .questions
            .iter()
            .any(|prior| word_similarity(&normalized, prior) > REPEAT_SIMILARITY);

        if !is_repeat {
            self.questions.push_back(normalized);
            while self.questions.len() > QUESTION_CAPACITY {
                self.questions.pop_front();
            }
        }
        is_repeat
    }

    pub fn add_message(&mut self, sender: Sender, content: &str, now_ms: i64) {
        self.conversation.push_back(ConversationEntry {
            sender,
            content: content.to_string(),
            timestamp_ms: now_ms,
        });
        while self.conversation.len() > CONVERSATION_CAPACITY {
            self.conversation.pop_front();
        }
    }

    pub fn conversation(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.conversation.iter()
    }

    pub fn time_context(&self, now: NaiveDateTime) -> TimeContext {
        time_context(now)
    }

    pub fn session_context(&self, now_ms: i64) -> SessionContext {
        let session_length_ms = (now_ms - self.session_start_ms).max(0);
        let session_based_state = if session_length_ms > TIRED_AFTER_MS {
            Some(EmotionalState::Sleepy)
        } else {
            None
        };

        SessionContext {
            session_length_ms,
            message_count: self.conversation.len(),
            average_response_time_ms: self.average_response_time(),
            session_based_state,
            overtime: session_length_ms > OVERTIME_AFTER_MS,
        }
    }

    fn average_response_time(&self) -> f64 {
        let deltas: Vec<i64> = self
            .conversation
            .iter()
            .zip(self.conversation.iter().skip(1))
            .filter(|(prev, next)| prev.sender == Sender::User && next.sender == Sender::Grump)
            .map(|(prev, next)| next.timestamp_ms - prev.timestamp_ms)
            .collect();

        if deltas.is_empty() {
            0.0
        } else {
            deltas.iter().sum::<i64>() as f64 / deltas.len() as f64
        }
    }

    pub fn conversation_patterns(&self) -> ConversationPatterns {
        let distinct: HashSet<&String> = self.questions.iter().collect();
        let repeat_questions = self.questions.len() - distinct.len();

        let sentiment_trajectory = self
            .conversation
            .iter()
            .filter(|entry| entry.sender == Sender::User)
            .map(|entry| sentiment(&entry.content))
            .collect();

        let advice_followed = self
            .conversation
            .iter()
            .rposition(|entry| entry.sender == Sender::Grump)
            .and_then(|index| self.conversation.get(index + 1))
            .filter(|next| next.sender == Sender::User)
            .map(|next| sentiment(&next.content) > 0.0)
            .unwrap_or(false);

        ConversationPatterns {
            repeat_questions,
            sentiment_trajectory,
            advice_followed,
        }
    }

    /// Time of day beats the message, which beats session length.
    pub fn recommended_state(
        &mut self,
        message: Option<&str>,
        now: NaiveDateTime,
        now_ms: i64,
    ) -> Option<EmotionalState> {
        if let Some(state) = time_context(now).time_based_state {
            return Some(state);
        }
        if let Some(state) = message.and_then(|text| self.analyze_message(text).emotional_state) {
            return Some(state);
        }
        self.session_context(now_ms).session_based_state
    }

    pub fn reset_session(&mut self, now_ms: i64) {
        self.session_start_ms = now_ms;
        self.conversation.clear();
        self.questions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_anxious_message_requires_soft_mode() {
        let mut analyzer = ContextAnalyzer::new(0);
        let analysis = analyzer.analyze_message("i'm feeling really anxious today");

        assert!(analysis.requires_soft_mode);
        assert_eq!(analysis.emotional_state, Some(EmotionalState::SoftMode));
        assert_eq!(analysis.keyword_matches, vec!["anxious".to_string()]);
        assert!((analysis.sentiment_score - -0.2).abs() < 1e-9);
    }

    #[test]
    fn test_sarcasm_words_accumulate_negative_sentiment() {
        let mut analyzer = ContextAnalyzer::new(0);
        let analysis = analyzer.analyze_message("obviously that's fine whatever");

        assert!(analysis.keyword_matches.is_empty());
        assert!((analysis.sentiment_score - -0.4).abs() < 1e-9);
        assert!(analysis.requires_soft_mode);
    }

    #[test]
    fn test_first_keyword_in_table_order_wins() {
        let mut analyzer = ContextAnalyzer::new(0);
        let analysis = analyzer.analyze_message("It's Monday AGAIN, are you sure?");

        assert_eq!(analysis.emotional_state, Some(EmotionalState::Skeptical));
        assert_eq!(
            analysis.keyword_matches,
            vec!["are you sure".to_string(), "again".to_string(), "monday".to_string()]
        );
    }

    #[test]
    fn test_sentiment_is_unclamped() {
        let score =
            sentiment("sad bad terrible awful hate angry frustrated annoyed worried anxious");
        assert!((score - -2.0).abs() < 1e-9);
        assert!((sentiment("happy great thanks") - 0.3).abs() < 1e-9);
        assert_eq!(sentiment(""), 0.0);
    }

    #[test]
    fn test_plain_message_has_no_state() {
        let mut analyzer = ContextAnalyzer::new(0);
        let analysis = analyzer.analyze_message("what is the capital of peru");
        assert_eq!(analysis.emotional_state, None);
        assert!(!analysis.requires_soft_mode);
        assert!(!analysis.is_repeat_question);
    }

    #[test]
    fn test_near_duplicate_question_is_repeat() {
        let mut analyzer = ContextAnalyzer::new(0);
        assert!(!analyzer.analyze_message("what's my balance?").is_repeat_question);
        assert!(analyzer.analyze_message("whats my balance").is_repeat_question);
        assert!(!analyzer.analyze_message("how do I transfer money").is_repeat_question);
    }

    #[test]
    fn test_question_history_is_bounded() {
        let mut analyzer = ContextAnalyzer::new(0);
        analyzer.analyze_message("alpha question one");
        for i in 0..QUESTION_CAPACITY {
            analyzer.analyze_message(&format!("unrelated filler number {}", i));
        }
        // The first question has been evicted.
        assert!(!analyzer.analyze_message("alpha question one").is_repeat_question);
    }

    #[test]
    fn test_empty_message_is_never_a_repeat() {
        let mut analyzer = ContextAnalyzer::new(0);
        assert!(!analyzer.analyze_message("").is_repeat_question);
        assert!(!analyzer.analyze_message("   ").is_repeat_question);
    }

    #[test]
    fn test_time_context_rules() {
        // 2024-01-01 was a Monday.
        let monday_nine = time_context(at(2024, 1, 1, 9, 0));
        assert_eq!(monday_nine.time_based_state, Some(EmotionalState::MaximumGrump));
        assert!(monday_nine.facts.is_monday);
        assert_eq!(monday_nine.facts.day_of_week, 1);

        for day in 1..=7 {
            let three = time_context(at(2024, 1, day, 3, 0));
            assert_eq!(three.time_based_state, Some(EmotionalState::ThreeAm));
            assert!(three.facts.is_3am);
        }

        assert_eq!(time_context(at(2024, 1, 1, 10, 0)).time_based_state, None);
        assert_eq!(time_context(at(2024, 1, 2, 9, 0)).time_based_state, None);
        assert_eq!(
            time_context(at(2024, 1, 2, 23, 30)).time_based_state,
            Some(EmotionalState::Sleepy)
        );
        assert_eq!(
            time_context(at(2024, 1, 2, 5, 0)).time_based_state,
            Some(EmotionalState::Sleepy)
        );
        assert_eq!(
            time_context(at(2024, 1, 2, 1, 59)).time_based_state,
            Some(EmotionalState::Sleepy)
        );
    }

    #[test]
    fn test_session_thresholds() {
        let analyzer = ContextAnalyzer::new(0);

        let fresh = analyzer.session_context(4 * MINUTE_MS);
        assert_eq!(fresh.session_based_state, None);

        let tired = analyzer.session_context(31 * MINUTE_MS);
        assert_eq!(tired.session_based_state, Some(EmotionalState::Sleepy));
        assert!(!tired.overtime);

        let overtime = analyzer.session_context(46 * MINUTE_MS);
        assert_eq!(overtime.session_based_state, Some(EmotionalState::Sleepy));
        assert!(overtime.overtime);
    }

    #[test]
    fn test_average_response_time() {
        let mut analyzer = ContextAnalyzer::new(0);
        analyzer.add_message(Sender::User, "hi", 1_000);
        analyzer.add_message(Sender::Grump, "what", 3_000);
        analyzer.add_message(Sender::User, "hello?", 10_000);
        analyzer.add_message(Sender::User, "anyone", 11_000);
        analyzer.add_message(Sender::Grump, "ugh", 15_000);

        let session = analyzer.session_context(20_000);
        assert_eq!(session.message_count, 5);
        assert_eq!(session.average_response_time_ms, 3_000.0);
    }

    #[test]
    fn test_conversation_ring_buffer_keeps_fifty() {
        let mut analyzer = ContextAnalyzer::new(0);
        for i in 0..60 {
            analyzer.add_message(Sender::User, &format!("message {}", i), i);
        }
        let first = analyzer.conversation().next().unwrap();
        assert_eq!(first.content, "message 10");
        assert_eq!(analyzer.conversation().count(), CONVERSATION_CAPACITY);
    }

    #[test]
    fn test_conversation_patterns() {
        let mut analyzer = ContextAnalyzer::new(0);
        analyzer.add_message(Sender::User, "this is terrible", 0);
        analyzer.add_message(Sender::Grump, "try turning it off and on", 10);
        analyzer.add_message(Sender::User, "thanks that was great", 20);

        let patterns = analyzer.conversation_patterns();
        assert_eq!(patterns.sentiment_trajectory.len(), 2);
        assert!(patterns.sentiment_trajectory[0] < 0.0);
        assert!(patterns.advice_followed);
        assert_eq!(patterns.repeat_questions, 0);

        analyzer.add_message(Sender::Grump, "you're welcome", 30);
        assert!(!analyzer.conversation_patterns().advice_followed);
    }

    #[test]
    fn test_recommended_state_priority() {
        let mut analyzer = ContextAnalyzer::new(0);
        let tuesday_noon = at(2024, 1, 2, 12, 0);
        let monday_nine = at(2024, 1, 1, 9, 0);

        assert_eq!(
            analyzer.recommended_state(Some("are you sure"), monday_nine, 0),
            Some(EmotionalState::MaximumGrump)
        );
        assert_eq!(
            analyzer.recommended_state(Some("are you sure"), tuesday_noon, 0),
            Some(EmotionalState::Skeptical)
        );
        assert_eq!(
            analyzer.recommended_state(Some("hello"), tuesday_noon, 40 * MINUTE_MS),
            Some(EmotionalState::Sleepy)
        );
        assert_eq!(analyzer.recommended_state(None, tuesday_noon, 0), None);
    }

    #[test]
    fn test_reset_session() {
        let mut analyzer = ContextAnalyzer::new(0);
        analyzer.analyze_message("what's my balance?");
        analyzer.add_message(Sender::User, "what's my balance?", 5);

        analyzer.reset_session(50 * MINUTE_MS);

        assert_eq!(analyzer.conversation().count(), 0);
        assert!(!analyzer.analyze_message("whats my balance").is_repeat_question);
        assert_eq!(analyzer.session_context(50 * MINUTE_MS).session_based_state, None);
    }
}
