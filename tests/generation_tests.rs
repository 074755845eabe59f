mod common;

use std::time::Duration;

use serde_json::json;
use studyai_client::models::{Difficulty, Question};
use studyai_client::services::gemini::{GeminiClient, GeminiConfig};
use studyai_client::services::generation::{
    generate_study_set, parse_study_set, GenerationError,
};

fn client_for(addr: &str) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        api_key: Some("test-key".to_string()),
        model: "gemini-2.5-flash".to_string(),
        api_endpoint: addr.to_string(),
        timeout: Duration::from_secs(5),
    })
}

fn full_payload() -> serde_json::Value {
    let flashcards: Vec<serde_json::Value> = (1..=10)
        .map(|i| {
            json!({
                "question": format!("Term {i}?"),
                "answer": format!("Definition {i}"),
                "difficulty": if i % 2 == 0 { "Easy" } else { "Hard" }
            })
        })
        .collect();

    json!({
        "flashcards": flashcards,
        "quiz": {
            "title": "Photosynthesis Quiz",
            "questions": [
                {
                    "type": "MCQ",
                    "question": "Where does the light reaction occur?",
                    "options": ["Stroma", "Thylakoid", "Cytoplasm", "Nucleus"],
                    "answer": "Thylakoid",
                    "explanation": "Light-dependent reactions run in the thylakoid membrane."
                },
                {
                    "type": "Subjective",
                    "question": "Explain the Calvin cycle.",
                    "answer": "Carbon fixation using ATP and NADPH."
                }
            ]
        },
        "summary": "Photosynthesis converts light energy into chemical energy.",
        "questionPaper": {
            "title": "Photosynthesis Exam",
            "totalMarks": 20,
            "questions": [
                { "question": "Define photosynthesis.", "marks": 5 },
                { "question": "Describe both reaction stages.", "marks": 15 }
            ]
        }
    })
}

#[test]
fn full_payload_parses_preserving_order() {
    let set = parse_study_set(&full_payload().to_string()).unwrap();

    assert_eq!(set.flashcards.len(), 10);
    assert_eq!(set.flashcards[0].question, "Term 1?");
    assert_eq!(set.flashcards[9].answer, "Definition 10");
    assert_eq!(set.flashcards[1].difficulty, Difficulty::Easy);

    assert_eq!(set.quiz.questions.len(), 2);
    match &set.quiz.questions[0] {
        Question::Mcq { options, answer, .. } => {
            assert_eq!(options.len(), 4);
            assert!(options.contains(answer));
        }
        other => panic!("expected MCQ first, got {other:?}"),
    }
    assert!(matches!(&set.quiz.questions[1], Question::Subjective { .. }));

    assert_eq!(set.question_paper.total_marks, 20);
    assert!(set.question_paper.marks_consistent());
}

#[test]
fn payload_surrounded_by_whitespace_still_parses() {
    let text = format!("\n  {}  \n", full_payload());
    assert!(parse_study_set(&text).is_ok());
}

#[test]
fn missing_question_paper_is_rejected_whole() {
    let mut payload = full_payload();
    payload.as_object_mut().unwrap().remove("questionPaper");

    let err = parse_study_set(&payload.to_string()).unwrap_err();
    assert!(matches!(err, GenerationError::MissingFields));
}

#[test]
fn null_top_level_field_is_rejected() {
    let mut payload = full_payload();
    payload["summary"] = serde_json::Value::Null;

    let err = parse_study_set(&payload.to_string()).unwrap_err();
    assert!(matches!(err, GenerationError::MissingFields));
}

#[test]
fn non_json_text_is_rejected() {
    let err = parse_study_set("I could not produce JSON, sorry.").unwrap_err();
    assert!(matches!(err, GenerationError::MissingFields));
}

#[test]
fn unknown_question_tag_is_rejected() {
    let mut payload = full_payload();
    payload["quiz"]["questions"][0]["type"] = json!("TrueFalse");

    let err = parse_study_set(&payload.to_string()).unwrap_err();
    assert!(matches!(err, GenerationError::MissingFields));
}

#[tokio::test]
async fn generate_resolves_a_schema_conforming_reply() {
    let reply = json!({
        "candidates": [{
            "content": { "parts": [{ "text": full_payload().to_string() }] }
        }]
    });
    let server = common::StubServer::start(vec![(200, reply.to_string())]).await;
    let client = client_for(&server.addr);

    let set = generate_study_set(&client, &common::text_file("notes.txt")).await.unwrap();
    assert_eq!(set.flashcards.len(), 10);
    assert_eq!(set.quiz.questions.len(), 2);

    let requests = server.requests();
    assert_eq!(requests[0].path, "/models/gemini-2.5-flash:generateContent");
    let sent: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(sent["generationConfig"]["responseMimeType"], "application/json");
    assert!(sent["generationConfig"]["responseSchema"].is_object());
}

#[tokio::test]
async fn text_less_reply_is_a_service_failure_not_missing_fields() {
    let server =
        common::StubServer::start(vec![(200, json!({ "candidates": [] }).to_string())]).await;
    let client = client_for(&server.addr);

    let err = generate_study_set(&client, &common::text_file("notes.txt")).await.unwrap_err();
    match err {
        GenerationError::Service(detail) => assert!(detail.contains("empty model response")),
        other => panic!("expected service error, got {other:?}"),
    }
}
