// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dispatchrs::config::settings::LlmSettings;
use dispatchrs::domain::models::evaluation::{
    CompanyProfile, CulturalFitEvaluation, EvaluationChunk, QuestionEvaluation, ResponseItem,
};
use dispatchrs::domain::services::evaluation_provider::EvaluationProvider;
use dispatchrs::infrastructure::services::llm_evaluation_provider::{
    parse_evaluation, LlmEvaluationProvider,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(api_base_url: String, api_key: Option<&str>) -> LlmSettings {
    LlmSettings {
        api_key: api_key.map(str::to_string),
        model: "test-model".to_string(),
        api_base_url,
        timeout_secs: 5,
    }
}

fn chunk() -> EvaluationChunk {
    EvaluationChunk {
        responses: vec![ResponseItem {
            question_id: "q1".to_string(),
            question_text: "Tell us about a time you took ownership".to_string(),
            transcript: "I rebuilt our deploy pipeline over a weekend".to_string(),
            core_values: vec!["Ownership".to_string()],
            aligns_with: None,
        }],
        company_profile: CompanyProfile::default(),
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
}

#[tokio::test]
async fn test_evaluate_parses_fenced_answer() {
    let server = MockServer::start().await;
    let answer = "```json\n{\"perQuestionResults\":[{\"questionId\":\"q1\",\"feedback\":\"strong\"}]}\n```";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(answer)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = LlmEvaluationProvider::new(&settings(server.uri(), Some("sk-test")));
    let result = provider.evaluate(&chunk()).await.unwrap().unwrap();

    assert_eq!(result.per_question_results.len(), 1);
    assert_eq!(result.per_question_results[0].question_id, "q1");
    assert_eq!(
        result.per_question_results[0].feedback.as_deref(),
        Some("strong")
    );

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["temperature"], 0.0);
    let prompt = body["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("I rebuilt our deploy pipeline"));
}

#[tokio::test]
async fn test_unparsable_answer_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("I cannot evaluate this.")),
        )
        .mount(&server)
        .await;

    let provider = LlmEvaluationProvider::new(&settings(server.uri(), Some("sk-test")));
    let evaluation = CulturalFitEvaluation {
        per_question_results: vec![QuestionEvaluation {
            question_id: "q1".to_string(),
            culture_fit_composite: None,
            feedback: None,
        }],
    };

    assert!(provider.self_critique(&evaluation).await.unwrap().is_none());
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let provider = LlmEvaluationProvider::new(&settings(server.uri(), Some("sk-test")));
    let error = provider.evaluate(&chunk()).await.unwrap_err();

    assert!(error.to_string().contains("429"));
}

#[tokio::test]
async fn test_missing_api_key_fails_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = LlmEvaluationProvider::new(&settings(server.uri(), None));
    let error = provider.evaluate(&chunk()).await.unwrap_err();

    assert!(error.to_string().contains("LLM API key not configured"));
}

#[test]
fn test_parse_evaluation_plain_json() {
    let parsed = parse_evaluation(r#"{"perQuestionResults":[]}"#).unwrap();
    assert!(parsed.is_empty());
    assert!(parse_evaluation("not json").is_none());
}
