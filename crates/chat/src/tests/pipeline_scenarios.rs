use super::*;
use crate::history::ChatTurn;
use crate::pipeline::AnswerOutcome;
use askbot_core::config::DEFAULT_REFUSAL_MESSAGE;
use tokio_util::sync::CancellationToken;

const FRANCE: &str = "Paris is the capital of France.";

#[tokio::test]
async fn test_answers_from_english_passages_and_records_turn() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_rewrite(rewrite("capital of France", "法国的首都"));
    generator.push_answer(Ok(Verdict::Accepted("Paris.".to_string())));
    let retriever = Arc::new(
        ScriptedRetriever::new()
            .with_passage("capital of France", "france.md#0", FRANCE, 0.93)
            .with_passage("capital of France", "pasta.txt#0", "Boil water.", 0.21),
    );
    let pipeline = pipeline_with(generator.clone(), retriever.clone(), 2500);

    let mut history = ConversationHistory::new();
    let outcome = pipeline
        .answer("What is the capital of France?", &mut history, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, AnswerOutcome::Answered("Paris.".to_string()));
    assert_eq!(
        history.turns().cloned().collect::<Vec<_>>(),
        vec![ChatTurn::new("What is the capital of France?", "Paris.")]
    );
    assert_eq!(
        generator.contexts.lock().unwrap().as_slice(),
        &[format!("france.md#0:{}", FRANCE)]
    );
    assert_eq!(
        retriever.calls(),
        vec![("capital of France".to_string(), QueryLanguage::English)]
    );
}

#[tokio::test]
async fn test_rewrite_rejection_returns_refusal_and_skips_everything_else() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_rewrite(Ok(Verdict::Rejected("abusive".to_string())));
    let retriever = Arc::new(ScriptedRetriever::new());
    let pipeline = pipeline_with(generator.clone(), retriever.clone(), 2500);

    let mut history: ConversationHistory = [ChatTurn::new("hi", "hello")].into_iter().collect();
    let before = history.clone();
    let outcome = pipeline
        .answer("something nasty", &mut history, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        AnswerOutcome::Refused(DEFAULT_REFUSAL_MESSAGE.to_string())
    );
    assert!(!outcome.is_acceptable());
    assert_eq!(history, before);
    assert!(retriever.calls().is_empty());
    assert_eq!(generator.answer_calls(), 0);
}

#[tokio::test]
async fn test_custom_refusal_message() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_rewrite(Ok(Verdict::Rejected("off topic".to_string())));
    let pipeline = pipeline_with(generator, Arc::new(ScriptedRetriever::new()), 2500)
        .with_refusal_message("Let's keep it civil.");

    let mut history = ConversationHistory::new();
    let outcome = pipeline
        .answer("rant", &mut history, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.text(), Some("Let's keep it civil."));
}

#[tokio::test]
async fn test_generation_rejection_is_shown_but_not_recorded() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_answer(Ok(Verdict::Rejected("I can't \"help\" with that".to_string())));
    let pipeline = pipeline_with(generator, Arc::new(ScriptedRetriever::new()), 2500);

    let mut history = ConversationHistory::new();
    let outcome = pipeline
        .answer("borderline", &mut history, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        AnswerOutcome::Refused(r#"I can't \"help\" with that"#.to_string())
    );
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_falls_back_to_chinese_when_english_finds_nothing_relevant() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_rewrite(rewrite("capital of China", "中国的首都"));
    let retriever = Arc::new(
        ScriptedRetriever::new()
            .with_passage("capital of China", "france.md#0", FRANCE, 0.42)
            .with_passage("中国的首都", "china.txt#0", "北京是中国的首都。\n", 0.91),
    );
    let pipeline = pipeline_with(generator.clone(), retriever.clone(), 2500);

    let mut history = ConversationHistory::new();
    pipeline
        .answer("中国的首都是哪里？", &mut history, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        retriever.calls(),
        vec![
            ("capital of China".to_string(), QueryLanguage::English),
            ("中国的首都".to_string(), QueryLanguage::Chinese),
        ]
    );
    assert_eq!(
        generator.contexts.lock().unwrap().as_slice(),
        &["china.txt#0:北京是中国的首都。".to_string()]
    );
}

#[tokio::test]
async fn test_threshold_is_exclusive_and_empty_context_still_generates() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_rewrite(rewrite("edge", "边缘"));
    let retriever = Arc::new(
        ScriptedRetriever::new()
            .with_passage("edge", "a.md#0", "exactly at threshold", 0.8)
            .with_passage("边缘", "b.md#0", "also at threshold", 0.8),
    );
    let pipeline = pipeline_with(generator.clone(), retriever.clone(), 2500);

    let mut history = ConversationHistory::new();
    let outcome = pipeline
        .answer("edge case", &mut history, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_acceptable());
    assert_eq!(retriever.calls().len(), 2);
    assert_eq!(generator.contexts.lock().unwrap().as_slice(), &[String::new()]);
}

#[tokio::test]
async fn test_answer_is_escaped_before_display_and_storage() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_answer(Ok(Verdict::Accepted(r#"a"b\c"#.to_string())));
    let pipeline = pipeline_with(generator, Arc::new(ScriptedRetriever::new()), 2500);

    let mut history = ConversationHistory::new();
    let outcome = pipeline
        .answer("quote me", &mut history, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.text(), Some(r#"a\"b\\c"#));
    assert_eq!(
        history.turns().next().map(|t| t.assistant.as_str()),
        Some(r#"a\"b\\c"#)
    );
}

#[tokio::test]
async fn test_blank_answer_yields_no_answer_and_no_history() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_answer(Ok(Verdict::Accepted("  \n ".to_string())));
    let pipeline = pipeline_with(generator, Arc::new(ScriptedRetriever::new()), 2500);

    let mut history = ConversationHistory::new();
    let outcome = pipeline
        .answer("silence?", &mut history, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, AnswerOutcome::NoAnswer);
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_history_is_trimmed_oldest_first() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_answer(Ok(Verdict::Accepted("three four".to_string())));
    let pipeline = pipeline_with(generator.clone(), Arc::new(ScriptedRetriever::new()), 6);

    // Two turns of two words each: 4 tokens.
    let mut history: ConversationHistory = [
        ChatTurn::new("one", "uno"),
        ChatTurn::new("two", "dos"),
    ]
    .into_iter()
    .collect();

    pipeline
        .answer("question", &mut history, &CancellationToken::new())
        .await
        .unwrap();

    let users: Vec<&str> = history.turns().map(|t| t.user.as_str()).collect();
    assert_eq!(users, vec!["two", "question"]);
    assert_eq!(generator.history_sizes.lock().unwrap().as_slice(), &[2]);
}

#[tokio::test]
async fn test_retriever_failure_is_upstream_and_leaves_history() {
    let generator = Arc::new(ScriptedGenerator::new());
    let retriever = Arc::new(ScriptedRetriever {
        fail: true,
        ..ScriptedRetriever::default()
    });
    let pipeline = pipeline_with(generator.clone(), retriever, 2500);

    let mut history: ConversationHistory = [ChatTurn::new("hi", "hello")].into_iter().collect();
    let before = history.clone();
    let err = pipeline
        .answer("anything", &mut history, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        AppError::Upstream { stage, message } => {
            assert_eq!(stage, "retrieve");
            assert!(message.contains("vector store unreachable"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
    assert_eq!(history, before);
    assert_eq!(generator.answer_calls(), 0);
}

#[tokio::test]
async fn test_generator_failure_is_upstream() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_rewrite(Err(AppError::Llm("connection refused".to_string())));
    let pipeline = pipeline_with(generator, Arc::new(ScriptedRetriever::new()), 2500);

    let mut history = ConversationHistory::new();
    let err = pipeline
        .answer("anything", &mut history, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_upstream());
    assert!(err.to_string().contains("rewrite"));
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let generator = Arc::new(ScriptedGenerator::new());
    let pipeline = pipeline_with(generator.clone(), Arc::new(ScriptedRetriever::new()), 2500);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut history = ConversationHistory::new();
    let err = pipeline
        .answer("too late", &mut history, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(history.is_empty());
    assert_eq!(generator.answer_calls(), 0);
}

#[tokio::test]
async fn test_cancelled_while_retrieving() {
    let generator = Arc::new(ScriptedGenerator::new());
    let retriever = Arc::new(ScriptedRetriever {
        hang: true,
        ..ScriptedRetriever::default()
    });
    let pipeline = pipeline_with(generator.clone(), retriever.clone(), 2500);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let mut history: ConversationHistory = [ChatTurn::new("hi", "hello")].into_iter().collect();
    let err = pipeline
        .answer("slow search", &mut history, &cancel)
        .await
        .unwrap_err();

    match err {
        AppError::Cancelled { stage } => assert_eq!(stage, "retrieve"),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(history.len(), 1);
    assert_eq!(retriever.calls().len(), 1);
    assert_eq!(generator.answer_calls(), 0);
}
