use std::sync::Arc;

use scout_agents::{AnswerAgent, Pipeline, ResearchAgent};
use scout_core::testing::{
    Observed, RecordingObserver, ScriptedChatModel, StaticPageFetcher, StaticSearchProvider, hit,
};
use scout_core::tools::FileReader;
use scout_core::{ScoutError, Task, Termination, ToolBox, ToolError, TranscriptEntry};

fn paris_search() -> StaticSearchProvider {
    StaticSearchProvider::new().with_hits(
        "capital of France",
        vec![hit(
            "Paris - Wikipedia",
            "https://en.wikipedia.org/wiki/Paris",
            "Paris is the capital and largest city of France.",
        )],
    )
}

fn pipeline(
    research: ScriptedChatModel,
    answer: Arc<ScriptedChatModel>,
    search: StaticSearchProvider,
    fetcher: StaticPageFetcher,
    observer: Arc<RecordingObserver>,
) -> Pipeline {
    let tools = ToolBox::new(Arc::new(search), Arc::new(fetcher), FileReader::new(".", 1024))
        .with_observer(observer.clone());
    Pipeline::new(
        ResearchAgent::new(Arc::new(research), Arc::new(tools)).with_max_tool_calls(5),
        AnswerAgent::new(answer),
    )
    .with_observer(observer)
}

#[tokio::test]
async fn arithmetic_needs_no_research() {
    let answer_model = Arc::new(ScriptedChatModel::new(["4"]));
    let observer = Arc::new(RecordingObserver::new());
    let pipeline = pipeline(
        ScriptedChatModel::new(["2 + 2 is simple arithmetic."]),
        answer_model.clone(),
        StaticSearchProvider::new(),
        StaticPageFetcher::new(),
        observer.clone(),
    );

    let report = pipeline.run(Task::new("What is 2 + 2?")).await.unwrap();

    assert_eq!(report.answer, "4");
    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.transcript.tool_calls(), 0);
    assert!(observer.seen().contains(&Observed::Answer("4".into())));

    let answer_prompt = answer_model.requests()[0].conversation_text();
    assert!(answer_prompt.starts_with("Original Task: What is 2 + 2?"));
    assert!(answer_prompt.contains("2 + 2 is simple arithmetic."));
}

#[tokio::test]
async fn empty_research_shows_placeholder_to_answer_agent() {
    let answer_model = Arc::new(ScriptedChatModel::new(["4"]));
    let pipeline = pipeline(
        ScriptedChatModel::new([r#"{"action":"finish","notes":""}"#]),
        answer_model.clone(),
        StaticSearchProvider::new(),
        StaticPageFetcher::new(),
        Arc::new(RecordingObserver::new()),
    );

    let report = pipeline.run(Task::new("What is 2 + 2?")).await.unwrap();

    assert!(report.transcript.is_empty());
    let answer_prompt = answer_model.requests()[0].conversation_text();
    assert!(answer_prompt.contains("Research Transcript:\n(no research was performed)"));
}

#[tokio::test]
async fn capital_of_france_via_search() {
    let answer_model = Arc::new(ScriptedChatModel::new(["Paris."]));
    let observer = Arc::new(RecordingObserver::new());
    let pipeline = pipeline(
        ScriptedChatModel::new([
            r#"{"action":"call_tool","tool":"web_search","input":{"query":"capital of France"}}"#,
            r#"{"action":"finish","notes":"Search results say Paris is the capital of France."}"#,
        ]),
        answer_model.clone(),
        paris_search(),
        StaticPageFetcher::new(),
        observer.clone(),
    );

    let report = pipeline
        .run(Task::new("What is the capital of France?"))
        .await
        .unwrap();

    assert_eq!(report.answer, "Paris.");
    assert_eq!(report.transcript.tool_calls(), 1);
    assert!(report.transcript.render().contains("Paris"));
    assert!(answer_model.requests()[0].conversation_text().contains("Paris"));

    let seen = observer.seen();
    assert!(seen.contains(&Observed::ToolStarted {
        step: 1,
        call: "web_search(\"capital of France\")".into(),
    }));
    assert!(seen.contains(&Observed::ToolFinished {
        step: 1,
        call: "web_search(\"capital of France\")".into(),
        ok: true,
    }));
    assert!(seen.contains(&Observed::ResearchFinished {
        termination: Termination::Completed,
        tool_calls: 1,
    }));
}

#[tokio::test]
async fn failing_tool_is_visible_on_next_turn() {
    let research_model = Arc::new(ScriptedChatModel::new([
        r#"{"action":"call_tool","tool":"web_scrape","input":{"url":"https://unreachable.example"}}"#,
        r#"{"action":"call_tool","tool":"web_search","input":{"query":"capital of France"}}"#,
        r#"{"action":"finish","notes":"Paris."}"#,
    ]));
    let tools = ToolBox::new(
        Arc::new(paris_search()),
        Arc::new(StaticPageFetcher::new()),
        FileReader::new(".", 1024),
    );
    let pipeline = Pipeline::new(
        ResearchAgent::new(research_model.clone(), Arc::new(tools)),
        AnswerAgent::new(Arc::new(ScriptedChatModel::new(["Paris."]))),
    );

    let report = pipeline
        .run(Task::new("What is the capital of France?"))
        .await
        .unwrap();

    assert_eq!(report.answer, "Paris.");
    assert_eq!(report.transcript.tool_calls(), 2);
    match &report.transcript.entries()[0] {
        TranscriptEntry::ToolCall { result, .. } => {
            assert!(matches!(result, Err(ToolError::Fetch(_))));
        }
        other => panic!("expected a tool call, got {other:?}"),
    }

    let second_prompt = research_model.requests()[1].conversation_text();
    assert!(second_prompt.contains("Error (fetch_error)"));
}

#[tokio::test]
async fn runaway_model_still_gets_an_answer() {
    let pipeline = pipeline(
        ScriptedChatModel::always(
            r#"{"action":"call_tool","tool":"web_search","input":{"query":"capital of France"}}"#,
        ),
        Arc::new(ScriptedChatModel::new(["Paris."])),
        paris_search(),
        StaticPageFetcher::new(),
        Arc::new(RecordingObserver::new()),
    );

    let report = pipeline
        .run(Task::new("What is the capital of France?"))
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::LoopLimitReached { limit: 5 });
    assert_eq!(report.transcript.tool_calls(), 5);
    assert_eq!(report.answer, "Paris.");
}

#[tokio::test]
async fn identical_inputs_give_identical_answers() {
    let mut answers = Vec::new();
    for _ in 0..2 {
        let pipeline = pipeline(
            ScriptedChatModel::new([
                r#"{"action":"call_tool","tool":"web_search","input":{"query":"capital of France"}}"#,
                r#"{"action":"finish","notes":"Paris"}"#,
            ]),
            Arc::new(ScriptedChatModel::new(["Paris."])),
            paris_search(),
            StaticPageFetcher::new(),
            Arc::new(RecordingObserver::new()),
        );
        let report = pipeline
            .run(Task::new("What is the capital of France?"))
            .await
            .unwrap();
        answers.push((report.answer, report.transcript));
    }
    assert_eq!(answers[0], answers[1]);
}

#[tokio::test]
async fn attached_file_is_read() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sales.csv"), "region,total\nnorth,17000\n").unwrap();

    let research_model = Arc::new(ScriptedChatModel::new([
        r#"{"action":"call_tool","tool":"file_read","input":{"filename":"sales.csv"}}"#,
        r#"{"action":"finish","notes":"north total is 17000"}"#,
    ]));
    let tools = ToolBox::new(
        Arc::new(StaticSearchProvider::new()),
        Arc::new(StaticPageFetcher::new()),
        FileReader::new(dir.path(), 1024),
    );
    let pipeline = Pipeline::new(
        ResearchAgent::new(research_model.clone(), Arc::new(tools)),
        AnswerAgent::new(Arc::new(ScriptedChatModel::new(["17000"]))),
    );

    let report = pipeline
        .run(Task::new("What is the north total?").with_attachment("sales.csv"))
        .await
        .unwrap();

    assert_eq!(report.answer, "17000");
    let first_prompt = research_model.requests()[0].conversation_text();
    assert!(first_prompt.contains("Associated file: sales.csv"));
    assert!(report.transcript.render().contains("north,17000"));
}

#[tokio::test]
async fn research_failure_aborts_before_answer() {
    let answer_model = Arc::new(ScriptedChatModel::new(["never"]));
    let pipeline = pipeline(
        ScriptedChatModel::failing(401, "invalid api key"),
        answer_model.clone(),
        StaticSearchProvider::new(),
        StaticPageFetcher::new(),
        Arc::new(RecordingObserver::new()),
    );

    let err = pipeline.run(Task::new("anything")).await.unwrap_err();
    assert!(matches!(err, ScoutError::Research(ref inner) if inner.is_auth()));
    assert_eq!(answer_model.call_count(), 0);
}

#[tokio::test]
async fn empty_answer_is_an_error() {
    let pipeline = pipeline(
        ScriptedChatModel::new(["nothing to look up"]),
        Arc::new(ScriptedChatModel::new([""])),
        StaticSearchProvider::new(),
        StaticPageFetcher::new(),
        Arc::new(RecordingObserver::new()),
    );

    let err = pipeline.run(Task::new("What is 2 + 2?")).await.unwrap_err();
    assert!(matches!(err, ScoutError::Synthesis(_)));
}
