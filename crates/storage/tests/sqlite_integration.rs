use quiz_core::model::{
    CompletedLesson, Outcome, ScoreResult, SessionSnapshot, SessionState, Subject, Tutor,
    TurnCommit,
};
use quiz_core::progression::StageProgression;
use storage::repository::{SessionRepository, Storage, StorageError};
use storage::sqlite::SqliteRepository;

fn played_state() -> SessionState {
    let progression = StageProgression::default();
    let mut state = SessionState::new();
    let turns = [
        (Tutor::Stella, Outcome::Correct, 0.75),
        (Tutor::Maria, Outcome::Wrong, -0.25),
        (Tutor::Stella, Outcome::Partial, 0.375),
        (Tutor::Luna, Outcome::Omitted, 0.0),
    ];
    for (tutor, outcome, delta) in turns {
        let stage = progression.apply(tutor, state.progress_for(tutor), outcome);
        state.commit(&TurnCommit {
            score: ScoreResult::new(outcome, delta),
            stage,
        });
        state.push_recent_subject(&Subject::new("Logic: Series").unwrap());
    }
    state.record_lesson(CompletedLesson {
        subject: "Public contracts".into(),
        tutor: Tutor::Maria,
        score: 8,
        out_of: 10,
    });
    state
}

#[tokio::test]
async fn sqlite_roundtrip_restores_session_state() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let state = played_state();
    repo.save_snapshot("main", &state.to_snapshot())
        .await
        .expect("save");

    let loaded = repo.load_snapshot("main").await.expect("load");
    assert_eq!(SessionState::from_snapshot(loaded), state);
    assert_eq!(repo.list_slots().await.unwrap(), vec!["main"]);
}

#[tokio::test]
async fn sqlite_save_replaces_previous_rows() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_replace?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.save_snapshot("main", &played_state().to_snapshot())
        .await
        .unwrap();
    repo.save_snapshot("main", &SessionSnapshot::default())
        .await
        .unwrap();

    let loaded = repo.load_snapshot("main").await.unwrap();
    assert_eq!(loaded, SessionSnapshot::default());
}

#[tokio::test]
async fn sqlite_delete_cascades_and_missing_is_not_found() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_delete?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.save_snapshot("gone", &played_state().to_snapshot())
        .await
        .unwrap();
    repo.delete_slot("gone").await.unwrap();

    assert!(matches!(
        repo.load_snapshot("gone").await,
        Err(StorageError::NotFound)
    ));
    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outcome_history")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first");
    repo.migrate().await.expect("second");
}

#[tokio::test]
async fn storage_sqlite_works_with_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("quiz.db").display());
    let storage = Storage::sqlite(&url).await.expect("storage");

    storage
        .sessions
        .save_snapshot("slot-1", &played_state().to_snapshot())
        .await
        .unwrap();
    let loaded = storage.sessions.load_snapshot("slot-1").await.unwrap();
    assert_eq!(loaded.completed_lessons.len(), 1);
    assert_eq!(loaded.history.len(), 4);
}

#[tokio::test]
async fn sqlite_load_tolerates_rows_of_unknown_tutors() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_unknown?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo.save_snapshot("main", &played_state().to_snapshot())
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO outcome_history (slot, position, tutor, outcome) \
         VALUES ('main', 99, 'Giulia', 'maybe')",
    )
    .execute(repo.pool())
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO completed_lessons (slot, position, subject, tutor, score, out_of) \
         VALUES ('main', 99, 'Logic', 'Giulia', 9, 10)",
    )
    .execute(repo.pool())
    .await
    .unwrap();

    let loaded = repo.load_snapshot("main").await.expect("load");
    assert_eq!(loaded.history.len(), 5);
    assert_eq!(loaded.history[4].outcome, Outcome::Omitted);

    let state = SessionState::from_snapshot(loaded);
    assert_eq!(state, played_state());
}
